//! Display-object arena — the in-crate stand-in for the excluded renderer.
//!
//! Layers refer to scene nodes by opaque `NodeId`; nothing in the arena
//! points back at a layer.  The serialized form tags each node with the
//! owning layer's id purely so history restore can re-associate them.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::layers::LayerId;

/// Opaque handle to a scene node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

#[cfg(test)]
impl NodeId {
    pub(crate) fn fake(v: u64) -> Self {
        Self(v)
    }
}

/// A positioned bitmap in the scene.  Placement is top-left based; `angle`
/// is carried for display fidelity but selection-driven pixel operations
/// refuse rotated nodes.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub image: RgbaImage,
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
    pub opacity: f32,
    pub visible: bool,
}

impl SceneNode {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            opacity: 1.0,
            visible: true,
        }
    }

    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    /// On-scene width after scaling.
    pub fn scaled_width(&self) -> f64 {
        self.image.width() as f64 * self.scale_x
    }

    pub fn scaled_height(&self) -> f64 {
        self.image.height() as f64 * self.scale_y
    }
}

/// Flat serialized form of a node, ready for bincode.
#[derive(Clone, Serialize, Deserialize)]
pub struct SerializedNode {
    pub layer_id: Option<LayerId>,
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
    pub opacity: f32,
    pub visible: bool,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SerializedNode {
    pub fn capture(node: &SceneNode, layer_id: Option<LayerId>) -> Self {
        Self {
            layer_id,
            left: node.left,
            top: node.top,
            scale_x: node.scale_x,
            scale_y: node.scale_y,
            angle: node.angle,
            opacity: node.opacity,
            visible: node.visible,
            width: node.image.width(),
            height: node.image.height(),
            pixels: node.image.as_raw().clone(),
        }
    }

    /// Rebuild the live node.  `None` when the pixel buffer does not match
    /// the recorded dimensions (a corrupted snapshot).
    pub fn revive(&self) -> Option<SceneNode> {
        let image = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())?;
        Some(SceneNode {
            image,
            left: self.left,
            top: self.top,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            angle: self.angle,
            opacity: self.opacity,
            visible: self.visible,
        })
    }
}

/// Id-indexed arena of scene nodes plus an explicit paint order
/// (back-to-front).
#[derive(Default)]
pub struct Scene {
    nodes: HashMap<NodeId, SceneNode>,
    order: Vec<NodeId>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        self.order.retain(|n| *n != id);
        self.nodes.remove(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Reorder painting to match the given back-to-front sequence.  Ids not
    /// listed keep their relative order at the front.
    pub fn sync_order(&mut self, ordered: &[NodeId]) {
        let mut next: Vec<NodeId> =
            ordered.iter().copied().filter(|id| self.nodes.contains_key(id)).collect();
        for id in &self.order {
            if !next.contains(id) {
                next.push(*id);
            }
        }
        self.order = next;
    }

    /// Paint order, back to front.
    pub fn paint_order(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.order.iter().filter_map(|id| self.nodes.get(id).map(|n| (*id, n)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
    }
}
