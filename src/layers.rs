//! Layer engine — the ordered layer stack and the active-layer pointer.
//!
//! Position in the vec encodes paint order, back to front.  The engine owns
//! layer records; pixels live in the scene arena behind each layer's
//! `NodeId`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scene::NodeId;

/// Opaque layer identifier, stable across history restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub node: NodeId,
    pub visible: bool,
    pub opacity: f32,
}

#[derive(Default)]
pub struct LayerEngine {
    layers: Vec<Layer>,
    active: Option<LayerId>,
}

impl LayerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn active_layer_id(&self) -> Option<LayerId> {
        self.active
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layer(id))
    }

    /// Insert a layer at `insert_index` (clamped; end of stack when `None`)
    /// and make it active.  `id_override` is used by history restore to keep
    /// ids stable.
    pub fn add_layer(
        &mut self,
        node: NodeId,
        name: Option<String>,
        insert_index: Option<usize>,
        id_override: Option<LayerId>,
    ) -> LayerId {
        let id = id_override.unwrap_or_default();
        let layer = Layer {
            id,
            name: name.unwrap_or_else(|| format!("Layer {}", self.layers.len() + 1)),
            node,
            visible: true,
            opacity: 1.0,
        };
        let idx = insert_index.unwrap_or(self.layers.len()).min(self.layers.len());
        self.layers.insert(idx, layer);
        self.active = Some(id);
        id
    }

    /// Remove a layer.  When the active layer goes away, fall back to the
    /// layer now occupying its index, else the previous index, else none.
    pub fn remove_layer(&mut self, id: LayerId) {
        let Some(index) = self.index_of(id) else { return };
        let was_active = self.active == Some(id);
        self.layers.remove(index);

        if !was_active {
            return;
        }
        let fallback = self
            .layers
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|i| self.layers.get(i)));
        self.active = fallback.map(|l| l.id);
    }

    /// No-op when the id is unknown.
    pub fn set_active(&mut self, id: LayerId) {
        if self.layer(id).is_some() {
            self.active = Some(id);
        }
    }

    pub fn set_visibility(&mut self, id: LayerId, visible: bool) {
        if let Some(layer) = self.layer_mut(id) {
            layer.visible = visible;
        }
    }

    pub fn toggle_visibility(&mut self, id: LayerId) {
        if let Some(layer) = self.layer_mut(id) {
            layer.visible = !layer.visible;
        }
    }

    /// Opacity is clamped to [0, 1].
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        if let Some(layer) = self.layer_mut(id) {
            layer.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Stable move by index; out-of-range indices are ignored.
    pub fn move_layer(&mut self, from: usize, to: usize) {
        if from >= self.layers.len() || to > self.layers.len() {
            return;
        }
        let entry = self.layers.remove(from);
        let to = to.min(self.layers.len());
        self.layers.insert(to, entry);
    }

    /// Reposition `source` to sit immediately above `target` in paint order.
    /// No-op when either id is missing or they are equal.
    pub fn move_above(&mut self, source: LayerId, target: LayerId) {
        let (Some(from), Some(to)) = (self.index_of(source), self.index_of(target)) else {
            return;
        };
        if from == to {
            return;
        }
        let target_after_removal = if from < to { to - 1 } else { to };
        self.move_layer(from, target_after_removal + 1);
    }

    /// Drop everything.  Used only while replaying a history snapshot.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.active = None;
    }

    /// Back-to-front node order, for syncing the scene's paint order.
    pub fn node_order(&self) -> Vec<NodeId> {
        self.layers.iter().map(|l| l.node).collect()
    }
}
