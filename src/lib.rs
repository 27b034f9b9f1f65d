//! layerbench — selection and compositing engine for a raster image editor.
//!
//! The crate is the headless core of a layer-based editor: geometric
//! selections with Boolean combination, mask rasterization against layer
//! bitmaps, an ordered layer stack over a display-object arena, snapshot
//! undo/redo, pointer-driven selection/crop/move tools, and raster/SVG
//! export.  No rendering surface is included; hosts drive an [`Editor`]
//! and draw the scene themselves.
//!
//! ```no_run
//! use layerbench::{Editor, SelectionShape};
//!
//! let mut editor = Editor::new();
//! let layer = editor.load_image_bytes(&std::fs::read("photo.png")?, "photo")?;
//! editor.selection.set_draft(Some(SelectionShape::Rect {
//!     x: 10.0, y: 10.0, width: 200.0, height: 150.0,
//! }));
//! editor.selection.commit(None);
//! editor.cut_selection();
//! editor.undo();
//! # let _ = layer;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clipboard;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod io;
pub mod layers;
pub mod logger;
pub mod mask;
pub mod scene;
pub mod selection;
pub mod tools;

pub use editor::{Editor, LayerExport, LayerTransform, SuppressScope, TransformPatch};
pub use error::EditorError;
pub use geometry::{Bounds, Point};
pub use io::ExportFormat;
pub use layers::{Layer, LayerEngine, LayerId};
pub use scene::{NodeId, Scene, SceneNode};
pub use selection::{SelectionEngine, SelectionMode, SelectionShape};
pub use tools::{
    CropTool, MoveTool, PointerEvent, SelectionSubTool, SelectionTool, Tool,
};
