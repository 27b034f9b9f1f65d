// ============================================================================
// CLIPBOARD — process-wide single-slot buffer for cut/copy/paste
// ============================================================================

use image::RgbaImage;
use std::sync::Mutex;

/// A cut or copied piece: the masked bitmap plus the placement attributes of
/// the layer it came from, so paste can recreate it faithfully.
#[derive(Clone, Debug)]
pub struct ClipboardPiece {
    pub image: RgbaImage,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
    pub opacity: f32,
}

/// In-app clipboard.  Scoped to the editing session, never persisted; set on
/// copy/cut, read on paste, cleared only explicitly or by the next copy/cut.
static CLIPBOARD: Mutex<Option<ClipboardPiece>> = Mutex::new(None);

pub fn set_piece(piece: ClipboardPiece) {
    *CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()) = Some(piece);
}

/// Retrieve a clone of the current piece.
pub fn get_piece() -> Option<ClipboardPiece> {
    CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

pub fn has_piece() -> bool {
    CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).is_some()
}

pub fn clear() {
    *CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Tests touching the process-wide slot serialize on this lock so parallel
/// test threads cannot interleave set/clear calls.
#[cfg(test)]
pub(crate) static TEST_LOCK: Mutex<()> = Mutex::new(());
