//! Error taxonomy.  Only resource and restore failures are errors; no-op
//! conditions (no active layer, no selection, degenerate geometry, empty
//! Boolean results) are silently ignored by design, and nothing here is
//! fatal to the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("bitmap allocation failed for {width}x{height}")]
    Allocation { width: u32, height: u32 },

    #[error("history snapshot is corrupted: {0}")]
    Restore(String),
}
