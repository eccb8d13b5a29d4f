//! Browser `localStorage` clipboard.

use super::{ClipboardError, ClipboardResult, ClipboardStore};

/// Clipboard shared between tabs of the same origin.
#[derive(Default)]
pub struct LocalStorageClipboard;

impl LocalStorageClipboard {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> ClipboardResult<web_sys::Storage> {
        let window = web_sys::window().ok_or_else(|| ClipboardError::Other("No window".to_string()))?;
        window
            .local_storage()
            .map_err(|e| ClipboardError::Other(format!("localStorage unavailable: {:?}", e)))?
            .ok_or_else(|| ClipboardError::Other("localStorage unavailable".to_string()))
    }
}

impl ClipboardStore for LocalStorageClipboard {
    fn write(&self, key: &str, data: &str) -> ClipboardResult<()> {
        Self::storage()?
            .set_item(key, data)
            .map_err(|e| ClipboardError::Io(format!("Failed to write {}: {:?}", key, e)))
    }

    fn read(&self, key: &str) -> ClipboardResult<String> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| ClipboardError::Io(format!("Failed to read {}: {:?}", key, e)))?
            .ok_or(ClipboardError::Empty)
    }
}
