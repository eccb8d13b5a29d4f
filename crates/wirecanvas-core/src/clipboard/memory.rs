//! In-memory clipboard.

use super::{ClipboardError, ClipboardResult, ClipboardStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local clipboard for tests and headless use.
#[derive(Default)]
pub struct MemoryClipboard {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardStore for MemoryClipboard {
    fn write(&self, key: &str, data: &str) -> ClipboardResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| ClipboardError::Other(format!("Lock error: {}", e)))?;
        entries.insert(key.to_string(), data.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> ClipboardResult<String> {
        let entries = self
            .entries
            .read()
            .map_err(|e| ClipboardError::Other(format!("Lock error: {}", e)))?;
        entries.get(key).cloned().ok_or(ClipboardError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite() {
        let clipboard = MemoryClipboard::new();
        clipboard.write("k", "one").unwrap();
        clipboard.write("k", "two").unwrap();
        assert_eq!(clipboard.read("k").unwrap(), "two");
        assert!(matches!(clipboard.read("other"), Err(ClipboardError::Empty)));
    }
}
