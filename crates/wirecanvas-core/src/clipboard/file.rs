//! File-backed clipboard for native platforms.

use super::{ClipboardError, ClipboardResult, ClipboardStore};
use std::fs;
use std::path::PathBuf;

/// Clipboard shared between processes through a directory of JSON files.
pub struct FileClipboard {
    base_path: PathBuf,
}

impl FileClipboard {
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> ClipboardResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                ClipboardError::Io(format!("Failed to create clipboard directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Clipboard in the user's data directory.
    ///
    /// On Unix: `~/.local/share/wirecanvas/clipboard/`
    /// On Windows: `%LOCALAPPDATA%\wirecanvas\clipboard\`
    pub fn default_location() -> ClipboardResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| ClipboardError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("wirecanvas").join("clipboard"))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

impl ClipboardStore for FileClipboard {
    fn write(&self, key: &str, data: &str) -> ClipboardResult<()> {
        let path = self.entry_path(key);
        // Readers never see a partial blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .map_err(|e| ClipboardError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| ClipboardError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn read(&self, key: &str) -> ClipboardResult<String> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Err(ClipboardError::Empty);
        }
        fs::read_to_string(&path)
            .map_err(|e| ClipboardError::Io(format!("Failed to read {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let clipboard = FileClipboard::new(dir.path().join("nested")).unwrap();
        assert!(matches!(clipboard.read("blob"), Err(ClipboardError::Empty)));

        clipboard.write("blob", "{}").unwrap();
        assert_eq!(clipboard.read("blob").unwrap(), "{}");
    }

    #[test]
    fn test_shared_between_instances() {
        let dir = tempdir().unwrap();
        let first = FileClipboard::new(dir.path().to_path_buf()).unwrap();
        let second = FileClipboard::new(dir.path().to_path_buf()).unwrap();
        first.write("key/with:chars", "data").unwrap();
        assert_eq!(second.read("key/with:chars").unwrap(), "data");
    }
}
