//! Source loading for scripts, templates and static assets

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Read access to script, template and static file text.
///
/// Returns `None` for anything missing, unreadable or refused.
pub trait FileSource: Send + Sync {
    fn read_file(&self, path: &str) -> Option<String>;

    /// Raw contents, for static assets that need not be UTF-8.
    fn read_bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.read_file(path).map(String::into_bytes)
    }
}

/// Files under a service directory on disk
#[derive(Debug, Clone)]
pub struct ServiceDir {
    root: PathBuf,
}

impl ServiceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ServiceDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request-style path onto the root, refusing `..` segments.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            warn!(path, "refusing path outside service root");
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl FileSource for ServiceDir {
    fn read_file(&self, path: &str) -> Option<String> {
        let full = self.resolve(path)?;
        match fs::read_to_string(&full) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(path = %full.display(), error = %e, "file not readable");
                None
            }
        }
    }

    fn read_bytes(&self, path: &str) -> Option<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full)
            .map_err(|e| debug!(path = %full.display(), error = %e, "file not readable"))
            .ok()
    }
}

/// In-memory file table
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    files: HashMap<String, String>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn with(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }
}

impl FileSource for MemoryFiles {
    fn read_file(&self, path: &str) -> Option<String> {
        if path.split('/').any(|segment| segment == "..") {
            warn!(path, "refusing path outside service root");
            return None;
        }
        self.files
            .get(path)
            .or_else(|| self.files.get(path.trim_start_matches('/')))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_dir_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("home.tpl"), "<p>hi</p>").unwrap();
        let files = ServiceDir::new(dir.path());
        assert_eq!(files.read_file("home.tpl").as_deref(), Some("<p>hi</p>"));
        assert_eq!(files.read_file("/home.tpl").as_deref(), Some("<p>hi</p>"));
    }

    #[test]
    fn test_service_dir_rejects_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("service");
        fs::create_dir(&inner).unwrap();
        fs::write(dir.path().join("secret.txt"), "nope").unwrap();
        let files = ServiceDir::new(&inner);
        assert_eq!(files.read_file("../secret.txt"), None);
        assert_eq!(files.read_file("static/../../secret.txt"), None);
    }

    #[test]
    fn test_read_bytes_keeps_binary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("logo.png"), [0x89u8, 0x50, 0xff]).unwrap();
        let files = ServiceDir::new(dir.path());
        assert_eq!(files.read_bytes("logo.png"), Some(vec![0x89, 0x50, 0xff]));
        assert_eq!(files.read_file("logo.png"), None);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ServiceDir::new(dir.path()).read_file("missing.sc"), None);
    }

    #[test]
    fn test_memory_files() {
        let files = MemoryFiles::new().with("views/a.html", "A");
        assert_eq!(files.read_file("views/a.html").as_deref(), Some("A"));
        assert_eq!(files.read_file("/views/a.html").as_deref(), Some("A"));
        assert_eq!(files.read_file("views/../views/a.html"), None);
        assert_eq!(files.read_file("b.html"), None);
    }
}
