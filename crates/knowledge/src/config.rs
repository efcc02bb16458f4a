//! Knowledge store locations inside the workspace.

use std::path::{Path, PathBuf};

/// Get the knowledge directory (`.sift/knowledge`).
pub fn get_knowledge_dir(workspace: &Path) -> PathBuf {
    workspace.join(".sift").join("knowledge")
}

/// Get the SQLite index path.
pub fn get_index_path(workspace: &Path) -> PathBuf {
    get_knowledge_dir(workspace).join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_path_layout() {
        let path = get_index_path(Path::new("/ws"));
        assert_eq!(path, PathBuf::from("/ws/.sift/knowledge/index.sqlite"));
    }
}
