use std::path::PathBuf;

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> std::io::Result<()>;
    fn list(&self) -> Vec<String>;
}

#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &str) -> std::io::Result<Self> {
        let path = PathBuf::from(storage_dir);
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.base_dir.join(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.base_dir.join(ident);
        let temp_path = self.base_dir.join(format!("{ident}.tmp"));

        std::fs::write(&temp_path, data)?;

        std::fs::rename(&temp_path, &path)
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.base_dir.join(ident))
    }

    fn list(&self) -> Vec<String> {
        std::fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path().to_str().unwrap()).unwrap();

        store.write("data.bin", b"hello").unwrap();
        assert!(store.exists("data.bin"));
        assert_eq!(store.read("data.bin").unwrap(), b"hello");
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path().to_str().unwrap()).unwrap();

        store.write("data.bin", b"first").unwrap();
        store.write("data.bin", b"second").unwrap();
        assert_eq!(store.read("data.bin").unwrap(), b"second");

        // no temp file left behind
        assert!(!store.exists("data.bin.tmp"));
    }

    #[test]
    fn test_list_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path().to_str().unwrap()).unwrap();

        store.write("a.txt", b"a").unwrap();
        store.write("b.txt", b"b").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let mut names = store.list();
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path().to_str().unwrap()).unwrap();

        store.write("gone.txt", b"x").unwrap();
        store.delete("gone.txt").unwrap();
        assert!(!store.exists("gone.txt"));
    }
}
