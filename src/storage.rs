use std::path::PathBuf;

use crate::eid::Eid;

/// Small-file persistence for the vault's artifacts (config, session, pins).
/// Record rows and blobs have their own backends; this is for everything
/// else that fits in one file.
pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> std::io::Result<()>;
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
        self.base_dir.join(ident).is_file()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        // write-then-rename so a crash never leaves a half-written artifact
        let temp_path = self.base_dir.join(format!("{}-{ident}", Eid::new()));
        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, self.base_dir.join(ident))
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.base_dir.join(ident))
    }
}
