use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use super::traits::{BackendError, InvalidUtf8, KeyValueStore};

const EXTENSION: &str = "json";

/// Directory-backed store: one file per key.
///
/// Each write goes to its own temporary file in the same directory, which is
/// then renamed into place, so a crash or a concurrent write to the same key
/// leaves one complete value. File names are the percent-encoded key. On
/// Unix, files are created with mode `0600`.
///
/// Bytes that are not UTF-8 are reported as [`InvalidUtf8`] instead of being
/// patched up, so the corrupted entry gets discarded upstream.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", urlencoding::encode(key)))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Some(text)),
                Err(e) => Err(InvalidUtf8(e).into()),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), BackendError> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || write_private(&dir, &path, value.as_bytes()))
            .await??;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, BackendError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// `tempfile` creates the file with mode 0600 on Unix; `persist` keeps it.
fn write_private(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Key for a file stem, or `None` if the stem is not one this store wrote.
fn decode_key(stem: &str) -> Option<String> {
    let key = urlencoding::decode(stem).ok()?.into_owned();
    let canonical = urlencoding::encode(&key) == stem;
    canonical.then_some(key)
}
