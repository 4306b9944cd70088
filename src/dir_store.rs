//! Directory-backed blob store: one file per key.

use alloc::{format, vec::Vec};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    error::{FatError, FatResult},
    store::BlobStore,
};

const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(1);

pub struct DirBlobStore {
    root: PathBuf,
}

/// Exclusive claim on one key, held by the existence of `<key>.lock`.
/// A process that dies while holding it leaves the file behind; it has to
/// be removed by hand.
struct KeyLock {
    path: PathBuf,
}

impl KeyLock {
    fn acquire(path: PathBuf) -> FatResult<Self> {
        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(FatError::Io(format!(
                            "timed out waiting for {}",
                            path.display()
                        )));
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("could not release {}: {}", self.path.display(), e);
        }
    }
}

impl DirBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> FatResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!("dir store opened at {}", root.display());
        Ok(Self { root })
    }

    fn path_of(&self, key: &str) -> FatResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.ends_with(TMP_SUFFIX)
            && !key.ends_with(LOCK_SUFFIX)
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(FatError::Io(format!("invalid key: {:?}", key)));
        }
        Ok(self.root.join(key))
    }

    fn read(path: &Path) -> FatResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `bytes` next to `path` and rename over it. The temp file never
    /// outlives a failed attempt.
    fn replace(&self, key: &str, path: &Path, bytes: &[u8]) -> FatResult<()> {
        let tmp = self.root.join(format!("{}{}", key, TMP_SUFFIX));
        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            // rename over the target is the atomic-replace point
            fs::rename(&tmp, path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl BlobStore for DirBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> FatResult<()> {
        let path = self.path_of(key)?;
        self.replace(key, &path, bytes)
    }

    fn get(&self, key: &str) -> FatResult<Option<Vec<u8>>> {
        Self::read(&self.path_of(key)?)
    }

    fn delete(&self, key: &str) -> FatResult<()> {
        match fs::remove_file(self.path_of(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, bytes: &[u8]) -> FatResult<bool> {
        let path = self.path_of(key)?;
        let _lock = KeyLock::acquire(self.root.join(format!("{}{}", key, LOCK_SUFFIX)))?;
        if Self::read(&path)?.as_deref() != expected {
            return Ok(false);
        }
        self.replace(key, &path, bytes)?;
        Ok(true)
    }
}
