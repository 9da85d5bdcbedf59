//! Bounded pool of open slide file handles.
//!
//! Each concurrent painter checks a handle out for the duration of one
//! region paint, so painters never share a handle and the number of open
//! descriptors per slide stays bounded.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use crate::error::IoError;
use crate::io::FileRangeReader;

/// Maximum number of simultaneously open handles per slide.
pub const DEFAULT_POOL_CAPACITY: usize = 32;

struct PoolInner {
    path: PathBuf,
    idle: Mutex<Vec<FileRangeReader>>,
    permits: Arc<Semaphore>,
}

/// A pool of open handles on one slide file.
///
/// `checkout` waits for a permit, then reuses an idle handle or opens a
/// fresh one. Dropping the returned [`PooledHandle`] puts the handle back.
#[derive(Clone)]
pub struct HandlePool {
    inner: Arc<PoolInner>,
}

impl HandlePool {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_capacity(path, DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(path: impl AsRef<Path>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                path: path.as_ref().to_path_buf(),
                idle: Mutex::new(Vec::new()),
                permits: Arc::new(Semaphore::new(capacity)),
            }),
        }
    }

    /// Check a handle out of the pool, opening the file if none is idle.
    pub async fn checkout(&self) -> Result<PooledHandle, IoError> {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| IoError::Open(e.to_string()))?;

        let existing = self.inner.idle.lock().unwrap().pop();
        let reader = match existing {
            Some(reader) => reader,
            None => FileRangeReader::open(&self.inner.path)?,
        };

        Ok(PooledHandle {
            reader: Some(reader),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }
}

/// A checked-out handle. Dropping it returns the handle to the pool.
pub struct PooledHandle {
    reader: Option<FileRangeReader>,
    pool: Arc<PoolInner>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledHandle {
    type Target = FileRangeReader;

    fn deref(&self) -> &FileRangeReader {
        // Only None after drop.
        self.reader.as_ref().unwrap()
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.pool.idle.lock().unwrap().push(reader);
        }
    }
}
