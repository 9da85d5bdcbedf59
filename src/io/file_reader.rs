//! Positioned reads against a local slide file.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;
use crate::io::RangeReader;

/// A [`RangeReader`] backed by a local file.
///
/// Reads use `pread` under the hood, so a single handle never carries a seek
/// position and can serve positioned reads without mutation. Cloning shares
/// the underlying descriptor.
#[derive(Debug, Clone)]
pub struct FileRangeReader {
    file: Arc<File>,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open `path` and capture its size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| IoError::Open(format!("{}: {}", path.display(), e)))?;
        let size = file
            .metadata()
            .map_err(|e| IoError::Open(format!("{}: {}", path.display(), e)))?
            .len();
        Ok(Self {
            file: Arc::new(file),
            size,
            identifier: path.display().to_string(),
        })
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            })?;
        if end > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len];
        self.file
            .read_exact_at(&mut buf, offset)
            .map_err(|e| IoError::Read(format!("{}: {}", self.identifier, e)))?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
