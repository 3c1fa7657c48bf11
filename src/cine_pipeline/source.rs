//! Read-only access to a cine file on disk.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::cine_pipeline::common::{ConversionError, Result};

/// A memory-mapped cine file. The mapping is released when this is dropped.
pub struct CineSource {
    path: PathBuf,
    map: Mmap,
}

impl CineSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let read_error =
            |e: std::io::Error| ConversionError::InputReadError(format!("{}: {}", path.display(), e));

        let file = File::open(path).map_err(read_error)?;
        let len = file.metadata().map_err(read_error)?.len();
        if len == 0 {
            return Err(ConversionError::NotACineFile(format!(
                "{} is empty",
                path.display()
            )));
        }

        // SAFETY: the mapping is read-only and lives no longer than `self`.
        // Truncating the file while it is mapped is outside what we support.
        let map = unsafe { MmapOptions::new().map(&file) }.map_err(read_error)?;

        #[cfg(unix)]
        if let Err(e) = map.advise(memmap2::Advice::Sequential) {
            debug!(error = %e, "madvise failed");
        }

        debug!(path = %path.display(), len, "Mapped input file");
        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for CineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CineSource")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_maps_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"CI\x2c\x00").unwrap();
        file.flush().unwrap();

        let source = CineSource::open(file.path()).unwrap();
        assert_eq!(source.bytes(), b"CI\x2c\x00");
        assert_eq!(source.len(), 4);
        assert_eq!(source.path(), file.path());
    }

    #[test]
    fn test_empty_file_is_not_a_cine() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            CineSource::open(file.path()),
            Err(ConversionError::NotACineFile(_))
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CineSource::open(dir.path().join("absent.cine")),
            Err(ConversionError::InputReadError(_))
        ));
    }
}
