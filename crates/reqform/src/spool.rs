//! Backing storage for upload parts.
//!
//! A [`Spool`] buffers an upload in memory until the configured threshold
//! is crossed, then promotes the accumulated bytes to a uniquely named
//! temporary file. The file is deleted when the spool is dropped unless the
//! application [persists][Spool::persist] it first.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::status::Status;

const SPOOL_PREFIX: &str = "reqform-part-";

#[derive(Debug)]
enum Storage {
    Memory(Vec<u8>),
    File(NamedTempFile),
}

/// Bounded in-memory buffer that spills to a temp file.
#[derive(Debug)]
pub struct Spool {
    storage: Storage,
    threshold: u64,
    temp_dir: Option<PathBuf>,
    len: u64,
}

impl Spool {
    pub(crate) fn new(threshold: u64, temp_dir: Option<&Path>) -> Self {
        Self {
            storage: Storage::Memory(Vec::new()),
            threshold,
            temp_dir: temp_dir.map(Path::to_path_buf),
            len: 0,
        }
    }

    /// Append a chunk, promoting to a temp file when the threshold is
    /// crossed.
    pub(crate) fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        let new_len = self.len + chunk.len() as u64;
        if let Storage::Memory(buf) = &mut self.storage {
            if new_len <= self.threshold {
                buf.extend_from_slice(chunk);
                self.len = new_len;
                return Ok(());
            }
            let mut builder = tempfile::Builder::new();
            builder.prefix(SPOOL_PREFIX);
            let mut file = match &self.temp_dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            file.write_all(buf)?;
            debug!(
                spooled = buf.len(),
                path = %file.path().display(),
                "upload spool promoted to disk"
            );
            self.storage = Storage::File(file);
        }
        if let Storage::File(file) = &mut self.storage {
            file.write_all(chunk)?;
        }
        self.len = new_len;
        Ok(())
    }

    /// Total bytes written.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True while the spool is still held in memory.
    #[must_use]
    pub fn in_memory(&self) -> bool {
        matches!(self.storage, Storage::Memory(_))
    }

    /// The buffered bytes, when the spool is in memory.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Memory(buf) => Some(buf),
            Storage::File(_) => None,
        }
    }

    /// Path of the spill file, once the spool has been promoted.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::File(file) => Some(file.path()),
        }
    }

    /// Read the full contents regardless of backing store.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        match &self.storage {
            Storage::Memory(buf) => Ok(buf.clone()),
            Storage::File(file) => {
                let mut out = Vec::with_capacity(self.len as usize);
                file.reopen()?.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    /// Move the contents to `dest`, detaching the temp file from automatic
    /// cleanup. An in-memory spool is written out directly.
    pub fn persist(self, dest: impl AsRef<Path>) -> io::Result<()> {
        match self.storage {
            Storage::Memory(buf) => fs::write(dest, buf),
            Storage::File(file) => {
                file.persist(dest).map_err(|e| e.error)?;
                Ok(())
            }
        }
    }
}

/// A completed or in-progress file upload.
#[derive(Debug)]
pub struct Upload {
    filename: Bytes,
    content_type: Bytes,
    spool: Spool,
    status: Status,
}

impl Upload {
    pub(crate) fn new(filename: Bytes, content_type: Bytes, spool: Spool) -> Self {
        Self {
            filename,
            content_type,
            spool,
            status: Status::Incomplete,
        }
    }

    pub(crate) fn write(&mut self, chunk: &[u8]) -> Status {
        match self.spool.write(chunk) {
            Ok(()) => Status::Ok,
            Err(e) => {
                warn!(error = %e, "upload spool write failed");
                Status::Generic
            }
        }
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Client-supplied filename, verbatim.
    #[must_use]
    pub fn filename(&self) -> &[u8] {
        &self.filename
    }

    /// The part's Content-Type, or empty when the client sent none.
    #[must_use]
    pub fn content_type(&self) -> &[u8] {
        &self.content_type
    }

    /// Upload body size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.spool.len()
    }

    /// Backing store for the upload body.
    #[must_use]
    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    /// `Ok` when the part body was fully received, otherwise the status the
    /// parser held when the part was cut short.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spool_stays_in_memory_below_threshold() {
        let mut s = Spool::new(16, None);
        s.write(b"0123456789").unwrap();
        assert!(s.in_memory());
        assert_eq!(s.len(), 10);
        assert_eq!(s.bytes(), Some(&b"0123456789"[..]));
        assert!(s.path().is_none());
    }

    #[test]
    fn test_spool_promotes_past_threshold() {
        let mut s = Spool::new(8, None);
        s.write(b"01234").unwrap();
        assert!(s.in_memory());
        s.write(b"56789").unwrap();
        assert!(!s.in_memory());
        assert!(s.bytes().is_none());
        assert!(s.path().is_some());
        assert_eq!(s.len(), 10);
        assert_eq!(s.read_to_vec().unwrap(), b"0123456789");
    }

    #[test]
    fn test_spool_file_removed_on_drop() {
        let mut s = Spool::new(0, None);
        s.write(b"data").unwrap();
        let path = s.path().unwrap().to_path_buf();
        assert!(path.exists());
        drop(s);
        assert!(!path.exists());
    }

    #[test]
    fn test_spool_persist() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("kept.bin");

        let mut s = Spool::new(0, Some(dir.path()));
        s.write(b"keep me").unwrap();
        s.persist(&dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
    }

    #[test]
    fn test_upload_tracks_size_and_status() {
        let spool = Spool::new(1024, None);
        let mut up = Upload::new(Bytes::from_static(b"a.txt"), Bytes::from_static(b"text/plain"), spool);
        assert_eq!(up.status(), Status::Incomplete);
        assert_eq!(up.write(b"contents"), Status::Ok);
        up.set_status(Status::Ok);
        assert_eq!(up.size(), 8);
        assert_eq!(up.spool().bytes(), Some(&b"contents"[..]));
        assert_eq!(up.filename(), b"a.txt");
    }
}
