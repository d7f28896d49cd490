//! Flat byte storage underneath the block cache
//!
//! The cache only ever needs positioned reads and writes over a single
//! region plus its length, so that is all the trait exposes. `FileStorage`
//! is the hosted implementation; tests substitute in-memory mocks.

use crate::error::ZError;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub trait Storage {
    /// Fill `buf` from `offset`. Returns the number of bytes actually read,
    /// which is short only at end of storage.
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, ZError>;

    /// Write all of `data` at `offset`
    fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), ZError>;

    /// Size of the underlying region in bytes
    fn size(&mut self) -> Result<u32, ZError>;
}

/// Story storage backed by a file opened read/write
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    path: PathBuf,
    /// The file is a scratch copy and is deleted when storage is dropped
    scratch: bool,
}

impl FileStorage {
    /// Open `path` for reading and writing. Failure is fatal to the session.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ZError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ZError::StoryOpen {
                path: path.display().to_string(),
                reason: describe_open_error(&e),
            })?;
        debug!("Opened story storage {}", path.display());
        Ok(FileStorage {
            file,
            path,
            scratch: false,
        })
    }

    /// Copy `story` to `scratch` and open the copy, so cache write-backs never
    /// touch the original story file.
    pub fn working_copy(story: impl AsRef<Path>, scratch: impl AsRef<Path>) -> Result<Self, ZError> {
        let story = story.as_ref();
        let scratch = scratch.as_ref();
        let copied = fs::copy(story, scratch).map_err(|e| ZError::StoryOpen {
            path: story.display().to_string(),
            reason: describe_open_error(&e),
        })?;
        info!(
            "Copied {} bytes from {} to working file {}",
            copied,
            story.display(),
            scratch.display()
        );
        let mut storage = FileStorage::open(scratch)?;
        storage.scratch = true;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, ZError> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<(), ZError> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn size(&mut self) -> Result<u32, ZError> {
        let len = self.file.metadata()?.len();
        u32::try_from(len).map_err(|_| ZError::Storage(format!("story too large: {} bytes", len)))
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if !self.scratch {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed working file {}", self.path.display()),
            Err(e) => warn!("Could not remove working file {}: {}", self.path.display(), e),
        }
    }
}

fn describe_open_error(e: &std::io::Error) -> String {
    match e.kind() {
        ErrorKind::NotFound => "file not found".to_string(),
        ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("azip-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        let result = FileStorage::open(scratch_path("does-not-exist.z3"));
        assert!(matches!(result, Err(ZError::StoryOpen { .. })));
    }

    #[test]
    fn test_working_copy_leaves_story_untouched() {
        let story = scratch_path("story.z3");
        let scratch = scratch_path("story.dat");
        fs::write(&story, [1u8, 2, 3, 4]).unwrap();

        let mut storage = FileStorage::working_copy(&story, &scratch).unwrap();
        assert_eq!(storage.size().unwrap(), 4);
        storage.write_at(1, &[9, 9]).unwrap();

        let mut buf = [0u8; 8];
        let n = storage.read_at(0, &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[1, 9, 9, 4]);
        assert_eq!(fs::read(&story).unwrap(), vec![1, 2, 3, 4]);

        drop(storage);
        assert!(!scratch.exists());
        let _ = fs::remove_file(&story);
    }

    #[test]
    fn test_dropping_opened_story_keeps_file() {
        let story = scratch_path("kept.z3");
        fs::write(&story, [1u8, 2]).unwrap();

        drop(FileStorage::open(&story).unwrap());
        assert!(story.exists());
        let _ = fs::remove_file(&story);
    }
}
