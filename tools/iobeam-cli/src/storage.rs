//! Directory-backed record storage

use iobeam_embedded::{OpenMode, Storage, StorageError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maps each record name to a file under one directory
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

/// Open record handle
#[derive(Debug)]
pub struct DirFile {
    file: File,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !plain {
            warn!("Rejecting record name {:?}", name);
            return Err(StorageError::Io);
        }
        Ok(self.root.join(name))
    }
}

fn map_err(e: io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        _ => {
            debug!("Storage I/O error: {}", e);
            StorageError::Io
        }
    }
}

impl Storage for DirStorage {
    type File = DirFile;

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<DirFile, StorageError> {
        let path = self.path(name)?;
        let file = match mode {
            OpenMode::Read => File::open(&path),
            OpenMode::Write => OpenOptions::new().write(true).truncate(true).open(&path),
            OpenMode::Create => {
                fs::create_dir_all(&self.root).map_err(map_err)?;
                OpenOptions::new().write(true).create(true).truncate(false).open(&path)
            }
        }
        .map_err(map_err)?;
        Ok(DirFile { file })
    }

    fn read(
        &mut self,
        file: &mut DirFile,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        file.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(map_err)?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_err(e)),
            }
        }
        Ok(filled)
    }

    fn write(
        &mut self,
        file: &mut DirFile,
        offset: usize,
        data: &[u8],
    ) -> Result<usize, StorageError> {
        file.file
            .seek(SeekFrom::Start(offset as u64))
            .map_err(map_err)?;
        file.file.write_all(data).map_err(map_err)?;
        file.file.sync_data().map_err(map_err)?;
        Ok(data.len())
    }

    fn close(&mut self, _file: DirFile) {}

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        fs::remove_file(self.path(name)?).map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobeam_embedded::identity::{self, DeviceId};

    #[test]
    fn test_identity_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new(dir.path().join("state"));
        let id = DeviceId::new("0123456789abcdefghij").unwrap();

        assert_eq!(identity::load(&mut storage, "device"), None);
        identity::save(&mut storage, "device", &id).unwrap();
        assert_eq!(identity::load(&mut storage, "device"), Some(id));

        let bytes = fs::read(dir.path().join("state").join("device")).unwrap();
        assert_eq!(&bytes[..8], b"iobeamid");
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn test_rewrite_shorter_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new(dir.path());
        identity::save(&mut storage, "device", &DeviceId::new(&"a".repeat(40)).unwrap()).unwrap();
        let short = DeviceId::new("bbbbbbbbbbbbbbbb").unwrap();
        identity::save(&mut storage, "device", &short).unwrap();

        assert_eq!(identity::load(&mut storage, "device"), Some(short));
        assert_eq!(fs::read(dir.path().join("device")).unwrap().len(), 28);
    }

    #[test]
    fn test_missing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new(dir.path());

        assert_eq!(
            storage.open("nothing", OpenMode::Write).unwrap_err(),
            StorageError::NotFound
        );
        assert_eq!(storage.delete("nothing"), Err(StorageError::NotFound));
        identity::erase(&mut storage, "nothing").unwrap();
    }

    #[test]
    fn test_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = DirStorage::new(dir.path());
        assert_eq!(
            storage.open("../escape", OpenMode::Create).unwrap_err(),
            StorageError::Io
        );
    }
}
