//! File-backed device collaborator.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fscope_engine::MetaDevice;

use crate::Ext2Error;

/// An open image file or block device. Opened read/write when permissions
/// allow, read-only otherwise; the change-safety gate decides whether write
/// commands may run at all, independently of the open mode.
#[derive(Debug)]
pub struct Device {
    path: PathBuf,
    file: File,
    offset: u64,
    read_only: bool,
    mounted: bool,
}

impl Device {
    pub fn open(path: &Path) -> Result<Device, Ext2Error> {
        let (file, read_only) = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => (file, false),
            Err(rw_err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %rw_err,
                    "read/write open failed, falling back to read-only"
                );
                let file = File::open(path).map_err(|source| Ext2Error::Open {
                    path: path.display().to_string(),
                    source,
                })?;
                (file, true)
            }
        };

        let mounted = is_mounted(path);
        tracing::debug!(path = %path.display(), read_only, mounted, "opened device");

        Ok(Device {
            path: path.to_path_buf(),
            file,
            offset: 0,
            read_only,
            mounted,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }
}

impl MetaDevice for Device {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn mounted(&self) -> bool {
        self.mounted
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "device is open read-only",
            ));
        }
        tracing::debug!(offset, len = buf.len(), "device write");
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.file.flush()
    }
}

/// Scan the mount table for `path`. A missing or unreadable table (non-Linux
/// hosts, restricted containers) counts as not mounted.
fn is_mounted(path: &Path) -> bool {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let table = match std::fs::read_to_string("/proc/mounts") {
        Ok(table) => table,
        Err(err) => {
            tracing::debug!(error = %err, "mount table unavailable, assuming not mounted");
            return false;
        }
    };
    table
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|source| Path::new(source) == canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn image(len: usize) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![0u8; len]).unwrap();
        (dir, path)
    }

    #[test]
    fn read_write_round_trip_at_offset() {
        let (_dir, path) = image(4096);
        let mut device = Device::open(&path).unwrap();

        device.write_at(1024, b"ext2").unwrap();
        let mut buf = [0u8; 4];
        device.read_at(1024, &mut buf).unwrap();
        assert_eq!(&buf, b"ext2");

        // Bytes around the write are untouched.
        let mut wide = [0u8; 8];
        device.read_at(1022, &mut wide).unwrap();
        assert_eq!(&wide, &[0, 0, b'e', b'x', b't', b'2', 0, 0]);
    }

    #[test]
    fn offset_is_plain_state() {
        let (_dir, path) = image(1024);
        let mut device = Device::open(&path).unwrap();
        assert_eq!(device.offset(), 0);
        device.set_offset(512);
        assert_eq!(device.offset(), 512);
    }

    #[test]
    fn temp_image_is_not_mounted() {
        let (_dir, path) = image(1024);
        let device = Device::open(&path).unwrap();
        assert!(!device.mounted());
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = Device::open(Path::new("/no/such/image")).unwrap_err();
        assert!(err.to_string().contains("/no/such/image"));
    }

    #[test]
    fn short_read_past_the_end_fails() {
        let (_dir, path) = image(100);
        let mut device = Device::open(&path).unwrap();
        let mut buf = [0u8; 64];
        assert!(device.read_at(90, &mut buf).is_err());
    }
}
