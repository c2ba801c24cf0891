use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::DiskError;
use crate::memory::{Address, Memory};

pub const DEFAULT_SECTOR_SIZE: usize = 512;
pub const DEFAULT_SECTOR_COUNT: usize = 2880;

/// Fixed-size sector store backed by a flat image file.
pub struct VirtualDisk {
    path: PathBuf,
    sector_size: usize,
    sector_count: usize,
    buffer: Vec<u8>,
}

impl VirtualDisk {
    /// Create a zeroed disk. The backing file is not touched until [`Self::load`] or
    /// [`Self::save`].
    pub fn new(path: impl Into<PathBuf>, sector_size: usize, sector_count: usize) -> Self {
        Self {
            path: path.into(),
            sector_size,
            sector_count,
            buffer: vec![0; sector_size * sector_count],
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn sector_count(&self) -> usize {
        self.sector_count
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Replace the buffer with the backing file. A missing or short file leaves the remainder
    /// zeroed; a longer one is truncated.
    pub fn load(&mut self) -> Result<(), DiskError> {
        self.buffer.fill(0);
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error.into()),
        };
        let mut filled = 0;
        while filled < self.buffer.len() {
            match file.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    /// Write the whole buffer to a temporary file beside the image, then rename it over the
    /// image.
    pub fn save(&self) -> Result<(), DiskError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&self.buffer)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }

    fn sectors(&self, first_sector: usize, count: usize) -> Result<std::ops::Range<usize>, DiskError> {
        match first_sector.checked_add(count) {
            Some(end) if end <= self.sector_count => {
                Ok(first_sector * self.sector_size..end * self.sector_size)
            }
            _ => Err(DiskError::OutOfRange {
                first_sector,
                count,
                sector_count: self.sector_count,
            }),
        }
    }

    /// Copy `count` sectors from `first_sector` into memory at `address`.
    pub fn read(
        &self,
        memory: &mut Memory,
        address: Address,
        first_sector: usize,
        count: usize,
    ) -> Result<(), DiskError> {
        let range = self.sectors(first_sector, count)?;
        let target = memory.span_mut(address, range.len())?;
        target.copy_from_slice(&self.buffer[range]);
        Ok(())
    }

    /// Copy `count` sectors from memory at `address` onto the disk at `first_sector`.
    pub fn write(
        &mut self,
        memory: &Memory,
        address: Address,
        first_sector: usize,
        count: usize,
    ) -> Result<(), DiskError> {
        let range = self.sectors(first_sector, count)?;
        let source = memory.span(address, range.len())?;
        self.buffer[range].copy_from_slice(source);
        Ok(())
    }

    /// Raw bytes `start..=end` of the disk.
    pub fn cat(&self, start: usize, end: usize) -> Result<&[u8], DiskError> {
        if start > end || end >= self.buffer.len() {
            return Err(DiskError::BytesOutOfRange {
                start,
                end,
                len: self.buffer.len(),
            });
        }
        Ok(&self.buffer[start..=end])
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn disk_in(dir: &tempfile::TempDir) -> VirtualDisk {
        VirtualDisk::new(dir.path().join("disk.img"), 16, 8)
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut disk = disk_in(&dir);
        let mut memory = Memory::new(1);
        let pattern: Vec<u8> = (0..32).collect();
        memory.poke_bytes(Address::new(0, 0x200), &pattern).unwrap();

        disk.write(&memory, Address::new(0, 0x200), 0, 2).unwrap();
        disk.read(&mut memory, Address::new(0, 0x400), 0, 2).unwrap();

        assert_eq!(
            memory.range(Address::new(0, 0x200), 0x21F).unwrap(),
            memory.range(Address::new(0, 0x400), 0x41F).unwrap()
        );
        assert_eq!(&disk.bytes()[..32], &pattern[..]);
    }

    #[test]
    fn overrun_leaves_disk_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let mut disk = disk_in(&dir);
        let mut memory = Memory::new(1);
        memory.fill(Address::new(0, 0), 0xFF, b"x").unwrap();
        let before = disk.bytes().to_vec();

        let result = disk.write(&memory, Address::new(0, 0), 7, 2);
        assert!(matches!(
            result,
            Err(DiskError::OutOfRange {
                first_sector: 7,
                count: 2,
                sector_count: 8
            })
        ));
        assert_eq!(disk.bytes(), &before[..]);

        assert!(matches!(
            disk.read(&mut memory, Address::new(0, 0), 0, 9),
            Err(DiskError::OutOfRange { .. })
        ));
        assert!(matches!(
            disk.write(&memory, Address::new(1, 0), 0, 1),
            Err(DiskError::Memory(_))
        ));
        assert_eq!(disk.bytes(), &before[..]);
    }

    #[test]
    fn load_zero_fills_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut disk = disk_in(&dir);
        disk.load().unwrap();
        assert!(disk.bytes().iter().all(|b| *b == 0));

        fs::write(disk.path(), b"short").unwrap();
        disk.load().unwrap();
        let first = disk.bytes().to_vec();
        disk.load().unwrap();
        assert_eq!(disk.bytes(), &first[..]);
        assert_eq!(&first[..5], b"short");
        assert!(first[5..].iter().all(|b| *b == 0));
        assert_eq!(first.len(), 128);
    }

    #[test]
    fn load_truncates_long_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut disk = disk_in(&dir);
        fs::write(disk.path(), vec![0xAA; 200]).unwrap();
        disk.load().unwrap();
        assert_eq!(disk.len(), 128);
        assert!(disk.bytes().iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn save_writes_whole_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut disk = disk_in(&dir);
        let mut memory = Memory::new(1);
        memory.poke_bytes(Address::new(0, 0), b"sector zero").unwrap();
        disk.write(&memory, Address::new(0, 0), 0, 1).unwrap();
        disk.save().unwrap();

        let saved = fs::read(disk.path()).unwrap();
        assert_eq!(saved.len(), 128);
        assert_eq!(&saved[..11], b"sector zero");

        let mut reloaded = disk_in(&dir);
        reloaded.load().unwrap();
        assert_eq!(reloaded.bytes(), disk.bytes());
    }

    #[test]
    fn cat_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let disk = disk_in(&dir);
        assert_eq!(disk.cat(0, 15).unwrap().len(), 16);
        assert!(disk.cat(0, 128).is_err());
        assert!(disk.cat(10, 5).is_err());

        let empty = VirtualDisk::new(dir.path().join("empty.img"), 0, 8);
        assert_eq!(
            empty.cat(0, 0).unwrap_err().to_string(),
            "Bytes 0..=0 out of range: disk has 0 bytes."
        );
    }
}
