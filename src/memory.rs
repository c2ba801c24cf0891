use std::fmt;
use std::ops::RangeInclusive;

use crate::error::MemoryError;

pub const PAGE_SIZE: usize = 0x10000;
pub const DEFAULT_PAGES: u16 = 16;
/// Bytes shown by `display` when no end offset is given.
pub const DISPLAY_LEN: u16 = 0x80;

/// Logical address: a page and an offset within it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Address {
    pub page: u16,
    pub offset: u16,
}

impl Address {
    pub fn new(page: u16, offset: u16) -> Self {
        Self { page, offset }
    }

    pub fn physical(&self) -> usize {
        self.page as usize * PAGE_SIZE + self.offset as usize
    }

    /// Offset `by` bytes further along, wrapping within the page.
    pub fn wrapping_add(&self, by: u16) -> Self {
        Self::new(self.page, self.offset.wrapping_add(by))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.page, self.offset)
    }
}

/// Paged byte store, allocated in full up front.
pub struct Memory {
    bytes: Vec<u8>,
    pages: u16,
}

impl Memory {
    pub fn new(pages: u16) -> Self {
        Self {
            bytes: vec![0; pages as usize * PAGE_SIZE],
            pages,
        }
    }

    pub fn pages(&self) -> u16 {
        self.pages
    }

    fn check(&self, address: Address, len: usize) -> Result<usize, MemoryError> {
        if address.page >= self.pages || address.offset as usize + len > PAGE_SIZE {
            return Err(MemoryError::OutOfRange { address, len });
        }
        Ok(address.physical())
    }

    pub fn peek(&self, address: Address) -> Result<u8, MemoryError> {
        let index = self.check(address, 1)?;
        Ok(self.bytes[index])
    }

    pub fn poke(&mut self, address: Address, value: u8) -> Result<(), MemoryError> {
        let index = self.check(address, 1)?;
        self.bytes[index] = value;
        Ok(())
    }

    /// Write `values` starting at `address`. Nothing is written unless all of it fits in the page.
    pub fn poke_bytes(&mut self, address: Address, values: &[u8]) -> Result<(), MemoryError> {
        let index = self.check(address, values.len())?;
        self.bytes[index..index + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Little-endian word. The second byte wraps to the start of the page.
    pub fn read_word(&self, address: Address) -> Result<u16, MemoryError> {
        let low = self.peek(address)?;
        let high = self.peek(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([low, high]))
    }

    pub fn write_word(&mut self, address: Address, value: u16) -> Result<(), MemoryError> {
        let [low, high] = value.to_le_bytes();
        self.poke(address, low)?;
        self.poke(address.wrapping_add(1), high)
    }

    /// Inclusive range of offsets within one page.
    pub fn range(&self, start: Address, end: u16) -> Result<&[u8], MemoryError> {
        let range = self.resolve(start, end)?;
        Ok(&self.bytes[range])
    }

    /// Up to `len` bytes from `start`, stopping at the end of the page.
    pub fn page_tail(&self, start: Address, len: usize) -> Result<&[u8], MemoryError> {
        let index = self.check(start, 0)?;
        let len = len.min(PAGE_SIZE - start.offset as usize);
        Ok(&self.bytes[index..index + len])
    }

    /// Clamp a display range: the end defaults to [`DISPLAY_LEN`] bytes on and never leaves the
    /// page.
    pub fn display_range(start: Address, end: Option<u16>) -> Result<(Address, u16), MemoryError> {
        let end = match end {
            Some(end) => end,
            None => start.offset.saturating_add(DISPLAY_LEN - 1),
        };
        if end < start.offset {
            return Err(MemoryError::InvalidRange {
                start: start.offset,
                end,
            });
        }
        Ok((start, end))
    }

    /// Physical span of `len` bytes, which may cross pages.
    pub fn span(&self, start: Address, len: usize) -> Result<&[u8], MemoryError> {
        let index = self.span_check(start, len)?;
        Ok(&self.bytes[index..index + len])
    }

    pub fn span_mut(&mut self, start: Address, len: usize) -> Result<&mut [u8], MemoryError> {
        let index = self.span_check(start, len)?;
        Ok(&mut self.bytes[index..index + len])
    }

    fn span_check(&self, start: Address, len: usize) -> Result<usize, MemoryError> {
        let index = start.physical();
        if start.page >= self.pages || index + len > self.bytes.len() {
            return Err(MemoryError::OutOfRange {
                address: start,
                len,
            });
        }
        Ok(index)
    }

    fn resolve(&self, start: Address, end: u16) -> Result<RangeInclusive<usize>, MemoryError> {
        if end < start.offset {
            return Err(MemoryError::InvalidRange {
                start: start.offset,
                end,
            });
        }
        let index = self.check(start, (end - start.offset) as usize + 1)?;
        Ok(index..=index + (end - start.offset) as usize)
    }

    /// Fill an inclusive range by cycling `pattern`. An empty pattern fills with zero.
    pub fn fill(&mut self, start: Address, end: u16, pattern: &[u8]) -> Result<(), MemoryError> {
        let range = self.resolve(start, end)?;
        let pattern = if pattern.is_empty() { &[0][..] } else { pattern };
        for (byte, value) in self.bytes[range].iter_mut().zip(pattern.iter().cycle()) {
            *byte = *value;
        }
        Ok(())
    }

    /// Offsets from `start` to the end of its page where `pattern` begins.
    pub fn search(&self, start: Address, pattern: &[u8]) -> Result<Vec<u16>, MemoryError> {
        let haystack = self.page_tail(start, PAGE_SIZE)?;
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        Ok(haystack
            .windows(pattern.len())
            .enumerate()
            .filter(|(_, window)| *window == pattern)
            .map(|(i, _)| start.offset + i as u16)
            .collect())
    }

    /// Every differing byte between `start..=end` and the same length at `other`.
    ///
    /// Yields `(offset in first range, first value, second value)`.
    pub fn compare(
        &self,
        start: Address,
        end: u16,
        other: Address,
    ) -> Result<Vec<(u16, u8, u8)>, MemoryError> {
        let first = self.range(start, end)?;
        let second = self.range(other, other_end(other, start, end)?)?;
        Ok(first
            .iter()
            .zip(second)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, (a, b))| (start.offset + i as u16, *a, *b))
            .collect())
    }

    /// Copy `start..=end` to `dest`. Refused when the two ranges share any byte.
    pub fn move_range(&mut self, start: Address, end: u16, dest: Address) -> Result<(), MemoryError> {
        let source = self.resolve(start, end)?;
        let dest_end = other_end(dest, start, end)?;
        let target = self.resolve(dest, dest_end)?;
        if source.start() <= target.end() && target.start() <= source.end() {
            return Err(MemoryError::Overlap {
                source: (start, end),
                dest,
            });
        }
        self.bytes.copy_within(source, *target.start());
        Ok(())
    }
}

/// End offset of a range at `other` as long as `start..=end`.
fn other_end(other: Address, start: Address, end: u16) -> Result<u16, MemoryError> {
    let len = end.checked_sub(start.offset).ok_or(MemoryError::InvalidRange {
        start: start.offset,
        end,
    })?;
    other.offset.checked_add(len).ok_or(MemoryError::OutOfRange {
        address: other,
        len: len as usize + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(offset: u16) -> Address {
        Address::new(0, offset)
    }

    #[test]
    fn peek_poke_bounds() {
        let mut memory = Memory::new(2);
        memory.poke(Address::new(1, 0xFFFF), 0xAB).unwrap();
        assert_eq!(memory.peek(Address::new(1, 0xFFFF)), Ok(0xAB));
        assert_eq!(memory.peek(Address::new(0, 0xFFFF)), Ok(0));
        assert!(matches!(
            memory.poke(Address::new(2, 0), 1),
            Err(MemoryError::OutOfRange { .. })
        ));
        assert_eq!(Address::new(1, 0x10).physical(), 0x10010);
    }

    #[test]
    fn words_are_little_endian_and_wrap() {
        let mut memory = Memory::new(1);
        memory.write_word(at(0x200), 0x1234).unwrap();
        assert_eq!(memory.peek(at(0x200)), Ok(0x34));
        assert_eq!(memory.peek(at(0x201)), Ok(0x12));
        memory.write_word(at(0xFFFF), 0xBEEF).unwrap();
        assert_eq!(memory.peek(at(0xFFFF)), Ok(0xEF));
        assert_eq!(memory.peek(at(0x0000)), Ok(0xBE));
        assert_eq!(memory.read_word(at(0xFFFF)), Ok(0xBEEF));
    }

    #[test]
    fn fill_cycles_pattern() {
        let mut memory = Memory::new(1);
        memory.fill(at(0x100), 0x12F, b"BUFFER").unwrap();
        let filled = memory.range(at(0x100), 0x12F).unwrap();
        let expected: Vec<u8> = b"BUFFER".iter().copied().cycle().take(0x30).collect();
        assert_eq!(filled, &expected[..]);
        assert_eq!(memory.peek(at(0x130)), Ok(0));
        assert_eq!(memory.peek(at(0x0FF)), Ok(0));

        memory.fill(at(0x100), 0x12F, &[]).unwrap();
        assert!(memory.range(at(0x100), 0x12F).unwrap().iter().all(|b| *b == 0));

        assert_eq!(
            memory.fill(at(0x200), 0x100, b"x"),
            Err(MemoryError::InvalidRange {
                start: 0x200,
                end: 0x100
            })
        );
    }

    #[test]
    fn search_finds_every_offset() {
        let mut memory = Memory::new(1);
        memory.poke_bytes(at(0x10), b"abcab").unwrap();
        memory.poke_bytes(at(0xFFFE), b"ab").unwrap();
        assert_eq!(memory.search(at(0), b"ab"), Ok(vec![0x10, 0x13, 0xFFFE]));
        assert_eq!(memory.search(at(0x11), b"ab"), Ok(vec![0x13, 0xFFFE]));
        assert_eq!(memory.search(at(0), b"zz"), Ok(vec![]));
    }

    #[test]
    fn compare_reports_differences() {
        let mut memory = Memory::new(1);
        memory.poke_bytes(at(0x100), &[1, 2, 3, 4]).unwrap();
        memory.poke_bytes(at(0x200), &[1, 9, 3, 8]).unwrap();
        assert_eq!(
            memory.compare(at(0x100), 0x103, at(0x200)),
            Ok(vec![(0x101, 2, 9), (0x103, 4, 8)])
        );
    }

    #[test]
    fn move_copies_disjoint_ranges() {
        let mut memory = Memory::new(2);
        memory.poke_bytes(at(0x100), b"hello").unwrap();
        memory.move_range(at(0x100), 0x104, Address::new(1, 0x100)).unwrap();
        assert_eq!(memory.range(Address::new(1, 0x100), 0x104).unwrap(), b"hello");
        memory.move_range(at(0x100), 0x104, at(0x105)).unwrap();
        assert_eq!(memory.range(at(0x105), 0x109).unwrap(), b"hello");
    }

    #[test]
    fn move_refuses_overlap() {
        let mut memory = Memory::new(1);
        memory.fill(at(0x100), 0x2FF, b"0123456789").unwrap();
        let before = memory.range(at(0), 0xFFFF).unwrap().to_vec();

        let result = memory.move_range(at(0x100), 0x2FF, at(0x70));
        assert_eq!(
            result,
            Err(MemoryError::Overlap {
                source: (at(0x100), 0x2FF),
                dest: at(0x70),
            })
        );
        assert_eq!(memory.range(at(0), 0xFFFF).unwrap(), &before[..]);

        assert!(memory.move_range(at(0x100), 0x2FF, at(0x2FF)).is_err());
        assert!(memory.move_range(at(0x100), 0x2FF, at(0x150)).is_err());
        assert!(memory.move_range(at(0x100), 0x2FF, at(0x300)).is_ok());
    }

    #[test]
    fn move_past_page_end_is_out_of_range() {
        let mut memory = Memory::new(1);
        assert!(matches!(
            memory.move_range(at(0x0), 0xFF, at(0xFFF0)),
            Err(MemoryError::OutOfRange { .. })
        ));
    }

    #[test]
    fn display_range_clamps_to_page() {
        assert_eq!(Memory::display_range(at(0x100), None), Ok((at(0x100), 0x17F)));
        assert_eq!(Memory::display_range(at(0xFFF0), None), Ok((at(0xFFF0), 0xFFFF)));
        assert_eq!(Memory::display_range(at(0x100), Some(0x10F)), Ok((at(0x100), 0x10F)));
        assert!(Memory::display_range(at(0x100), Some(0x0FF)).is_err());
    }

    #[test]
    fn spans_cross_pages() {
        let mut memory = Memory::new(2);
        memory.span_mut(Address::new(0, 0xFFFF), 2).unwrap().copy_from_slice(&[7, 8]);
        assert_eq!(memory.peek(Address::new(1, 0)), Ok(8));
        assert!(memory.span(Address::new(1, 0xFFFF), 2).is_err());
    }
}
