use miette::SourceSpan;

/// Position relative to start of source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Idx(pub u32);

/// Holds a view into a source line or file.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct Span {
    start: Idx,
    len: u16,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Span {
            start: Idx(start as u32),
            len: len as u16,
        }
    }

    pub fn start(&self) -> usize {
        self.start.0 as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        let start = self.start();
        start..start + self.len()
    }

    /// Span covering both `self` and `other`.
    pub fn join(&self, other: Span) -> Span {
        let start = self.start().min(other.start());
        let end = self.as_range().end.max(other.as_range().end);
        Span::new(start, end - start)
    }

    pub fn offset(&self, by: usize) -> Span {
        Span::new(self.start() + by, self.len())
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::from(value.as_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_spans() {
        let a = Span::new(4, 2);
        let b = Span::new(9, 3);
        assert_eq!(a.join(b), Span::new(4, 8));
        assert_eq!(b.join(a).as_range(), 4..12);
    }
}
