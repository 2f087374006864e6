use crate::ParseError;
use std::ops::Range;

/// A text change: `[start_byte, old_end_byte)` of the old input was replaced
/// by `[start_byte, new_end_byte)` of the new input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Edit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
}

impl Edit {
    pub const fn new(start_byte: usize, old_end_byte: usize, new_end_byte: usize) -> Self {
        Self {
            start_byte,
            old_end_byte,
            new_end_byte,
        }
    }

    /// Replaces `range` by `new_len` bytes.
    pub const fn replace(range: Range<usize>, new_len: usize) -> Self {
        Self::new(range.start, range.end, range.start + new_len)
    }

    pub const fn insert(at: usize, len: usize) -> Self {
        Self::new(at, at, at + len)
    }

    pub const fn delete(range: Range<usize>) -> Self {
        Self::new(range.start, range.end, range.start)
    }

    /// Applies a replacement to `input`, returning the new input and the edit
    /// that describes it.
    pub fn splice(
        input: &[u8],
        range: Range<usize>,
        text: &[u8],
    ) -> Result<(Vec<u8>, Edit), ParseError> {
        let edit = Self::replace(range.clone(), text.len());
        if range.start > range.end || range.end > input.len() {
            return Err(edit.invalid(input.len(), input.len() + text.len()));
        }
        let mut out = Vec::with_capacity(input.len() - range.len() + text.len());
        out.extend_from_slice(&input[..range.start]);
        out.extend_from_slice(text);
        out.extend_from_slice(&input[range.end..]);
        Ok((out, edit))
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.old_end_byte && self.start_byte == self.new_end_byte
    }

    /// Change in input length.
    pub fn delta(&self) -> isize {
        self.new_end_byte as isize - self.old_end_byte as isize
    }

    /// Checks that the edit turns an input of `old_len` bytes into one of
    /// `new_len` bytes.
    pub(crate) fn validate(&self, old_len: usize, new_len: usize) -> Result<(), ParseError> {
        let fits = self.start_byte <= self.old_end_byte
            && self.start_byte <= self.new_end_byte
            && self.old_end_byte <= old_len
            && self.new_end_byte <= new_len
            && old_len - self.old_end_byte == new_len - self.new_end_byte;
        if fits {
            Ok(())
        } else {
            Err(self.invalid(old_len, new_len))
        }
    }

    fn invalid(&self, old_len: usize, new_len: usize) -> ParseError {
        ParseError::InvalidEdit {
            start: self.start_byte,
            old_end: self.old_end_byte,
            new_end: self.new_end_byte,
            old_len,
            new_len,
        }
    }

    /// Where an old offset lands in the new input. Offsets inside the
    /// removed range collapse to the end of the inserted text.
    pub(crate) fn map_start(&self, old: usize) -> usize {
        if old >= self.old_end_byte {
            old - self.old_end_byte + self.new_end_byte
        } else if old <= self.start_byte {
            old
        } else {
            self.new_end_byte
        }
    }

    /// True when a node at `old_start` whose decisions depended on bytes up
    /// to `old_start + extent` is touched by the edit.
    pub(crate) fn touches(&self, old_start: usize, extent: usize) -> bool {
        self.start_byte < old_start + extent && self.old_end_byte > old_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_builds_input_and_edit() {
        let (out, edit) = Edit::splice(b"(12)", 1..3, b"345").unwrap();
        assert_eq!(out, b"(345)");
        assert_eq!(edit, Edit::new(1, 3, 4));
        assert_eq!(edit.delta(), 1);
        assert!(edit.validate(4, 5).is_ok());
        assert!(matches!(
            Edit::splice(b"ab", 1..5, b""),
            Err(ParseError::InvalidEdit { .. })
        ));
    }

    #[test]
    fn constructors() {
        assert_eq!(Edit::insert(3, 2), Edit::new(3, 3, 5));
        assert_eq!(Edit::delete(2..4), Edit::new(2, 4, 2));
        assert!(Edit::insert(7, 0).is_empty());
        assert!(!Edit::delete(2..4).is_empty());
    }

    #[test]
    fn validate_rejects_misfits() {
        assert!(Edit::new(1, 3, 4).validate(4, 6).is_err());
        assert!(Edit::new(3, 1, 4).validate(4, 6).is_err());
        assert!(Edit::new(1, 9, 2).validate(4, 6).is_err());
        assert!(Edit::new(0, 0, 0).validate(4, 4).is_ok());
    }

    #[test]
    fn offset_mapping() {
        let edit = Edit::new(4, 6, 9);
        assert_eq!(edit.map_start(2), 2);
        assert_eq!(edit.map_start(4), 4);
        assert_eq!(edit.map_start(5), 9);
        assert_eq!(edit.map_start(6), 9);
        assert_eq!(edit.map_start(10), 13);
    }

    #[test]
    fn touch_test_covers_lookahead() {
        let edit = Edit::new(1, 3, 4);
        // `(` at 0..1 looked at nothing past its end.
        assert!(!edit.touches(0, 1));
        // `12` at 1..3 is replaced.
        assert!(edit.touches(1, 3));
        // `)` at 3..4 starts where the removed range ends.
        assert!(!edit.touches(3, 1));
        // A token that read one byte into the edit.
        assert!(edit.touches(0, 2));
    }
}
