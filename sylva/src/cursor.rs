/// A 0-based row/column position in source text.
///
/// Columns count bytes, not characters, so a point can always be turned back
/// into a byte offset without decoding the line.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// 0-based line number.
    pub row: usize,
    /// 0-based byte offset within the line.
    pub column: usize,
}

impl Point {
    /// Creates a new `Point`.
    #[inline]
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.row, self.column)
    }
}

/// A half-open source range: `[start, end)` in row/column coordinates.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: Point,
    pub end: Point,
}

impl Span {
    /// Creates a new `Span`.
    #[inline]
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Merge with another span by covering both.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Is this span empty (start == end)?
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the inclusive row range spanned by this `Span`.
    #[inline]
    pub fn row_range(&self) -> (usize, usize) {
        (self.start.row, self.end.row)
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Maps byte offsets of one input to [`Point`]s.
///
/// Trees store byte extents only; the index is built on demand from the same
/// bytes that were parsed.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(input: &[u8]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            input
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: input.len(),
        }
    }

    /// Point of `byte`; offsets past the end clamp to the end of input.
    pub fn point(&self, byte: usize) -> Point {
        let byte = byte.min(self.len);
        let row = match self.line_starts.binary_search(&byte) {
            Ok(row) => row,
            Err(next) => next - 1,
        };
        Point::new(row, byte - self.line_starts[row])
    }

    pub fn span(&self, range: std::ops::Range<usize>) -> Span {
        Span::new(self.point(range.start), self.point(range.end))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Byte cursor handed to an [`ExternalScanner`](crate::ExternalScanner).
///
/// The cursor records the furthest byte it was asked about. That extent
/// becomes the token's lookahead, so the incremental engine knows which edits
/// can change the scanner's answer.
#[derive(Debug)]
pub struct ScanCursor<'a> {
    input: &'a [u8],
    start: usize,
    pos: usize,
    end: Option<usize>,
    examined: usize,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(input: &'a [u8], start: usize) -> Self {
        Self {
            input,
            start,
            pos: start,
            end: None,
            examined: start,
        }
    }

    /// The byte under the cursor, or `None` at end of input.
    pub fn lookahead(&mut self) -> Option<u8> {
        self.examined = self.examined.max(self.pos + 1);
        self.input.get(self.pos).copied()
    }

    /// Consumes the byte under the cursor.
    pub fn advance(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
        self.examined = self.examined.max(self.pos);
    }

    /// Fixes the token end at the current position. Without a mark the token
    /// ends wherever the cursor stands when the scanner returns.
    pub fn mark_end(&mut self) {
        self.end = Some(self.pos);
    }

    pub fn is_eof(&mut self) -> bool {
        self.examined = self.examined.max(self.pos + 1);
        self.pos >= self.input.len()
    }

    /// Absolute byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes consumed since the token start.
    pub fn consumed(&self) -> &'a [u8] {
        &self.input[self.start..self.pos]
    }

    pub(crate) fn token_end(&self) -> usize {
        self.end.unwrap_or(self.pos)
    }

    pub(crate) fn examined_end(&self) -> usize {
        self.examined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_follow_newlines() {
        let index = LineIndex::new(b"ab\ncd\n\nx");
        assert_eq!(index.point(0), Point::new(0, 0));
        assert_eq!(index.point(2), Point::new(0, 2));
        assert_eq!(index.point(3), Point::new(1, 0));
        assert_eq!(index.point(6), Point::new(2, 0));
        assert_eq!(index.point(7), Point::new(3, 0));
        assert_eq!(index.point(100), Point::new(3, 1));
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.span(1..4).to_string(), "[0, 1] - [1, 1]");
    }

    #[test]
    fn span_merge() {
        let a = Span::new(Point::new(0, 3), Point::new(1, 0));
        let b = Span::new(Point::new(0, 1), Point::new(0, 5));
        let m = a.merge(&b);
        assert_eq!(m.start, Point::new(0, 1));
        assert_eq!(m.end, Point::new(1, 0));
        assert!(!m.is_empty());
        assert_eq!(m.row_range(), (0, 1));
    }

    #[test]
    fn scan_cursor_tracks_examined_bytes() {
        let input = b"<<EOF";
        let mut cursor = ScanCursor::new(input, 0);
        assert_eq!(cursor.lookahead(), Some(b'<'));
        cursor.advance();
        cursor.advance();
        cursor.mark_end();
        assert_eq!(cursor.lookahead(), Some(b'E'));
        assert_eq!(cursor.token_end(), 2);
        assert_eq!(cursor.examined_end(), 3);
        assert_eq!(cursor.consumed(), b"<<");
        for _ in 0..10 {
            cursor.advance();
        }
        assert!(cursor.is_eof());
        assert_eq!(cursor.examined_end(), 6);
    }
}
