use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A single position in a source file (1-indexed line and column)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePos {
    /// File the position belongs to
    pub file: Arc<str>,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, tabs expanded)
    pub column: usize,
}

impl SourcePos {
    /// Creates a new position
    pub fn new(file: Arc<str>, line: usize, column: usize) -> Self {
        SourcePos { file, line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A range of source text, used only for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    /// First character of the range
    pub from: SourcePos,
    /// Position just past the last character of the range
    pub to: SourcePos,
}

impl SourceSpan {
    /// Creates a span between two positions
    pub fn new(from: SourcePos, to: SourcePos) -> Self {
        SourceSpan { from, to }
    }

    /// Span covering `self` through the end of `other`
    pub fn to(&self, other: &SourceSpan) -> SourceSpan {
        SourceSpan {
            from: self.from.clone(),
            to: other.to.clone(),
        }
    }

    /// File the span belongs to
    pub fn file(&self) -> &str {
        &self.from.file
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.from.line == self.to.line {
            write!(
                f,
                "{}:{}:{}-{}",
                self.from.file, self.from.line, self.from.column, self.to.column
            )
        } else {
            write!(
                f,
                "{}:{}:{}-{}:{}",
                self.from.file, self.from.line, self.from.column, self.to.line, self.to.column
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> SourcePos {
        SourcePos::new(Arc::from("test.patch"), line, column)
    }

    #[test]
    fn test_single_line_display() {
        let span = SourceSpan::new(pos(3, 5), pos(3, 9));
        assert_eq!(span.to_string(), "test.patch:3:5-9");
    }

    #[test]
    fn test_multi_line_display() {
        let span = SourceSpan::new(pos(1, 2), pos(4, 1));
        assert_eq!(span.to_string(), "test.patch:1:2-4:1");
    }

    #[test]
    fn test_join() {
        let a = SourceSpan::new(pos(1, 1), pos(1, 3));
        let b = SourceSpan::new(pos(2, 4), pos(2, 8));
        let joined = a.to(&b);
        assert_eq!(joined.from, pos(1, 1));
        assert_eq!(joined.to, pos(2, 8));
    }
}
