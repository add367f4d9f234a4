//! The element path tracker.
//!
//! The path is the backslash-joined list of currently open element names,
//! e.g. `a\b\c` while inside `<a><b><c>`. The engine keeps one tracker for
//! the document and a fresh shadow tracker for every entity expansion; a
//! shadow tracker that is not empty when its expansion ends exposes a parsed
//! entity that opened a tag it did not close.

use crate::errors::{CapacityError, IllFormedError};

const SEPARATOR: u8 = b'\\';

/// Bounded stack of open element names, stored as one separated byte string.
#[derive(Debug)]
pub(crate) struct PathTracker {
    buf: Vec<u8>,
    cap: usize,
}

impl PathTracker {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            cap,
        }
    }

    /// The current path. Empty exactly when the parser is outside any element.
    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends `\name` (the leading separator is omitted for the root).
    pub(crate) fn push(&mut self, name: &[u8]) -> Result<(), CapacityError> {
        let extra = if self.buf.is_empty() {
            name.len()
        } else {
            name.len() + 1
        };
        if self.buf.len() + extra > self.cap {
            return Err(CapacityError::PathTooLong);
        }
        if !self.buf.is_empty() {
            self.buf.push(SEPARATOR);
        }
        self.buf.extend_from_slice(name);
        Ok(())
    }

    /// Whether the last segment equals `name`.
    pub(crate) fn top_is(&self, name: &[u8]) -> bool {
        if self.buf.is_empty() {
            return false;
        }
        let start = match memchr::memrchr(SEPARATOR, &self.buf) {
            Some(sep) => sep + 1,
            None => 0,
        };
        &self.buf[start..] == name
    }

    /// Removes the last segment, which must equal `name`.
    pub(crate) fn pop(&mut self, name: &[u8]) -> Result<(), IllFormedError> {
        if self.buf.is_empty() {
            return Err(IllFormedError::WrongNesting);
        }
        let start = match memchr::memrchr(SEPARATOR, &self.buf) {
            Some(sep) => sep + 1,
            None => 0,
        };
        if &self.buf[start..] != name {
            return Err(IllFormedError::WrongNesting);
        }
        self.buf.truncate(start.saturating_sub(1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_and_pop() {
        let mut path = PathTracker::with_capacity(32);
        path.push(b"a").unwrap();
        assert_eq!(path.as_bytes(), b"a");
        path.push(b"b").unwrap();
        path.push(b"c").unwrap();
        assert_eq!(path.as_bytes(), b"a\\b\\c");
        path.pop(b"c").unwrap();
        assert_eq!(path.as_bytes(), b"a\\b");
        path.pop(b"b").unwrap();
        path.pop(b"a").unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn mismatch() {
        let mut path = PathTracker::with_capacity(32);
        path.push(b"a").unwrap();
        assert_eq!(path.pop(b"b"), Err(IllFormedError::WrongNesting));
        // The failed pop leaves the path alone
        assert_eq!(path.as_bytes(), b"a");
    }

    #[test]
    fn pop_past_root() {
        let mut path = PathTracker::with_capacity(32);
        assert_eq!(path.pop(b"a"), Err(IllFormedError::WrongNesting));
    }

    #[test]
    fn capacity() {
        let mut path = PathTracker::with_capacity(5);
        path.push(b"ab").unwrap();
        path.push(b"cd").unwrap(); // "ab\cd" is exactly 5 bytes
        assert_eq!(path.push(b"e"), Err(CapacityError::PathTooLong));
        assert_eq!(path.as_bytes(), b"ab\\cd");
    }
}
