//! A search for the `-->` comment terminator.

use crate::parser::SpanSearch;

/// Locates the end of a comment across chunk boundaries.
///
/// The only state is how many of the terminator's dashes were already seen at
/// the end of the previous chunk.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct CommentSearch {
    /// Trailing dashes of the previously fed data, saturated at 2.
    dashes: u8,
}

impl SpanSearch for CommentSearch {
    fn feed(&mut self, bytes: &[u8]) -> Option<usize> {
        for i in memchr::memchr_iter(b'>', bytes) {
            if i >= 2 {
                if bytes[i - 2..i] == *b"--" {
                    return Some(i + 1);
                }
            } else if self.dashes as usize >= 2 - i && bytes[..i].iter().all(|&b| b == b'-') {
                // Dashes carried over from the previous chunk complete `-->`
                return Some(i + 1);
            }
        }
        let trailing = bytes.iter().rev().take_while(|&&b| b == b'-').count();
        self.dashes = if trailing == bytes.len() {
            (self.dashes as usize + trailing).min(2) as u8
        } else {
            trailing.min(2) as u8
        };
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Returns `Ok(position)` past the terminator or `Err(dashes)` with the
    /// carried state when the terminator was not found.
    fn feed(state: u8, bytes: &[u8]) -> Result<usize, u8> {
        let mut search = CommentSearch { dashes: state };
        match search.feed(bytes) {
            Some(i) => Ok(i),
            None => Err(search.dashes),
        }
    }

    #[test]
    fn whole_chunk() {
        assert_eq!(feed(0, b"no dashes here"), Err(0));
        assert_eq!(feed(0, b"c-->t"), Ok(4));
        assert_eq!(feed(0, b"-->"), Ok(3));
        assert_eq!(feed(0, b"with > and -> and -->"), Ok(21));
    }

    #[test]
    fn carried_state() {
        assert_eq!(feed(0, b"-"), Err(1));
        assert_eq!(feed(1, b"-"), Err(2));
        assert_eq!(feed(2, b"-"), Err(2));
        assert_eq!(feed(2, b">"), Ok(1));
        assert_eq!(feed(1, b"->"), Ok(2));
        assert_eq!(feed(1, b">"), Err(0));
        assert_eq!(feed(0, b"--"), Err(2));
        assert_eq!(feed(2, b"x>"), Err(0));
    }

    #[test]
    fn split_terminator() {
        let mut search = CommentSearch::default();
        assert_eq!(search.feed(b"comment -"), None);
        assert_eq!(search.feed(b"- more"), None);
        assert_eq!(search.feed(b"--"), None);
        assert_eq!(search.feed(b">after"), Some(1));
    }
}
