//! A search for the `]]>` CDATA terminator.

use crate::parser::SpanSearch;

/// Locates the end of a CDATA section across chunk boundaries.
///
/// Same shape as [`CommentSearch`], tracking trailing `]` instead of `-`.
///
/// [`CommentSearch`]: crate::parser::CommentSearch
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct CDataSearch {
    /// Trailing brackets of the previously fed data, saturated at 2.
    brackets: u8,
}

impl SpanSearch for CDataSearch {
    fn feed(&mut self, bytes: &[u8]) -> Option<usize> {
        for i in memchr::memchr_iter(b'>', bytes) {
            if i >= 2 {
                if bytes[i - 2..i] == *b"]]" {
                    return Some(i + 1);
                }
            } else if self.brackets as usize >= 2 - i && bytes[..i].iter().all(|&b| b == b']') {
                return Some(i + 1);
            }
        }
        let trailing = bytes.iter().rev().take_while(|&&b| b == b']').count();
        self.brackets = if trailing == bytes.len() {
            (self.brackets as usize + trailing).min(2) as u8
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

    fn feed(state: u8, bytes: &[u8]) -> Result<usize, u8> {
        let mut search = CDataSearch { brackets: state };
        match search.feed(bytes) {
            Some(i) => Ok(i),
            None => Err(search.brackets),
        }
    }

    #[test]
    fn whole_chunk() {
        assert_eq!(feed(0, b"plain data"), Err(0));
        assert_eq!(feed(0, b"data]]>t"), Ok(7));
        // `>` may appear freely inside CDATA
        assert_eq!(feed(0, b"a > b ]] c ]>"), Err(0));
        assert_eq!(feed(0, b"a > b ]]>"), Ok(9));
    }

    #[test]
    fn carried_state() {
        assert_eq!(feed(0, b"]"), Err(1));
        assert_eq!(feed(1, b"]"), Err(2));
        assert_eq!(feed(2, b">"), Ok(1));
        assert_eq!(feed(1, b"]>"), Ok(2));
        assert_eq!(feed(1, b">"), Err(0));
        assert_eq!(feed(2, b"]"), Err(2));
    }

    #[test]
    fn split_terminator() {
        let mut search = CDataSearch::default();
        assert_eq!(search.feed(b"bits ]"), None);
        assert_eq!(search.feed(b"]"), None);
        assert_eq!(search.feed(b">rest"), Some(1));
    }
}
