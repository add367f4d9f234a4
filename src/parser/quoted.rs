//! A search for `>` that respects quoted regions.

use crate::parser::SpanSearch;

/// Result of [`QuotedSearch::find_subset_or_close`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OneOf {
    /// A `[` was found at the position: the internal subset begins.
    Open(usize),
    /// A `>` was found at the position: the construct ends here.
    Close(usize),
    /// Neither was found in the chunk.
    None,
}

/// Locates the closing `>` of a tag or declaration, suspending the sentinel
/// inside single- or double-quoted regions.
///
/// A quote region starts and ends with the same quote character; the other
/// quote kind is ordinary content inside it. Quote characters cannot be
/// escaped in XML, so no backslash handling is needed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct QuotedSearch {
    /// The quote character of the region the search is currently inside.
    quote: Option<u8>,
}

impl SpanSearch for QuotedSearch {
    fn feed(&mut self, bytes: &[u8]) -> Option<usize> {
        for i in memchr::memchr3_iter(b'>', b'\'', b'"', bytes) {
            match (self.quote, bytes[i]) {
                (None, b'>') => return Some(i + 1),
                (None, q) => self.quote = Some(q),
                (Some(q), b) if q == b => self.quote = None,
                _ => {}
            }
        }
        None
    }
}

impl QuotedSearch {
    /// Like [`SpanSearch::feed`], but also stops at a `[` outside of quotes.
    /// Used by the DOCTYPE scanner to detect the start of the internal subset.
    pub(crate) fn find_subset_or_close(&mut self, bytes: &[u8]) -> OneOf {
        for (i, &b) in bytes.iter().enumerate() {
            match (self.quote, b) {
                (None, b'[') => return OneOf::Open(i),
                (None, b'>') => return OneOf::Close(i),
                (None, b'\'') | (None, b'"') => self.quote = Some(b),
                (Some(q), _) if q == b => self.quote = None,
                _ => {}
            }
        }
        OneOf::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain() {
        let mut search = QuotedSearch::default();
        assert_eq!(search.feed(b"<a x='1'>rest"), Some(9));
    }

    #[test]
    fn sentinel_inside_quotes() {
        let mut search = QuotedSearch::default();
        assert_eq!(search.feed(b"<a x='>' y=\">\">"), Some(15));
    }

    #[test]
    fn resumes_across_chunks() {
        let mut search = QuotedSearch::default();
        assert_eq!(search.feed(b"<a x='some >"), None);
        assert_eq!(search.feed(b" inside'>tail"), Some(9));
    }

    #[test]
    fn other_quote_is_content() {
        let mut search = QuotedSearch::default();
        assert_eq!(search.feed(b"<a x=\"it's>\">"), Some(13));
    }

    #[test]
    fn subset_or_close() {
        let mut search = QuotedSearch::default();
        assert_eq!(search.find_subset_or_close(b"name ["), OneOf::Open(5));

        let mut search = QuotedSearch::default();
        assert_eq!(search.find_subset_or_close(b"name>"), OneOf::Close(4));

        let mut search = QuotedSearch::default();
        assert_eq!(search.find_subset_or_close(b"n SYSTEM '[x]'"), OneOf::None);
        assert_eq!(search.find_subset_or_close(b">"), OneOf::Close(0));
    }
}
