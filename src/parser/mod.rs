//! Low-level scanning building blocks.
//!
//! Two things live here: the markup classifier, which decides from the first
//! few bytes after a `<` what kind of construct follows, and the resumable
//! span searches that locate the terminator of a construct (`>`, `-->`,
//! `]]>`, `?>`) across arbitrary chunk boundaries. A span search keeps just
//! enough state about the tail of the previously seen bytes to recognize a
//! terminator that is split between two chunks.

use crate::errors::SyntaxError;

mod cdata;
mod comment;
mod pi;
mod quoted;

pub(crate) use cdata::CDataSearch;
pub(crate) use comment::CommentSearch;
pub(crate) use pi::PiSearch;
pub(crate) use quoted::{OneOf, QuotedSearch};

/// A resumable search for the end of one construct.
pub(crate) trait SpanSearch {
    /// Searches the chunk for the construct terminator.
    ///
    /// Returns the position just past the terminator, or `None` when the
    /// terminator was not found yet and more data is required. The search
    /// state carries over to the next call.
    fn feed(&mut self, bytes: &[u8]) -> Option<usize>;
}

/// Runs a span search over the two linear segments of the ring.
pub(crate) fn feed_slices<S: SpanSearch>(search: &mut S, a: &[u8], b: &[u8]) -> Option<usize> {
    if let Some(i) = search.feed(a) {
        return Some(i);
    }
    search.feed(b).map(|i| a.len() + i)
}

/// The markup classes distinguishable from the first bytes after a `<`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Markup {
    /// `<?xml` followed by whitespace or `?`.
    Declaration,
    /// `<?` with any other target.
    Pi,
    /// `<!--`.
    Comment,
    /// `<![CDATA[`.
    CData,
    /// `<!DOCTYPE` (matched case-insensitively; the keyword case is checked later).
    Doctype,
    /// `<!ELEMENT`.
    ElementDecl,
    /// `<!ENTITY`.
    EntityDecl,
    /// `<!ATTLIST`.
    AttlistDecl,
    /// `<!NOTATION`.
    NotationDecl,
    /// `<![` not followed by `CDATA[` — a conditional section.
    ConditionalSection,
    /// `</`.
    EndTag,
    /// Anything else: a start or empty-element tag.
    Tag,
}

impl Markup {
    /// Bytes taken by `<` plus the recognized keyword.
    pub(crate) fn prefix_len(&self) -> usize {
        match self {
            Self::Declaration | Self::Pi | Self::EndTag => 2,
            Self::Comment => 4,
            Self::CData => 9,
            Self::Doctype | Self::ElementDecl | Self::AttlistDecl => 9,
            Self::EntityDecl => 8,
            Self::NotationDecl => 10,
            Self::ConditionalSection => 3,
            Self::Tag => 1,
        }
    }
}

enum KeywordMatch {
    Yes,
    No,
    Partial,
}

/// Case-insensitive comparison of a (possibly truncated) keyword.
fn match_keyword(bytes: &[u8], keyword: &[u8]) -> KeywordMatch {
    let len = bytes.len().min(keyword.len());
    if !bytes[..len].eq_ignore_ascii_case(&keyword[..len]) {
        return KeywordMatch::No;
    }
    if bytes.len() < keyword.len() {
        KeywordMatch::Partial
    } else {
        KeywordMatch::Yes
    }
}

/// Classifies the markup starting at a `<`.
///
/// `bytes` must begin with `<`. Needs at most the first 10 bytes; returns
/// `Ok(None)` while the available prefix is still ambiguous.
pub(crate) fn classify(bytes: &[u8]) -> Result<Option<Markup>, SyntaxError> {
    debug_assert_eq!(bytes.first(), Some(&b'<'));
    let second = match bytes.get(1) {
        Some(&b) => b,
        None => return Ok(None),
    };
    match second {
        b'/' => Ok(Some(Markup::EndTag)),
        b'?' => {
            // `<?xml` + (whitespace | `?`) is the declaration, everything
            // else is a processing instruction
            match match_keyword(&bytes[2..], b"xml") {
                KeywordMatch::No => Ok(Some(Markup::Pi)),
                KeywordMatch::Partial => Ok(None),
                KeywordMatch::Yes => match bytes.get(5) {
                    None => Ok(None),
                    Some(&b) if crate::chars::is_whitespace(b) || b == b'?' => {
                        Ok(Some(Markup::Declaration))
                    }
                    Some(_) => Ok(Some(Markup::Pi)),
                },
            }
        }
        b'!' => classify_bang(bytes),
        _ => Ok(Some(Markup::Tag)),
    }
}

fn classify_bang(bytes: &[u8]) -> Result<Option<Markup>, SyntaxError> {
    let third = match bytes.get(2) {
        Some(&b) => b,
        None => return Ok(None),
    };
    match third {
        b'-' => match bytes.get(3) {
            None => Ok(None),
            Some(b'-') => Ok(Some(Markup::Comment)),
            Some(_) => Err(SyntaxError::UnexpectedMarkup),
        },
        b'[' => match match_keyword(&bytes[3..], b"CDATA[") {
            // Here case matters: `<![cdata[` is not a CDATA section
            KeywordMatch::Yes if bytes[3..9] == *b"CDATA[" => Ok(Some(Markup::CData)),
            KeywordMatch::Yes | KeywordMatch::No => Ok(Some(Markup::ConditionalSection)),
            KeywordMatch::Partial => Ok(None),
        },
        b'D' | b'd' => keyword_markup(bytes, b"<!DOCTYPE", Markup::Doctype),
        b'E' | b'e' => {
            // `<!ELEMENT` and `<!ENTITY` share the prefix `<!E`
            match match_keyword(bytes, b"<!ELEMENT") {
                KeywordMatch::Yes => return Ok(Some(Markup::ElementDecl)),
                KeywordMatch::Partial => {
                    if let KeywordMatch::No = match_keyword(bytes, b"<!ENTITY") {
                        return Ok(None);
                    }
                }
                KeywordMatch::No => {}
            }
            keyword_markup(bytes, b"<!ENTITY", Markup::EntityDecl)
        }
        b'A' | b'a' => keyword_markup(bytes, b"<!ATTLIST", Markup::AttlistDecl),
        b'N' | b'n' => keyword_markup(bytes, b"<!NOTATION", Markup::NotationDecl),
        _ => Err(SyntaxError::UnexpectedMarkup),
    }
}

fn keyword_markup(
    bytes: &[u8],
    keyword: &[u8],
    markup: Markup,
) -> Result<Option<Markup>, SyntaxError> {
    match match_keyword(bytes, keyword) {
        KeywordMatch::Yes => Ok(Some(markup)),
        KeywordMatch::Partial => Ok(None),
        KeywordMatch::No => Err(SyntaxError::UnexpectedMarkup),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tags() {
        assert_eq!(classify(b"<a"), Ok(Some(Markup::Tag)));
        assert_eq!(classify(b"</"), Ok(Some(Markup::EndTag)));
        assert_eq!(classify(b"<"), Ok(None));
    }

    #[test]
    fn declaration_vs_pi() {
        assert_eq!(classify(b"<?xml "), Ok(Some(Markup::Declaration)));
        assert_eq!(classify(b"<?xml?"), Ok(Some(Markup::Declaration)));
        assert_eq!(classify(b"<?xmlx"), Ok(Some(Markup::Pi)));
        assert_eq!(classify(b"<?x-stylesheet"), Ok(Some(Markup::Pi)));
        assert_eq!(classify(b"<?xml"), Ok(None));
        assert_eq!(classify(b"<?x"), Ok(None));
    }

    #[test]
    fn bang_markup() {
        assert_eq!(classify(b"<!--"), Ok(Some(Markup::Comment)));
        assert_eq!(classify(b"<!-"), Ok(None));
        assert_eq!(classify(b"<![CDATA["), Ok(Some(Markup::CData)));
        assert_eq!(classify(b"<![CDAT"), Ok(None));
        assert_eq!(classify(b"<![INCLUDE"), Ok(Some(Markup::ConditionalSection)));
        assert_eq!(classify(b"<!DOCTYPE"), Ok(Some(Markup::Doctype)));
        assert_eq!(classify(b"<!doctype"), Ok(Some(Markup::Doctype)));
        assert_eq!(classify(b"<!ELEMENT"), Ok(Some(Markup::ElementDecl)));
        assert_eq!(classify(b"<!ENTITY"), Ok(Some(Markup::EntityDecl)));
        assert_eq!(classify(b"<!ELEMEN"), Ok(None));
        assert_eq!(classify(b"<!EN"), Ok(None));
        assert_eq!(classify(b"<!ATTLIST"), Ok(Some(Markup::AttlistDecl)));
        assert_eq!(classify(b"<!NOTATION"), Ok(Some(Markup::NotationDecl)));
        assert_eq!(classify(b"<!#"), Err(SyntaxError::UnexpectedMarkup));
        assert_eq!(classify(b"<!-x"), Err(SyntaxError::UnexpectedMarkup));
    }
}
