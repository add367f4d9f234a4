//! The tag processor: element name and attribute extraction.
//!
//! Operates on one complete tag (`<` through `>`) that the scanner has copied
//! into the working buffer. Attribute names keep pointing into the working
//! buffer; attribute values are normalized into the scratch buffer and
//! addressed by index ranges.

use std::ops::Range;

use crate::chars;
use crate::dtd::Dtd;
use crate::errors::{CapacityError, IllFormedError, Result, SyntaxError};
use crate::escape::{self, ExpandLimits};
use crate::events::AttrSpan;
use crate::reader::Limits;

/// Start vs. empty-element vs. end tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TagKind {
    Start,
    Empty,
    End,
}

/// A processed tag: its kind and the element name range in the working buffer.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct ParsedTag {
    pub(crate) kind: TagKind,
    pub(crate) name: Range<usize>,
}

/// Parses the complete tag in `work`, filling `attrs` (name ranges into
/// `work`, value ranges into `scratch`).
pub(crate) fn parse_tag(
    work: &[u8],
    attrs: &mut Vec<AttrSpan>,
    scratch: &mut Vec<u8>,
    dtd: &Dtd,
    limits: &Limits,
) -> Result<ParsedTag> {
    debug_assert!(work.len() >= 2 && work[0] == b'<' && work[work.len() - 1] == b'>');
    attrs.clear();
    scratch.clear();

    let kind = if work.get(1) == Some(&b'/') {
        TagKind::End
    } else if work.len() >= 3 && work[work.len() - 2] == b'/' {
        TagKind::Empty
    } else {
        TagKind::Start
    };
    let (mut pos, end) = match kind {
        TagKind::Start => (1, work.len() - 1),
        TagKind::Empty => (1, work.len() - 2),
        TagKind::End => (2, work.len() - 1),
    };

    let name = scan_name(
        work,
        &mut pos,
        end,
        limits.max_name_len,
        CapacityError::ElementNameTooLong,
    )?;

    if kind == TagKind::End {
        while pos < end && chars::is_whitespace(work[pos]) {
            pos += 1;
        }
        if pos != end {
            return Err(IllFormedError::AttributeInEndTag.into());
        }
        return Ok(ParsedTag { kind, name });
    }

    let expand = ExpandLimits {
        cap: limits.work_cap,
        overflow: CapacityError::ElementTooLarge,
        depth: limits.max_resolve_depth,
    };
    loop {
        let mut ws = 0;
        while pos < end && chars::is_whitespace(work[pos]) {
            pos += 1;
            ws += 1;
        }
        if pos == end {
            break;
        }
        // Attributes must be separated from the name and from each other
        if ws == 0 {
            return Err(SyntaxError::MissingWhitespace.into());
        }
        if attrs.len() == limits.max_attrs {
            return Err(CapacityError::TooManyAttributes.into());
        }

        let attr_name = scan_name(
            work,
            &mut pos,
            end,
            limits.max_name_len,
            CapacityError::AttributeNameTooLong,
        )?;
        if attrs
            .iter()
            .any(|a| work[a.name.clone()] == work[attr_name.clone()])
        {
            return Err(IllFormedError::RepeatedAttributeName.into());
        }

        while pos < end && chars::is_whitespace(work[pos]) {
            pos += 1;
        }
        if pos == end || work[pos] != b'=' {
            return Err(SyntaxError::MissingEqual.into());
        }
        pos += 1;
        while pos < end && chars::is_whitespace(work[pos]) {
            pos += 1;
        }
        if pos == end {
            return Err(SyntaxError::MissingAttributeValue.into());
        }
        let quote = work[pos];
        if !matches!(quote, b'"' | b'\'') {
            return Err(SyntaxError::MissingQuote.into());
        }
        pos += 1;
        let close = match memchr::memchr(quote, &work[pos..end]) {
            Some(i) => pos + i,
            None => return Err(SyntaxError::QuoteMismatch.into()),
        };
        let raw = &work[pos..close];
        if !chars::all_chars(raw) {
            return Err(SyntaxError::InvalidChar.into());
        }
        let cdata = dtd
            .attlists
            .is_cdata(&work[name.clone()], &work[attr_name.clone()]);
        let value = escape::normalize_attr_value(
            raw,
            scratch,
            &dtd.entities,
            dtd.allow_undeclared(),
            cdata,
            &expand,
        )?;
        attrs.push(AttrSpan {
            name: attr_name,
            value,
        });
        pos = close + 1;
    }

    Ok(ParsedTag { kind, name })
}

/// Scans one name at `pos`, advancing past it.
fn scan_name(
    work: &[u8],
    pos: &mut usize,
    end: usize,
    max_len: usize,
    overflow: CapacityError,
) -> Result<Range<usize>> {
    let start = *pos;
    let first = chars::name_start_char_len(&work[*pos..end]);
    if first == 0 {
        return Err(SyntaxError::InvalidStartNameChar.into());
    }
    *pos += first;
    loop {
        let len = chars::name_char_len(&work[*pos..end]);
        if len == 0 {
            break;
        }
        *pos += len;
    }
    if *pos - start > max_len {
        return Err(overflow.into());
    }
    // The name must be delimited by whitespace or the end of the tag content
    if *pos < end && !chars::is_whitespace(work[*pos]) && work[*pos] != b'=' {
        return Err(SyntaxError::InvalidNameChar.into());
    }
    Ok(start..*pos)
}
