//! Entity and character reference resolution.
//!
//! The resolver expands `&#N;`, `&#xH;`, the five predefined entities and
//! internal parsed entities, enforcing the self-reference and resolving-depth
//! rules. External entities are recognized and left in place, never fetched.
//! Expansion that would bring markup into the output is reported to the
//! engine instead, which re-parses the replacement text in a second-level
//! buffer.

use std::ops::Range;

use crate::chars;
use crate::dtd::EntityTable;
use crate::errors::{CapacityError, EntityError, Error, Result, SyntaxError};

/// How far [`scan_reference`] got.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ScannedRef {
    /// A complete reference of the given total length (both delimiters included).
    Complete(usize),
    /// The terminating `;` was not reached yet; more input is required.
    Partial,
}

/// Scans one reference at the start of `bytes` (`bytes[0]` is `&` or `%`).
///
/// `at_end` tells the scanner that `bytes` is all the input there will ever
/// be (the end of an attribute or entity value); an unterminated reference is
/// then an error instead of [`ScannedRef::Partial`].
pub(crate) fn scan_reference(bytes: &[u8], at_end: bool) -> Result<ScannedRef> {
    debug_assert!(matches!(bytes.first(), Some(&b'&') | Some(&b'%')));
    let char_ref = bytes.get(1) == Some(&b'#');
    let mut i = if char_ref { 2 } else { 1 };
    if char_ref && bytes.get(2) == Some(&b'x') {
        i = 3;
    }
    let body = i;
    while let Some(&b) = bytes.get(i) {
        if b == b';' {
            if i == body {
                // `&;`, `&#;`, `&#x;`
                return Err(empty_ref_error(char_ref));
            }
            return Ok(ScannedRef::Complete(i + 1));
        }
        let ok = if char_ref {
            b.is_ascii_alphanumeric()
        } else if i == 1 {
            chars::name_start_char_len(&bytes[i..]) > 0
        } else {
            chars::name_char_len(&bytes[i..]) > 0
        };
        if !ok {
            // A multi-byte name character may be cut by the chunk boundary
            let needed = chars::seq_len(b);
            if !at_end && needed > 1 && bytes.len() - i < needed {
                return Ok(ScannedRef::Partial);
            }
            return Err(unterminated_ref_error(char_ref));
        }
        // Multi-byte name characters advance by their sequence length
        let step = if char_ref {
            1
        } else {
            chars::name_char_len(&bytes[i..]).max(1)
        };
        i += step;
    }
    if at_end {
        Err(unterminated_ref_error(char_ref))
    } else {
        Ok(ScannedRef::Partial)
    }
}

fn empty_ref_error(char_ref: bool) -> Error {
    if char_ref {
        EntityError::InvalidReference.into()
    } else {
        SyntaxError::MissingSemicolon.into()
    }
}

fn unterminated_ref_error(char_ref: bool) -> Error {
    if char_ref {
        // A character reference cut short by the end of its construct
        EntityError::PartialCharacterReference.into()
    } else {
        SyntaxError::MissingSemicolon.into()
    }
}

/// Expansion of the five predefined entities.
fn predefined(name: &[u8]) -> Option<u8> {
    match name {
        b"lt" => Some(b'<'),
        b"gt" => Some(b'>'),
        b"amp" => Some(b'&'),
        b"apos" => Some(b'\''),
        b"quot" => Some(b'"'),
        _ => None,
    }
}

/// Parses the digits of a character reference (everything between `&#` and
/// `;`) into a code point that satisfies the `Char` production.
pub(crate) fn parse_char_ref(digits: &[u8]) -> Result<u32> {
    let (radix, digits) = match digits.first() {
        Some(b'x') => (16, &digits[1..]),
        _ => (10, digits),
    };
    // The largest code point is 0x10FFFF: 6 hex or 7 decimal digits
    let max_len = if radix == 16 { 6 } else { 7 };
    if digits.is_empty() || digits.len() > max_len {
        return Err(EntityError::InvalidReference.into());
    }
    let mut code: u32 = 0;
    for &b in digits {
        let digit = match (b as char).to_digit(radix) {
            Some(d) => d,
            None => return Err(EntityError::InvalidReference.into()),
        };
        code = code * radix + digit;
    }
    if chars::is_xml_char(code) {
        Ok(code)
    } else {
        Err(EntityError::InvalidReference.into())
    }
}

/// Encodes `code` as UTF-8 into `buf`, returning the sequence length.
pub(crate) fn encode_utf8(buf: &mut [u8; 4], code: u32) -> usize {
    if code < 0x80 {
        buf[0] = code as u8;
        1
    } else if code < 0x800 {
        buf[0] = 0xC0 | (code >> 6) as u8;
        buf[1] = 0x80 | (code & 0x3F) as u8;
        2
    } else if code < 0x1_0000 {
        buf[0] = 0xE0 | (code >> 12) as u8;
        buf[1] = 0x80 | (code >> 6 & 0x3F) as u8;
        buf[2] = 0x80 | (code & 0x3F) as u8;
        3
    } else {
        buf[0] = 0xF0 | (code >> 18) as u8;
        buf[1] = 0x80 | (code >> 12 & 0x3F) as u8;
        buf[2] = 0x80 | (code >> 6 & 0x3F) as u8;
        buf[3] = 0x80 | (code & 0x3F) as u8;
        4
    }
}

/// Appends the UTF-8 encoding of `code` (1–4 bytes).
pub(crate) fn push_utf8(out: &mut Vec<u8>, code: u32) {
    let mut buf = [0u8; 4];
    let len = encode_utf8(&mut buf, code);
    out.extend_from_slice(&buf[..len]);
}

/// Bounds shared by every expansion: the output capacity and the error to
/// raise when it is exceeded, plus the resolving-depth limit.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ExpandLimits {
    pub(crate) cap: usize,
    pub(crate) overflow: CapacityError,
    pub(crate) depth: usize,
}

/// Outcome of resolving one reference in character data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ContentRef {
    /// The expansion was appended to the output.
    Inline,
    /// The referenced entity (table index given) expands to markup; the
    /// engine must parse its replacement text in a second-level buffer.
    Markup(usize),
    /// An external or undeclared entity: the reference was left in place.
    Left,
}

/// Resolves one complete reference (`body` is the text between `&` and `;`)
/// found in character data, appending any expansion to `out`.
pub(crate) fn resolve_content_ref(
    body: &[u8],
    out: &mut Vec<u8>,
    entities: &EntityTable,
    allow_undeclared: bool,
    limits: &ExpandLimits,
) -> Result<ContentRef> {
    if let Some(digits) = body.strip_prefix(b"#") {
        let code = parse_char_ref(digits)?;
        push_char(out, code, limits)?;
        return Ok(ContentRef::Inline);
    }
    if let Some(ch) = predefined(body) {
        push_limited(out, &[ch], limits)?;
        return Ok(ContentRef::Inline);
    }
    match entities.position(body, false) {
        Some(idx) => {
            let entity = entities.get(idx);
            if !entity.parsed {
                // Reference to an unparsed (NDATA) entity in content
                return Err(EntityError::InvalidReference.into());
            }
            if entity.external {
                leave_in_place(body, out, limits)?;
                return Ok(ContentRef::Left);
            }
            if entities.has_markup(idx, limits.depth) {
                return Ok(ContentRef::Markup(idx));
            }
            let mut active = Vec::new();
            let mut left = false;
            expand_entity(
                out,
                entities,
                idx,
                1,
                &mut active,
                false,
                &mut left,
                limits,
            )?;
            if left {
                Ok(ContentRef::Left)
            } else {
                Ok(ContentRef::Inline)
            }
        }
        None if allow_undeclared => {
            leave_in_place(body, out, limits)?;
            Ok(ContentRef::Left)
        }
        None => Err(EntityError::InvalidReference.into()),
    }
}

/// Applies the attribute-value normalization of XML 1.0 §3.3.3 to `raw`,
/// appending the result to the scratch buffer and returning its range.
///
/// `cdata` selects the normalization rule: tokenized types additionally
/// collapse space runs and trim both ends.
pub(crate) fn normalize_attr_value(
    raw: &[u8],
    out: &mut Vec<u8>,
    entities: &EntityTable,
    allow_undeclared: bool,
    cdata: bool,
    limits: &ExpandLimits,
) -> Result<Range<usize>> {
    let start = out.len();
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            // Literal whitespace becomes a space; whitespace that came from
            // a character reference is appended verbatim below
            b'\t' | b'\n' | b'\r' => {
                push_limited(out, &[b' '], limits)?;
                i += 1;
            }
            b'<' => return Err(SyntaxError::InvalidAttributeValue.into()),
            b'&' => {
                let len = match scan_reference(&raw[i..], true)? {
                    ScannedRef::Complete(len) => len,
                    ScannedRef::Partial => return Err(SyntaxError::MissingSemicolon.into()),
                };
                let body = &raw[i + 1..i + len - 1];
                expand_attr_ref(body, out, entities, allow_undeclared, limits)?;
                i += len;
            }
            b => {
                push_limited(out, &[b], limits)?;
                i += 1;
            }
        }
    }
    if !cdata {
        collapse_spaces(out, start);
    }
    Ok(start..out.len())
}

fn expand_attr_ref(
    body: &[u8],
    out: &mut Vec<u8>,
    entities: &EntityTable,
    allow_undeclared: bool,
    limits: &ExpandLimits,
) -> Result<()> {
    if let Some(digits) = body.strip_prefix(b"#") {
        let code = parse_char_ref(digits)?;
        return push_char(out, code, limits);
    }
    if let Some(ch) = predefined(body) {
        return push_limited(out, &[ch], limits);
    }
    match entities.position(body, false) {
        Some(idx) => {
            let entity = entities.get(idx);
            if entity.external || !entity.parsed {
                // No external entity references in attribute values
                return Err(EntityError::InvalidReference.into());
            }
            let mut active = Vec::new();
            let mut left = false;
            expand_entity(out, entities, idx, 1, &mut active, true, &mut left, limits)
        }
        None if allow_undeclared => leave_in_place(body, out, limits),
        None => Err(EntityError::InvalidReference.into()),
    }
}

/// Recursively splices the replacement text of an internal entity.
#[allow(clippy::too_many_arguments)]
fn expand_entity(
    out: &mut Vec<u8>,
    entities: &EntityTable,
    idx: usize,
    level: usize,
    active: &mut Vec<usize>,
    attr_mode: bool,
    left: &mut bool,
    limits: &ExpandLimits,
) -> Result<()> {
    if active.contains(&idx) {
        return Err(EntityError::RecursiveEntity.into());
    }
    if level > limits.depth {
        return Err(CapacityError::TooManyResolveSteps.into());
    }
    active.push(idx);
    let value = entities.get(idx).value();
    let mut i = 0;
    while i < value.len() {
        match value[i] {
            b'\t' | b'\n' | b'\r' if attr_mode => {
                push_limited(out, &[b' '], limits)?;
                i += 1;
            }
            b'<' if attr_mode => return Err(EntityError::InvalidDirectReference.into()),
            b'<' => {
                // Markup-bearing values take the second-level parse route
                return Err(Error::Internal);
            }
            b'&' => {
                let len = match scan_reference(&value[i..], true)? {
                    ScannedRef::Complete(len) => len,
                    ScannedRef::Partial => return Err(SyntaxError::MissingSemicolon.into()),
                };
                let body = &value[i + 1..i + len - 1];
                if let Some(digits) = body.strip_prefix(b"#") {
                    let code = parse_char_ref(digits)?;
                    push_char(out, code, limits)?;
                } else if let Some(ch) = predefined(body) {
                    push_limited(out, &[ch], limits)?;
                } else {
                    match entities.position(body, false) {
                        Some(inner) if entities.get(inner).external => {
                            if attr_mode {
                                return Err(EntityError::InvalidReference.into());
                            }
                            leave_in_place(body, out, limits)?;
                            *left = true;
                        }
                        Some(inner) => expand_entity(
                            out,
                            entities,
                            inner,
                            level + 1,
                            active,
                            attr_mode,
                            left,
                            limits,
                        )?,
                        None => {
                            if attr_mode {
                                return Err(EntityError::InvalidReference.into());
                            }
                            leave_in_place(body, out, limits)?;
                            *left = true;
                        }
                    }
                }
                i += len;
            }
            b => {
                push_limited(out, &[b], limits)?;
                i += 1;
            }
        }
    }
    active.pop();
    Ok(())
}

/// Re-emits an unresolvable reference verbatim.
fn leave_in_place(body: &[u8], out: &mut Vec<u8>, limits: &ExpandLimits) -> Result<()> {
    push_limited(out, &[b'&'], limits)?;
    push_limited(out, body, limits)?;
    push_limited(out, &[b';'], limits)
}

fn push_limited(out: &mut Vec<u8>, bytes: &[u8], limits: &ExpandLimits) -> Result<()> {
    if out.len() + bytes.len() > limits.cap {
        return Err(limits.overflow.into());
    }
    out.extend_from_slice(bytes);
    Ok(())
}

fn push_char(out: &mut Vec<u8>, code: u32, limits: &ExpandLimits) -> Result<()> {
    let mut buf = [0u8; 4];
    let len = encode_utf8(&mut buf, code);
    push_limited(out, &buf[..len], limits)
}

/// Collapses space runs in `out[start..]` to single spaces and trims both
/// ends (the non-CDATA attribute normalization rule).
fn collapse_spaces(out: &mut Vec<u8>, start: usize) {
    let mut write = start;
    let mut pending_space = false;
    let mut read = start;
    while read < out.len() {
        let b = out[read];
        if b == b' ' {
            pending_space = write > start;
        } else {
            if pending_space {
                out[write] = b' ';
                write += 1;
                pending_space = false;
            }
            out[write] = b;
            write += 1;
        }
        read += 1;
    }
    out.truncate(write);
}
