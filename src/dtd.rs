//! Document type declaration support: the `<!DOCTYPE>` header, the four
//! markup declarations of the internal subset, and the entity and
//! attribute-list tables they populate.
//!
//! Only syntactic well-formedness of the DTD is checked, the parser never
//! validates documents against it. The tables feed two consumers: the entity
//! table backs reference resolution, and the attribute-list table selects the
//! normalization rule (CDATA vs. tokenized) for attribute values. External
//! identifiers are recorded but never fetched.

use std::ops::Range;

use crate::chars;
use crate::errors::{CapacityError, DtdError, EntityError, Result, SyntaxError};
use crate::escape::{self, ScannedRef};
use crate::reader::Limits;

/// One row of the entity table, created while scanning `<!ENTITY>` and never
/// mutated afterwards.
#[derive(Debug)]
pub(crate) struct Entity {
    name: Vec<u8>,
    value: Vec<u8>,
    /// `false` for unparsed (NDATA) entities.
    pub(crate) parsed: bool,
    /// `true` for parameter entities (`<!ENTITY % name ...>`).
    pub(crate) parameter: bool,
    /// Declared through an external identifier; the value is never fetched.
    pub(crate) external: bool,
}

impl Entity {
    /// The replacement text (empty for external entities).
    pub(crate) fn value(&self) -> &[u8] {
        &self.value
    }
}

/// Bounded table of declared entities.
#[derive(Debug)]
pub(crate) struct EntityTable {
    rows: Vec<Entity>,
    max_rows: usize,
    max_name: usize,
    max_value: usize,
}

impl EntityTable {
    pub(crate) fn new(max_rows: usize, max_name: usize, max_value: usize) -> Self {
        Self {
            rows: Vec::new(),
            max_rows,
            max_name,
            max_value,
        }
    }

    /// Adds a declaration. A redeclaration of the same name is not an error;
    /// the first declaration wins, as the specification requires.
    pub(crate) fn insert(
        &mut self,
        name: &[u8],
        value: &[u8],
        parsed: bool,
        parameter: bool,
        external: bool,
    ) -> Result<()> {
        if name.len() > self.max_name {
            return Err(CapacityError::EntityNameTooLong.into());
        }
        if value.len() > self.max_value {
            return Err(CapacityError::EntityValueTooLong.into());
        }
        if self.position(name, parameter).is_some() {
            return Ok(());
        }
        if self.rows.len() == self.max_rows {
            return Err(CapacityError::TooManyEntities.into());
        }
        self.rows.push(Entity {
            name: name.to_vec(),
            value: value.to_vec(),
            parsed,
            parameter,
            external,
        });
        Ok(())
    }

    /// Index of the entity with the given name and kind.
    pub(crate) fn position(&self, name: &[u8], parameter: bool) -> Option<usize> {
        self.rows
            .iter()
            .position(|e| e.parameter == parameter && e.name == name)
    }

    pub(crate) fn get(&self, idx: usize) -> &Entity {
        &self.rows[idx]
    }

    /// Whether expanding the entity would bring `<` into the output, looking
    /// through up to `depth` levels of nested general-entity references.
    pub(crate) fn has_markup(&self, idx: usize, depth: usize) -> bool {
        if depth == 0 {
            return false;
        }
        let value = &self.rows[idx].value;
        if memchr::memchr(b'<', value).is_some() {
            return true;
        }
        let mut from = 0;
        while let Some(p) = memchr::memchr(b'&', &value[from..]) {
            let start = from + p;
            let semi = match memchr::memchr(b';', &value[start..]) {
                Some(s) => start + s,
                None => break,
            };
            let body = &value[start + 1..semi];
            if !body.starts_with(b"#") {
                if let Some(inner) = self.position(body, false) {
                    if self.has_markup(inner, depth - 1) {
                        return true;
                    }
                }
            }
            from = semi + 1;
        }
        false
    }
}

/// The ten attribute types of XML 1.0.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum AttType {
    Cdata,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation,
    Enumeration,
}

/// The declared default behavior of an attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum DefaultDecl {
    Implied,
    Required,
    Fixed,
    /// A plain default literal without `#FIXED`.
    Value,
}

/// One attribute definition from `<!ATTLIST>`.
///
/// The declared default and its literal are recorded alongside the type, but
/// only the type takes part in parsing (it selects the normalization rule);
/// attribute defaulting itself would be validation.
#[derive(Debug)]
pub(crate) struct AttlistDecl {
    pub(crate) element: Vec<u8>,
    pub(crate) attribute: Vec<u8>,
    pub(crate) ty: AttType,
    #[allow(dead_code)]
    pub(crate) default: DefaultDecl,
    /// The `#FIXED` or plain default literal, raw.
    #[allow(dead_code)]
    pub(crate) value: Vec<u8>,
}

/// Bounded table of attribute definitions.
#[derive(Debug)]
pub(crate) struct AttlistTable {
    rows: Vec<AttlistDecl>,
    max_rows: usize,
}

impl AttlistTable {
    pub(crate) fn new(max_rows: usize) -> Self {
        Self {
            rows: Vec::new(),
            max_rows,
        }
    }

    fn insert(&mut self, decl: AttlistDecl) -> Result<()> {
        if self.rows.len() == self.max_rows {
            return Err(CapacityError::TooManyAttlistDecls.into());
        }
        // For repeated definitions the first one is binding
        let exists = self
            .rows
            .iter()
            .any(|r| r.element == decl.element && r.attribute == decl.attribute);
        if !exists {
            self.rows.push(decl);
        }
        Ok(())
    }

    /// Selects the normalization rule: an attribute is treated as CDATA
    /// unless a declaration says otherwise.
    pub(crate) fn is_cdata(&self, element: &[u8], attribute: &[u8]) -> bool {
        self.rows
            .iter()
            .find(|r| r.element == element && r.attribute == attribute)
            .map_or(true, |r| r.ty == AttType::Cdata)
    }
}

/// All DTD state of a parser instance.
#[derive(Debug)]
pub(crate) struct Dtd {
    pub(crate) entities: EntityTable,
    pub(crate) attlists: AttlistTable,
    /// Set after a reference to an external parameter entity: later
    /// `<!ENTITY>` and `<!ATTLIST>` declarations may depend on unread
    /// declarations and are skipped (XML 1.0 §2.8).
    pub(crate) skip_markup_decls: bool,
    /// The DOCTYPE carried an external identifier.
    pub(crate) has_external_subset: bool,
    /// The document type name from `<!DOCTYPE>`.
    pub(crate) root_name: Vec<u8>,
    /// A DOCTYPE was already seen; a second one is not allowed.
    pub(crate) seen: bool,
}

impl Dtd {
    pub(crate) fn new(limits: &Limits) -> Self {
        Self {
            entities: EntityTable::new(
                limits.max_entities,
                limits.max_name_len,
                limits.max_entity_value_len,
            ),
            attlists: AttlistTable::new(limits.max_attlist_decls),
            skip_markup_decls: false,
            has_external_subset: false,
            root_name: Vec::new(),
            seen: false,
        }
    }

    /// Undeclared general entities may still be declared in parts of the DTD
    /// the parser never reads; references to them are then left in place.
    pub(crate) fn allow_undeclared(&self) -> bool {
        self.has_external_subset || self.skip_markup_decls
    }
}

/// Parsed `<!DOCTYPE>` header (everything before `[` or `>`).
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct DoctypeHeader {
    /// Range of the document type name.
    pub(crate) name: Range<usize>,
    /// An external identifier was present.
    pub(crate) has_external_id: bool,
}

/// Parses the DOCTYPE header: `Name (S ExternalID)? S?`.
pub(crate) fn parse_doctype_header(header: &[u8]) -> Result<DoctypeHeader> {
    let mut cur = Cursor::new(header);
    cur.require_ws()?;
    let name = cur.name()?;
    let mut has_external_id = false;
    if cur.skip_ws() > 0 && !cur.at_end() {
        has_external_id = true;
        parse_external_id(&mut cur, false)?;
        cur.skip_ws();
    }
    if !cur.at_end() {
        return Err(DtdError::MissingPortion.into());
    }
    Ok(DoctypeHeader {
        name,
        has_external_id,
    })
}

/// Parses `SYSTEM SystemLiteral` or `PUBLIC PubidLiteral (S SystemLiteral)?`.
///
/// `public_id_allowed` permits the NOTATION form where the system literal
/// after `PUBLIC` is optional.
fn parse_external_id(cur: &mut Cursor, public_id_allowed: bool) -> Result<()> {
    if cur.keyword(b"SYSTEM")? {
        cur.require_ws()?;
        cur.literal()?;
        return Ok(());
    }
    if cur.keyword(b"PUBLIC")? {
        cur.require_ws()?;
        let pubid = cur.literal()?;
        if cur.bytes[pubid].iter().any(|&b| !chars::is_pubid_char(b)) {
            return Err(SyntaxError::InvalidChar.into());
        }
        let ws = cur.skip_ws();
        if cur.peek().map_or(true, |b| !matches!(b, b'"' | b'\'')) {
            if public_id_allowed {
                return Ok(());
            }
            return Err(DtdError::MissingSystemId.into());
        }
        if ws == 0 {
            return Err(SyntaxError::MissingWhitespace.into());
        }
        cur.literal()?;
        return Ok(());
    }
    Err(DtdError::MissingPortion.into())
}

/// Parses the body of `<!ENTITY ...>` (between the keyword and `>`) and
/// records the declaration.
///
/// `in_pe` is true while the declaration itself came out of a parameter
/// entity: only then may parameter-entity references occur inside it.
pub(crate) fn parse_entity_decl(body: &[u8], dtd: &mut Dtd, in_pe: bool, limits: &Limits) -> Result<()> {
    let mut cur = Cursor::new(body);
    cur.require_ws()?;
    let parameter = if cur.peek() == Some(b'%') {
        cur.bump(1);
        cur.require_ws()?;
        true
    } else {
        false
    };
    let name_range = cur.name()?;
    let name = body[name_range].to_vec();
    cur.require_ws()?;
    match cur.peek() {
        Some(b'"') | Some(b'\'') => {
            let literal = cur.literal()?;
            let value = store_entity_value(&body[literal], dtd, in_pe, limits)?;
            cur.skip_ws();
            if !cur.at_end() {
                return Err(DtdError::MissingPortion.into());
            }
            dtd.entities.insert(&name, &value, true, parameter, false)
        }
        _ => {
            parse_external_id(&mut cur, false)?;
            let mut parsed = true;
            if cur.skip_ws() > 0 && !cur.at_end() {
                if parameter {
                    // NDATA is only defined for general entities
                    return Err(DtdError::MissingPortion.into());
                }
                if !cur.keyword(b"NDATA")? {
                    return Err(DtdError::MissingPortion.into());
                }
                cur.require_ws()?;
                cur.name()?;
                parsed = false;
                cur.skip_ws();
            }
            if !cur.at_end() {
                return Err(DtdError::MissingPortion.into());
            }
            dtd.entities.insert(&name, b"", parsed, parameter, true)
        }
    }
}

/// Builds the stored replacement text of an internal entity: character
/// references expand now, parameter-entity references splice now, general
/// entity references are bypassed verbatim.
fn store_entity_value(raw: &[u8], dtd: &Dtd, in_pe: bool, limits: &Limits) -> Result<Vec<u8>> {
    let mut value = Vec::new();
    splice_entity_value(raw, dtd, in_pe, 1, limits, &mut value)?;
    Ok(value)
}

fn splice_entity_value(
    raw: &[u8],
    dtd: &Dtd,
    in_pe: bool,
    level: usize,
    limits: &Limits,
    out: &mut Vec<u8>,
) -> Result<()> {
    if level > limits.max_resolve_depth {
        return Err(CapacityError::TooManyResolveSteps.into());
    }
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' => {
                if !in_pe {
                    return Err(DtdError::PeReferenceInInternalSubset.into());
                }
                let len = match escape::scan_reference(&raw[i..], true)? {
                    ScannedRef::Complete(len) => len,
                    ScannedRef::Partial => return Err(SyntaxError::MissingSemicolon.into()),
                };
                let body = &raw[i + 1..i + len - 1];
                let idx = dtd
                    .entities
                    .position(body, true)
                    .ok_or(EntityError::InvalidParameterEntity)?;
                let pe = dtd.entities.get(idx);
                if !pe.external {
                    let pe_value = pe.value().to_vec();
                    splice_entity_value(&pe_value, dtd, in_pe, level + 1, limits, out)?;
                }
                i += len;
            }
            b'&' => {
                let len = match escape::scan_reference(&raw[i..], true)? {
                    ScannedRef::Complete(len) => len,
                    ScannedRef::Partial => return Err(SyntaxError::MissingSemicolon.into()),
                };
                let body = &raw[i + 1..i + len - 1];
                if let Some(digits) = body.strip_prefix(b"#") {
                    let code = escape::parse_char_ref(digits)?;
                    escape::push_utf8(out, code);
                } else {
                    // General entity references are bypassed and resolved
                    // where the entity is referenced
                    out.extend_from_slice(&raw[i..i + len]);
                }
                i += len;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
        if out.len() > limits.max_entity_value_len {
            return Err(CapacityError::EntityValueTooLong.into());
        }
    }
    Ok(())
}

/// Parses the body of `<!ATTLIST ...>` and records the definitions.
pub(crate) fn parse_attlist_decl(
    body: &[u8],
    dtd: &mut Dtd,
    in_pe: bool,
    limits: &Limits,
) -> Result<()> {
    check_no_pe(body, in_pe)?;
    let mut cur = Cursor::new(body);
    cur.require_ws()?;
    let element = body[cur.name()?].to_vec();
    loop {
        if cur.skip_ws() == 0 && !cur.at_end() {
            return Err(SyntaxError::MissingWhitespace.into());
        }
        if cur.at_end() {
            return Ok(());
        }
        let attribute_range = cur.name()?;
        if attribute_range.len() > limits.max_name_len {
            return Err(CapacityError::AttributeNameTooLong.into());
        }
        let attribute = body[attribute_range].to_vec();
        cur.require_ws()?;
        let ty = parse_att_type(&mut cur)?;
        cur.require_ws()?;
        let (default, value) = parse_default_decl(&mut cur, body)?;
        dtd.attlists.insert(AttlistDecl {
            element: element.clone(),
            attribute,
            ty,
            default,
            value,
        })?;
    }
}

fn parse_att_type(cur: &mut Cursor) -> Result<AttType> {
    if cur.peek() == Some(b'(') {
        cur.bump(1);
        parse_name_group(cur, false)?;
        return Ok(AttType::Enumeration);
    }
    // Longer keywords first so that `IDREFS` is not consumed as `IDREF`
    const TYPES: [(&[u8], AttType); 8] = [
        (b"CDATA", AttType::Cdata),
        (b"IDREFS", AttType::IdRefs),
        (b"IDREF", AttType::IdRef),
        (b"ID", AttType::Id),
        (b"ENTITIES", AttType::Entities),
        (b"ENTITY", AttType::Entity),
        (b"NMTOKENS", AttType::NmTokens),
        (b"NMTOKEN", AttType::NmToken),
    ];
    for (keyword, ty) in TYPES {
        if cur.keyword_of(keyword, DtdError::InvalidAttributeType)? {
            return Ok(ty);
        }
    }
    if cur.keyword_of(b"NOTATION", DtdError::InvalidAttributeType)? {
        cur.require_ws()?;
        if cur.peek() != Some(b'(') {
            return Err(DtdError::InvalidAttributeType.into());
        }
        cur.bump(1);
        parse_name_group(cur, true)?;
        return Ok(AttType::Notation);
    }
    Err(DtdError::InvalidAttributeType.into())
}

/// Parses `Name (S? '|' S? Name)* S? ')'`; enumerations allow name tokens,
/// notation groups require full names.
fn parse_name_group(cur: &mut Cursor, names_only: bool) -> Result<()> {
    loop {
        cur.skip_ws();
        if names_only {
            cur.name()?;
        } else {
            cur.nmtoken()?;
        }
        cur.skip_ws();
        match cur.peek() {
            Some(b'|') => cur.bump(1),
            Some(b')') => {
                cur.bump(1);
                return Ok(());
            }
            _ => return Err(DtdError::InvalidAttributeType.into()),
        }
    }
}

fn parse_default_decl(cur: &mut Cursor, body: &[u8]) -> Result<(DefaultDecl, Vec<u8>)> {
    if cur.peek() == Some(b'#') {
        cur.bump(1);
        if cur.keyword_of(b"REQUIRED", DtdError::InvalidDefaultDecl)? {
            return Ok((DefaultDecl::Required, Vec::new()));
        }
        if cur.keyword_of(b"IMPLIED", DtdError::InvalidDefaultDecl)? {
            return Ok((DefaultDecl::Implied, Vec::new()));
        }
        if cur.keyword_of(b"FIXED", DtdError::InvalidDefaultDecl)? {
            cur.require_ws()?;
            let literal = cur.literal()?;
            return Ok((DefaultDecl::Fixed, body[literal].to_vec()));
        }
        return Err(DtdError::InvalidDefaultDecl.into());
    }
    if matches!(cur.peek(), Some(b'"') | Some(b'\'')) {
        let literal = cur.literal()?;
        return Ok((DefaultDecl::Value, body[literal].to_vec()));
    }
    Err(DtdError::InvalidDefaultDecl.into())
}

/// Parses the body of `<!ELEMENT ...>`: `Name S contentspec`.
pub(crate) fn parse_element_decl(body: &[u8], in_pe: bool, limits: &Limits) -> Result<()> {
    check_no_pe(body, in_pe)?;
    let mut cur = Cursor::new(body);
    cur.require_ws()?;
    cur.name()?;
    cur.require_ws()?;
    if cur.keyword(b"EMPTY")? || cur.keyword(b"ANY")? {
        cur.skip_ws();
        if !cur.at_end() {
            return Err(DtdError::MissingPortion.into());
        }
        return Ok(());
    }
    if cur.peek() != Some(b'(') {
        return Err(DtdError::MissingPortion.into());
    }
    cur.bump(1);
    parse_content_group(&mut cur, 1, limits)?;
    cur.skip_ws();
    if !cur.at_end() {
        return Err(DtdError::MissingPortion.into());
    }
    Ok(())
}

/// Parses one parenthesized group of a content model, after its `(`.
///
/// Tracks the nesting depth against the operator limit and requires a single
/// connector kind (`,` or `|`) per group.
fn parse_content_group(cur: &mut Cursor, depth: usize, limits: &Limits) -> Result<()> {
    if depth > limits.max_operators {
        return Err(CapacityError::TooManyOperators.into());
    }
    cur.skip_ws();
    // Mixed content: (#PCDATA) or (#PCDATA|name|...)*
    if cur.peek() == Some(b'#') {
        cur.bump(1);
        if !cur.keyword_of(b"PCDATA", DtdError::InvalidOperator)? {
            return Err(DtdError::InvalidOperator.into());
        }
        let mut with_names = false;
        loop {
            cur.skip_ws();
            match cur.peek() {
                Some(b'|') => {
                    cur.bump(1);
                    cur.skip_ws();
                    cur.name()?;
                    with_names = true;
                }
                Some(b')') => {
                    cur.bump(1);
                    if with_names {
                        // The repetition star is mandatory once names follow
                        if cur.peek() != Some(b'*') {
                            return Err(DtdError::InvalidOperator.into());
                        }
                        cur.bump(1);
                    } else if cur.peek() == Some(b'*') {
                        cur.bump(1);
                    }
                    return Ok(());
                }
                Some(b',') => return Err(DtdError::MissingSeparator.into()),
                _ => return Err(DtdError::InvalidOperator.into()),
            }
        }
    }
    // Children content: particles joined by one connector kind
    let mut connector: Option<u8> = None;
    loop {
        cur.skip_ws();
        match cur.peek() {
            Some(b'(') => {
                cur.bump(1);
                parse_content_group(cur, depth + 1, limits)?;
            }
            _ => {
                if cur.name().is_err() {
                    return Err(DtdError::InvalidOperator.into());
                }
            }
        }
        if matches!(cur.peek(), Some(b'?') | Some(b'*') | Some(b'+')) {
            cur.bump(1);
        }
        cur.skip_ws();
        match cur.peek() {
            Some(sep @ b',') | Some(sep @ b'|') => {
                match connector {
                    None => connector = Some(sep),
                    Some(previous) if previous != sep => {
                        return Err(DtdError::MissingSeparator.into())
                    }
                    Some(_) => {}
                }
                cur.bump(1);
            }
            Some(b')') => {
                cur.bump(1);
                if matches!(cur.peek(), Some(b'?') | Some(b'*') | Some(b'+')) {
                    cur.bump(1);
                }
                return Ok(());
            }
            _ => return Err(DtdError::InvalidOperator.into()),
        }
    }
}

/// Parses the body of `<!NOTATION ...>`. Returns the range of the trimmed
/// body, which the engine reports through the notation event.
pub(crate) fn parse_notation_decl(body: &[u8], in_pe: bool) -> Result<Range<usize>> {
    check_no_pe(body, in_pe)?;
    let mut cur = Cursor::new(body);
    cur.require_ws()?;
    let start = cur.pos;
    cur.name()?;
    cur.require_ws()?;
    parse_external_id(&mut cur, true)?;
    cur.skip_ws();
    if !cur.at_end() {
        return Err(DtdError::MissingPortion.into());
    }
    let end = body
        .iter()
        .rposition(|&b| !chars::is_whitespace(b))
        .map_or(start, |p| p + 1);
    Ok(start..end)
}

/// Rejects parameter-entity references inside a markup declaration of the
/// internal subset. Quoted literals are exempt; `%` is ordinary data there
/// (entity values handle their own references).
fn check_no_pe(body: &[u8], in_pe: bool) -> Result<()> {
    if in_pe {
        return Ok(());
    }
    let mut quote: Option<u8> = None;
    for &b in body {
        match (quote, b) {
            (None, b'%') => return Err(DtdError::PeReferenceInInternalSubset.into()),
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (Some(q), _) if q == b => quote = None,
            _ => {}
        }
    }
    Ok(())
}

/// Token cursor over one complete declaration body.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn bump(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_ws(&mut self) -> usize {
        let start = self.pos;
        while self.peek().map_or(false, chars::is_whitespace) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn require_ws(&mut self) -> Result<()> {
        if self.skip_ws() == 0 {
            return Err(SyntaxError::MissingWhitespace.into());
        }
        Ok(())
    }

    /// Consumes a `Name` and returns its range.
    fn name(&mut self) -> Result<Range<usize>> {
        let start = self.pos;
        let first = chars::name_start_char_len(&self.bytes[self.pos..]);
        if first == 0 {
            return Err(DtdError::MissingPortion.into());
        }
        self.pos += first;
        loop {
            let len = chars::name_char_len(&self.bytes[self.pos..]);
            if len == 0 {
                return Ok(start..self.pos);
            }
            self.pos += len;
        }
    }

    /// Consumes an `Nmtoken` (like a name, but any name character may lead).
    fn nmtoken(&mut self) -> Result<Range<usize>> {
        let start = self.pos;
        loop {
            let len = chars::name_char_len(&self.bytes[self.pos..]);
            if len == 0 {
                break;
            }
            self.pos += len;
        }
        if self.pos == start {
            return Err(DtdError::MissingPortion.into());
        }
        Ok(start..self.pos)
    }

    /// Consumes a quoted literal and returns the range between the quotes.
    fn literal(&mut self) -> Result<Range<usize>> {
        let quote = match self.peek() {
            Some(q @ b'"') | Some(q @ b'\'') => q,
            _ => return Err(SyntaxError::MissingQuote.into()),
        };
        self.pos += 1;
        let start = self.pos;
        match memchr::memchr(quote, &self.bytes[self.pos..]) {
            Some(i) => {
                self.pos += i + 1;
                Ok(start..start + i)
            }
            None => Err(SyntaxError::QuoteMismatch.into()),
        }
    }

    /// Consumes `keyword` if the next token matches it. A case-insensitive
    /// match that is not uppercase is the lowercase-keyword error.
    fn keyword(&mut self, keyword: &[u8]) -> Result<bool> {
        self.keyword_of(keyword, DtdError::LowercaseKeyword)
    }

    /// Like [`Cursor::keyword`] with a caller-chosen error for the
    /// wrong-case match.
    fn keyword_of(&mut self, keyword: &[u8], case_error: DtdError) -> Result<bool> {
        let end = self.pos + keyword.len();
        if end > self.bytes.len() {
            return Ok(false);
        }
        let token = &self.bytes[self.pos..end];
        if !token.eq_ignore_ascii_case(keyword) {
            return Ok(false);
        }
        // Protect against consuming a prefix of a longer name
        if chars::name_char_len(&self.bytes[end..]) != 0 {
            return Ok(false);
        }
        if token != keyword {
            return Err(case_error.into());
        }
        self.pos = end;
        Ok(true)
    }
}
