//! The parse engine.
//!
//! [`Parser`] owns every buffer and table of one parse. The application feeds
//! bytes with [`Parser::feed`] and drives the engine with [`Parser::step`];
//! each step recognizes at most one construct, reports it through the
//! [`Handler`], and returns a [`Status`] telling the caller whether to feed
//! more data, keep stepping, or stop.
//!
//! Internally the engine reads from a stack of rings: index 0 is the document
//! input, every further level is the replacement text of an entity that is
//! being re-parsed. While that stack is deeper than one the engine is in
//! silent mode: constructs are validated and tracked against a shadow path,
//! but no events are delivered.

use std::ops::Range;

use crate::chars;
use crate::dtd::{self, Dtd};
use crate::encoding::{self, Detected, Encoding, Transcoder};
use crate::errors::{
    CallbackError, CapacityError, DtdError, EntityError, Error, IllFormedError, Result,
    SyntaxError,
};
use crate::escape::{self, ContentRef, ExpandLimits, ScannedRef};
use crate::events::{AttrSpan, Attributes, Event, EventKind};
use crate::parser::{
    self, CDataSearch, CommentSearch, Markup, OneOf, PiSearch, QuotedSearch, SpanSearch,
};
use crate::path::PathTracker;
use crate::ring::Ring;
use crate::tag::{self, TagKind};

/// Capacities of every fixed buffer and table of a [`Parser`].
///
/// All storage is allocated once in [`Parser::with_limits`] and never grows
/// during parsing; inputs that do not fit raise the matching
/// [`CapacityError`].
#[derive(Clone, Debug)]
pub struct Limits {
    /// Capacity of the circular input buffer.
    pub ring_cap: usize,
    /// Capacity of the working buffer; bounds the largest tag, directive or
    /// text run.
    pub work_cap: usize,
    /// Capacity of the element path.
    pub path_cap: usize,
    /// Maximum number of attributes per tag.
    pub max_attrs: usize,
    /// Maximum length of element, attribute and entity names.
    pub max_name_len: usize,
    /// Maximum number of declared entities.
    pub max_entities: usize,
    /// Maximum length of one entity value.
    pub max_entity_value_len: usize,
    /// Maximum number of attribute definitions from `<!ATTLIST>`.
    pub max_attlist_decls: usize,
    /// Maximum nesting of content-model groups in `<!ELEMENT>`.
    pub max_operators: usize,
    /// Maximum depth of entity resolution, both for inline expansion and for
    /// stacked second-level parses.
    pub max_resolve_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            ring_cap: 8 * 1024,
            work_cap: 8 * 1024,
            path_cap: 512,
            max_attrs: 32,
            max_name_len: 128,
            max_entities: 64,
            max_entity_value_len: 1024,
            max_attlist_decls: 64,
            max_operators: 16,
            max_resolve_depth: 4,
        }
    }
}

/// Receives the events of a parse.
///
/// Returning `false` from [`Handler::event`] rejects the event: the engine
/// records the matching [`CallbackError`] and stops.
pub trait Handler {
    /// Called for every recognized construct, in document order.
    fn event(&mut self, event: Event<'_>) -> bool;
}

impl<F: FnMut(Event<'_>) -> bool> Handler for F {
    fn event(&mut self, event: Event<'_>) -> bool {
        self(event)
    }
}

/// What [`Parser::step`] reports back to the driving loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// The buffered input ends inside a construct; feed more data.
    NeedData,
    /// A construct was processed; keep stepping.
    Continue,
    /// The root element is closed and no content is pending.
    Finished,
    /// Parsing failed; see [`Parser::last_error`]. The state is final.
    Error,
}

/// Progress of one `try_step` call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Step {
    NeedData,
    Progress,
}

/// Where `feed` is in the encoding hand-shake.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InputStage {
    /// Collecting the first four bytes for BOM detection.
    Detect,
    /// The document starts with `<?xm`: collecting the declaration to take
    /// the encoding from its `encoding` pseudo-attribute.
    WaitDecl,
}

/// Position inside `<!DOCTYPE ... [ ... ] >`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum DtdPhase {
    /// Between `[` and `]`.
    Subset,
    /// After `]`, before the closing `>`.
    AfterSubset,
}

/// The construct reported by the last dispatched event, as ranges into the
/// working buffers.
#[derive(Clone, Debug)]
enum CurrentEvent {
    None,
    Start {
        name: Range<usize>,
    },
    End {
        name: Range<usize>,
    },
    Text(Range<usize>),
    CData(Range<usize>),
    Comment(Range<usize>),
    Pi {
        target: Range<usize>,
        data: Range<usize>,
    },
    Notation(Range<usize>),
}

/// An incremental, non-validating XML 1.0 parser with bounded memory.
///
/// ```
/// use picosax::{Event, Parser, Status};
///
/// let mut names = Vec::new();
/// let mut parser = Parser::new(|event: Event<'_>| {
///     if let Event::Start { name, .. } = &event {
///         names.push(String::from_utf8(name.to_vec()).unwrap());
///     }
///     true
/// });
///
/// // Feed in arbitrary chunks, step until the parser wants more
/// for chunk in [&b"<doc><item"[..], &b" id='1'/></doc>"[..]] {
///     parser.feed(chunk).unwrap();
///     loop {
///         match parser.step() {
///             Status::Continue => continue,
///             Status::NeedData | Status::Finished => break,
///             Status::Error => panic!("{:?}", parser.last_error()),
///         }
///     }
/// }
/// assert_eq!(names, ["doc", "item"]);
/// ```
pub struct Parser<H: Handler> {
    handler: H,
    limits: Limits,

    // Input side
    stage: InputStage,
    prefix: Vec<u8>,
    pending: Vec<u8>,
    transcoder: Option<Transcoder>,
    bom_encoding: Option<Encoding>,

    // Ring stack: index 0 is the document, further levels are entity
    // expansions. `paths` mirrors it (index 0 is the element path, further
    // levels are shadow paths).
    rings: Vec<Ring>,
    paths: Vec<PathTracker>,

    work: Vec<u8>,
    scratch: Vec<u8>,
    attrs: Vec<AttrSpan>,
    refbuf: Vec<u8>,
    current: CurrentEvent,

    dtd: Dtd,
    dtd_phase: Option<DtdPhase>,

    text_pending: bool,
    prolog_done: bool,
    saw_root: bool,
    reached_end: bool,
    standalone: bool,
    found_external_entity: bool,

    error: Option<Error>,
    error_line: u32,
    error_column: u32,
}

impl<H: Handler> Parser<H> {
    /// Creates a parser with [`Limits::default`].
    pub fn new(handler: H) -> Self {
        Self::with_limits(handler, Limits::default())
    }

    /// Creates a parser with explicit buffer capacities. All buffers are
    /// allocated here; parsing itself never grows them.
    pub fn with_limits(handler: H, limits: Limits) -> Self {
        Self {
            handler,
            stage: InputStage::Detect,
            prefix: Vec::with_capacity(4),
            pending: Vec::new(),
            transcoder: None,
            bom_encoding: None,
            rings: vec![Ring::with_capacity(limits.ring_cap)],
            paths: vec![PathTracker::with_capacity(limits.path_cap)],
            work: Vec::with_capacity(limits.work_cap),
            scratch: Vec::with_capacity(limits.work_cap),
            attrs: Vec::with_capacity(limits.max_attrs),
            refbuf: Vec::with_capacity(limits.max_name_len + 4),
            current: CurrentEvent::None,
            dtd: Dtd::new(&limits),
            dtd_phase: None,
            text_pending: false,
            prolog_done: false,
            saw_root: false,
            reached_end: false,
            standalone: false,
            found_external_entity: false,
            error: None,
            error_line: 0,
            error_column: 0,
            limits,
        }
    }

    /// Appends document bytes, converting them to UTF-8 in the input ring.
    ///
    /// Returns how many of `bytes` were taken; a short count means the ring
    /// is near full and the rest must be offered again after stepping. The
    /// first calls run byte-order-mark detection and may buffer up to one
    /// XML declaration before anything reaches the ring.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<usize> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut consumed = 0;
        while self.transcoder.is_none() {
            match self.stage {
                InputStage::Detect => {
                    let need = 4usize.saturating_sub(self.prefix.len());
                    let take = need.min(bytes.len() - consumed);
                    self.prefix.extend_from_slice(&bytes[consumed..consumed + take]);
                    consumed += take;
                    match encoding::detect(&self.prefix) {
                        None => return Ok(consumed),
                        Some(Detected::Unsupported) => {
                            return Err(self.fail(
                                crate::errors::EncodingError::UnsupportedScheme.into(),
                            ))
                        }
                        Some(Detected::Declared) => self.stage = InputStage::WaitDecl,
                        Some(Detected::Default) => {
                            self.install_transcoder(encoding::default_encoding())
                        }
                        Some(Detected::Encoding(enc, skip)) => {
                            self.bom_encoding = Some(enc);
                            self.prefix.drain(..skip);
                            self.install_transcoder(enc);
                        }
                    }
                }
                InputStage::WaitDecl => {
                    if memchr::memchr(b'>', &self.prefix).is_none() {
                        let rest = &bytes[consumed..];
                        match memchr::memchr(b'>', rest) {
                            Some(i) => {
                                if self.prefix.len() + i + 1 > self.limits.work_cap {
                                    return Err(
                                        self.fail(CapacityError::DirectiveTooLarge.into())
                                    );
                                }
                                self.prefix.extend_from_slice(&rest[..=i]);
                                consumed += i + 1;
                            }
                            None => {
                                if self.prefix.len() + rest.len() > self.limits.work_cap {
                                    return Err(
                                        self.fail(CapacityError::DirectiveTooLarge.into())
                                    );
                                }
                                self.prefix.extend_from_slice(rest);
                                return Ok(consumed + rest.len());
                            }
                        }
                    }
                    let declared = match scan_decl_encoding(&self.prefix) {
                        Some(label) => match encoding::from_label(&label, None) {
                            Ok(enc) => enc,
                            Err(e) => return Err(self.fail(e.into())),
                        },
                        None => encoding::default_encoding(),
                    };
                    self.install_transcoder(declared);
                }
            }
        }
        // Bytes held back during detection go through the converter first
        while !self.pending.is_empty() {
            let taken = {
                let transcoder = self.transcoder.as_mut().expect("transcoder installed");
                match transcoder.write(&self.pending, &mut self.rings[0]) {
                    Ok(n) => n,
                    Err(e) => return Err(self.fail(e.into())),
                }
            };
            if taken == 0 {
                return Ok(consumed);
            }
            self.pending.drain(..taken);
        }
        let transcoder = self.transcoder.as_mut().expect("transcoder installed");
        match transcoder.write(&bytes[consumed..], &mut self.rings[0]) {
            Ok(n) => Ok(consumed + n),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Drives the engine by one construct.
    pub fn step(&mut self) -> Status {
        if self.error.is_some() {
            return Status::Error;
        }
        match self.try_step() {
            Err(e) => {
                self.fail(e);
                Status::Error
            }
            Ok(_) if self.finished() => Status::Finished,
            Ok(Step::Progress) => Status::Continue,
            Ok(Step::NeedData) => Status::NeedData,
        }
    }

    /// Free bytes of the input ring, conservatively adjusted for the
    /// worst-case expansion of the active trans-coding.
    pub fn free_space(&self) -> usize {
        let factor = self
            .transcoder
            .as_ref()
            .map_or(1, |t| t.encoding().max_expansion());
        self.rings[0].free() / factor
    }

    /// The detected document encoding, once known.
    pub fn encoding(&self) -> Option<Encoding> {
        self.transcoder.as_ref().map(|t| t.encoding())
    }

    /// Value of the `standalone` pseudo-attribute (`false` when absent).
    pub fn standalone(&self) -> bool {
        self.standalone
    }

    /// Whether a reference to an external entity was encountered. External
    /// entities are recognized and recorded but never fetched.
    pub fn found_external_entity(&self) -> bool {
        self.found_external_entity
    }

    /// The document type name from `<!DOCTYPE>`, once one was parsed.
    pub fn doctype_name(&self) -> Option<&[u8]> {
        if self.dtd.seen {
            Some(&self.dtd.root_name)
        } else {
            None
        }
    }

    /// The error that stopped the parse, if any.
    pub fn last_error(&self) -> Option<Error> {
        self.error
    }

    /// Line of the input cursor when the error was recorded, 1-based.
    pub fn error_line(&self) -> u32 {
        self.error_line
    }

    /// Column of the input cursor when the error was recorded, 1-based,
    /// counted in bytes since the last line feed.
    pub fn error_column(&self) -> u32 {
        self.error_column
    }

    /// The element path at the current position: the backslash-joined names
    /// of all open elements (of the entity expansion, while one is active).
    pub fn current_path(&self) -> &[u8] {
        self.paths.last().expect("path stack is never empty").as_bytes()
    }

    /// Kind of the last dispatched event.
    pub fn event_kind(&self) -> Option<EventKind> {
        match self.current {
            CurrentEvent::None => None,
            CurrentEvent::Start { .. } => Some(EventKind::Start),
            CurrentEvent::End { .. } => Some(EventKind::End),
            CurrentEvent::Text(_) => Some(EventKind::Text),
            CurrentEvent::CData(_) => Some(EventKind::CData),
            CurrentEvent::Comment(_) => Some(EventKind::Comment),
            CurrentEvent::Pi { .. } => Some(EventKind::Pi),
            CurrentEvent::Notation(_) => Some(EventKind::Notation),
        }
    }

    /// Element name of the last start or end event.
    pub fn element_name(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::Start { name } | CurrentEvent::End { name } => {
                Some(&self.work[name.clone()])
            }
            _ => None,
        }
    }

    /// Attribute count of the last start event.
    pub fn attribute_count(&self) -> usize {
        match self.current {
            CurrentEvent::Start { .. } => self.attrs.len(),
            _ => 0,
        }
    }

    /// Name of the `i`-th attribute of the last start event.
    pub fn attribute_name(&self, i: usize) -> Option<&[u8]> {
        match self.current {
            CurrentEvent::Start { .. } => {
                self.attrs.get(i).map(|a| &self.work[a.name.clone()])
            }
            _ => None,
        }
    }

    /// Normalized value of the `i`-th attribute of the last start event.
    pub fn attribute_value(&self, i: usize) -> Option<&[u8]> {
        match self.current {
            CurrentEvent::Start { .. } => {
                self.attrs.get(i).map(|a| &self.scratch[a.value.clone()])
            }
            _ => None,
        }
    }

    /// Body of the last text event.
    pub fn text(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::Text(body) => Some(&self.work[body.clone()]),
            _ => None,
        }
    }

    /// Body of the last CDATA event.
    pub fn cdata_text(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::CData(body) => Some(&self.work[body.clone()]),
            _ => None,
        }
    }

    /// Body of the last comment event.
    pub fn comment(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::Comment(body) => Some(&self.work[body.clone()]),
            _ => None,
        }
    }

    /// Target of the last processing-instruction event.
    pub fn pi_target(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::Pi { target, .. } => Some(&self.work[target.clone()]),
            _ => None,
        }
    }

    /// Data of the last processing-instruction event (possibly empty).
    pub fn pi_data(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::Pi { data, .. } => Some(&self.work[data.clone()]),
            _ => None,
        }
    }

    /// Body of the last notation event.
    pub fn notation(&self) -> Option<&[u8]> {
        match &self.current {
            CurrentEvent::Notation(body) => Some(&self.work[body.clone()]),
            _ => None,
        }
    }

    /// Shared access to the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Exclusive access to the handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes the parser, releasing its buffers and returning the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    fn install_transcoder(&mut self, enc: Encoding) {
        self.transcoder = Some(Transcoder::new(enc));
        self.pending = std::mem::take(&mut self.prefix);
    }

    /// Records the first error at the position of the document cursor.
    fn fail(&mut self, error: Error) -> Error {
        if self.error.is_none() {
            self.error = Some(error);
            self.error_line = self.rings[0].line();
            self.error_column = self.rings[0].column();
        }
        error
    }

    fn finished(&self) -> bool {
        self.reached_end
            && self.rings.len() == 1
            && self.rings[0].is_empty()
            && !self.text_pending
    }

    fn silent(&self) -> bool {
        self.rings.len() > 1
    }

    fn inside_element(&self) -> bool {
        self.paths.iter().any(|p| !p.is_empty())
    }

    fn try_step(&mut self) -> Result<Step> {
        self.current = CurrentEvent::None;
        // Pop entity expansions that ran dry; an expansion may only end at a
        // construct boundary with its shadow path closed
        while self.rings.len() > 1 && self.rings[self.rings.len() - 1].is_empty() {
            if !self.paths[self.paths.len() - 1].is_empty() {
                return Err(EntityError::NotWellFormed.into());
            }
            self.rings.pop();
            self.paths.pop();
        }
        if self.rings.last().expect("ring stack is never empty").is_empty() {
            return Ok(Step::NeedData);
        }
        if let Some(phase) = self.dtd_phase {
            return self.step_dtd(phase);
        }
        let first = self.rings.last().expect("ring stack is never empty").get(0);
        if first == b'<' {
            if self.text_pending {
                return self.flush_text();
            }
            return self.step_markup();
        }
        if !self.text_pending {
            self.work.clear();
        }
        self.step_text()
    }

    //------------------------------------------------------------------------
    // Markup dispatch
    //------------------------------------------------------------------------

    fn step_markup(&mut self) -> Result<Step> {
        let mut head = [0u8; 10];
        let ready = {
            let ring = self.rings.last().expect("ring stack is never empty");
            let n = ring.ready().min(head.len());
            for (i, slot) in head.iter_mut().enumerate().take(n) {
                *slot = ring.get(i);
            }
            n
        };
        let markup = match parser::classify(&head[..ready])? {
            Some(m) => m,
            None => return self.need_more(None),
        };
        match markup {
            Markup::Declaration => self.handle_declaration(),
            Markup::Pi => self.handle_pi(),
            Markup::Comment => self.handle_comment(),
            Markup::CData => self.handle_cdata(),
            Markup::Doctype => self.handle_doctype(),
            Markup::Tag | Markup::EndTag => self.handle_tag(),
            Markup::ElementDecl
            | Markup::EntityDecl
            | Markup::AttlistDecl
            | Markup::NotationDecl
            | Markup::ConditionalSection => Err(SyntaxError::UnexpectedMarkup.into()),
        }
    }

    /// More input is required mid-construct. Inside an entity expansion no
    /// more input can ever arrive; a full document ring cannot make progress
    /// either and raises the construct's overflow error.
    fn need_more(&self, overflow: Option<Error>) -> Result<Step> {
        if self.rings.len() > 1 {
            return Err(EntityError::MissingEntityEnd.into());
        }
        if self.rings[0].free() == 0 {
            return Err(overflow.unwrap_or(Error::Internal));
        }
        Ok(Step::NeedData)
    }

    /// Runs a span search over the active ring starting at `from`.
    fn scan_active<S: SpanSearch>(&self, mut search: S, from: usize) -> Option<usize> {
        let ring = self.rings.last().expect("ring stack is never empty");
        let (a, b) = ring.slices();
        if from >= a.len() + b.len() {
            return None;
        }
        let (a2, b2): (&[u8], &[u8]) = if from < a.len() {
            (&a[from..], b)
        } else {
            (&b[from - a.len()..], &[])
        };
        parser::feed_slices(&mut search, a2, b2).map(|i| from + i)
    }

    /// Copies the first `len` ready bytes of the active ring into the
    /// working buffer.
    fn load_work(&mut self, len: usize, overflow: Error) -> Result<()> {
        if len > self.limits.work_cap {
            return Err(overflow);
        }
        self.work.clear();
        let ring = self.rings.last().expect("ring stack is never empty");
        ring.copy_into(&mut self.work, len);
        Ok(())
    }

    fn consume_active(&mut self, n: usize) {
        self.rings
            .last_mut()
            .expect("ring stack is never empty")
            .consume(n);
    }

    //------------------------------------------------------------------------
    // <?xml ...?> and <?pi ...?>
    //------------------------------------------------------------------------

    fn handle_declaration(&mut self) -> Result<Step> {
        let len = match self.scan_active(PiSearch::default(), 2) {
            Some(len) => len,
            None => return self.need_more(Some(CapacityError::DirectiveTooLarge.into())),
        };
        if self.prolog_done {
            return Err(SyntaxError::MisplacedXmlDecl.into());
        }
        self.prolog_done = true;
        self.load_work(len, CapacityError::DirectiveTooLarge.into())?;
        self.consume_active(len - 1);
        // The declaration target is exactly `xml`; case variants are reserved
        if &self.work[2..5] != b"xml" {
            return Err(SyntaxError::MisplacedXmlDecl.into());
        }
        let info = parse_xml_decl(&self.work[5..self.work.len() - 2])?;
        if let Some(label) = info.encoding {
            encoding::from_label(&label, self.bom_encoding)?;
        }
        if let Some(standalone) = info.standalone {
            self.standalone = standalone;
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }

    fn handle_pi(&mut self) -> Result<Step> {
        let len = match self.scan_active(PiSearch::default(), 2) {
            Some(len) => len,
            None => return self.need_more(Some(CapacityError::DirectiveTooLarge.into())),
        };
        self.load_work(len, CapacityError::DirectiveTooLarge.into())?;
        self.consume_active(len - 1);
        self.prolog_done = true;
        let inner_end = self.work.len() - 2;
        let mut pos = 2;
        if pos < inner_end && chars::is_whitespace(self.work[pos]) {
            return Err(SyntaxError::IllegalWhitespace.into());
        }
        let first = chars::name_start_char_len(&self.work[pos..inner_end]);
        if first == 0 {
            return Err(SyntaxError::MissingPiTarget.into());
        }
        pos += first;
        loop {
            let n = chars::name_char_len(&self.work[pos..inner_end]);
            if n == 0 {
                break;
            }
            pos += n;
        }
        let target = 2..pos;
        if self.work[target.clone()].eq_ignore_ascii_case(b"xml") {
            return Err(SyntaxError::MisplacedXmlDecl.into());
        }
        let data = if pos == inner_end {
            pos..pos
        } else {
            if !chars::is_whitespace(self.work[pos]) {
                return Err(SyntaxError::InvalidNameChar.into());
            }
            while pos < inner_end && chars::is_whitespace(self.work[pos]) {
                pos += 1;
            }
            check_chars(&self.work[pos..inner_end])?;
            pos..inner_end
        };
        if !self.silent() {
            self.current = CurrentEvent::Pi {
                target: target.clone(),
                data: data.clone(),
            };
            let event = Event::Pi {
                target: &self.work[target],
                data: &self.work[data],
            };
            if !self.handler.event(event) {
                return Err(CallbackError::Pi.into());
            }
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }

    //------------------------------------------------------------------------
    // <!-- ... --> and <![CDATA[ ... ]]>
    //------------------------------------------------------------------------

    fn handle_comment(&mut self) -> Result<Step> {
        let len = match self.scan_active(CommentSearch::default(), 4) {
            Some(len) => len,
            None => return self.need_more(Some(CapacityError::DirectiveTooLarge.into())),
        };
        self.load_work(len, CapacityError::DirectiveTooLarge.into())?;
        self.consume_active(len - 1);
        self.prolog_done = true;
        let body = 4..self.work.len() - 3;
        let bytes = &self.work[body.clone()];
        if memchr::memmem::find(bytes, b"--").is_some() || bytes.ends_with(b"-") {
            return Err(SyntaxError::DoubleHyphenInComment.into());
        }
        check_chars(bytes)?;
        if !self.silent() {
            self.current = CurrentEvent::Comment(body.clone());
            if !self.handler.event(Event::Comment(&self.work[body])) {
                return Err(CallbackError::Comment.into());
            }
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }

    fn handle_cdata(&mut self) -> Result<Step> {
        if !self.inside_element() {
            return Err(if self.reached_end {
                IllFormedError::ExtraContentAtTheEnd.into()
            } else {
                IllFormedError::DataWithoutStartTag.into()
            });
        }
        let len = match self.scan_active(CDataSearch::default(), 9) {
            Some(len) => len,
            None => return self.need_more(Some(CapacityError::TextTooLarge.into())),
        };
        self.load_work(len, CapacityError::TextTooLarge.into())?;
        self.consume_active(len - 1);
        let body = 9..self.work.len() - 3;
        check_chars(&self.work[body.clone()])?;
        if !self.silent() {
            self.current = CurrentEvent::CData(body.clone());
            if !self.handler.event(Event::CData(&self.work[body])) {
                return Err(CallbackError::Data.into());
            }
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }

    //------------------------------------------------------------------------
    // Tags
    //------------------------------------------------------------------------

    fn handle_tag(&mut self) -> Result<Step> {
        let len = match self.scan_active(QuotedSearch::default(), 0) {
            Some(len) => len,
            None => return self.need_more(Some(CapacityError::ElementTooLarge.into())),
        };
        self.prolog_done = true;
        self.load_work(len, CapacityError::ElementTooLarge.into())?;
        self.consume_active(len - 1);
        let parsed = tag::parse_tag(
            &self.work,
            &mut self.attrs,
            &mut self.scratch,
            &self.dtd,
            &self.limits,
        )?;
        let silent = self.silent();
        match parsed.kind {
            TagKind::Start | TagKind::Empty => {
                if !silent && self.reached_end {
                    return Err(IllFormedError::ExtraContentAtTheEnd.into());
                }
                self.paths
                    .last_mut()
                    .expect("path stack is never empty")
                    .push(&self.work[parsed.name.clone()])?;
                if !silent {
                    self.saw_root = true;
                    self.current = CurrentEvent::Start {
                        name: parsed.name.clone(),
                    };
                    let event = Event::Start {
                        name: &self.work[parsed.name.clone()],
                        attributes: Attributes {
                            names: &self.work,
                            values: &self.scratch,
                            spans: &self.attrs,
                        },
                    };
                    if !self.handler.event(event) {
                        return Err(CallbackError::StartElement.into());
                    }
                }
                if parsed.kind == TagKind::Empty {
                    // The synthetic end half follows only once the start half
                    // was accepted
                    if !silent {
                        self.current = CurrentEvent::End {
                            name: parsed.name.clone(),
                        };
                        let event = Event::End {
                            name: &self.work[parsed.name.clone()],
                        };
                        if !self.handler.event(event) {
                            return Err(CallbackError::EndElement.into());
                        }
                    }
                    self.pop_path(&parsed.name)?;
                }
            }
            TagKind::End => {
                let matches = self
                    .paths
                    .last()
                    .expect("path stack is never empty")
                    .top_is(&self.work[parsed.name.clone()]);
                if !matches {
                    // Inside an expansion an end tag may also try to close an
                    // element opened outside of the entity
                    let shadow_empty = self
                        .paths
                        .last()
                        .expect("path stack is never empty")
                        .is_empty();
                    return Err(if silent && shadow_empty {
                        EntityError::NotWellFormed.into()
                    } else {
                        IllFormedError::WrongNesting.into()
                    });
                }
                if !silent {
                    self.current = CurrentEvent::End {
                        name: parsed.name.clone(),
                    };
                    let event = Event::End {
                        name: &self.work[parsed.name.clone()],
                    };
                    if !self.handler.event(event) {
                        return Err(CallbackError::EndElement.into());
                    }
                }
                self.pop_path(&parsed.name)?;
            }
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }

    /// Pops the active path and tracks the end of the root element.
    fn pop_path(&mut self, name: &Range<usize>) -> Result<()> {
        {
            let path = self.paths.last_mut().expect("path stack is never empty");
            path.pop(&self.work[name.clone()])?;
        }
        if self.rings.len() == 1 && self.paths[0].is_empty() {
            self.reached_end = true;
        }
        Ok(())
    }

    //------------------------------------------------------------------------
    // Character data
    //------------------------------------------------------------------------

    fn step_text(&mut self) -> Result<Step> {
        let silent = self.silent();
        loop {
            if self.rings.last().expect("ring stack is never empty").is_empty() {
                if silent {
                    // The entity boundary ends the run; suppressed anyway
                    self.work.clear();
                    self.text_pending = false;
                    return Ok(Step::Progress);
                }
                return Ok(Step::NeedData);
            }
            let b = self.rings.last().expect("ring stack is never empty").get(0);
            if b == b'<' {
                return self.flush_text();
            }
            if !self.inside_element() {
                if chars::is_whitespace(b) {
                    // Whitespace outside the root element is not reported
                    self.consume_active(1);
                    self.prolog_done = true;
                    continue;
                }
                return Err(if self.reached_end {
                    IllFormedError::ExtraContentAtTheEnd.into()
                } else {
                    IllFormedError::DataWithoutStartTag.into()
                });
            }
            self.text_pending = true;
            if b == b'&' {
                match self.take_reference()? {
                    None => return Ok(Step::NeedData),
                    Some(len) => {
                        let expand = ExpandLimits {
                            cap: self.limits.work_cap,
                            overflow: CapacityError::TextTooLarge,
                            depth: self.limits.max_resolve_depth,
                        };
                        let outcome = escape::resolve_content_ref(
                            &self.refbuf[1..len - 1],
                            &mut self.work,
                            &self.dtd.entities,
                            self.dtd.allow_undeclared(),
                            &expand,
                        )?;
                        match outcome {
                            ContentRef::Inline => self.consume_active(len),
                            ContentRef::Left => {
                                self.found_external_entity = true;
                                self.consume_active(len);
                            }
                            ContentRef::Markup(idx) => {
                                self.consume_active(len);
                                // Text before the expansion point is its own
                                // event; the expansion itself is silent
                                if !silent && !self.work.is_empty() {
                                    self.current = CurrentEvent::Text(0..self.work.len());
                                    if !self.handler.event(Event::Text(&self.work)) {
                                        return Err(CallbackError::Data.into());
                                    }
                                }
                                self.text_pending = false;
                                let value =
                                    self.dtd.entities.get(idx).value().to_vec();
                                self.push_expansion(&value)?;
                                return Ok(Step::Progress);
                            }
                        }
                    }
                }
                continue;
            }
            if b == b']' {
                let ring = self.rings.last().expect("ring stack is never empty");
                if ring.ready() >= 3 {
                    if ring.get(1) == b']' && ring.get(2) == b'>' {
                        return Err(SyntaxError::CDataEndInContent.into());
                    }
                } else if !silent {
                    return Ok(Step::NeedData);
                }
            }
            // One character of plain text
            let mut seq = [0u8; 4];
            let avail = {
                let ring = self.rings.last().expect("ring stack is never empty");
                let n = ring.ready().min(4);
                for (i, slot) in seq.iter_mut().enumerate().take(n) {
                    *slot = ring.get(i);
                }
                n
            };
            let len = chars::char_len(&seq[..avail]);
            if len == 0 {
                if chars::seq_len(seq[0]) > avail && !silent {
                    // A multi-byte sequence split by the chunk boundary
                    return Ok(Step::NeedData);
                }
                return Err(SyntaxError::InvalidChar.into());
            }
            if self.work.len() + len > self.limits.work_cap {
                return Err(CapacityError::TextTooLarge.into());
            }
            self.work.extend_from_slice(&seq[..len]);
            self.consume_active(len);
        }
    }

    /// Reports the accumulated text run (silent runs are dropped).
    fn flush_text(&mut self) -> Result<Step> {
        self.text_pending = false;
        if self.work.is_empty() {
            return self.step_markup();
        }
        if !self.silent() {
            self.current = CurrentEvent::Text(0..self.work.len());
            if !self.handler.event(Event::Text(&self.work)) {
                return Err(CallbackError::Data.into());
            }
        }
        Ok(Step::Progress)
    }

    /// Copies the reference at the cursor into `refbuf` and scans it.
    ///
    /// `Ok(None)` means the terminating `;` has not arrived yet.
    fn take_reference(&mut self) -> Result<Option<usize>> {
        let max = self.limits.max_name_len + 4;
        self.refbuf.clear();
        {
            let ring = self.rings.last().expect("ring stack is never empty");
            let n = ring.ready().min(max);
            ring.copy_into(&mut self.refbuf, n);
        }
        // An expansion ring holds the complete replacement text already
        let at_end = self.rings.len() > 1;
        match escape::scan_reference(&self.refbuf, at_end)? {
            ScannedRef::Complete(len) => Ok(Some(len)),
            ScannedRef::Partial => {
                let ready = self.rings.last().expect("ring stack is never empty").ready();
                if ready > self.refbuf.len() {
                    Err(CapacityError::EntityNameTooLong.into())
                } else if self.rings.len() == 1 && self.rings[0].free() == 0 {
                    Err(SyntaxError::MissingSemicolon.into())
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Switches the engine into the replacement text of a parsed entity.
    fn push_expansion(&mut self, value: &[u8]) -> Result<()> {
        if self.rings.len() - 1 >= self.limits.max_resolve_depth {
            return Err(CapacityError::TooManyResolveSteps.into());
        }
        let mut ring = Ring::with_capacity(value.len().max(1));
        ring.push_normalized(value);
        self.rings.push(ring);
        self.paths.push(PathTracker::with_capacity(self.limits.path_cap));
        Ok(())
    }

    //------------------------------------------------------------------------
    // <!DOCTYPE> and the internal subset
    //------------------------------------------------------------------------

    fn handle_doctype(&mut self) -> Result<Step> {
        if self.saw_root || self.dtd.seen {
            return Err(SyntaxError::UnexpectedMarkup.into());
        }
        let delimiter = self.find_doctype_delimiter();
        let (opens_subset, at) = match delimiter {
            Some(found) => found,
            None => return self.need_more(Some(CapacityError::DtdPortionTooLarge.into())),
        };
        self.prolog_done = true;
        self.dtd.seen = true;
        self.load_work(at, CapacityError::DtdPortionTooLarge.into())?;
        self.consume_active(at);
        if &self.work[..9] != b"<!DOCTYPE" {
            return Err(DtdError::LowercaseKeyword.into());
        }
        let header = dtd::parse_doctype_header(&self.work[9..])?;
        let name = 9 + header.name.start..9 + header.name.end;
        self.dtd.root_name = self.work[name].to_vec();
        if header.has_external_id {
            self.dtd.has_external_subset = true;
        }
        if opens_subset {
            self.dtd_phase = Some(DtdPhase::Subset);
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }

    /// Finds the `[` opening the internal subset or the `>` closing the
    /// DOCTYPE, outside of quoted literals. Returns `(opens_subset, position)`.
    fn find_doctype_delimiter(&self) -> Option<(bool, usize)> {
        let ring = self.rings.last().expect("ring stack is never empty");
        let (a, b) = ring.slices();
        let from = 9usize;
        let (a2, b2): (&[u8], &[u8]) = if from < a.len() {
            (&a[from..], b)
        } else if from < a.len() + b.len() {
            (&b[from - a.len()..], &[])
        } else {
            (&[], &[])
        };
        let mut search = QuotedSearch::default();
        match search.find_subset_or_close(a2) {
            OneOf::Open(i) => Some((true, from + i)),
            OneOf::Close(i) => Some((false, from + i)),
            OneOf::None => match search.find_subset_or_close(b2) {
                OneOf::Open(i) => Some((true, from + a2.len() + i)),
                OneOf::Close(i) => Some((false, from + a2.len() + i)),
                OneOf::None => None,
            },
        }
    }

    fn step_dtd(&mut self, phase: DtdPhase) -> Result<Step> {
        // Leading whitespace between subset tokens is plain filler
        let mut skipped = 0;
        loop {
            let is_ws = {
                let ring = self.rings.last().expect("ring stack is never empty");
                !ring.is_empty() && chars::is_whitespace(ring.get(0))
            };
            if !is_ws {
                break;
            }
            self.consume_active(1);
            skipped += 1;
        }
        if self.rings.last().expect("ring stack is never empty").is_empty() {
            return if skipped > 0 {
                Ok(Step::Progress)
            } else {
                Ok(Step::NeedData)
            };
        }
        let b = self.rings.last().expect("ring stack is never empty").get(0);
        match phase {
            DtdPhase::AfterSubset => {
                if b == b'>' {
                    self.consume_active(1);
                    self.dtd_phase = None;
                    return Ok(Step::Progress);
                }
                Err(SyntaxError::WrongDirectiveEnd.into())
            }
            DtdPhase::Subset => match b {
                b']' => {
                    self.consume_active(1);
                    self.dtd_phase = Some(DtdPhase::AfterSubset);
                    Ok(Step::Progress)
                }
                b'%' => self.handle_pe_reference(),
                b'&' => Err(DtdError::GeneralEntityInDtd.into()),
                b'<' => {
                    let mut head = [0u8; 10];
                    let ready = {
                        let ring = self.rings.last().expect("ring stack is never empty");
                        let n = ring.ready().min(head.len());
                        for (i, slot) in head.iter_mut().enumerate().take(n) {
                            *slot = ring.get(i);
                        }
                        n
                    };
                    let markup = match parser::classify(&head[..ready])? {
                        Some(m) => m,
                        None => return self.need_more(None),
                    };
                    match markup {
                        Markup::Comment => self.handle_comment(),
                        Markup::Pi => self.handle_pi(),
                        Markup::ElementDecl
                        | Markup::EntityDecl
                        | Markup::AttlistDecl
                        | Markup::NotationDecl => self.handle_markup_decl(markup),
                        Markup::ConditionalSection => Err(Error::FeatureNotSupported),
                        _ => Err(SyntaxError::UnexpectedMarkup.into()),
                    }
                }
                _ => Err(SyntaxError::UnexpectedMarkup.into()),
            },
        }
    }

    fn handle_pe_reference(&mut self) -> Result<Step> {
        let len = match self.take_reference()? {
            Some(len) => len,
            None => return Ok(Step::NeedData),
        };
        let idx = match self.dtd.entities.position(&self.refbuf[1..len - 1], true) {
            Some(idx) => idx,
            None => return Err(EntityError::InvalidParameterEntity.into()),
        };
        self.consume_active(len);
        if self.dtd.entities.get(idx).external {
            // Declarations that follow may depend on the unread entity
            self.dtd.skip_markup_decls = true;
            self.found_external_entity = true;
            return Ok(Step::Progress);
        }
        let value = self.dtd.entities.get(idx).value().to_vec();
        self.push_expansion(&value)?;
        Ok(Step::Progress)
    }

    fn handle_markup_decl(&mut self, markup: Markup) -> Result<Step> {
        let prefix = markup.prefix_len();
        let len = match self.scan_active(QuotedSearch::default(), prefix) {
            Some(len) => len,
            None => return self.need_more(Some(CapacityError::DtdPortionTooLarge.into())),
        };
        self.load_work(len, CapacityError::DtdPortionTooLarge.into())?;
        self.consume_active(len - 1);
        let keyword: &[u8] = match markup {
            Markup::ElementDecl => b"<!ELEMENT",
            Markup::EntityDecl => b"<!ENTITY",
            Markup::AttlistDecl => b"<!ATTLIST",
            Markup::NotationDecl => b"<!NOTATION",
            _ => return Err(Error::Internal),
        };
        if &self.work[..prefix] != keyword {
            return Err(DtdError::LowercaseKeyword.into());
        }
        let in_pe = self.rings.len() > 1;
        let body_end = self.work.len() - 1;
        match markup {
            Markup::EntityDecl => {
                if !self.dtd.skip_markup_decls {
                    dtd::parse_entity_decl(
                        &self.work[prefix..body_end],
                        &mut self.dtd,
                        in_pe,
                        &self.limits,
                    )?;
                }
            }
            Markup::AttlistDecl => {
                if !self.dtd.skip_markup_decls {
                    dtd::parse_attlist_decl(
                        &self.work[prefix..body_end],
                        &mut self.dtd,
                        in_pe,
                        &self.limits,
                    )?;
                }
            }
            Markup::ElementDecl => {
                dtd::parse_element_decl(&self.work[prefix..body_end], in_pe, &self.limits)?;
            }
            Markup::NotationDecl => {
                let range = dtd::parse_notation_decl(&self.work[prefix..body_end], in_pe)?;
                let body = prefix + range.start..prefix + range.end;
                if !self.silent() {
                    self.current = CurrentEvent::Notation(body.clone());
                    if !self.handler.event(Event::Notation(&self.work[body])) {
                        return Err(CallbackError::Notation.into());
                    }
                }
            }
            _ => return Err(Error::Internal),
        }
        self.consume_active(1);
        Ok(Step::Progress)
    }
}

impl<H: Handler> std::fmt::Debug for Parser<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("encoding", &self.encoding())
            .field("line", &self.rings[0].line())
            .field("column", &self.rings[0].column())
            .field("path", &String::from_utf8_lossy(self.paths[0].as_bytes()))
            .field("error", &self.error)
            .finish()
    }
}

/// Validates a run of bytes against the `Char` production.
fn check_chars(bytes: &[u8]) -> Result<()> {
    if chars::all_chars(bytes) {
        Ok(())
    } else {
        Err(SyntaxError::InvalidChar.into())
    }
}

/// Pseudo-attributes recognized in the XML declaration.
#[derive(Debug, Eq, PartialEq)]
struct XmlDeclInfo {
    encoding: Option<Vec<u8>>,
    standalone: Option<bool>,
}

/// Parses the body of the XML declaration (between `<?xml` and `?>`),
/// enforcing the `version`, `encoding`, `standalone` order.
fn parse_xml_decl(body: &[u8]) -> Result<XmlDeclInfo> {
    let mut info = XmlDeclInfo {
        encoding: None,
        standalone: None,
    };
    let mut seen_version = false;
    let mut pos = 0;
    loop {
        let ws_start = pos;
        while pos < body.len() && chars::is_whitespace(body[pos]) {
            pos += 1;
        }
        if pos == body.len() {
            break;
        }
        if pos == ws_start && pos != 0 {
            return Err(SyntaxError::MissingWhitespace.into());
        }
        let name_start = pos;
        while pos < body.len() && body[pos].is_ascii_lowercase() {
            pos += 1;
        }
        let name = &body[name_start..pos];
        while pos < body.len() && chars::is_whitespace(body[pos]) {
            pos += 1;
        }
        if pos == body.len() || body[pos] != b'=' {
            return Err(SyntaxError::MissingEqual.into());
        }
        pos += 1;
        while pos < body.len() && chars::is_whitespace(body[pos]) {
            pos += 1;
        }
        let quote = match body.get(pos).copied() {
            Some(q @ b'"') | Some(q @ b'\'') => q,
            _ => return Err(SyntaxError::MissingQuote.into()),
        };
        pos += 1;
        let value_start = pos;
        let value_end = match memchr::memchr(quote, &body[pos..]) {
            Some(i) => pos + i,
            None => return Err(SyntaxError::QuoteMismatch.into()),
        };
        let value = &body[value_start..value_end];
        pos = value_end + 1;
        match name {
            b"version" if !seen_version => seen_version = true,
            b"encoding"
                if seen_version && info.encoding.is_none() && info.standalone.is_none() =>
            {
                info.encoding = Some(value.to_vec())
            }
            b"standalone" if seen_version && info.standalone.is_none() => {
                info.standalone = Some(match value {
                    b"yes" => true,
                    b"no" => false,
                    _ => return Err(SyntaxError::InvalidDeclOrder.into()),
                });
            }
            _ => return Err(SyntaxError::InvalidDeclOrder.into()),
        }
    }
    if !seen_version {
        return Err(SyntaxError::InvalidDeclOrder.into());
    }
    Ok(info)
}

/// Best-effort extraction of the `encoding` pseudo-attribute from a raw,
/// not-yet-converted XML declaration. The declaration proper is validated
/// later, when the engine parses it out of the ring.
fn scan_decl_encoding(decl: &[u8]) -> Option<Vec<u8>> {
    let at = memchr::memmem::find(decl, b"encoding")?;
    let mut pos = at + b"encoding".len();
    while decl.get(pos).copied().map_or(false, chars::is_whitespace) {
        pos += 1;
    }
    if decl.get(pos) != Some(&b'=') {
        return None;
    }
    pos += 1;
    while decl.get(pos).copied().map_or(false, chars::is_whitespace) {
        pos += 1;
    }
    let quote = match decl.get(pos).copied() {
        Some(q @ b'"') | Some(q @ b'\'') => q,
        _ => return None,
    };
    pos += 1;
    let end = memchr::memchr(quote, &decl[pos..])?;
    Some(decl[pos..pos + end].to_vec())
}
