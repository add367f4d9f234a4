//! The event model.
//!
//! Whenever the engine recognizes a complete construct it hands the
//! application exactly one [`Event`]. Events borrow from the parser's working
//! buffers: they are valid for the duration of the callback and invalidated
//! by the next [`step`].
//!
//! All payloads are byte slices. Names were validated against the XML name
//! productions and text content against the `Char` production, so the slices
//! always hold well-formed UTF-8; `std::str::from_utf8` on them cannot fail.
//!
//! [`step`]: crate::Parser::step

use std::fmt;
use std::ops::Range;

/// Byte range of one attribute: the name lives in the working buffer, the
/// normalized value in the scratch buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct AttrSpan {
    pub(crate) name: Range<usize>,
    pub(crate) value: Range<usize>,
}

/// A single key/value attribute of a start tag.
///
/// The value is fully normalized: line endings and whitespace substituted,
/// references resolved, and, for attributes declared with a tokenized type,
/// space runs collapsed.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Attribute<'a> {
    /// The attribute name.
    pub key: &'a [u8],
    /// The normalized attribute value.
    pub value: &'a [u8],
}

impl<'a> fmt::Debug for Attribute<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Attribute {{ key: {:?}, value: {:?} }}",
            String::from_utf8_lossy(self.key),
            String::from_utf8_lossy(self.value)
        )
    }
}

/// View over the attributes of a start tag, in document order.
#[derive(Copy, Clone)]
pub struct Attributes<'a> {
    pub(crate) names: &'a [u8],
    pub(crate) values: &'a [u8],
    pub(crate) spans: &'a [AttrSpan],
}

impl<'a> Attributes<'a> {
    /// Number of attributes in the tag.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` when the tag carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The `i`-th attribute, if any.
    pub fn get(&self, i: usize) -> Option<Attribute<'a>> {
        let span = self.spans.get(i)?;
        Some(Attribute {
            key: &self.names[span.name.clone()],
            value: &self.values[span.value.clone()],
        })
    }

    /// The value of the attribute with the given name.
    pub fn value_of(&self, name: &[u8]) -> Option<&'a [u8]> {
        self.iter().find(|a| a.key == name).map(|a| a.value)
    }

    /// Iterates over the attributes in document order.
    pub fn iter(&self) -> AttributesIter<'a> {
        AttributesIter {
            attributes: *self,
            index: 0,
        }
    }
}

impl<'a> fmt::Debug for Attributes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for Attributes<'a> {
    type Item = Attribute<'a>;
    type IntoIter = AttributesIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over [`Attributes`].
pub struct AttributesIter<'a> {
    attributes: Attributes<'a>,
    index: usize,
}

impl<'a> Iterator for AttributesIter<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let attr = self.attributes.get(self.index)?;
        self.index += 1;
        Some(attr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.attributes.len() - self.index;
        (rest, Some(rest))
    }
}

/// Discriminant of an [`Event`], reported by [`event_kind`].
///
/// [`event_kind`]: crate::Parser::event_kind
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventKind {
    /// A start tag (or the start half of an empty-element tag).
    Start,
    /// An end tag (or the end half of an empty-element tag).
    End,
    /// Character data between tags, references resolved.
    Text,
    /// The body of a CDATA section, verbatim.
    CData,
    /// The body of a comment.
    Comment,
    /// A processing instruction.
    Pi,
    /// A notation declaration from the DTD.
    Notation,
}

/// One recognized syntactic construct, emitted through the [`Handler`].
///
/// An empty-element tag `<a/>` produces the synthetic pair `Start` then
/// `End`, in that order; `End` is only delivered if the callback accepted
/// the `Start`.
///
/// [`Handler`]: crate::Handler
#[derive(Debug)]
pub enum Event<'a> {
    /// A start tag with its normalized attributes.
    Start {
        /// The element name.
        name: &'a [u8],
        /// The attributes in document order.
        attributes: Attributes<'a>,
    },
    /// An end tag.
    End {
        /// The element name.
        name: &'a [u8],
    },
    /// Character data between tags, with references resolved and line
    /// endings normalized.
    Text(&'a [u8]),
    /// The body of a `<![CDATA[...]]>` section, verbatim.
    CData(&'a [u8]),
    /// The body of a `<!--...-->` comment.
    Comment(&'a [u8]),
    /// A processing instruction.
    Pi {
        /// The target name.
        target: &'a [u8],
        /// Everything between the target and `?>`, possibly empty.
        data: &'a [u8],
    },
    /// The body of a `<!NOTATION ...>` declaration.
    Notation(&'a [u8]),
}

impl<'a> Event<'a> {
    /// The discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::End { .. } => EventKind::End,
            Self::Text(_) => EventKind::Text,
            Self::CData(_) => EventKind::CData,
            Self::Comment(_) => EventKind::Comment,
            Self::Pi { .. } => EventKind::Pi,
            Self::Notation(_) => EventKind::Notation,
        }
    }
}
