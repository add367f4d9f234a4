//! Error management module.
//!
//! Parsing stops on the first error: the engine records the error together
//! with the line and column of the input cursor and stays in that state until
//! the parser is dropped.

use std::fmt;

/// A lexical or syntactic violation of the XML 1.0 grammar.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyntaxError {
    /// A byte sequence does not match the `Char` production.
    InvalidChar,
    /// A name begins with a character outside of the `NameStartChar` production.
    InvalidStartNameChar,
    /// A name continues with a character outside of the `NameChar` production.
    InvalidNameChar,
    /// `--` occurred inside a comment body (or the body ends with `-`).
    DoubleHyphenInComment,
    /// The `]]>` sequence occurred in character data outside of a CDATA section.
    CDataEndInContent,
    /// `=` is missing between an attribute name and its value.
    MissingEqual,
    /// An attribute value or literal is closed by the wrong quote character.
    QuoteMismatch,
    /// An attribute value does not start with a quote.
    MissingQuote,
    /// An attribute name is not followed by any value.
    MissingAttributeValue,
    /// A processing instruction has no target name.
    MissingPiTarget,
    /// A directive is not terminated the way its kind requires.
    WrongDirectiveEnd,
    /// `;` is missing after `&` or `%` in a reference.
    MissingSemicolon,
    /// Required whitespace between two tokens is absent.
    MissingWhitespace,
    /// Whitespace occurred where the grammar forbids it.
    IllegalWhitespace,
    /// A raw `<` occurred inside an attribute value.
    InvalidAttributeValue,
    /// The XML declaration pseudo-attributes are missing `version` or are
    /// out of order.
    InvalidDeclOrder,
    /// `<?xml` occurred somewhere else than at the very start of the document.
    MisplacedXmlDecl,
    /// `<!` is not followed by any recognized markup keyword.
    UnexpectedMarkup,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidChar => f.write_str("invalid XML character"),
            Self::InvalidStartNameChar => f.write_str("invalid start character of a name"),
            Self::InvalidNameChar => f.write_str("invalid character in a name"),
            Self::DoubleHyphenInComment => f.write_str("`--` is not allowed inside a comment"),
            Self::CDataEndInContent => f.write_str("`]]>` is not allowed in character data"),
            Self::MissingEqual => f.write_str("missing `=` after an attribute name"),
            Self::QuoteMismatch => f.write_str("quote characters do not match"),
            Self::MissingQuote => f.write_str("missing quote before an attribute value"),
            Self::MissingAttributeValue => f.write_str("missing attribute value"),
            Self::MissingPiTarget => f.write_str("missing processing instruction target"),
            Self::WrongDirectiveEnd => f.write_str("directive is not properly terminated"),
            Self::MissingSemicolon => f.write_str("missing `;` after a reference"),
            Self::MissingWhitespace => f.write_str("missing required whitespace"),
            Self::IllegalWhitespace => f.write_str("whitespace is not allowed here"),
            Self::InvalidAttributeValue => f.write_str("`<` is not allowed in an attribute value"),
            Self::InvalidDeclOrder => {
                f.write_str("XML declaration must list `version`, `encoding`, `standalone` in order")
            }
            Self::MisplacedXmlDecl => {
                f.write_str("XML declaration is only allowed at the start of the document")
            }
            Self::UnexpectedMarkup => f.write_str("unrecognized markup after `<!`"),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// A structural well-formedness violation: the document is lexically fine,
/// but its parts do not fit together.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IllFormedError {
    /// An end tag does not match the innermost open start tag.
    WrongNesting,
    /// Character data occurred outside of the root element.
    DataWithoutStartTag,
    /// Anything but whitespace, comments or processing instructions occurred
    /// after the root element was closed.
    ExtraContentAtTheEnd,
    /// The same attribute name occurred twice in one tag.
    RepeatedAttributeName,
    /// An end tag carries attributes.
    AttributeInEndTag,
}

impl fmt::Display for IllFormedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WrongNesting => f.write_str("end tag does not match the open element"),
            Self::DataWithoutStartTag => f.write_str("character data outside of the root element"),
            Self::ExtraContentAtTheEnd => f.write_str("extra content after the root element"),
            Self::RepeatedAttributeName => f.write_str("attribute name repeated in the same tag"),
            Self::AttributeInEndTag => f.write_str("end tag must not carry attributes"),
        }
    }
}

impl std::error::Error for IllFormedError {}

/// A failure to detect or convert the document encoding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EncodingError {
    /// The byte prefix identifies an encoding the parser does not support
    /// (for example one of the UCS-4 byte orders).
    UnsupportedScheme,
    /// The input is not a valid byte sequence of the detected encoding.
    InvalidSequence,
    /// The `encoding` pseudo-attribute contradicts the byte order mark.
    Discrepancy,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnsupportedScheme => f.write_str("unsupported encoding scheme"),
            Self::InvalidSequence => f.write_str("invalid byte sequence for the detected encoding"),
            Self::Discrepancy => f.write_str("declared encoding contradicts the byte order mark"),
        }
    }
}

impl std::error::Error for EncodingError {}

/// A violation of the DTD markup-declaration grammar inside `<!DOCTYPE>`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DtdError {
    /// A declaration misses a required portion (name, literal, keyword).
    MissingPortion,
    /// `PUBLIC` is not followed by a system literal.
    MissingSystemId,
    /// The attribute type in `<!ATTLIST>` is not one of the ten defined types.
    InvalidAttributeType,
    /// The default declaration is not `#REQUIRED`, `#IMPLIED`, `#FIXED` or a literal.
    InvalidDefaultDecl,
    /// A DTD keyword was written in lowercase.
    LowercaseKeyword,
    /// A general entity reference occurred directly inside the DTD.
    GeneralEntityInDtd,
    /// A parameter-entity reference occurred inside a markup declaration of
    /// the internal subset.
    PeReferenceInInternalSubset,
    /// An operator in a content model is misplaced.
    InvalidOperator,
    /// Connectors of one content-model group are mixed (`,` with `|`).
    MissingSeparator,
}

impl fmt::Display for DtdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingPortion => f.write_str("DTD declaration is missing a portion"),
            Self::MissingSystemId => f.write_str("missing system literal after `PUBLIC`"),
            Self::InvalidAttributeType => f.write_str("invalid attribute type in `<!ATTLIST>`"),
            Self::InvalidDefaultDecl => f.write_str("invalid default declaration in `<!ATTLIST>`"),
            Self::LowercaseKeyword => f.write_str("DTD keywords must be uppercase"),
            Self::GeneralEntityInDtd => {
                f.write_str("general entity reference is not allowed inside the DTD")
            }
            Self::PeReferenceInInternalSubset => {
                f.write_str("parameter-entity reference inside a markup declaration")
            }
            Self::InvalidOperator => f.write_str("misplaced operator in a content model"),
            Self::MissingSeparator => f.write_str("mixed connectors in a content-model group"),
        }
    }
}

impl std::error::Error for DtdError {}

/// A failure while resolving entity or character references.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntityError {
    /// An entity expansion reaches the entity itself again.
    RecursiveEntity,
    /// A parameter entity is referenced but was never declared.
    InvalidParameterEntity,
    /// A character reference is split across a construct boundary.
    PartialCharacterReference,
    /// The replacement text of an entity brings a raw `<` into an attribute value.
    InvalidDirectReference,
    /// The input ended inside an entity expansion.
    MissingEntityEnd,
    /// The replacement text of a parsed entity starts markup it does not close.
    NotWellFormed,
    /// A character reference denotes a code point that is not an XML character,
    /// or a general entity reference cannot be resolved.
    InvalidReference,
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RecursiveEntity => f.write_str("entity refers to itself"),
            Self::InvalidParameterEntity => {
                f.write_str("reference to an undeclared parameter entity")
            }
            Self::PartialCharacterReference => f.write_str("partial character reference"),
            Self::InvalidDirectReference => {
                f.write_str("entity replacement text brings `<` into an attribute value")
            }
            Self::MissingEntityEnd => f.write_str("input ended inside an entity"),
            Self::NotWellFormed => f.write_str("parsed entity is not well-formed"),
            Self::InvalidReference => f.write_str("invalid reference"),
        }
    }
}

impl std::error::Error for EntityError {}

/// A fixed buffer or table of the parser instance is exhausted.
///
/// Every variant names the [`Limits`] field to raise.
///
/// [`Limits`]: crate::Limits
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CapacityError {
    /// A tag does not fit into the working buffer (`work_cap`).
    ElementTooLarge,
    /// An element name exceeds `max_name_len`.
    ElementNameTooLong,
    /// An attribute name exceeds `max_name_len`.
    AttributeNameTooLong,
    /// A run of character data does not fit into the working buffer (`work_cap`).
    TextTooLarge,
    /// A DTD markup declaration does not fit into the working buffer (`work_cap`).
    DtdPortionTooLarge,
    /// A directive does not fit into the working buffer (`work_cap`).
    DirectiveTooLarge,
    /// A tag carries more than `max_attrs` attributes.
    TooManyAttributes,
    /// More than `max_attlist_decls` attribute definitions were declared.
    TooManyAttlistDecls,
    /// More than `max_entities` entities were declared.
    TooManyEntities,
    /// An entity name exceeds `max_name_len`.
    EntityNameTooLong,
    /// An entity value exceeds `max_entity_value_len`.
    EntityValueTooLong,
    /// A content model nests more than `max_operators` groups.
    TooManyOperators,
    /// Reference resolution did not reach a fixed point in `max_resolve_depth`
    /// rounds.
    TooManyResolveSteps,
    /// Pushing an element name would exceed `path_cap`.
    PathTooLong,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ElementTooLarge => f.write_str("tag does not fit into the working buffer"),
            Self::ElementNameTooLong => f.write_str("element name is too long"),
            Self::AttributeNameTooLong => f.write_str("attribute name is too long"),
            Self::TextTooLarge => f.write_str("character data does not fit into the working buffer"),
            Self::DtdPortionTooLarge => {
                f.write_str("DTD declaration does not fit into the working buffer")
            }
            Self::DirectiveTooLarge => f.write_str("directive does not fit into the working buffer"),
            Self::TooManyAttributes => f.write_str("too many attributes in one tag"),
            Self::TooManyAttlistDecls => f.write_str("too many attribute-list declarations"),
            Self::TooManyEntities => f.write_str("too many entity declarations"),
            Self::EntityNameTooLong => f.write_str("entity name is too long"),
            Self::EntityValueTooLong => f.write_str("entity value is too long"),
            Self::TooManyOperators => f.write_str("content model nests too deeply"),
            Self::TooManyResolveSteps => f.write_str("too many entity resolving rounds"),
            Self::PathTooLong => f.write_str("element path is too long"),
        }
    }
}

impl std::error::Error for CapacityError {}

/// The application callback rejected an event of the named kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallbackError {
    /// A start-element event was rejected.
    StartElement,
    /// An end-element event was rejected.
    EndElement,
    /// A text or CDATA event was rejected.
    Data,
    /// A comment event was rejected.
    Comment,
    /// A processing-instruction event was rejected.
    Pi,
    /// A notation event was rejected.
    Notation,
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            Self::StartElement => "start-element",
            Self::EndElement => "end-element",
            Self::Data => "data",
            Self::Comment => "comment",
            Self::Pi => "processing-instruction",
            Self::Notation => "notation",
        };
        write!(f, "application rejected a {} event", kind)
    }
}

impl std::error::Error for CallbackError {}

/// The error type used by this crate.
///
/// An error is recorded once and is sticky: after the first error the engine
/// reports [`Status::Error`] from every subsequent [`step`] call.
///
/// [`Status::Error`]: crate::Status::Error
/// [`step`]: crate::Parser::step
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The document violates a lexical or syntactic rule.
    Syntax(SyntaxError),
    /// The document is structurally not well-formed.
    IllFormed(IllFormedError),
    /// The document encoding could not be detected or converted.
    Encoding(EncodingError),
    /// A DTD markup declaration is malformed.
    Dtd(DtdError),
    /// A reference could not be resolved.
    Entity(EntityError),
    /// A fixed buffer or table is exhausted.
    Capacity(CapacityError),
    /// The application callback rejected an event.
    Callback(CallbackError),
    /// The document uses a recognized XML feature this parser does not
    /// implement (conditional sections).
    FeatureNotSupported,
    /// The engine reached a state it considers impossible.
    Internal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Syntax(e) => write!(f, "syntax error: {}", e),
            Self::IllFormed(e) => write!(f, "ill-formed document: {}", e),
            Self::Encoding(e) => write!(f, "encoding error: {}", e),
            Self::Dtd(e) => write!(f, "malformed DTD: {}", e),
            Self::Entity(e) => write!(f, "entity error: {}", e),
            Self::Capacity(e) => write!(f, "capacity exceeded: {}", e),
            Self::Callback(e) => write!(f, "{}", e),
            Self::FeatureNotSupported => f.write_str("feature is not supported by this parser"),
            Self::Internal => f.write_str("internal parser error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax(e) => Some(e),
            Self::IllFormed(e) => Some(e),
            Self::Encoding(e) => Some(e),
            Self::Dtd(e) => Some(e),
            Self::Entity(e) => Some(e),
            Self::Capacity(e) => Some(e),
            Self::Callback(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyntaxError> for Error {
    #[inline]
    fn from(error: SyntaxError) -> Self {
        Self::Syntax(error)
    }
}

impl From<IllFormedError> for Error {
    #[inline]
    fn from(error: IllFormedError) -> Self {
        Self::IllFormed(error)
    }
}

impl From<EncodingError> for Error {
    #[inline]
    fn from(error: EncodingError) -> Self {
        Self::Encoding(error)
    }
}

impl From<DtdError> for Error {
    #[inline]
    fn from(error: DtdError) -> Self {
        Self::Dtd(error)
    }
}

impl From<EntityError> for Error {
    #[inline]
    fn from(error: EntityError) -> Self {
        Self::Entity(error)
    }
}

impl From<CapacityError> for Error {
    #[inline]
    fn from(error: CapacityError) -> Self {
        Self::Capacity(error)
    }
}

impl From<CallbackError> for Error {
    #[inline]
    fn from(error: CallbackError) -> Self {
        Self::Callback(error)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
