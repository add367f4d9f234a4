//! Encoding detection and conversion into the input ring.
//!
//! The first bytes of a document are examined against the byte-order-mark
//! table of the XML specification (appendix F); everything the parser accepts
//! is converted to UTF-8 while it is appended to the ring. UTF-16 is decoded
//! incrementally through [`encoding_rs`]; ASCII and ISO-8859-1 fold in place
//! without a decoder state.

use encoding_rs::{Decoder, UTF_16BE, UTF_16LE};

use crate::errors::EncodingError;
use crate::ring::Ring;

/// Unicode "byte order mark" encoded as UTF-8.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
/// Unicode "byte order mark" encoded as UTF-16 with little-endian byte order.
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
/// Unicode "byte order mark" encoded as UTF-16 with big-endian byte order.
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// A document encoding the parser can convert.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// UTF-8 (also the default when nothing else is detected or declared).
    Utf8,
    /// UTF-16, little-endian.
    Utf16Le,
    /// UTF-16, big-endian.
    Utf16Be,
    /// US-ASCII; any byte above `0x7F` is rejected.
    Ascii,
    /// ISO-8859-1; bytes above `0x7F` expand to two-byte UTF-8 sequences.
    Latin1,
}

impl Encoding {
    /// The canonical IANA name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Ascii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Worst-case UTF-8 bytes produced per source byte, used by
    /// [`free_space`] to give callers a conservative feed bound.
    ///
    /// [`free_space`]: crate::Parser::free_space
    pub(crate) fn max_expansion(&self) -> usize {
        match self {
            Self::Utf8 | Self::Ascii => 1,
            Self::Latin1 => 2,
            Self::Utf16Le | Self::Utf16Be => 4,
        }
    }
}

/// Outcome of examining the first bytes of a document.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Detected {
    /// An encoding was identified; skip the given number of BOM bytes.
    Encoding(Encoding, usize),
    /// No BOM and no recognized pattern: assume the default encoding.
    Default,
    /// The document starts with `<?xm`: hold conversion until the XML
    /// declaration is complete and take the encoding from there.
    Declared,
    /// One of the UCS-4 byte orders (or, in an ASCII-only build, any
    /// non-ASCII scheme) was recognized; the parser rejects it.
    Unsupported,
}

/// Classifies the first four bytes of a document.
///
/// Returns `None` while fewer than four bytes are available. Match order
/// follows the specification: four-byte UCS-4 patterns first, then the
/// three-byte UTF-8 BOM, then the two-byte UTF-16 BOMs, then the BOM-less
/// `<?` patterns.
pub(crate) fn detect(prefix: &[u8]) -> Option<Detected> {
    if prefix.len() < 4 {
        return None;
    }
    let detected = match prefix {
        // UCS-4 in any byte order, with or without BOM
        [0x00, 0x00, 0xFE, 0xFF, ..]
        | [0xFF, 0xFE, 0x00, 0x00, ..]
        | [0x00, 0x00, 0xFF, 0xFE, ..]
        | [0xFE, 0xFF, 0x00, 0x00, ..]
        | [0x00, 0x00, 0x00, 0x3C, ..]
        | [0x3C, 0x00, 0x00, 0x00, ..] => Detected::Unsupported,

        _ if prefix.starts_with(UTF8_BOM) => Detected::Encoding(Encoding::Utf8, 3),
        _ if prefix.starts_with(UTF16_BE_BOM) => Detected::Encoding(Encoding::Utf16Be, 2),
        _ if prefix.starts_with(UTF16_LE_BOM) => Detected::Encoding(Encoding::Utf16Le, 2),

        // BOM-less UTF-16: `<?` in 16-bit code units
        [0x00, 0x3C, 0x00, 0x3F, ..] => Detected::Encoding(Encoding::Utf16Be, 0),
        [0x3C, 0x00, 0x3F, 0x00, ..] => Detected::Encoding(Encoding::Utf16Le, 0),

        // `<?xm` in an ASCII-compatible encoding: the declaration decides
        [b'<', b'?', b'x', b'm', ..] => Detected::Declared,

        _ => Detected::Default,
    };
    #[cfg(feature = "ascii-only")]
    let detected = match detected {
        Detected::Default | Detected::Declared => detected,
        _ => Detected::Unsupported,
    };
    Some(detected)
}

/// The encoding assumed when neither a BOM nor a declaration names one.
pub(crate) fn default_encoding() -> Encoding {
    #[cfg(feature = "ascii-only")]
    return Encoding::Ascii;
    #[cfg(not(feature = "ascii-only"))]
    Encoding::Utf8
}

/// Resolves the value of the `encoding` pseudo-attribute.
///
/// `bom` is the encoding detected from the byte prefix, if any; a label that
/// contradicts it is an [`EncodingError::Discrepancy`]. Unknown labels are
/// recognized and rejected.
pub(crate) fn from_label(
    label: &[u8],
    bom: Option<Encoding>,
) -> Result<Encoding, EncodingError> {
    let label = label.to_ascii_lowercase();
    let declared = match label.as_slice() {
        b"utf-8" | b"utf8" => Some(Encoding::Utf8),
        // Endianness comes from the BOM or the `<?` pattern
        b"utf-16" | b"utf-16le" | b"utf-16be" => None,
        b"us-ascii" | b"ascii" => Some(Encoding::Ascii),
        b"iso-8859-1" | b"latin1" => Some(Encoding::Latin1),
        _ => return Err(EncodingError::UnsupportedScheme),
    };
    #[cfg(feature = "ascii-only")]
    if !matches!(declared, Some(Encoding::Ascii)) {
        return Err(EncodingError::UnsupportedScheme);
    }
    match (declared, bom) {
        // No previous detection: the label decides. A bare `UTF-16` without
        // a BOM cannot be honored in an 8-bit stream.
        (Some(e), None) => Ok(e),
        (None, None) => Err(EncodingError::Discrepancy),

        (None, Some(e @ Encoding::Utf16Le)) | (None, Some(e @ Encoding::Utf16Be)) => Ok(e),
        (None, Some(_)) => Err(EncodingError::Discrepancy),

        // ASCII is a subset of UTF-8, everything else must agree exactly
        (Some(Encoding::Ascii), Some(Encoding::Utf8)) => Ok(Encoding::Ascii),
        (Some(e), Some(b)) if e == b => Ok(e),
        (Some(_), Some(_)) => Err(EncodingError::Discrepancy),
    }
}

/// Converts appended bytes from the detected encoding to UTF-8 inside the ring.
pub(crate) struct Transcoder {
    encoding: Encoding,
    utf16: Option<Decoder>,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Transcoder {
    pub(crate) fn new(encoding: Encoding) -> Self {
        let utf16 = match encoding {
            Encoding::Utf16Le => Some(UTF_16LE.new_decoder_without_bom_handling()),
            Encoding::Utf16Be => Some(UTF_16BE.new_decoder_without_bom_handling()),
            _ => None,
        };
        Self { encoding, utf16 }
    }

    pub(crate) fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Converts as much of `src` as fits into the ring.
    ///
    /// Returns the number of **source** bytes consumed; a short count means
    /// the ring is near full and the remainder must be offered again.
    pub(crate) fn write(&mut self, src: &[u8], ring: &mut Ring) -> Result<usize, EncodingError> {
        match self.encoding {
            Encoding::Utf8 => Ok(ring.push_normalized(src)),
            Encoding::Ascii => {
                let valid = src.iter().position(|&b| b >= 0x80).unwrap_or(src.len());
                let pushed = ring.push_normalized(&src[..valid]);
                if pushed == valid && valid < src.len() {
                    return Err(EncodingError::InvalidSequence);
                }
                Ok(pushed)
            }
            Encoding::Latin1 => {
                let mut consumed = 0;
                for &b in src {
                    if b < 0x80 {
                        if ring.push_normalized(&[b]) == 0 {
                            break;
                        }
                    } else {
                        if ring.free() < 2 {
                            break;
                        }
                        ring.push_normalized(&[0xC0 | (b >> 6), 0x80 | (b & 0x3F)]);
                    }
                    consumed += 1;
                }
                Ok(consumed)
            }
            Encoding::Utf16Le | Encoding::Utf16Be => self.write_utf16(src, ring),
        }
    }

    fn write_utf16(&mut self, src: &[u8], ring: &mut Ring) -> Result<usize, EncodingError> {
        use encoding_rs::DecoderResult;

        let decoder = match self.utf16.as_mut() {
            Some(d) => d,
            None => return Err(EncodingError::InvalidSequence),
        };
        let mut tmp = [0u8; 256];
        let mut consumed = 0;
        loop {
            let room = ring.free().min(tmp.len());
            if room == 0 {
                return Ok(consumed);
            }
            let (result, read, written) =
                decoder.decode_to_utf8_without_replacement(&src[consumed..], &mut tmp[..room], false);
            ring.push_normalized(&tmp[..written]);
            consumed += read;
            match result {
                DecoderResult::InputEmpty => return Ok(consumed),
                // Zero progress means the remaining room cannot hold even one
                // more character; treat the ring as full
                DecoderResult::OutputFull if read == 0 && written == 0 => return Ok(consumed),
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(..) => return Err(EncodingError::InvalidSequence),
            }
        }
    }
}
