//! Incremental, event-driven XML 1.0 parser with bounded memory, intended
//! for resource-constrained targets.
//!
//! ## Description
//!
//! - [`Parser`]: a push parser; feed bytes in arbitrary chunks, step the
//!   engine, receive events through a callback
//! - [`Event`]: the recognized constructs (start/end tags, text, CDATA,
//!   comments, processing instructions, notations)
//!
//! The parser never buffers the whole document: its working memory is a set
//! of fixed buffers sized through [`Limits`]. Input may arrive as UTF-8,
//! UTF-16 (either byte order), US-ASCII or ISO-8859-1; everything is
//! converted to UTF-8 on the way into the input ring. Well-formedness is
//! checked against the XML 1.0 productions; DTD internal subsets are scanned
//! and their entities resolved, but documents are never validated against
//! them and external entities are never fetched.
//!
//! ## Example
//!
//! ```rust
//! use picosax::{Event, Parser, Status};
//!
//! let xml = "<greeting lang='en'>hello <b>world</b></greeting>";
//!
//! let mut depth = 0usize;
//! let mut text = Vec::new();
//! let mut parser = Parser::new(|event: Event<'_>| {
//!     match event {
//!         Event::Start { .. } => depth += 1,
//!         Event::End { .. } => depth -= 1,
//!         Event::Text(body) => text.extend_from_slice(body),
//!         _ => {}
//!     }
//!     true // accept the event
//! });
//!
//! parser.feed(xml.as_bytes()).unwrap();
//! loop {
//!     match parser.step() {
//!         Status::Continue => {}
//!         Status::Finished => break,
//!         Status::NeedData => panic!("document is truncated"),
//!         Status::Error => panic!("{}", parser.last_error().unwrap()),
//!     }
//! }
//! assert_eq!(text, b"hello world");
//! ```
//!
//! # Features
//!
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!(
        feature_label = "<a id=\"{feature}\" href=\"#{feature}\"><strong><code>{feature}</code></strong></a>"
    ))
)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chars;
mod dtd;
mod encoding;
mod escape;
mod parser;
mod path;
mod ring;
mod tag;

pub mod errors;
pub mod events;
pub mod reader;

pub use encoding::Encoding;
pub use errors::{Error, Result};
pub use events::{Attribute, Attributes, Event, EventKind};
pub use reader::{Handler, Limits, Parser, Status};
