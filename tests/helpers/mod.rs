//! Utility functions for integration tests.
#![allow(dead_code)]

use picosax::{Event, EventKind, Handler, Limits, Parser, Status};

/// An owned copy of one dispatched event, for comparing whole sequences.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ev {
    Start(String, Vec<(String, String)>),
    End(String),
    Text(String),
    CData(String),
    Comment(String),
    Pi(String, String),
    Notation(String),
}

fn s(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collects events; optionally rejects every event of one kind.
#[derive(Default)]
pub struct Sink {
    pub events: Vec<Ev>,
    pub reject: Option<EventKind>,
}

impl Sink {
    pub fn rejecting(kind: EventKind) -> Self {
        Self {
            events: Vec::new(),
            reject: Some(kind),
        }
    }
}

impl Handler for Sink {
    fn event(&mut self, event: Event<'_>) -> bool {
        let rejected = self.reject == Some(event.kind());
        self.events.push(match event {
            Event::Start { name, attributes } => Ev::Start(
                s(name),
                attributes.iter().map(|a| (s(a.key), s(a.value))).collect(),
            ),
            Event::End { name } => Ev::End(s(name)),
            Event::Text(body) => Ev::Text(s(body)),
            Event::CData(body) => Ev::CData(s(body)),
            Event::Comment(body) => Ev::Comment(s(body)),
            Event::Pi { target, data } => Ev::Pi(s(target), s(data)),
            Event::Notation(body) => Ev::Notation(s(body)),
        });
        !rejected
    }
}

/// Feeds `xml` in chunks of `chunk_size` bytes, stepping between feeds, and
/// returns the final status.
pub fn drive(parser: &mut Parser<Sink>, xml: &[u8], chunk_size: usize) -> Status {
    let mut status = Status::NeedData;
    for chunk in xml.chunks(chunk_size.max(1)) {
        let mut offset = 0;
        while offset < chunk.len() {
            let taken = match parser.feed(&chunk[offset..]) {
                Ok(n) => n,
                Err(_) => return Status::Error,
            };
            offset += taken;
            loop {
                status = parser.step();
                if status != Status::Continue {
                    break;
                }
            }
            if status == Status::Error {
                return status;
            }
            assert!(
                taken > 0 || status != Status::NeedData,
                "parser made no progress"
            );
        }
    }
    loop {
        status = parser.step();
        if status != Status::Continue {
            break;
        }
    }
    status
}

/// Parses the whole document in one feed.
pub fn parse(xml: &str) -> (Vec<Ev>, Status) {
    parse_chunked(xml, xml.len().max(1))
}

/// Parses the document fed in `chunk_size`-byte pieces.
pub fn parse_chunked(xml: &str, chunk_size: usize) -> (Vec<Ev>, Status) {
    let mut parser = Parser::new(Sink::default());
    let status = drive(&mut parser, xml.as_bytes(), chunk_size);
    (parser.into_handler().events, status)
}

/// Parses a document that must fail, returning the error and its position.
pub fn expect_error(xml: &str) -> (picosax::Error, u32, u32) {
    let mut parser = Parser::new(Sink::default());
    let status = drive(&mut parser, xml.as_bytes(), xml.len().max(1));
    assert_eq!(status, Status::Error, "expected a parse error for {:?}", xml);
    (
        parser.last_error().expect("error recorded"),
        parser.error_line(),
        parser.error_column(),
    )
}

/// Parses with explicit limits.
pub fn parse_with_limits(xml: &str, limits: Limits) -> (Vec<Ev>, Status, Option<picosax::Error>) {
    let mut parser = Parser::with_limits(Sink::default(), limits);
    let status = drive(&mut parser, xml.as_bytes(), xml.len().max(1));
    let error = parser.last_error();
    (parser.into_handler().events, status, error)
}
