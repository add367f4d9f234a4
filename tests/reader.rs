//! End-to-end tests of the event stream produced for well-formed documents.

use picosax::{Event, EventKind, Parser, Status};
use pretty_assertions::assert_eq;

mod helpers;
use helpers::{drive, parse, parse_chunked, Ev, Sink};

#[test]
fn declaration_and_empty_root() {
    let (events, status) = parse("<?xml version=\"1.0\"?><r/>");
    // The declaration itself produces no event
    assert_eq!(
        events,
        [Ev::Start("r".into(), vec![]), Ev::End("r".into())]
    );
    assert_eq!(status, Status::Finished);
}

#[test]
fn attributes_and_references() {
    let (events, status) = parse("<a x=\"1\" y='2'>hi&amp;bye</a>");
    assert_eq!(
        events,
        [
            Ev::Start(
                "a".into(),
                vec![("x".into(), "1".into()), ("y".into(), "2".into())]
            ),
            Ev::Text("hi&bye".into()),
            Ev::End("a".into()),
        ]
    );
    assert_eq!(status, Status::Finished);
}

#[test]
fn nested_elements() {
    let (events, status) = parse("<a><b/></a>");
    assert_eq!(
        events,
        [
            Ev::Start("a".into(), vec![]),
            Ev::Start("b".into(), vec![]),
            Ev::End("b".into()),
            Ev::End("a".into()),
        ]
    );
    assert_eq!(status, Status::Finished);
}

#[test]
fn path_is_tracked() {
    let mut parser = Parser::new(Sink::default());
    parser.feed(b"<a><b>x</b></a>").unwrap();

    assert_eq!(parser.step(), Status::Continue); // <a>
    assert_eq!(parser.current_path(), b"a");
    assert_eq!(parser.step(), Status::Continue); // <b>
    assert_eq!(parser.current_path(), b"a\\b");
    assert_eq!(parser.step(), Status::Continue); // x
    assert_eq!(parser.current_path(), b"a\\b");
    assert_eq!(parser.step(), Status::Continue); // </b>
    assert_eq!(parser.current_path(), b"a");
    assert_eq!(parser.step(), Status::Finished); // </a>
    assert_eq!(parser.current_path(), b"");
}

#[test]
fn character_and_predefined_references() {
    let (events, _) = parse("<a>&lt;&#65;&#x42;&gt;</a>");
    assert_eq!(events[1], Ev::Text("<AB>".into()));
}

#[test]
fn cdata_is_verbatim() {
    let (events, status) = parse("<a><![CDATA[<not>&markup;]]></a>");
    assert_eq!(events[1], Ev::CData("<not>&markup;".into()));
    assert_eq!(status, Status::Finished);
}

#[test]
fn comments_and_pis() {
    let (events, status) = parse("<?style sheet='x'?><!--intro--><a/><!--outro--><?done?>");
    assert_eq!(
        events,
        [
            Ev::Pi("style".into(), "sheet='x'".into()),
            Ev::Comment("intro".into()),
            Ev::Start("a".into(), vec![]),
            Ev::End("a".into()),
            Ev::Comment("outro".into()),
            Ev::Pi("done".into(), "".into()),
        ]
    );
    assert_eq!(status, Status::Finished);
}

#[test]
fn whitespace_around_root_is_dropped() {
    let (events, status) = parse("  \n <a>inner</a> \n ");
    assert_eq!(
        events,
        [
            Ev::Start("a".into(), vec![]),
            Ev::Text("inner".into()),
            Ev::End("a".into()),
        ]
    );
    assert_eq!(status, Status::Finished);
}

#[test]
fn line_endings_are_normalized() {
    let (events, _) = parse("<a>1\r\n2\r3\n4</a>");
    assert_eq!(events[1], Ev::Text("1\n2\n3\n4".into()));
}

#[test]
fn multibyte_text() {
    let (events, _) = parse("<a>grüße 漢字 𝄞</a>");
    assert_eq!(events[1], Ev::Text("grüße 漢字 𝄞".into()));
}

const CHUNKING_SAMPLE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<!DOCTYPE root [\
<!ENTITY greet \"hello\">\
<!ELEMENT root (item)*>\
<!ATTLIST root version CDATA #IMPLIED>\
]>\
<!--header-->\
<root version=\"1.0\">\
<item id=\"1\">&greet; world</item>\
<item id=\"2\"><![CDATA[a ]] b]]></item>\
<?proc data?>\
text &amp; more\
</root>\
<!--trailer-->";

/// Feeding the same document split at any byte boundary yields the same
/// event sequence.
#[test]
fn chunking_invariance() {
    let (expected, status) = parse(CHUNKING_SAMPLE);
    assert_eq!(status, Status::Finished);
    assert!(expected.len() > 10);
    for chunk_size in [1, 2, 3, 5, 7, 11, 13, 64] {
        let (events, status) = parse_chunked(CHUNKING_SAMPLE, chunk_size);
        assert_eq!(status, Status::Finished, "chunk size {}", chunk_size);
        assert_eq!(events, expected, "chunk size {}", chunk_size);
    }
}

#[test]
fn accessors_reflect_the_last_event() {
    let mut parser = Parser::new(Sink::default());
    parser.feed(b"<a x='1'>body</a>").unwrap();

    assert_eq!(parser.event_kind(), None);
    assert_eq!(parser.step(), Status::Continue);
    assert_eq!(parser.event_kind(), Some(EventKind::Start));
    assert_eq!(parser.element_name(), Some(&b"a"[..]));
    assert_eq!(parser.attribute_count(), 1);
    assert_eq!(parser.attribute_name(0), Some(&b"x"[..]));
    assert_eq!(parser.attribute_value(0), Some(&b"1"[..]));
    assert_eq!(parser.attribute_name(1), None);
    assert_eq!(parser.text(), None);

    assert_eq!(parser.step(), Status::Continue);
    assert_eq!(parser.event_kind(), Some(EventKind::Text));
    assert_eq!(parser.text(), Some(&b"body"[..]));
    assert_eq!(parser.attribute_count(), 0);

    assert_eq!(parser.step(), Status::Finished);
    assert_eq!(parser.event_kind(), Some(EventKind::End));
    assert_eq!(parser.element_name(), Some(&b"a"[..]));
}

#[test]
fn incomplete_cdata_keeps_asking_for_data() {
    let mut parser = Parser::new(Sink::default());
    parser.feed(b"<a><![CDATA[never ending").unwrap();
    assert_eq!(parser.step(), Status::Continue); // <a>
    for _ in 0..8 {
        assert_eq!(parser.step(), Status::NeedData);
    }
    assert_eq!(parser.handler().events.len(), 1);
}

#[test]
fn empty_document_needs_data() {
    let mut parser = Parser::new(Sink::default());
    assert_eq!(parser.step(), Status::NeedData);
    parser.feed(b"<r></r").unwrap();
    parser.step();
    assert_eq!(parser.step(), Status::NeedData);
    parser.feed(b">").unwrap();
    assert_eq!(parser.step(), Status::Finished);
}

#[test]
fn standalone_flag_is_recorded() {
    let mut parser = Parser::new(Sink::default());
    assert!(!parser.standalone());
    let status = drive(
        &mut parser,
        b"<?xml version='1.0' standalone='yes'?><r/>",
        64,
    );
    assert_eq!(status, Status::Finished);
    assert!(parser.standalone());
}

#[test]
fn free_space_shrinks_and_recovers() {
    let mut parser = Parser::new(Sink::default());
    let before = parser.free_space();
    parser.feed(b"<a>some text").unwrap();
    assert!(parser.free_space() < before);
    while parser.step() == Status::Continue {}
    assert_eq!(parser.free_space(), before);
}

#[test]
fn rejected_start_event_stops_the_parse() {
    use picosax::errors::CallbackError;

    let mut parser = Parser::new(Sink::rejecting(EventKind::Start));
    parser.feed(b"<a/>").unwrap();
    assert_eq!(parser.step(), Status::Error);
    assert_eq!(
        parser.last_error(),
        Some(picosax::Error::Callback(CallbackError::StartElement))
    );
    // The synthetic end half is never delivered after the rejection
    assert_eq!(parser.handler().events, [Ev::Start("a".into(), vec![])]);
    // The error is sticky
    assert_eq!(parser.step(), Status::Error);
}

#[test]
fn rejected_data_event_maps_to_data_error() {
    use picosax::errors::CallbackError;

    let mut parser = Parser::new(Sink::rejecting(EventKind::Text));
    parser.feed(b"<a>text</a>").unwrap();
    assert_eq!(parser.step(), Status::Continue);
    assert_eq!(parser.step(), Status::Error);
    assert_eq!(
        parser.last_error(),
        Some(picosax::Error::Callback(CallbackError::Data))
    );
}

#[test]
fn closure_handlers_work() {
    let mut count = 0usize;
    {
        let mut parser = Parser::new(|event: Event<'_>| {
            if matches!(event.kind(), EventKind::Start) {
                count += 1;
            }
            true
        });
        parser.feed(b"<a><b/><c/></a>").unwrap();
        while parser.step() == Status::Continue {}
    }
    assert_eq!(count, 3);
}
