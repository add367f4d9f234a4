//! Tests of `<!DOCTYPE>` handling: the internal subset, entity resolution,
//! attribute-list driven normalization and notation events.

use picosax::errors::{DtdError, EntityError, Error, SyntaxError};
use picosax::{Parser, Status};
use pretty_assertions::assert_eq;

mod helpers;
use helpers::{drive, expect_error, parse, Ev, Sink};

mod doctype {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_only() {
        let (events, status) = parse("<!DOCTYPE r><r/>");
        assert_eq!(
            events,
            [Ev::Start("r".into(), vec![]), Ev::End("r".into())]
        );
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn empty_subset() {
        let (_, status) = parse("<!DOCTYPE r [ ]><r/>");
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn external_id_is_recorded_not_fetched() {
        let mut parser = Parser::new(Sink::default());
        let status = drive(&mut parser, b"<!DOCTYPE r SYSTEM \"ext.dtd\"><r/>", 64);
        assert_eq!(status, Status::Finished);
        assert_eq!(parser.doctype_name(), Some(&b"r"[..]));
    }

    #[test]
    fn lowercase_keyword() {
        let (error, _, _) = expect_error("<!doctype r><r/>");
        assert_eq!(error, Error::Dtd(DtdError::LowercaseKeyword));
    }

    #[test]
    fn doctype_after_root() {
        let (error, _, _) = expect_error("<r/><!DOCTYPE r>");
        assert_eq!(error, Error::Syntax(SyntaxError::UnexpectedMarkup));
    }

    #[test]
    fn public_without_system_literal() {
        let (error, _, _) = expect_error("<!DOCTYPE r PUBLIC \"-//X//EN\"><r/>");
        assert_eq!(error, Error::Dtd(DtdError::MissingSystemId));
    }

    #[test]
    fn conditional_sections_are_not_supported() {
        let (error, _, _) = expect_error("<!DOCTYPE r [<![INCLUDE[]]>]><r/>");
        assert_eq!(error, Error::FeatureNotSupported);
    }

    #[test]
    fn comments_and_pis_inside_the_subset() {
        let (events, status) = parse("<!DOCTYPE r [<!--note--><?check it?>]><r/>");
        assert_eq!(
            events,
            [
                Ev::Comment("note".into()),
                Ev::Pi("check".into(), "it".into()),
                Ev::Start("r".into(), vec![]),
                Ev::End("r".into()),
            ]
        );
        assert_eq!(status, Status::Finished);
    }
}

mod entities {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_entity_expands_into_text() {
        let (events, status) =
            parse("<!DOCTYPE d [<!ENTITY e \"hi\">]><d>&e;</d>");
        assert_eq!(
            events,
            [
                Ev::Start("d".into(), vec![]),
                Ev::Text("hi".into()),
                Ev::End("d".into()),
            ]
        );
        assert_eq!(status, Status::Finished);
    }

    /// A parsed entity that expands to markup is re-parsed silently: the
    /// outer consumer sees no events from inside the expansion.
    #[test]
    fn markup_entity_is_parsed_silently() {
        let (events, status) =
            parse("<!DOCTYPE d [<!ENTITY e \"<x/>\">]><d>&e;</d>");
        assert_eq!(
            events,
            [Ev::Start("d".into(), vec![]), Ev::End("d".into())]
        );
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn text_around_a_markup_entity_is_reported() {
        let (events, status) =
            parse("<!DOCTYPE d [<!ENTITY e \"<x>deep</x>\">]><d>a&e;b</d>");
        assert_eq!(
            events,
            [
                Ev::Start("d".into(), vec![]),
                Ev::Text("a".into()),
                Ev::Text("b".into()),
                Ev::End("d".into()),
            ]
        );
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn entity_in_attribute_value() {
        let (events, _) =
            parse("<!DOCTYPE d [<!ENTITY who \"world\">]><d greet='hello &who;'/>");
        assert_eq!(
            events[0],
            Ev::Start("d".into(), vec![("greet".into(), "hello world".into())])
        );
    }

    #[test]
    fn entity_not_closing_its_tag() {
        let (error, _, _) =
            expect_error("<!DOCTYPE d [<!ENTITY e \"<x>\">]><d>&e;</d>");
        assert_eq!(error, Error::Entity(EntityError::NotWellFormed));
    }

    #[test]
    fn entity_closing_an_outer_tag() {
        let (error, _, _) =
            expect_error("<!DOCTYPE d [<!ENTITY e \"</d>\">]><d>&e;</d>");
        assert_eq!(error, Error::Entity(EntityError::NotWellFormed));
    }

    #[test]
    fn recursive_entities_are_detected() {
        let (error, _, _) = expect_error(
            "<!DOCTYPE d [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><d>&a;</d>",
        );
        assert_eq!(error, Error::Entity(EntityError::RecursiveEntity));
    }

    #[test]
    fn external_entity_reference_is_left_in_place() {
        let mut parser = Parser::new(Sink::default());
        let xml = b"<!DOCTYPE d [<!ENTITY ext SYSTEM \"other.xml\">]><d>&ext;</d>";
        let status = drive(&mut parser, xml, 64);
        assert_eq!(status, Status::Finished);
        assert!(parser.found_external_entity());
        assert_eq!(
            parser.handler().events[1],
            Ev::Text("&ext;".into())
        );
    }

    #[test]
    fn undeclared_entity_with_external_subset_is_left_in_place() {
        let mut parser = Parser::new(Sink::default());
        let xml = b"<!DOCTYPE d SYSTEM \"ext.dtd\"><d>&ghost;</d>";
        let status = drive(&mut parser, xml, 64);
        assert_eq!(status, Status::Finished);
        assert_eq!(
            parser.handler().events[1],
            Ev::Text("&ghost;".into())
        );
    }

    #[test]
    fn unparsed_entity_in_content_is_an_error() {
        let (error, _, _) = expect_error(
            "<!DOCTYPE d [<!ENTITY img SYSTEM \"i.gif\" NDATA gif>]><d>&img;</d>",
        );
        assert_eq!(error, Error::Entity(EntityError::InvalidReference));
    }

    #[test]
    fn general_entity_reference_inside_the_dtd() {
        let (error, _, _) = expect_error("<!DOCTYPE d [&e;]><d/>");
        assert_eq!(error, Error::Dtd(DtdError::GeneralEntityInDtd));
    }
}

mod parameter_entities {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn internal_pe_supplies_declarations() {
        let (events, status) = parse(
            "<!DOCTYPE d [<!ENTITY % decls \"<!ENTITY e 'v'>\">%decls;]><d>&e;</d>",
        );
        assert_eq!(
            events,
            [
                Ev::Start("d".into(), vec![]),
                Ev::Text("v".into()),
                Ev::End("d".into()),
            ]
        );
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn undeclared_pe_is_an_error() {
        let (error, _, _) = expect_error("<!DOCTYPE d [%nope;]><d/>");
        assert_eq!(error, Error::Entity(EntityError::InvalidParameterEntity));
    }

    #[test]
    fn pe_inside_a_markup_declaration() {
        let (error, _, _) =
            expect_error("<!DOCTYPE d [<!ELEMENT %pe; ANY>]><d/>");
        assert_eq!(error, Error::Dtd(DtdError::PeReferenceInInternalSubset));
    }

    /// After a reference to an external parameter entity, following entity
    /// and attribute-list declarations may depend on unread declarations and
    /// are skipped.
    #[test]
    fn declarations_after_external_pe_are_skipped() {
        let mut parser = Parser::new(Sink::default());
        let xml = b"<!DOCTYPE d [\
                    <!ENTITY % ext SYSTEM \"a.dtd\">\
                    %ext;\
                    <!ENTITY e \"unseen\">\
                    ]><d>&e;</d>";
        let status = drive(&mut parser, xml, 256);
        assert_eq!(status, Status::Finished);
        assert!(parser.found_external_entity());
        // `e` was skipped, so the reference stays unresolved in the text
        assert_eq!(parser.handler().events[1], Ev::Text("&e;".into()));
    }
}

mod attlists {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokenized_attribute_is_collapsed() {
        let (events, _) = parse(
            "<!DOCTYPE d [<!ATTLIST d t NMTOKEN #IMPLIED>]><d t='  a   b  ' c='  a  '/>",
        );
        assert_eq!(
            events[0],
            Ev::Start(
                "d".into(),
                vec![("t".into(), "a b".into()), ("c".into(), "  a  ".into())]
            )
        );
    }

    #[test]
    fn invalid_attribute_type() {
        let (error, _, _) = expect_error("<!DOCTYPE d [<!ATTLIST d a BOGUS #IMPLIED>]><d/>");
        assert_eq!(error, Error::Dtd(DtdError::InvalidAttributeType));
    }

    #[test]
    fn invalid_default_declaration() {
        let (error, _, _) = expect_error("<!DOCTYPE d [<!ATTLIST d a CDATA #NEVER>]><d/>");
        assert_eq!(error, Error::Dtd(DtdError::InvalidDefaultDecl));
    }
}

mod element_decls {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_models_are_checked() {
        let (_, status) = parse(
            "<!DOCTYPE d [\
             <!ELEMENT d (head, item*, (a | b)?)>\
             <!ELEMENT head (#PCDATA)>\
             <!ELEMENT item (#PCDATA | em)*>\
             <!ELEMENT em EMPTY>\
             ]><d/>",
        );
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn mixed_connectors_are_rejected() {
        let (error, _, _) = expect_error("<!DOCTYPE d [<!ELEMENT d (a, b | c)>]><d/>");
        assert_eq!(error, Error::Dtd(DtdError::MissingSeparator));
    }

    #[test]
    fn lowercase_content_keyword() {
        let (error, _, _) = expect_error("<!DOCTYPE d [<!ELEMENT d empty>]><d/>");
        assert_eq!(error, Error::Dtd(DtdError::LowercaseKeyword));
    }
}

mod notations {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn notation_declaration_fires_an_event() {
        let (events, status) = parse(
            "<!DOCTYPE d [<!NOTATION gif SYSTEM \"gif-viewer\">]><d/>",
        );
        assert_eq!(
            events,
            [
                Ev::Notation("gif SYSTEM \"gif-viewer\"".into()),
                Ev::Start("d".into(), vec![]),
                Ev::End("d".into()),
            ]
        );
        assert_eq!(status, Status::Finished);
    }

    #[test]
    fn notation_accessor() {
        let mut parser = Parser::new(Sink::default());
        parser
            .feed(b"<!DOCTYPE d [<!NOTATION n PUBLIC 'pub-id'>]><d/>")
            .unwrap();
        // DOCTYPE header, then the notation declaration
        assert_eq!(parser.step(), Status::Continue);
        assert_eq!(parser.step(), Status::Continue);
        assert_eq!(parser.notation(), Some(&b"n PUBLIC 'pub-id'"[..]));
    }
}
