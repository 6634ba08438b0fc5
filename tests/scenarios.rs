// End-to-end editing scenarios exercising the document surface the way a
// host editor would.

use scriv::{AttrSet, Document, Formatter, FormattingIdentifier, HeaderLevel, ListStyle};

fn document_with(text: &str) -> Document {
    let mut document = Document::new();
    document.insert_text(text);
    document
}

#[test]
fn bold_range_reports_identifier_and_exports_strong() {
    let mut document = document_with("Hello");
    document.toggle_bold(0..5);

    let identifiers = document.formatting_identifiers_at(2);
    assert!(identifiers.contains(&FormattingIdentifier::Bold));

    let html = document.get_html(false);
    assert!(html.contains("<strong>Hello</strong>"), "got {html}");
}

#[test]
fn list_toggle_at_caret_then_typing_builds_two_items() {
    let mut document = Document::new();
    document.toggle_unordered_list(0..0);
    document.insert_text("a");
    document.insert_text("\n");
    document.insert_text("b");

    let a_style = &document.store().attrs_at(0).unwrap().paragraph;
    assert_eq!(a_style.innermost_list_style(), Some(ListStyle::Unordered));
    assert_eq!(a_style.list_depth(), 1);

    let b_offset = document.text().find('b').unwrap();
    let b_style = &document.store().attrs_at(b_offset).unwrap().paragraph;
    assert_eq!(b_style.innermost_list_style(), Some(ListStyle::Unordered));
    assert_eq!(b_style.list_depth(), 1);

    assert_eq!(document.get_html(false), "<ul><li>a</li><li>b</li></ul>");
}

#[test]
fn blockquote_indent_saturates_at_max_depth() {
    let mut document = document_with("quoted");
    document.set_selection(0..0);
    document.toggle_blockquote(0..6);

    for _ in 0..10 {
        document.increase_indent();
    }

    let depth = document
        .store()
        .attrs_at(0)
        .unwrap()
        .paragraph
        .blockquote_depth();
    assert_eq!(depth, 9);
    // The calls past the cap fall through to literal tab insertion.
    assert!(document.text().contains('\t'));
}

#[test]
fn imported_blockquote_survives_round_trip() {
    let mut document = Document::new();
    document.set_html("<blockquote><p>x</p></blockquote>");

    let html = document.get_html(false);
    assert_eq!(html, "<blockquote><p>x</p></blockquote>");
}

#[test]
fn deleting_placeholder_drops_side_table_entry() {
    let mut document = document_with("abcde");
    document.replace_with_image(3..3, "https://example.com/cat.png", Some((64, 48)));
    assert_eq!(document.char_len(), 6);
    assert!(document.attachment_at(3).is_some());

    document.set_selection(4..4);
    document.delete_backward();

    assert_eq!(document.char_len(), 5);
    assert_eq!(document.store().attachments().count(), 0);
    assert_eq!(document.text(), "abcde");
}

#[test]
fn run_coalescing_holds_across_attribute_churn() {
    let mut document = document_with("abcdefgh");
    document.toggle_bold(0..4);
    document.toggle_bold(4..8);
    document.toggle_italic(2..6);
    document.toggle_italic(2..6);
    document.toggle_bold(0..8);

    let runs = document.store().runs();
    for pair in runs.windows(2) {
        assert_ne!(pair[0].attrs, pair[1].attrs, "adjacent runs not coalesced");
    }
}

#[test]
fn run_lengths_always_sum_to_document_length() {
    let mut document = document_with("Hello world");
    document.toggle_bold(0..5);
    document.replace_range(5..6, " brave new ");
    document.toggle_header(HeaderLevel::H2, 0..3);
    document.delete_backward();

    let total: usize = document.store().runs().iter().map(|run| run.len).sum();
    assert_eq!(total, document.char_len());
}

#[test]
fn span_toggle_is_an_involution() {
    let mut document = document_with("Hello world");
    let before = document.store().full_span();

    for formatter in [
        Formatter::Bold,
        Formatter::Italic,
        Formatter::Underline,
        Formatter::Strikethrough,
        Formatter::Mark,
    ] {
        document.toggle(&formatter, 3..8);
        document.toggle(&formatter, 3..8);
        assert_eq!(
            document.store().full_span(),
            before,
            "double toggle of {formatter:?} changed the document"
        );
    }
}

#[test]
fn paragraph_formatter_is_caret_position_independent() {
    for caret in [4, 5, 6, 7] {
        let mut document = document_with("one\ntwo\nthree");
        document.toggle_pre(caret..caret);
        let mut reference = document_with("one\ntwo\nthree");
        reference.toggle_pre(4..8);
        assert_eq!(document.store().full_span(), reference.store().full_span());
    }
}

#[test]
fn undo_restores_every_mutating_operation() {
    let operations: Vec<(&str, Box<dyn Fn(&mut Document)>)> = vec![
        ("insert", Box::new(|d: &mut Document| d.insert_text("!"))),
        ("bold", Box::new(|d: &mut Document| d.toggle_bold(0..5))),
        (
            "header",
            Box::new(|d: &mut Document| d.toggle_header(HeaderLevel::H1, 2..2)),
        ),
        (
            "list",
            Box::new(|d: &mut Document| d.toggle_ordered_list(0..11)),
        ),
        (
            "rule",
            Box::new(|d: &mut Document| d.replace_with_horizontal_rule(5..6)),
        ),
        (
            "html",
            Box::new(|d: &mut Document| d.replace_with_html(0..5, "<p><em>hi</em></p>")),
        ),
    ];

    for (name, op) in operations {
        let mut document = document_with("Hello world");
        let before = document.store().full_span();
        op(&mut document);
        assert!(document.undo(), "undo unavailable after {name}");
        assert_eq!(
            document.store().full_span(),
            before,
            "undo did not restore after {name}"
        );
    }
}

#[test]
fn formatting_identifiers_spanning_requires_every_character() {
    let mut document = document_with("Hello");
    document.toggle_bold(0..3);

    assert!(
        !document
            .formatting_identifiers_spanning(0..5)
            .contains(&FormattingIdentifier::Bold)
    );
    assert!(
        document
            .formatting_identifiers_spanning(0..3)
            .contains(&FormattingIdentifier::Bold)
    );
}

#[test]
fn header_identifier_tracks_level() {
    let mut document = document_with("Title");
    document.toggle_header(HeaderLevel::H3, 0..5);
    let identifiers = document.formatting_identifiers_at(0);
    assert!(identifiers.contains(&FormattingIdentifier::Header3));
    assert!(!identifiers.contains(&FormattingIdentifier::Header1));
    assert!(!identifiers.contains(&FormattingIdentifier::Paragraph));
}

#[test]
fn archive_round_trips_attributes_and_attachments() {
    let mut document = document_with("Hello world");
    document.toggle_bold(0..5);
    document.replace_with_comment(5..6, "more");

    let bytes = document.archive();
    let restored = Document::unarchive(&bytes).expect("archive should decode");
    assert_eq!(restored.store(), document.store());
    assert_eq!(restored.get_html(false), document.get_html(false));
}

#[test]
fn unarchive_rejects_corrupt_bytes() {
    assert!(Document::unarchive(b"\x00\x01garbage").is_none());
}

#[test]
fn malformed_html_degrades_to_plain_text() {
    let mut document = Document::new();
    document.set_html("<p>ok</p>< broken << markup");
    assert_eq!(document.text(), "ok\n< broken << markup");
    // Whatever came out, it is plain-paragraph text, not an error.
    let last = document.char_len() - 1;
    assert!(
        document
            .store()
            .attrs_at(last)
            .unwrap()
            .paragraph
            .is_plain()
    );
}

#[test]
fn typing_after_list_exit_is_plain() {
    let mut document = Document::new();
    document.toggle_unordered_list(0..0);
    document.insert_text("item");
    document.insert_text("\n");
    document.insert_text("\n"); // exit the list
    document.insert_text("after");

    let offset = document.text().find("after").unwrap();
    assert!(
        document
            .store()
            .attrs_at(offset)
            .unwrap()
            .paragraph
            .is_plain()
    );
}

#[test]
fn mixed_formatting_survives_html_round_trip() {
    let mut document = document_with("Hello world");
    document.toggle_bold(0..5);
    document.toggle_italic(3..8);
    document.set_link("https://example.com", 6..11);

    let html = document.get_html(false);
    let mut reimported = Document::new();
    reimported.set_html(&html);
    assert_eq!(reimported.get_html(false), html);
}

#[test]
fn default_attributes_flow_into_imported_text() {
    let mut defaults = AttrSet::plain();
    defaults.font.size = 14;
    let mut document = Document::with_default_attributes(defaults);
    document.set_html("<p>body</p>");
    assert_eq!(document.store().attrs_at(0).unwrap().font.size, 14);
}
