// HTML conversion seen from the document surface: canonical output
// snapshots and the one-pass stabilization guarantee.

use scriv::Document;

fn reimport(html: &str) -> String {
    let mut document = Document::new();
    document.set_html(html);
    document.get_html(false)
}

#[test]
fn bold_export_snapshot() {
    let mut document = Document::new();
    document.insert_text("Hello");
    document.toggle_bold(0..5);
    insta::assert_snapshot!(document.get_html(false), @"<p><strong>Hello</strong></p>");
}

#[test]
fn heading_and_body_snapshot() {
    let mut document = Document::new();
    document.set_html("<h1>Title</h1><p>Some <b>bold</b> text</p>");
    insta::assert_snapshot!(
        document.get_html(false),
        @"<h1>Title</h1><p>Some <strong>bold</strong> text</p>"
    );
}

#[test]
fn quote_wrapped_list_snapshot() {
    let mut document = Document::new();
    document.set_html("<blockquote><ul><li>a</li><li>b</li></ul></blockquote>");
    insta::assert_snapshot!(
        document.get_html(false),
        @"<blockquote><ul><li>a</li><li>b</li></ul></blockquote>"
    );
}

#[test]
fn attachment_export_snapshot() {
    let mut document = Document::new();
    document.set_html(r#"<p>before <img src="cat.png" width="40" height="30"> after</p><hr>"#);
    insta::assert_snapshot!(
        document.get_html(false),
        @r#"<p>before <img src="cat.png" width="40" height="30"> after</p><p><hr></p>"#
    );
}

#[test]
fn round_trip_reaches_fixed_point_after_one_pass() {
    let inputs = [
        "<p>plain text</p>",
        "plain text with no tags at all",
        "<p>unclosed paragraph",
        "<h2>A heading</h2>",
        "<p><b>b</b><i>i</i><u>u</u><s>s</s><mark>m</mark><code>c</code></p>",
        "<ul><li>one</li><li>two<ol><li>nested</li></ol></li></ul>",
        "<blockquote><blockquote><p>deep</p></blockquote></blockquote>",
        "<pre>fn main() {\n    body\n}</pre>",
        "<p><a href=\"https://example.com?q=a&amp;r=b\">link</a></p>",
        "<p>an <img src=\"i.png\"> image</p>",
        "<hr>",
        "<p><!--comment--></p>",
        "<figure><p><img src=\"f.png\"></p><figcaption>caption</figcaption></figure>",
        "<div><span>wrapped</span></div>",
        "text &amp; entities &lt;kept&gt;",
    ];

    for input in inputs {
        let once = reimport(input);
        let twice = reimport(&once);
        assert_eq!(once, twice, "not a fixed point for {input:?}");
        let thrice = reimport(&twice);
        assert_eq!(twice, thrice, "drifted on third pass for {input:?}");
    }
}

#[test]
fn prettified_output_reimports_identically() {
    let mut document = Document::new();
    document.set_html("<blockquote><p>a</p><p>b</p></blockquote><ul><li>c</li></ul>");
    let compact = document.get_html(false);
    let pretty = document.get_html(true);
    assert_ne!(compact, pretty);

    let mut reimported = Document::new();
    reimported.set_html(&pretty);
    assert_eq!(reimported.get_html(false), compact);
}
