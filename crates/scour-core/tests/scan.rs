use scour_core::{
    AttributeRule, DiagnosticKind, Error, MAX_NESTING_DEPTH, OnInvalid, Policy, ScanResult,
    Scanner, TagAction, TagRule,
};
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn scan(markup: &str) -> ScanResult {
    Scanner::new(Policy::builtin())
        .scan(markup)
        .expect("scan succeeds")
}

fn kinds(result: &ScanResult) -> Vec<DiagnosticKind> {
    result.messages().iter().map(|m| m.kind()).collect()
}

#[test]
fn script_is_removed_with_a_single_diagnostic() {
    let result = scan("test<script>alert(1)</script>");
    assert_eq!(result.clean_html(), "test");
    assert!(!result.clean_html().contains("<script"));
    assert_eq!(kinds(&result), [DiagnosticKind::TagRemoved]);
    assert!(result.messages()[0].message().contains("script"));
}

#[test]
fn disallowed_css_property_is_dropped() {
    let result = scan(r#"<div style="position:absolute">x</div>"#);
    assert!(!result.clean_html().contains("position"));
    assert_eq!(result.clean_html(), r#"<div style="">x</div>"#);
    assert_eq!(kinds(&result), [DiagnosticKind::CssPropertyRejected]);
}

#[test]
fn tag_without_rule_is_unwrapped() {
    let policy = Policy::builder().build();
    let result = Scanner::new(&policy).scan("<b>hi</b>").expect("scan");
    assert_eq!(result.clean_html(), "hi");
    assert_eq!(kinds(&result), [DiagnosticKind::TagNotInPolicy]);
    assert!(result.messages()[0].message().contains("filtered"));
}

#[test]
fn invalid_href_filters_the_anchor() {
    let result = scan(r#"<p><a href="javascript:alert(1)">click <i>me</i></a>!</p>"#);
    assert_eq!(result.clean_html(), "<p>click <i>me</i>!</p>");
    assert_eq!(kinds(&result), [DiagnosticKind::AttributeCausedFilter]);
    assert!(result.messages()[0].message().contains("filtered"));
}

#[test]
fn invalid_attribute_is_removed_and_the_rest_keep_their_order() {
    let result = scan(r#"<img src="/a.png" alt="x" width="abc" height="10">"#);
    assert_eq!(
        result.clean_html(),
        r#"<img src="/a.png" alt="x" height="10">"#
    );
    assert_eq!(kinds(&result), [DiagnosticKind::AttributeInvalid]);
}

#[test]
fn truncated_element_keeps_only_text() {
    let result = scan(r#"<title lang="en">Hi <b>x</b></title><p>body</p>"#);
    assert_eq!(
        result.clean_html(),
        "<title>Hi &lt;b&gt;x&lt;/b&gt;</title><p>body</p>"
    );
    assert_eq!(kinds(&result), [DiagnosticKind::AttributeNotInPolicy]);
}

#[test]
fn style_element_is_rewritten() {
    let result = scan("<style>p.note { color: BLUE; behavior: url(x.htc) } @import url(x.css);</style>");
    assert_eq!(
        result.clean_html(),
        "<style>p.note {\n\tcolor: blue;\n}\n</style>"
    );
    assert_eq!(
        kinds(&result),
        [
            DiagnosticKind::CssPropertyRejected,
            DiagnosticKind::CssImportIgnored
        ]
    );

    let result = scan("<style>li:first-child { color: red }</style>");
    assert_eq!(result.clean_html(), "<style>/* */</style>");
    assert_eq!(
        kinds(&result),
        [
            DiagnosticKind::CssConditionUnsupported,
            DiagnosticKind::CssSelectorRejected
        ]
    );
}

#[test]
fn malformed_css_removes_the_owner() {
    let result = scan("<style>body { background: url(javascript:alert(1)) }</style><p>x</p>");
    assert_eq!(result.clean_html(), "<p>x</p>");
    assert_eq!(kinds(&result), [DiagnosticKind::CssTagMalformed]);

    let result = scan(r#"<p style="color: red; }" title="t">x</p>"#);
    assert_eq!(result.clean_html(), r#"<p title="t">x</p>"#);
    assert_eq!(kinds(&result), [DiagnosticKind::CssAttributeMalformed]);
}

#[test]
fn clean_output_is_stable() {
    let first = scan(concat!(
        r#"<p class="note" style="color: red; position: fixed">Hello <b>world</b>"#,
        r#"<script>x</script><font>f</font></p>"#,
        "<style>p.note { color: #00f } @import url(x.css);</style>",
        r#"<a href="http://example.com/x">link</a><ul><li>one</li></ul>"#,
        "<table><tr><td>cell</td></tr></table>",
    ));
    assert!(!first.messages().is_empty());

    let second = scan(first.clean_html());
    assert_eq!(second.clean_html(), first.clean_html());
    assert!(second.messages().is_empty(), "{:?}", second.messages());
}

#[test]
fn attribute_values_are_matched_decoded() {
    let result = scan(r#"<p title="a&amp;b">x</p>"#);
    assert_eq!(result.clean_html(), r#"<p title="a&amp;b">x</p>"#);
    assert!(result.messages().is_empty());
}

#[test]
fn diagnostics_escape_markup() {
    let result = scan(r#"<a href="javascript:alert('<x>')">y</a>"#);
    let message = result.messages()[0].message();
    assert!(message.contains("&lt;x&gt;"), "{message}");
    assert!(!message.contains("<x>"));
}

#[test]
fn common_attack_vectors_are_neutralized() {
    let vectors = [
        "<img src=x onerror=alert(1)>",
        r#"<a href="jav&#x09;ascript:alert(1)">x</a>"#,
        r#"<div style="width: expression(alert(1))">x</div>"#,
        "<svg><script>alert(1)</script></svg>",
        r#"<iframe src="javascript:alert(1)"></iframe>"#,
        "<scr<script>ipt>alert(1)</script>",
        r#"<p onmouseover="alert(1)">x</p>"#,
        r#"<a href="http://x.com/" onclick="alert(1)">x</a>"#,
        r#"<div style="background-image: url('javascript:alert(1)')">x</div>"#,
        "<object data=x.swf></object><embed src=x.swf>",
        r#"<meta http-equiv="refresh" content="0;url=javascript:alert(1)">"#,
    ];
    for vector in vectors {
        let clean = scan(vector).into_clean_html().to_lowercase();
        for needle in ["<script", "javascript:", "onerror", "onmouseover", "onclick", "expression("] {
            assert!(!clean.contains(needle), "{vector} -> {clean}");
        }
    }
}

#[test]
fn control_characters_are_stripped() {
    let result = scan("a\u{0}b\u{1}c<p>\u{B}d</p>");
    assert_eq!(result.clean_html(), "abc<p>d</p>");
}

#[test]
fn oversized_input_is_rejected() {
    let err = Scanner::new(Policy::builtin())
        .scan(&"a".repeat(100_001))
        .expect_err("too large");
    assert!(matches!(
        err,
        Error::InputTooLarge {
            size: 100_001,
            max: 100_000
        }
    ));
}

#[test]
fn deeply_nested_input_fails_the_scan() {
    let err = Scanner::new(Policy::builtin())
        .scan(&"<div>".repeat(MAX_NESTING_DEPTH + 10))
        .expect_err("too deep");
    assert!(matches!(err, Error::TooDeep { .. }));
}

#[test]
fn policy_file_directives_apply() {
    let policy = Policy::from_path(fixture("forum-policy.xml")).expect("fixture loads");
    assert_eq!(policy.max_input_size(), 2000);
    let scanner = Scanner::new(&policy);

    let result = scanner
        .scan(r#"<p><a href="http://example.com/">ok</a> <a href="/local">local</a></p>"#)
        .expect("scan");
    assert_eq!(
        result.clean_html(),
        r#"<p><a href="http://example.com/" rel="nofollow">ok</a> local</p>"#
    );
    assert_eq!(kinds(&result), [DiagnosticKind::AttributeCausedFilter]);

    let result = scanner
        .scan(r#"<quote style="color: green; font-size: 9px">q</quote>"#)
        .expect("scan");
    assert_eq!(result.clean_html(), "q");
    assert_eq!(kinds(&result), [DiagnosticKind::TagFiltered]);

    let result = scanner
        .scan("<style>@import 'a.css'; @import 'b.css'; @import 'c.css'; .x { color: red }</style>")
        .expect("scan");
    assert_eq!(result.clean_html(), "<style>.x {\n\tcolor: red;\n}\n</style>");
    assert_eq!(
        kinds(&result),
        [
            DiagnosticKind::CssImportIgnored,
            DiagnosticKind::CssImportIgnored,
            DiagnosticKind::CssImportIgnored
        ]
    );
}

#[test]
fn programmatic_policy_with_overridden_remedy() {
    let template = AttributeRule::new("href").with_literal("#top");
    let policy = Policy::builder()
        .common_attribute(template.clone())
        .tag(
            TagRule::new("a", TagAction::Validate)
                .with_attribute(template.with_overrides(Some(OnInvalid::RemoveTag), None)),
        )
        .tag(TagRule::new("area", TagAction::Validate).with_attribute(template))
        .build();
    let result = Scanner::new(&policy)
        .scan(r##"<a href="#x">gone</a><a href="#TOP">kept</a>"##)
        .expect("scan");
    assert_eq!(result.clean_html(), r##"<a href="#TOP">kept</a>"##);
    assert_eq!(kinds(&result), [DiagnosticKind::AttributeCausedRemoval]);
}

#[test]
fn leading_comments_and_stray_wrappers() {
    let result = scan("<!--c-->text");
    assert_eq!(result.clean_html(), "<!--c-->text");
    assert!(result.messages().is_empty());

    let result = scan("<html lang=en><body onload=alert(1)>x");
    assert_eq!(result.clean_html(), "x");
    assert_eq!(kinds(&result), [DiagnosticKind::AttributeNotInPolicy]);
    assert!(result.messages()[0].message().contains("lang"));
}

#[test]
fn percentages_are_written_back_as_given() {
    let result = scan(r#"<div style="font-size: 12.7%">x</div>"#);
    assert_eq!(result.clean_html(), r#"<div style="font-size: 12.7%;">x</div>"#);
    assert!(result.messages().is_empty());
}

#[test]
fn unknown_tags_can_be_encoded_instead_of_filtered() {
    let policy = Policy::builder()
        .tag(TagRule::new("p", TagAction::Validate))
        .tag(TagRule::new("script", TagAction::Remove))
        .directive("onUnknownTag", "encode")
        .build();
    let scanner = Scanner::new(&policy);
    let result = scanner
        .scan("<p>Use <code>x<script>y</script></code></p>")
        .expect("scan");
    assert_eq!(result.clean_html(), "<p>Use &lt;code&gt;x&lt;/code&gt;</p>");
    assert_eq!(
        kinds(&result),
        [DiagnosticKind::TagEncoded, DiagnosticKind::TagRemoved]
    );

    let again = scanner.scan(result.clean_html()).expect("rescan");
    assert_eq!(again.clean_html(), result.clean_html());
    assert!(again.messages().is_empty());
}
