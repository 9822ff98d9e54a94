use assert_cmd::Command;
use std::fs;

fn cli() -> Command {
    Command::new(assert_cmd::cargo_bin!("scour-cli"))
}

#[test]
fn cleans_html_from_a_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("in.html");
    fs::write(&input, "<p onclick=\"x()\">hi<script>alert(1)</script></p>").expect("write");

    let output = cli()
        .arg(input.to_string_lossy().as_ref())
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "<p>hi</p>");
}

#[test]
fn json_output_lists_diagnostics() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("in.html");
    let out = tmp.path().join("out.json");
    fs::write(&input, "test<script>alert(1)</script>").expect("write");

    cli()
        .args([
            "--json",
            "--out",
            out.to_string_lossy().as_ref(),
            input.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read")).expect("json");
    assert_eq!(json["clean"], "test");
    assert_eq!(json["messages"][0]["kind"], "tag-removed");
    assert!(json["elapsed_ms"].is_number());
}

#[test]
fn style_modes_read_stdin() {
    let output = cli()
        .args(["--inline", "div"])
        .write_stdin("color: red; position: absolute")
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "color: red;");

    let output = cli()
        .args(["--css", "--messages", "-"])
        .write_stdin("h1 { color: red; behavior: url(x.htc) }")
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "h1 {\n\tcolor: red;\n}\n"
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("[css-property-rejected]"));
}

#[test]
fn custom_policy_is_loaded() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let policy = tmp.path().join("policy.xml");
    fs::write(
        &policy,
        r#"<policy><tag-rules><tag name="b" action="validate"/></tag-rules></policy>"#,
    )
    .expect("write");

    let output = cli()
        .args(["--policy", policy.to_string_lossy().as_ref()])
        .write_stdin("<b>x</b><i>y</i>")
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "<b>x</b>y");
}

#[test]
fn failures_use_distinct_exit_codes() {
    cli().arg("--bogus").assert().code(2);
    cli().arg("--pretty").assert().code(2);

    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.xml");
    cli()
        .args(["--policy", missing.to_string_lossy().as_ref()])
        .write_stdin("<p>x</p>")
        .assert()
        .code(1);
}
