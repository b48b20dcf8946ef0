//! Integration tests for the redline binary
//!
//! Every invocation runs in a scratch directory with its own HOME so no
//! `.redline.toml` from the machine leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const REVIEWED_BODY: &str = r#"<w:p><w:r><w:t xml:space="preserve">The </w:t></w:r><w:del w:id="1" w:author="Alice"><w:r><w:delText>quick</w:delText></w:r></w:del><w:ins w:id="2" w:author="Alice"><w:r><w:t>slow</w:t></w:r></w:ins><w:r><w:t xml:space="preserve"> fox</w:t></w:r></w:p><w:p><w:commentRangeStart w:id="0"/><w:r><w:t>jumps</w:t></w:r><w:commentRangeEnd w:id="0"/><w:r><w:commentReference w:id="0"/></w:r><w:ins w:id="5" w:author="Bob"><w:r><w:t xml:space="preserve"> high</w:t></w:r></w:ins></w:p>"#;

const REVIEWED_COMMENTS: &str = r#"<w:comment w:id="0" w:author="Bob" w:initials="B"><w:p><w:r><w:t>Really?</w:t></w:r></w:p></w:comment>"#;

/// Helper to create a CLI command in an isolated directory
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_redline"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .env_remove("REDLINE_AUTHOR")
        .env_remove("REDLINE_MERGE_REVISIONS")
        .env_remove("REDLINE_INCLUDE_COMMENTS");
    cmd
}

fn docx_bytes(body: &str, comment_entries: &str) -> Vec<u8> {
    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#
                .to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
                .to_string(),
        ),
        (
            "word/document.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
            ),
        ),
        (
            "word/_rels/document.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="comments.xml"/></Relationships>"#
                .to_string(),
        ),
        (
            "word/comments.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:comments xmlns:w="{W_NS}">{comment_entries}</w:comments>"#
            ),
        ),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in &parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn write_fixture(dir: &TempDir, name: &str, body: &str, comments: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, docx_bytes(body, comments)).unwrap();
    path
}

fn reviewed(dir: &TempDir) -> PathBuf {
    write_fixture(dir, "reviewed.docx", REVIEWED_BODY, REVIEWED_COMMENTS)
}

fn template(dir: &TempDir) -> PathBuf {
    write_fixture(dir, "template.docx", "<w:p/>", "")
}

// ============ READ COMMAND TESTS ============

#[test]
fn test_read_help() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["read", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--added-start"));
}

#[test]
fn test_read_tagged_by_default() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .assert()
        .success()
        .stdout("The \\repl{quick}{slow} fox\n\\anchor{jumps}\\comment{Bob: Really?}\\add{ high}\n");
}

#[test]
fn test_read_final_and_original() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .args(["--view", "final"])
        .assert()
        .success()
        .stdout("The slow fox\njumps high\n");
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .args(["--view", "original"])
        .assert()
        .success()
        .stdout("The quick fox\njumps\n");
}

#[test]
fn test_read_no_comments() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .arg("--no-comments")
        .assert()
        .success()
        .stdout(predicate::str::contains("\\comment{").not())
        .stdout(predicate::str::contains("jumps\\add{ high}"));
}

#[test]
fn test_read_include_comments_from_env() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .env("REDLINE_INCLUDE_COMMENTS", "false")
        .arg("read")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\\comment{").not());
}

#[test]
fn test_read_custom_delimiters() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .args(["--view", "added", "--added-start", "[+", "--added-end", "+]"])
        .assert()
        .success()
        .stdout("[+slow+]\n[+ high+]\n");
}

#[test]
fn test_read_all_views() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .args(["--view", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== tagged ==="))
        .stdout(predicate::str::contains("=== comments ===\nBob: Really?"))
        .stdout(predicate::str::contains("=== original ==="));
}

#[test]
fn test_read_to_output_file() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    let output = dir.path().join("out.txt");
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .args(["--view", "deleted", "-o"])
        .arg(&output)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&output).unwrap(), "\\del{quick}\n");
}

#[test]
fn test_read_uses_project_config() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    fs::write(
        dir.path().join(".redline.toml"),
        "[read]\nview = \"comments\"\n",
    )
    .unwrap();
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .assert()
        .success()
        .stdout("Bob: Really?\n");
}

#[test]
fn test_read_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["read", "nowhere.docx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("nowhere.docx"));
}

#[test]
fn test_read_rejects_unknown_view() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("read")
        .arg(&input)
        .args(["--view", "sideways"])
        .assert()
        .failure();
}

// ============ INSPECT COMMAND TESTS ============

#[test]
fn test_inspect_json() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    let output = cli(dir.path())
        .arg("inspect")
        .arg(&input)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["paragraphs"][0], "The slow fox");
    assert_eq!(report["revisions"].as_array().unwrap().len(), 3);
    assert_eq!(report["revisions"][0]["kind"], "deleted");
    assert_eq!(report["revisions"][0]["text"], "quick");
    assert_eq!(report["comments"][0]["body"], "Really?");
    assert_eq!(report["warnings"].as_array().unwrap().len(), 0);
}

#[test]
fn test_inspect_text() {
    let dir = TempDir::new().unwrap();
    let input = reviewed(&dir);
    cli(dir.path())
        .arg("inspect")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Revisions"))
        .stdout(predicate::str::contains("Bob: Really?"));
}

// ============ WRITE COMMAND TESTS ============

#[test]
fn test_write_then_read() {
    let dir = TempDir::new().unwrap();
    let template = template(&dir);
    let input = dir.path().join("notes.txt");
    let output = dir.path().join("out.docx");
    fs::write(&input, "Say \\repl{hi}{hello}\\comment{warmer} now\n").unwrap();

    cli(dir.path())
        .arg("write")
        .arg(&input)
        .arg("--template")
        .arg(&template)
        .arg("-o")
        .arg(&output)
        .args(["--author", "Carol"])
        .assert()
        .success();

    cli(dir.path())
        .arg("read")
        .arg(&output)
        .assert()
        .success()
        .stdout("Say \\repl{hi}{hello}\\comment{Carol: warmer} now\n");
}

#[test]
fn test_write_from_stdin_with_env_author() {
    let dir = TempDir::new().unwrap();
    let template = template(&dir);
    let output = dir.path().join("out.docx");

    cli(dir.path())
        .env("REDLINE_AUTHOR", "Dana")
        .args(["write", "-", "--template"])
        .arg(&template)
        .arg("-o")
        .arg(&output)
        .write_stdin("\\add{fresh}")
        .assert()
        .success();

    let report = cli(dir.path())
        .arg("inspect")
        .arg(&output)
        .arg("--json")
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&report.stdout).unwrap();
    assert_eq!(report["revisions"][0]["author"], "Dana");
    assert_eq!(report["revisions"][0]["text"], "fresh");
}

#[test]
fn test_write_rejects_malformed_markup() {
    let dir = TempDir::new().unwrap();
    let template = template(&dir);
    let output = dir.path().join("out.docx");

    cli(dir.path())
        .args(["write", "-", "--template"])
        .arg(&template)
        .arg("-o")
        .arg(&output)
        .write_stdin("\\add{never closed")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
    assert!(!output.exists());
}

#[test]
fn test_write_requires_template() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["write", "-", "-o", "out.docx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--template"));
}

// ============ COMPLETIONS TESTS ============

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("redline"));
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    let dir = TempDir::new().unwrap();
    cli(dir.path())
        .args(["-q", "-v", "completions", "bash"])
        .assert()
        .failure();
}
