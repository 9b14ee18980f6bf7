//! Command-line runs of the ccdash binary in dry-run mode

#![cfg(unix)]

use std::fs;
use std::process::{Command, Output};

use ccdash::document::parse_file;
use tempfile::TempDir;

fn ccdash(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ccdash"))
        .current_dir(dir.path())
        .args(args)
        .output()
        .expect("failed to run ccdash")
}

const IDENTITY: &[&str] = &[
    "-U",
    "http://dash.example.org/submit.php?project=pj",
    "-S",
    "buildhost",
    "-T",
    "20240307-0200-00",
    "-B",
    "linux-gcc",
    "-G",
    "Experimental",
];

#[test]
fn test_build_writes_report_in_dry_run() {
    let dir = TempDir::new().unwrap();
    let mut args = vec!["build", "echo 'main.c:3: error: expected ;'; true", "-y", "-o", "out.xml"];
    args.extend_from_slice(IDENTITY);
    let output = ccdash(&dir, &args);
    assert_eq!(output.status.code(), Some(1), "{:?}", output);

    let site = parse_file(&dir.path().join("out.xml")).unwrap();
    assert_eq!(site.attr("Name"), Some("buildhost"));
    assert_eq!(site.attr("BuildStamp"), Some("20240307-0200-00-Experimental"));
    let build = site.child("Build").unwrap();
    assert_eq!(build.children_named("Error").count(), 1);
}

#[test]
fn test_passing_test_exits_zero() {
    let dir = TempDir::new().unwrap();
    let mut args = vec!["test", "smoke", "echo fine", "--dry-run", "--output", "test.xml"];
    args.extend_from_slice(IDENTITY);
    let output = ccdash(&dir, &args);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let site = parse_file(&dir.path().join("test.xml")).unwrap();
    let test = site.find("Testing").unwrap().child("Test").unwrap();
    assert_eq!(test.attr("Status"), Some("passed"));
    assert_eq!(test.child_text("Name"), Some("smoke"));
}

#[test]
fn test_missing_identity_fails() {
    let dir = TempDir::new().unwrap();
    let output = ccdash(&dir, &["build", "true", "-y", "-o", "out.xml"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("out.xml").exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mandatory options are missing"), "{}", stderr);
}

#[test]
fn test_config_file_supplies_identity() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("site.toml"),
        "url = \"http://dash.example.org/submit.php?project=pj\"\n\
         site = \"from-config\"\n\
         build_name = \"linux-gcc\"\n\
         group = \"Nightly\"\n\
         timestamp = \"20240307-0200-00\"\n",
    )
    .unwrap();

    let output = ccdash(
        &dir,
        &["configure", "echo ok", "--config", "site.toml", "-S", "from-cli", "-y", "-o", "conf.xml"],
    );
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let site = parse_file(&dir.path().join("conf.xml")).unwrap();
    assert_eq!(site.attr("Name"), Some("from-cli"));
    assert_eq!(site.attr("BuildStamp"), Some("20240307-0200-00-Nightly"));
}

#[test]
fn test_failing_test_exits_one() {
    let dir = TempDir::new().unwrap();
    let mut args = vec!["test", "t", "exit 3", "-y", "-o", "t.xml"];
    args.extend_from_slice(IDENTITY);
    let output = ccdash(&dir, &args);
    assert_eq!(output.status.code(), Some(1), "{:?}", output);

    let site = parse_file(&dir.path().join("t.xml")).unwrap();
    let value = site
        .find("Results")
        .unwrap()
        .children_named("NamedMeasurement")
        .find(|m| m.attr("name") == Some("Exit Value"))
        .and_then(|m| m.child_text("Value"));
    assert_eq!(value, Some("3"));
}
