//! Report merging against the sample documents in tests/fixtures/reports

mod fixtures;

use ccdash::document::{parse_document, parse_file};
use ccdash::merge::{MergeError, ReportMerger};
use ccdash::report::OsInfo;
use ccdash::ReportContext;

fn ctx() -> ReportContext {
    let mut ctx = ReportContext::new(
        "http://dash.example.org/submit.php?project=pjproject",
        "buildhost",
        "linux-gcc",
        "20240307-0200-00-Nightly",
    );
    ctx.os = OsInfo {
        name: "Linux".to_string(),
        release: "6.1.0".to_string(),
        version: "#1 SMP".to_string(),
    };
    ctx
}

fn report(name: &str) -> std::path::PathBuf {
    fixtures::reports_dir().join(name)
}

#[test]
fn test_merge_all_sample_reports() {
    let ctx = ctx();
    let files = [
        report("update.xml"),
        report("build.xml"),
        report("test-unit.xml"),
        report("test-sip.xml"),
    ];
    let merged = ReportMerger::new(&ctx).merge_files(&files).unwrap();

    assert_eq!(merged.tag, "Site");
    assert_eq!(merged.attr("Name"), Some("buildhost"));
    let tags: Vec<&str> = merged.children.iter().map(|n| n.tag.as_str()).collect();
    assert_eq!(tags, vec!["Update", "Build", "Testing"]);

    let testing = merged.child("Testing").unwrap();
    assert_eq!(testing.child_text("StartDateTime"), Some("Mar 07 02:01 GMT"));
    assert_eq!(testing.child_text("EndDateTime"), Some("Mar 07 02:12 GMT"));
    assert_eq!(testing.child_text("ElapsedMinutes"), Some("5.5"));

    let names: Vec<&str> = testing
        .child("TestList")
        .unwrap()
        .children
        .iter()
        .map(|t| t.body.as_str())
        .collect();
    assert_eq!(names, vec!["pjlib-test", "sip-uac", "sip-uas"]);

    let statuses: Vec<&str> = testing
        .children_named("Test")
        .filter_map(|t| t.attr("Status"))
        .collect();
    assert_eq!(statuses, vec!["passed", "passed", "failed"]);
}

#[test]
fn test_merged_document_serializes() {
    let ctx = ctx();
    let merged = ReportMerger::new(&ctx)
        .merge_files(&[report("build.xml"), report("test-unit.xml")])
        .unwrap();
    let reparsed = parse_document(&merged.to_xml()).unwrap();
    assert_eq!(reparsed, merged);
}

#[test]
fn test_identity_mismatch_is_reported() {
    let ctx = ctx();
    let merger = ReportMerger::new(&ctx);

    let same = parse_file(&report("build.xml")).unwrap();
    assert!(merger.identity_mismatches(&same).is_empty());

    let other = parse_file(&report("test-sip.xml")).unwrap();
    assert_eq!(
        merger.identity_mismatches(&other),
        vec!["different BuildName 'linux-gcc-debug' (expecting 'linux-gcc')".to_string()]
    );
}

#[test]
fn test_broken_report_is_fatal() {
    let ctx = ctx();
    let err = ReportMerger::new(&ctx)
        .merge_files(&[report("build.xml"), report("broken.xml")])
        .unwrap_err();
    match err {
        MergeError::Parse { file, .. } => assert!(file.ends_with("broken.xml")),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_missing_report_is_fatal() {
    let ctx = ctx();
    let err = ReportMerger::new(&ctx)
        .merge_files(&[report("does-not-exist.xml")])
        .unwrap_err();
    assert!(matches!(err, MergeError::Parse { .. }));
}
