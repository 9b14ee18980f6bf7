//! Test fixtures shared by the integration tests
//!
//! - Build log corpus (lines in, expected diagnostics out)
//! - Previously generated report documents for merging
//! - Scenario and settings helpers for end-to-end runs

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ccdash::{DiagnosticKind, Settings};

/// Path to the build log corpus
pub fn build_log_corpus_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/build_logs/corpus.json")
}

/// Directory holding sample report documents
pub fn reports_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/reports")
}

/// One expected diagnostic
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExpectedDiagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    pub line: String,
    pub source_line_number: usize,
}

/// Build log case from corpus.json
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BuildLogCase {
    pub id: String,
    pub description: String,
    pub lines: Vec<String>,
    pub expected: Vec<ExpectedDiagnostic>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct BuildLogCorpus {
    pub cases: Vec<BuildLogCase>,
}

pub fn load_build_log_corpus() -> BuildLogCorpus {
    let content = fs::read_to_string(build_log_corpus_path()).expect("Failed to read corpus.json");
    serde_json::from_str(&content).expect("Failed to parse corpus.json")
}

/// Settings for a dry run whose scratch files land under `scratch`
pub fn dry_run_settings(scratch: &Path) -> Settings {
    Settings {
        timestamp: Some("20240101-0200-00".to_string()),
        dry_run: true,
        log_level: 2,
        max_log: -1,
        last_log: true,
        test_timeout_seconds: 60,
        scratch_root: scratch.to_path_buf(),
        ..Settings::default()
    }
}

/// Write `xml` to `<dir>/scenario.xml` and return its path
pub fn write_scenario(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("scenario.xml");
    fs::write(&path, xml).expect("Failed to write scenario");
    path
}

/// File names of the given paths
pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}
