//! CLI test cases.
//!
//! None of these reach a model server: they cover argument handling,
//! configuration output and input rejection, all of which happen before any
//! provider is contacted.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

/// Environment variables that would change the defaults under test.
static CONFIG_VARS: &[&str] = &[
    "EDGEQUAKE_LLM_PROVIDER",
    "OCR_MODEL",
    "JSON_MODEL",
    "MAX_PAGES",
    "OCR_TIMEOUT_MS",
    "REQUEST_TIMEOUT_MS",
    "JSON_TIMEOUT_MS",
    "PDF_RENDER_SCALE",
    "PDF_ENHANCE",
    "PDF_ENHANCE_MODE",
    "PDF_ENHANCE_CONTRAST",
    "PDF_ENHANCE_THRESHOLD",
    "OLLAMA_BASE_URL",
    "RUST_LOG",
];

/// Create a new `Command` with our binary, isolated from the caller's config.
fn cmd(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ocr2json").unwrap();
    cmd.current_dir(dir.path());
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::File::create(&path)
        .unwrap()
        .write_all(bytes)
        .unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--user-prompt"));
}

#[test]
fn test_version() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_usage() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_show_config_defaults() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ocrModel": "deepseek-ocr""#))
        .stdout(predicate::str::contains(r#""maxPages": 25"#))
        .stdout(predicate::str::contains(r#""pdfEnhanceMode": "contrast""#))
        .stdout(predicate::str::contains(r#""conversionConfigured": false"#));
}

#[test]
fn test_show_config_reads_env() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .env("PDF_ENHANCE", "no")
        .env("PDF_ENHANCE_MODE", "binarize")
        .env("MAX_PAGES", "3")
        .args(["--show-config", "--user-prompt", "{{text}}"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""pdfEnhance": false"#))
        .stdout(predicate::str::contains(r#""pdfEnhanceMode": "binarize""#))
        .stdout(predicate::str::contains(r#""maxPages": 3"#))
        .stdout(predicate::str::contains(r#""conversionConfigured": true"#));
}

#[test]
fn test_enhance_env_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .env("PDF_ENHANCE", "TRUE")
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""pdfEnhance": true"#));

    cmd(&dir)
        .env("PDF_ENHANCE", "FALSE")
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""pdfEnhance": false"#));
}

#[test]
fn test_ocr_timeout_falls_back_to_request_timeout() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .env("REQUEST_TIMEOUT_MS", "4500")
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ocrTimeoutMs": 4500"#));

    cmd(&dir)
        .env("REQUEST_TIMEOUT_MS", "4500")
        .env("OCR_TIMEOUT_MS", "900")
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ocrTimeoutMs": 900"#));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .args(["--show-config", "--max-pages", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_unsupported_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "notes.txt", b"These are plain notes.\n");
    cmd(&dir)
        .args(["--no-progress", &path])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please choose a PDF or image file"));
}

#[test]
fn test_missing_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    cmd(&dir)
        .args(["--no-progress", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_inspect_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(image::RgbaImage::new(5, 7))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let path = write_file(&dir, "scan.png", &png);

    cmd(&dir)
        .args(["--inspect-only", &path])
        .assert()
        .success()
        .stdout(predicate::str::contains("Type:         image/png"))
        .stdout(predicate::str::contains("Pages:        1"));
}
