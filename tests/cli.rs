//! CLI integration tests.
//!
//! Each test gets a temp directory with its own config, database and
//! upload directory, and drives the `smartdoc` binary as a subprocess.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("config")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/smartdoc.sqlite"

[storage]
upload_dir = "{root}/uploads"
max_file_size_mb = 1

[chunking]
window = 20
overlap = 5

[embedding]
provider = "hash"
dims = 32
"#,
        root = root.display()
    );
    let config_path = root.join("config").join("smartdoc.toml");
    fs::write(&config_path, config_content).unwrap();

    fs::write(
        root.join("guide.md"),
        "# Setup guide\n\nInstall the toolchain, then run the deploy script.\n",
    )
    .unwrap();
    fs::write(root.join("recipes.txt"), "Bake the bread for forty minutes.\n").unwrap();

    (tmp, config_path)
}

fn run_smartdoc(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_smartdoc"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "smartdoc=warn")
        .output()
        .expect("failed to run smartdoc binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Upload a file and return the new document id.
fn upload(config: &Path, file: &Path, extra: &[&str]) -> String {
    let path = file.to_str().unwrap();
    let mut args = vec!["upload", path];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_smartdoc(config, &args);
    assert!(success, "upload failed: {}", stderr);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("uploaded "))
        .and_then(|rest| rest.split_whitespace().next())
        .expect("upload printed no id")
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_smartdoc(&config, &["init"]);
    assert!(success);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/smartdoc.sqlite").exists());
    assert!(tmp.path().join("uploads").is_dir());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    assert!(run_smartdoc(&config, &["init"]).2);
    assert!(run_smartdoc(&config, &["init"]).2);
}

#[test]
fn test_upload_processes_and_lists() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);

    let guide = tmp.path().join("guide.md");
    let (stdout, _, success) = run_smartdoc(&config, &["upload", guide.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("completed"));
    assert!(stdout.trim_end().ends_with("ok"));

    let (stdout, _, success) = run_smartdoc(&config, &["list"]);
    assert!(success);
    assert!(stdout.contains("guide.md"));
    assert!(stdout.contains("completed"));
}

#[test]
fn test_get_shows_text_and_chunks() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);
    let id = upload(&config, &tmp.path().join("recipes.txt"), &[]);

    let (stdout, _, success) = run_smartdoc(&config, &["get", &id, "--chunks"]);
    assert!(success);
    assert!(stdout.contains(&format!("id:           {}", id)));
    assert!(stdout.contains("status:       completed"));
    assert!(stdout.contains("Bake the bread for forty minutes."));
    assert!(stdout.contains("--- Chunks (2) ---"));
    assert!(stdout.contains("[chunk 0]"));
}

#[test]
fn test_upload_without_processing_then_process() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);
    let id = upload(&config, &tmp.path().join("guide.md"), &["--no-process"]);

    let (stdout, _, _) = run_smartdoc(&config, &["get", &id]);
    assert!(stdout.contains("status:       uploaded"));

    let (stdout, _, success) = run_smartdoc(&config, &["process", &id]);
    assert!(success);
    assert!(stdout.contains("completed"));
}

#[test]
fn test_process_failure_exits_nonzero() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);
    let broken = tmp.path().join("broken.pdf");
    fs::write(&broken, b"not a pdf at all").unwrap();

    let (_, stderr, success) = run_smartdoc(&config, &["upload", broken.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("pdf extraction failed"));

    let (stdout, _, _) = run_smartdoc(&config, &["list"]);
    assert!(stdout.contains("failed"));
}

#[test]
fn test_upload_unsupported_extension() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);
    let exe = tmp.path().join("tool.exe");
    fs::write(&exe, b"MZ").unwrap();

    let (_, stderr, success) = run_smartdoc(&config, &["upload", exe.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type: exe"));

    let (stdout, _, _) = run_smartdoc(&config, &["list"]);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_delete_removes_document() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);
    let id = upload(&config, &tmp.path().join("guide.md"), &[]);

    let (stdout, _, success) = run_smartdoc(&config, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains("ok"));

    let (_, stderr, success) = run_smartdoc(&config, &["get", &id]);
    assert!(!success);
    assert!(stderr.contains("document not found"));

    let uploads: Vec<_> = fs::read_dir(tmp.path().join("uploads")).unwrap().collect();
    assert!(uploads.is_empty());
}

#[test]
fn test_similar_and_context() {
    let (tmp, config) = setup_test_env();
    run_smartdoc(&config, &["init"]);
    let guide = upload(&config, &tmp.path().join("guide.md"), &[]);
    let recipes = upload(&config, &tmp.path().join("recipes.txt"), &[]);

    let (stdout, _, success) = run_smartdoc(&config, &["similar", "deploy script toolchain"]);
    assert!(success);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["));
    assert!(first.contains("guide.md"));

    let (stdout, _, success) = run_smartdoc(
        &config,
        &["context", &guide, &recipes, "--max-chars", "13"],
    );
    assert!(success);
    assert!(stdout.contains("Document: guide.md\n# Setup guide"));
    assert!(stdout.contains("Document: recipes.txt\nBake the brea"));
}

#[test]
fn test_formats_lists_extractors() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_smartdoc(&config, &["formats"]);
    assert!(success);
    let names: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    assert_eq!(
        names,
        vec!["pdf", "docx", "spreadsheet", "text", "audio", "video", "image"]
    );
}

#[test]
fn test_formats_without_config_uses_defaults() {
    let (tmp, _) = setup_test_env();
    let (stdout, _, success) = run_smartdoc(&tmp.path().join("nope.toml"), &["formats"]);
    assert!(success);
    assert!(stdout.lines().any(|l| l.starts_with("pdf")));
}

#[test]
fn test_formats_rejects_invalid_config() {
    let (_tmp, config) = setup_test_env();
    let mut content = fs::read_to_string(&config).unwrap();
    content.push_str("\n[extractors]\nslides = [\"pptx\"]\n");
    fs::write(&config, content).unwrap();

    let (stdout, stderr, success) = run_smartdoc(&config, &["formats"]);
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Unknown extractor 'slides'"));
}

#[test]
fn test_missing_config_errors() {
    let (tmp, _) = setup_test_env();
    let (_, _, success) = run_smartdoc(&tmp.path().join("nope.toml"), &["list"]);
    assert!(!success);
}
