//! End-to-end tests that drive the `contracts` binary against a temporary
//! workspace. Both model providers stay disabled, so nothing leaves the
//! machine.

mod common;

use common::minimal_pdf;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn contracts_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("contracts");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("acme-msa.pdf"),
        minimal_pdf("Master services agreement between Acme and Globex"),
    )
    .unwrap();
    fs::write(
        files_dir.join("globex-nda.pdf"),
        minimal_pdf("Mutual nondisclosure agreement"),
    )
    .unwrap();
    fs::write(files_dir.join("notes.pdf"), "not really a pdf").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/contracts.sqlite"

[chunking]
chunk_size = 2000
chunk_overlap = 200

[server]
bind = "127.0.0.1:8599"
"#,
        root.display()
    );

    let config_path = config_dir.join("contracts.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_contracts_with_env(
    config_path: &Path,
    args: &[&str],
    env: &[(&str, &str)],
) -> (String, String, bool) {
    let binary = contracts_binary();
    let mut command = Command::new(&binary);
    command
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("DATABASE_URL")
        .env("RUST_LOG", "warn");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run contracts binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_contracts(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_contracts_with_env(config_path, args, &[])
}

fn file_arg(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_contracts(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/contracts.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_contracts(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_contracts(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_session_lifecycle() {
    let (_tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);

    let (stdout, _, success) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(success);
    assert!(stdout.contains("No sessions."));

    let (stdout, stderr, success) =
        run_contracts(&config_path, &["sessions", "new", "--name", "Vendor MSA"]);
    assert!(success, "sessions new failed: {}", stderr);
    let id = stdout.trim().to_string();
    assert_eq!(id.len(), 36, "expected a UUID, got: {}", id);

    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("Vendor MSA"));

    let (stdout, _, success) =
        run_contracts(&config_path, &["sessions", "rename", &id, "Vendor MSA v2"]);
    assert!(success);
    assert!(stdout.contains("Vendor MSA v2"));

    let (stdout, _, success) = run_contracts(&config_path, &["sessions", "show", &id]);
    assert!(success);
    assert!(stdout.contains("Vendor MSA v2"));
    assert!(stdout.contains("(none)"));

    let (_, _, success) = run_contracts(&config_path, &["sessions", "delete", &id]);
    assert!(success);

    let (_, stderr, success) = run_contracts(&config_path, &["sessions", "show", &id]);
    assert!(!success);
    assert!(stderr.contains("session not found"));
}

#[test]
fn test_rename_rejects_blank_name() {
    let (_tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);
    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "new"]);
    let id = stdout.trim().to_string();

    let (_, stderr, success) = run_contracts(&config_path, &["sessions", "rename", &id, "  "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_upload_names_session_after_file() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_contracts(&config_path, &["upload", &file_arg(&tmp, "acme-msa.pdf")]);
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Uploaded acme-msa.pdf"));

    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(stdout.contains("acme-msa.pdf"));
}

#[test]
fn test_second_upload_opens_new_session() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);

    run_contracts(&config_path, &["upload", &file_arg(&tmp, "acme-msa.pdf")]);
    let (_, stderr, success) =
        run_contracts(&config_path, &["upload", &file_arg(&tmp, "globex-nda.pdf")]);
    assert!(success, "second upload failed: {}", stderr);

    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(stdout.contains("acme-msa.pdf"));
    assert!(stdout.contains("globex-nda.pdf"));
}

#[test]
fn test_upload_into_occupied_session_fails() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);
    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "new"]);
    let id = stdout.trim().to_string();

    let (_, _, success) = run_contracts(
        &config_path,
        &["upload", &file_arg(&tmp, "acme-msa.pdf"), "--session", &id],
    );
    assert!(success);

    let (_, stderr, success) = run_contracts(
        &config_path,
        &["upload", &file_arg(&tmp, "globex-nda.pdf"), "--session", &id],
    );
    assert!(!success);
    assert!(stderr.contains("already has a contract"));
}

#[test]
fn test_upload_to_unknown_session_fails() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);
    run_contracts(&config_path, &["sessions", "new", "--name", "Existing"]);

    let (_, stderr, success) = run_contracts(
        &config_path,
        &["upload", &file_arg(&tmp, "acme-msa.pdf"), "--session", "no-such-id"],
    );
    assert!(!success);
    assert!(stderr.contains("session not found"));

    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(stdout.contains("Existing"));
    assert!(!stdout.contains("acme-msa.pdf"));
}

#[test]
fn test_upload_rejects_non_pdf() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);

    let (_, stderr, success) =
        run_contracts(&config_path, &["upload", &file_arg(&tmp, "notes.pdf")]);
    assert!(!success);
    assert!(stderr.contains("not a PDF"));
}

#[test]
fn test_overview_requires_embeddings() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);
    run_contracts(&config_path, &["upload", &file_arg(&tmp, "acme-msa.pdf")]);

    let (_, stderr, success) = run_contracts(&config_path, &["overview"]);
    assert!(!success);
    assert!(stderr.contains("embeddings are disabled"));
}

#[test]
fn test_overview_without_contract_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);

    let (_, stderr, success) = run_contracts(&config_path, &["risks"]);
    assert!(!success);
    assert!(stderr.contains("no contract uploaded"));
}

#[test]
fn test_history_empty_and_blank_chat() {
    let (tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);
    run_contracts(&config_path, &["upload", &file_arg(&tmp, "acme-msa.pdf")]);

    let (stdout, _, success) = run_contracts(&config_path, &["history"]);
    assert!(success);
    assert!(stdout.contains("No messages yet."));

    let (_, stderr, success) = run_contracts(&config_path, &["chat", "   "]);
    assert!(!success);
    assert!(stderr.contains("question must not be empty"));
}

#[test]
fn test_reset_requires_confirmation() {
    let (_tmp, config_path) = setup_test_env();
    run_contracts(&config_path, &["init"]);
    run_contracts(&config_path, &["sessions", "new"]);

    let (_, stderr, success) = run_contracts(&config_path, &["reset"]);
    assert!(!success);
    assert!(stderr.contains("--yes"));

    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(!stdout.contains("No sessions."));

    let (stdout, _, success) = run_contracts(&config_path, &["reset", "--yes"]);
    assert!(success);
    assert!(stdout.contains("reset"));

    let (stdout, _, _) = run_contracts(&config_path, &["sessions", "list"]);
    assert!(stdout.contains("No sessions."));
}

#[test]
fn test_database_url_overrides_config() {
    let (tmp, config_path) = setup_test_env();
    let override_path = tmp.path().join("elsewhere.sqlite");
    let url = format!("sqlite://{}", override_path.display());

    let (_, stderr, success) =
        run_contracts_with_env(&config_path, &["init"], &[("DATABASE_URL", &url)]);
    assert!(success, "init failed: {}", stderr);
    assert!(override_path.exists());
    assert!(!tmp.path().join("data/contracts.sqlite").exists());
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/data/contracts.sqlite\"\n\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_contracts(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_contracts(&tmp.path().join("absent.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
