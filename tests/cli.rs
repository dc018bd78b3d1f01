use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gazette_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gazette"))
}

fn setup_test_env(config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("gazette.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

fn run_gazette(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gazette_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("GAZETTE_BACKEND_URL")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gazette binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

const OFFLINE: &str = r#"
[catalog]
source = "static"

[resolver]
kind = "local"
"#;

#[test]
fn test_documents_offline() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, success) = run_gazette(&config, &["--offline", "documents"]);
    assert!(success, "documents failed: {}", stderr);
    assert!(stdout.contains("Chilian Times"));
    assert!(stdout.contains("Star of Chile"));
    assert!(stdout.contains("14th September 1847"));
    assert_eq!(stdout.matches("[2 articles]").count(), 4);
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (stdout, stderr, success) = run_gazette(&missing, &["--offline", "documents"]);
    assert!(success, "documents failed: {}", stderr);
    assert!(stdout.contains("Valparaiso Review"));
}

#[test]
fn test_ask_summarize() {
    let (_tmp, config) = setup_test_env(OFFLINE);
    let (stdout, stderr, success) = run_gazette(&config, &["ask", "4", "Summarize"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.starts_with("Key points from Star of Chile (14th September 1847):"));
    assert!(stdout.contains("**Government**"));
}

#[test]
fn test_ask_joins_words() {
    let (_tmp, config) = setup_test_env(OFFLINE);
    let (stdout, _, success) = run_gazette(&config, &["ask", "1", "anything", "at", "all?"]);
    assert!(success);
    assert!(stdout.contains("to your question: \"anything at all?\""));
}

#[test]
fn test_ask_unknown_document() {
    let (_tmp, config) = setup_test_env(OFFLINE);
    let (_, stderr, success) = run_gazette(&config, &["ask", "42", "hello"]);
    assert!(!success);
    assert!(stderr.contains("Failed to load document 42: not in catalog"));
}

#[test]
fn test_show_document() {
    let (_tmp, config) = setup_test_env(OFFLINE);
    let (stdout, stderr, success) = run_gazette(&config, &["show", "3"]);
    assert!(success, "show failed: {}", stderr);
    assert!(stdout.starts_with("Valparaiso Review"));
    assert!(stdout.contains("## The British Club Hosts Annual Ball"));
}

#[test]
fn test_custom_catalog_file() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("archive.json");
    fs::write(
        &archive,
        r#"[
            {"id": 7, "newspaper_name": "The Mercurio", "date": "1901-01-01",
             "articles": [{"title": "New Century", "content": "Bells rang at midnight."}]},
            {"name": "no id, dropped"}
        ]"#,
    )
    .unwrap();
    let (_cfg_tmp, config) = setup_test_env(&format!(
        "[catalog]\nsource = \"static\"\npath = \"{}\"\n\n[resolver]\nkind = \"local\"\n",
        archive.display()
    ));

    let (stdout, stderr, success) = run_gazette(&config, &["documents"]);
    assert!(success, "documents failed: {}", stderr);
    assert!(stdout.contains("The Mercurio"));
    assert!(stdout.contains("1st January 1901"));
    assert!(!stdout.contains("dropped"));

    let (stdout, _, success) = run_gazette(&config, &["ask", "7", "What about midnight bells?"]);
    assert!(success);
    assert!(stdout.contains("New Century: Bells rang at midnight."));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config) = setup_test_env("[backend]\ntimeout_secs = 0\n");
    let (_, stderr, success) = run_gazette(&config, &["documents"]);
    assert!(!success);
    assert!(stderr.contains("timeout_secs"));
}

#[test]
fn test_unreachable_backend() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (_tmp, config) = setup_test_env(&format!(
        "[backend]\nbase_url = \"http://127.0.0.1:{}\"\ntimeout_secs = 5\n",
        port
    ));
    let (stdout, _, success) = run_gazette(&config, &["documents"]);
    assert!(!success);
    assert!(stdout.contains("Could not load list"));
}
