use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn copymode_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("copymode");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/copymode.sqlite"

[server]
bind = "127.0.0.1:0"

[storage]
root = "{}/storage"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("copymode.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_copymode(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = copymode_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run copymode binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_copymode(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    assert!(tmp.path().join("data").join("copymode.sqlite").exists());
    assert!(tmp.path().join("storage").join("avatars").is_dir());
    assert!(tmp.path().join("storage").join("knowledge").is_dir());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    // Run init twice
    let (_, _, success1) = run_copymode(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_copymode(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_create_admin() {
    let (_tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);
    let (stdout, stderr, success) = run_copymode(
        &config_path,
        &[
            "create-admin",
            "--email",
            "Admin@Example.com",
            "--password",
            "changeme123",
        ],
    );
    assert!(
        success,
        "create-admin failed: stdout={}, stderr={}",
        stdout, stderr
    );
    // Email is normalized to lowercase.
    assert!(stdout.contains("Admin account created: admin@example.com"));
}

#[test]
fn test_create_admin_duplicate_email_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);
    let args = [
        "create-admin",
        "--email",
        "admin@example.com",
        "--password",
        "changeme123",
    ];
    let (_, _, success1) = run_copymode(&config_path, &args);
    assert!(success1, "First create-admin failed");

    let (_, stderr, success2) = run_copymode(&config_path, &args);
    assert!(!success2, "Duplicate email should fail");
    assert!(
        stderr.contains("already exists"),
        "Should report the conflict, got: {}",
        stderr
    );
}

#[test]
fn test_create_admin_rejects_short_password() {
    let (_tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);
    let (_, stderr, success) = run_copymode(
        &config_path,
        &["create-admin", "--email", "a@b.com", "--password", "short"],
    );
    assert!(!success, "Short password should fail");
    assert!(
        stderr.contains("8 characters"),
        "Should mention the minimum length, got: {}",
        stderr
    );
}

#[test]
fn test_create_admin_rejects_invalid_email() {
    let (_tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);
    let (_, stderr, success) = run_copymode(
        &config_path,
        &["create-admin", "--email", "not-an-email", "--password", "changeme123"],
    );
    assert!(!success, "Invalid email should fail");
    assert!(
        stderr.contains("valid email"),
        "Should mention the email, got: {}",
        stderr
    );
}

#[test]
fn test_stats_empty_database() {
    let (_tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);
    let (stdout, stderr, success) = run_copymode(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Database Stats"));
    assert!(stdout.contains("Users:         0"));
    assert!(stdout.contains("Agents:        0"));
}

#[test]
fn test_stats_counts_accounts() {
    let (_tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);
    run_copymode(
        &config_path,
        &[
            "create-admin",
            "--email",
            "admin@example.com",
            "--password",
            "changeme123",
        ],
    );

    let (stdout, _, success) = run_copymode(&config_path, &["stats"]);
    assert!(success);
    assert!(
        stdout.contains("Users:         1"),
        "Expected one user in stats, got: {}",
        stdout
    );
}

#[test]
fn test_serve_requires_jwt_secret() {
    let (tmp, config_path) = setup_test_env();

    run_copymode(&config_path, &["init"]);

    // Run from the temp dir so a developer's local .env cannot supply the
    // secret and leave the server running.
    let binary = copymode_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .env_remove("COPYMODE_JWT_SECRET")
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(
        !output.status.success(),
        "serve without COPYMODE_JWT_SECRET should fail"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("COPYMODE_JWT_SECRET"),
        "Should name the missing variable, got: {}",
        stderr
    );
}

#[test]
fn test_missing_config_fails() {
    let (tmp, _) = setup_test_env();

    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_copymode(&missing, &["stats"]);
    assert!(!success, "Missing config file should fail");
    assert!(
        stderr.contains("nope.toml"),
        "Error should name the config path, got: {}",
        stderr
    );
}
