use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_teller"))
}

const PASSPHRASE: &str = "test-passphrase-secure-123";
const PASSWORD: &str = "CorrectHorseBatteryStaple";

fn temp_store_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let filename = format!("{}_{}_{}.teller", prefix, std::process::id(), nanos);
    std::env::temp_dir().join(filename)
}

struct TempStore {
    path: PathBuf,
}

impl TempStore {
    fn new(prefix: &str) -> Self {
        Self {
            path: temp_store_path(prefix),
        }
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn teller(store: &Path, args: &[&str]) -> std::process::Output {
    let mut cmd = Command::new(bin());
    cmd.args(args)
        .arg("--store")
        .arg(store)
        .env("TELLER_PASSPHRASE", PASSPHRASE)
        .env("TELLER_ACCOUNT_PASSWORD", PASSWORD);
    cmd.output().expect("run teller")
}

fn init_store(store: &Path) {
    let output = teller(store, &["init"]);
    assert!(
        output.status.success(),
        "init failed: stdout={}, stderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn create_account(store: &Path, id: &str) {
    let output = teller(
        store,
        &[
            "create",
            id,
            "--name",
            "Alice Example",
            "--email",
            "alice@gmail.com",
            "--phone",
            "+31 612345678",
            "--type",
            "student",
        ],
    );
    assert!(
        output.status.success(),
        "create failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_cli_init_create_show_list() {
    let store = TempStore::new("teller_cli_flow");
    init_store(&store.path);
    create_account(&store.path, "1");

    let show = teller(&store.path, &["show", "1"]);
    assert!(show.status.success());
    let stdout = String::from_utf8_lossy(&show.stdout);
    assert!(stdout.contains("Alice Example"));
    assert!(stdout.contains("alice@gmail.com"));
    assert!(stdout.contains("Type:    student"));

    let list = teller(&store.path, &["list", "--json"]);
    assert!(list.status.success());
    let value: serde_json::Value = serde_json::from_slice(&list.stdout).expect("parse list json");
    let array = value.as_array().expect("list output array");
    assert_eq!(array.len(), 1);
    assert_eq!(array[0].get("id").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(
        array[0].get("fullName").and_then(|v| v.as_str()),
        Some("Alice Example")
    );
    // Credential material never appears in account output
    assert!(array[0].get("secret").is_none());
    assert!(array[0].get("password").is_none());
}

#[test]
fn test_cli_patch_updates_named_fields_only() {
    let store = TempStore::new("teller_cli_patch");
    init_store(&store.path);
    create_account(&store.path, "1");

    let patch = teller(&store.path, &["patch", "1", "email=alice.b@yahoo.com"]);
    assert!(
        patch.status.success(),
        "patch failed: stderr={}",
        String::from_utf8_lossy(&patch.stderr)
    );

    let show = teller(&store.path, &["show", "1", "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&show.stdout).expect("parse show json");
    assert_eq!(
        value.get("email").and_then(|v| v.as_str()),
        Some("alice.b@yahoo.com")
    );
    assert_eq!(
        value.get("fullName").and_then(|v| v.as_str()),
        Some("Alice Example")
    );
}

#[test]
fn test_cli_patch_rejects_unknown_key_with_validation_exit_code() {
    let store = TempStore::new("teller_cli_patch_unknown");
    init_store(&store.path);
    create_account(&store.path, "1");

    let patch = teller(&store.path, &["patch", "1", "nickname=al"]);
    assert_eq!(patch.status.code(), Some(4));

    let patch = teller(&store.path, &["patch", "1", "password=NewPassword123"]);
    assert_eq!(patch.status.code(), Some(4));
}

#[test]
fn test_cli_verify_and_passwd_flow() {
    let store = TempStore::new("teller_cli_passwd");
    init_store(&store.path);
    create_account(&store.path, "1");

    let verify = teller(&store.path, &["verify", "1"]);
    assert!(verify.status.success());
    assert!(String::from_utf8_lossy(&verify.stdout).contains("Password verified."));

    // Change the password, then the old one no longer verifies
    let mut passwd = Command::new(bin());
    passwd
        .args(["passwd", "1"])
        .arg("--store")
        .arg(&store.path)
        .env("TELLER_PASSPHRASE", PASSPHRASE)
        .env("TELLER_ACCOUNT_PASSWORD", "a-fresh-password-456");
    let passwd = passwd.output().expect("run passwd");
    assert!(
        passwd.status.success(),
        "passwd failed: stderr={}",
        String::from_utf8_lossy(&passwd.stderr)
    );

    let verify_old = teller(&store.path, &["verify", "1"]);
    assert_eq!(verify_old.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&verify_old.stderr).contains("Authentication failed."));

    // Reusing a previous password is rejected
    let mut reuse = Command::new(bin());
    reuse
        .args(["passwd", "1"])
        .arg("--store")
        .arg(&store.path)
        .env("TELLER_PASSPHRASE", PASSPHRASE)
        .env("TELLER_ACCOUNT_PASSWORD", PASSWORD);
    let reuse = reuse.output().expect("run passwd reuse");
    assert_eq!(reuse.status.code(), Some(4));

    // Two credentials in the history now: 48-byte secrets render as
    // 64-character base64 tokens
    let credentials = teller(&store.path, &["credentials", "1"]);
    assert!(credentials.status.success());
    let stdout = String::from_utf8_lossy(&credentials.stdout);
    let secrets = stdout
        .split_whitespace()
        .filter(|token| {
            token.len() == 64
                && token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
        })
        .count();
    assert_eq!(secrets, 2);
}

#[test]
fn test_cli_verify_unknown_account_same_as_wrong_password() {
    let store = TempStore::new("teller_cli_verify_unknown");
    init_store(&store.path);
    create_account(&store.path, "1");

    let unknown = teller(&store.path, &["verify", "99"]);
    assert_eq!(unknown.status.code(), Some(1));
    let unknown_stderr = String::from_utf8_lossy(&unknown.stderr).to_string();

    let mut wrong = Command::new(bin());
    wrong
        .args(["verify", "1"])
        .arg("--store")
        .arg(&store.path)
        .env("TELLER_PASSPHRASE", PASSPHRASE)
        .env("TELLER_ACCOUNT_PASSWORD", "not-the-password-1");
    let wrong = wrong.output().expect("run verify wrong");
    assert_eq!(wrong.status.code(), Some(1));

    // Identical failure surface for both cases
    assert_eq!(
        unknown_stderr,
        String::from_utf8_lossy(&wrong.stderr).to_string()
    );
}

#[test]
fn test_cli_delete_removes_account() {
    let store = TempStore::new("teller_cli_delete");
    init_store(&store.path);
    create_account(&store.path, "1");

    let delete = teller(&store.path, &["delete", "1"]);
    assert!(delete.status.success());

    let show = teller(&store.path, &["show", "1"]);
    assert_eq!(show.status.code(), Some(3));

    let check = teller(&store.path, &["check"]);
    assert!(check.status.success());
    assert!(String::from_utf8_lossy(&check.stdout).contains("Integrity check: OK"));
}

#[test]
fn test_cli_duplicate_account_exit_code() {
    let store = TempStore::new("teller_cli_duplicate");
    init_store(&store.path);
    create_account(&store.path, "1");

    let duplicate = teller(
        &store.path,
        &[
            "create",
            "1",
            "--name",
            "Bob Example",
            "--email",
            "bob@gmail.com",
        ],
    );
    assert_eq!(duplicate.status.code(), Some(4));
}

#[test]
fn test_cli_create_rejects_bad_email() {
    let store = TempStore::new("teller_cli_bad_email");
    init_store(&store.path);

    let create = teller(
        &store.path,
        &[
            "create",
            "1",
            "--name",
            "Bob Example",
            "--email",
            "bob@nowhere.dev",
        ],
    );
    assert_eq!(create.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&create.stderr).contains("not whitelisted"));
}

#[test]
fn test_cli_wrong_passphrase_exit_code() {
    let store = TempStore::new("teller_cli_wrong_passphrase");
    init_store(&store.path);

    let mut list = Command::new(bin());
    list.args(["list"])
        .arg("--store")
        .arg(&store.path)
        .env("TELLER_PASSPHRASE", "wrong-passphrase-456");
    let list = list.output().expect("run list");
    assert_eq!(list.status.code(), Some(5));
}

#[test]
fn test_cli_missing_store_exit_code() {
    let missing = temp_store_path("teller_cli_missing");

    let mut list = Command::new(bin());
    list.args(["list"])
        .arg("--store")
        .arg(&missing)
        .env("TELLER_PASSPHRASE", PASSPHRASE);
    let list = list.output().expect("run list");
    assert_eq!(list.status.code(), Some(3));
}

#[test]
fn test_cli_no_store_argument_errors() {
    let mut list = Command::new(bin());
    list.args(["list"])
        .env_remove("TELLER_STORE")
        .env("TELLER_PASSPHRASE", PASSPHRASE);
    let list = list.output().expect("run list");
    assert_eq!(list.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&list.stderr).contains("No store specified"));
}

#[test]
fn test_cli_quickstart_output() {
    let output = Command::new(bin()).output().expect("run teller");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Quickstart"));
    assert!(stdout.contains("teller init"));
}

#[test]
fn test_cli_invalid_args_exit_code() {
    let output = Command::new(bin())
        .arg("create")
        .output()
        .expect("run create");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage:") || stderr.contains("error:"));
}
