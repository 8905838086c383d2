use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn eulix(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("eulix").expect("binary builds");
    cmd.current_dir(dir.path());
    cmd
}

fn seed_checksum(dir: &TempDir, file_hashes: serde_json::Value, total_files: usize) {
    let session = dir.path().join(".eulix");
    std::fs::create_dir_all(&session).unwrap();
    let record = serde_json::json!({
        "project_path": dir.path().to_string_lossy(),
        "total_files": total_files,
        "total_lines": 0,
        "hash": "deadbeef",
        "file_hashes": file_hashes,
        "last_analyzed": "2025-01-01T00:00:00Z",
        "analysis_version": "0.5.3"
    });
    std::fs::write(
        session.join("checksum.json"),
        serde_json::to_vec_pretty(&record).unwrap(),
    )
    .unwrap();
}

fn seed_kb(dir: &TempDir) {
    let session = dir.path().join(".eulix");
    std::fs::create_dir_all(&session).unwrap();

    let index = serde_json::json!({
        "functions_by_name": {"authenticate_user": ["src/auth.py:10"]},
        "types_by_name": {"DownloadManager": ["src/dl.py:42"]},
        "functions_calling": {}
    });
    std::fs::write(
        session.join("kb_index.json"),
        serde_json::to_vec(&index).unwrap(),
    )
    .unwrap();

    let graph = serde_json::json!({
        "functions": {
            "authenticate_user": {
                "name": "authenticate_user",
                "location": "src/auth.py:10",
                "calls": ["hash_password", "query_user", "verify_password"],
                "called_by": ["login_endpoint"]
            }
        },
        "types": {}
    });
    std::fs::write(
        session.join("kb_call_graph.json"),
        serde_json::to_vec(&graph).unwrap(),
    )
    .unwrap();
}

#[test]
fn ask_without_init_exits_with_guidance() {
    let dir = TempDir::new().unwrap();
    eulix(&dir)
        .args(["ask", "where is main?"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not initialized"))
        .stderr(predicate::str::contains("eulix analyze"));
}

#[test]
fn stale_tree_refuses_to_answer() {
    let dir = TempDir::new().unwrap();
    // The stored record knows two files that no longer exist: 100% change.
    seed_checksum(
        &dir,
        serde_json::json!({"a.py": "h1", "b.py": "h2"}),
        2,
    );
    seed_kb(&dir);

    eulix(&dir)
        .args(["ask", "where is DownloadManager?"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("changed too much"))
        .stderr(predicate::str::contains("eulix analyze"));
}

#[test]
fn location_question_is_answered_from_the_index() {
    let dir = TempDir::new().unwrap();
    // Empty tree matching an empty stored record: fully fresh.
    seed_checksum(&dir, serde_json::json!({}), 0);
    seed_kb(&dir);

    eulix(&dir)
        .args(["ask", "where is DownloadManager?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Type 'DownloadManager' found at:"))
        .stdout(predicate::str::contains("src/dl.py:42"));
}

#[test]
fn usage_question_lists_calls_and_callers() {
    let dir = TempDir::new().unwrap();
    seed_checksum(&dir, serde_json::json!({}), 0);
    seed_kb(&dir);

    eulix(&dir)
        .args(["ask", "who calls authenticate_user"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Calls:"))
        .stdout(predicate::str::contains("hash_password"))
        .stdout(predicate::str::contains("Called by:"))
        .stdout(predicate::str::contains("login_endpoint"));
}

#[test]
fn status_reports_missing_analysis() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".eulix")).unwrap();

    eulix(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored analysis found"));
}

#[test]
fn status_reports_fresh_tree() {
    let dir = TempDir::new().unwrap();
    seed_checksum(&dir, serde_json::json!({}), 0);

    eulix(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: fresh"));
}

#[test]
fn cache_list_on_fresh_store_is_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".eulix")).unwrap();

    eulix(&dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache is empty"));
}

#[test]
fn cache_clean_reports_removed_count() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".eulix")).unwrap();

    eulix(&dir)
        .args(["cache", "clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 expired entries"));
}
