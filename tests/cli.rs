use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const OWNER: &str = "550e8400-e29b-41d4-a716-446655440000";

fn invoicing(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invoicing").unwrap();
    cmd.env("INVOICING_GENIUS_DATA_DIR", dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_table(dir: &Path, collection: &str, records: Value) {
    let data = dir.join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(
        data.join(format!("{}.json", collection)),
        serde_json::to_string_pretty(&json!({ "records": records })).unwrap(),
    )
    .unwrap();
}

fn read_table(dir: &Path, collection: &str) -> Vec<Value> {
    let contents = fs::read_to_string(dir.join("data").join(format!("{}.json", collection))).unwrap();
    let table: Value = serde_json::from_str(&contents).unwrap();
    table["records"].as_array().cloned().unwrap_or_default()
}

fn seed(dir: &Path) {
    write_table(
        dir,
        "invoices",
        json!([
            {"id": "A", "user_id": OWNER, "number": "INV-001"},
            {"id": "B", "user_id": OWNER, "number": "INV-002"}
        ]),
    );
    write_table(
        dir,
        "invoice_products",
        json!([
            {"id": "p1", "invoice_id": "A"},
            {"id": "p2", "invoice_id": "A"},
            {"id": "p3", "invoice_id": "B"}
        ]),
    );
}

fn init(dir: &Path) {
    invoicing(dir)
        .args(["init", "--owner", OWNER])
        .assert()
        .success()
        .stdout(predicate::str::contains(OWNER));
}

#[test]
fn test_backup_create_and_list() {
    let temp = TempDir::new().unwrap();
    init(temp.path());
    seed(temp.path());

    invoicing(temp.path())
        .args(["backup", "create", "--name", "Month end", "--output", "month-end.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created: 5 records"));

    assert!(temp.path().join("backups").join("month-end.json").exists());

    invoicing(temp.path())
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Month end"))
        .stdout(predicate::str::contains("Total: 1 backup(s)"));

    invoicing(temp.path())
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BACKUP"));
}

#[test]
fn test_validate_reports_every_issue() {
    let temp = TempDir::new().unwrap();
    init(temp.path());

    let bad = temp.path().join("bad.json");
    fs::write(&bad, r#"{"version": "1.0", "user_id": "nope", "metadata": {}}"#).unwrap();

    invoicing(temp.path())
        .args(["backup", "validate"])
        .arg(&bad)
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing field `data`"))
        .stdout(predicate::str::contains("missing field `timestamp`"))
        .stdout(predicate::str::contains("`user_id` is not a valid identifier"));
}

#[test]
fn test_restore_requires_force() {
    let temp = TempDir::new().unwrap();
    init(temp.path());
    seed(temp.path());

    invoicing(temp.path())
        .args(["backup", "create", "--output", "snap.json"])
        .assert()
        .success();

    invoicing(temp.path())
        .args(["backup", "restore", "snap.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));

    assert_eq!(read_table(temp.path(), "invoices").len(), 2);
}

#[test]
fn test_merge_restore_adds_remapped_copies() {
    let temp = TempDir::new().unwrap();
    init(temp.path());
    seed(temp.path());

    invoicing(temp.path())
        .args(["backup", "create", "--output", "snap.json"])
        .assert()
        .success();

    invoicing(temp.path())
        .args(["backup", "restore", "snap.json", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restore complete!"))
        .stdout(predicate::str::contains("invoices (2)"));

    let invoices = read_table(temp.path(), "invoices");
    assert_eq!(invoices.len(), 4);

    let invoice_ids: Vec<&str> = invoices.iter().filter_map(|r| r["id"].as_str()).collect();
    let products = read_table(temp.path(), "invoice_products");
    assert_eq!(products.len(), 6);
    assert!(products
        .iter()
        .all(|p| invoice_ids.contains(&p["invoice_id"].as_str().unwrap())));
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    init(temp.path());
    seed(temp.path());

    invoicing(temp.path())
        .args(["backup", "create", "--output", "snap.json"])
        .assert()
        .success();

    invoicing(temp.path())
        .args(["backup", "restore", "snap.json", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run, nothing written."));

    assert_eq!(read_table(temp.path(), "invoices").len(), 2);
}

#[test]
fn test_overwrite_restore_takes_pre_restore_backup() {
    let temp = TempDir::new().unwrap();
    init(temp.path());
    seed(temp.path());

    invoicing(temp.path())
        .args(["backup", "create", "--output", "snap.json"])
        .assert()
        .success();

    write_table(
        temp.path(),
        "invoices",
        json!([
            {"id": "A", "user_id": OWNER, "number": "INV-001-EDITED"},
            {"id": "B", "user_id": OWNER, "number": "INV-002"},
            {"id": "C", "user_id": OWNER, "number": "INV-003"}
        ]),
    );

    invoicing(temp.path())
        .args(["backup", "restore", "latest", "--overwrite", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pre-restore backup saved"));

    let invoices = read_table(temp.path(), "invoices");
    assert!(invoices.iter().all(|r| r["number"] != "INV-001-EDITED"));
    assert_eq!(read_table(temp.path(), "invoice_products").len(), 3);

    let mut ids: Vec<String> = invoices
        .iter()
        .filter_map(|r| r["id"].as_str().map(str::to_string))
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn test_commands_without_owner_fail() {
    let temp = TempDir::new().unwrap();

    invoicing(temp.path())
        .args(["backup", "create"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--owner"));
}
