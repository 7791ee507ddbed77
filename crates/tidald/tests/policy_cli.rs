//! `tidald policy` round trip through the real binary.

use std::path::Path;
use std::process::{Command, Output};

fn tidald(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tidald"))
        .arg("policy")
        .arg("--policy-db")
        .arg(db)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn apply_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("policies.redb");
    let file = dir.path().join("policies.toml");
    std::fs::write(
        &file,
        r#"
[[policy]]
id = "web-cpu"
source = "local-cluster"
query = "avg_cpu"
interval = "30s"

[policy.target]
name = "local-cluster"
config = { job = "web" }

[policy.strategy]
name = "target-value"
min = 1
max = 10
config = { target = "50" }
"#,
    )
    .unwrap();

    let out = tidald(&db, &["apply", file.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("applied web-cpu"));

    let out = tidald(&db, &["list"]);
    assert!(out.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(listed[0]["id"], "web-cpu");
    assert_eq!(listed[0]["target"]["config"]["job"], "web");

    let out = tidald(&db, &["delete", "web-cpu"]);
    assert!(out.status.success());

    let out = tidald(&db, &["delete", "web-cpu"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not found"));
}
