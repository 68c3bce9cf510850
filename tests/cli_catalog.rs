mod wine_page_stub;

use std::path::Path;

use predicates::prelude::*;
use serde_json::Value;
use wine_page_stub::{Reply, TOP_SECTION_PAGE, WinePageStub};

fn cellar(data_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cellar");
    cmd.arg("--data-dir").arg(data_dir).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

#[test]
fn add_list_and_tags_share_the_store() {
    let tmp = tempfile::tempdir().unwrap();

    let output = cellar(tmp.path())
        .args([
            "add", "--name", "Chinon", "--winery", "Baudry", "--quantity", "2", "--food", "Fromage",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let record = stdout_json(&output);
    let id = record["id"].as_str().unwrap();
    assert!(tmp.path().join("records").join(format!("{id}.json")).is_file());

    cellar(tmp.path())
        .args(["add", "--name", "Vouvray", "--food", "Poisson"])
        .assert()
        .success();

    let output = cellar(tmp.path())
        .args(["list", "--food", "fromage"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listed = stdout_json(&output);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Chinon");

    let output = cellar(tmp.path())
        .args(["tags", "--facet", "food"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!([
            { "tag": "fromage", "count": 2 },
            { "tag": "poisson", "count": 1 }
        ])
    );
}

#[test]
fn set_quantity_and_delete_by_id() {
    let tmp = tempfile::tempdir().unwrap();

    let output = cellar(tmp.path())
        .args(["add", "--name", "Cahors"])
        .output()
        .unwrap();
    let id = stdout_json(&output)["id"].as_str().unwrap().to_owned();

    let output = cellar(tmp.path())
        .args(["set-quantity", "--id", &id, "--quantity", "0"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let updated = stdout_json(&output);
    assert_eq!(updated["quantity"], 0);
    assert_eq!(updated["name"], "Cahors");

    cellar(tmp.path())
        .args(["delete", "--id", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"removed\": true"));

    cellar(tmp.path())
        .args(["delete", "--id", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"removed\": false"));

    cellar(tmp.path())
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn invalid_id_is_reported_on_stderr() {
    let tmp = tempfile::tempdir().unwrap();
    cellar(tmp.path())
        .args(["delete", "--id", "../escape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid record id"));
}

#[test]
fn scrape_prints_normalized_fields() {
    let stub = WinePageStub::spawn(vec![Reply::page(TOP_SECTION_PAGE)]);
    let tmp = tempfile::tempdir().unwrap();

    let output = cellar(tmp.path())
        .args(["scrape", "--url", &stub.url("/w/margaux")])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let scraped = stdout_json(&output);
    assert_eq!(scraped["name"], "Margaux");
    assert_eq!(scraped["color"], "Red");
    assert_eq!(scraped["estimatedPrice"], 42.5);
    assert!(!tmp.path().join("records").exists());
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let tmp = tempfile::tempdir().unwrap();
    cellar(tmp.path())
        .env("RUST_LOG", "debug")
        .args(["list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}
