// Binary-level tests: spawn `nfk` against hermetic temp workspaces
// and assert on exit status, stdout and the files left behind.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

mod util;

use util::*;

fn nfk() -> Command {
    Command::cargo_bin("nfk").expect("nfk binary")
}

#[test]
fn key_computes_check_digit_for_a_body() {
    nfk()
        .args(["--no-color", "key", &SALE[..43]])
        .assert()
        .success()
        .stdout(predicate::str::contains(SALE))
        .stdout(predicate::str::contains("check digit 9"));
}

#[test]
fn key_quiet_prints_only_the_digit() {
    nfk()
        .args(["--quiet", "key", "35.2401.12345678000195.55.001.000000001.1.12345678"])
        .assert()
        .success()
        .stdout("9\n");
}

#[test]
fn key_verification_fails_on_wrong_digit() {
    nfk()
        .args(["key", SALE])
        .assert()
        .success();

    let wrong = format!("{}0", &SALE[..43]);
    nfk()
        .args(["key", &wrong])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 9, found 0"));

    nfk()
        .args(["key", "123"])
        .assert()
        .failure();
}

#[test]
fn inspect_json_lists_every_file_without_touching_it() {
    let tmp = make_workspace();
    let before = snapshot_dir(tmp.child("batch").path());

    let out = nfk()
        .current_dir(tmp.path())
        .args(["--quiet", "inspect", "batch", "--format", "json"])
        .output()
        .expect("run inspect");
    assert!(out.status.success());

    let v: Value = serde_json::from_slice(&out.stdout).expect("valid json");
    let lines: Vec<String> = v
        .as_array()
        .expect("array")
        .iter()
        .map(|s| {
            let file = s["path"]
                .as_str()
                .and_then(|p| p.rsplit(['/', '\\']).next())
                .unwrap_or_default();
            let proposed = s["proposed_name"]
                .as_str()
                .unwrap_or("-");
            format!("{file}: {} -> {proposed}", s["kind"].as_str().unwrap_or_default())
        })
        .collect();

    insta::assert_json_snapshot!(lines, @r#"
    [
      "a_sale.xml: NFe -> 1 - Venda.xml",
      "b_devolution.xml: NFe -> 2 - Devolucao da venda 1.xml",
      "c_remittance.xml: NFe -> 3 - Remessa simbólica da venda 1.xml",
      "d_cancel.xml: cancellation -> CAN-1.xml",
      "e_manifest.xml: CTe -> -",
      "f_denial.xml: inutilização -> -",
      "g_broken.xml: malformed -> -",
      "h_other.xml: unknown -> -"
    ]
    "#);

    assert_eq!(snapshot_dir(tmp.child("batch").path()), before);
}

#[test]
fn process_json_report_and_output_copy() {
    let tmp = make_workspace();
    let before = snapshot_dir(tmp.child("batch").path());

    let out = nfk()
        .current_dir(tmp.path())
        .args(["--quiet", "process", "batch", "--profile", "atlas", "--output", "out", "--json"])
        .output()
        .expect("run process");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report: Value = serde_json::from_slice(&out.stdout).expect("valid json");
    assert_eq!(report["scanned"], 8);
    assert_eq!(report["recognized"], 6);
    assert_eq!(report["key_mappings"][SALE], SALE_NEW);
    assert_eq!(report["primary_sale_key"], SALE_NEW);
    assert_eq!(report["failures"][0]["stage"], "parse");
    assert_eq!(report["failures"][0]["kind"], "malformed-markup");

    // input untouched, copies renamed
    assert_eq!(snapshot_dir(tmp.child("batch").path()), before);
    tmp.child("out/1 - Venda.xml")
        .assert(predicate::path::exists());
    tmp.child("out/CAN-1.xml")
        .assert(predicate::path::exists());
    tmp.child("out/a_sale.xml")
        .assert(predicate::path::missing());
}

#[test]
fn process_dry_run_writes_nothing() {
    let tmp = make_workspace();
    let before = snapshot_dir(tmp.child("batch").path());

    nfk()
        .current_dir(tmp.path())
        .args(["--no-color", "--dry-run", "process", "batch", "--profile", "atlas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"))
        .stdout(predicate::str::contains("a_sale.xml -> 1 - Venda.xml"));

    assert_eq!(snapshot_dir(tmp.child("batch").path()), before);
}

#[test]
fn process_with_unknown_profile_fails() {
    let tmp = make_workspace();
    nfk()
        .current_dir(tmp.path())
        .args(["process", "batch", "--profile", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}

#[test]
fn process_with_missing_directory_fails() {
    let tmp = make_workspace();
    nfk()
        .current_dir(tmp.path())
        .args(["process", "nowhere", "--profile", "atlas"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input directory not found"));
}

#[test]
fn init_writes_config_and_example_profile_once() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    nfk()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success();
    tmp.child("nfk.toml")
        .assert(predicate::str::contains("profiles_dir"));
    tmp.child("profiles/example.toml")
        .assert(predicate::str::contains("EMPRESA EXEMPLO LTDA"));

    nfk()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}
