mod fixtures;

use fixtures::*;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::File;
use std::io::Read;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn it_prints_a_text_summary() {
    let mut cmd = Command::new(assert_cmd::cargo_bin!("evpipe_schema"));
    cmd.arg(runtime_schema_path().to_str().unwrap());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "template GCStart_V2 (26 bytes inline)",
        ))
        .stdout(predicate::str::contains(
            "provider Microsoft-Windows-DotNETRuntime (DotNETRuntime)",
        ))
        .stdout(predicate::str::contains(
            "ModuleLoad_V2 value=152 version=2 level=Informational keywords=0x8 template=ModuleLoadUnload_V2",
        ))
        .stdout(predicate::str::contains("Values: struct [Count]"));
}

#[test]
fn it_prints_json() {
    let mut cmd = Command::new(assert_cmd::cargo_bin!("evpipe_schema"));
    cmd.args(["-o", "json", runtime_schema_path().to_str().unwrap()]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let providers = summary["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[1]["pretty_name"], "DotNETRuntimeRundown");
    assert_eq!(providers[1]["events"][0]["keywords"], "0x18");

    let templates = summary["templates"].as_array().unwrap();
    let bulk_edge = templates
        .iter()
        .find(|t| t["name"] == "GCBulkEdge")
        .unwrap();
    assert_eq!(bulk_edge["estimated_inline_size"], 10);
}

#[test]
fn it_respects_a_custom_string_allowance() {
    let mut cmd = Command::new(assert_cmd::cargo_bin!("evpipe_schema"));
    cmd.args([
        "--string-allowance",
        "0",
        runtime_schema_path().to_str().unwrap(),
    ]);

    cmd.assert().success().stdout(predicate::str::contains(
        "template ModuleLoadUnload_V2 (46 bytes inline)",
    ));
}

#[test]
fn it_respects_file_output() {
    let d = tempdir().unwrap();
    let f = d.as_ref().join("nested").join("summary.txt");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evpipe_schema"));
    cmd.args([
        "-f",
        &f.to_string_lossy(),
        runtime_schema_path().to_str().unwrap(),
    ]);

    assert!(
        cmd.output().unwrap().stdout.is_empty(),
        "Expected output to be printed to file, but was printed to stdout"
    );

    let mut written = String::new();
    File::open(&f).unwrap().read_to_string(&mut written).unwrap();
    assert!(written.contains("provider Microsoft-Windows-DotNETRuntimeRundown"));
}

#[test]
fn test_it_refuses_to_overwrite_directory() {
    let d = tempdir().unwrap();

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evpipe_schema"));
    cmd.args([
        "-f",
        &d.path().to_string_lossy(),
        runtime_schema_path().to_str().unwrap(),
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn test_it_reports_schema_errors() {
    let mut cmd = Command::new(assert_cmd::cargo_bin!("evpipe_schema"));
    cmd.arg(invalid_count_schema_path().to_str().unwrap());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid schema"))
        .stderr(predicate::str::contains(
            "count field `Length` must appear before the field it sizes",
        ));
}
