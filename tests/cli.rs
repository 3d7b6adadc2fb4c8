mod common;

use assert_cmd::Command;
use common::{FIXTURES, TestWorkspace, fixture_path};
use gstr_recon::document::Document;
use predicates::str::contains;

fn bin() -> Command {
    Command::cargo_bin("gstr-recon").expect("binary exists")
}

fn generate_into(workspace: &TestWorkspace, name: &str) -> std::path::PathBuf {
    let output = workspace.path().join(name);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).expect("create output dir");
    }
    let mut command = bin();
    command.arg("generate");
    for fixture in FIXTURES {
        command.arg("-i").arg(fixture_path(fixture));
    }
    command.arg("-o").arg(&output).assert().success();
    output
}

#[test]
fn generate_writes_assembled_document() {
    let workspace = TestWorkspace::new();
    let output = generate_into(&workspace, "filing.json");

    let document = Document::from_bytes(&std::fs::read(&output).unwrap()).expect("decode document");
    assert_eq!(document.sheet("b2b").unwrap().data_row_count(), 3);
    assert_eq!(document.sheet("b2cs").unwrap().data_row_count(), 1);
    assert_eq!(document.sheet("hsn").unwrap().data_row_count(), 3);
    let docs = document.sheet("Docs_issued").unwrap();
    let net = docs.column("Net Issued").unwrap();
    assert_eq!(docs.cell(0, net).as_display(), "118");
}

#[test]
fn generate_merges_into_base_document() {
    let workspace = TestWorkspace::new();
    let base = generate_into(&workspace, "base.json");
    let output = workspace.path().join("merged.json");
    bin()
        .args(["generate", "-i"])
        .arg(fixture_path("b2b.csv"))
        .arg("-b")
        .arg(&base)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let document = Document::from_bytes(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(document.sheet("b2b").unwrap().data_row_count(), 6);
}

#[test]
fn generate_reads_latin1_inputs() {
    let workspace = TestWorkspace::new();
    let mut bytes = b"GSTIN/UIN of Recipient,Receiver Name,Taxable Value\n29AAAAA0000A1Z5,Caf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b",100\n");
    let input = workspace.write("b2b_latin.csv", bytes);
    let output = workspace.path().join("out.json");

    bin()
        .args(["generate", "--input-encoding", "windows-1252", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let document = Document::from_bytes(&std::fs::read(&output).unwrap()).unwrap();
    let b2b = document.sheet("b2b").unwrap();
    let name = b2b.column("Receiver Name").unwrap();
    assert_eq!(b2b.cell(0, name).as_display(), "Café");
}

#[test]
fn generate_rejects_unknown_encoding() {
    let workspace = TestWorkspace::new();
    bin()
        .args(["generate", "--input-encoding", "klingon", "-i"])
        .arg(fixture_path("b2b.csv"))
        .arg("-o")
        .arg(workspace.path().join("out.json"))
        .assert()
        .failure()
        .stderr(contains("klingon"));
}

#[test]
fn verify_writes_corrected_document_and_error_report() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("store");
    generate_into(&workspace, "store/uploads/filing.json");

    bin()
        .arg("verify")
        .arg("-s")
        .arg(&store)
        .args(["-k", "uploads/filing.json", "--ca-code", "CA01"])
        .assert()
        .success()
        .stdout(contains("identifiers:  3 checked, 1 invalid, 1 moved"))
        .stdout(contains("codes:        1 corrected"))
        .stdout(contains("outputs/CA01/unknown/corrected_"));

    let files = workspace.files();
    let report = files
        .iter()
        .find(|f| f.starts_with("store/outputs/CA01/unknown/error_report_"))
        .expect("error report written");
    let corrected = files
        .iter()
        .find(|f| f.starts_with("store/outputs/CA01/unknown/corrected_"))
        .expect("corrected document written");

    let report = workspace.read_to_string(report);
    let lines = report.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "GSTIN,Party Name,Error Type,Taxable Value,Rate,Action");
    assert!(lines[1].starts_with("1234,Walk-in Buyer,"));
    assert_eq!(lines.len(), 2);

    let document = Document::from_bytes(workspace.read_to_string(corrected).as_bytes()).unwrap();
    assert_eq!(document.sheet("b2b").unwrap().data_row_count(), 2);
    assert_eq!(document.sheet("b2cs").unwrap().data_row_count(), 2);
}

#[test]
fn verify_json_summary_includes_dashboard() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("store");
    generate_into(&workspace, "store/filing.json");

    let output = bin()
        .arg("verify")
        .arg("-s")
        .arg(&store)
        .args(["-k", "filing.json", "--ca-code", "CA01", "--customer-id", "C9", "--json"])
        .output()
        .expect("run verify");
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("summary JSON");
    assert_eq!(summary["total_checked"], 3);
    assert_eq!(summary["total_moved"], 1);
    assert!(
        summary["error_report_key"]
            .as_str()
            .unwrap()
            .starts_with("outputs/CA01/C9/")
    );
    assert_eq!(summary["dashboard"]["b2b"]["taxable"], 2000.0);
    assert_eq!(summary["dashboard"]["hsn"]["cgst"], 169.0);
}

#[test]
fn verify_missing_key_fails_without_writing() {
    let workspace = TestWorkspace::new();
    workspace.write("store/.keep", "");

    bin()
        .arg("verify")
        .arg("-s")
        .arg(workspace.path().join("store"))
        .args(["-k", "absent.json", "--ca-code", "CA01"])
        .assert()
        .failure()
        .stderr(contains("absent.json"));

    assert_eq!(workspace.files(), vec!["store/.keep"]);
}

#[test]
fn verify_honours_master_code_override() {
    let workspace = TestWorkspace::new();
    let store = workspace.path().join("store");
    generate_into(&workspace, "store/filing.json");
    let master = workspace.write("codes.yaml", "998412: Telecom\n998599: Support\n99841: Telecom short\n");

    bin()
        .arg("verify")
        .arg("-s")
        .arg(&store)
        .args(["-k", "filing.json", "--ca-code", "CA01", "--master-codes"])
        .arg(&master)
        .assert()
        .success()
        .stdout(contains("codes:        0 corrected"));
}

#[test]
fn portal_prints_return_json() {
    let workspace = TestWorkspace::new();
    let document = generate_into(&workspace, "filing.json");

    let output = bin()
        .arg("portal")
        .arg("-d")
        .arg(&document)
        .args(["--gstin", "29AAAAA0000A1Z5", "--period", "042024"])
        .output()
        .expect("run portal");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["version"], "V1.0");
    assert_eq!(value["fp"], "042024");
    assert_eq!(value["b2b"].as_array().unwrap().len(), 3);
    assert_eq!(value["hsn"]["data"].as_array().unwrap().len(), 3);
}

#[test]
fn portal_rejects_malformed_period() {
    let workspace = TestWorkspace::new();
    let document = generate_into(&workspace, "filing.json");
    bin()
        .arg("portal")
        .arg("-d")
        .arg(&document)
        .args(["--gstin", "29AAAAA0000A1Z5", "--period", "2024-04"])
        .assert()
        .failure()
        .stderr(contains("MMYYYY"));
}

#[test]
fn mappings_lists_one_category() {
    bin()
        .args(["mappings", "--category", "hsn"])
        .assert()
        .success()
        .stdout(contains("Total Taxable Value"))
        .stdout(contains("Central Tax Amount"));
}

#[test]
fn mappings_rejects_unknown_category() {
    bin()
        .args(["mappings", "--category", "ledger"])
        .assert()
        .failure()
        .stderr(contains("Unknown category 'ledger'"));
}
