use std::path::Path;

use assert_cmd::Command;
use lopdf::{dictionary, Object, Stream};
use predicates::prelude::*;
use pretty_assertions::assert_eq;

const INVOICE: &[&str] = &[
    "COMMERCIAL INVOICE",
    "Seller: Shenzhen Bright Trading Co., Ltd",
    "Total Amount: USD 12,345.67",
    "Beneficiary's Bank: Bank of China, Shenzhen Branch",
    "SWIFT Code: BKCHCNBJ45A",
    "Account No.: 7414 5678 9012",
];

fn write_pdf(path: &Path, lines: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut content = String::new();
    for (i, line) in lines.iter().enumerate() {
        content.push_str(&format!(
            "BT /F1 11 Tf 50 {} Td ({}) Tj ET\n",
            760 - i * 16,
            line
        ));
    }
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let kids: Vec<Object> = vec![page_id.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Command isolated from the user's config directory.
fn invcheck(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invcheck").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn config_path_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("invcheck.json");

    invcheck(dir.path())
        .args(["config", "path", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"))
        .stdout(predicate::str::contains("invcheck config init"));
}

#[test]
fn config_init_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("conf/invcheck.json");

    invcheck(dir.path())
        .args(["config", "init", "-c"])
        .arg(&config)
        .assert()
        .success();
    assert!(config.exists());

    invcheck(dir.path())
        .args(["config", "set", "extraction.fuzzy_threshold", "85", "-c"])
        .arg(&config)
        .assert()
        .success();

    let output = invcheck(dir.path())
        .args(["config", "get", "extraction.fuzzy_threshold", "-c"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "85");

    invcheck(dir.path())
        .args(["config", "set", "extraction.no_such_key", "1", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("invcheck.json");
    std::fs::write(&config, "{}").unwrap();

    invcheck(dir.path())
        .args(["config", "init", "-c"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn analyze_text_pdf_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("invoice.pdf");
    write_pdf(&pdf, INVOICE);

    let output = invcheck(dir.path())
        .arg("analyze")
        .arg(&pdf)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["swift_code"], "BKCHCNBJ45A");
    assert_eq!(json["currency"], "USD");
    assert_eq!(json["verification_currency"], "confirmed");
}

#[test]
fn analyze_writes_csv_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("invoice.pdf");
    let out = dir.path().join("invoice.csv");
    write_pdf(&pdf, INVOICE);

    invcheck(dir.path())
        .arg("analyze")
        .arg(&pdf)
        .args(["-f", "csv", "-o"])
        .arg(&out)
        .assert()
        .success();

    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("filename,"));
    assert!(csv.contains("BKCHCNBJ45A"));
}

#[test]
fn analyze_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    invcheck(dir.path())
        .args(["analyze", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn batch_writes_outputs_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    std::fs::create_dir_all(&input).unwrap();
    write_pdf(&input.join("a.pdf"), INVOICE);
    write_pdf(&input.join("b.pdf"), INVOICE);
    std::fs::write(input.join("broken.pdf"), b"not a pdf").unwrap();

    let pattern = format!("{}/*.pdf", input.display());
    invcheck(dir.path())
        .args(["batch", &pattern, "--summary", "--continue-on-error", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful"));

    assert!(output.join("a.json").exists());
    assert!(output.join("b.json").exists());
    assert!(!output.join("broken.json").exists());

    let summary = std::fs::read_to_string(output.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 4);
    assert!(summary.lines().any(|l| l.starts_with("broken.pdf,error,")));
}
