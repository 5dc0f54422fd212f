use std::fs;

use relay_core::{Agreement, Contract};
use relay_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("acct-1");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write_bytes("nda.pdf", b"%PDF-1").unwrap();
    let second = writer.write_bytes("nda.pdf", b"%PDF-2").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"%PDF-2");
}

#[test]
fn results_are_written_as_json() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().join("acct-1"));
    let contracts = vec![Contract {
        agreement: Agreement {
            agreement_name: "Lease".to_string(),
            ..Agreement::default()
        },
    }];

    let path = writer.write_json("results.json", &contracts).unwrap();
    let decoded: Vec<Contract> = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert_eq!(decoded, contracts);
}

#[test]
fn output_path_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write_bytes("doc.pdf", b"data");
    assert!(matches!(result, Err(PersistError::OutputDir(_))));
    assert!(!file_path.with_file_name("doc.pdf").exists());
}
