use std::path::Path;
use std::process::{Command, Output};

const DEFINITION: &str = r#"{
    "identifier": "T",
    "outcome_declarations": [
        { "identifier": "TOTAL", "cardinality": "single", "base_type": "float" }
    ],
    "test_parts": [{
        "identifier": "P01",
        "sections": [{
            "identifier": "S01",
            "parts": [
                { "item_ref": {
                    "identifier": "Q01",
                    "response_declarations": [
                        { "identifier": "RESPONSE", "cardinality": "single", "base_type": "identifier" }
                    ]
                } }
            ]
        }]
    }]
}"#;

fn qsnap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qsnap"))
        .args(args)
        .env_remove("QSNAP_LOG")
        .env_remove("QSNAP_DEFINITION")
        .env_remove("QSNAP_STORE")
        .env_remove("QSNAP_SESSION")
        .env_remove("QSNAP_COMPRESSION")
        .output()
        .expect("failed to run qsnap")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "qsnap failed.\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("stdout is not utf-8")
}

fn write_definition(dir: &Path) -> String {
    let path = dir.join("test.json");
    std::fs::write(&path, DEFINITION).unwrap();
    path.display().to_string()
}

#[test]
fn index_lists_entries_per_category() {
    let tmp = tempfile::tempdir().unwrap();
    let definition = write_definition(tmp.path());

    let out = stdout_of(&qsnap(&[
        "index",
        "--definition",
        &definition,
        "--categories",
        "assessmentItemRef,responseDeclaration,outcomeDeclaration",
    ]));
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        [
            "assessmentItemRef 0 Q01",
            "responseDeclaration 0 Q01.RESPONSE",
            "outcomeDeclaration 0 TOTAL",
        ]
    );
}

#[test]
fn init_then_inspect() {
    let tmp = tempfile::tempdir().unwrap();
    let definition = write_definition(tmp.path());
    let store = tmp.path().join("store").display().to_string();

    let id = stdout_of(&qsnap(&[
        "init",
        "--definition",
        &definition,
        "--store",
        &store,
        "--compression",
        "none",
    ]));
    let id = id.trim();
    assert_eq!(id, "session-0");

    let json = stdout_of(&qsnap(&[
        "inspect",
        "--definition",
        &definition,
        "--store",
        &store,
        "--session",
        id,
    ]));
    let session: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(session["session_id"], "session-0");
    assert_eq!(session["test_identifier"], "T");
    assert_eq!(session["item_sessions"].as_array().map(Vec::len), Some(1));

    // The next session gets a fresh id.
    let second = stdout_of(&qsnap(&["init", "--definition", &definition, "--store", &store]));
    assert_eq!(second.trim(), "session-1");
}

#[test]
fn inspect_unknown_session_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let definition = write_definition(tmp.path());
    let store = tmp.path().join("store").display().to_string();

    let output = qsnap(&[
        "inspect",
        "--definition",
        &definition,
        "--store",
        &store,
        "--session",
        "missing",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing"), "stderr:\n{stderr}");
}
