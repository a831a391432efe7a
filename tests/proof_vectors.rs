use provebit::{DigestOrder, Executor, ExecutorConfig, ProofError, Verdict, parse, verify};
use serde_json::{Value, json};
use std::fs::File;
use std::io::Write;

const SAMPLE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample.bin");

// sha256sum tests/fixtures/sample.bin
const SAMPLE_SHA256: &str = "9917b1a5109f4d2eb2b13bc15d650d9871bc72684687314d596699ba6b127a3f";
// (echo -n a; cat tests/fixtures/sample.bin; echo -n b) | sha256sum
const SAMPLE_WRAPPED_SHA256: &str = "3ababf177382290338e5fd34aa6c115074e1e6b598c41d60314031cf7b9953fc";

fn unrestricted() -> Executor {
    Executor::with_config(ExecutorConfig {
        allow_unbounded_reads: true,
        ..ExecutorConfig::default()
    })
}

fn run(executor: &Executor, program: Value, source: &[u8]) -> Result<Vec<u8>, ProofError> {
    let program = parse(&program).expect("program should parse");
    executor.execute_bytes(&program, source)
}

fn run_text(executor: &Executor, program: Value, source: &[u8]) -> String {
    let out = run(executor, program, source).expect("execution should succeed");
    String::from_utf8(out).expect("output should be UTF-8")
}

#[test]
fn cat_vector() {
    let program = json!([
        ["op_cat", "s:a", "s:b"],
        ["op_cat", "s:c", "m:-1"],
        ["op_cat", "s:bag"],
        ["op_cat", "h:65"]
    ]);
    assert_eq!(run_text(&Executor::new(), program, b""), "cabbage");
}

#[test]
fn sha256_vector() {
    let program = json!([["op_sha256", "s:test", "m:-1", "s:stuff"]]);
    let out = run(&Executor::new(), program, b"ing ").unwrap();
    assert_eq!(
        hex::encode(out),
        "3367a47f48cd5948e68ed649f74d6fcc60725a881593543ae646a9b63f55fe19"
    );
}

#[test]
fn sha256_vector_reversed_order() {
    let executor = Executor::with_config(ExecutorConfig {
        digest_order: DigestOrder::Reversed,
        ..ExecutorConfig::default()
    });
    let program = json!([["op_sha256", "s:test", "m:-1", "s:stuff"]]);
    let out = run(&executor, program, b"ing ").unwrap();
    assert_eq!(
        hex::encode(out),
        "19fe553fb6a946e63a549315885a7260cc6f4df749d68ee64859cd487fa46733"
    );
}

#[test]
fn rev_vector() {
    let out = run_text(&unrestricted(), json!([["op_rev"]]), b"this is a test");
    assert_eq!(out, "tset a si siht");
}

#[test]
fn file_input_streams_through_hash() {
    let program = parse(&json!([["op_sha256"]])).unwrap();
    let file = File::open(SAMPLE).expect("fixture should exist");
    let out = Executor::new().execute(&program, file).unwrap();
    assert_eq!(hex::encode(out), SAMPLE_SHA256);

    let program = parse(&json!([["op_sha256", "s:a", "m:-1", "s:b"]])).unwrap();
    let file = File::open(SAMPLE).expect("fixture should exist");
    let out = Executor::new().execute(&program, file).unwrap();
    assert_eq!(hex::encode(out), SAMPLE_WRAPPED_SHA256);
}

#[test]
fn file_input_from_temp_file() {
    let data = std::fs::read(SAMPLE).unwrap();
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&data).unwrap();
    tmp.flush().unwrap();

    let program = parse(&json!([["op_sha256", "s:a", "m:-1", "s:b"]])).unwrap();
    let expected = hex::decode(SAMPLE_WRAPPED_SHA256).unwrap();
    let verdict = verify(&Executor::new(), &program, File::open(tmp.path()).unwrap(), &expected);
    assert!(verdict.holds(), "got {:?}", verdict);
}

#[test]
fn file_input_in_bounded_chunks() {
    let program = json!([
        ["op_set", "r:100"],
        ["op_sha256"],
        ["op_store", 1],
        ["op_set", "s:"],
        ["op_sha256", "m:-1", "r:1000000"],
        ["op_cat", "m:1", "m:-1"]
    ]);
    let data = std::fs::read(SAMPLE).unwrap();
    let out = run(&Executor::new(), program, &data).unwrap();
    assert_eq!(
        hex::encode(out),
        concat!(
            "419285bc06cdd194662f1e71d5a6b5676b78c5e1c8079803cbcf730f319273aa",
            "7dc1667db4d7adeb85f9d0b860b7002d9fe51d13eec1c904495d327729a26180"
        )
    );
}

#[test]
fn file_input_bounded_read_first() {
    let program = parse(&json!([["op_sha256", "r:100"]])).unwrap();
    let out = Executor::new().execute(&program, File::open(SAMPLE).unwrap()).unwrap();
    assert_eq!(
        hex::encode(out),
        "419285bc06cdd194662f1e71d5a6b5676b78c5e1c8079803cbcf730f319273aa"
    );
}

#[test]
fn buffering_a_file_is_refused_when_restricted() {
    let program = parse(&json!([["op_cat", "s:x"]])).unwrap();
    let file = File::open(SAMPLE).unwrap();
    let err = Executor::new().execute(&program, file).unwrap_err();
    assert!(matches!(err, ProofError::StreamPolicy(_)), "got {}", err);
}

#[test]
fn functions_vector() {
    let program = json!([
        ["op_func", "cats", [
            ["op_cat", "a:1", "s:s"]
        ]],
        ["op_func", "words", [
            ["op_cat", "s:This ", "a:1"],
            ["f_cats", "m:-1"],
            ["op_store", 32],
            ["f_cats", "a:2"],
            ["op_cat", "s: ", "m:-1"],
            ["op_cat", "m:32", "m:-1"],
            ["op_cat", "s:."]
        ]],
        ["f_words", "s:test", "s:thing"]
    ]);
    assert_eq!(run_text(&Executor::new(), program, b""), "This tests things.");
}

#[test]
fn store_load_set_swap_vector() {
    let program = json!([
        ["op_store", 35],
        ["op_set", "s:bb"],
        ["op_store", 36],
        ["op_load", 35],
        ["op_store", 37],
        ["op_set", "s:c"],
        ["op_cat", "m:35"],
        ["op_cat", "m:36"],
        ["op_cat", "m:37"],
        ["op_swap", 36],
        ["op_cat", "m:36"]
    ]);
    assert_eq!(run_text(&unrestricted(), program, b"aaa"), "bbcaaabbaaa");
}

#[test]
fn compose_vector() {
    let program = json!([
        ["op_cat", "s:ing"],
        ["op_compose", "s:We are testing..."],
        ["op_cat", "s: things."]
    ]);
    assert_eq!(run_text(&unrestricted(), program, b"test"), "We are testing... things.");

    let program = json!([
        ["op_cat", "s:ing"],
        ["op_compose", "s:We are tes?ting..."],
        ["op_cat", "s: things."]
    ]);
    let err = run(&unrestricted(), program, b"test").unwrap_err();
    assert!(err.is_abort(), "got {}", err);
}

#[test]
fn compose_failure_through_verify() {
    let program = parse(&json!([["op_cat", "s:ing"], ["op_compose", "s:tes?ting"]])).unwrap();
    let verdict = verify(&unrestricted(), &program, &b"test"[..], b"testing");
    assert!(matches!(verdict, Verdict::Aborted(_)), "got {:?}", verdict);
}

#[test]
fn text_form_survives_binary_round_trip() {
    let text = r#"[["op_func","wrap",[["op_sha256","s:a","a:1","s:b"]]],["f_wrap","m:-1"]]"#;
    let program = provebit::parse_str(text).unwrap();
    let decoded = provebit::Program::from_bytes(&program.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.to_json().to_string(), text);

    let data = std::fs::read(SAMPLE).unwrap();
    let out = unrestricted().execute_bytes(&decoded, &data).unwrap();
    assert_eq!(hex::encode(out), SAMPLE_WRAPPED_SHA256);
}
