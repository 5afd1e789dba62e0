//! End-to-end replay scenarios: tampering, insertion, replayed nonces,
//! version handling, and the crash/boundary cases a verifier must survive.

use serde_json::{json, Value};

use guardclaw_core::{compute_causal_hash, genesis_hash, random_nonce_hex, RecordType};
use guardclaw_ledger::{ReplayEngine, ViolationKind};
use guardclaw_testkit::{
    fixed_keypair, ledger_lines, payload, raw_causal_hash, raw_object, resign_object,
    write_ledger, write_raw_ledger, ChainBuilder,
};

fn five_entry_chain() -> Vec<guardclaw_core::Envelope> {
    let mut builder = ChainBuilder::new(fixed_keypair(), "agent-test-001");
    builder.push(RecordType::Intent, payload("goal", json!("deploy")));
    builder.push(RecordType::Execution, payload("endpoint", json!("/a")));
    builder.push(RecordType::Execution, payload("endpoint", json!("/a")));
    builder.push(RecordType::Execution, payload("endpoint", json!("/a")));
    builder.push(RecordType::Result, payload("status", json!("ok")));
    builder.into_envelopes()
}

fn verify_lines(lines: &str) -> guardclaw_ledger::ReplaySummary {
    ReplayEngine::new()
        .verify_reader(std::io::Cursor::new(lines.as_bytes().to_vec()))
        .unwrap()
}

fn kinds_at(summary: &guardclaw_ledger::ReplaySummary) -> Vec<(ViolationKind, u64)> {
    summary
        .violations
        .iter()
        .map(|v| (v.kind, v.at_sequence))
        .collect()
}

#[test]
fn test_happy_path_five_entries() {
    let chain = five_entry_chain();
    let summary = ReplayEngine::with_policy_key(fixed_keypair().public_key())
        .verify_reader(std::io::Cursor::new(ledger_lines(&chain).into_bytes()))
        .unwrap();

    assert!(summary.overall_valid);
    assert_eq!(summary.total_entries, 5);
    assert!(summary.violations.is_empty());
    assert_eq!(summary.valid_signatures, 5);
    assert_eq!(summary.invalid_signatures, 0);
    assert_eq!(summary.gef_version.as_deref(), Some("1.0"));
    assert_eq!(summary.agents_seen, vec!["agent-test-001".to_string()]);
    assert_eq!(summary.record_type_counts.get("execution"), Some(&3));
    assert_eq!(summary.record_type_counts.get("intent"), Some(&1));
    assert_eq!(summary.record_type_counts.get("result"), Some(&1));
    assert_eq!(summary.head_sequence, Some(4));
    assert_eq!(
        summary.head_hash.as_deref().unwrap(),
        compute_causal_hash(&chain[4]).unwrap()
    );
}

#[test]
fn test_payload_tamper_breaks_signature_then_chain() {
    let chain = five_entry_chain();
    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

    // Tamper entry 2's payload at the stored-line level.
    let mut obj = raw_object(&chain[2]);
    obj.insert("payload".into(), json!({"endpoint": "/b"}));
    lines[2] = serde_json::to_string(&Value::Object(obj)).unwrap();

    let summary = verify_lines(&(lines.join("\n") + "\n"));
    let kinds = kinds_at(&summary);

    assert!(kinds.contains(&(ViolationKind::InvalidSignature, 2)));
    assert!(kinds.contains(&(ViolationKind::ChainBreak, 3)));
    // A single tampered entry must not cascade beyond its successor.
    assert_eq!(summary.violations.len(), 2);
    assert!(!summary.overall_valid);
}

#[test]
fn test_insertion_shifts_and_breaks() {
    let chain = five_entry_chain();

    // A well-formed envelope wedged between positions 2 and 3, correctly
    // chained to the real entry 2 and self-signed.
    let mut intruder = raw_object(&chain[2]);
    intruder.insert("record_id".into(), json!("6f000000-e29b-41d4-a716-446655440000"));
    intruder.insert("sequence".into(), json!(3));
    intruder.insert("nonce".into(), json!(random_nonce_hex()));
    intruder.insert("payload".into(), json!({"endpoint": "/evil"}));
    intruder.insert(
        "causal_hash".into(),
        json!(compute_causal_hash(&chain[2]).unwrap()),
    );
    resign_object(&mut intruder, &fixed_keypair());

    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();
    lines.insert(3, serde_json::to_string(&Value::Object(intruder)).unwrap());

    let summary = verify_lines(&(lines.join("\n") + "\n"));
    let kinds = kinds_at(&summary);

    // The displaced original entries no longer sit at their stored
    // sequence, and the first of them no longer chains to its predecessor.
    assert!(kinds.contains(&(ViolationKind::SequenceGap, 4)));
    assert!(kinds.contains(&(ViolationKind::ChainBreak, 4)));
    assert!(kinds.contains(&(ViolationKind::SequenceGap, 5)));
    assert!(!summary.overall_valid);
    assert!(summary.signatures_valid, "every entry is legitimately signed");
}

#[test]
fn test_deleted_entry_yields_gap_and_break() {
    let chain = five_entry_chain();
    let kept: Vec<_> = chain
        .iter()
        .filter(|e| e.sequence != 2)
        .cloned()
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gapped.jsonl");
    write_ledger(&path, &kept);

    let summary = ReplayEngine::new().verify_file(&path).unwrap();
    let kinds = kinds_at(&summary);

    assert!(kinds.contains(&(ViolationKind::SequenceGap, 2)));
    assert!(kinds.contains(&(ViolationKind::ChainBreak, 2)));
    assert!(!summary.chain_valid);
}

#[test]
fn test_replayed_nonce_detected() {
    let mut builder = ChainBuilder::new(fixed_keypair(), "agent-nonce-test");
    builder.push_executions(2);
    let chain = builder.envelopes().to_vec();

    // Rewrite entry 2 so its nonce equals entry 1's, legitimately re-signed
    // and correctly chained: only the uniqueness rule can catch it.
    let mut poisoned = raw_object(&chain[1]);
    poisoned.insert("record_id".into(), json!("7a000000-e29b-41d4-a716-446655440000"));
    poisoned.insert("sequence".into(), json!(2));
    poisoned.insert("nonce".into(), json!(chain[1].nonce.clone()));
    poisoned.insert("causal_hash".into(), json!(raw_causal_hash(&raw_object(&chain[1]))));
    resign_object(&mut poisoned, &fixed_keypair());

    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();
    lines.push(serde_json::to_string(&Value::Object(poisoned)).unwrap());

    let summary = verify_lines(&(lines.join("\n") + "\n"));

    let schema: Vec<_> = summary
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::Schema)
        .collect();
    assert_eq!(schema.len(), 1);
    assert_eq!(schema[0].at_sequence, 2);
    assert_eq!(schema[0].detail, "duplicate nonce");
    assert!(summary.chain_valid);
    assert!(summary.signatures_valid);
    assert!(!summary.overall_valid);
}

#[test]
fn test_duplicate_record_id_detected() {
    let chain = five_entry_chain();
    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

    let mut obj = raw_object(&chain[3]);
    obj.insert("record_id".into(), json!(chain[0].record_id.clone()));
    resign_object(&mut obj, &fixed_keypair());
    lines[3] = serde_json::to_string(&Value::Object(obj)).unwrap();

    let summary = verify_lines(&(lines.join("\n") + "\n"));
    assert!(summary
        .violations
        .iter()
        .any(|v| v.at_sequence == 3 && v.detail == "duplicate record_id"));
}

#[test]
fn test_producer_verifier_round_trip_with_policy_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let keypair = fixed_keypair();

    {
        let mut ledger =
            guardclaw_ledger::Ledger::open(&path, keypair.clone(), "agent-prod-001").unwrap();
        for i in 0..10u64 {
            ledger
                .append(RecordType::Execution, payload("step", json!(i)))
                .unwrap();
        }
        ledger.sync().unwrap();
    }

    let summary = ReplayEngine::with_policy_key(keypair.public_key())
        .verify_file(&path)
        .unwrap();
    assert!(summary.overall_valid);
    assert_eq!(summary.total_entries, 10);
}

#[test]
fn test_policy_key_mismatch_is_schema_violation() {
    let chain = five_entry_chain();
    let stranger = guardclaw_core::Keypair::from_seed(&[0x07; 32]);

    let summary = ReplayEngine::with_policy_key(stranger.public_key())
        .verify_reader(std::io::Cursor::new(ledger_lines(&chain).into_bytes()))
        .unwrap();

    assert!(!summary.schema_valid);
    assert_eq!(
        summary
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Schema)
            .count(),
        5
    );
}

#[test]
fn test_version_two_halts_verification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.jsonl");

    let mut obj = raw_object(&five_entry_chain()[0]);
    obj.insert("gef_version".into(), json!("2.0"));
    resign_object(&mut obj, &fixed_keypair());
    write_raw_ledger(
        &path,
        &[serde_json::to_string(&Value::Object(obj)).unwrap()],
    );

    let result = ReplayEngine::new().verify_file(&path);
    assert!(matches!(
        result,
        Err(guardclaw_ledger::ReplayError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_mixed_version_is_schema_violation() {
    let chain = five_entry_chain();
    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

    let mut obj = raw_object(&chain[2]);
    obj.insert("gef_version".into(), json!("1.1"));
    resign_object(&mut obj, &fixed_keypair());
    lines[2] = serde_json::to_string(&Value::Object(obj)).unwrap();

    let summary = verify_lines(&(lines.join("\n") + "\n"));
    assert!(summary.violations.iter().any(|v| {
        v.kind == ViolationKind::Schema && v.at_sequence == 2 && v.detail.contains("gef_version")
    }));
}

#[test]
fn test_forward_minor_version_warns_on_unknown_record_type() {
    // A hypothetical 1.1 ledger carrying a record type this verifier has
    // never heard of. Structure, chain, and signature all check out.
    let keypair = fixed_keypair();
    let mut entry = serde_json::Map::new();
    entry.insert("gef_version".into(), json!("1.1"));
    entry.insert("record_id".into(), json!("550e8400-e29b-41d4-a716-446655440001"));
    entry.insert("record_type".into(), json!("delegation"));
    entry.insert("agent_id".into(), json!("agent-future"));
    entry.insert("signer_public_key".into(), json!(keypair.public_key().to_hex()));
    entry.insert("sequence".into(), json!(0));
    entry.insert("nonce".into(), json!(random_nonce_hex()));
    entry.insert("timestamp".into(), json!("2026-02-26T00:00:00.000Z"));
    entry.insert("causal_hash".into(), json!(genesis_hash()));
    entry.insert("payload".into(), json!({}));
    resign_object(&mut entry, &keypair);

    let line = serde_json::to_string(&Value::Object(entry)).unwrap();
    let summary = verify_lines(&(line + "\n"));

    assert!(summary.overall_valid, "violations: {:?}", summary.violations);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].detail.contains("delegation"));
}

#[test]
fn test_single_entry_genesis_ledger() {
    let mut builder = ChainBuilder::new(fixed_keypair(), "agent-solo");
    builder.push(RecordType::Intent, payload("goal", json!("exist")));

    let summary = verify_lines(&ledger_lines(builder.envelopes()));
    assert!(summary.overall_valid);
    assert_eq!(summary.total_entries, 1);
}

#[test]
fn test_empty_ledger_is_valid() {
    let summary = verify_lines("");
    assert_eq!(summary.total_entries, 0);
    assert!(summary.overall_valid);
}

#[test]
fn test_trailing_partial_line_is_isolated() {
    let chain = five_entry_chain();
    let mut content = ledger_lines(&chain[..2]);
    content.push_str("{\"gef_version\":\"1.0\",\"record");

    let summary = verify_lines(&content);
    assert_eq!(summary.total_entries, 3);

    let kinds = kinds_at(&summary);
    assert_eq!(kinds, vec![(ViolationKind::Schema, 2)]);
    assert!(!summary.overall_valid);
    assert_eq!(summary.valid_signatures, 2);
}

#[test]
fn test_on_disk_key_order_is_irrelevant() {
    // The stored line need not be canonical; the verifier rebuilds the
    // signing surface from the parsed object. Render every entry with keys
    // in descending order, the opposite of both the writer and JCS.
    let chain = five_entry_chain();
    let mut content = String::new();
    for env in &chain {
        let obj = raw_object(env);
        let fields: Vec<String> = obj
            .iter()
            .rev()
            .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), v))
            .collect();
        content.push_str(&format!("{{{}}}\n", fields.join(",")));
    }

    let summary = verify_lines(&content);
    assert!(summary.overall_valid, "violations: {:?}", summary.violations);
    assert_eq!(summary.total_entries, 5);
}

#[test]
fn test_verification_is_idempotent() {
    let chain = five_entry_chain();
    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

    // Include a violation so the comparison covers the interesting paths.
    let mut obj = raw_object(&chain[1]);
    obj.insert("payload".into(), json!({"endpoint": "/tampered"}));
    lines[1] = serde_json::to_string(&Value::Object(obj)).unwrap();
    let content = lines.join("\n") + "\n";

    let first = verify_lines(&content);
    let second = verify_lines(&content);
    assert_eq!(first, second);
}

#[test]
fn test_tampering_any_surface_field_is_detected() {
    let mutations: Vec<(&str, Value)> = vec![
        ("record_id", json!("650e8400-e29b-41d4-a716-446655440000")),
        ("record_type", json!("intent")),
        ("agent_id", json!("agent-test-002")),
        (
            "signer_public_key",
            json!(guardclaw_core::Keypair::from_seed(&[0x07; 32])
                .public_key()
                .to_hex()),
        ),
        ("nonce", json!("ffffffffffffffffffffffffffffffff")),
        ("timestamp", json!("2026-02-26T00:01:00.000Z")),
        ("payload", json!({"endpoint": "/elsewhere"})),
    ];

    for (field, new_value) in mutations {
        let chain = five_entry_chain();
        let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

        let mut obj = raw_object(&chain[1]);
        obj.insert(field.to_string(), new_value);
        lines[1] = serde_json::to_string(&Value::Object(obj)).unwrap();

        let summary = verify_lines(&(lines.join("\n") + "\n"));
        let kinds = kinds_at(&summary);

        assert!(
            kinds.contains(&(ViolationKind::InvalidSignature, 1)),
            "tampering {field} must break the signature, got {kinds:?}"
        );
        assert!(
            kinds.contains(&(ViolationKind::ChainBreak, 2)),
            "tampering {field} must break the successor's chain, got {kinds:?}"
        );
        assert!(!summary.overall_valid);
    }
}

#[test]
fn test_tampered_causal_hash_detected_at_both_positions() {
    let chain = five_entry_chain();
    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

    let mut obj = raw_object(&chain[1]);
    obj.insert("causal_hash".into(), json!("f".repeat(64)));
    lines[1] = serde_json::to_string(&Value::Object(obj)).unwrap();

    let summary = verify_lines(&(lines.join("\n") + "\n"));
    let kinds = kinds_at(&summary);

    assert!(kinds.contains(&(ViolationKind::ChainBreak, 1)));
    assert!(kinds.contains(&(ViolationKind::InvalidSignature, 1)));
    assert!(kinds.contains(&(ViolationKind::ChainBreak, 2)));
}

#[test]
fn test_schema_failure_skips_signature_but_not_chain() {
    let chain = five_entry_chain();
    let mut lines: Vec<String> = chain.iter().map(|e| e.to_line().unwrap()).collect();

    // Uppercase nonce: format violation, but the surface still
    // canonicalizes, so the chain hand-off to entry 2 is unaffected.
    let mut obj = raw_object(&chain[1]);
    let upper = chain[1].nonce.to_uppercase();
    obj.insert("nonce".into(), json!(upper));
    lines[1] = serde_json::to_string(&Value::Object(obj)).unwrap();

    let summary = verify_lines(&(lines.join("\n") + "\n"));
    let kinds = kinds_at(&summary);

    assert!(kinds.contains(&(ViolationKind::Schema, 1)));
    assert!(
        !kinds.contains(&(ViolationKind::InvalidSignature, 1)),
        "phase 2 must be skipped after a schema failure"
    );
    // The mutated surface still feeds the chain, so entry 2 breaks.
    assert!(kinds.contains(&(ViolationKind::ChainBreak, 2)));
}
