use cbridge_harness::leak_check::run_leak_check;
use cbridge_harness::report::{file_sha256, sha256_hex};
use cbridge_harness::scenario::run_scenario;
use cbridge_membrane::{
    BoundaryConfig, BoundaryContext, LogEmitter, LogEntry, LogLevel, ViolationMode,
};

fn temp_log(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cbridge-{name}-{}.jsonl", std::process::id()))
}

#[test]
fn scenario_log_is_jsonl_and_digest_matches_file() {
    let path = temp_log("scenario");
    let emitter = LogEmitter::to_file(&path, "scenario", LogLevel::Debug).expect("log file");
    let config = BoundaryConfig::default().with_violations(ViolationMode::Report);
    let ctx = BoundaryContext::with_log(config, emitter);

    let mut report = run_scenario(&ctx, cbridge_abi::surface());
    ctx.log().flush().expect("flush");
    report.log_sha256 = Some(file_sha256(&path).expect("digest"));
    assert!(report.passed(), "{}", report.to_json());

    let text = std::fs::read_to_string(&path).expect("read log");
    assert_eq!(report.log_sha256.as_deref(), Some(sha256_hex(text.as_bytes()).as_str()));

    let entries: Vec<LogEntry> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("jsonl line"))
        .collect();
    assert_eq!(entries.first().map(|e| e.event.as_str()), Some("gateway_open"));
    assert_eq!(entries.last().map(|e| e.event.as_str()), Some("gateway_close"));
    // The transfer step deliberately double-releases.
    assert!(entries.iter().any(|e| e.event == "lifecycle_violation"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json()).expect("report json");
    assert_eq!(json["leaks"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["log_sha256"].as_str().map(str::len), Some(64));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn leak_check_report_serializes_counters() {
    let ctx = BoundaryContext::new(BoundaryConfig::default());
    let report = run_leak_check(&ctx, cbridge_abi::surface(), 2, 64).expect("leak check");
    let json: serde_json::Value = serde_json::from_str(&report.to_json()).expect("json");
    assert_eq!(json["threads"], 2);
    assert_eq!(json["live"], 0);
    assert_eq!(
        json["metrics"]["buffers_wrapped"],
        json["metrics"]["buffers_released"]
    );
    assert!(json.get("log_sha256").is_none());
}
