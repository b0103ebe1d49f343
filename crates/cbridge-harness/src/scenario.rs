//! The wrapper scenario: a native caller driving the foreign library through
//! the gateway, step by step, with a report of what happened.

use std::sync::Arc;

use cbridge_membrane::{
    BoundaryContext, BoundaryError, DataRecord, ForeignSurface, Gateway, Origin, Outcome, now_utc,
};
use serde_json::{Value, json};

use crate::report::{ScenarioReport, StepResult};

type StepFn = fn(&Gateway) -> Result<Value, BoundaryError>;

/// Steps in run order.
pub const STEPS: &[(&str, StepFn)] = &[
    ("process_data", process_data),
    ("calculate", calculate),
    ("use_record", use_record),
    ("process_c_data", process_c_data),
    ("record_write_read", record_write_read),
    ("handle_transfer", handle_transfer),
    ("codec_round_trip", codec_round_trip),
    ("compress_empty", compress_empty),
    ("allocator_mismatch", allocator_mismatch),
];

fn process_data(gw: &Gateway) -> Result<Value, BoundaryError> {
    let accepted = gw.process_data("test data")?;
    let rejected = !gw.process_data("")?;
    Ok(json!({ "accepted": accepted, "empty_rejected": rejected }))
}

fn calculate(gw: &Gateway) -> Result<Value, BoundaryError> {
    let result = gw.calculate(10.0, 20.0)?;
    let complex = gw.complex_calculation(10.0, 20.0)?;
    Ok(json!({ "calculate": result, "complex_calculation": complex }))
}

fn use_record(gw: &Gateway) -> Result<Value, BoundaryError> {
    let record = gw.use_record()?;
    Ok(serde_json::to_value(record).unwrap_or(Value::Null))
}

fn process_c_data(gw: &Gateway) -> Result<Value, BoundaryError> {
    gw.process_c_data("direct call")?;
    Ok(json!({ "upper": gw.to_upper("direct call")? }))
}

fn record_write_read(gw: &Gateway) -> Result<Value, BoundaryError> {
    let mut handle = gw.new_record()?;
    let record = DataRecord {
        id: 42,
        name: "scenario record".to_string(),
        value: 1.5,
        processed: false,
    };
    let truncated = gw.write_record(&handle, &record)?;
    gw.process_record(&handle)?;
    let valid = gw.validate_record(&handle)?;
    let back = gw.read_record(&handle)?;
    handle.release()?;
    Ok(json!({ "truncated": truncated, "valid": valid, "record": back }))
}

fn handle_transfer(gw: &Gateway) -> Result<Value, BoundaryError> {
    let mut source = gw.new_record()?;
    let mut owner = source.take()?;
    let stale = matches!(gw.process_record(&source), Err(BoundaryError::UseAfterRelease { .. }));
    gw.process_record(&owner)?;
    owner.release()?;
    let double = matches!(owner.release(), Err(BoundaryError::DoubleRelease { .. }));
    Ok(json!({ "stale_source_refused": stale, "double_release_refused": double }))
}

fn codec_round_trip(gw: &Gateway) -> Result<Value, BoundaryError> {
    let data = b"AAAAAAAABBBBCCCCCCCCCCCCD".to_vec();
    let Some(mut packed) = gw.compress(&data)? else {
        return Ok(json!({ "compressed": false }));
    };
    let unpacked = match gw.decompress(packed.as_slice()?)? {
        Some(mut buf) => {
            let bytes = buf.to_vec()?;
            buf.release()?;
            bytes
        }
        None => Vec::new(),
    };
    let packed_len = packed.len();
    packed.release()?;
    Ok(json!({
        "input_len": data.len(),
        "compressed_len": packed_len,
        "round_trip": unpacked == data,
        "checksum": gw.checksum(&data)?,
    }))
}

fn compress_empty(gw: &Gateway) -> Result<Value, BoundaryError> {
    Ok(json!({ "absent": gw.compress(&[])?.is_none() }))
}

fn allocator_mismatch(gw: &Gateway) -> Result<Value, BoundaryError> {
    let mut buf = gw.allocate(16)?;
    let refused = matches!(
        buf.release_with(Origin::Native),
        Err(BoundaryError::AllocatorMismatch { .. })
    );
    buf.release()?;
    Ok(json!({ "native_free_refused": refused }))
}

/// Run every step against `surface`. Step failures are recorded, not raised.
///
/// Some steps commit lifecycle violations on purpose, so `ctx` should be in
/// [`ViolationMode::Report`](cbridge_membrane::ViolationMode::Report).
#[must_use]
pub fn run_scenario(ctx: &Arc<BoundaryContext>, surface: ForeignSurface) -> ScenarioReport {
    let name = surface.name.to_string();
    let steps = {
        let gw = Gateway::open(ctx, surface);
        STEPS
            .iter()
            .map(|(step, run)| match run(&gw) {
                Ok(detail) => StepResult {
                    name: (*step).to_string(),
                    outcome: Outcome::Pass,
                    detail,
                },
                Err(err) => StepResult {
                    name: (*step).to_string(),
                    outcome: Outcome::Fail,
                    detail: json!({ "error": err.to_string() }),
                },
            })
            .collect()
    };

    ScenarioReport {
        title: "cbridge wrapper scenario".to_string(),
        timestamp: now_utc(),
        surface: name,
        steps,
        metrics: ctx.metrics().snapshot(),
        leaks: ctx.leak_report(),
        log_sha256: None,
    }
}
