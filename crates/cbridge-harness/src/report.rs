//! Machine-readable reports for harness runs.

use std::path::Path;

use cbridge_membrane::{DataRecord, LiveEntry, MetricsSnapshot, Outcome, OverflowPolicy};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    Ok(sha256_hex(&std::fs::read(path)?))
}

/// Space-separated lowercase hex bytes, 16 per line.
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|row| {
            row.iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One step of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub name: String,
    pub outcome: Outcome,
    pub detail: serde_json::Value,
}

impl StepResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub title: String,
    pub timestamp: String,
    pub surface: String,
    pub steps: Vec<StepResult>,
    pub metrics: MetricsSnapshot,
    pub leaks: Vec<LiveEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_sha256: Option<String>,
}

impl ScenarioReport {
    /// Every step passed and nothing leaked.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.steps.iter().all(StepResult::passed) && self.leaks.is_empty()
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Surface: {}\n", self.surface));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Calls dispatched: {}\n", self.metrics.calls_dispatched));
        out.push_str(&format!("- Leaks: {}\n\n", self.leaks.len()));

        out.push_str("| Step | Status |\n");
        out.push_str("|------|--------|\n");
        for step in &self.steps {
            let status = if step.passed() { "PASS" } else { "FAIL" };
            out.push_str(&format!("| {} | {} |\n", step.name, status));
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeakCheckReport {
    pub timestamp: String,
    pub threads: usize,
    pub iterations: usize,
    pub high_water: usize,
    pub live: usize,
    pub leaks: Vec<LiveEntry>,
    pub metrics: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_sha256: Option<String>,
}

impl LeakCheckReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.live == 0 && self.metrics.violations() == 0
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarshalReport {
    pub policy: OverflowPolicy,
    pub size: usize,
    pub hex: String,
    pub truncated: Vec<&'static str>,
    pub decoded: DataRecord,
}

impl MarshalReport {
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_dump_wraps_at_sixteen() {
        let dump = hex_dump(&(0u8..18).collect::<Vec<_>>());
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00 01 02"));
        assert_eq!(lines[1], "10 11");
    }

    #[test]
    fn scenario_report_markdown_lists_steps() {
        let report = ScenarioReport {
            title: "t".to_string(),
            timestamp: "now".to_string(),
            surface: "s".to_string(),
            steps: vec![StepResult {
                name: "add".to_string(),
                outcome: Outcome::Fail,
                detail: serde_json::Value::Null,
            }],
            metrics: MetricsSnapshot::default(),
            leaks: Vec::new(),
            log_sha256: None,
        };
        assert!(!report.passed());
        assert!(report.to_markdown().contains("| add | FAIL |"));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert!(json.get("log_sha256").is_none());
    }
}
