//! Marshal a data record and show its foreign bytes.

use cbridge_membrane::{DataRecord, Marshal, Marshaller, OverflowPolicy};

use crate::error::Result;
use crate::report::{MarshalReport, hex_dump};

pub fn marshal_record(record: &DataRecord, policy: OverflowPolicy) -> Result<MarshalReport> {
    let marshaller = Marshaller::new(policy);
    let out = marshaller.to_foreign(record)?;
    let decoded: DataRecord = marshaller.from_foreign(out.bytes.as_bytes())?;
    Ok(MarshalReport {
        policy,
        size: DataRecord::SIZE,
        hex: hex_dump(out.bytes.as_bytes()),
        truncated: out.truncated,
        decoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use cbridge_membrane::BoundaryError;

    fn record(name: &str) -> DataRecord {
        DataRecord {
            id: 3,
            name: name.to_string(),
            value: 0.5,
            processed: false,
        }
    }

    #[test]
    fn report_shows_layout_and_round_trip() {
        let report = marshal_record(&record("abc"), OverflowPolicy::Truncate).unwrap();
        assert_eq!(report.decoded, record("abc"));
        assert!(report.truncated.is_empty());
        // 280 bytes at 16 per line.
        assert_eq!(report.hex.lines().count(), 18);
        let id: Vec<_> = 3i32.to_ne_bytes().iter().map(|b| format!("{b:02x}")).collect();
        assert!(report.hex.starts_with(&format!("{} 61 62 63 00", id.join(" "))));
    }

    #[test]
    fn reject_policy_surfaces_overflow() {
        let long = "q".repeat(400);
        let err = marshal_record(&record(&long), OverflowPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Boundary(BoundaryError::FieldOverflow { field: "name", .. })
        ));
        let report = marshal_record(&record(&long), OverflowPolicy::Truncate).unwrap();
        assert_eq!(report.truncated, vec!["name"]);
        assert_eq!(report.decoded.name.len(), 255);
    }
}
