use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::{format_description::well_known, OffsetDateTime};

/// Grade recorded when no grade could be produced at all.
pub const GRADE_ERR: &str = "ERR";
/// Grade recorded when the engine ran but reported no overall grade.
pub const GRADE_UNKNOWN: &str = "Unknown";

/// Opaque registry row identifier, echoed back unchanged on update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct RecordId(pub Value);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        RecordId(Value::from(id))
    }
}

/// One row of the domain registry.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    #[serde(rename = "Id", default)]
    pub id: Option<RecordId>,
    #[serde(rename = "Domain", default, deserialize_with = "deserialize_domain")]
    pub domain_name: Option<String>,
    #[serde(rename = "Active", default, deserialize_with = "deserialize_truthy")]
    pub active: bool,
}

/// One page of the registry's record listing.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecordPage {
    #[serde(default)]
    pub list: Vec<DomainRecord>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: Option<PageInfo>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub total_rows: Option<u64>,
    #[serde(default)]
    pub is_last_page: Option<bool>,
}

/// Result of one engine run against one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub grade: String,
    pub findings_summary: String,
    pub scanned_at: OffsetDateTime,
}

impl ScanOutcome {
    /// True when the outcome carries a sentinel grade instead of an engine grade.
    pub fn is_degraded(&self) -> bool {
        self.grade == GRADE_ERR || self.grade == GRADE_UNKNOWN
    }

    pub fn scanned_at_rfc3339(&self) -> String {
        format_rfc3339(self.scanned_at)
    }
}

/// PATCH body for one registry row. Only these fields change.
#[derive(Serialize, Debug)]
pub struct ResultUpdate<'a> {
    #[serde(rename = "Id")]
    pub id: &'a RecordId,
    #[serde(rename = "SSL_Grade")]
    pub grade: &'a str,
    #[serde(rename = "Vulnerabilities")]
    pub vulnerabilities: &'a str,
    #[serde(rename = "Last_Scan_Date")]
    pub last_scan_date: String,
}

impl<'a> ResultUpdate<'a> {
    pub fn new(id: &'a RecordId, outcome: &'a ScanOutcome) -> Self {
        Self {
            id,
            grade: &outcome.grade,
            vulnerabilities: &outcome.findings_summary,
            last_scan_date: outcome.scanned_at_rfc3339(),
        }
    }
}

/// Per-domain line of a cycle report.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DomainReport {
    pub record_id: String,
    pub domain: String,
    pub grade: String,
    pub findings_summary: String,
    pub scanned_at: String,
    pub updated: bool,
}

/// Aggregate counters for one cycle plus the per-domain lines in registry order.
#[derive(Serialize, Debug, Clone, Default)]
pub struct CycleSummary {
    pub fetched_active: u64,
    pub skipped: u64,
    pub scanned: u64,
    pub updated: u64,
    pub update_failed: u64,
    pub degraded: u64,
    pub crashed: u64,
    pub domains: Vec<DomainReport>,
}

pub(crate) fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

fn deserialize_domain<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    })
}

// The registry reports checkbox columns as booleans, 0/1, or strings depending on backend.
fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        _ => false,
    })
}
