use std::collections::HashSet;

use serde::Deserialize;

use crate::types::GRADE_UNKNOWN;

/// Finding id whose `finding` value carries the overall TLS grade.
pub const OVERALL_GRADE_ID: &str = "overall_grade";

/// Summary used when nothing at HIGH or CRITICAL was reported.
pub const NO_SEVERE_FINDINGS: &str = "No HIGH/CRITICAL severities detected.";

/// Severity vocabulary of the grading engine. Unknown tokens are kept verbatim.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String")]
pub enum Severity {
    Ok,
    Info,
    Low,
    Medium,
    High,
    Critical,
    Warn,
    Fatal,
    Debug,
    Other(String),
}

impl Severity {
    pub fn is_high_or_critical(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OK" => Severity::Ok,
            "INFO" => Severity::Info,
            "LOW" => Severity::Low,
            "MEDIUM" => Severity::Medium,
            "HIGH" => Severity::High,
            "CRITICAL" => Severity::Critical,
            "WARN" => Severity::Warn,
            "FATAL" => Severity::Fatal,
            "DEBUG" => Severity::Debug,
            _ => Severity::Other(s),
        }
    }
}

/// One entry of the engine's JSON report. Fields beyond these are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FindingRecord {
    pub id: String,
    #[serde(default)]
    pub finding: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Grade and finding summary distilled from one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub grade: String,
    pub findings_summary: String,
}

/// Parse the engine's flat JSON report (an array of finding objects).
pub fn parse_report(bytes: &[u8]) -> Result<Vec<FindingRecord>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Extract the overall grade and a HIGH/CRITICAL summary.
///
/// - A missing grade record, or one without a `finding`, yields `"Unknown"`.
/// - Severe finding ids are listed once each, in first-seen order.
pub fn summarize(records: &[FindingRecord]) -> ReportSummary {
    let grade = records
        .iter()
        .find(|r| r.id == OVERALL_GRADE_ID)
        .and_then(|r| r.finding.clone())
        .unwrap_or_else(|| GRADE_UNKNOWN.to_string());

    let mut seen = HashSet::new();
    let severe: Vec<&str> = records
        .iter()
        .filter(|r| r.severity.as_ref().is_some_and(Severity::is_high_or_critical))
        .map(|r| r.id.as_str())
        .filter(|id| seen.insert(*id))
        .collect();

    let findings_summary = if severe.is_empty() {
        NO_SEVERE_FINDINGS.to_string()
    } else {
        format!("Detected High/Crit Issues: {}", severe.join(", "))
    };

    ReportSummary {
        grade,
        findings_summary,
    }
}
