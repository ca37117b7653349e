use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::LookupFailure;

/// One candidate returned by the rating service. Produced fresh per lookup,
/// never cached across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfessorRecord {
    #[serde(default)]
    pub(crate) id: String,
    /// Numeric id used to build the public profile URL.
    #[serde(default)]
    pub(crate) legacy_id: Option<u64>,
    #[serde(default)]
    pub(crate) avg_rating: Option<f64>,
    #[serde(default)]
    pub(crate) avg_difficulty: Option<f64>,
    /// 0-100. The API reports -1 for "no data"; normalized to None on parse.
    #[serde(default)]
    pub(crate) would_take_again_percent: Option<f64>,
    #[serde(default)]
    pub(crate) first_name: String,
    #[serde(default)]
    pub(crate) last_name: String,
    #[serde(default)]
    pub(crate) department: Option<String>,
}

/// Result of a single lookup round trip. `Ok(None)` is the normal
/// "no professor found" outcome, not a failure.
pub(crate) type LookupResult = Result<Option<Vec<ProfessorRecord>>, LookupFailure>;

/// JSON rendering of the channel response, kept for `lookup --json` output.
#[derive(Debug, Serialize)]
pub(crate) struct LookupEnvelope {
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<Vec<ProfessorRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl LookupEnvelope {
    pub(crate) fn from_result(result: &LookupResult) -> Self {
        match result {
            Ok(Some(records)) => LookupEnvelope {
                success: true,
                data: Some(records.clone()),
                error: None,
            },
            Ok(None) => LookupEnvelope {
                success: true,
                data: None,
                error: None,
            },
            Err(failure) => LookupEnvelope {
                success: false,
                data: None,
                error: Some(failure.to_string()),
            },
        }
    }
}

/// Terminal enrichment state of one instructor slot. Absence from the state
/// map means the slot has not been seen yet. Every terminal state sets the
/// processed marker on the page; only force-reprocess clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SlotStatus {
    Enriched,
    /// Empty name or sentinel placeholder (staff/tba); no lookup issued.
    SkippedSentinel,
    /// Candidate names did not appear in the displayed name; deliberate skip.
    NameMismatch,
    /// Lookup succeeded but the service has no record for this name.
    NoData,
    LookupFailed,
}

impl SlotStatus {
    pub(crate) fn label(self) -> &'static str {
        match self {
            SlotStatus::Enriched => "enriched",
            SlotStatus::SkippedSentinel => "skipped",
            SlotStatus::NameMismatch => "name mismatch",
            SlotStatus::NoData => "no data",
            SlotStatus::LookupFailed => "failed",
        }
    }
}

/// Per-slot outcome collected during one scan, for reports and tests.
#[derive(Debug, Serialize)]
pub(crate) struct SlotOutcome {
    pub(crate) slot: usize,
    pub(crate) name: String,
    pub(crate) status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) record: Option<ProfessorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct ScanStats {
    pub(crate) scanned: usize,
    pub(crate) enriched: usize,
    pub(crate) skipped: usize,
    pub(crate) mismatched: usize,
    pub(crate) no_data: usize,
    pub(crate) failed: usize,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct ScanReport {
    pub(crate) stats: ScanStats,
    pub(crate) outcomes: Vec<SlotOutcome>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnnotateReport {
    pub(crate) file: String,
    pub(crate) out: String,
    pub(crate) ts_utc: i64,
    pub(crate) stats: ScanStats,
    pub(crate) outcomes: Vec<SlotOutcome>,
}

impl AnnotateReport {
    pub(crate) fn new(file: String, out: String, report: ScanReport) -> Self {
        AnnotateReport {
            file,
            out,
            ts_utc: Utc::now().timestamp(),
            stats: report.stats,
            outcomes: report.outcomes,
        }
    }
}
