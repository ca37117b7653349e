use std::time::Duration;

use thiserror::Error;

use crate::{EnrichConfig, LookupResult, ProfessorRecord};

/// Fixed teacher-search query. Parameterized only by free-text name and the
/// school identifier; the result set is bounded by `count`.
pub(crate) const SEARCH_QUERY: &str = "query NewSearchTeachersQuery(
  $query: TeacherSearchQuery!
  $count: Int
) {
  newSearch {
    teachers(query: $query, first: $count) {
      edges {
        node {
          id
          legacyId
          avgRating
          avgDifficulty
          wouldTakeAgainPercent
          firstName
          lastName
          department
        }
      }
    }
  }
}
";

/// Tagged failure envelope for one lookup round trip. Everything here is
/// non-fatal: the caller logs it and leaves the slot unannotated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum LookupFailure {
    #[error("message channel closed before a response arrived")]
    Channel,
    #[error("rating api request failed with status {0}")]
    RequestFailed(u16),
    #[error("rating api transport error: {0}")]
    Transport(String),
    #[error("rating api returned graphql errors: {0}")]
    GraphQl(String),
    #[error("malformed rating api response: {0}")]
    Malformed(String),
}

/// Seam between the gateway service and the network. The HTTP implementation
/// below is the only network-capable code in the crate; tests substitute
/// stub sources.
pub(crate) trait RatingSource {
    fn lookup(&self, prof_name: &str) -> LookupResult;
}

pub(crate) struct HttpRatingSource {
    agent: ureq::Agent,
    api_url: String,
    school_id: String,
    count: u32,
}

impl HttpRatingSource {
    pub(crate) fn new(cfg: &EnrichConfig) -> Self {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        HttpRatingSource {
            agent,
            api_url: cfg.api_url.clone(),
            school_id: cfg.school_id.clone(),
            count: cfg.candidate_count,
        }
    }
}

impl RatingSource for HttpRatingSource {
    fn lookup(&self, prof_name: &str) -> LookupResult {
        let payload = serde_json::json!({
            "query": SEARCH_QUERY,
            "variables": {
                "query": {
                    "text": prof_name,
                    "schoolID": self.school_id,
                },
                "count": self.count,
            },
        });

        let response = self
            .agent
            .post(&self.api_url)
            .set("content-type", "application/json")
            .send_json(payload);

        match response {
            Ok(resp) => {
                let body: serde_json::Value = resp
                    .into_json()
                    .map_err(|e| LookupFailure::Malformed(e.to_string()))?;
                parse_search_response(&body)
            }
            Err(ureq::Error::Status(code, _)) => Err(LookupFailure::RequestFailed(code)),
            Err(ureq::Error::Transport(err)) => Err(LookupFailure::Transport(err.to_string())),
        }
    }
}

/// Normalize a GraphQL search response body into candidate records.
/// An empty edge list is a normal not-found outcome, not a failure.
pub(crate) fn parse_search_response(body: &serde_json::Value) -> LookupResult {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let summary = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            let summary = if summary.is_empty() {
                "unspecified error".to_string()
            } else {
                summary
            };
            return Err(LookupFailure::GraphQl(summary));
        }
    }

    let edges = body
        .get("data")
        .and_then(|d| d.get("newSearch"))
        .and_then(|s| s.get("teachers"))
        .and_then(|t| t.get("edges"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| LookupFailure::Malformed("missing newSearch.teachers.edges".to_string()))?;

    if edges.is_empty() {
        return Ok(None);
    }

    let mut records = Vec::with_capacity(edges.len());
    for edge in edges {
        let node = edge
            .get("node")
            .ok_or_else(|| LookupFailure::Malformed("edge missing node".to_string()))?;
        let record: ProfessorRecord = serde_json::from_value(node.clone())
            .map_err(|e| LookupFailure::Malformed(format!("node decode: {e}")))?;
        records.push(normalize_record(record));
    }
    Ok(Some(records))
}

/// The API reports -1 percentages and occasionally negative averages for
/// professors without data; fold those into "absent".
fn normalize_record(mut record: ProfessorRecord) -> ProfessorRecord {
    if record.would_take_again_percent.is_some_and(|v| v < 0.0) {
        record.would_take_again_percent = None;
    }
    if record.avg_rating.is_some_and(|v| v < 0.0) {
        record.avg_rating = None;
    }
    if record.avg_difficulty.is_some_and(|v| v < 0.0) {
        record.avg_difficulty = None;
    }
    record
}

// ── Tests ────────────────────────────────────────────────────────────────
