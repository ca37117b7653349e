use crate::{env_bool, env_optional, env_u32, env_u64, env_usize};

pub(crate) const DEFAULT_API_URL: &str = "https://api.ratemyprofessors.com/graphql";
/// RateMyProfessors school identifier (Auburn University).
pub(crate) const DEFAULT_SCHOOL_ID: &str = "U2Nob29sLTYw";
pub(crate) const DEFAULT_SLOT_CLASS: &str = "rightnclear";
pub(crate) const DEFAULT_SLOT_TITLE: &str = "Instructor(s)";
pub(crate) const DEFAULT_ANCHOR_ID: &str = "legend_box";
/// Delay before the first scan, letting the host page's own rendering settle.
pub(crate) const DEFAULT_SETTLE_MS: u64 = 1500;

/// Long-lived configuration for one enrichment run. Resolved env-first
/// (PROFLENS_*), with CLI flags layered on top by the command handlers.
#[derive(Debug, Clone)]
pub(crate) struct EnrichConfig {
    pub(crate) api_url: String,
    pub(crate) school_id: String,
    /// Candidates requested per lookup; the fuzzy guard needs more than one.
    pub(crate) candidate_count: u32,
    pub(crate) timeout_secs: u64,
    pub(crate) workers: usize,
    pub(crate) settle_ms: u64,
    pub(crate) slot_class: String,
    pub(crate) slot_title: String,
    pub(crate) anchor_id: String,
    /// Re-annotate slots already carrying the processed marker.
    pub(crate) force_reprocess: bool,
    /// Skip candidates whose first/last name do not appear in the displayed
    /// name. Off reproduces the take-first-candidate behavior.
    pub(crate) match_guard: bool,
}

impl EnrichConfig {
    pub(crate) fn defaults() -> Self {
        EnrichConfig {
            api_url: DEFAULT_API_URL.to_string(),
            school_id: DEFAULT_SCHOOL_ID.to_string(),
            candidate_count: 3,
            timeout_secs: 10,
            workers: 4,
            settle_ms: DEFAULT_SETTLE_MS,
            slot_class: DEFAULT_SLOT_CLASS.to_string(),
            slot_title: DEFAULT_SLOT_TITLE.to_string(),
            anchor_id: DEFAULT_ANCHOR_ID.to_string(),
            force_reprocess: false,
            match_guard: true,
        }
    }

    pub(crate) fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Self::defaults();
        Ok(EnrichConfig {
            api_url: env_optional("PROFLENS_API_URL").unwrap_or(defaults.api_url),
            school_id: env_optional("PROFLENS_SCHOOL_ID").unwrap_or(defaults.school_id),
            candidate_count: env_u32("PROFLENS_CANDIDATES", defaults.candidate_count)?,
            timeout_secs: env_u64("PROFLENS_TIMEOUT_SECS", defaults.timeout_secs)?,
            workers: env_usize("PROFLENS_WORKERS", defaults.workers)?,
            settle_ms: env_u64("PROFLENS_SETTLE_MS", defaults.settle_ms)?,
            slot_class: env_optional("PROFLENS_SLOT_CLASS").unwrap_or(defaults.slot_class),
            slot_title: env_optional("PROFLENS_SLOT_TITLE").unwrap_or(defaults.slot_title),
            anchor_id: env_optional("PROFLENS_ANCHOR_ID").unwrap_or(defaults.anchor_id),
            force_reprocess: false,
            match_guard: env_bool("PROFLENS_MATCH_GUARD", defaults.match_guard),
        })
    }
}
