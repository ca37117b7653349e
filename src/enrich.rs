use std::collections::{HashMap, HashSet};

use crate::{
    is_placeholder_name, strip_rating_suffix, EnrichConfig, GatewayClient, LookupTicket, NodeId,
    ProfessorRecord, ScanReport, SchedulePage, SlotOutcome, SlotStatus,
};

pub(crate) const SHADE_FAVORABLE: &str = "#c8e6c9";
pub(crate) const SHADE_NEUTRAL: &str = "#fff9c4";
pub(crate) const SHADE_UNFAVORABLE: &str = "#ffcdd2";

const PROFILE_URL_BASE: &str = "https://www.ratemyprofessors.com/professor";

/// Everything one enrichment run owns: the page model, the gateway client,
/// configuration, and the explicit per-slot state map. The page's data
/// markers are the external face of that map; the map is what the state
/// machine runs on.
pub(crate) struct EnrichContext {
    pub(crate) page: SchedulePage,
    pub(crate) client: GatewayClient,
    pub(crate) cfg: EnrichConfig,
    pub(crate) states: HashMap<NodeId, SlotStatus>,
}

impl EnrichContext {
    pub(crate) fn new(page: SchedulePage, client: GatewayClient, cfg: EnrichConfig) -> Self {
        EnrichContext {
            page,
            client,
            cfg,
            states: HashMap::new(),
        }
    }

    /// Feed a re-rendered page through the model, keeping state only for
    /// slots the reload carried over unchanged.
    pub(crate) fn reload_from(&mut self, html: &str) {
        let carried: HashSet<NodeId> = self.page.reload(html).into_iter().collect();
        self.states.retain(|id, _| carried.contains(id));
    }
}

/// One enrichment pass over every instructor slot. Lookups for all
/// candidate slots are issued up front and run concurrently on the gateway
/// workers; the scan joins every ticket (no failure aborts the batch) and
/// applies page writes on this thread only. Callers that observe the page
/// must detach before invoking this.
pub(crate) fn scan_and_enrich(ctx: &mut EnrichContext) -> ScanReport {
    let mut report = ScanReport::default();
    let mut pending: Vec<(NodeId, String, LookupTicket)> = Vec::new();

    for id in ctx.page.slot_ids() {
        let (already, slot_force, raw_text) = {
            let slot = ctx.page.slot(id);
            (slot.processed, slot.force_reprocess, slot.text.clone())
        };
        let force = ctx.cfg.force_reprocess || slot_force;
        if (already || ctx.states.contains_key(&id)) && !force {
            continue;
        }
        report.stats.scanned += 1;

        let name = strip_rating_suffix(&raw_text).to_string();
        if is_placeholder_name(&name) {
            ctx.page.mark_processed(id);
            ctx.states.insert(id, SlotStatus::SkippedSentinel);
            report.stats.skipped += 1;
            report.outcomes.push(SlotOutcome {
                slot: id,
                name,
                status: SlotStatus::SkippedSentinel,
                record: None,
                error: None,
            });
            continue;
        }

        let ticket = ctx.client.lookup(&name);
        pending.push((id, name, ticket));
    }

    for (id, name, ticket) in pending {
        let outcome = match ticket.wait() {
            Ok(Some(records)) => {
                let chosen = if ctx.cfg.match_guard {
                    records.iter().find(|r| name_matches(&name, r))
                } else {
                    records.first()
                };
                match chosen {
                    Some(record) => {
                        ctx.page.set_slot_text(id, format_enrichment(&name, record));
                        ctx.page
                            .set_slot_shade(id, shade_for_rating(record.avg_rating).map(str::to_string));
                        ctx.page.set_slot_link(id, profile_url(record));
                        report.stats.enriched += 1;
                        SlotOutcome {
                            slot: id,
                            name,
                            status: SlotStatus::Enriched,
                            record: Some(record.clone()),
                            error: None,
                        }
                    }
                    None => {
                        eprintln!("[enrich] no candidate matched '{name}'; leaving slot unannotated");
                        report.stats.mismatched += 1;
                        SlotOutcome {
                            slot: id,
                            name,
                            status: SlotStatus::NameMismatch,
                            record: None,
                            error: None,
                        }
                    }
                }
            }
            Ok(None) => {
                eprintln!("[enrich] no rating data for '{name}'");
                report.stats.no_data += 1;
                SlotOutcome {
                    slot: id,
                    name,
                    status: SlotStatus::NoData,
                    record: None,
                    error: None,
                }
            }
            Err(failure) => {
                eprintln!("[enrich] lookup failed for '{name}': {failure}");
                report.stats.failed += 1;
                SlotOutcome {
                    slot: id,
                    name,
                    status: SlotStatus::LookupFailed,
                    record: None,
                    error: Some(failure.to_string()),
                }
            }
        };

        // Guaranteed cleanup: whatever happened above, the slot is processed
        // and any force flag is consumed.
        ctx.page.mark_processed(id);
        ctx.states.insert(id, outcome.status);
        report.outcomes.push(outcome);
    }

    report
}

pub(crate) fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}"),
        None => "N/A".to_string(),
    }
}

pub(crate) fn format_enrichment(name: &str, record: &ProfessorRecord) -> String {
    format!(
        "{name} / R: {} / D: {}",
        format_metric(record.avg_rating),
        format_metric(record.avg_difficulty)
    )
}

pub(crate) fn shade_for_rating(rating: Option<f64>) -> Option<&'static str> {
    match rating {
        Some(v) if v >= 4.0 => Some(SHADE_FAVORABLE),
        Some(v) if v >= 3.0 => Some(SHADE_NEUTRAL),
        Some(_) => Some(SHADE_UNFAVORABLE),
        None => None,
    }
}

pub(crate) fn profile_url(record: &ProfessorRecord) -> Option<String> {
    record
        .legacy_id
        .map(|id| format!("{PROFILE_URL_BASE}/{id}"))
}

/// Best-effort guard against annotating the wrong person: the candidate's
/// first and last name must both appear, case-insensitively and in either
/// order, within the displayed name. Candidates with missing name fields
/// never match.
pub(crate) fn name_matches(display: &str, record: &ProfessorRecord) -> bool {
    let display = display.to_lowercase();
    let first = record.first_name.trim().to_lowercase();
    let last = record.last_name.trim().to_lowercase();
    if first.is_empty() || last.is_empty() {
        return false;
    }
    display.contains(&first) && display.contains(&last)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayService, LookupFailure, LookupResult, RatingSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record(first: &str, last: &str, rating: Option<f64>, difficulty: Option<f64>) -> ProfessorRecord {
        ProfessorRecord {
            id: format!("stub-{last}"),
            legacy_id: Some(123),
            avg_rating: rating,
            avg_difficulty: difficulty,
            would_take_again_percent: Some(85.0),
            first_name: first.to_string(),
            last_name: last.to_string(),
            department: Some("Computer Science".to_string()),
        }
    }

    /// Resolves "Last, First" display names to a matching record; names
    /// containing "fail" error out, names containing "ghost" return no data.
    struct StubSource {
        calls: Arc<AtomicUsize>,
    }

    impl RatingSource for StubSource {
        fn lookup(&self, prof_name: &str) -> LookupResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prof_name.contains("fail") {
                return Err(LookupFailure::RequestFailed(503));
            }
            if prof_name.contains("ghost") {
                return Ok(None);
            }
            let (last, first) = prof_name.split_once(", ").unwrap_or((prof_name, ""));
            Ok(Some(vec![record(first, last, Some(4.2), Some(2.8))]))
        }
    }

    fn slot_html(names: &[&str]) -> String {
        let mut html = String::from("<html><body><div id=\"legend_box\">\n");
        for name in names {
            html.push_str(&format!(
                "<div class=\"rightnclear\" title=\"Instructor(s)\">{name}</div>\n"
            ));
        }
        html.push_str("</div></body></html>");
        html
    }

    fn ctx_for(html: &str) -> (GatewayService, EnrichContext, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = StubSource {
            calls: Arc::clone(&calls),
        };
        let (service, client) = GatewayService::start(Arc::new(source), 4);
        let cfg = EnrichConfig::defaults();
        let page = SchedulePage::parse(html, &cfg);
        (service, EnrichContext::new(page, client, cfg), calls)
    }

    fn finish(service: GatewayService, ctx: EnrichContext) {
        drop(ctx);
        service.shutdown();
    }

    #[test]
    fn enriches_text_shade_and_link() {
        let html = slot_html(&["Smith, Jane"]);
        let (service, mut ctx, _) = ctx_for(&html);

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.enriched, 1);
        let slot = ctx.page.slot(0);
        assert_eq!(slot.text, "Smith, Jane / R: 4.2 / D: 2.8");
        assert_eq!(slot.shade.as_deref(), Some(SHADE_FAVORABLE));
        assert_eq!(
            slot.profile_url.as_deref(),
            Some("https://www.ratemyprofessors.com/professor/123")
        );
        assert!(slot.processed);
        assert_eq!(ctx.states.get(&0), Some(&SlotStatus::Enriched));

        finish(service, ctx);
    }

    #[test]
    fn second_scan_is_a_noop() {
        let html = slot_html(&["Smith, Jane", "Jones, Bob"]);
        let (service, mut ctx, calls) = ctx_for(&html);

        scan_and_enrich(&mut ctx);
        let first_pass_calls = calls.load(Ordering::SeqCst);
        let text_after_first: Vec<String> = ctx
            .page
            .slot_ids()
            .iter()
            .map(|&id| ctx.page.slot(id).text.clone())
            .collect();

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.scanned, 0);
        assert_eq!(calls.load(Ordering::SeqCst), first_pass_calls);
        for (id, before) in text_after_first.iter().enumerate() {
            assert_eq!(&ctx.page.slot(id).text, before);
        }

        finish(service, ctx);
    }

    #[test]
    fn sentinels_issue_no_lookup_but_are_marked() {
        let html = slot_html(&["Staff", "TBA", "   "]);
        let (service, mut ctx, calls) = ctx_for(&html);

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.skipped, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        for id in ctx.page.slot_ids() {
            assert!(ctx.page.slot(id).processed);
            assert_eq!(ctx.states.get(&id), Some(&SlotStatus::SkippedSentinel));
        }

        finish(service, ctx);
    }

    #[test]
    fn not_found_leaves_text_but_marks_processed() {
        let html = slot_html(&["ghost, Casper"]);
        let (service, mut ctx, _) = ctx_for(&html);

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.no_data, 1);
        assert_eq!(ctx.page.slot(0).text, "ghost, Casper");
        assert!(ctx.page.slot(0).processed);
        assert_eq!(ctx.states.get(&0), Some(&SlotStatus::NoData));

        finish(service, ctx);
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let html = slot_html(&["Smith, Jane", "failwell, Max", "Jones, Bob"]);
        let (service, mut ctx, _) = ctx_for(&html);

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.enriched, 2);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(ctx.page.slot(1).text, "failwell, Max");
        assert_eq!(ctx.states.get(&1), Some(&SlotStatus::LookupFailed));
        assert!(ctx.page.slot(0).text.contains(" / R: "));
        assert!(ctx.page.slot(2).text.contains(" / R: "));
        // Every slot is processed regardless of its outcome.
        for id in ctx.page.slot_ids() {
            assert!(ctx.page.slot(id).processed);
        }

        finish(service, ctx);
    }

    #[test]
    fn force_reprocess_does_not_stack_suffixes() {
        let html = slot_html(&["Smith, Jane"]);
        let (service, mut ctx, calls) = ctx_for(&html);

        scan_and_enrich(&mut ctx);
        ctx.cfg.force_reprocess = true;
        let report = scan_and_enrich(&mut ctx);

        assert_eq!(report.stats.scanned, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.page.slot(0).text, "Smith, Jane / R: 4.2 / D: 2.8");

        finish(service, ctx);
    }

    #[test]
    fn slot_level_force_flag_is_consumed() {
        let html = slot_html(&["Smith, Jane"]);
        let (service, mut ctx, calls) = ctx_for(&html);

        scan_and_enrich(&mut ctx);
        ctx.page.set_force_reprocess(0, true);
        scan_and_enrich(&mut ctx);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!ctx.page.slot(0).force_reprocess);

        // Flag was cleared, so a third scan does nothing.
        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.scanned, 0);

        finish(service, ctx);
    }

    // ── match guard ─────────────────────────────────────────────────

    struct MismatchSource;

    impl RatingSource for MismatchSource {
        fn lookup(&self, _prof_name: &str) -> LookupResult {
            Ok(Some(vec![record("John", "Doe", Some(4.5), Some(2.0))]))
        }
    }

    #[test]
    fn guard_skips_wrong_candidate() {
        let html = slot_html(&["Smith, Jane"]);
        let (service, client) = GatewayService::start(Arc::new(MismatchSource), 1);
        let cfg = EnrichConfig::defaults();
        let page = SchedulePage::parse(&html, &cfg);
        let mut ctx = EnrichContext::new(page, client, cfg);

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.mismatched, 1);
        assert_eq!(ctx.page.slot(0).text, "Smith, Jane");
        assert!(ctx.page.slot(0).processed);
        assert_eq!(ctx.states.get(&0), Some(&SlotStatus::NameMismatch));

        finish(service, ctx);
    }

    #[test]
    fn guard_off_takes_first_candidate() {
        let html = slot_html(&["Smith, Jane"]);
        let (service, client) = GatewayService::start(Arc::new(MismatchSource), 1);
        let mut cfg = EnrichConfig::defaults();
        cfg.match_guard = false;
        let page = SchedulePage::parse(&html, &cfg);
        let mut ctx = EnrichContext::new(page, client, cfg);

        let report = scan_and_enrich(&mut ctx);
        assert_eq!(report.stats.enriched, 1);
        assert!(ctx.page.slot(0).text.starts_with("Smith, Jane / R: 4.5"));

        finish(service, ctx);
    }

    // ── pure helpers ────────────────────────────────────────────────

    #[test]
    fn formatting_one_decimal_and_na() {
        let rec = record("Jane", "Smith", Some(4.25), Some(2.8));
        assert_eq!(
            format_enrichment("Smith, Jane", &rec),
            "Smith, Jane / R: 4.2 / D: 2.8"
        );
        let rec = record("Jane", "Smith", None, None);
        assert_eq!(
            format_enrichment("Smith, Jane", &rec),
            "Smith, Jane / R: N/A / D: N/A"
        );
    }

    #[test]
    fn shade_thresholds() {
        assert_eq!(shade_for_rating(Some(4.0)), Some(SHADE_FAVORABLE));
        assert_eq!(shade_for_rating(Some(4.9)), Some(SHADE_FAVORABLE));
        assert_eq!(shade_for_rating(Some(3.0)), Some(SHADE_NEUTRAL));
        assert_eq!(shade_for_rating(Some(3.9)), Some(SHADE_NEUTRAL));
        assert_eq!(shade_for_rating(Some(2.9)), Some(SHADE_UNFAVORABLE));
        assert_eq!(shade_for_rating(None), None);
    }

    #[test]
    fn name_match_either_order_any_case() {
        let rec = record("Jane", "Smith", Some(4.0), Some(2.0));
        assert!(name_matches("Smith, Jane", &rec));
        assert!(name_matches("Jane Smith", &rec));
        assert!(name_matches("JANE SMITH", &rec));
        assert!(!name_matches("Jones, Bob", &rec));
        assert!(!name_matches("Smith, John", &rec));
    }

    #[test]
    fn name_match_requires_both_fields() {
        let rec = record("", "Smith", Some(4.0), Some(2.0));
        assert!(!name_matches("Smith, Jane", &rec));
    }

    #[test]
    fn profile_url_needs_legacy_id() {
        let mut rec = record("Jane", "Smith", Some(4.0), Some(2.0));
        assert_eq!(
            profile_url(&rec).as_deref(),
            Some("https://www.ratemyprofessors.com/professor/123")
        );
        rec.legacy_id = None;
        assert_eq!(profile_url(&rec), None);
    }
}
