use crate::{scan_and_enrich, EnrichContext, ScanReport};

// === Observe-mutate-reconnect loop ===
// The observer must never see the enrichment pass's own writes: the cycle
// detaches before scanning, runs the scan to completion, and reattaches only
// if the anchor node survived whatever change triggered the cycle.

pub(crate) enum CycleOutcome {
    /// No observed mutations since the last cycle.
    Idle,
    /// A scan ran and the observer is watching again.
    Ran(ScanReport),
    /// A scan ran but the anchor node is gone; observation has stopped and
    /// only a full page reload can restart it.
    ObserverLost(ScanReport),
}

/// Attach the observer for the first time, after the initial scan. Returns
/// false (with a diagnostic) when the page has no anchor node, in which case
/// later host changes go unnoticed.
pub(crate) fn start_observing(ctx: &mut EnrichContext) -> bool {
    match ctx.page.attach_observer() {
        Ok(()) => true,
        Err(err) => {
            eprintln!("[observe] not observing: {err}");
            false
        }
    }
}

/// One turn of the loop: drain pending mutations, and if anything happened in
/// the observed subtree, detach, re-scan, and reattach.
pub(crate) fn run_cycle(ctx: &mut EnrichContext) -> CycleOutcome {
    if ctx.page.take_mutations().is_empty() {
        return CycleOutcome::Idle;
    }

    ctx.page.detach_observer();
    let report = scan_and_enrich(ctx);

    if ctx.page.anchor_present() && ctx.page.attach_observer().is_ok() {
        CycleOutcome::Ran(report)
    } else {
        eprintln!(
            "[observe] anchor node '{}' disappeared; observation stopped until the next reload",
            ctx.page.anchor_id()
        );
        CycleOutcome::ObserverLost(report)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
