use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use crate::{
    run_cycle, scan_and_enrich, start_observing, CycleOutcome, EnrichConfig, EnrichContext,
    GatewayService, HttpRatingSource, ScanReport, SchedulePage,
};

/// Watch a saved schedule page and re-annotate whenever the file changes.
/// This is the long-running frontend: settle, scan once, then poll the file's
/// mtime and feed each new rendition through the observe-mutate-reconnect
/// cycle. Stops when observation is lost or `max_cycles` is reached.
pub(crate) fn run_watch(
    path: &Path,
    out: &Path,
    cfg: EnrichConfig,
    interval_ms: u64,
    max_cycles: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.settle_ms > 0 {
        thread::sleep(Duration::from_millis(cfg.settle_ms));
    }

    let html = fs::read_to_string(path)?;
    let page = SchedulePage::parse(&html, &cfg);
    let source = Arc::new(HttpRatingSource::new(&cfg));
    let workers = cfg.workers;
    let (service, client) = GatewayService::start(source, workers);
    let mut ctx = EnrichContext::new(page, client, cfg);

    let report = scan_and_enrich(&mut ctx);
    fs::write(out, ctx.page.render())?;
    log_report("initial scan", &report);

    let mut observing = start_observing(&mut ctx);
    if !observing {
        eprintln!(
            "[watch] {} will not be re-annotated on change",
            path.display()
        );
    }

    let mut last_mtime = mtime_of(path);
    let mut cycles = 0u64;
    while observing && max_cycles.is_none_or(|m| cycles < m) {
        thread::sleep(Duration::from_millis(interval_ms));

        let mtime = mtime_of(path);
        if mtime == last_mtime {
            continue;
        }
        last_mtime = mtime;

        let html = match fs::read_to_string(path) {
            Ok(html) => html,
            Err(err) => {
                // Transient: the host may be mid-write. Retry next poll.
                eprintln!("[watch] read failed for {}: {err}", path.display());
                continue;
            }
        };
        ctx.reload_from(&html);

        match run_cycle(&mut ctx) {
            CycleOutcome::Idle => {}
            CycleOutcome::Ran(report) => {
                cycles += 1;
                fs::write(out, ctx.page.render())?;
                log_report("cycle", &report);
            }
            CycleOutcome::ObserverLost(report) => {
                cycles += 1;
                fs::write(out, ctx.page.render())?;
                log_report("cycle", &report);
                observing = false;
            }
        }
    }

    drop(ctx);
    service.shutdown();
    Ok(())
}

fn log_report(label: &str, report: &ScanReport) {
    let s = &report.stats;
    eprintln!(
        "[watch] {label}: {} scanned, {} enriched, {} skipped, {} no data, {} mismatched, {} failed",
        s.scanned, s.enriched, s.skipped, s.no_data, s.mismatched, s.failed
    );
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
