mod channel;
mod cli;
mod config;
mod enrich;
mod gateway;
mod observe;
mod page;
mod types;
mod util;
mod watch;

#[allow(unused_imports)]
pub(crate) use channel::*;
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use enrich::*;
#[allow(unused_imports)]
pub(crate) use gateway::*;
#[allow(unused_imports)]
pub(crate) use observe::*;
#[allow(unused_imports)]
pub(crate) use page::*;
#[allow(unused_imports)]
pub(crate) use types::*;
#[allow(unused_imports)]
pub(crate) use util::*;
#[allow(unused_imports)]
pub(crate) use watch::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Lookup {
            name,
            school,
            count,
            json,
        } => {
            let mut cfg = EnrichConfig::from_env()?;
            if let Some(school) = school {
                cfg.school_id = school;
            }
            if let Some(count) = count {
                cfg.candidate_count = count;
            }

            let source = Arc::new(HttpRatingSource::new(&cfg));
            let (service, client) = GatewayService::start(source, 1);
            let result = client.lookup(&name).wait();
            drop(client);
            service.shutdown();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&LookupEnvelope::from_result(&result))?
                );
                return Ok(());
            }
            match result {
                Ok(Some(records)) => {
                    for record in &records {
                        print_record(record);
                    }
                }
                Ok(None) => println!("No rating data for '{name}'."),
                Err(failure) => return Err(failure.to_string().into()),
            }
            Ok(())
        }

        Command::Annotate {
            file,
            out,
            force,
            no_match_guard,
            json,
        } => {
            let mut cfg = EnrichConfig::from_env()?;
            cfg.force_reprocess = force;
            if no_match_guard {
                cfg.match_guard = false;
            }

            let html = fs::read_to_string(&file)?;
            let out = out.unwrap_or_else(|| default_out_path(&file));
            let page = SchedulePage::parse(&html, &cfg);
            let source = Arc::new(HttpRatingSource::new(&cfg));
            let workers = cfg.workers;
            let (service, client) = GatewayService::start(source, workers);
            let mut ctx = EnrichContext::new(page, client, cfg);

            let report = scan_and_enrich(&mut ctx);
            fs::write(&out, ctx.page.render())?;
            drop(ctx);
            service.shutdown();

            let report = AnnotateReport::new(
                file.display().to_string(),
                out.display().to_string(),
                report,
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_annotate_report(&report);
            }
            Ok(())
        }

        Command::Watch {
            file,
            out,
            interval_ms,
            settle_ms,
            max_cycles,
            force,
            no_match_guard,
        } => {
            let mut cfg = EnrichConfig::from_env()?;
            cfg.force_reprocess = force;
            if no_match_guard {
                cfg.match_guard = false;
            }
            if let Some(settle) = settle_ms {
                cfg.settle_ms = settle;
            }
            let out = out.unwrap_or_else(|| default_out_path(&file));
            run_watch(&file, &out, cfg, interval_ms, max_cycles)
        }
    }
}

fn default_out_path(file: &Path) -> PathBuf {
    let mut name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "schedule".to_string());
    name.push_str(".annotated.html");
    file.with_file_name(name)
}

fn print_record(record: &ProfessorRecord) {
    println!(
        "{} {} ({})",
        record.first_name,
        record.last_name,
        record.department.as_deref().unwrap_or("unknown department")
    );
    let would_take = match record.would_take_again_percent {
        Some(pct) => format!("{pct:.0}%"),
        None => "N/A".to_string(),
    };
    println!(
        "  rating: {}  difficulty: {}  would take again: {}",
        format_metric(record.avg_rating),
        format_metric(record.avg_difficulty),
        would_take
    );
    if let Some(url) = profile_url(record) {
        println!("  profile: {url}");
    }
}

fn print_annotate_report(report: &AnnotateReport) {
    println!("Annotated {} -> {}", report.file, report.out);
    let s = &report.stats;
    println!(
        "  {} scanned, {} enriched, {} skipped, {} no data, {} mismatched, {} failed",
        s.scanned, s.enriched, s.skipped, s.no_data, s.mismatched, s.failed
    );
    for outcome in &report.outcomes {
        println!("  - {} [{}]", outcome.name, outcome.status.label());
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
