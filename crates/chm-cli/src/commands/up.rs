//! migration:up command implementation

use anyhow::Result;
use chm_runner::{ApplyEngine, ApplyReport, Compensation, CompensationOutcome};

use crate::cli::{GlobalArgs, UpArgs};
use crate::commands::common::setup;

/// Execute the migration:up command
pub async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let (config, loader, db) = setup(global, args.path.as_deref(), args.dry_run)?;
    if let Some(cluster) = config.cluster() {
        log::info!("Cluster mode: {}", cluster);
    }

    let engine = ApplyEngine::new(db.as_ref(), &loader, &config);
    match engine.apply(args.dry_run).await {
        Ok(report) => {
            print_report(&report, global.verbose);
            Ok(())
        }
        Err(err) => {
            print_compensations(err.compensations());
            Err(err.into())
        }
    }
}

fn print_report(report: &ApplyReport, verbose: bool) {
    if verbose {
        for filename in &report.skipped {
            println!("  Already applied: {}", filename);
        }
    }

    if report.dry_run {
        if report.pending.is_empty() {
            println!("Dry run - no pending migrations");
        } else {
            println!(
                "Dry run - would apply {} migration(s):",
                report.pending.len()
            );
            for filename in &report.pending {
                println!("  {}", filename);
            }
        }
        return;
    }

    if report.applied.is_empty() {
        println!(
            "No pending migrations ({} already applied).",
            report.skipped.len()
        );
    } else {
        println!(
            "All migrations applied successfully ({} applied, {} already applied).",
            report.applied.len(),
            report.skipped.len()
        );
    }
}

fn print_compensations(compensations: &[Compensation]) {
    for c in compensations {
        match &c.outcome {
            CompensationOutcome::Succeeded => eprintln!("  Rolled back: {}", c.filename),
            CompensationOutcome::Failed { failures } => eprintln!(
                "  Rollback incomplete: {} ({} statement(s) failed, ledger entry kept)",
                c.filename,
                failures.len()
            ),
            CompensationOutcome::NothingToUndo => {
                eprintln!("  Left in place (no rollback SQL): {}", c.filename)
            }
        }
    }
}

#[cfg(test)]
#[path = "up_test.rs"]
mod tests;
