//! Command implementations

pub mod check;
pub mod develop;
pub mod produce;

use sitepipe_pipeline::{JobOutcome, RunReport};

/// Print one line per job in a run report.
fn print_report(report: &RunReport) {
    println!();
    for record in report.records() {
        match &record.outcome {
            JobOutcome::Succeeded(summary) => println!(
                "  ✓ {:<10} {summary} ({}ms)",
                record.name,
                record.duration.as_millis()
            ),
            JobOutcome::Recovered(message) => println!("  ✗ {:<10} {message}", record.name),
        }
    }
    println!();
}
