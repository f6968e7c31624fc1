//! Stage progress printed to stderr while a run is in flight.

use briefsmith_core::{Section, Stage, StageOutcome, StageReport, SynthesisCallback};

pub struct StderrProgress {
    quiet: bool,
}

impl StderrProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

fn marker(outcome: StageOutcome) -> &'static str {
    match outcome {
        StageOutcome::Success => "ok",
        StageOutcome::Partial => "partial",
        StageOutcome::Skipped => "skipped",
        StageOutcome::Failed => "FAILED",
    }
}

impl SynthesisCallback for StderrProgress {
    fn on_stage_start(&self, stage: Stage) {
        if !self.quiet {
            eprintln!("  > {}", stage);
        }
    }

    fn on_stage_complete(&self, report: &StageReport) {
        if !self.quiet {
            eprintln!(
                "    {} [{}] {} ({:.1}s)",
                report.stage,
                marker(report.outcome),
                report.detail,
                report.elapsed.as_secs_f64()
            );
        }
    }

    fn on_query_complete(&self, label: &str, chars: usize) {
        if !self.quiet {
            if chars == 0 {
                eprintln!("    - {} abandoned", label);
            } else {
                eprintln!("    - {} ({} chars)", label, chars);
            }
        }
    }

    fn on_section_complete(&self, section: Section, fields: usize) {
        if !self.quiet {
            eprintln!("    - {} ({} fields)", section, fields);
        }
    }
}
