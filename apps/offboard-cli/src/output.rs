//! Run summary printed to stdout.

use offboard_core::{ModuleOutcome, Provider, RunReport};

/// Render the summary of a run or verification.
pub fn render(report: &RunReport) -> String {
    let mut lines = vec![format!("run {} ({} mode)", report.run_id, report.mode)];

    for module in &report.modules {
        let state = match &module.outcome {
            ModuleOutcome::Ok => "ok".to_string(),
            ModuleOutcome::PartialFailure { failed } => format!("{failed} failed"),
            ModuleOutcome::Aborted { reason } => format!("aborted: {reason}"),
        };
        lines.push(format!(
            "  {:<16} {} grants, {} revoked, {}",
            module.provider.to_string(),
            module.results.len(),
            module.applied(),
            state
        ));
        for result in module.results.iter().filter(|r| r.result.is_failure()) {
            lines.push(format!("    failed: {}", result.description));
        }
    }

    match &report.verification {
        Some(verification) => {
            if verification.is_clean() {
                lines.push("  verification: no residual access".to_string());
            }
            for finding in &verification.findings {
                lines.push(format!("  residual: {}", finding.grant));
            }
            for provider in &verification.incomplete {
                lines.push(format!("  unverified: could not re-list {provider}"));
            }
            for identity in &verification.lingering_identities {
                lines.push(format!("  identity remains: {identity}"));
            }
        }
        None => lines.push("  verification: skipped".to_string()),
    }

    lines.push(format!("status: {}", report.status));
    lines.join("\n")
}

pub fn print(report: &RunReport) {
    println!("{}", render(report));
}

/// Summary when setup left no provider to run.
pub fn print_nothing_to_do(skipped: &[Provider]) {
    let names: Vec<String> = skipped.iter().map(ToString::to_string).collect();
    println!("nothing to do: principal not found at {}", names.join(", "));
}
