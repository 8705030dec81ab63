use crate::stats::Registry;

use super::ports::ReportRenderer;

/// Prints aggregated interval and cumulative summaries to stdout. Stands in
/// for the HTTP report page, which consumes the same registry view.
pub struct ConsoleRenderer;

impl ReportRenderer for ConsoleRenderer {
    fn render(&self, registry: &mut Registry) {
        if registry.is_empty() {
            return;
        }
        println!("--- aggregated progress ---");
        for reportable in registry.iter_mut() {
            let summary = reportable.summary();
            println!("{}: {}", reportable.name(), summary);
        }
    }
}

/// Prints the final cumulative view once the pool completes.
pub fn print_final_report(registry: &mut Registry) {
    if registry.is_empty() {
        println!("No statistics were reported.");
        return;
    }
    println!("=== final report ===");
    for reportable in registry.iter_mut() {
        println!("{} ({} samples):", reportable.name(), reportable.length());
        let summary = reportable.summary();
        if let Some(cumulative) = summary.get("cumulative") {
            println!("  {}", cumulative);
        }
    }
}
