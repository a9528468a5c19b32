//! Backup run reporting

use crate::journal::RunEvent;
use crate::pipeline::RunState;

/// Journal events, one per line
pub fn format_history(events: &[RunEvent]) -> String {
    if events.is_empty() {
        return "No backup runs recorded.".to_string();
    }
    let mut output = String::new();
    for event in events {
        output.push_str(&event.summary());
        output.push('\n');
    }
    output
}

/// End-of-run summary for the operator
pub fn format_run_summary(parent: &str, state: &RunState) -> String {
    let mut output = String::new();
    output.push_str(&format!("Run tag:   {}\n", state.tag));
    output.push_str(&format!("Archived:  {}\n", state.archived.len()));
    output.push_str(&format!("Checked:   {}\n", state.checked.len()));

    if let Some(failure) = &state.failure {
        output.push_str(&format!(
            "Failed:    {} ({})\n",
            failure.volume, failure.phase
        ));
    }
    if state.snapshot_created {
        output.push_str(&format!(
            "Snapshot {}@{} was left in place for inspection.\n",
            parent, state.tag
        ));
    }
    output
}
