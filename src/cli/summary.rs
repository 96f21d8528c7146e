//! Run summary printed after an export.

use tabled::{Table, Tabled, settings::Style};

use crate::export::{ExportError, ExportReport};
use crate::orchestrator::ExportOutcome;

#[derive(Tabled)]
struct OutcomeDisplay {
    #[tabled(rename = "Project")]
    name: String,
    #[tabled(rename = "UID")]
    uid: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Commit")]
    commit: String,
    #[tabled(rename = "Fonts")]
    fonts: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&ExportOutcome> for OutcomeDisplay {
    fn from(outcome: &ExportOutcome) -> Self {
        let (status, commit, fonts, detail) = match &outcome.result {
            Ok(ExportReport::Exported {
                commit,
                fonts,
                push_attempts,
            }) => (
                "exported",
                commit.short().to_string(),
                fonts.to_string(),
                match push_attempts {
                    1 => "-".to_string(),
                    n => format!("pushed after {} attempts", n),
                },
            ),
            Ok(ExportReport::Unchanged) => {
                ("unchanged", "-".to_string(), "0".to_string(), "-".to_string())
            }
            Err(e) => (
                status_of(e),
                "-".to_string(),
                "-".to_string(),
                truncate_with_ellipsis(&e.to_string(), 80),
            ),
        };

        Self {
            name: truncate_with_ellipsis(&outcome.project_name, 40),
            uid: outcome.project_uid.to_string(),
            status,
            commit,
            fonts,
            detail,
        }
    }
}

fn status_of(error: &ExportError) -> &'static str {
    if error.is_cancelled() {
        "cancelled"
    } else if error.is_rejected() {
        "rejected"
    } else {
        "failed"
    }
}

/// Truncate a string with ellipsis if it exceeds max length
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Table of per-project outcomes followed by a totals line.
pub fn format_summary(outcomes: &[ExportOutcome]) -> String {
    if outcomes.is_empty() {
        return "No projects to export.".to_string();
    }

    let rows: Vec<OutcomeDisplay> = outcomes.iter().map(OutcomeDisplay::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    format!(
        "{}\n{} project(s): {} succeeded, {} failed",
        table,
        outcomes.len(),
        outcomes.len() - failed,
        failed
    )
}
