//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::export::ExportSummary;
use crate::model::{ActuationPlan, DiffStatus, ManagedResourceDiff, ValidationErrorDetail};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource diff row for table display.
#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Changes")]
    changes: usize,
}

/// Field change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Desired")]
    desired: String,
    #[tabled(rename = "Current")]
    current: String,
}

/// Planned action row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Changes")]
    changes: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats resource diffs. Unchanged resources are only listed when
    /// `show_all` is set.
    #[must_use]
    pub fn format_diff(&self, diffs: &[ManagedResourceDiff], show_all: bool) -> String {
        let shown: Vec<&ManagedResourceDiff> = diffs
            .iter()
            .filter(|diff| show_all || diff.has_changes())
            .collect();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&shown).unwrap_or_default(),
            OutputFormat::Text => Self::format_diff_text(&shown, diffs.len()),
        }
    }

    fn format_diff_text(shown: &[&ManagedResourceDiff], total: usize) -> String {
        let changed = shown.iter().filter(|diff| diff.has_changes()).count();
        if changed == 0 && shown.is_empty() {
            return format!(
                "{} No differences - {total} resources match the delivery config.\n",
                "✓".green()
            );
        }

        let mut output = String::new();
        let rows: Vec<DiffRow> = shown
            .iter()
            .map(|diff| DiffRow {
                status: Self::format_status(&diff.status),
                resource: diff.resource_id.clone(),
                changes: diff.diffs.len(),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        for diff in shown.iter().filter(|diff| !diff.diffs.is_empty()) {
            let _ = writeln!(output, "\n{}", diff.resource_id.bold());
            let rows: Vec<ChangeRow> = diff
                .diffs
                .iter()
                .map(|(field, change)| ChangeRow {
                    field: field.clone(),
                    change: change.state.clone(),
                    desired: Self::truncate(&change.desired, 40),
                    current: Self::truncate(&change.current, 40),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(
            output,
            "\n{} of {total} resources differ.\n",
            changed.to_string().yellow()
        );
        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, detail: Option<&ValidationErrorDetail>) -> String {
        match (self.format, detail) {
            (OutputFormat::Json, Some(detail)) => {
                serde_json::to_string_pretty(detail).unwrap_or_default()
            }
            (OutputFormat::Json, None) => {
                serde_json::json!({ "status": "valid" }).to_string()
            }
            (OutputFormat::Text, None) => format!("{} Delivery config is valid.\n", "✓".green()),
            (OutputFormat::Text, Some(detail)) => {
                format!("{} Delivery config is invalid:\n   {detail}\n", "✗".red())
            }
        }
    }

    /// Formats an actuation plan.
    #[must_use]
    pub fn format_plan(&self, plan: &ActuationPlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    fn format_plan_text(plan: &ActuationPlan) -> String {
        let mut output = String::new();
        let _ = write!(
            output,
            "\nActuation plan for {} (updated {})\n\n",
            plan.application.bold(),
            plan.updated_at.format("%Y-%m-%d %H:%M:%S")
        );

        let rows: Vec<PlanRow> = plan
            .environment_plans
            .iter()
            .flat_map(|env| &env.resource_plans)
            .filter(|resource| resource.has_action())
            .map(|resource| PlanRow {
                environment: resource.environment.clone(),
                action: Self::format_action(&resource.action),
                resource: if resource.resource_display_name.is_empty() {
                    resource.resource_id.clone()
                } else {
                    resource.resource_display_name.clone()
                },
                changes: resource.diff.len(),
            })
            .collect();

        if rows.is_empty() {
            let _ = writeln!(output, "{} No actions planned.", "✓".green());
        } else {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !plan.errors.is_empty() {
            let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
            for error in &plan.errors {
                let _ = writeln!(output, "   - {error}");
            }
        }
        output
    }

    /// Formats the result of an export.
    #[must_use]
    pub fn format_export(&self, summary: &ExportSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("\nExport summary for {}\n", summary.app_name.bold());

                if !summary.added_artifacts.is_empty() {
                    output.push_str("\n   Artifacts:\n");
                    for artifact in &summary.added_artifacts {
                        let _ = writeln!(
                            output,
                            "     {} {} ({})",
                            "added".green(),
                            artifact.ref_name(),
                            artifact.artifact_type
                        );
                    }
                }

                if summary.resources.is_empty() {
                    output.push_str("\n   No resources exported.\n");
                } else {
                    output.push_str("\n   Resources:\n");
                    for resource in &summary.resources {
                        let status = if resource.added {
                            "added".green()
                        } else {
                            "updated".yellow()
                        };
                        let _ = writeln!(
                            output,
                            "     {status} {} {} [{}] -> {}",
                            resource.identity.resource_type,
                            resource.identity.name,
                            resource.identity.account,
                            resource.environment
                        );
                    }
                }

                for skipped in &summary.skipped {
                    let _ = writeln!(output, "\n{} Cannot export {skipped}", "⚠".yellow());
                }

                if !summary.errors.is_empty() {
                    let _ = write!(output, "\n{} Errors:\n", "✗".red());
                    for failure in &summary.errors {
                        let _ = writeln!(output, "   - {}: {}", failure.identity, failure.message);
                    }
                }
                output
            }
        }
    }

    /// Formats a diff status with color.
    fn format_status(status: &DiffStatus) -> String {
        match status {
            DiffStatus::NoDiff => status.as_str().dimmed().to_string(),
            DiffStatus::Create | DiffStatus::Missing => status.as_str().green().to_string(),
            DiffStatus::Diff | DiffStatus::Update => status.as_str().yellow().to_string(),
            DiffStatus::Error | DiffStatus::Other(_) => status.as_str().red().to_string(),
        }
    }

    /// Formats a planned action with color.
    fn format_action(action: &str) -> String {
        match action {
            "CREATE" => "+create".green().to_string(),
            "UPDATE" => "~update".yellow().to_string(),
            "DELETE" => "-delete".red().to_string(),
            other => other.to_lowercase(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        let flat = s.replace('\n', " ");
        if flat.chars().count() <= max_len {
            flat
        } else {
            let head: String = flat.chars().take(max_len - 3).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow(), message)
    }

    fn message(&self, status: &str, symbol: &colored::ColoredString, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceDiff;

    fn diff(id: &str, status: DiffStatus) -> ManagedResourceDiff {
        let mut diffs = std::collections::BTreeMap::new();
        if status != DiffStatus::NoDiff {
            diffs.insert(
                String::from("/capacity/desired"),
                ResourceDiff {
                    state: String::from("CHANGED"),
                    desired: String::from("3"),
                    current: String::from("1"),
                },
            );
        }
        ManagedResourceDiff {
            status,
            resource_id: id.to_string(),
            resource: crate::model::DeliveryResource::default(),
            diffs,
        }
    }

    #[test]
    fn test_format_diff_text_hides_unchanged() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let diffs = vec![
            diff("cluster:test:myapp-test", DiffStatus::NoDiff),
            diff("cluster:prod:myapp-prod", DiffStatus::Diff),
        ];

        let output = formatter.format_diff(&diffs, false);

        assert!(output.contains("cluster:prod:myapp-prod"));
        assert!(!output.contains("cluster:test:myapp-test"));
        assert!(output.contains("/capacity/desired"));
        assert!(output.contains("1 of 2 resources differ."));
    }

    #[test]
    fn test_format_diff_no_changes() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);

        let output = formatter.format_diff(&[diff("cluster:test:a", DiffStatus::NoDiff)], false);

        assert!(output.contains("No differences - 1 resources match"));
    }

    #[test]
    fn test_format_diff_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);

        let output = formatter.format_diff(&[diff("cluster:test:a", DiffStatus::Diff)], true);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value[0]["status"], "DIFF");
        assert_eq!(value[0]["resourceId"], "cluster:test:a");
    }

    #[test]
    fn test_format_validation() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let detail = ValidationErrorDetail {
            error: String::from("Bad Request"),
            status: 400,
            message: String::from("missing name"),
            ..ValidationErrorDetail::default()
        };

        assert!(formatter.format_validation(None).contains("valid"));
        assert!(formatter.format_validation(Some(&detail)).contains("[Bad Request] missing name"));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("ééééééééééé", 6), "ééé...");
    }
}
