//! Output formatting for the CLI
//!
//! Every command result renders either as pretty JSON (machine-readable, on
//! stdout) or as human-readable text. Logs never go through here.

use anyhow::{Context, Result};
use serde_json::json;

use crate::advisory::Advice;
use crate::config::TracepackConfig;
use crate::context::ContextDigest;
use crate::error::PipelineError;
use crate::pipeline::{Application, LifecycleState};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Longest diagnostics excerpt shown in human output
const DIAGNOSTICS_PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        text.to_string()
    } else {
        let tail: String = text.chars().skip(count - max).collect();
        format!("... (truncated)\n{}", tail)
    }
}

fn state_marker(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Failed => "\u{2717}",
        LifecycleState::Running => "\u{25B6}",
        _ => "\u{2713}",
    }
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn format_application(&self, app: &Application) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(app).context("Failed to serialize application to JSON")
            }
            OutputFormat::Human => Ok(self.application_human(app)),
        }
    }

    pub fn format_applications(&self, apps: &[Application]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(apps)
                .context("Failed to serialize application list to JSON"),
            OutputFormat::Human => {
                if apps.is_empty() {
                    return Ok("No applications\n".to_string());
                }
                let mut output = format!("{:<38} {:<18} {:<8} {}\n", "ID", "STATE", "LANGUAGE", "SOURCE");
                for app in apps {
                    let language = app.language.map(|l| l.as_str()).unwrap_or("-");
                    output.push_str(&format!(
                        "{:<38} {:<18} {:<8} {}\n",
                        app.id.to_string(),
                        app.state.as_str(),
                        language,
                        app.source
                    ));
                }
                Ok(output)
            }
        }
    }

    pub fn format_digest(&self, digest: &ContextDigest) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(digest).context("Failed to serialize digest to JSON")
            }
            OutputFormat::Human => {
                let mut output = digest.render();
                if !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str(&format!(
                    "\n{}\n{} chars, {} bytes read from {} files\n",
                    RULE, digest.chars_used, digest.bytes_read, digest.files_read
                ));
                Ok(output)
            }
        }
    }

    pub fn format_advice(&self, advice: &Advice) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(advice).context("Failed to serialize advice to JSON")
            }
            OutputFormat::Human => {
                let mut output = format!("Observability suggestions ({})\n{}\n\n", advice.model, RULE);
                output.push_str(advice.text.trim_end());
                output.push_str(&format!(
                    "\n\n{}\nBased on {} files ({} chars of context)\n",
                    RULE, advice.files_read, advice.digest_chars
                ));
                Ok(output)
            }
        }
    }

    pub fn format_removed(&self, id: &str) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json!({ "removed": id }))
                .context("Failed to serialize removal to JSON"),
            OutputFormat::Human => Ok(format!("Removed {}\n", id)),
        }
    }

    pub fn format_config(&self, config: &TracepackConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config.to_display_map())
                .context("Failed to serialize config to JSON"),
            OutputFormat::Human => Ok(format!("{}\n", config)),
        }
    }

    /// Renders a pipeline error together with its stable kind
    pub fn format_error(&self, err: &PipelineError) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let output = json!({
                    "error": {
                        "kind": err.kind(),
                        "message": err.to_string(),
                        "diagnostics": err.diagnostics(),
                    }
                });
                serde_json::to_string_pretty(&output).context("Failed to serialize error to JSON")
            }
            OutputFormat::Human => {
                let mut output = format!("\u{2717} {} [{}]\n", err, err.kind());
                if let Some(diagnostics) = err.diagnostics() {
                    output.push_str("\nDiagnostics:\n");
                    output.push_str(&tail_chars(&diagnostics, DIAGNOSTICS_PREVIEW_CHARS));
                    output.push('\n');
                }
                Ok(output)
            }
        }
    }

    fn application_human(&self, app: &Application) -> String {
        let mut output = format!("{} Application {}\n{}\n\n", state_marker(app.state), app.id, RULE);

        output.push_str(&format!("State:      {}\n", app.state));
        if let Some(language) = app.language {
            output.push_str(&format!("Language:   {}\n", language));
        }
        output.push_str(&format!("Source:     {}\n", app.source));
        if let Some(branch) = &app.branch {
            output.push_str(&format!("Branch:     {}\n", branch));
        }
        output.push_str(&format!("Workspace:  {}\n", app.workspace.display()));
        output.push_str(&format!("Updated:    {}\n", app.updated_at.to_rfc3339()));

        if let Some(artifacts) = &app.artifacts {
            output.push_str("\nContainer:\n");
            output.push_str(&format!("\u{251C}\u{2500} Service:     {}\n", artifacts.service_name));
            output.push_str(&format!(
                "\u{251C}\u{2500} Dockerfile:  {}\n",
                artifacts.dockerfile.display()
            ));
            output.push_str(&format!(
                "\u{2514}\u{2500} Compose:     {}\n",
                artifacts.compose_file.display()
            ));
        }

        if let Some(failure) = &app.failure {
            output.push_str("\nFailure:\n");
            output.push_str(&format!("\u{251C}\u{2500} Stage:            {}\n", failure.stage));
            output.push_str(&format!("\u{251C}\u{2500} Kind:             {}\n", failure.kind));
            output.push_str(&format!(
                "\u{251C}\u{2500} Last successful:  {}\n",
                failure.last_successful
            ));
            output.push_str(&format!("\u{2514}\u{2500} Message:          {}\n", failure.message));
            if let Some(diagnostics) = &failure.diagnostics {
                output.push_str("\nDiagnostics:\n");
                output.push_str(&tail_chars(diagnostics, DIAGNOSTICS_PREVIEW_CHARS));
                output.push('\n');
            }
        }

        output
    }
}
