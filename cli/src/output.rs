//! Console output for operation events

use bitrelay_application::EventSink;
use bitrelay_domain::{OperationEvent, OperationEventKind, OperationResult};
use colored::Colorize;

/// How events are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored, one line per event plus a result section at the end
    Text,
    /// One JSON object per event
    Json,
}

/// Prints every operation event as it arrives
pub struct ConsoleEventPrinter {
    format: OutputFormat,
}

impl ConsoleEventPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a single event as one console line
    pub fn format_line(event: &OperationEvent) -> String {
        let time = event.timestamp.format("%H:%M:%S%.3f").to_string();
        let kind = format!("{:<21}", event.kind.as_str());
        let kind = match event.kind {
            OperationEventKind::Complete | OperationEventKind::ContributorComplete => {
                kind.green().bold()
            }
            OperationEventKind::Failed
            | OperationEventKind::NoContributorFound
            | OperationEventKind::ContributorFailed => kind.red().bold(),
            OperationEventKind::Warning | OperationEventKind::TimedOut => kind.yellow().bold(),
            _ => kind.cyan(),
        };

        let mut line = format!("{} {}", time.dimmed(), kind);
        if let Some(contributor) = &event.contributor {
            line.push_str(&format!(" [{}]", contributor.as_str().bold()));
        }
        if !event.selected.is_empty() {
            let names: Vec<_> = event.selected.iter().map(|c| c.as_str()).collect();
            line.push_str(&format!(" {}", names.join(", ")));
        }
        if let Some(code) = &event.response_code {
            line.push_str(&format!(" {}", code.to_string().red()));
        }
        if !event.info.is_empty() {
            line.push_str(&format!(" {}", event.info));
        }
        if let Some(result) = &event.result {
            line.push_str(&format!(" ({})", result.summary()));
        }
        line
    }

    /// Detailed per-contributor results of a terminal event
    pub fn format_results(event: &OperationEvent) -> String {
        let mut output = String::new();
        if event.contributor_results.is_empty() {
            return output;
        }

        output.push_str(&Self::section_header(&format!("{} results", event.operation)));
        for entry in &event.contributor_results {
            output.push_str(&format!(
                "\n{}\n",
                format!("── {} ──", entry.contributor).yellow().bold()
            ));
            match &entry.result {
                Some(result) => output.push_str(&Self::format_result(result)),
                None => output.push_str("  no result\n"),
            }
        }
        output
    }

    fn format_result(result: &OperationResult) -> String {
        let mut output = String::new();
        match result {
            OperationResult::GetFileIds { file_ids } => {
                if file_ids.is_empty() {
                    output.push_str("  (no files)\n");
                }
                for file_id in file_ids {
                    output.push_str(&format!("  * {}\n", file_id));
                }
            }
            OperationResult::GetChecksums { checksums } => {
                if checksums.is_empty() {
                    output.push_str("  (no files)\n");
                }
                for entry in checksums {
                    output.push_str(&format!(
                        "  {} {} {}\n",
                        entry.checksum.value,
                        entry.checksum.algorithm.to_string().dimmed(),
                        entry.file_id
                    ));
                }
            }
            OperationResult::GetAuditTrails { events } => {
                if events.is_empty() {
                    output.push_str("  (no audit events)\n");
                }
                for audit in events {
                    output.push_str(&format!(
                        "  #{:<4} {} {:<13} {} by {}\n",
                        audit.sequence_number,
                        audit.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        audit.action,
                        audit.file_id.as_deref().unwrap_or("-"),
                        audit.actor
                    ));
                }
            }
            other => output.push_str(&format!("  {}\n", other.summary())),
        }
        output
    }

    fn section_header(title: &str) -> String {
        format!(
            "\n{}\n{}\n",
            title.cyan().bold(),
            "─".repeat(title.chars().count()).cyan()
        )
    }
}

impl EventSink for ConsoleEventPrinter {
    fn handle_event(&self, event: OperationEvent) {
        match self.format {
            OutputFormat::Json => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize event: {}", e),
            },
            OutputFormat::Text => {
                println!("{}", Self::format_line(&event));
                if event.is_terminal() {
                    print!("{}", Self::format_results(&event));
                }
            }
        }
    }
}
