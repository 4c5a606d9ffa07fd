use std::io::{self, Write};

use serde::Serialize;

use crate::domain::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
        let rule = "=".repeat(60);
        writeln!(out, "{rule}")?;
        writeln!(out, "Fetch summary:")?;
        writeln!(out, "  Successful: {}", summary.fetched)?;
        writeln!(out, "  Skipped: {}", summary.skipped)?;
        writeln!(out, "  Failed: {}", summary.failed)?;
        writeln!(out, "  Total: {}", summary.total)?;
        if summary.interrupted {
            let unattempted = summary.candidates.saturating_sub(summary.total);
            writeln!(out, "  Interrupted, not attempted: {unattempted}")?;
        }
        writeln!(out, "{rule}")?;
        Ok(())
    }
}

pub fn print_summary(mode: OutputMode, summary: &RunSummary) -> io::Result<()> {
    match mode {
        OutputMode::Text => TextOutput::print_summary(summary),
        OutputMode::Json => JsonOutput::print_summary(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_summary_lists_counts() {
        let summary = RunSummary {
            candidates: 5,
            fetched: 2,
            skipped: 1,
            failed: 1,
            total: 4,
            interrupted: true,
        };
        let mut buffer = Vec::new();
        TextOutput::write_summary(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Successful: 2"));
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("Total: 4"));
        assert!(text.contains("not attempted: 1"));
    }

    #[test]
    fn summary_serializes_as_json() {
        let summary = RunSummary {
            candidates: 1,
            fetched: 1,
            total: 1,
            ..RunSummary::default()
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["fetched"], 1);
        assert_eq!(value["interrupted"], false);
    }
}
