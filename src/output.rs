use std::io::{self, Write};

use crate::app::CatSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct SummaryOutput;

impl SummaryOutput {
    pub fn print(summary: &CatSummary, mode: OutputMode) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        Self::write(&mut stderr, summary, mode)
    }

    pub fn write<W: Write>(
        writer: &mut W,
        summary: &CatSummary,
        mode: OutputMode,
    ) -> io::Result<()> {
        match mode {
            OutputMode::Text => writeln!(writer, "{}", Self::text_line(summary)),
            OutputMode::Json => {
                let json = serde_json::to_string(summary).map_err(io::Error::other)?;
                writeln!(writer, "{json}")
            }
        }
    }

    pub fn text_line(summary: &CatSummary) -> String {
        format!(
            "urlcat: {} bytes transferred in {:?}",
            summary.bytes, summary.elapsed
        )
    }
}
