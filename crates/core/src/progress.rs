// crates/core/src/progress.rs
//! Incremental parser for download-worker output.
//!
//! The worker writes free text to stdout. Output arrives in arbitrary chunks
//! that need not be line- or even UTF-8-aligned, so the parser buffers bytes
//! and only inspects complete lines (terminated by `\n` or `\r`).
//!
//! Recognised markers, matched anywhere in a line:
//!
//! | marker             | example                                          | effect                 |
//! |--------------------|--------------------------------------------------|------------------------|
//! | percentage         | `[download]  12.5% of 9.8MiB at 1.2MiB/s`        | `ParsedEvent::Progress` |
//! | destination        | `[download] Destination: /d/abc_x.f137.mp4`      | output path guess      |
//! | already downloaded | `[download] /d/abc_x.mp4 has already been downloaded` | output path guess |
//! | merger             | `[Merger] Merging formats into "/d/abc_x.mp4"`   | output path guess      |
//!
//! Any other line is ignored. The latest path marker wins, so a merge step
//! supersedes the raw per-stream destination.
//!
//! Percentages are de-duplicated with exact float equality against the last
//! emitted value. Near-equal values that differ only by upstream rounding are
//! still emitted; that is a known imprecision, tunable here if it ever matters.

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Longest unterminated line kept between chunks. Worker lines are short;
/// anything past this is junk and is dropped rather than buffered.
pub const MAX_PENDING_LINE: usize = 64 * 1024;

struct Markers {
    percent: Regex,
    destination: Regex,
    already_downloaded: Regex,
    merger: Regex,
}

fn markers() -> &'static Markers {
    static MARKERS: OnceLock<Markers> = OnceLock::new();
    MARKERS.get_or_init(|| Markers {
        percent: Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap(),
        destination: Regex::new(r"\[download\] Destination: (.+)").unwrap(),
        already_downloaded: Regex::new(r"\[download\] (.+) has already been downloaded").unwrap(),
        merger: Regex::new(r#"\[Merger\] Merging formats into "(.+)""#).unwrap(),
    })
}

/// Something the parser recognised in the worker output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// New download percentage, clamped to 0–100.
    Progress(f64),
    /// A marker named the file the worker is writing.
    OutputPath(PathBuf),
}

/// Per-job parser state: the unterminated tail of the last chunk, the last
/// emitted percentage, and the best guess at the output path.
#[derive(Debug, Default)]
pub struct OutputParser {
    pending: Vec<u8>,
    last_percent: f64,
    output_path: Option<PathBuf>,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of raw stdout and return what it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParsedEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]);
            self.parse_line(&text, &mut events);
        }
        if self.pending.len() > MAX_PENDING_LINE {
            tracing::debug!(
                discarded = self.pending.len(),
                "worker output line too long, discarding"
            );
            self.pending.clear();
        }
        events
    }

    /// Parse whatever is left after the stream closed without a final newline.
    pub fn finish(&mut self) -> Vec<ParsedEvent> {
        let rest = std::mem::take(&mut self.pending);
        let mut events = Vec::new();
        if !rest.is_empty() {
            let text = String::from_utf8_lossy(&rest);
            self.parse_line(&text, &mut events);
        }
        events
    }

    /// Most recently announced output file, if any.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn last_percent(&self) -> f64 {
        self.last_percent
    }

    fn parse_line(&mut self, line: &str, events: &mut Vec<ParsedEvent>) {
        if line.trim().is_empty() {
            return;
        }
        let markers = markers();

        if let Some(caps) = markers.percent.captures(line) {
            if let Ok(value) = caps[1].parse::<f64>() {
                let value = value.clamp(0.0, 100.0);
                if value != self.last_percent {
                    self.last_percent = value;
                    events.push(ParsedEvent::Progress(value));
                }
            }
        }

        let path = markers
            .merger
            .captures(line)
            .or_else(|| markers.destination.captures(line))
            .or_else(|| markers.already_downloaded.captures(line))
            .map(|caps| PathBuf::from(caps[1].trim()));
        if let Some(path) = path {
            self.output_path = Some(path.clone());
            events.push(ParsedEvent::OutputPath(path));
        }
    }
}
