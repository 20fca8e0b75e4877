use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::FormatError;

static TIMING_REGEX: OnceLock<Regex> = OnceLock::new();

fn timing_regex() -> &'static Regex {
    TIMING_REGEX.get_or_init(|| {
        Regex::new(
            r"^(\d{1,3}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,3}):(\d{2}):(\d{2})[,.](\d{3})(?:\s+.*)?$",
        )
        .expect("timing regex is valid")
    })
}

/// offset from the start of the media, millisecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOffset(u64);

impl TimeOffset {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_parts(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<Self> {
        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return None;
        }
        Some(Self(
            hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis,
        ))
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3_600_000;
        let minutes = (self.0 % 3_600_000) / 60_000;
        let seconds = (self.0 % 60_000) / 1_000;
        let millis = self.0 % 1_000;
        write!(f, "{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

/// one timed caption as it appears in the subtitle file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub index: u32,
    pub start: TimeOffset,
    pub end: TimeOffset,
    pub text: String,
}

impl CaptionRecord {
    /// same index and timing, different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            index: self.index,
            start: self.start,
            end: self.end,
            text: text.into(),
        }
    }
}

/// decodes uploaded bytes, replacing invalid UTF-8 instead of failing
pub fn decode_lossy(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

/// parses SRT text into caption records in display order
pub fn parse(text: &str) -> Result<Vec<CaptionRecord>, FormatError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    if blocks.is_empty() {
        return Err(FormatError::Empty);
    }

    blocks
        .iter()
        .enumerate()
        .map(|(i, lines)| parse_block(i + 1, lines))
        .collect()
}

fn parse_block(block: usize, lines: &[&str]) -> Result<CaptionRecord, FormatError> {
    let index_line = lines[0];
    let index = index_line
        .parse::<u32>()
        .map_err(|_| FormatError::InvalidIndex {
            block,
            value: index_line.to_string(),
        })?;

    let timing_line = match lines.get(1) {
        Some(line) if line.contains("-->") => *line,
        _ => return Err(FormatError::MissingTiming { block }),
    };
    let (start, end) = parse_timing(timing_line).ok_or_else(|| FormatError::MalformedTimestamp {
        block,
        value: timing_line.to_string(),
    })?;

    Ok(CaptionRecord {
        index,
        start,
        end,
        text: lines[2..].join("\n"),
    })
}

fn parse_timing(line: &str) -> Option<(TimeOffset, TimeOffset)> {
    let caps = timing_regex().captures(line)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let start = TimeOffset::from_parts(num(1)?, num(2)?, num(3)?, num(4)?)?;
    let end = TimeOffset::from_parts(num(5)?, num(6)?, num(7)?, num(8)?)?;
    Some((start, end))
}

/// renders records as SRT, keeping each record's own index
pub fn compose(records: &[CaptionRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            record.index, record.start, record.end, record.text
        ));
    }
    out
}
