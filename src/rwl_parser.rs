use regex::Regex;

use crate::models::{RwlContent, RwlSegment};

/// Seconds given to the last segment, which has no successor to measure against.
pub const LAST_SEGMENT_SECONDS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum RwlParseError {
    #[error("Transcript is empty")]
    EmptyContent,

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid timestamp pattern: {0}")]
    Pattern(#[from] regex::Error),
}

const SAMPLE_TRANSCRIPT: &str = r#"The Apple Tree
[00:00:00] Once upon a time, there was a big apple tree.
[00:00:05] A little boy loved to come and play around it every day.
[00:00:10] He climbed to the tree top, ate the apples, and took a nap under the shadow.
[00:00:15] The boy loved the tree and the tree loved to play with him.
[00:00:20] Time went by, and the boy grew older.
[00:00:25] Now he no longer played around the tree every day.
[00:00:30] One day, the boy came back to the tree and looked sad.
[00:00:35] "Come and play with me," the tree asked.
[00:00:40] "I am no longer a kid, I don't play around trees anymore," the boy replied.
[00:00:45] "I want toys. I need money to buy them."
[00:00:50] "Sorry, but I don't have money," said the tree.
[00:00:55] "But you can pick all my apples and sell them. So, you will have money."
[00:01:00] The boy was so excited. He grabbed all the apples and left happily."#;

/// Parser for read-while-listening transcripts:
///
/// ```text
/// Title
/// [HH:MM:SS] first segment
/// continuation of the first segment
/// [HH:MM:SS] second segment
/// ```
#[derive(Debug, Clone)]
pub struct RwlParser {
    timestamp: Regex,
}

impl RwlParser {
    pub fn new() -> Result<Self, RwlParseError> {
        Ok(Self {
            timestamp: Regex::new(r"\[(\d+):(\d+):(\d+)\]")?,
        })
    }

    pub fn parse(&self, raw: &str) -> Result<RwlContent, RwlParseError> {
        let mut lines = raw.trim().lines().map(str::trim);
        let title = match lines.next() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => return Err(RwlParseError::EmptyContent),
        };

        let mut segments: Vec<RwlSegment> = Vec::new();

        for line in lines {
            if line.starts_with('[') && line.contains(']') {
                // Bracketed lines that are not timestamps are dropped.
                if let Some(captures) = self.timestamp.captures(line) {
                    let timestamp = to_seconds(&captures[1], &captures[2], &captures[3])
                        .ok_or_else(|| RwlParseError::InvalidTimestamp(captures[0].to_string()))?;
                    let end = captures.get(0).map_or(0, |m| m.end());
                    let text = line[end..].trim().to_string();

                    segments.push(RwlSegment {
                        id: format!("segment-{}", segments.len() + 1),
                        timestamp,
                        text,
                        duration: 0,
                    });
                }
            } else if !line.is_empty() {
                if let Some(current) = segments.last_mut() {
                    current.text.push(' ');
                    current.text.push_str(line);
                }
            }
        }

        for i in 1..segments.len() {
            segments[i - 1].duration = segments[i].timestamp.saturating_sub(segments[i - 1].timestamp);
        }
        if let Some(last) = segments.last_mut() {
            last.duration = LAST_SEGMENT_SECONDS;
        }

        let total_duration = match segments.last() {
            Some(last) => last
                .timestamp
                .checked_add(last.duration)
                .ok_or_else(|| RwlParseError::InvalidTimestamp(format!("segment-{}", segments.len())))?,
            None => 0,
        };

        Ok(RwlContent {
            title,
            segments,
            total_duration,
        })
    }

    pub fn sample_content(&self) -> Result<RwlContent, RwlParseError> {
        self.parse(SAMPLE_TRANSCRIPT)
    }
}

// `None` when a part does not fit or the total overflows.
fn to_seconds(hours: &str, minutes: &str, seconds: &str) -> Option<u64> {
    let hours = hours.parse::<u64>().ok()?;
    let minutes = minutes.parse::<u64>().ok()?;
    let seconds = seconds.parse::<u64>().ok()?;

    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments_and_durations() {
        let parser = RwlParser::new().unwrap();
        let raw = "Morning\n[00:00:00] Wake up.\n[00:00:04] Brush your teeth.\n[00:01:00] Eat breakfast.";

        let content = parser.parse(raw).unwrap();
        assert_eq!(content.title, "Morning");
        assert_eq!(content.segments.len(), 3);
        assert_eq!(content.segments[0].id, "segment-1");
        assert_eq!(content.segments[0].duration, 4);
        assert_eq!(content.segments[1].duration, 56);
        assert_eq!(content.segments[2].timestamp, 60);
        assert_eq!(content.segments[2].duration, LAST_SEGMENT_SECONDS);
        assert_eq!(content.total_duration, 65);
    }

    #[test]
    fn test_continuation_lines_and_junk_brackets() {
        let parser = RwlParser::new().unwrap();
        let raw = "Story\n[00:00:01] The cat\nsat on the mat.\n[note] ignored\n\n[01:00:00] The end.";

        let content = parser.parse(raw).unwrap();
        assert_eq!(content.segments.len(), 2);
        assert_eq!(content.segments[0].text, "The cat sat on the mat.");
        assert_eq!(content.segments[1].timestamp, 3600);
        assert_eq!(content.segments[1].id, "segment-2");
    }

    #[test]
    fn test_title_only() {
        let parser = RwlParser::new().unwrap();
        let content = parser.parse("Just a title\nno timestamps here").unwrap();

        assert_eq!(content.title, "Just a title");
        assert!(content.segments.is_empty());
        assert_eq!(content.total_duration, 0);
    }

    #[test]
    fn test_timestamp_inside_bracket_line() {
        let parser = RwlParser::new().unwrap();
        let content = parser.parse("Song\n[chorus] [00:00:07] la la\n[00:00:09] la").unwrap();

        assert_eq!(content.segments.len(), 2);
        assert_eq!(content.segments[0].timestamp, 7);
        assert_eq!(content.segments[0].text, "la la");
        assert_eq!(content.segments[0].duration, 2);
    }

    #[test]
    fn test_oversized_timestamps_rejected() {
        let parser = RwlParser::new().unwrap();

        let overflowing = parser.parse("T\n[9999999999999999999:00:00] hi");
        assert!(matches!(overflowing, Err(RwlParseError::InvalidTimestamp(_))));

        let unparsable = parser.parse("T\n[99999999999999999999999:00:00] hi");
        assert!(matches!(unparsable, Err(RwlParseError::InvalidTimestamp(_))));

        let near_limit = parser.parse("T\n[5124095576030431:00:15] hi");
        assert!(matches!(near_limit, Err(RwlParseError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_empty_transcript() {
        let parser = RwlParser::new().unwrap();
        assert!(matches!(parser.parse("   \n  "), Err(RwlParseError::EmptyContent)));
    }

    #[test]
    fn test_sample_content() {
        let parser = RwlParser::new().unwrap();
        let content = parser.sample_content().unwrap();

        assert_eq!(content.title, "The Apple Tree");
        assert_eq!(content.segments.len(), 13);
        assert_eq!(content.total_duration, 65);
        assert!(content.segments.iter().take(12).all(|s| s.duration == 5));
    }
}
