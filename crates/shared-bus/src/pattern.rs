//! Topic-exchange binding patterns.
//!
//! Routing keys and patterns are dot-separated words. In a pattern `*`
//! matches exactly one word and `#` matches zero or more words.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Word(String),
    One,
    Many,
}

/// A parsed binding pattern such as `post.*` or `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutingPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = if pattern.is_empty() {
            Vec::new()
        } else {
            pattern
                .split('.')
                .map(|word| match word {
                    "*" => Segment::One,
                    "#" => Segment::Many,
                    other => Segment::Word(other.to_string()),
                })
                .collect()
        };
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether a routing key matches this pattern.
    pub fn matches(&self, routing_key: &str) -> bool {
        let words: Vec<&str> = if routing_key.is_empty() {
            Vec::new()
        } else {
            routing_key.split('.').collect()
        };
        match_segments(&self.segments, &words)
    }
}

fn match_segments(segments: &[Segment], words: &[&str]) -> bool {
    match segments.split_first() {
        None => words.is_empty(),
        Some((Segment::Many, rest)) => {
            (0..=words.len()).any(|skip| match_segments(rest, &words[skip..]))
        }
        Some((Segment::One, rest)) => !words.is_empty() && match_segments(rest, &words[1..]),
        Some((Segment::Word(expected), rest)) => words
            .split_first()
            .is_some_and(|(word, tail)| word == expected && match_segments(rest, tail)),
    }
}

impl fmt::Display for RoutingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for RoutingPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}
