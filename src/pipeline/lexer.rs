//! Frame lexer: splits the device byte stream into lines and keeps only packet text.
//!
//! Classification runs an ordered rule table over each complete line. The
//! first rule that classifies the line wins; prefix rules may rewrite the
//! line before later rules see it.

use crate::config::LexerSettings;

/// Classification of one complete device line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass<'a> {
    /// Diagnostic chatter or a blank line
    Noise,
    /// Structured packet text, trimmed
    Packet(&'a str),
    /// Anything else
    Garbage,
}

/// One entry of the classification table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Blank lines are noise
    Blank,
    /// Lines containing this substring are noise
    NoiseSubstring(String),
    /// Strip everything through this marker and keep classifying the remainder
    PrefixMarker(String),
    /// Lines opening a JSON object are packets
    ObjectStart,
}

enum Step<'a> {
    Classify(LineClass<'a>),
    Continue(&'a str),
}

impl Rule {
    fn apply<'a>(&self, line: &'a str) -> Step<'a> {
        match self {
            Rule::Blank if line.trim().is_empty() => Step::Classify(LineClass::Noise),
            Rule::NoiseSubstring(pattern) if line.contains(pattern.as_str()) => {
                Step::Classify(LineClass::Noise)
            }
            Rule::PrefixMarker(marker) => match line.find(marker.as_str()) {
                Some(idx) => Step::Continue(&line[idx + marker.len()..]),
                None => Step::Continue(line),
            },
            Rule::ObjectStart if line.trim_start().starts_with('{') => {
                Step::Classify(LineClass::Packet(line.trim()))
            }
            _ => Step::Continue(line),
        }
    }
}

/// Build the rule table in evaluation order.
pub fn rules_from_settings(settings: &LexerSettings) -> Vec<Rule> {
    let mut rules = vec![Rule::Blank];
    rules.extend(
        settings
            .noise_patterns
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .map(Rule::NoiseSubstring),
    );
    rules.extend(
        settings
            .prefix_markers
            .iter()
            .filter(|m| !m.is_empty())
            .cloned()
            .map(Rule::PrefixMarker),
    );
    rules.push(Rule::ObjectStart);
    rules
}

/// Lexer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerStats {
    pub lines: u64,
    pub noise_lines: u64,
    pub garbage_lines: u64,
    pub packets: u64,
}

/// Line splitter and classifier with a partial-line buffer.
pub struct FrameLexer {
    rules: Vec<Rule>,
    max_line_len: usize,
    buffer: Vec<u8>,
    /// Bytes at the front of `buffer` already split off
    consumed: usize,
    /// Skipping the tail of an overlong line until its terminator
    discarding: bool,
    stats: LexerStats,
}

impl FrameLexer {
    pub fn new(settings: &LexerSettings) -> Self {
        Self {
            rules: rules_from_settings(settings),
            max_line_len: settings.max_line_len,
            buffer: Vec::with_capacity(1024),
            consumed: 0,
            discarding: false,
            stats: LexerStats::default(),
        }
    }

    /// Classify one complete line against the rule table.
    pub fn classify<'a>(&self, line: &'a str) -> LineClass<'a> {
        let mut current = line;
        for rule in &self.rules {
            match rule.apply(current) {
                Step::Classify(class) => return class,
                Step::Continue(rest) => current = rest,
            }
        }
        LineClass::Garbage
    }

    /// Append raw bytes from the device.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Next packet text from the buffered bytes, or `None` until more bytes arrive.
    pub fn next_packet(&mut self) -> Option<String> {
        loop {
            let start = self.consumed;
            let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') else {
                self.check_overlong();
                return None;
            };
            self.consumed = start + pos + 1;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            self.stats.lines += 1;
            if pos > self.max_line_len {
                self.stats.garbage_lines += 1;
                tracing::debug!("Dropping overlong line ({} bytes)", pos);
                continue;
            }

            let text = String::from_utf8_lossy(&self.buffer[start..start + pos]).into_owned();
            let line = text.trim_end_matches('\r');

            match self.classify(line) {
                LineClass::Noise => {
                    self.stats.noise_lines += 1;
                    tracing::trace!("Device log: {}", line);
                }
                LineClass::Garbage => {
                    self.stats.garbage_lines += 1;
                    tracing::debug!("Unrecognised device line: {:?}", line);
                }
                LineClass::Packet(packet) => {
                    self.stats.packets += 1;
                    return Some(packet.to_string());
                }
            }
        }
    }

    /// Iterate over the packets currently available in the buffer.
    pub fn packets(&mut self) -> Packets<'_> {
        Packets { lexer: self }
    }

    pub fn stats(&self) -> LexerStats {
        self.stats
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    fn check_overlong(&mut self) {
        if self.pending_len() > self.max_line_len {
            if !self.discarding {
                self.stats.lines += 1;
                self.stats.garbage_lines += 1;
                tracing::debug!("Discarding unterminated line over {} bytes", self.max_line_len);
            }
            self.discarding = true;
            self.consumed = self.buffer.len();
        }
    }
}

/// Iterator returned by [`FrameLexer::packets`].
pub struct Packets<'a> {
    lexer: &'a mut FrameLexer,
}

impl Iterator for Packets<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.lexer.next_packet()
    }
}
