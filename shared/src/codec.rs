//! Text command framing shared by both peers
//!
//! One logical message is `name<separator>arguments<terminator>`, optionally
//! preceded by an opener character. The default framing is `<name:arguments>`.
//! Several messages may arrive in a single read and a message may be split
//! across reads, so decoding is always done against an accumulating buffer.
//!
//! Terminator characters inside argument text are not escaped. A terminator
//! embedded in an argument ends the message early and the remainder of the
//! argument is decoded as if it were the next message.

use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// Name of the acknowledgement command; its argument is the acknowledged name.
pub const ACK_COMMAND: &str = "ok";

/// Secondary separator used inside compound arguments (`nick:x:y`).
pub const FIELD_SEPARATOR: char = ':';

/// Characters that delimit a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    pub opener: Option<char>,
    pub separator: char,
    pub terminator: char,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self::new(Some('<'), ':', '>')
    }
}

impl WireFormat {
    pub const fn new(opener: Option<char>, separator: char, terminator: char) -> Self {
        Self {
            opener,
            separator,
            terminator,
        }
    }

    pub fn encode(&self, command: &Command) -> String {
        let mut out = String::with_capacity(command.name.len() + command.arguments.len() + 3);
        if let Some(opener) = self.opener {
            out.push(opener);
        }
        out.push_str(&command.name);
        out.push(self.separator);
        out.push_str(&command.arguments);
        out.push(self.terminator);
        out
    }

    /// Removes the first complete command from the front of `buffer`.
    ///
    /// Returns `None` when the buffer holds no terminator, leaving any partial
    /// message in place for the next read to complete. The name runs up to the
    /// first separator, so separators may appear in the arguments.
    pub fn decode_one(&self, buffer: &mut String) -> Option<Command> {
        loop {
            let end = buffer.find(self.terminator)?;
            let frame: String = buffer.drain(..end + self.terminator.len_utf8()).collect();
            let body = &frame[..end];

            let body = match self.opener {
                Some(opener) => match body.find(opener) {
                    Some(start) => &body[start + opener.len_utf8()..],
                    None => body.trim_start(),
                },
                None => body.trim_start(),
            };

            if body.is_empty() {
                continue;
            }

            let (name, arguments) = body.split_once(self.separator).unwrap_or((body, ""));
            return Some(Command::new(name, arguments));
        }
    }
}

/// A decoded `(name, arguments)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub arguments: String,
}

impl Command {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// `ok:<name>`, sent back after a creation command has been applied.
    pub fn ack(name: &str) -> Self {
        Self::new(ACK_COMMAND, name)
    }

    /// Splits compound arguments on `:` into at most `n` parts.
    pub fn split_fields(&self, n: usize) -> Vec<&str> {
        self.arguments.splitn(n, FIELD_SEPARATOR).collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// Bytes received so far that have not been decoded yet.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    format: WireFormat,
    pending: String,
}

impl FrameBuffer {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            pending: String::new(),
        }
    }

    pub fn push(&mut self, data: &str) {
        self.pending.push_str(data);
    }

    /// A frame is complete once the last received character is the terminator.
    pub fn is_complete(&self) -> bool {
        self.pending.ends_with(self.format.terminator)
    }

    pub fn next_command(&mut self) -> Option<Command> {
        self.format.decode_one(&mut self.pending)
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Whitespace separated field reader for serialized entity bodies.
pub struct Fields<'a> {
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_whitespace(),
        }
    }

    pub fn text(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        self.tokens.next().ok_or(ParseError::MissingField(field))
    }

    pub fn parse<T: FromStr>(&mut self, field: &'static str) -> Result<T, ParseError> {
        let raw = self.text(field)?;
        raw.parse().map_err(|_| ParseError::InvalidField {
            field,
            value: raw.to_string(),
        })
    }
}

/// Parses one `:`-separated argument field.
pub fn parse_field<T: FromStr>(raw: Option<&str>, field: &'static str) -> Result<T, ParseError> {
    let raw = raw.ok_or(ParseError::MissingField(field))?.trim();
    raw.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: raw.to_string(),
    })
}
