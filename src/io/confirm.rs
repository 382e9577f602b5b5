//! Overwrite confirmation

use crate::Result;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Answers the checkpoint store's overwrite question.
///
/// The store asks once per attempt and interprets the reply itself.
pub trait ConfirmationProvider {
    /// Show `prompt` and return the raw reply
    fn confirm(&mut self, prompt: &str) -> Result<String>;
}

/// Accepted replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Parse a reply; `None` for anything outside the accepted tokens
    pub fn parse(reply: &str) -> Option<Self> {
        match reply.trim() {
            "Yes" | "y" | "yes" => Some(Self::Yes),
            "No" | "n" | "no" => Some(Self::No),
            _ => None,
        }
    }
}

/// Writes the prompt to `writer` and reads one line from `reader` per question.
///
/// End of input yields an empty reply, which the store counts as unrecognized.
#[derive(Debug)]
pub struct LineConfirmation<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineConfirmation<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> ConfirmationProvider for LineConfirmation<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<String> {
        writeln!(self.writer, "{prompt}")?;
        self.writer.flush()?;

        let mut line = String::new();
        self.reader.read_line(&mut line)?;
        Ok(line)
    }
}

/// Interactive provider for terminal runs: prompts on stdout, reads stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmation;

impl ConfirmationProvider for StdinConfirmation {
    fn confirm(&mut self, prompt: &str) -> Result<String> {
        LineConfirmation::new(std::io::stdin().lock(), std::io::stdout().lock()).confirm(prompt)
    }
}

/// Always confirms; used when the experiment disables prompting
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl ConfirmationProvider for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<String> {
        Ok("Yes".to_string())
    }
}

/// Replays a fixed list of replies, then answers with an empty string
#[derive(Debug, Default, Clone)]
pub struct ScriptedConfirmation {
    replies: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedConfirmation {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl ConfirmationProvider for ScriptedConfirmation {
    fn confirm(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.replies.pop_front().unwrap_or_default())
    }
}
