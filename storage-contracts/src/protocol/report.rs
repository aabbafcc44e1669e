// SPDX-License-Identifier: GPL-3.0-only

//! Hierarchical, human-readable record of what a run did
//!
//! Every operation gets a child of the root report and every job a child of its
//! operation. Backends and tools append lines to whichever node they are handed.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub command: String,
    pub status: String,
    pub output: Vec<String>,
    pub children: Vec<Report>,
}

impl Report {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Append a child node and hand it back for writing
    pub fn child(&mut self, command: impl Into<String>) -> &mut Report {
        self.children.push(Report::new(command));
        let index = self.children.len() - 1;
        &mut self.children[index]
    }

    pub fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(command = %self.command, "{text}");
        self.output.push(text);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Every output line in this subtree, depth first
    pub fn all_lines(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.output.iter().map(String::as_str).collect();
        for child in &self.children {
            lines.extend(child.all_lines());
        }
        lines
    }

    pub fn contains_line(&self, needle: &str) -> bool {
        self.all_lines().iter().any(|l| l.contains(needle))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        if !self.command.is_empty() {
            if self.status.is_empty() {
                writeln!(f, "{pad}{}", self.command)?;
            } else {
                writeln!(f, "{pad}{} [{}]", self.command, self.status)?;
            }
        }
        for line in &self.output {
            writeln!(f, "{pad}  {line}")?;
        }
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
