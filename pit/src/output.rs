//! Output formatting for CLI commands.
//!
//! Every command reports through [`OutputWriter`], which prints either the
//! human-readable text or a JSON document built from one of the DTOs below.

use anyhow::Result;
use pit_core::{EntryType, Hash, RefValue, Tree};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write output using the configured format.
    ///
    /// `data` must carry `success` and `result_code` fields. `text_fn` only
    /// runs in text mode.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Report a failure on stderr, as a JSON object in JSON mode.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init`.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub algorithm: String,
}

/// Output for `status`.
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub success: bool,
    pub result_code: u8,
    pub tree: Hash,
    pub head: Option<Hash>,
    pub clean: bool,
}

/// Output for `record`.
#[derive(Debug, Serialize)]
pub struct RecordOutput {
    pub success: bool,
    pub result_code: u8,
    pub tree: Hash,
}

/// Output for commands that report a single digest (`put`, `hash`, `delete`).
#[derive(Debug, Serialize)]
pub struct HashOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
}

/// Output for `get` in JSON mode.
#[derive(Debug, Serialize)]
pub struct GetOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
    pub size: usize,
    /// Contents, with invalid UTF-8 replaced.
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntryInfo {
    pub name: String,
    pub entry_type: String,
    pub hash: Hash,
}

/// Output for `ls`.
#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
    pub entries: Vec<TreeEntryInfo>,
}

impl LsOutput {
    pub fn new(hash: Hash, tree: &Tree) -> Self {
        Self {
            success: true,
            result_code: 0,
            hash,
            entries: tree
                .entries()
                .iter()
                .map(|entry| TreeEntryInfo {
                    name: entry.name.clone(),
                    entry_type: entry.entry_type.to_string(),
                    hash: entry.hash,
                })
                .collect(),
        }
    }

    /// One `type digest name` line per entry, directories marked with `/`.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            let suffix = if entry.entry_type == EntryType::Tree.as_str() {
                "/"
            } else {
                ""
            };
            text.push_str(&format!(
                "{} {} {}{}\n",
                entry.entry_type, entry.hash, entry.name, suffix
            ));
        }
        text
    }
}

/// A ref and its stored value.
#[derive(Debug, Clone, Serialize)]
pub struct RefInfo {
    pub path: String,
    /// Raw value: a digest or `ref: <target>`.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl RefInfo {
    pub fn new(path: impl Into<String>, value: &RefValue) -> Self {
        let (hash, target) = match value {
            RefValue::Direct(hash) => (Some(*hash), None),
            RefValue::Symbolic(target) => (None, Some(target.clone())),
        };
        Self {
            path: path.into(),
            value: value.to_string(),
            hash,
            target,
        }
    }
}

/// Output for `ref set` and `ref symbolic`.
#[derive(Debug, Serialize)]
pub struct RefSetOutput {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub reference: RefInfo,
}

/// Output for `ref get`.
#[derive(Debug, Serialize)]
pub struct RefGetOutput {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub reference: RefInfo,
}

/// Output for `ref resolve`.
#[derive(Debug, Serialize)]
pub struct RefResolveOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
    pub hash: Hash,
}

/// Output for `ref list`.
#[derive(Debug, Serialize)]
pub struct RefListOutput {
    pub success: bool,
    pub result_code: u8,
    pub refs: Vec<RefInfo>,
}

/// Output for `ref rm`.
#[derive(Debug, Serialize)]
pub struct RefRmOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
}
