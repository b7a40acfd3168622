//! Output formatting for CLI commands.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, XiphosArgs};
use crate::error::Result;
use crate::search::Explanation;

/// Result of packing a compound file.
#[derive(Debug, Serialize, Deserialize)]
pub struct PackResult {
    pub path: String,
    pub files_packed: usize,
    pub files_skipped: usize,
    pub size_bytes: u64,
}

/// One entry of a compound file.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompoundEntry {
    pub name: String,
    pub length: u64,
}

/// Listing of a compound file.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompoundListing {
    pub path: String,
    pub entries: Vec<CompoundEntry>,
}

/// Result of unpacking a compound file.
#[derive(Debug, Serialize, Deserialize)]
pub struct UnpackResult {
    pub path: String,
    pub directory: String,
    pub files_written: usize,
    pub files_skipped: usize,
}

/// Result of mapping text.
#[derive(Debug, Serialize, Deserialize)]
pub struct MapResult {
    pub input: String,
    pub output: String,
    pub replacements: usize,
}

/// One search hit with its stored fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHitOutput {
    pub doc: u32,
    pub score: f32,
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

/// Result of a search.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub total_hits: usize,
    pub max_score: f32,
    pub duration_ms: u64,
    pub hits: Vec<SearchHitOutput>,
}

/// Human readable rendering of a command result.
pub trait HumanOutput {
    /// Render the result for a terminal.
    fn to_human(&self) -> String;
}

impl HumanOutput for PackResult {
    fn to_human(&self) -> String {
        let mut out = format!(
            "Packed {} files into {} ({})\n",
            self.files_packed,
            self.path,
            format_bytes(self.size_bytes)
        );
        if self.files_skipped > 0 {
            let _ = writeln!(out, "Skipped {} files", self.files_skipped);
        }
        out
    }
}

impl HumanOutput for CompoundListing {
    fn to_human(&self) -> String {
        let mut out = format!("{} ({} entries)\n", self.path, self.entries.len());
        let width = self.entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "  {:<width$}  {}",
                entry.name,
                format_bytes(entry.length)
            );
        }
        out
    }
}

impl HumanOutput for UnpackResult {
    fn to_human(&self) -> String {
        let mut out = format!(
            "Unpacked {} files from {} into {}\n",
            self.files_written, self.path, self.directory
        );
        if self.files_skipped > 0 {
            let _ = writeln!(out, "Skipped {} files", self.files_skipped);
        }
        out
    }
}

impl HumanOutput for MapResult {
    fn to_human(&self) -> String {
        format!("{}\n", self.output)
    }
}

impl HumanOutput for SearchOutput {
    fn to_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Search Results for {}:", self.query);
        let _ = writeln!(out, "═══════════════");
        for (i, hit) in self.hits.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Result {} (doc {}, score {:.3})", i + 1, hit.doc, hit.score);
            let _ = writeln!(out, "─────────────");
            for (name, value) in &hit.fields {
                let _ = writeln!(out, "{name}: {value}");
            }
            if let Some(explanation) = &hit.explanation {
                let _ = writeln!(out);
                out.push_str(&explanation.to_s());
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Total hits: {}", self.total_hits);
        let _ = writeln!(out, "Search time: {}ms", self.duration_ms);
        out
    }
}

/// Output a result in the format selected on the command line.
pub fn output_result<T: Serialize + HumanOutput>(result: &T, args: &XiphosArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            print!("{}", result.to_human());
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &XiphosArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
