//! The packed-artifact writer: textual concatenation of the planned
//! files behind a generated preamble.
//!
//! The engine already decided order and which include statements it
//! resolved; this side strips PHP tags, comments out those includes so
//! nothing double-loads, and applies the optional comment/whitespace
//! optimizations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;

use phpack_core::{ArtifactEmitter, LoadPlan, OptimizationSection, PlannedFile};

pub struct TextEmitter {
    output: PathBuf,
    optimization: OptimizationSection,
    runtime: BTreeMap<String, Value>,
}

impl TextEmitter {
    pub fn new(
        output: PathBuf,
        optimization: OptimizationSection,
        runtime: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            output,
            optimization,
            runtime,
        }
    }

    fn preamble(&self) -> String {
        let mut out = String::from("#!/usr/bin/env php\n<?php\n");
        out.push_str("// Generated by phpack; do not edit.\n");
        for (key, value) in &self.runtime {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!(
                "ini_set({}, {});\n",
                php_quote(key),
                php_quote(&rendered)
            ));
        }
        out.push('\n');
        out
    }

    fn transform(&self, file: &PlannedFile) -> String {
        let elided = elide_includes(&file.content, &file.resolved_include_lines);
        let mut content = strip_tags(&elided);
        if self.optimization.remove_comments {
            content = strip_comments(&content);
        }
        if self.optimization.remove_whitespace {
            content = squeeze_blank_lines(&content);
        }
        content
    }
}

impl ArtifactEmitter for TextEmitter {
    fn emit(&mut self, plan: &LoadPlan) -> Result<(), anyhow::Error> {
        let mut out = self.preamble();
        for file in &plan.files {
            out.push_str(&format!("// --- {} ---\n", file.path));
            let body = self.transform(file);
            out.push_str(body.trim_end());
            out.push_str("\n\n");
        }

        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
        }
        std::fs::write(&self.output, out)
            .with_context(|| format!("cannot write {}", self.output.display()))?;
        Ok(())
    }
}

fn php_quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Comment out include statements the resolver bound, by line. Only
/// lines that actually start with an include keyword are touched; the
/// numbering of all other lines is preserved.
fn elide_includes(content: &str, lines: &[u32]) -> String {
    if lines.is_empty() {
        return content.to_string();
    }
    content
        .lines()
        .enumerate()
        .map(|(index, line)| {
            let number = index as u32 + 1;
            let trimmed = line.trim_start();
            let is_include = ["require", "include"]
                .iter()
                .any(|kw| trimmed.starts_with(kw));
            if lines.contains(&number) && is_include {
                format!("// inlined: {}", line.trim())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop the shebang, opening tags, and a trailing close tag.
fn strip_tags(content: &str) -> String {
    let mut s = content;
    if s.starts_with("#!") {
        s = s.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    }
    let mut out = s.trim_start().to_string();
    for tag in ["<?php", "<?"] {
        if out.starts_with(tag) {
            out = out[tag.len()..].trim_start_matches([' ', '\t']).to_string();
            if out.starts_with('\n') {
                out.remove(0);
            }
            break;
        }
    }
    let trimmed = out.trim_end();
    if trimmed.ends_with("?>") {
        out = trimmed[..trimmed.len() - 2].to_string();
    }
    out
}

/// Best-effort comment removal: whole-line `//` and `#` comments and
/// `/* ... */` blocks. String contents are respected line-locally.
fn strip_comments(content: &str) -> String {
    let mut out = Vec::new();
    let mut in_block = false;
    for line in content.lines() {
        let mut line = line.to_string();
        if in_block {
            match line.find("*/") {
                Some(end) => {
                    line = line[end + 2..].to_string();
                    in_block = false;
                }
                None => continue,
            }
        }
        loop {
            let Some(start) = line.find("/*") else { break };
            if in_string(&line, start) {
                break;
            }
            match line[start..].find("*/") {
                Some(rel_end) => {
                    line = format!("{}{}", &line[..start], &line[start + rel_end + 2..]);
                }
                None => {
                    line = line[..start].to_string();
                    in_block = true;
                    break;
                }
            }
        }
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        if !(in_block && line.trim().is_empty()) {
            out.push(line);
        }
    }
    out.join("\n")
}

/// Rough check whether byte offset `at` falls inside a quoted string on
/// this line.
fn in_string(line: &str, at: usize) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        if index >= at {
            return quote.is_some();
        }
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match quote {
                Some(q) if q == ch => quote = None,
                None => quote = Some(ch),
                _ => {}
            },
            _ => {}
        }
    }
    quote.is_some()
}

/// Collapse runs of blank lines to one and strip trailing spaces.
fn squeeze_blank_lines(content: &str) -> String {
    let mut out = Vec::new();
    let mut blank_run = 0;
    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line.to_string());
    }
    out.join("\n")
}
