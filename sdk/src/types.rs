//! Shared structured-output types
//!
//! Members are instructed to answer with a strict JSON payload of the shape
//! `{"content": "...", "next": "node-or-null", "actions": [...]}`. Language
//! models honor that contract unreliably, so the payload is modeled as
//! "parse as tagged output, fall back to content-only on parse failure"
//! rather than trusted as structured data. Parsing never fails: the worst
//! outcome is the raw text carried as content with no next hint.

use serde::{Deserialize, Serialize};

/// Sentinel `when` label matching any (or no) emitted hint.
pub const ALWAYS: &str = "always";

/// A side-effect request carried in a member's structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action discriminator, e.g. "notify" or "handoff"
    #[serde(rename = "type")]
    pub kind: String,

    /// Free-form action payload
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Parsed member output.
///
/// `raw` always preserves the verbatim model text so that audits and the
/// test harness survive parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    /// The member's answer text
    #[serde(default)]
    pub content: String,

    /// Proposed successor node, if the member emitted one
    #[serde(default)]
    pub next: Option<String>,

    /// Side-effect requests
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Verbatim model text this output was parsed from
    #[serde(default)]
    pub raw: String,
}

impl StructuredOutput {
    /// Parse raw model text tolerantly.
    ///
    /// Handles the payload as emitted verbatim, wrapped in a markdown code
    /// fence, or embedded in surrounding prose. Anything else degrades to
    /// `{content: raw, next: None, actions: []}`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(out) = Self::try_from_json(trimmed, raw) {
            return out;
        }

        if let Some(inner) = extract_fenced_block(trimmed) {
            if let Some(out) = Self::try_from_json(inner.trim(), raw) {
                return out;
            }
        }

        if let Some(pos) = trimmed.find('{') {
            if let Some(candidate) = extract_balanced_object(&trimmed[pos..]) {
                if let Some(out) = Self::try_from_json(candidate, raw) {
                    return out;
                }
            }
        }

        Self::from_raw(raw)
    }

    /// The content-only fallback for unparseable model text.
    pub fn from_raw(raw: &str) -> Self {
        Self {
            content: raw.to_string(),
            next: None,
            actions: Vec::new(),
            raw: raw.to_string(),
        }
    }

    /// The text the harness asserts against: content, or the verbatim model
    /// text when content is empty.
    pub fn assertion_text(&self) -> &str {
        if self.content.is_empty() {
            &self.raw
        } else {
            &self.content
        }
    }

    fn try_from_json(candidate: &str, raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
        let object = value.as_object()?;

        let content = object
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or(raw)
            .to_string();

        let next = object
            .get("next")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let actions = object
            .get("actions")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Some(Self {
            content,
            next,
            actions,
            raw: raw.to_string(),
        })
    }
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing fence.
pub fn extract_fenced_block(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
pub fn extract_balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
