//! Free-text decoders for tailoring responses.
//!
//! The rewriting agents answer in plain text. These decoders turn that text into
//! item lists and flagged indices. Their failure mode is an empty result, never
//! a best guess: callers compare lengths and keep the prior draft on mismatch.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::llm_client::strip_json_fences;

/// List markers: `-`, `*`, `•`, `1.`, `1)`, and echoed `[0]` indices.
fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[-*•]\s+|\d{1,3}[.)]\s+|\[\d{1,3}\]\s*[:.)-]?\s*)")
            .expect("list marker regex")
    })
}

/// Echoed prompt labels such as `Achievement 2:` or `Rewritten achievement:`.
fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:rewritten\s+|revised\s+|original\s+)?(?:achievement|item|bullet)\s*#?\d*\s*[:.)]\s*")
            .expect("echoed label regex")
    })
}

/// Bracketed item references in critiques: `[3]`.
fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d{1,3})\]").expect("index reference regex"))
}

/// Decodes a list of items from free text, one item per line.
///
/// - code fences are stripped, including fence lines after a preamble;
/// - blank lines are skipped;
/// - list markers, `[n]` indices and echoed labels are removed;
/// - a line ending in `:` that carries no marker is a preamble and is skipped;
/// - surrounding quotes and `**` emphasis are removed.
///
/// Returns an empty list when nothing decodes.
pub fn decode_item_list(text: &str) -> Vec<String> {
    strip_json_fences(text)
        .lines()
        .filter_map(decode_line)
        .collect()
}

fn decode_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("```") {
        return None;
    }

    let marker = marker_re().find(line);
    let rest = match marker {
        Some(m) => &line[m.end()..],
        None if line.ends_with(':') => return None,
        None => line,
    };
    let rest = rest.trim().trim_matches('*').trim();
    let rest = match label_re().find(rest) {
        Some(m) => &rest[m.end()..],
        None => rest,
    };

    let item = rest.trim().trim_matches('"').trim();
    (!item.is_empty()).then(|| item.to_string())
}

/// Decodes a single paragraph: fences, surrounding quotes and a leading
/// `Description:` label are removed. Empty when nothing is left.
pub fn decode_paragraph(text: &str) -> String {
    let text = strip_json_fences(text).trim();
    let text = match text.split_once(':') {
        Some((label, rest)) if label.trim().eq_ignore_ascii_case("description") => rest,
        _ => text,
    };
    text.trim().trim_matches('"').trim().to_string()
}

/// Collects `[n]` references in `critique` that fall inside `0..len`, sorted and unique.
pub fn flagged_indices(critique: &str, len: usize) -> Vec<usize> {
    index_re()
        .captures_iter(critique)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .filter(|&i| i < len)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Merges a full revised list into `previous`, taking only the `flagged`
/// indices from `revised` (all indices when `flagged` is empty).
///
/// Returns `None` when `revised` does not have exactly one entry per item.
pub fn merge_flagged(previous: &[String], revised: Vec<String>, flagged: &[usize]) -> Option<Vec<String>> {
    if revised.len() != previous.len() {
        return None;
    }
    if flagged.is_empty() {
        return Some(revised);
    }
    Some(
        previous
            .iter()
            .zip(revised)
            .enumerate()
            .map(|(i, (old, new))| if flagged.contains(&i) { new } else { old.clone() })
            .collect(),
    )
}
