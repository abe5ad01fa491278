// Shared prompt constants and prompt-building utilities.
// Each pipeline that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Invariant language embedded in every prompt that hands the model a list of items.
pub const PRESERVATION_INSTRUCTION: &str = "\
    CRITICAL: Do NOT add, remove, or modify existing items unless explicitly asked to add new ones. \
    Every original item must appear in your output exactly as written.";

/// Instruction that keeps rewrites inside the candidate's real history.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim must be traceable to the original text provided. \
    Do NOT invent employers, tools, metrics, team sizes, or outcomes. \
    If the original does not support a claim, leave it out.";

/// Renders items as `[index] text` lines, zero-based, so critiques and
/// enrichment maps can reference them.
pub fn render_indexed(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("[{i}] {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders items as a JSON array literal, the exact strings the model must echo back.
pub fn render_json_list(items: &[String]) -> String {
    serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex"))
}

/// Fills `{name}` placeholders in `template` in a single pass.
///
/// Inserted values are never scanned again, so candidate or model text that
/// happens to contain `{job_description}` stays literal. Unknown placeholders
/// are left as written.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_does_not_rescan_inserted_text() {
        let rendered = fill(
            "ITEMS:\n{achievements}\nJOB:\n{job_description}\nCOUNT: {count}",
            &[
                ("achievements", "[0] Wrote {job_description} parser in {count} days"),
                ("job_description", "Rust engineer"),
                ("count", "1"),
            ],
        );
        assert_eq!(
            rendered,
            "ITEMS:\n[0] Wrote {job_description} parser in {count} days\nJOB:\nRust engineer\nCOUNT: 1"
        );
    }

    #[test]
    fn test_fill_leaves_unknown_placeholders_and_json() {
        assert_eq!(
            fill(r#"{missing} {"techStack": []} {role}"#, &[("role", "Engineer")]),
            r#"{missing} {"techStack": []} Engineer"#
        );
    }

    #[test]
    fn test_render_indexed_is_zero_based() {
        let items = vec!["Led team of 5".to_string(), "Shipped v2".to_string()];
        assert_eq!(render_indexed(&items), "[0] Led team of 5\n[1] Shipped v2");
    }

    #[test]
    fn test_render_indexed_empty() {
        assert_eq!(render_indexed(&[]), "(none)");
    }

    #[test]
    fn test_render_json_list_escapes_quotes() {
        let items = vec!["Built \"Atlas\" API".to_string()];
        assert!(render_json_list(&items).contains(r#""Built \"Atlas\" API""#));
    }
}
