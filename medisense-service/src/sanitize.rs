//! Text cleanup for agent output.
//!
//! Two independent passes: [`strip_preamble`] removes the model's
//! conversational lead-in lines before the report is stored, and
//! [`clean_for_speech`] reduces markdown to plain prose before synthesis.

use once_cell::sync::Lazy;
use regex::Regex;

/// Opening phrases the agent emits before the structured report.
static PREAMBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(Okay|I will|Let's|Analyzing)").expect("valid preamble pattern"));

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\]\(.*?\)").expect("valid link pattern"));

static MARKUP_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*#_`\-]").expect("valid markup pattern"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Drop the conversational lead-in lines the agent emits before the report.
///
/// A line is dropped iff its leading-whitespace-trimmed form starts with one
/// of the known opening phrases (case-sensitive). The phrases appearing
/// mid-line leave the line untouched.
pub fn strip_preamble(text: &str) -> String {
    text.lines()
        .filter(|line| !PREAMBLE.is_match(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce markdown-formatted text to plain prose suitable for speech.
///
/// Removes link syntax, emphasis/header/list markers and backticks, then
/// collapses whitespace runs to single spaces. Total over all inputs and
/// idempotent.
pub fn clean_for_speech(text: &str) -> String {
    let text = MARKDOWN_LINK.replace_all(text, "");
    let text = MARKUP_CHARS.replace_all(&text, "");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}
