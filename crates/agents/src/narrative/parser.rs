//! Turns raw generation output into a [`NarrativeSegment`].
//!
//! Two shapes are accepted: the JSON object the prompt asks for, and a plain
//! text fallback where options are numbered lines (`1.`, `2)`, `3:`).

use serde::Deserialize;

use super::{NarrativeOption, NarrativeSegment};
use crate::generation::GenerationError;

#[derive(Debug, Deserialize)]
struct RawSegment {
    text: String,
    #[serde(default, alias = "choices")]
    options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Labeled { text: String },
    Plain(String),
}

impl RawOption {
    fn into_text(self) -> String {
        match self {
            Self::Labeled { text } | Self::Plain(text) => text,
        }
    }
}

/// Parse generation output into a segment with at most `max_options` options.
///
/// Option ids are assigned 1..n in the order the generation produced them.
/// Output without narrative text or without a single option is malformed.
pub fn parse_segment(raw: &str, max_options: usize) -> Result<NarrativeSegment, GenerationError> {
    let body = strip_code_fence(raw);

    let (text, options) = match serde_json::from_str::<RawSegment>(body) {
        Ok(parsed) => (
            parsed.text,
            parsed
                .options
                .into_iter()
                .map(RawOption::into_text)
                .collect(),
        ),
        Err(_) => parse_plain(body),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(GenerationError::Malformed("missing narrative text".into()));
    }

    let options: Vec<NarrativeOption> = options
        .into_iter()
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .take(max_options)
        .zip(1u32..)
        .map(|(text, id)| NarrativeOption { id, text })
        .collect();

    if options.is_empty() {
        return Err(GenerationError::Malformed("no options in output".into()));
    }

    Ok(NarrativeSegment { text, options })
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `text`, ...) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_plain(body: &str) -> (String, Vec<String>) {
    let mut text_lines = Vec::new();
    let mut options = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if let Some(option) = numbered_item(line) {
            options.push(option.to_string());
        } else if options.is_empty() && !line.is_empty() && !is_options_header(line) {
            text_lines.push(line);
        }
    }

    (text_lines.join("\n"), options)
}

/// Return the item text of a numbered line such as `2) Take the boat`.
fn numbered_item(line: &str) -> Option<&str> {
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest
        .strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .or_else(|| rest.strip_prefix(':'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

fn is_options_header(line: &str) -> bool {
    let lowered = line.trim_end_matches(':').trim().to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "options" | "choices" | "what happens next?" | "next actions"
    )
}
