//! Prompt construction for narrative generation.

use std::fmt::Write;

use super::NarrativeInput;
use crate::fingerprint::canonical_json;

/// Build the generation prompt.
///
/// Sections always appear in the same order: story state, character
/// profiles, trigger event, response format. Structured values are rendered
/// canonically so equal inputs produce byte-identical prompts.
pub fn build_prompt(input: &NarrativeInput, max_options: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Story state\n");
    let state = serde_json::Value::Object(input.story_state.clone());
    let _ = writeln!(prompt, "{}\n", canonical_json(&state));

    prompt.push_str("## Characters\n");
    if input.character_profiles.is_empty() {
        prompt.push_str("(none introduced yet)\n");
    }
    for (i, profile) in input.character_profiles.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, canonical_json(profile));
    }
    prompt.push('\n');

    prompt.push_str("## Trigger event\n");
    let _ = writeln!(prompt, "{}\n", input.trigger_event.trim());

    let _ = write!(
        prompt,
        "## Response format\n\
         Write the next story segment, then offer between 2 and {max_options} choices for \
         the community to vote on. Respond with only a JSON object:\n\
         {{\"text\": \"<segment>\", \"options\": [{{\"id\": 1, \"text\": \"<choice>\"}}]}}\n"
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(state: serde_json::Value) -> NarrativeInput {
        NarrativeInput {
            story_state: state.as_object().cloned().unwrap(),
            character_profiles: vec![json!({"name": "Mara", "role": "pilot"})],
            trigger_event: "dawn".to_string(),
        }
    }

    #[test]
    fn test_sections_are_ordered() {
        let prompt = build_prompt(&input(json!({"chapter": 2})), 4);

        let state = prompt.find("## Story state").unwrap();
        let characters = prompt.find("## Characters").unwrap();
        let trigger = prompt.find("## Trigger event").unwrap();
        let format = prompt.find("## Response format").unwrap();
        assert!(state < characters && characters < trigger && trigger < format);

        assert!(prompt.contains(r#"{"chapter":2}"#));
        assert!(prompt.contains(r#"1. {"name":"Mara","role":"pilot"}"#));
        assert!(prompt.contains("between 2 and 4 choices"));
    }

    #[test]
    fn test_key_order_does_not_change_prompt() {
        let a: serde_json::Value = serde_json::from_str(r#"{"a": 1, "b": {"y": 2, "x": 3}}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"b": {"x": 3, "y": 2}, "a": 1}"#).unwrap();
        assert_eq!(build_prompt(&input(a), 5), build_prompt(&input(b), 5));
    }
}
