//! Prompt sanitization before submission to the agent engine.

/// Remove control characters other than tab, newline, and carriage return.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .filter(|ch| !ch.is_control() || matches!(ch, '\t' | '\n' | '\r'))
        .collect()
}
