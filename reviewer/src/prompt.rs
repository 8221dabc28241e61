//! Prompt construction for review passes.
//!
//! Skill text is loaded once by the caller (see [`crate::io::skill`]) and
//! passed in as a plain string; nothing here reads files or caches state.

use std::collections::BTreeSet;

use anyhow::Result;
use minijinja::{Environment, context};

const FIX_DIRECTIVE_TEMPLATE: &str = include_str!("prompts/fix_directive.md");
const SINGLE_PASS_TEMPLATE: &str = include_str!("prompts/single_pass.md");
const RE_REVIEW_TEMPLATE: &str = include_str!("prompts/re_review.md");

/// System-prompt text that establishes the status line convention.
pub const STATUS_CONTRACT: &str = include_str!("prompts/status_contract.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("fix_directive", FIX_DIRECTIVE_TEMPLATE)
            .expect("fix directive template should be valid");
        env.add_template("single_pass", SINGLE_PASS_TEMPLATE)
            .expect("single pass template should be valid");
        env.add_template("re_review", RE_REVIEW_TEMPLATE)
            .expect("re-review template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

fn non_empty(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|text| !text.is_empty())
}

/// Prompt for the first pass of the fix loop: skill text, the standing
/// directive to apply fixes with the edit tools, then the user's instruction.
pub fn first_pass_prompt(skill: &str, instruction: &str) -> Result<String> {
    PromptEngine::new().render(
        "fix_directive",
        context! {
            skill => non_empty(skill),
            instruction => instruction.trim(),
        },
    )
}

/// Prompt for a standalone pass outside the fix loop.
pub fn single_pass_prompt(skill: &str, instruction: &str) -> Result<String> {
    PromptEngine::new().render(
        "single_pass",
        context! {
            skill => non_empty(skill),
            instruction => instruction.trim(),
        },
    )
}

/// Prompt for pass `pass` (2-based) scoped to the files edited in the previous pass.
///
/// Names every file when `edited_files` is non-empty; otherwise falls back to
/// "all files you just modified".
pub fn re_review_prompt(skill: &str, pass: u32, edited_files: &BTreeSet<String>) -> Result<String> {
    PromptEngine::new().render(
        "re_review",
        context! {
            skill => non_empty(skill),
            pass => pass,
            files => edited_files.iter().collect::<Vec<_>>(),
        },
    )
}

/// Full system-prompt append: the status contract plus optional extra text.
pub fn system_prompt_append(extra: &str) -> String {
    match non_empty(extra) {
        Some(extra) => format!("{}\n\n{extra}", STATUS_CONTRACT.trim_end()),
        None => STATUS_CONTRACT.trim_end().to_string(),
    }
}
