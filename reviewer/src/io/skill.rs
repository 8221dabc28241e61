//! Loading skill text that is prepended to every pass prompt.
//!
//! The caller loads skill text once, before the first pass, and threads the
//! resulting string through the loop. Skill files may carry YAML frontmatter
//! (`name`, `description`, ...); it describes the skill to tooling and is not
//! sent to the agent.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Read and concatenate skill files in order, separated by blank lines.
///
/// Returns an empty string when `paths` is empty.
pub fn load_skill_text<P: AsRef<Path>>(paths: &[P]) -> Result<String> {
    let mut parts = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("read skill {}", path.display()))?;
        let body = strip_frontmatter(&contents).trim();
        debug!(path = %path.display(), bytes = body.len(), "loaded skill");
        if !body.is_empty() {
            parts.push(body.to_string());
        }
    }
    Ok(parts.join("\n\n"))
}

/// Drop a leading `---` frontmatter block, if any.
fn strip_frontmatter(contents: &str) -> &str {
    let normalized = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let Some(after) = normalized
        .strip_prefix("---\n")
        .or_else(|| normalized.strip_prefix("---\r\n"))
    else {
        return normalized;
    };
    let mut offset = 0;
    for line in after.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" {
            return &after[offset..];
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_frontmatter() {
        let doc = "---\nname: review\ndescription: code review\n---\n\n# Review\nBe strict.\n";
        assert_eq!(strip_frontmatter(doc).trim(), "# Review\nBe strict.");
    }

    #[test]
    fn unterminated_frontmatter_is_kept() {
        let doc = "---\nname: review\n# Review\n";
        assert_eq!(strip_frontmatter(doc), doc);
    }

    #[test]
    fn document_without_frontmatter_is_unchanged() {
        assert_eq!(strip_frontmatter("# Review\n---\nrule"), "# Review\n---\nrule");
    }

    #[test]
    fn concatenates_files_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("review.md");
        let second = temp.path().join("style.md");
        let empty = temp.path().join("empty.md");
        fs::write(&first, "---\nname: review\n---\nReview carefully.\n").expect("write");
        fs::write(&second, "Prefer small diffs.\n").expect("write");
        fs::write(&empty, "\n").expect("write");

        let text = load_skill_text(&[first, empty, second]).expect("load");
        assert_eq!(text, "Review carefully.\n\nPrefer small diffs.");
    }

    #[test]
    fn no_paths_yields_empty_text() {
        let paths: [&Path; 0] = [];
        assert_eq!(load_skill_text(&paths).expect("load"), "");
    }

    #[test]
    fn missing_file_names_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing.md");
        let err = load_skill_text(&[&missing]).unwrap_err();
        assert!(err.to_string().contains("missing.md"));
    }
}
