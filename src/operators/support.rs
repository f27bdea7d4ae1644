//! Helpers shared by the built-in operators.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use framesense_common::paths;

use crate::error::{Error, Result};
use crate::runtime::OperatorParams;

/// One entry of the `questions` parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub question: String,
}

/// The `questions` parameter: question key → question.
pub fn questions(params: &OperatorParams) -> Result<BTreeMap<String, Question>> {
    match params.get("questions") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| Error::config(format!("invalid 'questions' parameter: {e}"))),
        None => Err(Error::config("missing operator parameter 'questions'")),
    }
}

/// Substitute `{question}` in a prompt template.
pub fn render_prompt(template: &str, question: &str) -> String {
    template.replace("{question}", question)
}

/// Number of words in a prompt, for progress lines.
pub fn word_count(text: &str) -> usize {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("valid regex"))
        .find_iter(text)
        .count()
}

/// Parse a model answer leniently.
///
/// Markdown code fences are stripped and the content parsed as JSON. Text
/// that still is not JSON is kept as a string. Non-string values pass through.
///
/// # Examples
///
/// ```
/// use framesense::operators::support::parse_dirty_json;
/// use serde_json::json;
///
/// assert_eq!(parse_dirty_json(&json!("```json\n[\"car\"]\n```")), json!(["car"]));
/// assert_eq!(parse_dirty_json(&json!("a red car")), json!("a red car"));
/// ```
pub fn parse_dirty_json(answer: &Value) -> Value {
    static FENCE: OnceLock<Regex> = OnceLock::new();

    let Value::String(text) = answer else {
        return answer.clone();
    };
    let re = FENCE.get_or_init(|| Regex::new(r"(?s)^\s*```[\w-]*\s*(.*?)\s*```\s*$").expect("valid regex"));
    let inner = re
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text.trim(), |m| m.as_str());

    serde_json::from_str(inner).unwrap_or_else(|_| Value::String(text.trim().to_string()))
}

/// Video folders of a collection with their video file.
pub fn video_folders(root: &Path) -> Vec<(PathBuf, PathBuf)> {
    paths::subdirectories(root)
        .into_iter()
        .filter_map(|folder| paths::find_video_file(&folder).map(|video| (folder, video)))
        .collect()
}

/// Write `value` as indented JSON.
pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_dirty_json() {
        assert_eq!(
            parse_dirty_json(&json!("```json\n{\"places\": [\"Paris\"]}\n```")),
            json!({"places": ["Paris"]})
        );
        assert_eq!(parse_dirty_json(&json!("  [1, 2]  ")), json!([1, 2]));
        assert_eq!(parse_dirty_json(&json!("```\nnot json\n```")), json!("```\nnot json\n```"));
        assert_eq!(parse_dirty_json(&json!([0.1, 0.2])), json!([0.1, 0.2]));
    }

    #[test]
    fn test_questions_parameter() {
        let dir = tempdir().unwrap();
        let overrides = json!({
            "questions": {
                "people": {"question": "How many people?"},
                "place": {"question": "Where is it?"}
            }
        });
        let params = OperatorParams::load(dir.path(), overrides.as_object()).unwrap();
        let questions = questions(&params).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions["place"].question, "Where is it?");

        let empty = OperatorParams::load(dir.path(), None).unwrap();
        assert!(super::questions(&empty).is_err());
    }

    #[test]
    fn test_render_prompt_and_word_count() {
        let prompt = render_prompt("Answer in JSON. {question}", "Is it day?");
        assert_eq!(prompt, "Answer in JSON. Is it day?");
        assert_eq!(word_count(&prompt), 6);
    }

    #[test]
    fn test_video_folders_skip_folders_without_video() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a/a.mp4"), b"").unwrap();

        let found = video_folders(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, dir.path().join("a/a.mp4"));
    }
}
