//! Turns the model's free-form reply into a list of captions.
//!
//! The model is asked for a bare JSON array but does not always comply, so
//! decoding runs in two stages: a strict structured decode, then a line based
//! fallback. Only when both come up empty is a [`ParseError`] returned.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("model response contained no usable captions")]
    NoCaptions,
}

/// One way of reading captions out of cleaned model text.
pub trait CaptionDecoder {
    fn decode(&self, text: &str) -> Option<Vec<String>>;
}

/// Accepts only a JSON array of strings.
pub struct JsonArrayDecoder;

impl CaptionDecoder for JsonArrayDecoder {
    fn decode(&self, text: &str) -> Option<Vec<String>> {
        serde_json::from_str::<Vec<String>>(text).ok()
    }
}

/// Treats every non-empty line as one caption after stripping list and JSON debris.
pub struct LineDecoder;

impl LineDecoder {
    fn clean_line(line: &str) -> Option<String> {
        let line = line.trim();
        let line = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line);
        let line: String = line.chars().filter(|c| *c != '"').collect();
        let line = line.trim().trim_matches(',').trim();

        if line.is_empty() || line == "[" || line == "]" {
            return None;
        }
        Some(line.to_string())
    }
}

impl CaptionDecoder for LineDecoder {
    fn decode(&self, text: &str) -> Option<Vec<String>> {
        let captions: Vec<String> = text.lines().filter_map(Self::clean_line).collect();
        if captions.is_empty() {
            None
        } else {
            Some(captions)
        }
    }
}

/// Removes Markdown code fences (optionally tagged `json`) and outer whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn parse_captions(raw: &str) -> Result<Vec<String>, ParseError> {
    let text = strip_code_fences(raw);

    if let Some(captions) = JsonArrayDecoder.decode(&text) {
        return Ok(captions);
    }

    tracing::warn!(response = %text, "model response is not a JSON array, falling back to line parsing");
    LineDecoder.decode(&text).ok_or(ParseError::NoCaptions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_array() {
        assert_eq!(
            parse_captions(r#"["a","b","c"]"#).unwrap(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn fenced_json_array() {
        let raw = "```json\n[\"a\", \"b\", \"c\"]\n```\n";
        assert_eq!(parse_captions(raw).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn untagged_fence() {
        let raw = "```\n[\"only one\"]\n```";
        assert_eq!(parse_captions(raw).unwrap(), vec!["only one"]);
    }

    #[test]
    fn json_keeps_order_and_duplicates() {
        let raw = r#"["same", "other", "same"]"#;
        assert_eq!(parse_captions(raw).unwrap(), vec!["same", "other", "same"]);
    }

    #[test]
    fn json_keeps_inner_punctuation() {
        let raw = r#"["Life, love, and \"light\"."]"#;
        assert_eq!(parse_captions(raw).unwrap(), vec![r#"Life, love, and "light"."#]);
    }

    #[test]
    fn bulleted_lines_fall_back() {
        let raw = "- first quote\n- second quote";
        assert_eq!(
            parse_captions(raw).unwrap(),
            vec!["first quote", "second quote"]
        );
    }

    #[test]
    fn fallback_strips_quotes_commas_and_brackets() {
        let raw = "[\n  \"one\",\n  \"two\",\n]";
        assert_eq!(parse_captions(raw).unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn fallback_keeps_commas_inside_a_caption() {
        let raw = "- Sun, sand, and salt air,\n- Slow down, breathe";
        assert_eq!(
            parse_captions(raw).unwrap(),
            vec!["Sun, sand, and salt air", "Slow down, breathe"]
        );
    }

    #[test]
    fn fallback_drops_blank_lines() {
        let raw = "Here you go\n\n   \n* Sunset mood";
        assert_eq!(
            parse_captions(raw).unwrap(),
            vec!["Here you go", "Sunset mood"]
        );
    }

    #[test]
    fn empty_response_is_an_error() {
        assert_eq!(parse_captions(""), Err(ParseError::NoCaptions));
        assert_eq!(parse_captions("  \n\t \n"), Err(ParseError::NoCaptions));
        assert_eq!(parse_captions("```json\n```"), Err(ParseError::NoCaptions));
    }

    #[test]
    fn decoders_are_independent() {
        assert_eq!(JsonArrayDecoder.decode("- a"), None);
        assert_eq!(JsonArrayDecoder.decode(r#"[1, 2]"#), None);
        assert_eq!(LineDecoder.decode("\"\",\n,"), None);
    }
}
