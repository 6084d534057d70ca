//! Structured payload extraction from free-form model text.
//!
//! Models wrap JSON in markdown fences, prepend chatter, and leave trailing commas.
//! [`extract`] finds the payload (a ```json fence first, otherwise the first balanced
//! `{...}`/`[...]` span that deserializes), removes trailing commas and parses it.
//! [`split_payload`] is the variant for prose answers that end in an optional
//! metadata block.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::{PipelineError, PipelineResult};

const FENCE: &str = "```";
const PREVIEW_CHARS: usize = 200;

/// Location of a payload inside the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate<'a> {
    /// Byte range to cut when removing the block from its surroundings.
    start: usize,
    end: usize,
    json: &'a str,
}

/// Prose with an optional trailing payload removed from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Split<T> {
    pub body: String,
    pub payload: Option<T>,
}

/// Parse the structured payload embedded in `raw`.
pub fn extract<T: DeserializeOwned>(raw: &str) -> PipelineResult<T> {
    extract_where(raw, |_: &T| true)
}

/// [`extract`] with an acceptance check on the parsed value.
///
/// A ```json fence is authoritative. Without one, every top-level balanced span is
/// tried in order and the first that parses as `T` and passes `accept` wins, so
/// bracketed citations or examples in the prose are skipped. When nothing is
/// accepted the error of the last rejected span is returned.
pub fn extract_where<T, F>(raw: &str, accept: F) -> PipelineResult<T>
where
    T: DeserializeOwned,
    F: Fn(&T) -> bool,
{
    if let Some(candidate) = fenced_block(raw) {
        debug!(
            start = candidate.start,
            end = candidate.end,
            "located fenced JSON payload in model output"
        );
        return parse_json(candidate.json);
    }

    let mut last_err = None;
    for candidate in balanced_candidates(raw) {
        match parse_json::<T>(candidate.json) {
            Ok(value) if accept(&value) => {
                debug!(
                    start = candidate.start,
                    end = candidate.end,
                    "located JSON payload in model output"
                );
                return Ok(value);
            }
            Ok(_) => {
                debug!(start = candidate.start, "span parsed but was not the payload");
                last_err = Some(
                    PipelineError::malformed_output("model JSON lacks the expected content")
                        .with_detail(preview(candidate.json)),
                );
            }
            Err(e) => {
                debug!(start = candidate.start, error = %e, "skipping span that is not the payload");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        PipelineError::malformed_output("no JSON block found in model output")
            .with_detail(preview(raw))
    }))
}

/// Same as [`extract`] but without committing to a type.
pub fn extract_value(raw: &str) -> PipelineResult<serde_json::Value> {
    extract(raw)
}

/// Separate a prose answer from an optional payload that trails it.
///
/// Only a fenced block, or a balanced span that runs to the end of the text, is
/// considered, so braces inside the prose are left alone. When no block is found, or
/// the block does not parse as `T`, the whole text is returned as the body.
pub fn split_payload<T: DeserializeOwned>(raw: &str) -> Split<T> {
    let whole = || Split {
        body: raw.trim().to_string(),
        payload: None,
    };

    let Some(candidate) = fenced_block(raw).or_else(|| trailing_balanced(raw)) else {
        return whole();
    };

    match parse_json::<T>(candidate.json) {
        Ok(payload) => {
            let mut body = String::with_capacity(raw.len());
            body.push_str(raw[..candidate.start].trim_end());
            let tail = raw[candidate.end..].trim();
            if !tail.is_empty() {
                if !body.is_empty() {
                    body.push_str("\n\n");
                }
                body.push_str(tail);
            }
            Split {
                body: body.trim().to_string(),
                payload: Some(payload),
            }
        }
        Err(e) => {
            warn!(error = %e, "trailing payload did not parse; keeping it in the body");
            whole()
        }
    }
}

fn parse_json<T: DeserializeOwned>(json: &str) -> PipelineResult<T> {
    let inner = json.trim();
    let inner = first_balanced(inner).map(|c| c.json).unwrap_or(inner);
    let cleaned = strip_trailing_commas(inner);
    if cleaned.trim().is_empty() {
        return Err(PipelineError::malformed_output(
            "JSON block in model output is empty",
        ));
    }
    serde_json::from_str(&cleaned).map_err(|e| {
        PipelineError::malformed_output(format!("could not parse model JSON: {}", e))
            .with_detail(preview(&cleaned))
    })
}

/// First ```json fence, or failing that the first untagged fence holding JSON.
fn fenced_block(raw: &str) -> Option<Candidate<'_>> {
    let mut fallback = None;
    let mut from = 0;

    while let Some(rel) = raw[from..].find(FENCE) {
        let open = from + rel;
        let after_fence = open + FENCE.len();
        let rest = &raw[after_fence..];

        let is_json_tag = rest
            .get(..4)
            .map(|t| t.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let tag_len = if is_json_tag {
            4
        } else {
            rest.find(char::is_whitespace).unwrap_or(rest.len())
        };
        let untagged = tag_len == 0;

        let body_start = after_fence + tag_len;
        let Some(close_rel) = raw[body_start..].find(FENCE) else {
            break;
        };
        let close = body_start + close_rel;
        let candidate = Candidate {
            start: open,
            end: close + FENCE.len(),
            json: &raw[body_start..close],
        };

        if is_json_tag {
            return Some(candidate);
        }
        if untagged && fallback.is_none() && looks_like_json(candidate.json) {
            fallback = Some(candidate);
        }
        from = close + FENCE.len();
    }

    fallback
}

fn looks_like_json(text: &str) -> bool {
    let t = text.trim_start();
    t.starts_with('{') || t.starts_with('[')
}

/// First `{...}` or `[...]` span whose brackets balance.
fn first_balanced(raw: &str) -> Option<Candidate<'_>> {
    balanced_candidates(raw).next()
}

/// Balanced spans in order, skipping any nested inside an earlier one.
fn balanced_candidates(raw: &str) -> impl Iterator<Item = Candidate<'_>> + '_ {
    let mut resume = 0;
    opening_positions(raw).filter_map(move |start| {
        if start < resume {
            return None;
        }
        let end = balanced_end(raw, start)?;
        resume = end;
        Some(Candidate {
            start,
            end,
            json: &raw[start..end],
        })
    })
}

/// Balanced span that closes exactly at the end of the (trimmed) text.
fn trailing_balanced(raw: &str) -> Option<Candidate<'_>> {
    let text_end = raw.trim_end().len();
    opening_positions(raw).find_map(|start| match balanced_end(raw, start) {
        Some(end) if end == text_end => Some(Candidate {
            start,
            end,
            json: &raw[start..end],
        }),
        _ => None,
    })
}

fn opening_positions(raw: &str) -> impl Iterator<Item = usize> + '_ {
    raw.bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'{' || *b == b'[')
        .map(|(i, _)| i)
}

/// Byte offset one past the bracket closing the one at `start`.
///
/// Brackets and quotes are ASCII, so scanning bytes never splits a UTF-8 sequence.
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Drop commas that directly precede a closing `}` or `]` (whitespace allowed).
fn strip_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in json.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' => in_string = true,
            ',' => {
                let next = json[i + 1..].trim_start();
                if next.starts_with('}') || next.starts_with(']') {
                    continue;
                }
            }
            _ => {}
        }
        out.push(ch);
    }
    out
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::model::{
        AreaForImprovement, Criterion, CriterionFeedback, CriterionScore, FeedbackPoint, Finding,
        FindingSource, TaskEvaluation, TaskNumber,
    };
    use serde::Deserialize;
    use serde_json::json;

    fn sample_finding() -> Finding {
        Finding {
            id: "imp-1".into(),
            task_number: TaskNumber::Two,
            original_span: "more better".into(),
            improved_span: "much better".into(),
            explanation: "Double comparative; \"more\" is redundant.".into(),
            criterion: Criterion::GrammaticalRangeAndAccuracy,
            source: FindingSource::Ai,
        }
    }

    fn sample_evaluation() -> TaskEvaluation {
        TaskEvaluation {
            overall_task_feedback: "Clear position, {uneven} support.".into(),
            strengths: vec!["Clear overview".into()],
            areas_for_improvement: vec![AreaForImprovement {
                title: "Cohesion".into(),
                feedback: "Vary linking devices [e.g. however, moreover].".into(),
            }],
            criteria: [(
                Criterion::TaskResponse,
                CriterionScore {
                    score: Some(6.5),
                    feedback: CriterionFeedback {
                        positive: FeedbackPoint {
                            summary: "Relevant".into(),
                            detail: "All parts addressed".into(),
                        },
                        negative: FeedbackPoint::default(),
                        suggestions: vec!["Extend the second idea".into()],
                    },
                },
            )]
            .into_iter()
            .collect(),
            placeholder: false,
        }
    }

    /// Pretty JSON with a trailing comma before every closing bracket that follows a value.
    fn with_trailing_commas(value: &serde_json::Value) -> String {
        let pretty = serde_json::to_string_pretty(value).unwrap();
        pretty
            .replace("\"\n", "\",\n")
            .replace("]\n", "],\n")
            .replace("}\n", "},\n")
            .trim_end_matches(",\n")
            .to_string()
    }

    #[test]
    fn fenced_finding_with_prose_round_trips() {
        let f = sample_finding();
        let raw = format!(
            "Here are the issues I found:\n```json\n{}\n```\nLet me know if you need more.",
            with_trailing_commas(&serde_json::to_value(&f).unwrap())
        );
        let parsed: Finding = extract(&raw).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn bare_evaluation_with_braces_in_strings_round_trips() {
        let e = sample_evaluation();
        let raw = format!(
            "Sure! {}\nHope this helps.",
            serde_json::to_string(&e).unwrap()
        );
        let parsed: TaskEvaluation = extract(&raw).unwrap();
        assert_eq!(parsed, e);
    }

    #[test]
    fn fenced_array_with_trailing_comma() {
        let raw = "```JSON\n[{\"a\": 1,}, {\"a\": 2},\n]\n```";
        let v = extract_value(raw).unwrap();
        assert_eq!(v, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn untagged_fence_is_used_when_it_holds_json() {
        let raw = "```python\nprint('x')\n```\n```\n{\"ok\": true}\n```";
        assert_eq!(extract_value(raw).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn commas_inside_strings_survive() {
        let raw = r#"{"text": "a, ]b, }c", "n": [1, 2,],}"#;
        assert_eq!(
            extract_value(raw).unwrap(),
            json!({"text": "a, ]b, }c", "n": [1, 2]})
        );
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let raw = r#"noise {"q": "she said \"}\" twice"} trailing"#;
        assert_eq!(
            extract_value(raw).unwrap(),
            json!({"q": "she said \"}\" twice"})
        );
    }

    #[test]
    fn skips_unbalanced_leading_brace() {
        let raw = "Score range {0-9 and then {\"score\": 7}";
        assert_eq!(extract_value(raw).unwrap(), json!({"score": 7}));
    }

    #[test]
    fn bracketed_citations_before_payload_are_skipped() {
        let raw = "Based on the editor notes [t1-imp-1] and [t1-imp-2], here is my grading:\n{\"criteria\": {\"LexicalResource\": {\"score\": 6.5}}}";
        assert_eq!(
            extract_value(raw).unwrap(),
            json!({"criteria": {"LexicalResource": {"score": 6.5}}})
        );
    }

    #[test]
    fn nested_object_does_not_stand_in_for_a_rejected_outer_one() {
        let raw = r#"{"wrapper": {"vocabulary": ["mitigate"]}}"#;
        let err = extract::<Vocab>(raw).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn acceptance_check_moves_past_parseable_spans() {
        let raw = r#"See ["t2-imp-1"] then {"vocabulary": []} and finally {"vocabulary": ["cohesive"]}"#;
        let v: Vocab = extract_where(raw, |v: &Vocab| !v.vocabulary.is_empty()).unwrap();
        assert_eq!(v.vocabulary, vec!["cohesive".to_string()]);

        let err = extract_where(r#"{"vocabulary": []}"#, |v: &Vocab| !v.vocabulary.is_empty())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn no_block_is_malformed() {
        let err = extract_value("I cannot grade this essay.").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
        assert_eq!(err.detail.as_deref(), Some("I cannot grade this essay."));
    }

    #[test]
    fn empty_fence_is_malformed() {
        let err = extract_value("```json\n\n```").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = extract_value("```json\n{\"a\": tru}\n```").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = extract::<Finding>(r#"{"id": 3}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Vocab {
        vocabulary: Vec<String>,
    }

    #[test]
    fn split_returns_prose_and_trailing_payload() {
        let raw = "Try using \"mitigate\" instead of \"make less\".\n\n{\"vocabulary\": [\"mitigate\",]}\n";
        let split: Split<Vocab> = split_payload(raw);
        assert_eq!(split.body, "Try using \"mitigate\" instead of \"make less\".");
        assert_eq!(
            split.payload,
            Some(Vocab {
                vocabulary: vec!["mitigate".into()]
            })
        );
    }

    #[test]
    fn split_removes_fenced_block_in_the_middle() {
        let raw = "Intro.\n```json\n{\"vocabulary\": [\"cohesive\"]}\n```\nOutro.";
        let split: Split<Vocab> = split_payload(raw);
        assert_eq!(split.body, "Intro.\n\nOutro.");
        assert!(split.payload.is_some());
    }

    #[test]
    fn split_leaves_inline_braces_in_prose() {
        let raw = "Use the pattern {subject} + {verb} when you start.";
        let split: Split<Vocab> = split_payload(raw);
        assert_eq!(split.body, raw);
        assert_eq!(split.payload, None);
    }

    #[test]
    fn split_keeps_unparseable_block_in_body() {
        let raw = "Answer text.\n{\"unrelated\": 1}";
        let split: Split<Vocab> = split_payload(raw);
        assert_eq!(split.body, raw);
        assert_eq!(split.payload, None);
    }
}
