//! Response parser (C7): turns the analyzer's free-text reply into parsed
//! scenes, trying markdown blocks, then a JSON block/array, then a
//! line-oriented fallback — an ordered list of strategies each returning
//! `Option<Vec<ParsedScene>>`, run until one succeeds.

use montage_models::{Timecode, DEFAULT_DIALOGUES};
use serde::Deserialize;
use tracing::warn;

/// One scene parsed out of the analyzer's response, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScene {
    pub start: Timecode,
    pub end: Timecode,
    pub plan_type: Option<String>,
    pub description: String,
    pub dialogues: String,
}

/// Parse the analyzer's response text, trying each strategy in order.
/// Returns an empty list (not an error) when nothing matches; the caller is
/// expected to log the whole response in that case.
pub fn parse_response(text: &str) -> Vec<ParsedScene> {
    if let Some(scenes) = parse_markdown_blocks(text) {
        return scenes;
    }
    if let Some(scenes) = parse_json_block(text) {
        return scenes;
    }
    if let Some(scenes) = parse_line_oriented(text) {
        return scenes;
    }
    warn!(response = %text, "analyzer response matched no parser strategy");
    Vec::new()
}

/// `**start - end**` headed blocks with `План:`/`Вид:`, `Содержание:`,
/// `Диалоги:`/`Диалоги/Музыка:` fields.
fn parse_markdown_blocks(text: &str) -> Option<Vec<ParsedScene>> {
    let mut scenes = Vec::new();
    let mut current: Option<(Timecode, Timecode)> = None;
    let mut plan_type: Option<String> = None;
    let mut description = String::new();
    let mut dialogues = String::new();

    let flush = |scenes: &mut Vec<ParsedScene>,
                 current: &mut Option<(Timecode, Timecode)>,
                 plan_type: &mut Option<String>,
                 description: &mut String,
                 dialogues: &mut String| {
        if let Some((start, end)) = current.take() {
            scenes.push(ParsedScene {
                start,
                end,
                plan_type: plan_type.take(),
                description: normalize_description(description),
                dialogues: normalize_dialogue(dialogues),
            });
        }
        description.clear();
        dialogues.clear();
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(boundary) = strip_bold(trimmed).and_then(parse_boundary_line) {
            flush(&mut scenes, &mut current, &mut plan_type, &mut description, &mut dialogues);
            current = Some(boundary);
            continue;
        }
        if current.is_none() {
            continue;
        }
        if let Some(value) = strip_field(trimmed, &["План:", "Вид:"]) {
            plan_type = Some(value.to_string());
        } else if let Some(value) = strip_field(trimmed, &["Содержание:"]) {
            description.push_str(value);
        } else if let Some(value) = strip_field(trimmed, &["Диалоги:", "Диалоги/Музыка:"]) {
            dialogues.push_str(value);
        } else if !trimmed.is_empty() && !description.is_empty() {
            description.push(' ');
            description.push_str(trimmed);
        }
    }
    flush(&mut scenes, &mut current, &mut plan_type, &mut description, &mut dialogues);

    if scenes.is_empty() {
        None
    } else {
        Some(scenes)
    }
}

fn strip_bold(line: &str) -> Option<&str> {
    line.strip_prefix("**").and_then(|rest| rest.strip_suffix("**")).or(Some(line))
}

fn parse_boundary_line(line: &str) -> Option<(Timecode, Timecode)> {
    let (start_str, end_str) = line.split_once(" - ")?;
    let start = Timecode::parse(start_str.trim()).ok()?;
    let end = Timecode::parse(end_str.trim()).ok()?;
    Some((start, end))
}

fn strip_field<'a>(line: &'a str, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        if let Some(rest) = line.strip_prefix(key) {
            return Some(rest.trim());
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct JsonScene {
    start: String,
    end: String,
    #[serde(default)]
    plan_type: Option<String>,
    #[serde(default)]
    visual_description: Option<String>,
    #[serde(default)]
    content_summary: Option<String>,
    #[serde(default)]
    dialogue: Option<String>,
}

/// A fenced ```json block or a raw JSON array.
fn parse_json_block(text: &str) -> Option<Vec<ParsedScene>> {
    let candidate = extract_json_array(text)?;
    let raw: Vec<JsonScene> = serde_json::from_str(&candidate).ok()?;
    if raw.is_empty() {
        return None;
    }

    let mut scenes = Vec::with_capacity(raw.len());
    for item in raw {
        let start = Timecode::parse(&item.start).ok()?;
        let end = Timecode::parse(&item.end).ok()?;
        let description = item
            .visual_description
            .or(item.content_summary)
            .unwrap_or_default();
        scenes.push(ParsedScene {
            start,
            end,
            plan_type: item.plan_type,
            description: normalize_description(&description),
            dialogues: normalize_dialogue(&item.dialogue.unwrap_or_default()),
        });
    }
    Some(scenes)
}

fn extract_json_array(text: &str) -> Option<String> {
    if let Some(fence_start) = text.find("```json") {
        let rest = &text[fence_start + "```json".len()..];
        if let Some(fence_end) = rest.find("```") {
            return Some(rest[..fence_end].trim().to_string());
        }
    }
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}

/// Line-oriented fallback: parses by field keyword when neither markdown
/// headers nor a JSON block matched. Scenes are separated by boundary
/// lines exactly like the markdown strategy, but without requiring `**`.
fn parse_line_oriented(text: &str) -> Option<Vec<ParsedScene>> {
    let mut scenes = Vec::new();
    let mut current: Option<(Timecode, Timecode)> = None;
    let mut plan_type: Option<String> = None;
    let mut description = String::new();
    let mut dialogues = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(boundary) = parse_boundary_line(trimmed) {
            if let Some((start, end)) = current.take() {
                scenes.push(ParsedScene {
                    start,
                    end,
                    plan_type: plan_type.take(),
                    description: normalize_description(&description),
                    dialogues: normalize_dialogue(&dialogues),
                });
            }
            description.clear();
            dialogues.clear();
            current = Some(boundary);
            continue;
        }
        if current.is_none() || trimmed.is_empty() {
            continue;
        }
        if let Some(value) = strip_field(trimmed, &["План:", "Вид:", "Plan:"]) {
            plan_type = Some(value.to_string());
        } else if let Some(value) = strip_field(trimmed, &["Содержание:", "Description:"]) {
            description.push_str(value);
        } else if let Some(value) = strip_field(trimmed, &["Диалоги:", "Диалоги/Музыка:", "Dialogue:"]) {
            dialogues.push_str(value);
        }
    }
    if let Some((start, end)) = current {
        scenes.push(ParsedScene {
            start,
            end,
            plan_type,
            description: normalize_description(&description),
            dialogues: normalize_dialogue(&dialogues),
        });
    }

    if scenes.is_empty() {
        None
    } else {
        Some(scenes)
    }
}

fn normalize_description(raw: &str) -> String {
    raw.trim().to_string()
}

/// Normalize a `Диалоги:` field: `(ЗК)`/`(ГЗ)` parentheticals become
/// space-separated suffixes, leading numbering artifacts are stripped, the
/// literal `"нет"` collapses to `—`, and the speaker-on-its-own-line format
/// is left untouched.
fn normalize_dialogue(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("нет") {
        return "—".to_string();
    }
    if trimmed.is_empty() {
        return DEFAULT_DIALOGUES.to_string();
    }

    trimmed
        .lines()
        .map(strip_leading_number)
        .map(unparenthesize_speaker_modifier)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_leading_number(line: &str) -> String {
    let trimmed = line.trim_start();
    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(0);
    if digits_end > 0 {
        let rest = &trimmed[digits_end..];
        let rest = rest.trim_start_matches(['.', ')', ':', ' ']);
        rest.to_string()
    } else {
        trimmed.to_string()
    }
}

fn unparenthesize_speaker_modifier(line: &str) -> String {
    for modifier in ["(ЗК)", "(ГЗ)"] {
        if let Some(pos) = line.find(modifier) {
            let mut out = line[..pos].trim_end().to_string();
            out.push(' ');
            out.push_str(&modifier[1..modifier.len() - 1]);
            out.push_str(line[pos + modifier.len()..].trim_end());
            return out;
        }
    }
    line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_strategy_parses_boundary_and_fields() {
        let text = "**00:00:00:00 - 00:00:05:00**\n\
                     План: Общ.\n\
                     Содержание: Вид на улицу.\n\
                     Диалоги: ГАЛЯ: Привет.\n";
        let scenes = parse_response(text);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].plan_type.as_deref(), Some("Общ."));
        assert_eq!(scenes[0].description, "Вид на улицу.");
        assert!(scenes[0].dialogues.contains("ГАЛЯ"));
    }

    #[test]
    fn json_array_strategy_parses_when_markdown_absent() {
        let text = r#"[{"start":"00:00:00:00","end":"00:00:05:00","plan_type":"Ср.","visual_description":"Крупный план","dialogue":"нет"}]"#;
        let scenes = parse_response(text);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].dialogues, "—");
    }

    #[test]
    fn fenced_json_block_is_extracted() {
        let text = "Вот результат:\n```json\n[{\"start\":\"00:00:00:00\",\"end\":\"00:00:03:00\",\"visual_description\":\"x\"}]\n```\n";
        let scenes = parse_response(text);
        assert_eq!(scenes.len(), 1);
    }

    #[test]
    fn line_oriented_fallback_parses_without_markdown_headers() {
        let text = "00:00:00:00 - 00:00:04:00\nВид: Ср.\nСодержание: Коридор.\nДиалоги: нет\n";
        let scenes = parse_response(text);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].dialogues, "—");
    }

    #[test]
    fn empty_response_yields_empty_scene_list_not_error() {
        let scenes = parse_response("совершенно нечитаемый ответ без разметки");
        assert!(scenes.is_empty());
    }

    #[test]
    fn speaker_modifier_is_moved_out_of_parentheses() {
        let normalized = normalize_dialogue("ГАЛЯ (ЗК): Привет");
        assert_eq!(normalized, "ГАЛЯ ЗК: Привет");
    }

    #[test]
    fn leading_numbering_artifact_is_stripped() {
        let normalized = normalize_dialogue("1. ГАЛЯ: Привет");
        assert_eq!(normalized, "ГАЛЯ: Привет");
    }
}
