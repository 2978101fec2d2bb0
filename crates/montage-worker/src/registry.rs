//! Speaker-line extraction feeding the character registry (C8).
//!
//! The analyzer's dialogue fields preserve the screenplay convention of a
//! speaker's name on its own line above their lines. This module finds
//! those lines and records sightings into `montage_models::CharacterRegistry`;
//! the registry's own storage and snapshot rendering live in that crate.

use montage_models::{CharacterRegistry, ScriptData, Timecode};

/// Stop-words that match the uppercase-name shape but are not speaker
/// names: adverbs, verbs, places and interjections that commonly appear
/// capitalized in stage directions or emphasis.
const STOP_WORDS: &[&str] = &[
    "ЗАДУМЧИВО", "ГРОМКО", "ТИХО", "РЕЗКО", "СПОКОЙНО", "НЕЖНО", "СЕРЬЕЗНО",
    "ГОВОРИТ", "КРИЧИТ", "ШЕПЧЕТ", "СМЕЕТСЯ", "ПЛАЧЕТ", "ВЗДЫХАЕТ", "МОЛЧИТ",
    "УЛИЦА", "КВАРТИРА", "ОФИС", "МАШИНА", "ПАРК", "КУХНЯ", "ПОДЪЕЗД",
    "АГА", "ЭЭ", "ОГО", "УХ", "ОЙ", "ДА", "НЕТ", "ТАК", "НУ", "ЭХ",
];

/// Generic role nouns: admitted as speakers but flagged `isGenericTerm`.
const GENERIC_TERMS: &[&str] = &[
    "ЖЕНЩИНА", "МУЖЧИНА", "ДЕВУШКА", "ПАРЕНЬ", "СТАРИК", "СТАРУХА",
    "РЕБЕНОК", "ДЕВОЧКА", "МАЛЬЧИК", "ОФИЦИАНТ", "ВРАЧ", "ПОЛИЦЕЙСКИЙ",
    "ПРОХОЖИЙ", "ГОЛОС",
];

fn is_speaker_shape(word: &str) -> bool {
    let len = word.chars().count();
    (2..=12).contains(&len) && word.chars().all(|c| c.is_alphabetic() && c.is_uppercase())
}

/// Parse one candidate line into a base speaker name, if it matches "line
/// consisting solely of uppercase letters, 2-12 chars, optionally followed
/// by ЗК/ГЗ" (the off-screen/hors-champ markers, already space-separated
/// by `montage_analyzer::parser::normalize_dialogue`).
fn parse_speaker_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut words = line.split_whitespace();
    let name = words.next()?;
    if !is_speaker_shape(name) {
        return None;
    }
    match words.next() {
        None => {}
        Some("ЗК") | Some("ГЗ") => {}
        Some(_) => return None,
    }
    if words.next().is_some() {
        return None;
    }
    if STOP_WORDS.contains(&name) {
        return None;
    }
    Some(name.to_string())
}

/// Best-effort script match: a script character whose name substring-matches
/// (case-insensitively, either direction) the extracted canonical name.
fn best_effort_script_match(name: &str, script: Option<&ScriptData>) -> Option<String> {
    let script = script?;
    let name_lower = name.to_lowercase();
    script
        .characters
        .iter()
        .find(|c| {
            let c_lower = c.to_lowercase();
            c_lower.contains(&name_lower) || name_lower.contains(&c_lower)
        })
        .cloned()
}

/// Extract speaker lines from `dialogues` text and record them into
/// `registry`, attempting a script match for every newly-seen name.
pub fn record_speakers(
    registry: &mut CharacterRegistry,
    dialogues: &str,
    chunk_index: u32,
    timecode: Timecode,
    script: Option<&ScriptData>,
) {
    for line in dialogues.lines() {
        let Some(name) = parse_speaker_line(line) else { continue };
        let is_generic = GENERIC_TERMS.contains(&name.as_str());
        let newly_inserted = registry.record_sighting(&name, chunk_index, timecode, is_generic);
        if newly_inserted {
            if let Some(matched) = best_effort_script_match(&name, script) {
                registry.set_script_match(&name, matched);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_speaker_name() {
        assert_eq!(parse_speaker_line("ГАЛЯ"), Some("ГАЛЯ".to_string()));
    }

    #[test]
    fn extracts_offscreen_speaker_suffix() {
        assert_eq!(parse_speaker_line("ЮСЕФ ЗК"), Some("ЮСЕФ".to_string()));
        assert_eq!(parse_speaker_line("ЮСЕФ ГЗ"), Some("ЮСЕФ".to_string()));
    }

    #[test]
    fn rejects_stop_words_and_lowercase() {
        assert_eq!(parse_speaker_line("ЗАДУМЧИВО"), None);
        assert_eq!(parse_speaker_line("галя"), None);
        assert_eq!(parse_speaker_line("Привет, как дела?"), None);
    }

    #[test]
    fn rejects_out_of_range_length() {
        assert_eq!(parse_speaker_line("Я"), None);
        assert_eq!(parse_speaker_line("ОЧЕНЬДЛИННОЕИМЯПЕРСОНАЖА"), None);
    }

    #[test]
    fn records_generic_term_as_flagged() {
        let mut registry = CharacterRegistry::new();
        let tc = Timecode::at_whole_second(0, 0, 5);
        record_speakers(&mut registry, "ЖЕНЩИНА\nКуда ты идешь?", 0, tc, None);
        let entry = registry.entries().iter().find(|e| e.canonical_name == "ЖЕНЩИНА").unwrap();
        assert!(entry.is_generic_term);
    }

    #[test]
    fn records_script_match_for_new_name_only() {
        let mut registry = CharacterRegistry::new();
        let tc = Timecode::at_whole_second(0, 0, 5);
        let script = ScriptData { characters: vec!["Галина Петровна".to_string()] };
        record_speakers(&mut registry, "ГАЛЯ\nПривет!", 0, tc, Some(&script));
        let entry = registry.entries().iter().find(|e| e.canonical_name == "ГАЛЯ").unwrap();
        assert_eq!(entry.possible_script_match.as_deref(), Some("Галина Петровна"));
    }

    #[test]
    fn repeated_sighting_bumps_appearances_without_rematching() {
        let mut registry = CharacterRegistry::new();
        let tc = Timecode::at_whole_second(0, 0, 5);
        record_speakers(&mut registry, "ГАЛЯ\nПривет!", 0, tc, None);
        record_speakers(&mut registry, "ГАЛЯ\nПока!", 1, tc, None);
        let entry = registry.entries().iter().find(|e| e.canonical_name == "ГАЛЯ").unwrap();
        assert_eq!(entry.appearances, 2);
    }
}
