//! The incremental per-video character/speaker registry (C8).

use serde::{Deserialize, Serialize};

use crate::timecode::Timecode;

/// One identity entry. Uniqueness is by case-folded `canonical_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterEntry {
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub first_seen_chunk: u32,
    pub first_seen_timecode: Timecode,
    #[serde(default)]
    pub appearances: u32,
    #[serde(default)]
    pub is_generic_term: bool,
    /// Best-effort match against an externally supplied script character
    /// list; recorded but never used to rewrite `canonical_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_script_match: Option<String>,
}

/// Ordered, append-mostly identity table. Grows monotonically across a
/// video's chunks and is snapshotted verbatim into each subsequent prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterRegistry {
    entries: Vec<CharacterEntry>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CharacterEntry] {
        &self.entries
    }

    fn find_index(&self, canonical_name: &str) -> Option<usize> {
        let folded = canonical_name.to_lowercase();
        self.entries
            .iter()
            .position(|e| e.canonical_name.to_lowercase() == folded)
    }

    /// Record a sighting of `canonical_name` at `chunk_index`/`timecode`.
    /// If the name already exists (case-folded), bumps `appearances`;
    /// otherwise inserts a new entry. Returns `true` if a new entry was
    /// created.
    pub fn record_sighting(
        &mut self,
        canonical_name: &str,
        chunk_index: u32,
        timecode: Timecode,
        is_generic_term: bool,
    ) -> bool {
        if let Some(idx) = self.find_index(canonical_name) {
            self.entries[idx].appearances += 1;
            false
        } else {
            self.entries.push(CharacterEntry {
                canonical_name: canonical_name.to_string(),
                aliases: Vec::new(),
                first_seen_chunk: chunk_index,
                first_seen_timecode: timecode,
                appearances: 1,
                is_generic_term,
                possible_script_match: None,
            });
            true
        }
    }

    pub fn set_script_match(&mut self, canonical_name: &str, script_match: impl Into<String>) {
        if let Some(idx) = self.find_index(canonical_name) {
            self.entries[idx].possible_script_match = Some(script_match.into());
        }
    }

    /// Render the registry as a compact "known characters" block for the
    /// prompt builder; verbatim text is inserted into every subsequent
    /// chunk's prompt.
    pub fn render_snapshot(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        self.entries
            .iter()
            .map(|e| {
                if e.is_generic_term {
                    format!("{} (generic)", e.canonical_name)
                } else {
                    e.canonical_name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_folded_uniqueness() {
        let mut reg = CharacterRegistry::new();
        let tc = Timecode::at_whole_second(0, 0, 10);
        assert!(reg.record_sighting("ГАЛЯ", 0, tc, false));
        assert!(!reg.record_sighting("галя", 0, tc, false));
        assert_eq!(reg.entries().len(), 1);
        assert_eq!(reg.entries()[0].appearances, 2);
    }

    #[test]
    fn snapshot_marks_generic_terms() {
        let mut reg = CharacterRegistry::new();
        let tc = Timecode::at_whole_second(0, 0, 0);
        reg.record_sighting("ЖЕНЩИНА", 0, tc, true);
        assert!(reg.render_snapshot().contains("generic"));
    }
}
