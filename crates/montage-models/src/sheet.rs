//! `MontageSheet` and `MontageEntry` — the finished-or-in-progress output.

use serde::{Deserialize, Serialize};

use crate::ids::{EntryId, SheetId, VideoId};
use crate::timecode::Timecode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MontageSheet {
    pub id: SheetId,
    pub video_id: VideoId,
    pub user_id: String,
    pub title: String,
}

impl MontageSheet {
    pub fn new(video_id: VideoId, user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: SheetId::new(),
            video_id,
            user_id: user_id.into(),
            title: title.into(),
        }
    }
}

/// One plan/shot, ready for (or already placed in) the final sheet.
///
/// `plan_number` and `order_index` carry the same 1-based value after
/// finalization (Design Note / Open Question 2): this rewrite does not
/// introduce a second 0-based numbering path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MontageEntry {
    pub id: EntryId,
    pub sheet_id: SheetId,
    pub plan_number: u32,
    pub order_index: u32,
    pub start_timecode: Timecode,
    pub end_timecode: Timecode,
    pub plan_type: String,
    pub description: String,
    pub dialogues: String,
}

/// Default shot-type label when the analyzer omits one (C9).
pub const DEFAULT_PLAN_TYPE: &str = "Ср.";

/// Default dialogue text when the analyzer omits one (C9).
pub const DEFAULT_DIALOGUES: &str = "Музыка";

impl MontageEntry {
    pub fn new(
        sheet_id: SheetId,
        plan_number: u32,
        start_timecode: Timecode,
        end_timecode: Timecode,
    ) -> Self {
        Self {
            id: EntryId::new(),
            sheet_id,
            plan_number,
            order_index: plan_number,
            start_timecode,
            end_timecode,
            plan_type: DEFAULT_PLAN_TYPE.to_string(),
            description: String::new(),
            dialogues: DEFAULT_DIALOGUES.to_string(),
        }
    }
}
