//! Prompt builder (C7): turns a chunk's merged scenes and the accumulated
//! character registry into a single text prompt for the analyzer.

use montage_models::MergedScene;

/// Build the prompt for one chunk.
///
/// `scenes` must already be restricted to `mergedScenes ∩ chunk window` and
/// in order; `registry_snapshot` is the rendered character registry
/// snapshot carried verbatim into the prompt.
pub fn build_prompt(
    scenes: &[MergedScene],
    chunk_index: u32,
    total_chunks: u32,
    registry_snapshot: &str,
) -> String {
    let is_first = chunk_index == 0;
    let is_last = chunk_index + 1 == total_chunks;

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Это фрагмент {} из {} полного видео.\n",
        chunk_index + 1,
        total_chunks
    ));
    if is_first {
        prompt.push_str("Это первый фрагмент видео.\n");
    }
    if is_last {
        prompt.push_str("Это последний фрагмент видео.\n");
    }

    if registry_snapshot.is_empty() {
        prompt.push_str("Известные персонажи: (ещё не определены)\n");
    } else {
        prompt.push_str(&format!("Известные персонажи: {registry_snapshot}\n"));
    }

    prompt.push_str(
        "\nДля каждой из следующих границ плана составь один блок:\n\
         **Вид:** тип плана (например, Общ., Ср., Кр.)\n\
         **Содержание:** визуальное описание происходящего\n\
         **Диалоги:** реплики с указанием говорящего, либо \"Музыка\", если реплик нет\n\n",
    );

    prompt.push_str("Границы планов, которые нужно соблюсти буквально:\n");
    for scene in scenes {
        prompt.push_str(&format!(
            "{} - {}\n",
            scene.start_timecode, scene.end_timecode
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_models::{seconds_to_timecode, SceneType};

    fn scene(start: f64, end: f64) -> MergedScene {
        MergedScene {
            start_timecode: seconds_to_timecode(start, 24),
            end_timecode: seconds_to_timecode(end, 24),
            start_timestamp: start,
            end_timestamp: end,
            scene_type: SceneType::Regular,
            original_scenes_count: 1,
        }
    }

    #[test]
    fn prompt_lists_boundaries_verbatim() {
        let scenes = vec![scene(0.0, 5.0), scene(5.0, 30.0)];
        let prompt = build_prompt(&scenes, 0, 2, "ГАЛЯ, ЮСЕФ");
        assert!(prompt.contains("00:00:00:00 - 00:00:05:00"));
        assert!(prompt.contains("00:00:05:00 - 00:00:30:00"));
        assert!(prompt.contains("ГАЛЯ, ЮСЕФ"));
        assert!(prompt.contains("первый фрагмент"));
    }

    #[test]
    fn last_chunk_flag_is_set() {
        let prompt = build_prompt(&[], 1, 2, "");
        assert!(prompt.contains("последний фрагмент"));
    }
}
