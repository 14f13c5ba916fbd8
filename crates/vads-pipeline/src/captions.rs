//! Caption cue derivation from scene scripts.

use vads_models::{Caption, Scene};

/// Split a script into chunks of at most `max_words` words.
pub fn chunk_words(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Cues for every scene with script text.
///
/// `windows` holds `(start, duration)` per scene, aligned with `scenes`.
/// Each scene's chunks share its window evenly; windows are clamped to
/// `total` and anything past it is dropped.
pub fn derive_cues(scenes: &[Scene], windows: &[(f64, f64)], total: f64, max_words: usize) -> Vec<Caption> {
    let mut cues = Vec::new();
    for (scene, &(start, duration)) in scenes.iter().zip(windows) {
        let chunks = chunk_words(scene.script_text(), max_words);
        if chunks.is_empty() || !(duration.is_finite() && duration > 0.0) {
            continue;
        }

        let step = duration / chunks.len() as f64;
        for (i, text) in chunks.into_iter().enumerate() {
            let cue = Caption::new(text, start + step * i as f64, step);
            if let Some(cue) = cue.clamped_to(total) {
                cues.push(cue);
            }
        }
    }
    cues
}
