//! Voiceover and music mixing.
//!
//! The voiceover always plays at unity gain and decides how long the mix
//! lasts; music is attenuated underneath it and cut when the voiceover ends.

use vads_models::timeline::VOICEOVER_VOLUME;

/// Filter label carrying the final audio.
pub const AUDIO_OUT_LABEL: &str = "aout";

/// Which audio sources feed the output, by FFmpeg input index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioPlan {
    Silent,
    Voiceover { input: usize },
    Music { input: usize, volume: f64 },
    Mixed { voice_input: usize, music_input: usize, music_volume: f64 },
}

impl AudioPlan {
    /// Plan for the given sources; inputs are numbered from `first_input`
    /// with the voiceover ahead of the music.
    pub fn new(has_voiceover: bool, has_music: bool, music_volume: f64, first_input: usize) -> Self {
        let music_volume = music_volume.clamp(0.0, 1.0);
        match (has_voiceover, has_music) {
            (false, false) => AudioPlan::Silent,
            (true, false) => AudioPlan::Voiceover { input: first_input },
            (false, true) => AudioPlan::Music {
                input: first_input,
                volume: music_volume,
            },
            (true, true) => AudioPlan::Mixed {
                voice_input: first_input,
                music_input: first_input + 1,
                music_volume,
            },
        }
    }

    pub fn input_count(&self) -> usize {
        match self {
            AudioPlan::Silent => 0,
            AudioPlan::Voiceover { .. } | AudioPlan::Music { .. } => 1,
            AudioPlan::Mixed { .. } => 2,
        }
    }

    /// Filtergraph fragment ending in `[aout]`, or `None` when silent.
    pub fn filter(&self) -> Option<String> {
        match *self {
            AudioPlan::Silent => None,
            AudioPlan::Voiceover { input } => Some(format!(
                "[{input}:a]volume={VOICEOVER_VOLUME:.2}[{AUDIO_OUT_LABEL}]"
            )),
            AudioPlan::Music { input, volume } => Some(format!(
                "[{input}:a]volume={volume:.2}[{AUDIO_OUT_LABEL}]"
            )),
            AudioPlan::Mixed {
                voice_input,
                music_input,
                music_volume,
            } => Some(format!(
                "[{voice_input}:a]volume={VOICEOVER_VOLUME:.2}[vo];\
                 [{music_input}:a]volume={music_volume:.2}[mu];\
                 [vo][mu]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[{AUDIO_OUT_LABEL}]"
            )),
        }
    }
}

/// Length of the mixed audio track in seconds.
///
/// The voiceover decides when both are present (`amix=duration=first`);
/// a lone source plays to its own end.
pub fn mixed_audio_duration(voiceover: Option<f64>, music: Option<f64>) -> Option<f64> {
    voiceover.or(music)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_duration_follows_voiceover() {
        assert_eq!(mixed_audio_duration(Some(10.0), Some(20.0)), Some(10.0));
        assert_eq!(mixed_audio_duration(Some(10.0), Some(4.0)), Some(10.0));
        assert_eq!(mixed_audio_duration(None, Some(20.0)), Some(20.0));
        assert_eq!(mixed_audio_duration(None, None), None);
    }

    #[test]
    fn test_plan_shapes() {
        assert_eq!(AudioPlan::new(false, false, 0.3, 1), AudioPlan::Silent);
        assert!(AudioPlan::Silent.filter().is_none());

        let voice = AudioPlan::new(true, false, 0.3, 1);
        assert_eq!(voice.filter().unwrap(), "[1:a]volume=1.00[aout]");

        let music = AudioPlan::new(false, true, 0.3, 1);
        assert_eq!(music.filter().unwrap(), "[1:a]volume=0.30[aout]");
    }

    #[test]
    fn test_mixed_plan_stops_at_voiceover() {
        let plan = AudioPlan::new(true, true, 1.7, 1);
        assert_eq!(plan.input_count(), 2);
        let filter = plan.filter().unwrap();
        assert!(filter.starts_with("[1:a]volume=1.00[vo];[2:a]volume=1.00[mu];"));
        assert!(filter.contains("amix=inputs=2:duration=first"));
        assert!(filter.ends_with("[aout]"));
    }
}
