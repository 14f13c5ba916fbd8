//! Timeline building: resolved records → compilation options.

use tracing::debug;
use validator::Validate;

use vads_models::{
    CompileRequest, MediaAsset, MotionEffect, Scene, VideoClip, VideoCompilationOptions,
};

use crate::captions::derive_cues;
use crate::config::DEFAULT_MAX_CAPTION_WORDS;
use crate::error::{CompileError, PipelineResult};
use crate::resolver::CompilationInputs;

/// Visual chosen for one scene.
fn scene_visual(scene: &Scene, inputs: &CompilationInputs) -> Option<(bool, MediaAsset)> {
    let for_scene = |assets: &[MediaAsset]| {
        MediaAsset::latest(assets.iter().filter(|a| a.scene_id.as_ref() == Some(&scene.id))).cloned()
    };
    // Scene-less video clips (earlier compiles) never match here
    for_scene(inputs.video_clips.as_slice())
        .map(|v| (true, v))
        .or_else(|| for_scene(inputs.images.as_slice()).map(|i| (false, i)))
}

/// Per-scene durations: the explicit one when usable, else an even share
/// of the target.
pub fn scene_durations(scenes: &[Scene], target_duration: f64) -> Vec<f64> {
    let fallback = target_duration / scenes.len().max(1) as f64;
    scenes
        .iter()
        .map(|s| s.explicit_duration().unwrap_or(fallback))
        .collect()
}

/// Build the timeline for `inputs` under `request`.
///
/// Deterministic: identical inputs give identical options.
pub fn build_timeline(inputs: &CompilationInputs, request: &CompileRequest) -> PipelineResult<VideoCompilationOptions> {
    build_timeline_with(inputs, request, DEFAULT_MAX_CAPTION_WORDS)
}

pub fn build_timeline_with(
    inputs: &CompilationInputs,
    request: &CompileRequest,
    max_caption_words: usize,
) -> PipelineResult<VideoCompilationOptions> {
    request.validate()?;

    let durations = scene_durations(&inputs.scenes, request.target_duration());
    let transition = request.transition();

    let mut clips = Vec::with_capacity(inputs.scenes.len());
    for (index, (scene, &duration)) in inputs.scenes.iter().zip(&durations).enumerate() {
        let (is_video, asset) = scene_visual(scene, inputs).ok_or_else(|| {
            CompileError::precondition(format!(
                "scene {} has no image or video clip",
                scene.scene_number
            ))
        })?;

        let clip = if is_video {
            VideoClip::video(asset.url, duration).with_motion(MotionEffect::Static)
        } else {
            let motion = request
                .motion
                .unwrap_or_else(|| MotionEffect::alternating(index));
            VideoClip::image(asset.url, duration).with_motion(motion)
        };
        clips.push(clip.with_transition(transition));
    }

    let voiceover = inputs.latest_voiceover();
    let music = inputs.latest_music();

    let mut options = VideoCompilationOptions {
        clips,
        voiceover_url: voiceover.map(|v| v.url.clone()),
        voiceover_duration: voiceover.and_then(MediaAsset::duration_hint),
        music_url: music.map(|m| m.url.clone()),
        music_volume: request.music_volume(),
        captions: Vec::new(),
        caption_style: request.caption_style.clone().unwrap_or_default(),
        resolution: request.resolution.unwrap_or_default(),
        aspect_ratio: request.aspect_ratio.unwrap_or_default(),
        output_format: request.output_format.unwrap_or_default(),
    };

    if request.include_captions() {
        let windows: Vec<(f64, f64)> = options
            .clip_starts()
            .into_iter()
            .zip(durations.iter().copied())
            .collect();
        let total = options.total_duration();
        options.captions = derive_cues(&inputs.scenes, &windows, total, max_caption_words);
    }

    debug!(
        clips = options.clips.len(),
        captions = options.captions.len(),
        total_duration = options.total_duration(),
        voiceover = options.voiceover_url.is_some(),
        music = options.music_url.is_some(),
        "Built timeline"
    );

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};
    use vads_models::{
        AssetId, AssetMetadata, AssetType, ClipKind, OrganizationId, Project, ProjectId, SceneId,
        Transition, WorkflowStep,
    };

    fn scene(n: u32, duration: Option<f64>) -> Scene {
        Scene {
            id: SceneId::from_string(format!("s{n}")),
            project_id: ProjectId::from_string("p1"),
            scene_number: n,
            script_excerpt: format!("Scene number {n} says something short"),
            visual_description: String::new(),
            image_prompt: String::new(),
            duration,
            metadata: None,
        }
    }

    fn asset(id: &str, asset_type: AssetType, scene: Option<u32>, secs: i64) -> MediaAsset {
        MediaAsset {
            id: AssetId::from_string(id),
            project_id: ProjectId::from_string("p1"),
            scene_id: scene.map(|n| SceneId::from_string(format!("s{n}"))),
            asset_type,
            url: format!("https://cdn/{id}"),
            metadata: AssetMetadata::default(),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn inputs(scenes: Vec<Scene>) -> CompilationInputs {
        let images = scenes
            .iter()
            .map(|s| asset(&format!("img{}", s.scene_number), AssetType::Image, Some(s.scene_number), 0))
            .collect();
        CompilationInputs {
            project: Project {
                id: ProjectId::from_string("p1"),
                organization_id: OrganizationId::from_string("org1"),
                name: "Ad".into(),
                current_step: WorkflowStep::Compile,
                created_at: Utc::now(),
            },
            scenes,
            images,
            video_clips: vec![],
            voiceovers: vec![],
            music: vec![],
        }
    }

    #[test]
    fn test_duration_fallback() {
        let inputs = inputs((1..=4).map(|n| scene(n, None)).collect());
        let options = build_timeline(&inputs, &CompileRequest::default()).unwrap();
        assert!(options.clips.iter().all(|c| c.duration == 7.5));
        assert_eq!(options.total_duration(), 30.0);
    }

    #[test]
    fn test_explicit_durations_and_prefix_sums() {
        let inputs = inputs(vec![scene(1, Some(5.0)), scene(2, Some(5.0)), scene(3, Some(5.0))]);
        let options = build_timeline(&inputs, &CompileRequest::default()).unwrap();
        assert_eq!(options.clip_starts(), vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_latest_asset_and_video_preference() {
        let mut inputs = inputs(vec![scene(1, None), scene(2, None)]);
        inputs.images.push(asset("img1-new", AssetType::Image, Some(1), 10));
        inputs.video_clips.push(asset("vid2", AssetType::VideoClip, Some(2), 5));
        // A compiled video without a scene is ignored
        inputs.video_clips.push(asset("compiled", AssetType::VideoClip, None, 99));

        let options = build_timeline(&inputs, &CompileRequest::default()).unwrap();
        assert_eq!(options.clips[0].url, "https://cdn/img1-new");
        assert_eq!(options.clips[0].kind, ClipKind::Image);
        assert_eq!(options.clips[1].url, "https://cdn/vid2");
        assert_eq!(options.clips[1].kind, ClipKind::Video);
        assert_eq!(options.clips[1].motion, Some(MotionEffect::Static));
    }

    #[test]
    fn test_motion_alternates_unless_pinned() {
        let inputs = inputs((1..=3).map(|n| scene(n, None)).collect());
        let options = build_timeline(&inputs, &CompileRequest::default()).unwrap();
        let motions: Vec<_> = options.clips.iter().map(|c| c.motion_or_static()).collect();
        assert_eq!(
            motions,
            vec![MotionEffect::ZoomIn, MotionEffect::ZoomOut, MotionEffect::ZoomIn]
        );
        assert!(options.clips.iter().all(|c| c.transition == Some(Transition::Fade)));

        let request = CompileRequest {
            motion: Some(MotionEffect::Static),
            transition: Some(Transition::None),
            ..Default::default()
        };
        let options = build_timeline(&inputs, &request).unwrap();
        assert!(options.clips.iter().all(|c| c.motion_or_static() == MotionEffect::Static));
        assert!(options.clips.iter().all(|c| !c.has_fade()));
    }

    #[test]
    fn test_scene_without_visual_is_precondition() {
        let mut inputs = inputs(vec![scene(1, None), scene(2, None)]);
        inputs.images.retain(|a| a.scene_id != Some(SceneId::from_string("s2")));
        let err = build_timeline(&inputs, &CompileRequest::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(err.public_message().contains("scene 2"));
    }

    #[test]
    fn test_audio_and_captions() {
        let mut inputs = inputs(vec![scene(1, Some(3.0)), scene(2, Some(3.0))]);
        let mut vo = asset("vo", AssetType::Voiceover, None, 0);
        vo.metadata.duration = Some(8.0);
        inputs.voiceovers.push(vo);
        inputs.music.push(asset("old-music", AssetType::Music, None, 0));
        inputs.music.push(asset("music", AssetType::Music, None, 1));

        let request = CompileRequest {
            music_volume: Some(0.5),
            ..Default::default()
        };
        let options = build_timeline(&inputs, &request).unwrap();
        assert_eq!(options.voiceover_url.as_deref(), Some("https://cdn/vo"));
        assert_eq!(options.voiceover_duration, Some(8.0));
        assert_eq!(options.music_url.as_deref(), Some("https://cdn/music"));
        assert_eq!(options.music_volume, 0.5);
        assert_eq!(options.total_duration(), 8.0);
        assert_eq!(options.captions.len(), 2);
        assert_eq!(options.captions[1].start, 3.0);

        let request = CompileRequest {
            include_captions: Some(false),
            ..Default::default()
        };
        assert!(build_timeline(&inputs, &request).unwrap().captions.is_empty());
    }

    #[test]
    fn test_invalid_request_rejected() {
        let inputs = inputs(vec![scene(1, None)]);
        let request = CompileRequest {
            target_duration: Some(-1.0),
            ..Default::default()
        };
        let err = build_timeline(&inputs, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_deterministic() {
        let inputs = inputs((1..=3).map(|n| scene(n, None)).collect());
        let a = serde_json::to_string(&build_timeline(&inputs, &CompileRequest::default()).unwrap()).unwrap();
        let b = serde_json::to_string(&build_timeline(&inputs, &CompileRequest::default()).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
