//! Asset resolution: everything a compile reads from the store.

use tracing::debug;

use vads_models::{AssetType, MediaAsset, Project, ProjectId, Scene};

use crate::error::{CompileError, PipelineResult};
use crate::store::ProjectStore;

/// Records a compile works from, read once up front.
#[derive(Debug, Clone)]
pub struct CompilationInputs {
    pub project: Project,
    /// Sorted by `scene_number`
    pub scenes: Vec<Scene>,
    pub images: Vec<MediaAsset>,
    pub video_clips: Vec<MediaAsset>,
    pub voiceovers: Vec<MediaAsset>,
    pub music: Vec<MediaAsset>,
}

impl CompilationInputs {
    /// Latest voiceover of the project.
    pub fn latest_voiceover(&self) -> Option<&MediaAsset> {
        MediaAsset::latest(&self.voiceovers)
    }

    /// Latest music track of the project.
    pub fn latest_music(&self) -> Option<&MediaAsset> {
        MediaAsset::latest(&self.music)
    }
}

/// Load the project, its scenes and its assets partitioned by type.
pub async fn resolve_compilation_inputs(
    store: &dyn ProjectStore,
    project_id: &ProjectId,
) -> PipelineResult<CompilationInputs> {
    let project = store
        .get_project(project_id)
        .await?
        .ok_or_else(|| CompileError::not_found(format!("project {project_id}")))?;

    let mut scenes = store.get_scenes_by_project(project_id).await?;
    if scenes.is_empty() {
        return Err(CompileError::precondition(
            "project has no scenes; generate scenes first",
        ));
    }
    scenes.sort_by_key(|s| s.scene_number);

    let mut images = Vec::new();
    let mut video_clips = Vec::new();
    let mut voiceovers = Vec::new();
    let mut music = Vec::new();
    for asset in store.get_media_assets_by_project(project_id).await? {
        match asset.asset_type {
            AssetType::Image => images.push(asset),
            AssetType::VideoClip => video_clips.push(asset),
            AssetType::Voiceover => voiceovers.push(asset),
            AssetType::Music => music.push(asset),
        }
    }

    if images.is_empty() {
        return Err(CompileError::precondition(
            "project has no images; generate images first",
        ));
    }

    debug!(
        project_id = %project_id,
        scenes = scenes.len(),
        images = images.len(),
        video_clips = video_clips.len(),
        voiceovers = voiceovers.len(),
        music = music.len(),
        "Resolved compilation inputs"
    );

    Ok(CompilationInputs {
        project,
        scenes,
        images,
        video_clips,
        voiceovers,
        music,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryProjectStore;
    use chrono::Utc;
    use vads_models::{AssetId, AssetMetadata, OrganizationId, SceneId, WorkflowStep};

    fn project_id() -> ProjectId {
        ProjectId::from_string("p1")
    }

    fn scene(n: u32) -> Scene {
        Scene {
            id: SceneId::from_string(format!("s{n}")),
            project_id: project_id(),
            scene_number: n,
            script_excerpt: format!("Scene {n} script"),
            visual_description: String::new(),
            image_prompt: String::new(),
            duration: None,
            metadata: None,
        }
    }

    fn asset(asset_type: AssetType, scene: Option<u32>) -> MediaAsset {
        MediaAsset {
            id: AssetId::new(),
            project_id: project_id(),
            scene_id: scene.map(|n| SceneId::from_string(format!("s{n}"))),
            asset_type,
            url: format!("https://cdn/{}.bin", asset_type),
            metadata: AssetMetadata::default(),
            created_at: Utc::now(),
        }
    }

    async fn store() -> MemoryProjectStore {
        let store = MemoryProjectStore::new();
        store
            .insert_project(Project {
                id: project_id(),
                organization_id: OrganizationId::from_string("org1"),
                name: "Ad".to_string(),
                current_step: WorkflowStep::Compile,
                created_at: Utc::now(),
            })
            .await;
        store
    }

    #[tokio::test]
    async fn test_missing_project() {
        let store = MemoryProjectStore::new();
        let err = resolve_compilation_inputs(&store, &project_id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_zero_scenes_is_precondition() {
        let store = store().await;
        store.insert_asset(asset(AssetType::Image, Some(1))).await;
        let err = resolve_compilation_inputs(&store, &project_id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(err.public_message().contains("generate scenes first"));
    }

    #[tokio::test]
    async fn test_zero_images_is_precondition() {
        let store = store().await;
        store.insert_scene(scene(1)).await;
        store.insert_asset(asset(AssetType::VideoClip, Some(1))).await;
        let err = resolve_compilation_inputs(&store, &project_id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(err.public_message().contains("generate images first"));
    }

    #[tokio::test]
    async fn test_partitions_and_sorts() {
        let store = store().await;
        store.insert_scene(scene(3)).await;
        store.insert_scene(scene(1)).await;
        store.insert_scene(scene(2)).await;
        store.insert_asset(asset(AssetType::Image, Some(1))).await;
        store.insert_asset(asset(AssetType::Image, Some(2))).await;
        store.insert_asset(asset(AssetType::VideoClip, Some(3))).await;
        store.insert_asset(asset(AssetType::Voiceover, None)).await;

        let inputs = resolve_compilation_inputs(&store, &project_id()).await.unwrap();
        let numbers: Vec<u32> = inputs.scenes.iter().map(|s| s.scene_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(inputs.images.len(), 2);
        assert_eq!(inputs.video_clips.len(), 1);
        assert!(inputs.latest_voiceover().is_some());
        assert!(inputs.latest_music().is_none());
    }
}
