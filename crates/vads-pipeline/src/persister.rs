//! Output persistence: upload the render and record it on the project.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use vads_models::{
    AssetId, AssetMetadata, AssetType, MediaAsset, OutputFormat, Project, WorkflowStep,
};
use vads_render::{RenderOutput, RenderedFile};
use vads_storage::keys::{compiled_video_file_name, thumbnail_file_name};
use vads_storage::{asset_key, ObjectStorage};

use crate::error::{CompileError, PipelineResult};
use crate::metrics;
use crate::store::ProjectStore;

/// `source` recorded on compiled video assets.
pub const COMPILATION_SOURCE: &str = "compilation";

/// Facts about a render that the output itself may not carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderDetails {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

impl RenderDetails {
    fn from_file(file: &RenderedFile) -> Self {
        Self {
            duration: file.duration,
            width: file.width,
            height: file.height,
            format: file.format,
        }
    }
}

/// Store the render and create its `video_clip` asset, then move the project
/// to the terminal workflow step.
///
/// Always creates a new asset. The step is only written once the asset
/// record exists. A local file is deleted when this returns.
pub async fn persist(
    storage: &dyn ObjectStorage,
    store: &dyn ProjectStore,
    project: &Project,
    output: RenderOutput,
    expected: &RenderDetails,
) -> PipelineResult<MediaAsset> {
    let asset_id = AssetId::new();
    let started = Instant::now();

    let (url, details, thumbnail_url) = match output {
        RenderOutput::File(file) => {
            let details = RenderDetails::from_file(&file);
            let key = video_key(project, &asset_id, details.format)?;
            let url = storage
                .upload_file(file.path(), file.content_type(), &key)
                .await?;
            let thumbnail_url = upload_thumbnail(storage, project, &asset_id, &file).await;
            (url, details, thumbnail_url)
        }
        RenderOutput::Url(source) => {
            let key = video_key(project, &asset_id, expected.format)?;
            let url = storage
                .upload_from_url(&source, &key)
                .await
                .map_err(|e| CompileError::persist(e, Some(source.clone())))?;
            (url, *expected, None)
        }
    };
    metrics::record_upload_duration(storage.name(), started.elapsed().as_secs_f64());

    let asset = MediaAsset {
        id: asset_id,
        project_id: project.id.clone(),
        scene_id: None,
        asset_type: AssetType::VideoClip,
        url,
        metadata: AssetMetadata {
            source: Some(COMPILATION_SOURCE.to_string()),
            prompt: None,
            duration: Some(details.duration),
            content_type: Some(details.format.content_type().to_string()),
            width: Some(details.width),
            height: Some(details.height),
            thumbnail_url,
        },
        created_at: Utc::now(),
    };

    let asset = store.create_media_asset(asset).await?;
    store
        .update_project_step(&project.id, WorkflowStep::terminal())
        .await?;

    info!(
        project_id = %project.id,
        asset_id = %asset.id,
        url = %asset.url,
        storage = storage.name(),
        "Persisted compiled video"
    );
    Ok(asset)
}

fn video_key(project: &Project, asset_id: &AssetId, format: OutputFormat) -> PipelineResult<String> {
    let file_name = compiled_video_file_name(asset_id.as_str(), format.extension());
    Ok(asset_key(
        &project.organization_id,
        &project.id,
        AssetType::VideoClip,
        &file_name,
    )?)
}

/// Upload the poster frame if there is one; failures only warn.
async fn upload_thumbnail(
    storage: &dyn ObjectStorage,
    project: &Project,
    asset_id: &AssetId,
    file: &RenderedFile,
) -> Option<String> {
    let path = file.thumbnail()?;
    let key = asset_key(
        &project.organization_id,
        &project.id,
        AssetType::VideoClip,
        &thumbnail_file_name(asset_id.as_str()),
    )
    .ok()?;

    match storage.upload_file(path, "image/jpeg", &key).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(asset_id = %asset_id, error = %e, "Thumbnail upload failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{MemoryProjectStore, MockProjectStore};
    use mockall::predicate::*;
    use vads_models::{OrganizationId, ProjectId};
    use vads_storage::{MockObjectStorage, StorageError};

    fn project() -> Project {
        Project {
            id: ProjectId::from_string("p1"),
            organization_id: OrganizationId::from_string("org1"),
            name: "Ad".into(),
            current_step: WorkflowStep::Compile,
            created_at: Utc::now(),
        }
    }

    fn details() -> RenderDetails {
        RenderDetails {
            duration: 8.0,
            width: 608,
            height: 1080,
            format: OutputFormat::Mp4,
        }
    }

    async fn store() -> MemoryProjectStore {
        let store = MemoryProjectStore::new();
        store.insert_project(project()).await;
        store
    }

    #[tokio::test]
    async fn test_url_output_is_refetched_under_project_key() {
        let mut storage = MockObjectStorage::new();
        storage.expect_name().return_const("mock");
        storage
            .expect_upload_from_url()
            .withf(|url, key| {
                url == "https://render.example/out.mp4"
                    && key.starts_with("org1/p1/video_clip/compiled_")
                    && key.ends_with(".mp4")
            })
            .times(1)
            .returning(|_, key| Ok(format!("https://storage.example/{key}")));

        let store = store().await;
        let asset = persist(
            &storage,
            &store,
            &project(),
            RenderOutput::Url("https://render.example/out.mp4".into()),
            &details(),
        )
        .await
        .unwrap();

        assert_eq!(asset.asset_type, AssetType::VideoClip);
        assert!(asset.scene_id.is_none());
        assert_eq!(asset.metadata.source.as_deref(), Some("compilation"));
        assert_eq!(asset.metadata.duration, Some(8.0));
        assert_eq!(asset.metadata.width, Some(608));
        assert!(asset.url.contains(asset.id.as_str()));

        let manifest = store.manifest(&project().id).await.unwrap();
        assert_eq!(manifest.project.current_step, WorkflowStep::Publish);
    }

    #[tokio::test]
    async fn test_create_always() {
        let mut storage = MockObjectStorage::new();
        storage.expect_name().return_const("mock");
        storage
            .expect_upload_from_url()
            .times(2)
            .returning(|_, key| Ok(format!("https://storage.example/{key}")));

        let store = store().await;
        for _ in 0..2 {
            persist(
                &storage,
                &store,
                &project(),
                RenderOutput::Url("https://render.example/out.mp4".into()),
                &details(),
            )
            .await
            .unwrap();
        }

        let manifest = store.manifest(&project().id).await.unwrap();
        assert_eq!(manifest.assets.len(), 2);
        assert_ne!(manifest.assets[0].id, manifest.assets[1].id);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_rendered_url_and_step() {
        let mut storage = MockObjectStorage::new();
        storage.expect_name().return_const("mock");
        storage
            .expect_upload_from_url()
            .returning(|_, _| Err(StorageError::upload_failed("denied")));

        let mut store = MockProjectStore::new();
        store.expect_create_media_asset().never();
        store.expect_update_project_step().never();

        let err = persist(
            &storage,
            &store,
            &project(),
            RenderOutput::Url("https://render.example/out.mp4".into()),
            &details(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert_eq!(err.rendered_url(), Some("https://render.example/out.mp4"));
        assert!(!err.public_message().contains("render.example"));
    }

    #[tokio::test]
    async fn test_file_output_uploads_video_and_thumbnail() {
        let dir = tempfile::TempDir::new().unwrap();
        let video = dir.path().join("compiled.mov");
        let thumb = dir.path().join("thumbnail.jpg");
        tokio::fs::write(&video, b"video").await.unwrap();
        tokio::fs::write(&thumb, b"jpeg").await.unwrap();
        let root = dir.path().to_path_buf();
        let file = RenderedFile::new(dir, video, 6.0, 1080, 1080, OutputFormat::Mov).with_thumbnail(thumb);

        let mut storage = MockObjectStorage::new();
        storage.expect_name().return_const("mock");
        storage
            .expect_upload_file()
            .with(always(), eq("video/quicktime"), function(|k: &str| k.ends_with(".mov")))
            .times(1)
            .returning(|_, _, key| Ok(format!("https://storage.example/{key}")));
        storage
            .expect_upload_file()
            .with(always(), eq("image/jpeg"), function(|k: &str| k.ends_with("_thumb.jpg")))
            .times(1)
            .returning(|_, _, key| Ok(format!("https://storage.example/{key}")));

        let mut store = MockProjectStore::new();
        store
            .expect_create_media_asset()
            .times(1)
            .returning(|asset| Ok(asset));
        store
            .expect_update_project_step()
            .with(always(), eq(WorkflowStep::Publish))
            .times(1)
            .returning(|_, _| Ok(()));

        let asset = persist(&storage, &store, &project(), RenderOutput::File(file), &details())
            .await
            .unwrap();

        assert_eq!(asset.metadata.content_type.as_deref(), Some("video/quicktime"));
        assert_eq!(asset.metadata.duration, Some(6.0));
        assert!(asset.metadata.thumbnail_url.unwrap().ends_with("_thumb.jpg"));
        // The rendered file is gone once persisted
        assert!(!root.exists());
    }
}
