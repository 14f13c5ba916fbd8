//! Project store seam and the in-memory implementation.
//!
//! The store owns projects, scenes and media assets. The pipeline reads
//! them once at the start of a compile and writes exactly two things back:
//! the compiled video asset and the project's workflow step.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use vads_models::{MediaAsset, Project, ProjectId, Scene, WorkflowStep};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Persistence for projects, scenes and assets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, project_id: &ProjectId) -> StoreResult<Option<Project>>;

    async fn get_scenes_by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<Scene>>;

    async fn get_media_assets_by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<MediaAsset>>;

    /// Insert a new asset record. Never deduplicates.
    async fn create_media_asset(&self, asset: MediaAsset) -> StoreResult<MediaAsset>;

    async fn update_project_step(&self, project_id: &ProjectId, step: WorkflowStep) -> StoreResult<()>;
}

/// A project with its scenes and assets, as stored in a JSON manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project: Project,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub assets: Vec<MediaAsset>,
}

impl ProjectManifest {
    pub async fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let body = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path.as_ref(), body).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Tables {
    projects: HashMap<ProjectId, Project>,
    scenes: Vec<Scene>,
    assets: Vec<MediaAsset>,
}

/// Store kept in memory; backs tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    tables: RwLock<Tables>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifests(manifests: impl IntoIterator<Item = ProjectManifest>) -> Self {
        let mut tables = Tables::default();
        for manifest in manifests {
            tables.scenes.extend(manifest.scenes);
            tables.assets.extend(manifest.assets);
            tables
                .projects
                .insert(manifest.project.id.clone(), manifest.project);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    pub async fn insert_project(&self, project: Project) {
        let mut tables = self.tables.write().await;
        tables.projects.insert(project.id.clone(), project);
    }

    pub async fn insert_scene(&self, scene: Scene) {
        self.tables.write().await.scenes.push(scene);
    }

    pub async fn insert_asset(&self, asset: MediaAsset) {
        self.tables.write().await.assets.push(asset);
    }

    /// Current state of one project as a manifest.
    pub async fn manifest(&self, project_id: &ProjectId) -> Option<ProjectManifest> {
        let tables = self.tables.read().await;
        let project = tables.projects.get(project_id)?.clone();
        Some(ProjectManifest {
            project,
            scenes: tables
                .scenes
                .iter()
                .filter(|s| &s.project_id == project_id)
                .cloned()
                .collect(),
            assets: tables
                .assets
                .iter()
                .filter(|a| &a.project_id == project_id)
                .cloned()
                .collect(),
        })
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn get_project(&self, project_id: &ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(project_id).cloned())
    }

    async fn get_scenes_by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<Scene>> {
        let tables = self.tables.read().await;
        Ok(tables
            .scenes
            .iter()
            .filter(|s| &s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_media_assets_by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<MediaAsset>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assets
            .iter()
            .filter(|a| &a.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create_media_asset(&self, asset: MediaAsset) -> StoreResult<MediaAsset> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&asset.project_id) {
            return Err(StoreError::NotFound(format!("project {}", asset.project_id)));
        }
        debug!(asset_id = %asset.id, asset_type = %asset.asset_type, "Created media asset");
        tables.assets.push(asset.clone());
        Ok(asset)
    }

    async fn update_project_step(&self, project_id: &ProjectId, step: WorkflowStep) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let project = tables
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::NotFound(format!("project {project_id}")))?;
        project.current_step = step;
        Ok(())
    }
}
