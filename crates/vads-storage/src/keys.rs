//! Object key layout and content types.
//!
//! Every object a project owns lives under
//! `{organization_id}/{project_id}/{asset_type}/{file_name}`.

use std::path::Path;

use vads_models::{AssetType, OrganizationId, ProjectId};

use crate::error::{StorageError, StorageResult};

/// Destination key for a project asset.
pub fn asset_key(
    organization_id: &OrganizationId,
    project_id: &ProjectId,
    asset_type: AssetType,
    file_name: &str,
) -> StorageResult<String> {
    for (label, segment) in [
        ("organization id", organization_id.as_str()),
        ("project id", project_id.as_str()),
        ("file name", file_name),
    ] {
        if segment.is_empty() || segment.contains('/') || segment.contains('\\') || segment == "." || segment == ".." {
            return Err(StorageError::InvalidKey(format!("invalid {label}: {segment:?}")));
        }
    }
    Ok(format!(
        "{}/{}/{}/{}",
        organization_id, project_id, asset_type, file_name
    ))
}

/// Reject keys that could escape a storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// File name of a compiled video.
pub fn compiled_video_file_name(asset_id: &str, extension: &str) -> String {
    format!("compiled_{asset_id}.{extension}")
}

/// File name of the poster frame stored next to a compiled video.
pub fn thumbnail_file_name(asset_id: &str) -> String {
    format!("compiled_{asset_id}_thumb.jpg")
}

/// Content type for a file name or key, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("srt") => "application/x-subrip",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_key_layout() {
        let key = asset_key(
            &OrganizationId::from("org-1"),
            &ProjectId::from("proj-9"),
            AssetType::VideoClip,
            "compiled_abc.mp4",
        )
        .unwrap();
        assert_eq!(key, "org-1/proj-9/video_clip/compiled_abc.mp4");
    }

    #[test]
    fn test_asset_key_rejects_traversal() {
        let err = asset_key(
            &OrganizationId::from(".."),
            &ProjectId::from("p"),
            AssetType::VideoClip,
            "a.mp4",
        );
        assert!(err.is_err());
        assert!(asset_key(
            &OrganizationId::from("o"),
            &ProjectId::from("p"),
            AssetType::Image,
            "x/y.png"
        )
        .is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("org/proj/video_clip/a.mp4").is_ok());
        assert!(validate_key("/abs/a.mp4").is_err());
        assert!(validate_key("org/../a.mp4").is_err());
        assert!(validate_key("org//a.mp4").is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("compiled_1.mp4"), "video/mp4");
        assert_eq!(content_type_for("compiled_1.MOV"), "video/quicktime");
        assert_eq!(content_type_for("thumb.jpg"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(compiled_video_file_name("a1", "mov"), "compiled_a1.mov");
        assert_eq!(thumbnail_file_name("a1"), "compiled_a1_thumb.jpg");
    }
}
