//! Play image uploads: name generation and writing under the media root.

use std::path::{Path, PathBuf};
use tracing::info;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::AppError;

pub const PLAY_UPLOAD_DIR: &str = "uploads/plays";

/// Lowercase ASCII slug: NFKD-decomposed so accented letters keep their base letter,
/// alphanumerics, `_` and `-` kept, whitespace and dash runs collapsed to one `-`,
/// leading/trailing `-` and `_` trimmed.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.nfkd() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '-' || c.is_whitespace() {
            pending_dash = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Relative storage path: `uploads/plays/<slug>-<uuid><.ext>`.
pub fn play_image_path(title: &str, filename: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{PLAY_UPLOAD_DIR}/{}-{}{}", slugify(title), Uuid::new_v4(), extension)
}

/// Writes `bytes` to `media_root/relative`, creating directories as needed.
pub async fn save_upload(media_root: &Path, relative: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    let full = media_root.join(relative);
    if let Some(parent) = full.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
    }
    tokio::fs::write(&full, bytes)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    info!("Stored upload {} ({} bytes)", full.display(), bytes.len());
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_matches_expected_forms() {
        assert_eq!(slugify("Sample play"), "sample-play");
        assert_eq!(slugify("  The -- Cherry   Orchard! "), "the-cherry-orchard");
        assert_eq!(slugify("Tom_s Play"), "tom_s-play");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn slugify_folds_accents() {
        assert_eq!(slugify("Café Müller"), "cafe-muller");
        assert_eq!(slugify("Ｆｉｇａｒｏ"), "figaro");
        assert_eq!(slugify("Чайка"), "");
    }

    #[test]
    fn image_path_has_slug_uuid_and_extension() {
        let path = play_image_path("Sample Play", "Poster.JPG");
        let name = path.strip_prefix("uploads/plays/").unwrap();
        assert!(name.starts_with("sample-play-"));
        assert!(name.ends_with(".jpg"));

        let uuid_part = &name["sample-play-".len()..name.len() - ".jpg".len()];
        assert!(Uuid::parse_str(uuid_part).is_ok());
    }

    #[test]
    fn image_path_without_extension() {
        let path = play_image_path("X", "poster");
        assert!(!path.contains('.'));
    }

    #[tokio::test]
    async fn save_upload_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let written = save_upload(dir.path(), "uploads/plays/a.png", b"png").await.unwrap();
        assert_eq!(tokio::fs::read(written).await.unwrap(), b"png");
    }
}
