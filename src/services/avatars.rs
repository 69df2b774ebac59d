use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
};

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
pub const AVATAR_SIZE: u32 = 256;

pub fn detect_image_ext(content_type: &str, filename: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => return Some("png"),
        "image/jpeg" | "image/jpg" => return Some("jpg"),
        "image/webp" => return Some("webp"),
        "image/gif" => return Some("gif"),
        _ => {}
    }
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    match ext.as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        _ => None,
    }
}

/// Decode, shrink to fit the avatar box and re-encode as JPEG.
pub fn render_avatar(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > AVATAR_SIZE || img.height() > AVATAR_SIZE {
        img.resize(AVATAR_SIZE, AVATAR_SIZE, FilterType::Lanczos3)
    } else {
        img
    };
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Jpeg)?;
    Ok(out)
}

pub fn avatar_dir(media_dir: &str) -> PathBuf {
    Path::new(media_dir).join("avatars")
}

/// Avatar file names are `{uuid}.jpg`; anything else is refused before touching disk.
pub fn is_avatar_file_name(name: &str) -> bool {
    name.strip_suffix(".jpg")
        .map(|stem| Uuid::parse_str(stem).is_ok())
        .unwrap_or(false)
}

pub struct AvatarService;

impl AvatarService {
    /// Store a profile picture and return its public URL.
    pub async fn store(
        config: &Config,
        profile_id: Uuid,
        content_type: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<String> {
        if detect_image_ext(content_type, filename).is_none() {
            return Err(ApiError::validation(
                "Unsupported image format, use PNG, JPEG, WebP or GIF",
            ));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::validation("Image is too large (max 5 MB)"));
        }

        let jpeg = tokio::task::spawn_blocking(move || render_avatar(&bytes))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(|e| ApiError::validation(format!("Could not read image: {e}")))?;

        let dir = avatar_dir(&config.media_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(anyhow::Error::from)?;
        let file_name = format!("{profile_id}.jpg");
        tokio::fs::write(dir.join(&file_name), &jpeg)
            .await
            .map_err(anyhow::Error::from)?;

        tracing::info!("Stored avatar for profile {} ({} bytes)", profile_id, jpeg.len());
        Ok(format!(
            "{}/avatars/{}",
            config.app_base_url.trim_end_matches('/'),
            file_name
        ))
    }

    pub async fn read(config: &Config, file_name: &str) -> ApiResult<Vec<u8>> {
        if !is_avatar_file_name(file_name) {
            return Err(ApiError::not_found("Avatar"));
        }
        match tokio::fs::read(avatar_dir(&config.media_dir).join(file_name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::not_found("Avatar")),
            Err(e) => Err(anyhow::Error::from(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([200, 40, 40, 128]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_detect_image_ext() {
        assert_eq!(detect_image_ext("image/png", ""), Some("png"));
        assert_eq!(detect_image_ext("application/octet-stream", "me.JPEG"), Some("jpg"));
        assert_eq!(detect_image_ext("", "photo.webp"), Some("webp"));
        assert_eq!(detect_image_ext("text/plain", "notes.txt"), None);
        assert_eq!(detect_image_ext("", "noextension"), None);
    }

    #[test]
    fn test_render_avatar_fits_box() {
        let jpeg = render_avatar(&png_bytes(1024, 512)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.width(), 256);
        assert_eq!(out.height(), 128);
    }

    #[test]
    fn test_render_avatar_keeps_small_images() {
        let jpeg = render_avatar(&png_bytes(64, 64)).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((out.width(), out.height()), (64, 64));
    }

    #[test]
    fn test_render_avatar_rejects_garbage() {
        assert!(render_avatar(b"not an image").is_err());
    }

    #[test]
    fn test_avatar_file_names() {
        let id = Uuid::new_v4();
        assert!(is_avatar_file_name(&format!("{id}.jpg")));
        assert!(!is_avatar_file_name("../etc/passwd"));
        assert!(!is_avatar_file_name(&format!("{id}.png")));
        assert!(!is_avatar_file_name("x.jpg"));
    }
}
