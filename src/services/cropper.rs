use crate::models::CropRegion;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CropError {
    #[error("invalid crop region {0:?}")]
    InvalidRegion(CropRegion),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crop task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait Cropper: Send + Sync {
    /// Writes the `region` of `src` to `dst`. The output format follows the `dst` extension.
    async fn crop(&self, src: &Path, dst: &Path, region: CropRegion) -> Result<(), CropError>;
}

/// Cropper backed by the `image` crate; anchors the region at the top-left corner.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCropper;

#[async_trait]
impl Cropper for ImageCropper {
    async fn crop(&self, src: &Path, dst: &Path, region: CropRegion) -> Result<(), CropError> {
        let src: PathBuf = src.to_path_buf();
        let dst: PathBuf = dst.to_path_buf();
        tokio::task::spawn_blocking(move || crop_blocking(&src, &dst, region))
            .await
            .map_err(|e| CropError::Task(e.to_string()))?
    }
}

fn crop_blocking(src: &Path, dst: &Path, region: CropRegion) -> Result<(), CropError> {
    if region.width <= 0 || region.height <= 0 || region.x < 0 || region.y < 0 {
        return Err(CropError::InvalidRegion(region));
    }

    // Staged files carry no extension, so sniff the format from the content
    let img = image::io::Reader::open(src)?
        .with_guessed_format()?
        .decode()?;

    let cropped = img.crop_imm(
        clamp_u32(region.x),
        clamp_u32(region.y),
        clamp_u32(region.width),
        clamp_u32(region.height),
    );
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(CropError::InvalidRegion(region));
    }

    let format = ImageFormat::from_path(dst)?;
    let output = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(cropped.to_rgb8()),
        _ => cropped,
    };
    output.save_with_format(dst, format)?;
    Ok(())
}

fn clamp_u32(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[tokio::test]
    async fn test_crop_png_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload-abc");
        let dst = dir.path().join("crop-1.png");
        write_png(&src, 300, 200);

        let region = CropRegion {
            x: 10,
            y: 20,
            width: 100,
            height: 50,
        };
        ImageCropper.crop(&src, &dst, region).await.unwrap();

        let out = image::open(&dst).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_crop_to_jpeg_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload-def");
        let dst = dir.path().join("crop-2.jpg");
        write_png(&src, 120, 120);

        let region = CropRegion {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        ImageCropper.crop(&src, &dst, region).await.unwrap();
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn test_rejects_empty_region() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload-ghi");
        let dst = dir.path().join("crop-3.png");
        write_png(&src, 10, 10);

        let region = CropRegion {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        };
        let err = ImageCropper.crop(&src, &dst, region).await.unwrap_err();
        assert!(matches!(err, CropError::InvalidRegion(_)));
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_rejects_non_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("upload-txt");
        let dst = dir.path().join("crop-4.png");
        std::fs::write(&src, b"definitely not an image").unwrap();

        let region = CropRegion {
            x: 0,
            y: 0,
            width: 5,
            height: 5,
        };
        assert!(ImageCropper.crop(&src, &dst, region).await.is_err());
    }
}
