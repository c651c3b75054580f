use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, GrayImage, Luma};
use tracing::debug;

use crate::app::error::OcrError;
use crate::config::OcrConfig;

/// 3x3 smoothing kernel, pre-normalized
const SMOOTH: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Grayscale and enhance screenshots before recognition
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: OcrConfig,
}

impl ImagePreprocessor {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn process(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let gray = contrast(&gray, self.config.contrast);
        let gray = brightness(&gray, self.config.brightness);
        let gray = sharpen(&gray, self.config.sharpness);
        self.binarize(gray)
    }

    #[cfg(feature = "binarize")]
    fn binarize(&self, gray: GrayImage) -> GrayImage {
        if !self.config.binarize {
            return gray;
        }
        imageproc::contrast::adaptive_threshold(&gray, self.config.threshold_radius.max(1))
    }

    #[cfg(not(feature = "binarize"))]
    fn binarize(&self, gray: GrayImage) -> GrayImage {
        if self.config.binarize {
            debug!("Binarization unavailable in this build, skipping");
        }
        gray
    }

    /// Write the processed image next to `path` as `<stem>.prep.png`
    pub fn process_file(&self, path: &Path) -> Result<PathBuf, OcrError> {
        let image = image::open(path).map_err(|e| OcrError::Image(format!("{}: {}", path.display(), e)))?;
        let processed = self.process(&image);

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("capture");
        let out = path.with_file_name(format!("{}.prep.png", stem));
        processed
            .save(&out)
            .map_err(|e| OcrError::Image(format!("{}: {}", out.display(), e)))?;
        debug!("Preprocessed {} -> {}", path.display(), out.display());
        Ok(out)
    }
}

/// Scale distance from the mean level by `factor`
fn contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let pixels = (gray.width() as u64 * gray.height() as u64).max(1);
    let mean = gray.pixels().map(|p| p.0[0] as u64).sum::<u64>() as f32 / pixels as f32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0] as f32;
        Luma([clamp_u8(mean + factor * (v - mean))])
    })
}

fn brightness(gray: &GrayImage, factor: f32) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([clamp_u8(gray.get_pixel(x, y).0[0] as f32 * factor)])
    })
}

/// Push pixels away from their smoothed neighbourhood by `factor`
fn sharpen(gray: &GrayImage, factor: f32) -> GrayImage {
    let smooth: GrayImage = imageops::filter3x3(gray, &SMOOTH);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let s = smooth.get_pixel(x, y).0[0] as f32;
        let v = gray.get_pixel(x, y).0[0] as f32;
        Luma([clamp_u8(s + factor * (v - s))])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn config() -> OcrConfig {
        OcrConfig {
            contrast: 2.0,
            brightness: 1.1,
            sharpness: 1.5,
            binarize: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_contrast_stretches_around_mean() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([140]));

        let out = contrast(&img, 2.0);

        assert_eq!(out.get_pixel(0, 0).0[0], 80);
        assert_eq!(out.get_pixel(1, 0).0[0], 160);
    }

    #[test]
    fn test_brightness_saturates() {
        let img = GrayImage::from_pixel(1, 1, Luma([250]));
        assert_eq!(brightness(&img, 1.1).get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn test_flat_image_is_unchanged_by_sharpening() {
        let img = GrayImage::from_pixel(5, 5, Luma([120]));
        let v = sharpen(&img, 1.5).get_pixel(2, 2).0[0];
        assert!((119..=121).contains(&v), "got {}", v);
    }

    #[test]
    fn test_process_outputs_grayscale_of_same_size() {
        let rgb = RgbImage::from_pixel(16, 9, Rgb([10, 200, 30]));
        let out = ImagePreprocessor::new(config()).process(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(out.dimensions(), (16, 9));
    }

    #[test]
    fn test_process_file_writes_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page1_1.png");
        std::fs::write(&path, crate::browser::testing::tiny_png()).unwrap();

        let out = ImagePreprocessor::new(config()).process_file(&path).unwrap();

        assert_eq!(out, dir.path().join("page1_1.prep.png"));
        assert!(out.exists());
    }
}
