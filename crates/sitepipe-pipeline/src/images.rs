//! Image copying and optimization.
//!
//! Images keep their path relative to the glob base. When optimizing, PNGs
//! are decoded and re-encoded at the best compression level; the smaller of
//! the two encodings is written. Animated PNGs and PNGs carrying color
//! management chunks are copied as-is, since re-encoding keeps only the
//! first frame and the pixel data. Other formats are copied unchanged.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{
    ImageEncoder, ImageFormat,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};
use tracing::debug;

use crate::{
    error::{PipelineError, Result},
    sources::SourceSet,
    stage::{StageReport, Transform, write_output},
};

/// Copies images beneath the destination, optionally recompressing PNGs.
#[derive(Debug, Clone, Default)]
pub struct ImagesTransform {
    optimize: bool,
}

impl ImagesTransform {
    /// Copy images unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompress still PNGs without changing their pixels.
    #[must_use]
    pub fn optimized(mut self) -> Self {
        self.optimize = true;
        self
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Chunks a re-encode would drop: animation control and color management.
const PRESERVED_CHUNKS: [&[u8; 4]; 5] = [b"acTL", b"iCCP", b"gAMA", b"cHRM", b"sRGB"];

/// Whether any chunk before the image data is one of `names`.
fn has_chunk(png: &[u8], names: &[&[u8; 4]]) -> bool {
    let mut pos = 8;
    while let Some(header) = png.get(pos..pos + 8) {
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = &header[4..8];
        if kind == b"IDAT" {
            return false;
        }
        if names.iter().any(|name| kind == name.as_slice()) {
            return true;
        }
        pos += 12 + len;
    }
    false
}

/// Re-encode a PNG, returning the new bytes only when they are smaller.
fn recompress_png(path: &Path, original: &[u8]) -> Result<Option<Vec<u8>>> {
    if has_chunk(original, &PRESERVED_CHUNKS) {
        debug!(path = %path.display(), "keeping animated or color-managed PNG");
        return Ok(None);
    }

    let decoded = image::load_from_memory_with_format(original, ImageFormat::Png)
        .map_err(|e| PipelineError::transform(path, e.to_string()))?;

    let mut encoded = Vec::new();
    PngEncoder::new_with_quality(&mut encoded, CompressionType::Best, FilterType::Adaptive)
        .write_image(
            decoded.as_bytes(),
            decoded.width(),
            decoded.height(),
            decoded.color(),
        )
        .map_err(|e| PipelineError::transform(path, e.to_string()))?;

    Ok((encoded.len() < original.len()).then_some(encoded))
}

impl Transform for ImagesTransform {
    fn apply(&self, sources: &SourceSet, dest: &Path) -> Result<StageReport> {
        let mut outputs: Vec<(PathBuf, Vec<u8>)> = Vec::with_capacity(sources.len());
        let mut saved = 0usize;

        for file in sources.iter() {
            let original = fs::read(&file.path)?;
            let bytes = if self.optimize && is_png(&file.path) {
                match recompress_png(&file.path, &original)? {
                    Some(smaller) => {
                        saved += original.len() - smaller.len();
                        smaller
                    }
                    None => original,
                }
            } else {
                original
            };
            outputs.push((dest.join(&file.relative), bytes));
        }

        let mut report = StageReport::default();
        for (path, bytes) in &outputs {
            report.bytes += write_output(path, bytes)?;
            report.outputs += 1;
        }
        if self.optimize {
            debug!(saved_bytes = saved, "optimized images");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba};
    use tempfile::TempDir;

    use super::*;

    fn loose_png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(64, 64, Rgba([200u8, 40, 40, 255]));
        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(&mut bytes, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 64, 64, image::ColorType::Rgba8)
            .unwrap();
        bytes
    }

    /// A flat-colored PNG written with the fastest compression.
    fn loose_png(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, loose_png_bytes()).unwrap();
    }

    /// `png` with an extra chunk right after IHDR. The CRC is left zeroed.
    fn with_chunk(png: &[u8], kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let after_ihdr = 8 + 12 + 13;
        let mut out = png[..after_ihdr].to_vec();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&png[after_ihdr..]);
        out
    }

    fn images(dir: &TempDir) -> SourceSet {
        SourceSet::resolve(dir.path(), &["src/img/**/*".to_string()]).unwrap()
    }

    #[test]
    fn test_copy_preserves_relative_paths() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/img/icons")).unwrap();
        fs::write(dir.path().join("src/img/icons/logo.svg"), "<svg/>").unwrap();
        let dest = dir.path().join("dist/img");

        let report = ImagesTransform::new().apply(&images(&dir), &dest).unwrap();

        assert_eq!(report.outputs, 1);
        assert_eq!(
            fs::read_to_string(dest.join("icons/logo.svg")).unwrap(),
            "<svg/>"
        );
    }

    #[test]
    fn test_optimized_png_is_not_larger() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src/img/flat.png");
        loose_png(&src);
        let dest = dir.path().join("build/img");

        ImagesTransform::new()
            .optimized()
            .apply(&images(&dir), &dest)
            .unwrap();

        let before = fs::metadata(&src).unwrap().len();
        let after = fs::metadata(dest.join("flat.png")).unwrap().len();
        assert!(after <= before);
        image::open(dest.join("flat.png")).unwrap();
    }

    #[test]
    fn test_detects_chunks_before_image_data() {
        let plain = loose_png_bytes();
        assert!(!has_chunk(&plain, &PRESERVED_CHUNKS));

        let animated = with_chunk(&plain, b"acTL", &[0, 0, 0, 4, 0, 0, 0, 0]);
        assert!(has_chunk(&animated, &PRESERVED_CHUNKS));
        assert!(has_chunk(&with_chunk(&plain, b"gAMA", &[0, 0, 177, 143]), &PRESERVED_CHUNKS));
    }

    #[test]
    fn test_animated_png_is_copied_unchanged() {
        let dir = TempDir::new().unwrap();
        let animated = with_chunk(&loose_png_bytes(), b"acTL", &[0, 0, 0, 4, 0, 0, 0, 0]);
        fs::create_dir_all(dir.path().join("src/img")).unwrap();
        fs::write(dir.path().join("src/img/spinner.png"), &animated).unwrap();
        let dest = dir.path().join("build/img");

        ImagesTransform::new()
            .optimized()
            .apply(&images(&dir), &dest)
            .unwrap();

        assert_eq!(fs::read(dest.join("spinner.png")).unwrap(), animated);
    }

    #[test]
    fn test_corrupt_png_is_transform_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/img")).unwrap();
        fs::write(dir.path().join("src/img/bad.png"), b"not a png").unwrap();
        fs::write(dir.path().join("src/img/good.gif"), b"GIF89a").unwrap();
        let dest = dir.path().join("build/img");

        let err = ImagesTransform::new()
            .optimized()
            .apply(&images(&dir), &dest)
            .unwrap_err();

        assert!(err.is_transform());
        assert!(!dest.join("good.gif").exists());
    }
}
