//! Raster images: format detection, physical size and asset directories.

use deck_core::units::{px_to_emu, DEFAULT_DPI};
use deck_core::{Error, Result, SkipReason, Skipped};
use std::io::Cursor;
use std::path::Path;

/// File extensions picked up from asset directories.
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Raster formats that can be embedded in a slide.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Sniff the format from the leading bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        match imagesize::image_type(data).ok()? {
            imagesize::ImageType::Png => Some(ImageFormat::Png),
            imagesize::ImageType::Jpeg => Some(ImageFormat::Jpeg),
            imagesize::ImageType::Gif => Some(ImageFormat::Gif),
            imagesize::ImageType::Bmp => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Extension used for media part names.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// Image bytes with their detected format.
#[derive(Clone, PartialEq, Debug)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageData {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = ImageFormat::detect(&bytes).ok_or_else(|| {
            Error::ImageError("not a PNG, JPEG, GIF or BMP image".to_string())
        })?;
        Ok(Self { bytes, format })
    }

    /// Pixel dimensions.
    pub fn pixel_size(&self) -> Result<(u32, u32)> {
        let size = imagesize::blob_size(&self.bytes)
            .map_err(|e| Error::ImageError(format!("cannot read image size: {}", e)))?;
        let width = u32::try_from(size.width)
            .map_err(|_| Error::ImageError(format!("image width {} out of range", size.width)))?;
        let height = u32::try_from(size.height)
            .map_err(|_| Error::ImageError(format!("image height {} out of range", size.height)))?;
        Ok((width, height))
    }

    /// Horizontal and vertical resolution, 96 dpi where unknown.
    pub fn dpi(&self) -> (f64, f64) {
        let dpi = match self.format {
            ImageFormat::Png => png_dpi(&self.bytes),
            ImageFormat::Jpeg => jfif_dpi(&self.bytes),
            ImageFormat::Bmp => bmp_dpi(&self.bytes),
            ImageFormat::Gif => None,
        };
        let (x, y) = dpi.unwrap_or((DEFAULT_DPI, DEFAULT_DPI));
        (sanitize_dpi(x), sanitize_dpi(y))
    }

    /// Native size in EMU at the image's own resolution.
    pub fn native_size(&self) -> Result<(i64, i64)> {
        let (width, height) = self.pixel_size()?;
        let (dpi_x, dpi_y) = self.dpi();
        Ok((px_to_emu(width, dpi_x), px_to_emu(height, dpi_y)))
    }
}

fn sanitize_dpi(dpi: f64) -> f64 {
    if dpi.is_finite() && dpi > 0.0 {
        dpi
    } else {
        DEFAULT_DPI
    }
}

/// `pHYs` density, when given in pixels per metre.
fn png_dpi(data: &[u8]) -> Option<(f64, f64)> {
    let decoder = png::Decoder::new(Cursor::new(data));
    let reader = decoder.read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    match dims.unit {
        png::Unit::Meter => Some((dims.xppu as f64 * 0.0254, dims.yppu as f64 * 0.0254)),
        png::Unit::Unspecified => None,
    }
}

/// Density from a JFIF APP0 segment directly after SOI.
fn jfif_dpi(data: &[u8]) -> Option<(f64, f64)> {
    if data.len() < 18 || data[0..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &data[6..11] != b"JFIF\0" {
        return None;
    }
    let x = u16::from_be_bytes([data[14], data[15]]) as f64;
    let y = u16::from_be_bytes([data[16], data[17]]) as f64;
    match data[13] {
        1 => Some((x, y)),
        2 => Some((x * 2.54, y * 2.54)),
        _ => None,
    }
}

/// Pixels per metre from a BITMAPINFOHEADER (or later) DIB header.
fn bmp_dpi(data: &[u8]) -> Option<(f64, f64)> {
    if data.len() < 46 || &data[0..2] != b"BM" {
        return None;
    }
    let header_size = u32::from_le_bytes([data[14], data[15], data[16], data[17]]);
    if header_size < 40 {
        return None;
    }
    let x = i32::from_le_bytes([data[38], data[39], data[40], data[41]]);
    let y = i32::from_le_bytes([data[42], data[43], data[44], data[45]]);
    if x <= 0 || y <= 0 {
        return None;
    }
    Some((x as f64 * 0.0254, y as f64 * 0.0254))
}

/// A decorative image with its physical size.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    /// File name, used as the picture's alt text.
    pub name: String,
    pub image: ImageData,
    /// Width in EMU.
    pub width: i64,
    /// Height in EMU.
    pub height: i64,
}

impl ImageAsset {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let image = ImageData::from_bytes(bytes)?;
        let (width, height) = image.native_size()?;
        Ok(Self {
            name: name.into(),
            image,
            width,
            height,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, bytes)
    }
}

fn is_raster(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| RASTER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load every raster image in `dir`, sorted by file name.
///
/// A missing directory yields nothing; unreadable images are skipped.
pub fn load_asset_dir(dir: &Path) -> (Vec<ImageAsset>, Vec<Skipped>) {
    let mut assets = Vec::new();
    let mut skipped = Vec::new();

    if !dir.is_dir() {
        log::debug!("Asset directory {} not found", dir.display());
        return (assets, skipped);
    }

    let mut paths: Vec<_> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            log::warn!("Could not list {}: {}", dir.display(), e);
            skipped.push(Skipped::new(
                dir.display().to_string(),
                SkipReason::Failed(e.to_string()),
            ));
            return (assets, skipped);
        }
    };
    paths.sort();

    for path in paths {
        if !is_raster(&path) {
            log::debug!("Skipping non-raster file {}", path.display());
            continue;
        }
        match ImageAsset::load(&path) {
            Ok(asset) => assets.push(asset),
            Err(e) => {
                log::warn!("Could not load {}: {}", path.display(), e);
                skipped.push(Skipped::new(
                    path.display().to_string(),
                    SkipReason::Failed(e.to_string()),
                ));
            }
        }
    }

    (assets, skipped)
}

/// Assets from the primary directory followed by the supplementary one.
pub fn load_decorations(primary: &Path, supplementary: &Path) -> (Vec<ImageAsset>, Vec<Skipped>) {
    let (mut assets, mut skipped) = load_asset_dir(primary);
    let (more, more_skipped) = load_asset_dir(supplementary);
    assets.extend(more);
    skipped.extend(more_skipped);
    log::debug!(
        "Loaded {} decorative elements from {} and {}",
        assets.len(),
        primary.display(),
        supplementary.display()
    );
    (assets, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::png_bytes;
    use deck_core::units::inches;

    #[test]
    fn test_detect_format() {
        assert_eq!(ImageFormat::detect(&png_bytes(2, 2, None)), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"), None);
        assert!(ImageData::from_bytes(b"not an image".to_vec()).is_err());
    }

    #[test]
    fn test_png_size_default_dpi() {
        let asset = ImageAsset::from_bytes("a.png", png_bytes(192, 96, None)).unwrap();
        assert_eq!(asset.image.dpi(), (96.0, 96.0));
        assert_eq!(asset.width, inches(2.0));
        assert_eq!(asset.height, inches(1.0));
    }

    #[test]
    fn test_png_phys_dpi() {
        // 11811 px/m is 299.9994 dpi
        let image = ImageData::from_bytes(png_bytes(300, 300, Some(11_811))).unwrap();
        let (x, y) = image.dpi();
        assert!((x - 300.0).abs() < 0.01);
        assert!((y - 300.0).abs() < 0.01);
    }

    #[test]
    fn test_jfif_and_bmp_density() {
        let mut jfif = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        jfif.extend_from_slice(b"JFIF\0");
        jfif.extend_from_slice(&[1, 1, 1, 0, 72, 0, 144]);
        assert_eq!(jfif_dpi(&jfif), Some((72.0, 144.0)));

        jfif[13] = 0;
        assert_eq!(jfif_dpi(&jfif), None);

        let mut bmp = vec![0u8; 54];
        bmp[0..2].copy_from_slice(b"BM");
        bmp[14..18].copy_from_slice(&40u32.to_le_bytes());
        bmp[38..42].copy_from_slice(&3780i32.to_le_bytes());
        bmp[42..46].copy_from_slice(&3780i32.to_le_bytes());
        let (x, _) = bmp_dpi(&bmp).unwrap();
        assert!((x - 96.012).abs() < 0.001);

        bmp[38..42].copy_from_slice(&0i32.to_le_bytes());
        assert_eq!(bmp_dpi(&bmp), None);
    }

    #[test]
    fn test_load_asset_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), png_bytes(10, 10, None)).unwrap();
        std::fs::write(dir.path().join("a.PNG"), png_bytes(20, 20, None)).unwrap();
        std::fs::write(dir.path().join("c.svg"), b"<svg/>").unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"nope").unwrap();

        let (assets, skipped) = load_asset_dir(dir.path());
        let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.PNG", "b.png"]);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].target.ends_with("broken.jpg"));
    }

    #[test]
    fn test_load_decorations_order() {
        let primary = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        std::fs::write(primary.path().join("z.png"), png_bytes(4, 4, None)).unwrap();
        std::fs::write(extra.path().join("a.png"), png_bytes(4, 4, None)).unwrap();

        let (assets, skipped) = load_decorations(primary.path(), extra.path());
        assert!(skipped.is_empty());
        let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["z.png", "a.png"]);

        let (none, _) = load_decorations(&primary.path().join("missing"), &extra.path().join("missing"));
        assert!(none.is_empty());
    }
}
