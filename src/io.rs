use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use log::info;

use crate::canvas::{MaskStore, SourceImage};
use crate::error::{Result, StickerError};
use crate::ops::compositor::ExportCell;

/// Image extensions the loader accepts.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

// ============================================================================
// LOADING
// ============================================================================

/// Read and decode an image file into a source image.
pub fn load_source(path: &Path) -> Result<SourceImage> {
    let bytes = std::fs::read(path)?;
    SourceImage::decode(&bytes)
}

/// Load a mask file for an image of `expected` size.
///
/// Images with an alpha channel contribute their alpha; opaque images
/// (e.g. greyscale masks) contribute their luminance.
pub fn load_mask(path: &Path, expected: (u32, u32)) -> Result<MaskStore> {
    let bytes = std::fs::read(path)?;
    let decoded = image::load_from_memory(&bytes).map_err(StickerError::Decode)?;
    if (decoded.width(), decoded.height()) != expected {
        return Err(StickerError::DimensionMismatch {
            expected,
            actual: (decoded.width(), decoded.height()),
        });
    }
    if decoded.color().has_alpha() {
        Ok(MaskStore::from_rgba(&decoded.into_rgba8()))
    } else {
        let luma = decoded.into_luma8();
        MaskStore::from_alpha(expected.0, expected.1, luma.as_raw())
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode as an RGBA8 PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .map_err(StickerError::Encode)?;
    Ok(out)
}

/// `data:image/png;base64,...` for already-encoded PNG bytes.
pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

pub fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    PngEncoder::new(writer)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .map_err(StickerError::Encode)?;
    Ok(())
}

pub fn cell_file_name(stem: &str, row: usize, col: usize) -> String {
    format!("{}_r{}_c{}.png", stem, row, col)
}

/// Write every split cell as `<stem>_r<row>_c<col>.png` under `dir`.
pub fn write_cells(dir: &Path, stem: &str, cells: &[ExportCell]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(cells.len());
    for cell in cells {
        let path = dir.join(cell_file_name(stem, cell.row, cell.col));
        write_png(&cell.image, &path)?;
        written.push(path);
    }
    info!("wrote {} cell(s) to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelRect;
    use image::{GrayImage, Luma, Rgba};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("stickercut-io-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn png_bytes_decode_back() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let png = encode_png(&img).unwrap();
        let src = SourceImage::decode(&png).unwrap();
        assert_eq!(src.pixels().unwrap(), &img);
    }

    #[test]
    fn data_url_has_png_prefix() {
        let url = to_data_url(&[0x89, b'P', b'N', b'G']);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = SourceImage::decode(b"not an image").unwrap_err();
        assert!(matches!(err, StickerError::Decode(_)));
    }

    #[test]
    fn greyscale_mask_uses_luminance() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mask.png");
        GrayImage::from_fn(4, 2, |x, _| Luma([if x < 2 { 0 } else { 255 }]))
            .save(&path)
            .unwrap();
        let mask = load_mask(&path, (4, 2)).unwrap();
        assert_eq!(mask.alpha(0, 0), 0);
        assert_eq!(mask.alpha(3, 1), 255);
        assert!(matches!(
            load_mask(&path, (5, 5)),
            Err(StickerError::DimensionMismatch { .. })
        ));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn cells_are_written_with_grid_names() {
        let dir = temp_dir();
        let cells = vec![ExportCell {
            row: 1,
            col: 2,
            rect: PixelRect::new(0, 0, 2, 2),
            image: RgbaImage::new(2, 2),
        }];
        let written = write_cells(&dir, "sheet", &cells).unwrap();
        assert_eq!(written, vec![dir.join("sheet_r1_c2.png")]);
        assert!(written[0].exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
