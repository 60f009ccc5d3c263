//! Output helpers for composite images and their metadata

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::RgbaImage;

use crate::atlas::AtlasMetadata;

/// Write an image as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), image::ImageError> {
    image.save_with_format(path, image::ImageFormat::Png)
}

/// Write atlas layout metadata as pretty-printed JSON.
pub fn save_metadata(meta: &AtlasMetadata, path: &Path) -> Result<(), std::io::Error> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), meta)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn test_save_png_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tile.png");
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));

        save_png(&img, &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_save_metadata_writes_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blue.json");
        let meta = AtlasMetadata::new(Path::new("blue.png"), 64, 7, 5, 33);

        save_metadata(&meta, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"blue.png\""));
        assert!(text.contains("\"count\": 33"));
    }
}
