//! Atlas extraction - ties the scheduler, stores, separator and packer
//! together
//!
//! [`AtlasExtractor`] is the batch consumer: each input file is decoded,
//! scanned tile by tile into a fresh per-file store, and the stores sort
//! themselves into the colour registry as their themes resolve. Between
//! rounds the separator peels common sprites off completed colour sets; at
//! the end, one composite per colour plus the common composite are written.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use thiserror::Error;

use crate::atlas::{self, AtlasMetadata};
use crate::batch::{self, BatchConsumer, BatchError};
use crate::color::ThemeColor;
use crate::output;
use crate::separate::Separator;
use crate::sprite::{SpriteCrop, TileRect};
use crate::store::{Registry, SpriteStore};

/// Side length of one sprite tile in the editor view, in pixels.
pub const SPRITE_SIZE: u32 = 64;

/// Number of colour themes a full extraction produces.
pub const NUM_THEMES: usize = 6;

/// Concurrency cap for a scheduler round.
pub const MAX_CONCURRENT_FILES: usize = 6;

/// Error from an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Batch consumer that builds per-theme sprite sets from screenshots.
#[derive(Default)]
pub struct AtlasExtractor {
    registry: Registry,
    separator: Mutex<Separator>,
}

impl AtlasExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Snapshot of the common sprites identified so far.
    pub fn common_sprites(&self) -> Vec<Arc<crate::sprite::DistinctSprite>> {
        self.separator.lock().unwrap().common().to_vec()
    }

    /// Snapshot of one colour's themed sprites, if separated.
    pub fn themed_sprites(
        &self,
        color: ThemeColor,
    ) -> Option<Vec<Arc<crate::sprite::DistinctSprite>>> {
        self.separator
            .lock()
            .unwrap()
            .themed(color)
            .map(|s| s.to_vec())
    }

    /// Process every numbered screenshot in `input_dir`, then write the
    /// per-colour composites, the common composite and the individual common
    /// sprites into `output_dir`.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<(), ExtractError> {
        let pattern = input_dir.join("[0-9]*.png");
        batch::process_matching(
            &pattern.to_string_lossy(),
            self,
            MAX_CONCURRENT_FILES,
        )?;
        self.write_outputs(output_dir)
    }

    fn write_outputs(&self, output_dir: &Path) -> Result<(), ExtractError> {
        fs::create_dir_all(output_dir)?;

        for (color, store) in self.registry.canonical_stores() {
            let sprites = store.sprites_snapshot();
            if sprites.is_empty() {
                continue;
            }
            let images: Vec<&RgbaImage> = sprites.iter().map(|s| s.image()).collect();
            self.write_atlas(output_dir, color.file_stem(), &images)?;
            println!("Wrote {} atlas with {} sprites", color, images.len());
        }

        let common = self.common_sprites();
        if common.is_empty() {
            println!("No common sprites identified");
            return Ok(());
        }
        // Individual numbered copies for inspection, then the composite
        for (i, sprite) in common.iter().enumerate() {
            output::save_png(sprite.image(), &output_dir.join(format!("{}.png", i)))?;
        }
        let images: Vec<&RgbaImage> = common.iter().map(|s| s.image()).collect();
        self.write_atlas(output_dir, "common", &images)?;
        println!("Wrote common atlas with {} sprites", images.len());
        Ok(())
    }

    fn write_atlas(
        &self,
        output_dir: &Path,
        stem: &str,
        images: &[&RgbaImage],
    ) -> Result<(), ExtractError> {
        let png_path = output_dir.join(format!("{}.png", stem));
        let (columns, rows) = atlas::best_fit(images.len());
        let composite = atlas::compose(images);
        output::save_png(&composite, &png_path)?;

        let meta = AtlasMetadata::new(&png_path, images[0].width(), columns, rows, images.len());
        output::save_metadata(&meta, &output_dir.join(format!("{}.json", stem)))?;
        Ok(())
    }
}

impl BatchConsumer for AtlasExtractor {
    fn process_file(&self, path: &Path) {
        let image = match image::open(path) {
            Ok(img) => Arc::new(img.to_rgba8()),
            Err(e) => {
                eprintln!("Skipping '{}': {}", path.display(), e);
                return;
            }
        };
        let leaf = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        println!("Processing {}", leaf);

        let store = SpriteStore::new(leaf.clone());
        let columns = image.width() / SPRITE_SIZE;
        let rows = image.height() / SPRITE_SIZE;
        'scan: for row in 0..rows {
            for col in 0..columns {
                if store.is_complete() {
                    break 'scan;
                }
                let rect = TileRect::new(
                    col * SPRITE_SIZE,
                    row * SPRITE_SIZE,
                    SPRITE_SIZE,
                    SPRITE_SIZE,
                );
                let crop = SpriteCrop::new(Arc::clone(&image), rect, leaf.clone());
                store.try_add(&crop, &self.registry);
            }
        }
        println!("Finished {}", store.describe());
    }

    fn minimum_files_needed(&self) -> usize {
        let stores = self.registry.canonical_stores();
        let mut needed = NUM_THEMES;
        let mut complete = String::new();
        let mut partial = String::new();
        for (color, store) in &stores {
            if store.is_complete() {
                needed = needed.saturating_sub(1);
                complete += &format!(" {}", color);
            } else {
                partial += &format!(" {} ({})", color, store.len());
            }
        }
        println!("Colours with complete set:{}", complete);
        println!("Colours with partial set:{}", partial);
        needed
    }

    fn finish_batch(&self) {
        self.separator.lock().unwrap().advance(&self.registry);
    }

    fn finish(&self) {
        let mut separator = self.separator.lock().unwrap();
        if self.registry.canonical_stores().len() < 2 {
            println!("Not enough data sets to find common sprites");
        } else {
            separator.finish(&self.registry);
        }

        let stores = self.registry.canonical_stores();
        println!("Finished with {} data sets", stores.len());
        for (color, store) in &stores {
            if !store.is_complete() {
                println!("  {} has {} sprites", color, store.len());
            }
        }
    }
}

/// Extract atlases from `input_dir` into `output_dir`.
pub fn run(input_dir: &Path, output_dir: &Path) -> Result<(), ExtractError> {
    AtlasExtractor::new().run(input_dir, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    /// A 64px tile filled with shades of blue, pattern varying by seed.
    fn blue_tile_pixel(seed: u32, x: u32, y: u32) -> Rgba<u8> {
        let v = 100 + ((seed * 13 + x / 8 + (y / 8) * 3) % 156) as u8;
        Rgba([0, 0, v, 255])
    }

    fn write_blue_screenshot(path: &Path, tiles: u32) {
        let img = RgbaImage::from_fn(tiles * SPRITE_SIZE, SPRITE_SIZE, |x, y| {
            blue_tile_pixel(x / SPRITE_SIZE, x % SPRITE_SIZE, y)
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_minimum_files_needed_starts_at_theme_count() {
        let extractor = AtlasExtractor::new();
        assert_eq!(extractor.minimum_files_needed(), NUM_THEMES);
    }

    #[test]
    fn test_process_file_registers_partial_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("01.png");
        write_blue_screenshot(&path, 3);

        let extractor = AtlasExtractor::new();
        extractor.process_file(&path);

        let store = extractor
            .registry()
            .canonical(ThemeColor::Blue)
            .expect("blue store registered");
        assert_eq!(store.len(), 3);
        assert!(!store.is_complete());
        // Still needs all six themes
        assert_eq!(extractor.minimum_files_needed(), NUM_THEMES);
    }

    #[test]
    fn test_process_file_dedups_repeated_tiles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("01.png");
        // Two distinct tiles, each repeated twice
        let img = RgbaImage::from_fn(4 * SPRITE_SIZE, SPRITE_SIZE, |x, y| {
            blue_tile_pixel((x / SPRITE_SIZE) % 2, x % SPRITE_SIZE, y)
        });
        img.save(&path).unwrap();

        let extractor = AtlasExtractor::new();
        extractor.process_file(&path);

        let store = extractor.registry().canonical(ThemeColor::Blue).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_process_file_undecodable_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("01.png");
        fs::write(&path, b"not a png").unwrap();

        let extractor = AtlasExtractor::new();
        // Must not panic, and must leave no state behind
        extractor.process_file(&path);
        assert!(extractor.registry().canonical_stores().is_empty());
    }

    #[test]
    fn test_write_outputs_per_colour_and_common() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let extractor = AtlasExtractor::new();

        // Two small complete stores sharing one tile
        let shared = Arc::new(RgbaImage::from_pixel(8, 8, Rgba([90, 90, 90, 255])));
        for (color, name, solid) in [
            (ThemeColor::Blue, "a.png", Rgba([0, 0, 200, 255])),
            (ThemeColor::Red, "b.png", Rgba([200, 0, 0, 255])),
        ] {
            let store = SpriteStore::with_target(name, 2);
            extractor.registry().claim(color, &store);
            let own = Arc::new(RgbaImage::from_pixel(8, 8, solid));
            store.try_add(
                &SpriteCrop::new(Arc::clone(&own), TileRect::of(&own), name),
                extractor.registry(),
            );
            store.try_add(
                &SpriteCrop::new(Arc::clone(&shared), TileRect::of(&shared), name),
                extractor.registry(),
            );
            assert!(store.is_complete());
        }
        extractor.finish();
        extractor.write_outputs(&out).unwrap();

        assert!(out.join("blue.png").exists());
        assert!(out.join("blue.json").exists());
        assert!(out.join("red.png").exists());
        assert!(out.join("common.png").exists());
        assert!(out.join("common.json").exists());
        // One shared tile, written individually as 0.png
        assert!(out.join("0.png").exists());
        assert!(!out.join("1.png").exists());
    }
}
