//! Atlas packing - arranges equal-size square tiles into one composite image
//!
//! The layout search balances last-row wastage against squareness: a long,
//! skinny atlas is ugly, but so is a mostly-empty last row. Both terms were
//! tuned by eye against real sprite sets; the column cap keeps atlases
//! readable in an image viewer.

use std::path::Path;

use image::RgbaImage;
use serde::Serialize;

/// Widest layout considered.
pub const MAX_COLUMNS: usize = 8;

/// Layout metadata written as JSON next to each composite.
#[derive(Debug, Clone, Serialize)]
pub struct AtlasMetadata {
    /// File name of the composite image this describes.
    pub image: String,
    /// Side length of one square tile, in pixels.
    pub tile: u32,
    pub columns: usize,
    pub rows: usize,
    /// Number of occupied cells; trailing cells beyond this are blank.
    pub count: usize,
}

impl AtlasMetadata {
    pub fn new(image_name: &Path, tile: u32, columns: usize, rows: usize, count: usize) -> Self {
        Self {
            image: image_name
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            tile,
            columns,
            rows,
            count,
        }
    }
}

/// Quality score for arranging `num_tiles` in `columns` columns. Lower is
/// better.
pub fn quality(num_tiles: usize, columns: usize) -> f64 {
    let rows = num_tiles.div_ceil(columns);
    let wastage = columns * rows - num_tiles;
    wastage as f64 / (columns as f64).sqrt() + (columns as f64 / rows as f64).sqrt()
}

/// Best (columns, rows) for `num_tiles` uniform square tiles.
///
/// Searches columns from the square root of the count up to
/// [`MAX_COLUMNS`], so the result always satisfies `columns * rows >=
/// num_tiles` and `columns <= 8`.
pub fn best_fit(num_tiles: usize) -> (usize, usize) {
    if num_tiles == 0 {
        return (0, 0);
    }
    let max_columns = num_tiles.min(MAX_COLUMNS);
    let square = ((num_tiles as f64).sqrt().ceil() as usize).min(max_columns);

    let mut columns = square;
    let mut best = quality(num_tiles, columns);
    for candidate in square + 1..=max_columns {
        let q = quality(num_tiles, candidate);
        if q < best {
            best = q;
            columns = candidate;
        }
    }
    let rows = num_tiles.div_ceil(columns);
    println!("Best fit for {} tiles is {}x{}", num_tiles, columns, rows);
    (columns, rows)
}

/// Compose equal-size square tiles into one image, row-major, with trailing
/// cells left transparent. An empty input yields an empty image.
pub fn compose(tiles: &[&RgbaImage]) -> RgbaImage {
    let Some(first) = tiles.first() else {
        return RgbaImage::new(0, 0);
    };
    let (columns, rows) = best_fit(tiles.len());
    let tw = first.width();
    let th = first.height();
    // RgbaImage::new zero-fills, so unused cells come out transparent
    let mut atlas = RgbaImage::new(columns as u32 * tw, rows as u32 * th);
    for (i, tile) in tiles.iter().enumerate() {
        let x0 = (i % columns) as u32 * tw;
        let y0 = (i / columns) as u32 * th;
        for y in 0..tile.height().min(th) {
            for x in 0..tile.width().min(tw) {
                atlas.put_pixel(x0 + x, y0 + y, *tile.get_pixel(x, y));
            }
        }
    }
    atlas
}
