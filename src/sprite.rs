//! Sprite crops and exact region comparison
//!
//! A [`SpriteCrop`] is a lightweight view into a shared screenshot: a
//! rectangle plus an `Arc` to the source pixels. Crops are created per scanned
//! tile position and either discarded or promoted into a standalone
//! [`DistinctSprite`] once confirmed unique.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

/// A rectangular pixel region within an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl TileRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// The full bounds of an image.
    pub fn of(image: &RgbaImage) -> Self {
        Self { x: 0, y: 0, w: image.width(), h: image.height() }
    }
}

impl std::fmt::Display for TileRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}

/// Exact pixel-by-pixel comparison of two image regions.
///
/// True iff the regions have equal dimensions and every corresponding pixel
/// matches on all four channels. There is no tolerance; fuzzy matching belongs
/// to the colour classifier, not here. Random-access reads only, no
/// allocation.
pub fn regions_equal(
    img_a: &RgbaImage,
    rect_a: TileRect,
    img_b: &RgbaImage,
    rect_b: TileRect,
) -> bool {
    if rect_a.w != rect_b.w || rect_a.h != rect_b.h {
        return false;
    }
    for y in 0..rect_a.h {
        for x in 0..rect_a.w {
            let pa: &Rgba<u8> = img_a.get_pixel(rect_a.x + x, rect_a.y + y);
            let pb: &Rgba<u8> = img_b.get_pixel(rect_b.x + x, rect_b.y + y);
            if pa != pb {
                return false;
            }
        }
    }
    true
}

/// A tile-sized view into a source screenshot.
///
/// Transient: one is created per scanned tile position and dropped unless it
/// proves distinct. The source image is shared read-only across all crops cut
/// from the same file.
#[derive(Clone)]
pub struct SpriteCrop {
    /// Shared, read-only source screenshot.
    pub image: Arc<RgbaImage>,
    /// Region of the source this crop covers.
    pub rect: TileRect,
    /// Leaf name of the owning input file.
    pub source: String,
    /// Sample-point flag: when set, the dedup path prints diagnostics for
    /// this crop.
    pub probe: bool,
}

impl SpriteCrop {
    pub fn new(image: Arc<RgbaImage>, rect: TileRect, source: impl Into<String>) -> Self {
        Self { image, rect, source: source.into(), probe: false }
    }

    /// Exact comparison against another crop.
    pub fn same_pixels_as_crop(&self, other: &SpriteCrop) -> bool {
        regions_equal(&self.image, self.rect, &other.image, other.rect)
    }

    /// Exact comparison against a confirmed sprite.
    pub fn same_pixels_as(&self, sprite: &DistinctSprite) -> bool {
        regions_equal(
            &self.image,
            self.rect,
            sprite.image(),
            TileRect::of(sprite.image()),
        )
    }

    /// Copy this crop into its own pixel buffer.
    ///
    /// The only place a crop allocates. Called once, when the crop has been
    /// confirmed unique.
    pub fn materialize(&self) -> DistinctSprite {
        let mut pixels = RgbaImage::new(self.rect.w, self.rect.h);
        for y in 0..self.rect.h {
            for x in 0..self.rect.w {
                pixels.put_pixel(x, y, *self.image.get_pixel(self.rect.x + x, self.rect.y + y));
            }
        }
        DistinctSprite { pixels: Arc::new(pixels), source: self.source.clone() }
    }
}

impl std::fmt::Display for SpriteCrop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.source, self.rect)
    }
}

/// A sprite crop materialized into a standalone buffer.
///
/// Immutable after creation; shared via `Arc` so that store merges transfer
/// ownership without copying pixels.
pub struct DistinctSprite {
    pixels: Arc<RgbaImage>,
    source: String,
}

impl DistinctSprite {
    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Leaf name of the file this sprite was first seen in.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Exact comparison against another confirmed sprite.
    pub fn same_pixels(&self, other: &DistinctSprite) -> bool {
        regions_equal(
            &self.pixels,
            TileRect::of(&self.pixels),
            other.image(),
            TileRect::of(other.image()),
        )
    }

    /// Re-wrap this sprite as a crop over its own buffer, for forwarding into
    /// another store.
    pub fn as_crop(&self) -> SpriteCrop {
        SpriteCrop::new(Arc::clone(&self.pixels), TileRect::of(&self.pixels), self.source.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32, a: Rgba<u8>, b: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| if (x + y) % 2 == 0 { a } else { b })
    }

    #[test]
    fn test_regions_equal_identical() {
        let img = checker(8, 8, Rgba([1, 2, 3, 255]), Rgba([4, 5, 6, 255]));
        assert!(regions_equal(&img, TileRect::of(&img), &img, TileRect::of(&img)));
    }

    #[test]
    fn test_regions_equal_different_sizes() {
        let a = RgbaImage::new(8, 8);
        let b = RgbaImage::new(8, 4);
        assert!(!regions_equal(&a, TileRect::of(&a), &b, TileRect::of(&b)));
    }

    #[test]
    fn test_regions_equal_one_pixel_off() {
        let a = checker(8, 8, Rgba([1, 2, 3, 255]), Rgba([4, 5, 6, 255]));
        let mut b = a.clone();
        b.put_pixel(7, 7, Rgba([9, 9, 9, 255]));
        assert!(!regions_equal(&a, TileRect::of(&a), &b, TileRect::of(&b)));
    }

    #[test]
    fn test_regions_equal_alpha_channel_counts() {
        let a = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let b = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0]));
        assert!(!regions_equal(&a, TileRect::of(&a), &b, TileRect::of(&b)));
    }

    #[test]
    fn test_regions_equal_offset_regions() {
        // Same pattern at two different offsets in two different images
        let a = checker(16, 16, Rgba([1, 1, 1, 255]), Rgba([2, 2, 2, 255]));
        let b = checker(32, 32, Rgba([1, 1, 1, 255]), Rgba([2, 2, 2, 255]));
        assert!(regions_equal(
            &a,
            TileRect::new(0, 0, 8, 8),
            &b,
            TileRect::new(2, 2, 8, 8),
        ));
    }

    #[test]
    fn test_materialize_copies_region() {
        let src = Arc::new(checker(16, 16, Rgba([7, 0, 0, 255]), Rgba([0, 7, 0, 255])));
        let crop = SpriteCrop::new(Arc::clone(&src), TileRect::new(4, 4, 8, 8), "a.png");
        let sprite = crop.materialize();
        assert_eq!(sprite.image().width(), 8);
        assert_eq!(sprite.image().height(), 8);
        assert!(crop.same_pixels_as(&sprite));
        assert_eq!(sprite.source(), "a.png");
    }

    #[test]
    fn test_crop_display() {
        let src = Arc::new(RgbaImage::new(16, 16));
        let crop = SpriteCrop::new(src, TileRect::new(8, 0, 8, 8), "12.png");
        assert_eq!(format!("{}", crop), "12.png 8x8+8+0");
    }
}
