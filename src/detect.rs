//! Dominant-colour detection over image regions
//!
//! Aggregates the per-pixel classifier into a 7-way histogram for a region and
//! picks the winning bucket, subject to empirically tuned dominance rules.
//! The full-region scan fans out over row bands; per-band counts flow through
//! one channel per bucket into per-bucket aggregators, so the seven running
//! totals are never contended. The aggregators finalize when every scanner has
//! finished, signalled by channel disconnection rather than shared counters.

use std::sync::mpsc;
use std::thread;

use image::RgbaImage;

use crate::color::{ThemeColor, ALL_COLORS, NUM_COLORS};
use crate::sprite::TileRect;

/// Number of parallel row bands in a full-region scan.
const SCAN_BANDS: u32 = 4;

/// Histogram of classified pixels, indexed by positional colour index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCounts(pub [u64; NUM_COLORS]);

impl ColorCounts {
    pub fn record(&mut self, color: ThemeColor) {
        self.0[color.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

/// Classify every pixel in `rect`, sequentially, into a histogram.
pub fn count_colors(image: &RgbaImage, rect: TileRect) -> ColorCounts {
    let mut counts = ColorCounts::default();
    for y in rect.y..rect.y + rect.h {
        for x in rect.x..rect.x + rect.w {
            if let Some(color) = ThemeColor::classify(*image.get_pixel(x, y)) {
                counts.record(color);
            }
        }
    }
    counts
}

/// Detect the dominant theme colour of a region, scanning in parallel.
///
/// Splits the region into [`SCAN_BANDS`] row bands, one scanner task each.
/// Each scanner pushes its per-bucket subtotals into seven per-bucket
/// channels; seven aggregator tasks drain them and finalize once all
/// scanner-side senders have dropped. When `label` is nonempty the frequency
/// table is printed to stdout.
///
/// Returns `None` when no colour is dominant yet; never panics on image
/// content.
pub fn detect_dominant(image: &RgbaImage, rect: TileRect, label: &str) -> Option<ThemeColor> {
    let bands = SCAN_BANDS.min(rect.h.max(1));
    let rows_per_band = rect.h / bands;

    let mut counts = ColorCounts::default();
    thread::scope(|s| {
        let mut senders: Vec<mpsc::Sender<u64>> = Vec::with_capacity(NUM_COLORS);
        let mut aggregators = Vec::with_capacity(NUM_COLORS);
        for _ in 0..NUM_COLORS {
            let (tx, rx) = mpsc::channel::<u64>();
            senders.push(tx);
            aggregators.push(s.spawn(move || {
                let mut total = 0u64;
                // recv fails once every scanner has dropped its senders;
                // that disconnection is the stop-and-finalize signal
                while let Ok(n) = rx.recv() {
                    total += n;
                }
                total
            }));
        }

        for band in 0..bands {
            let y0 = rect.y + band * rows_per_band;
            let y1 = if band == bands - 1 {
                rect.y + rect.h
            } else {
                y0 + rows_per_band
            };
            let band_rect = TileRect::new(rect.x, y0, rect.w, y1 - y0);
            let senders = senders.clone();
            s.spawn(move || {
                let band_counts = count_colors(image, band_rect);
                for (i, tx) in senders.iter().enumerate() {
                    // Aggregator may already be gone if it panicked; nothing
                    // useful to do with the error either way
                    let _ = tx.send(band_counts.0[i]);
                }
            });
        }
        // Drop the originals so the only senders left are the scanners'
        drop(senders);

        for (i, handle) in aggregators.into_iter().enumerate() {
            counts.0[i] = handle.join().unwrap_or(0);
        }
    });

    dominant_in_counts(counts, label)
}

/// Pick the dominant colour out of a histogram, or `None` if inconclusive.
///
/// Rules, in order:
/// - an empty histogram is inconclusive;
/// - black winning with any nonzero runner-up is inconclusive (a genuinely
///   black region has nothing else in it);
/// - the winner must beat the runner-up by more than 1.5x, except when the
///   winner is blue and the runner-up magenta, a known false-positive pattern
///   in blue maps, where any strict lead is accepted.
pub fn dominant_in_counts(counts: ColorCounts, label: &str) -> Option<ThemeColor> {
    let mut best = 0u64;
    let mut best_idx = 0usize;
    let mut second = 0u64;
    let mut second_idx = 0usize;
    for (i, &n) in counts.0.iter().enumerate() {
        if n > best {
            second = best;
            second_idx = best_idx;
            best = n;
            best_idx = i;
        } else if n > second {
            second = n;
            second_idx = i;
        }
    }

    let mut description = String::new();
    if !label.is_empty() {
        description = format!("Colour frequencies in {}:\n", label);
        for (i, color) in ALL_COLORS.iter().enumerate() {
            description += &format!("  {:>7} : {}\n", color.name(), counts.0[i]);
        }
        description += &format!(
            "Total {}, dominant {}, second {}\n",
            counts.total(),
            ALL_COLORS[best_idx].name(),
            ALL_COLORS[second_idx].name()
        );
    }

    let mut result = ThemeColor::from_index(best_idx);
    if best == 0 {
        result = None;
    } else if best_idx == ThemeColor::Black.index() && second != 0 {
        if !label.is_empty() {
            description += "Black dominant, but not uniform\n";
        }
        result = None;
    } else if 10 * best <= 15 * second
        && (best == second
            || best_idx != ThemeColor::Blue.index()
            || second_idx != ThemeColor::Magenta.index())
    {
        if !label.is_empty() {
            description += "Insufficient majority\n";
        }
        result = None;
    }
    if !label.is_empty() {
        print!("{}", description);
    }
    result
}
