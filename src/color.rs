//! Theme colour classification for individual pixels
//!
//! Map-editor screenshots come in one of six colour themes. A pixel either
//! matches one of the six themed hue ranges, is effectively black, or matches
//! nothing (too desaturated to carry theme information).

use image::Rgba;

/// The recognised theme colours, plus black.
///
/// The declaration order is load-bearing: sibling tooling (the reference-hash
/// generator) identifies colours by positional index, so `Blue` must stay 0,
/// `Cyan` 1, and so on. `Black` is last and is not a theme of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeColor {
    Blue,
    Cyan,
    Green,
    Magenta,
    Orange,
    Red,
    Black,
}

/// Number of colour buckets, including black.
pub const NUM_COLORS: usize = 7;

/// All colours in positional-index order.
pub const ALL_COLORS: [ThemeColor; NUM_COLORS] = [
    ThemeColor::Blue,
    ThemeColor::Cyan,
    ThemeColor::Green,
    ThemeColor::Magenta,
    ThemeColor::Orange,
    ThemeColor::Red,
    ThemeColor::Black,
];

impl ThemeColor {
    /// Positional index shared with sibling tooling.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Colour from a positional index, if in range.
    pub fn from_index(i: usize) -> Option<ThemeColor> {
        ALL_COLORS.get(i).copied()
    }

    /// Human-readable colour name.
    pub fn name(self) -> &'static str {
        match self {
            ThemeColor::Blue => "Blue",
            ThemeColor::Cyan => "Cyan",
            ThemeColor::Green => "Green",
            ThemeColor::Magenta => "Magenta",
            ThemeColor::Orange => "Orange",
            ThemeColor::Red => "Red",
            ThemeColor::Black => "Black",
        }
    }

    /// File-name friendly lowercase name.
    pub fn file_stem(self) -> &'static str {
        match self {
            ThemeColor::Blue => "blue",
            ThemeColor::Cyan => "cyan",
            ThemeColor::Green => "green",
            ThemeColor::Magenta => "magenta",
            ThemeColor::Orange => "orange",
            ThemeColor::Red => "red",
            ThemeColor::Black => "black",
        }
    }

    /// Classify a single pixel into a hue bucket.
    ///
    /// Near-zero lightness is black; anything insufficiently saturated carries
    /// no theme signal and returns `None`. The hue ranges and the saturation
    /// cutoff are tuned against real screenshots; treat the literals as fixed.
    pub fn classify(pixel: Rgba<u8>) -> Option<ThemeColor> {
        let (h, s, l) = rgb_to_hsl(pixel);
        if l < 1e-7 {
            return Some(ThemeColor::Black);
        }
        if s < 0.8 {
            return None;
        }
        if h >= 230.0 && h <= 250.0 {
            Some(ThemeColor::Blue)
        } else if h <= 10.0 || h >= 350.0 {
            Some(ThemeColor::Red)
        } else if h >= 110.0 && h <= 130.0 {
            Some(ThemeColor::Green)
        } else if h >= 290.0 && h <= 310.0 {
            Some(ThemeColor::Magenta)
        } else if h >= 170.0 && h <= 190.0 {
            Some(ThemeColor::Cyan)
        } else if h >= 20.0 && h <= 40.0 {
            Some(ThemeColor::Orange)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert an RGBA pixel to (hue in degrees, saturation, lightness).
///
/// Alpha is ignored. Hue is 0 for achromatic pixels.
pub fn rgb_to_hsl(pixel: Rgba<u8>) -> (f64, f64, f64) {
    let r = pixel[0] as f64 / 255.0;
    let g = pixel[1] as f64 / 255.0;
    let b = pixel[2] as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta == 0.0 {
        return (0.0, 0.0, l);
    }

    let s = delta / (1.0 - (2.0 * l - 1.0).abs());

    let mut h = if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    if h < 0.0 {
        h += 360.0;
    }

    (h, s, l)
}
