#![forbid(unsafe_code)]

//! Color representations and the owned `Color` row.
//!
//! A color exists in two forms: the 7-character `#RRGGBB` hex string the
//! durable store persists, and the integer HSL triple the edge cache channel
//! and injected style fragments consume. Treating the two as interchangeable
//! loose values is how stale pairs happen, so this module provides exactly
//! one owned row type, [`Color`], whose pair is recomputed at the point of
//! mutation. Free-standing conversion lives on [`HexColor`] and [`Hsl`] for
//! callers that only hold one half.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ColorError;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Identity of a [`Color`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorId(Uuid);

impl ColorId {
    /// Mint a fresh id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of the owning account. Every row in the cascade is scoped to
/// exactly one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountId(Uuid);

impl AccountId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// HexColor
// ---------------------------------------------------------------------------

/// A validated `#RRGGBB` color. Parsing is case-insensitive; display is
/// canonical uppercase. Equality is on the decoded channels, so `#ff0000`
/// and `#FF0000` are one color (and dedupe treats them as one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct HexColor {
    r: u8,
    g: u8,
    b: u8,
}

impl HexColor {
    /// Build from raw channels.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn r(&self) -> u8 {
        self.r
    }

    pub const fn g(&self) -> u8 {
        self.g
    }

    pub const fn b(&self) -> u8 {
        self.b
    }

    /// Convert to the integer HSL triple, rounding each component to its
    /// canonical range.
    pub fn to_hsl(self) -> Hsl {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;

        let (h, s) = if d.abs() < f64::EPSILON {
            (0.0, 0.0)
        } else {
            let s = d / (1.0 - (2.0 * l - 1.0).abs());
            let h = if (max - r).abs() < f64::EPSILON {
                60.0 * (((g - b) / d).rem_euclid(6.0))
            } else if (max - g).abs() < f64::EPSILON {
                60.0 * ((b - r) / d + 2.0)
            } else {
                60.0 * ((r - g) / d + 4.0)
            };
            (h, s)
        };

        Hsl {
            hue: (h.round() as u16) % 360,
            saturation: ((s * 100.0).round() as u8).min(100),
            lightness: ((l * 100.0).round() as u8).min(100),
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| ColorError::InvalidHex(s.to_string()))?;
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ColorError::InvalidHex(s.to_string()))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        c.to_string()
    }
}

// ---------------------------------------------------------------------------
// Hsl
// ---------------------------------------------------------------------------

/// Integer HSL triple: hue in `[0, 360)`, saturation and lightness in
/// `[0, 100]`. Integer components round-trip exactly through the edge cache
/// channel's bare-numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hsl {
    hue: u16,
    saturation: u8,
    lightness: u8,
}

impl Hsl {
    /// Checked constructor.
    pub fn new(hue: u16, saturation: u8, lightness: u8) -> Result<Self, ColorError> {
        if hue >= 360 {
            return Err(ColorError::HueRange(hue));
        }
        if saturation > 100 {
            return Err(ColorError::PercentRange {
                field: "saturation",
                value: saturation,
            });
        }
        if lightness > 100 {
            return Err(ColorError::PercentRange {
                field: "lightness",
                value: lightness,
            });
        }
        Ok(Self {
            hue,
            saturation,
            lightness,
        })
    }

    pub const fn hue(&self) -> u16 {
        self.hue
    }

    pub const fn saturation(&self) -> u8 {
        self.saturation
    }

    pub const fn lightness(&self) -> u8 {
        self.lightness
    }

    /// Convert to the nearest `#RRGGBB`.
    pub fn to_hex(self) -> HexColor {
        let h = f64::from(self.hue);
        let s = f64::from(self.saturation) / 100.0;
        let l = f64::from(self.lightness) / 100.0;

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = l - c / 2.0;

        let (r1, g1, b1) = match (h / 60.0) as u16 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let chan = |v: f64| ((v + m) * 255.0).round() as u8;
        HexColor::from_rgb(chan(r1), chan(g1), chan(b1))
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}% {}%", self.hue, self.saturation, self.lightness)
    }
}

// ---------------------------------------------------------------------------
// Luminance and contrast
// ---------------------------------------------------------------------------

/// WCAG relative luminance of a color, in `[0.0, 1.0]`.
pub fn relative_luminance(color: HexColor) -> f64 {
    fn linearize(channel: u8) -> f64 {
        let c = f64::from(channel) / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    0.2126 * linearize(color.r()) + 0.7152 * linearize(color.g()) + 0.0722 * linearize(color.b())
}

/// WCAG contrast ratio between two colors, in `[1.0, 21.0]`.
pub fn contrast_ratio(a: HexColor, b: HexColor) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Black or white, whichever reads better against `background`.
pub fn readable_text_hex(background: HexColor) -> HexColor {
    let black = HexColor::from_rgb(0, 0, 0);
    let white = HexColor::from_rgb(255, 255, 255);
    if contrast_ratio(background, black) >= contrast_ratio(background, white) {
        black
    } else {
        white
    }
}

// ---------------------------------------------------------------------------
// Color row
// ---------------------------------------------------------------------------

/// An owned, account-scoped color row.
///
/// The hex and HSL fields always describe the same color: whichever form is
/// written last is authoritative and the other is recomputed in the same
/// call. Fields are private so no caller can desynchronize the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    id: ColorId,
    name: String,
    hex: HexColor,
    hsl: Hsl,
}

impl Color {
    /// Build from a hex value, deriving the HSL triple.
    pub fn from_hex(id: ColorId, name: impl Into<String>, hex: HexColor) -> Self {
        Self {
            id,
            name: name.into(),
            hex,
            hsl: hex.to_hsl(),
        }
    }

    /// Build from an HSL triple, deriving the hex value.
    pub fn from_hsl(id: ColorId, name: impl Into<String>, hsl: Hsl) -> Self {
        Self {
            id,
            name: name.into(),
            hex: hsl.to_hex(),
            hsl,
        }
    }

    pub const fn id(&self) -> ColorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn hex(&self) -> HexColor {
        self.hex
    }

    pub const fn hsl(&self) -> Hsl {
        self.hsl
    }

    /// Replace the hex value; the HSL triple is recomputed immediately.
    pub fn set_hex(&mut self, hex: HexColor) {
        self.hex = hex;
        self.hsl = hex.to_hsl();
    }

    /// Replace the HSL triple; the hex value is recomputed immediately.
    pub fn set_hsl(&mut self, hsl: Hsl) {
        self.hsl = hsl;
        self.hex = hsl.to_hex();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
