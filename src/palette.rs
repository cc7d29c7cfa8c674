//! Color palettes for the bouncing label
//!
//! A scheme name resolves to a fixed, non-empty, cyclic list of colors.
//! The label advances one step through the list on every wall or corner hit.

use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.0, self.1, self.2)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("unknown color scheme '{0}' (expected one of: classic, pastel, neon, monochrome)")]
    UnknownScheme(String),
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum ColorScheme {
    #[default]
    Classic,
    Pastel,
    Neon,
    Monochrome,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 4] = [
        ColorScheme::Classic,
        ColorScheme::Pastel,
        ColorScheme::Neon,
        ColorScheme::Monochrome,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::Classic => "classic",
            ColorScheme::Pastel => "pastel",
            ColorScheme::Neon => "neon",
            ColorScheme::Monochrome => "monochrome",
        }
    }
}

impl FromStr for ColorScheme {
    type Err = PaletteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorScheme::ALL
            .into_iter()
            .find(|scheme| scheme.name() == s)
            .ok_or_else(|| PaletteError::UnknownScheme(s.to_string()))
    }
}

impl TryFrom<String> for ColorScheme {
    type Error = PaletteError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

const CLASSIC: [Rgb; 8] = [
    Rgb(255, 51, 76),   // red
    Rgb(51, 255, 76),   // green
    Rgb(76, 127, 255),  // blue
    Rgb(255, 204, 51),  // yellow
    Rgb(255, 102, 204), // pink
    Rgb(102, 255, 229), // cyan
    Rgb(204, 102, 255), // purple
    Rgb(255, 153, 51),  // orange
];

const PASTEL: [Rgb; 8] = [
    Rgb(255, 179, 186),
    Rgb(186, 255, 201),
    Rgb(186, 225, 255),
    Rgb(255, 243, 186),
    Rgb(255, 209, 229),
    Rgb(209, 255, 243),
    Rgb(229, 209, 255),
    Rgb(255, 223, 186),
];

const NEON: [Rgb; 8] = [
    Rgb(255, 0, 102),
    Rgb(0, 255, 102),
    Rgb(0, 102, 255),
    Rgb(255, 255, 0),
    Rgb(255, 0, 255),
    Rgb(0, 255, 255),
    Rgb(255, 102, 0),
    Rgb(204, 0, 255),
];

// White down to dark gray
const MONOCHROME: [Rgb; 4] = [
    Rgb(255, 255, 255),
    Rgb(220, 220, 220),
    Rgb(180, 180, 180),
    Rgb(140, 140, 140),
];

/// Ordered, cyclic, never-empty list of label colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    scheme: ColorScheme,
    colors: &'static [Rgb],
}

impl Palette {
    pub fn new(scheme: ColorScheme) -> Self {
        let colors: &'static [Rgb] = match scheme {
            ColorScheme::Classic => &CLASSIC,
            ColorScheme::Pastel => &PASTEL,
            ColorScheme::Neon => &NEON,
            ColorScheme::Monochrome => &MONOCHROME,
        };
        Self { scheme, colors }
    }

    /// Resolve a scheme by name. Unknown names are an error, never a fallback.
    pub fn resolve(name: &str) -> Result<Self, PaletteError> {
        name.parse().map(Palette::new)
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn colors(&self) -> &'static [Rgb] {
        self.colors
    }

    /// Color at `index`, wrapping around the palette
    pub fn color(&self, index: usize) -> Rgb {
        self.colors[index % self.colors.len()]
    }

    /// Uniformly random starting index in `[0, len)`
    pub fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.colors.len())
    }
}

/// Step a color index forward by one, wrapping at `palette_size`
pub fn advance(index: usize, palette_size: usize) -> usize {
    if palette_size == 0 {
        return 0;
    }
    (index + 1) % palette_size
}
