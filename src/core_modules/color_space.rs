// THEORY:
// The `color_space` module is the numeric foundation of the recoloring engine.
// It converts between 8-bit RGB and HSL, and between RGB and hex strings. It
// knows nothing about images, masks or seeds: every function here works on a
// single color.
//
// Conventions:
// - `Rgb` channels are bytes (0..=255).
// - `Hsl` uses degrees for hue [0, 360) and percentages for saturation and
//   lightness [0, 100], stored as f64 so that repeated jitter does not
//   accumulate rounding error. Only the trip back to RGB rounds.
// - RGB -> HSL -> RGB is lossy by at most 1 per channel.
// - Callers wrap hue and clamp saturation/lightness; `Hsl::shifted` does both
//   after adding a delta triple.

pub mod color_space {
    use crate::core_modules::prng::HslDeltas;
    use crate::error::{Result, VariantError};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// An 8-bit RGB color.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Rgb {
        pub red: u8,
        pub green: u8,
        pub blue: u8,
    }

    /// An HSL color: hue in degrees, saturation and lightness in percent.
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Hsl {
        pub hue: f64,
        pub saturation: f64,
        pub lightness: f64,
    }

    /// The color picked for replacement. Alpha is informational only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TargetColor {
        pub rgb: Rgb,
        pub alpha: Option<u8>,
    }

    impl Rgb {
        pub const fn new(red: u8, green: u8, blue: u8) -> Self {
            Self { red, green, blue }
        }

        /// Parses `#rrggbb`, `rrggbb` or the short `#rgb` form (case insensitive).
        pub fn from_hex(hex: &str) -> Result<Self> {
            let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
            if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(VariantError::invalid_color(format!(
                    "'{hex}' contains non-hex characters"
                )));
            }
            let channel = |s: &str| {
                u8::from_str_radix(s, 16)
                    .map_err(|e| VariantError::invalid_color(format!("'{hex}': {e}")))
            };
            match digits.len() {
                6 => Ok(Self::new(
                    channel(&digits[0..2])?,
                    channel(&digits[2..4])?,
                    channel(&digits[4..6])?,
                )),
                3 => {
                    // #abc expands to #aabbcc
                    let r = channel(&digits[0..1])?;
                    let g = channel(&digits[1..2])?;
                    let b = channel(&digits[2..3])?;
                    Ok(Self::new(r * 17, g * 17, b * 17))
                }
                n => Err(VariantError::invalid_color(format!(
                    "expected 3 or 6 hex digits in '{hex}', got {n}"
                ))),
            }
        }

        /// Lowercase `#rrggbb`.
        pub fn to_hex(self) -> String {
            format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        }

        /// Euclidean distance in RGB space (0.0 ..= ~441.67).
        pub fn distance(self, other: Rgb) -> f64 {
            let dr = self.red as f64 - other.red as f64;
            let dg = self.green as f64 - other.green as f64;
            let db = self.blue as f64 - other.blue as f64;
            (dr * dr + dg * dg + db * db).sqrt()
        }

        pub fn to_hsl(self) -> Hsl {
            rgb_to_hsl(self)
        }
    }

    impl Serialize for Rgb {
        fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_hex())
        }
    }

    impl<'de> Deserialize<'de> for Rgb {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Rgb::from_hex(&s).map_err(serde::de::Error::custom)
        }
    }

    impl Hsl {
        pub const fn new(hue: f64, saturation: f64, lightness: f64) -> Self {
            Self {
                hue,
                saturation,
                lightness,
            }
        }

        /// Adds a delta triple, wrapping hue into [0, 360) and clamping the rest to [0, 100].
        pub fn shifted(self, deltas: &HslDeltas) -> Self {
            Self {
                hue: wrap_hue(self.hue + deltas.hue_delta),
                saturation: (self.saturation + deltas.sat_delta).clamp(0.0, 100.0),
                lightness: (self.lightness + deltas.light_delta).clamp(0.0, 100.0),
            }
        }

        pub fn to_rgb(self) -> Rgb {
            hsl_to_rgb(self)
        }
    }

    impl TargetColor {
        pub fn new(rgb: Rgb) -> Self {
            Self { rgb, alpha: None }
        }

        pub fn with_alpha(rgb: Rgb, alpha: u8) -> Self {
            Self {
                rgb,
                alpha: Some(alpha),
            }
        }

        pub fn from_hex(hex: &str) -> Result<Self> {
            Ok(Self::new(Rgb::from_hex(hex)?))
        }
    }

    /// Wraps a hue angle into [0, 360).
    pub fn wrap_hue(hue: f64) -> f64 {
        let wrapped = hue.rem_euclid(360.0);
        // rem_euclid can land on exactly 360.0 for tiny negative inputs
        if wrapped >= 360.0 { 0.0 } else { wrapped }
    }

    /// Standard RGB to HSL conversion. Achromatic colors get hue = saturation = 0.
    pub fn rgb_to_hsl(rgb: Rgb) -> Hsl {
        let r = rgb.red as f64 / 255.0;
        let g = rgb.green as f64 / 255.0;
        let b = rgb.blue as f64 / 255.0;

        let maximum = r.max(g).max(b);
        let minimum = r.min(g).min(b);
        let lightness = (maximum + minimum) / 2.0;

        if maximum == minimum {
            return Hsl::new(0.0, 0.0, lightness * 100.0);
        }

        let chroma = maximum - minimum;
        let saturation = if lightness > 0.5 {
            chroma / (2.0 - maximum - minimum)
        } else {
            chroma / (maximum + minimum)
        };

        // Ties resolve red first, then green.
        let sector = if maximum == r {
            (g - b) / chroma + if g < b { 6.0 } else { 0.0 }
        } else if maximum == g {
            (b - r) / chroma + 2.0
        } else {
            (r - g) / chroma + 4.0
        };

        Hsl::new(sector / 6.0 * 360.0, saturation * 100.0, lightness * 100.0)
    }

    /// HSL to RGB. Channels are rounded to the nearest integer and clamped to [0, 255].
    pub fn hsl_to_rgb(hsl: Hsl) -> Rgb {
        let h = hsl.hue / 360.0;
        let s = hsl.saturation / 100.0;
        let l = hsl.lightness / 100.0;

        let (r, g, b) = if s == 0.0 {
            (l, l, l)
        } else {
            let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
            let p = 2.0 * l - q;
            (
                hue_to_channel(p, q, h + 1.0 / 3.0),
                hue_to_channel(p, q, h),
                hue_to_channel(p, q, h - 1.0 / 3.0),
            )
        };

        Rgb::new(to_byte(r), to_byte(g), to_byte(b))
    }

    #[inline]
    fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 1.0 / 2.0 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    }

    #[inline]
    fn to_byte(normalized: f64) -> u8 {
        (normalized * 255.0).round().clamp(0.0, 255.0) as u8
    }
}
