// THEORY:
// The compositor turns one delta triple into one finished variant. It borrows
// everything expensive (base image, mask, background) read-only from the batch
// and owns only what it produces, so a variant can never disturb another.
//
// Steps per variant:
// 1. Clone the base. Only masked pixels change, and only their RGB channels.
// 2. Shift each masked pixel's precomputed HSL by the deltas and write it back.
// 3. Optionally mirror the recolored layer, then alpha-blend it over a copy of
//    the opaque background.
// The "swatch" applies the same deltas to the target color itself, giving a
// one-color summary of what the variant did.

use crate::core_modules::color_space::color_space::{Rgb, TargetColor};
use crate::core_modules::pixel_buffer::{CHANNELS, PixelBuffer};
use crate::core_modules::prng::HslDeltas;
use crate::core_modules::tolerance_mask::ToleranceMask;
use crate::error::VariantError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the recolored layer is flipped horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorMode {
    On,
    #[default]
    Off,
    /// Coin flip per variant, independent of the seed.
    Random,
}

impl MirrorMode {
    pub fn decide<R: Rng + ?Sized>(self, rng: &mut R) -> bool {
        match self {
            MirrorMode::On => true,
            MirrorMode::Off => false,
            MirrorMode::Random => rng.gen_bool(0.5),
        }
    }
}

impl FromStr for MirrorMode {
    type Err = VariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(MirrorMode::On),
            "off" => Ok(MirrorMode::Off),
            "random" => Ok(MirrorMode::Random),
            other => Err(VariantError::invalid_option("mirror mode", other)),
        }
    }
}

impl fmt::Display for MirrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MirrorMode::On => "on",
            MirrorMode::Off => "off",
            MirrorMode::Random => "random",
        };
        f.write_str(name)
    }
}

/// Read-only view of one batch's shared inputs.
pub struct Compositor<'a> {
    base: &'a PixelBuffer,
    mask: &'a ToleranceMask,
    background: &'a PixelBuffer,
    target: TargetColor,
}

impl<'a> Compositor<'a> {
    pub fn new(
        base: &'a PixelBuffer,
        mask: &'a ToleranceMask,
        background: &'a PixelBuffer,
        target: TargetColor,
    ) -> Self {
        Self {
            base,
            mask,
            background,
            target,
        }
    }

    /// A copy of the base with every masked pixel shifted by `deltas`. Alpha is untouched.
    pub fn recolor(&self, deltas: &HslDeltas) -> PixelBuffer {
        let mut layer = self.base.clone();
        for entry in self.mask.entries() {
            layer.set_rgb(entry.index, entry.hsl.shifted(deltas).to_rgb());
        }
        layer
    }

    /// Alpha-blends `layer` (mirrored first if asked) over the background.
    pub fn composite(&self, layer: &PixelBuffer, mirror: bool) -> PixelBuffer {
        let mirrored;
        let foreground = if mirror {
            mirrored = layer.mirrored_horizontally();
            &mirrored
        } else {
            layer
        };

        let mut output = self.background.clone();
        for (out, fg) in output
            .as_bytes_mut()
            .chunks_exact_mut(CHANNELS)
            .zip(foreground.as_bytes().chunks_exact(CHANNELS))
        {
            let blended = blend_over([fg[0], fg[1], fg[2], fg[3]], [out[0], out[1], out[2], out[3]]);
            out.copy_from_slice(&blended);
        }
        output
    }

    /// Recolor then composite.
    pub fn render(&self, deltas: &HslDeltas, mirror: bool) -> PixelBuffer {
        let layer = self.recolor(deltas);
        self.composite(&layer, mirror)
    }

    /// What the target color itself becomes under `deltas`.
    pub fn swatch(&self, deltas: &HslDeltas) -> Rgb {
        self.target.rgb.to_hsl().shifted(deltas).to_rgb()
    }
}

/// Source-over blending of `fg` onto `bg`.
pub fn blend_over(fg: [u8; 4], bg: [u8; 4]) -> [u8; 4] {
    let alpha = fg[3] as u32;
    match alpha {
        255 => [fg[0], fg[1], fg[2], 255],
        0 => bg,
        _ => {
            let inverse = 255 - alpha;
            let mix = |f: u8, b: u8| ((f as u32 * alpha + b as u32 * inverse + 127) / 255) as u8;
            let out_alpha = alpha + (bg[3] as u32 * inverse + 127) / 255;
            [
                mix(fg[0], bg[0]),
                mix(fg[1], bg[1]),
                mix(fg[2], bg[2]),
                out_alpha.min(255) as u8,
            ]
        }
    }
}
