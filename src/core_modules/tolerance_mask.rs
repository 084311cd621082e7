// THEORY:
// The tolerance mask is the static answer to "which pixels get recolored?".
// It is computed once per batch by a single scan of the base image and then
// reused, read-only, by every variant. Precomputing the HSL of each selected
// pixel here means the per-variant loop only does addition, clamping and one
// HSL -> RGB conversion per pixel.
//
// Selection is binary: a pixel is in if it is not fully transparent and its
// Euclidean RGB distance to the target is within the tolerance. Entries are kept
// in scan order so that iteration is deterministic.

use crate::core_modules::color_space::color_space::{Hsl, Rgb, TargetColor, rgb_to_hsl};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{Result, ensure_non_negative};

/// Largest possible Euclidean distance between two RGB colors.
pub const MAX_RGB_DISTANCE: f64 = 441.672_955_930_063_7;

/// One selected pixel: its flat index and its original HSL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskEntry {
    pub index: usize,
    pub hsl: Hsl,
}

/// The set of pixels selected for recoloring, in scan order.
#[derive(Debug, Clone, Default)]
pub struct ToleranceMask {
    entries: Vec<MaskEntry>,
}

impl ToleranceMask {
    /// Scans `base` once and keeps every opaque-enough pixel within `tolerance` of `target`.
    pub fn build(base: &PixelBuffer, target: &TargetColor, tolerance: f64) -> Result<Self> {
        let tolerance = ensure_non_negative("tolerance", tolerance)?;
        let entries = base
            .as_bytes()
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, px)| px[3] > 0)
            .filter_map(|(index, px)| {
                let rgb = Rgb::new(px[0], px[1], px[2]);
                (rgb.distance(target.rgb) <= tolerance).then(|| MaskEntry {
                    index,
                    hsl: rgb_to_hsl(rgb),
                })
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[MaskEntry] {
        &self.entries
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|e| e.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> PixelBuffer {
        PixelBuffer::new(
            2,
            2,
            vec![
                255, 0, 0, 255, // red
                0, 0, 0, 0, // transparent
                0, 255, 0, 255, // green
                255, 0, 0, 255, // red
            ],
        )
        .unwrap()
    }

    #[test]
    fn selects_matching_opaque_pixels() {
        let target = TargetColor::new(Rgb::new(255, 0, 0));
        let mask = ToleranceMask::build(&two_by_two(), &target, 10.0).unwrap();
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(mask.entries()[0].hsl, Hsl::new(0.0, 100.0, 50.0));
    }

    #[test]
    fn zero_tolerance_is_exact_match() {
        let base = PixelBuffer::new(2, 1, vec![255, 0, 0, 255, 254, 0, 0, 255]).unwrap();
        let target = TargetColor::new(Rgb::new(255, 0, 0));
        let mask = ToleranceMask::build(&base, &target, 0.0).unwrap();
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn max_tolerance_selects_every_opaque_pixel() {
        let target = TargetColor::new(Rgb::new(0, 0, 255));
        let mask = ToleranceMask::build(&two_by_two(), &target, MAX_RGB_DISTANCE + 0.01).unwrap();
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn transparent_black_is_never_selected() {
        let target = TargetColor::new(Rgb::new(0, 0, 0));
        let mask = ToleranceMask::build(&two_by_two(), &target, 0.0).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn no_match_yields_empty_mask() {
        let target = TargetColor::new(Rgb::new(0, 0, 255));
        let mask = ToleranceMask::build(&two_by_two(), &target, 5.0).unwrap();
        assert!(mask.is_empty());
        assert_eq!(mask.len(), 0);
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        let target = TargetColor::new(Rgb::new(0, 0, 255));
        assert!(ToleranceMask::build(&two_by_two(), &target, -1.0).is_err());
        assert!(ToleranceMask::build(&two_by_two(), &target, f64::NAN).is_err());
    }
}
