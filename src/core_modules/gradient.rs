// THEORY:
// The gradient renderer synthesizes the opaque background every variant is
// composited over. It is rendered once per batch and then only read.
//
// Geometry:
// - Linear: the axis passes through the canvas center at `angle` degrees
//   (0 = pointing right, positive angles turn downward in image space). It runs
//   from center - (cos * w/2, sin * h/2) to center + (cos * w/2, sin * h/2).
//   Each pixel center is projected onto that axis to get its position t.
// - Radial: centered on the canvas, radius max(w, h) / 2, t = distance / radius.
//
// Color lookup:
// - Stops are clamped into [0, 1] and stable-sorted by offset before use.
// - t before the first stop or after the last takes that stop's color.
// - Between stops, channels are interpolated linearly in RGB and rounded.
// - Duplicate offsets make a hard edge: the first-sorted stop owns the exact
//   offset, the later one takes over right after it.

use crate::core_modules::color_space::color_space::{Hsl, Rgb};
use crate::core_modules::pixel_buffer::{CHANNELS, PixelBuffer};
use crate::error::{Result, VariantError};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_STOPS: usize = 2;

/// Shape of the gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKind {
    Linear,
    Radial,
}

/// One color stop; `offset` is a position in [0, 1] along the gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub offset: f64,
    pub color: Rgb,
}

/// An immutable gradient description. Stops need not be sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientSpec {
    #[serde(rename = "type")]
    pub kind: GradientKind,
    /// Degrees; only used by linear gradients.
    #[serde(default)]
    pub angle: f64,
    pub stops: Vec<ColorStop>,
}

impl ColorStop {
    pub fn new(offset: f64, color: Rgb) -> Self {
        Self { offset, color }
    }
}

impl Default for GradientSpec {
    fn default() -> Self {
        Self {
            kind: GradientKind::Linear,
            angle: 0.0,
            stops: vec![
                ColorStop::new(0.0, Rgb::new(0x6a, 0xa6, 0xff)),
                ColorStop::new(1.0, Rgb::new(0x7b, 0xda, 0xaf)),
            ],
        }
    }
}

impl GradientSpec {
    pub fn linear(angle: f64, stops: Vec<ColorStop>) -> Self {
        Self {
            kind: GradientKind::Linear,
            angle,
            stops,
        }
    }

    pub fn radial(stops: Vec<ColorStop>) -> Self {
        Self {
            kind: GradientKind::Radial,
            angle: 0.0,
            stops,
        }
    }

    /// A random gradient: 2-4 evenly spaced stops of mid-lightness, saturated colors.
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let stop_count = rng.gen_range(2..=4usize);
        let stops = (0..stop_count)
            .map(|i| {
                let hue = rng.gen_range(0..360u32) as f64;
                let saturation = rng.gen_range(50..90u32) as f64;
                let lightness = rng.gen_range(40..60u32) as f64;
                let color = Hsl::new(hue, saturation, lightness).to_rgb();
                ColorStop::new(i as f64 / (stop_count - 1) as f64, color)
            })
            .collect();
        let kind = if rng.gen_bool(0.5) {
            GradientKind::Linear
        } else {
            GradientKind::Radial
        };
        Self {
            kind,
            angle: rng.gen_range(0..360u32) as f64,
            stops,
        }
    }

    /// Rejects specs the renderer cannot evaluate.
    pub fn validate(&self) -> Result<()> {
        if self.stops.len() < MIN_STOPS {
            return Err(VariantError::TooFewStops {
                count: self.stops.len(),
            });
        }
        if !self.angle.is_finite() {
            return Err(VariantError::out_of_range("gradient angle", self.angle));
        }
        if let Some(stop) = self.stops.iter().find(|s| !s.offset.is_finite()) {
            return Err(VariantError::out_of_range("stop offset", stop.offset));
        }
        Ok(())
    }

    /// Stops with offsets clamped into [0, 1], stable-sorted by offset.
    pub fn sorted_stops(&self) -> Vec<ColorStop> {
        let mut stops: Vec<ColorStop> = self
            .stops
            .iter()
            .map(|s| ColorStop::new(s.offset.clamp(0.0, 1.0), s.color))
            .collect();
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        stops
    }

    /// Renders a fully opaque `width`x`height` background.
    pub fn render(&self, width: u32, height: u32) -> Result<PixelBuffer> {
        self.validate()?;
        if width == 0 || height == 0 {
            return Err(VariantError::InvalidDimensions { width, height });
        }

        let stops = self.sorted_stops();
        let projector = Projector::new(self, width, height);
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                let t = projector.position(x as f64 + 0.5, y as f64 + 0.5);
                let color = color_at(&stops, t);
                data.extend_from_slice(&[color.red, color.green, color.blue, 255]);
            }
        }
        PixelBuffer::new(width, height, data)
    }
}

/// Maps a canvas point to its position t along the gradient.
enum Projector {
    Linear {
        start: (f64, f64),
        axis: (f64, f64),
        length_squared: f64,
    },
    Radial {
        center: (f64, f64),
        radius: f64,
    },
}

impl Projector {
    fn new(spec: &GradientSpec, width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        let center = (w / 2.0, h / 2.0);
        match spec.kind {
            GradientKind::Linear => {
                let radians = spec.angle.to_radians();
                let dx = radians.cos() * w / 2.0;
                let dy = radians.sin() * h / 2.0;
                let axis = (2.0 * dx, 2.0 * dy);
                Projector::Linear {
                    start: (center.0 - dx, center.1 - dy),
                    axis,
                    length_squared: axis.0 * axis.0 + axis.1 * axis.1,
                }
            }
            GradientKind::Radial => Projector::Radial {
                center,
                radius: w.max(h) / 2.0,
            },
        }
    }

    fn position(&self, px: f64, py: f64) -> f64 {
        match *self {
            Projector::Linear {
                start,
                axis,
                length_squared,
            } => {
                if length_squared <= f64::EPSILON {
                    return 0.0;
                }
                ((px - start.0) * axis.0 + (py - start.1) * axis.1) / length_squared
            }
            Projector::Radial { center, radius } => {
                if radius <= 0.0 {
                    return 0.0;
                }
                (px - center.0).hypot(py - center.1) / radius
            }
        }
    }
}

/// Color at position `t` for stops already sorted by offset.
fn color_at(stops: &[ColorStop], t: f64) -> Rgb {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Rgb::default(),
    };
    if t <= first.offset {
        return first.color;
    }
    if t > last.offset {
        return last.color;
    }
    // first stop whose offset reaches t; t > first.offset keeps this at >= 1,
    // and on a shared offset it is the first-sorted stop
    let upper = stops.iter().position(|s| t <= s.offset).unwrap_or(stops.len() - 1);
    let from = stops[upper - 1];
    let to = stops[upper];
    let span = to.offset - from.offset;
    if span <= 0.0 {
        return to.color;
    }
    let fraction = (t - from.offset) / span;
    Rgb::new(
        lerp(from.color.red, to.color.red, fraction),
        lerp(from.color.green, to.color.green, fraction),
        lerp(from.color.blue, to.color.blue, fraction),
    )
}

#[inline]
fn lerp(a: u8, b: u8, fraction: f64) -> u8 {
    let value = a as f64 + (b as f64 - a as f64) * fraction;
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn black_to_white() -> Vec<ColorStop> {
        vec![
            ColorStop::new(0.0, Rgb::new(0, 0, 0)),
            ColorStop::new(1.0, Rgb::new(255, 255, 255)),
        ]
    }

    fn gray(buffer: &PixelBuffer, x: u32, y: u32) -> u8 {
        let [r, g, b, a] = buffer.pixel_at(x, y).unwrap();
        assert_eq!(a, 255);
        assert!(r == g && g == b);
        r
    }

    #[test]
    fn linear_black_to_white_on_a_strip() {
        let background = GradientSpec::linear(0.0, black_to_white()).render(10, 1).unwrap();
        assert_eq!(gray(&background, 0, 0), 13);
        assert_eq!(gray(&background, 9, 0), 242);
        assert_eq!(gray(&background, 4, 0), 115);
        assert_eq!(gray(&background, 5, 0), 140);
    }

    #[test]
    fn angle_180_reverses_the_axis() {
        let forward = GradientSpec::linear(0.0, black_to_white()).render(10, 1).unwrap();
        let reversed = GradientSpec::linear(180.0, black_to_white()).render(10, 1).unwrap();
        assert_eq!(gray(&reversed, 0, 0), gray(&forward, 9, 0));
        assert_eq!(gray(&reversed, 9, 0), gray(&forward, 0, 0));
    }

    #[test]
    fn angle_90_runs_top_to_bottom() {
        let background = GradientSpec::linear(90.0, black_to_white()).render(1, 10).unwrap();
        assert!(gray(&background, 0, 0) < 20);
        assert!(gray(&background, 0, 9) > 235);
    }

    #[test]
    fn radial_is_dark_in_the_middle_and_clamps_in_corners() {
        let background = GradientSpec::radial(black_to_white()).render(9, 9).unwrap();
        assert_eq!(gray(&background, 4, 4), 0);
        assert_eq!(gray(&background, 0, 0), 255);
        assert_eq!(gray(&background, 8, 8), 255);
        assert!(gray(&background, 4, 0) > gray(&background, 4, 2));
    }

    #[test]
    fn unsorted_stops_render_like_sorted_ones() {
        let mut stops = black_to_white();
        stops.reverse();
        let unsorted = GradientSpec::linear(0.0, stops).render(16, 4).unwrap();
        let sorted = GradientSpec::linear(0.0, black_to_white()).render(16, 4).unwrap();
        assert_eq!(unsorted, sorted);
    }

    #[test]
    fn offsets_are_clamped_into_unit_range() {
        let stops = vec![
            ColorStop::new(-0.5, Rgb::new(0, 0, 0)),
            ColorStop::new(1.5, Rgb::new(255, 255, 255)),
        ];
        let clamped = GradientSpec::linear(0.0, stops).render(10, 1).unwrap();
        let plain = GradientSpec::linear(0.0, black_to_white()).render(10, 1).unwrap();
        assert_eq!(clamped, plain);
    }

    #[test]
    fn duplicate_offsets_make_a_hard_edge() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        let stops = vec![
            ColorStop::new(0.0, Rgb::new(0, 0, 0)),
            ColorStop::new(0.5, red),
            ColorStop::new(0.5, blue),
            ColorStop::new(1.0, Rgb::new(255, 255, 255)),
        ];
        let spec = GradientSpec::linear(0.0, stops);
        let sorted = spec.sorted_stops();
        assert_eq!(color_at(&sorted, 0.5), red);
        assert_eq!(color_at(&sorted, 0.500_001), blue);
        assert_eq!(color_at(&sorted, 0.25), Rgb::new(128, 0, 0));
    }

    #[test]
    fn duplicate_final_offset_keeps_the_first_stop_at_the_edge() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        let stops = vec![
            ColorStop::new(0.0, Rgb::new(0, 0, 0)),
            ColorStop::new(0.45, red),
            ColorStop::new(0.45, blue),
        ];
        let spec = GradientSpec::linear(0.0, stops);
        assert_eq!(color_at(&spec.sorted_stops(), 0.45), red);
        assert_eq!(color_at(&spec.sorted_stops(), 0.46), blue);

        // pixel 4 of a 10x1 strip samples exactly t = 0.45
        let strip = spec.render(10, 1).unwrap();
        assert_eq!(strip.pixel(4), [255, 0, 0, 255]);
        assert_eq!(strip.pixel(5), [0, 0, 255, 255]);
    }

    #[test]
    fn stops_sharing_one_offset_resolve_to_the_first() {
        let stops = vec![
            ColorStop::new(1.0, Rgb::new(1, 1, 1)),
            ColorStop::new(1.0, Rgb::new(2, 2, 2)),
        ];
        assert_eq!(color_at(&stops, 1.0), Rgb::new(1, 1, 1));
        assert_eq!(color_at(&stops, 0.5), Rgb::new(1, 1, 1));
    }

    #[test]
    fn positions_outside_stops_take_the_end_colors() {
        let stops = vec![
            ColorStop::new(0.25, Rgb::new(10, 20, 30)),
            ColorStop::new(0.75, Rgb::new(200, 100, 50)),
        ];
        assert_eq!(color_at(&stops, 0.0), Rgb::new(10, 20, 30));
        assert_eq!(color_at(&stops, 1.0), Rgb::new(200, 100, 50));
    }

    #[test]
    fn rendering_is_idempotent() {
        let spec = GradientSpec::default();
        assert_eq!(spec.render(32, 24).unwrap(), spec.render(32, 24).unwrap());
    }

    #[test]
    fn too_few_stops_is_invalid() {
        let spec = GradientSpec::linear(0.0, vec![ColorStop::new(0.0, Rgb::new(0, 0, 0))]);
        assert!(matches!(
            spec.render(4, 4),
            Err(VariantError::TooFewStops { count: 1 })
        ));
        assert!(GradientSpec::default().render(0, 4).is_err());
    }

    #[test]
    fn randomized_specs_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let spec = GradientSpec::randomized(&mut rng);
            assert!(spec.validate().is_ok());
            assert!((2..=4).contains(&spec.stops.len()));
            assert_eq!(spec.stops.first().unwrap().offset, 0.0);
            assert_eq!(spec.stops.last().unwrap().offset, 1.0);
            assert!((0.0..360.0).contains(&spec.angle));
            for stop in &spec.stops {
                let hsl = stop.color.to_hsl();
                assert!((39.0..61.0).contains(&hsl.lightness));
                assert_ne!(stop.color, Rgb::default());
            }
        }
    }

    #[test]
    fn serializes_with_type_tag_and_hex_colors() {
        let json = serde_json::to_value(GradientSpec::default()).unwrap();
        assert_eq!(json["type"], "linear");
        assert_eq!(json["stops"][0]["color"], "#6aa6ff");
        let back: GradientSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, GradientSpec::default());
    }
}
