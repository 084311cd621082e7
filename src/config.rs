// THEORY:
// `PipelineConfig` holds every batch setting that is not an image or a seed. It
// can be written by hand as JSON; any field left out falls back to the default
// the tool has always used, so `{}` is a valid config. The binary layers its
// command-line flags on top of a loaded config and then turns the result into a
// `VariantRequest` once the base image, target color and seeds are known.

use crate::core_modules::color_space::color_space::{Rgb, TargetColor};
use crate::core_modules::compositor::MirrorMode;
use crate::core_modules::gradient::GradientSpec;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::prng::JitterRanges;
use crate::error::Result;
use crate::pipeline::{MAX_VARIANTS, OutputFormat, VariantRequest};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TOLERANCE: f64 = 40.0;
pub const DEFAULT_VARIANT_COUNT: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum RGB distance from the target for a pixel to be recolored.
    pub tolerance: f64,
    pub jitter: JitterRanges,
    /// Number of variants when seeds are not given explicitly.
    pub variant_count: usize,
    pub mirror_mode: MirrorMode,
    pub gradient: GradientSpec,
    /// Color to replace. When absent the caller picks one from the image.
    pub target: Option<Rgb>,
    pub output: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            jitter: JitterRanges::default(),
            variant_count: DEFAULT_VARIANT_COUNT,
            mirror_mode: MirrorMode::Off,
            gradient: GradientSpec::default(),
            target: None,
            output: OutputFormat::Pixels,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// `variant_count` forced into 1..=500.
    pub fn clamped_variant_count(&self) -> usize {
        self.variant_count.clamp(1, MAX_VARIANTS)
    }

    /// The configured target, if any, as a replacement target.
    pub fn target_color(&self) -> Option<TargetColor> {
        self.target.map(TargetColor::new)
    }

    /// Builds a request for `base`. Nothing is validated until the request is run.
    pub fn into_request(self, base: PixelBuffer, target: TargetColor, seeds: Vec<u32>) -> VariantRequest {
        VariantRequest::new(base, target, seeds)
            .with_tolerance(self.tolerance)
            .with_jitter(self.jitter)
            .with_gradient(self.gradient)
            .with_mirror_mode(self.mirror_mode)
            .with_output(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::gradient::GradientKind;

    #[test]
    fn empty_json_gives_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.tolerance, 40.0);
        assert_eq!(config.jitter, JitterRanges::new(30.0, 10.0, 10.0));
        assert_eq!(config.variant_count, 24);
        assert_eq!(config.mirror_mode, MirrorMode::Off);
        assert_eq!(config.gradient.stops[0].color.to_hex(), "#6aa6ff");
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = PipelineConfig::from_json_str(
            r##"{
                "tolerance": 12.5,
                "mirror_mode": "random",
                "target": "#ff0000",
                "gradient": {
                    "type": "radial",
                    "stops": [
                        { "offset": 0.0, "color": "#000000" },
                        { "offset": 1.0, "color": "#ffffff" }
                    ]
                }
            }"##,
        )
        .unwrap();
        assert_eq!(config.tolerance, 12.5);
        assert_eq!(config.mirror_mode, MirrorMode::Random);
        assert_eq!(config.target, Some(Rgb::new(255, 0, 0)));
        assert_eq!(config.gradient.kind, GradientKind::Radial);
        assert_eq!(config.gradient.angle, 0.0);
        assert_eq!(config.variant_count, 24);
    }

    #[test]
    fn unknown_mirror_mode_is_rejected() {
        assert!(PipelineConfig::from_json_str(r#"{ "mirror_mode": "sideways" }"#).is_err());
    }

    #[test]
    fn variant_count_is_clamped() {
        let mut config = PipelineConfig::default();
        config.variant_count = 0;
        assert_eq!(config.clamped_variant_count(), 1);
        config.variant_count = 10_000;
        assert_eq!(config.clamped_variant_count(), 500);
        config.variant_count = 7;
        assert_eq!(config.clamped_variant_count(), 7);
    }

    #[test]
    fn request_carries_every_setting() {
        let mut config = PipelineConfig::default();
        config.tolerance = 5.0;
        config.mirror_mode = MirrorMode::On;
        config.output = OutputFormat::Png;
        let base = PixelBuffer::filled(2, 2, [1, 2, 3, 255]).unwrap();
        let request = config.into_request(base, TargetColor::new(Rgb::new(1, 2, 3)), vec![4, 5]);
        assert_eq!(request.tolerance, 5.0);
        assert_eq!(request.mirror_mode, MirrorMode::On);
        assert_eq!(request.output, OutputFormat::Png);
        assert_eq!(request.seeds, vec![4, 5]);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "variant_count": 3 }"#).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap().variant_count, 3);
        assert!(PipelineConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
