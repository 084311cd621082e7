// THEORY:
// The `pipeline` module is the top-level API of the recoloring engine. It takes
// one `VariantRequest`, checks it once up front, builds the two batch-wide
// artifacts (the tolerance mask and the gradient background) and then produces
// one variant per seed, in seed order, as a lazy sequence of `BatchEvent`s.
//
// Key architectural principles:
// 1.  **Fail fast**: every validation happens in `VariantPipeline::new`. Once a
//     pipeline exists, the per-variant math cannot fail (PNG encoding is the
//     only fallible step, and only in `OutputFormat::Png`).
// 2.  **Lazy results**: `run` hands back an iterator. Nothing is rendered until
//     the consumer pulls, so progress can be shown (or bytes streamed) per item.
// 3.  **Explicit end**: after the last variant the sequence yields exactly one
//     terminal event, `Complete` or `Cancelled`, and then ends. An `Err` item
//     also ends it and takes the place of the terminal event; the variants
//     emitted before it stay valid.
// 4.  **Cancellation between variants**: a `CancellationToken` is checked before
//     each variant starts. A variant in progress always finishes; everything
//     already emitted stays valid.

use crate::core_modules::color_space::color_space::{Rgb, TargetColor};
use crate::core_modules::compositor::{Compositor, MirrorMode};
use crate::core_modules::gradient::GradientSpec;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::prng::{HslDeltas, JitterRanges};
use crate::core_modules::tolerance_mask::ToleranceMask;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{Result, VariantError, ensure_non_negative};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Upper bound on the number of seeds in one request.
pub const MAX_VARIANTS: usize = 500;

/// How each variant's image is handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Raw RGBA buffer.
    #[default]
    Pixels,
    /// PNG-encoded bytes.
    Png,
}

/// Everything needed to produce one batch of variants.
#[derive(Debug, Clone)]
pub struct VariantRequest {
    pub base: PixelBuffer,
    pub target: TargetColor,
    pub tolerance: f64,
    pub jitter: JitterRanges,
    pub gradient: GradientSpec,
    pub mirror_mode: MirrorMode,
    pub seeds: Vec<u32>,
    pub output: OutputFormat,
}

impl VariantRequest {
    /// A request with default tolerance, jitter, gradient and mirror settings.
    pub fn new(base: PixelBuffer, target: TargetColor, seeds: Vec<u32>) -> Self {
        Self {
            base,
            target,
            tolerance: 40.0,
            jitter: JitterRanges::default(),
            gradient: GradientSpec::default(),
            mirror_mode: MirrorMode::Off,
            seeds,
            output: OutputFormat::Pixels,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterRanges) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_gradient(mut self, gradient: GradientSpec) -> Self {
        self.gradient = gradient;
        self
    }

    pub fn with_mirror_mode(mut self, mirror_mode: MirrorMode) -> Self {
        self.mirror_mode = mirror_mode;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Checks every input that could make the batch fail part-way.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("tolerance", self.tolerance)?;
        self.jitter.validate()?;
        self.gradient.validate()?;
        if self.seeds.is_empty() || self.seeds.len() > MAX_VARIANTS {
            return Err(VariantError::InvalidVariantCount {
                count: self.seeds.len(),
                max: MAX_VARIANTS,
            });
        }
        Ok(())
    }
}

/// The per-variant record written alongside each image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetadata {
    pub index: usize,
    /// What the target color became under this variant's deltas.
    pub body_color: Rgb,
    pub gradient: GradientSpec,
    pub mirrored: bool,
    pub seed: u32,
    pub hsl_deltas: HslDeltas,
}

/// A finished variant image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantImage {
    Pixels(PixelBuffer),
    Png(Vec<u8>),
}

impl VariantImage {
    /// PNG bytes, encoding raw pixels if needed.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        match self {
            VariantImage::Pixels(buffer) => image_helper::encode_png(buffer),
            VariantImage::Png(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantResult {
    pub index: usize,
    pub image: VariantImage,
    pub metadata: VariantMetadata,
}

/// One item of a batch's output sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Variant(VariantResult),
    /// Every seed produced a variant.
    Complete { produced: usize },
    /// The batch stopped early; `produced` variants were emitted before the stop.
    Cancelled { produced: usize },
}

/// Shared flag checked between variants.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A validated request plus the batch-wide mask and background.
pub struct VariantPipeline {
    request: VariantRequest,
    mask: ToleranceMask,
    background: PixelBuffer,
    mirror_rng: Box<dyn RngCore + Send>,
}

impl VariantPipeline {
    pub fn new(request: VariantRequest) -> Result<Self> {
        request.validate()?;
        let mask = ToleranceMask::build(&request.base, &request.target, request.tolerance)?;
        let background = request
            .gradient
            .render(request.base.width(), request.base.height())?;
        info!(
            width = request.base.width(),
            height = request.base.height(),
            masked_pixels = mask.len(),
            variants = request.seeds.len(),
            target_color = %request.target.rgb.to_hex(),
            "variant batch prepared"
        );
        if mask.is_empty() {
            debug!("tolerance mask is empty; variants will only differ by background and mirroring");
        }
        Ok(Self {
            request,
            mask,
            background,
            mirror_rng: Box::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the coin used by `MirrorMode::Random`.
    pub fn with_mirror_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.mirror_rng = Box::new(rng);
        self
    }

    pub fn request(&self) -> &VariantRequest {
        &self.request
    }

    pub fn mask(&self) -> &ToleranceMask {
        &self.mask
    }

    pub fn background(&self) -> &PixelBuffer {
        &self.background
    }

    pub fn len(&self) -> usize {
        self.request.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request.seeds.is_empty()
    }

    /// Renders the variant for `seeds[index]`.
    fn render_variant(&mut self, index: usize) -> Result<VariantResult> {
        let seed = self.request.seeds[index];
        let deltas = HslDeltas::from_seed(seed, &self.request.jitter);
        let mirrored = self.request.mirror_mode.decide(&mut *self.mirror_rng);

        let compositor = Compositor::new(
            &self.request.base,
            &self.mask,
            &self.background,
            self.request.target,
        );
        let composited = compositor.render(&deltas, mirrored);
        let body_color = compositor.swatch(&deltas);

        let image = match self.request.output {
            OutputFormat::Pixels => VariantImage::Pixels(composited),
            OutputFormat::Png => VariantImage::Png(image_helper::encode_png(&composited)?),
        };
        debug!(index, seed, mirrored, body_color = %body_color.to_hex(), "variant rendered");

        Ok(VariantResult {
            index,
            image,
            metadata: VariantMetadata {
                index,
                body_color,
                gradient: self.request.gradient.clone(),
                mirrored,
                seed,
                hsl_deltas: deltas,
            },
        })
    }

    /// Lazily renders every variant in seed order.
    pub fn run(self) -> VariantBatch {
        self.run_with_cancellation(CancellationToken::new())
    }

    pub fn run_with_cancellation(self, token: CancellationToken) -> VariantBatch {
        VariantBatch {
            pipeline: self,
            token,
            next_index: 0,
            finished: false,
        }
    }

    /// Renders the whole batch and returns only the variants.
    pub fn collect_results(self) -> Result<Vec<VariantResult>> {
        let mut results = Vec::with_capacity(self.len());
        for event in self.run() {
            if let BatchEvent::Variant(result) = event? {
                results.push(result);
            }
        }
        Ok(results)
    }
}

/// Iterator over a running batch. Yields one `Variant` per seed and then a single
/// terminal event, or stops right after the first `Err`.
pub struct VariantBatch {
    pipeline: VariantPipeline,
    token: CancellationToken,
    next_index: usize,
    finished: bool,
}

impl VariantBatch {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Number of variants emitted so far.
    pub fn produced(&self) -> usize {
        self.next_index
    }

    pub fn total(&self) -> usize {
        self.pipeline.len()
    }
}

impl Iterator for VariantBatch {
    type Item = Result<BatchEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let produced = self.next_index;
        if self.token.is_cancelled() {
            self.finished = true;
            warn!(produced, total = self.total(), "variant batch cancelled");
            return Some(Ok(BatchEvent::Cancelled { produced }));
        }
        if produced == self.pipeline.len() {
            self.finished = true;
            info!(produced, "variant batch complete");
            return Some(Ok(BatchEvent::Complete { produced }));
        }
        match self.pipeline.render_variant(produced) {
            Ok(result) => {
                self.next_index += 1;
                Some(Ok(BatchEvent::Variant(result)))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
