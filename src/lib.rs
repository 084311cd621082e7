// THEORY:
// This file is the main entry point for the `hue_variants` library crate. It
// exposes the recoloring engine to the `hue_variants` binary and to any other
// embedder.
//
// The primary API is `VariantPipeline` (one batch, lazily, in seed order) and
// `ParallelPipeline` (many independent batches on a tokio worker pool), both
// driven by a `VariantRequest`. `PipelineConfig` is the file-backed way to
// build a request. The pixel math lives in `core_modules` and is usable on its
// own: color conversion, the tolerance mask, the seeded jitter, the gradient
// renderer and the compositor.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod manifest;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{Result, VariantError};
pub use manifest::{Manifest, ManifestEntry};
pub use parallel_pipeline::{BatchHandle, ParallelPipeline};
pub use pipeline::{
    BatchEvent, CancellationToken, OutputFormat, VariantImage, VariantMetadata, VariantPipeline,
    VariantRequest, VariantResult,
};
