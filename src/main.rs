// THEORY:
// The `hue_variants` binary is a thin shell around the library. It reads one
// image, settles the batch settings (config file first, flags on top), submits
// the batch to a `ParallelPipeline` and writes each variant to disk as soon as
// its event arrives. Ctrl-C cancels the batch between variants; whatever was
// already written stays on disk and is listed in the manifest.

use anyhow::{Context, bail};
use clap::Parser;
use futures::{Stream, StreamExt};
use hue_variants::core_modules::color_space::color_space::{Rgb, TargetColor};
use hue_variants::core_modules::compositor::MirrorMode;
use hue_variants::core_modules::gradient::GradientSpec;
use hue_variants::core_modules::prng::JitterRanges;
use hue_variants::core_modules::utils::image_helper::image_helper;
use hue_variants::manifest::{MANIFEST_FILE_NAME, Manifest, save_variant};
use hue_variants::{BatchEvent, ParallelPipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use std::pin::pin;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hue_variants")]
#[command(about = "Generate seeded recolor variants of an image over gradient backgrounds")]
#[command(version)]
struct Args {
    /// Base image (any format the `image` crate decodes)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Directory for variant_NNN.png files and metadata.json
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Color to replace, as #rrggbb
    #[arg(long, value_parser = parse_color, conflicts_with = "pick")]
    target: Option<Rgb>,

    /// Take the color to replace from pixel X,Y of the (squared) input
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pick: Option<(u32, u32)>,

    /// Number of variants when --seeds is not given (1-500)
    #[arg(short, long)]
    count: Option<usize>,

    /// Explicit seeds; one variant per seed
    #[arg(long, value_delimiter = ',')]
    seeds: Option<Vec<u32>>,

    /// Hue jitter in degrees
    #[arg(long)]
    hue_range: Option<f64>,

    /// Saturation jitter in percentage points
    #[arg(long)]
    sat_range: Option<f64>,

    /// Lightness jitter in percentage points
    #[arg(long)]
    light_range: Option<f64>,

    /// Maximum RGB distance from the target color
    #[arg(long)]
    tolerance: Option<f64>,

    /// on, off or random
    #[arg(long)]
    mirror: Option<MirrorMode>,

    /// JSON file with batch settings; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replace the configured gradient with a random one
    #[arg(long)]
    random_gradient: bool,
}

fn parse_color(s: &str) -> Result<Rgb, String> {
    Rgb::from_hex(s).map_err(|err| err.to_string())
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|_| format!("bad x coordinate '{x}'"))?;
    let y = y.trim().parse().map_err(|_| format!("bad y coordinate '{y}'"))?;
    Ok((x, y))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Config file (if any) with command-line overrides applied.
fn resolve_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    config.jitter = JitterRanges::new(
        args.hue_range.unwrap_or(config.jitter.hue),
        args.sat_range.unwrap_or(config.jitter.saturation),
        args.light_range.unwrap_or(config.jitter.lightness),
    );
    if let Some(count) = args.count {
        config.variant_count = count;
    }
    if let Some(mirror) = args.mirror {
        config.mirror_mode = mirror;
    }
    if let Some(target) = args.target {
        config.target = Some(target);
    }
    if args.random_gradient {
        config.gradient = GradientSpec::randomized(&mut rand::thread_rng());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let base = image_helper::load(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?
        .fit_square();

    let target = match (args.pick, config.target_color()) {
        (Some((x, y)), _) => base.pick_target(x, y)?,
        (None, Some(target)) => target,
        (None, None) => bail!("no color to replace: pass --target or --pick"),
    };
    if target.alpha == Some(0) {
        warn!("picked pixel is fully transparent; its color may not be meaningful");
    }

    let seeds = match &args.seeds {
        Some(seeds) => seeds.clone(),
        None => (0..config.clamped_variant_count()).map(|_| rand::random::<u32>()).collect(),
    };

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        size = base.width(),
        target_color = %target.rgb.to_hex(),
        variants = seeds.len(),
        "starting"
    );

    let pipeline = ParallelPipeline::with_workers(1);
    let handle = pipeline.submit(config.into_request(base, target, seeds))?;
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = write_batch(handle.into_stream(), &args.output).await;
    pipeline.shutdown().await;
    outcome?;
    Ok(())
}

/// Saves each variant as it arrives, then the manifest of everything saved.
/// The manifest is written even when the batch fails part-way.
async fn write_batch(
    events: impl Stream<Item = hue_variants::Result<BatchEvent>>,
    output: &Path,
) -> anyhow::Result<usize> {
    let mut manifest = Manifest::new();
    let outcome = write_variants(events, output, &mut manifest).await;

    let manifest_path = output.join(MANIFEST_FILE_NAME);
    match manifest.write(&manifest_path) {
        Ok(()) => info!(path = %manifest_path.display(), entries = manifest.len(), "manifest written"),
        Err(err) if outcome.is_ok() => return Err(err.into()),
        Err(err) => warn!(error = %err, "manifest not written"),
    }
    outcome?;
    Ok(manifest.len())
}

async fn write_variants(
    events: impl Stream<Item = hue_variants::Result<BatchEvent>>,
    output: &Path,
    manifest: &mut Manifest,
) -> anyhow::Result<()> {
    let mut events = pin!(events);
    while let Some(event) = events.next().await {
        match event? {
            BatchEvent::Variant(result) => {
                let path = save_variant(output, &result)
                    .with_context(|| format!("failed to save variant {}", result.index + 1))?;
                info!(path = %path.display(), seed = result.metadata.seed, "variant written");
                manifest.push(result.metadata);
            }
            BatchEvent::Complete { produced } => info!(produced, "all variants written"),
            BatchEvent::Cancelled { produced } => warn!(produced, "interrupted"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["hue_variants", "--input", "in.png", "--output", "out"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn points_parse() {
        assert_eq!(parse_point("3,4"), Ok((3, 4)));
        assert_eq!(parse_point(" 10 , 0"), Ok((10, 0)));
        assert!(parse_point("3").is_err());
        assert!(parse_point("a,4").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = args(&[
            "--target", "#ff0000", "--count", "900", "--hue-range", "5", "--mirror", "random",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.target, Some(Rgb::new(255, 0, 0)));
        assert_eq!(config.clamped_variant_count(), 500);
        assert_eq!(config.jitter, JitterRanges::new(5.0, 10.0, 10.0));
        assert_eq!(config.mirror_mode, MirrorMode::Random);
    }

    #[test]
    fn seeds_are_comma_separated() {
        let args = args(&["--seeds", "1,2,42"]);
        assert_eq!(args.seeds, Some(vec![1, 2, 42]));
    }

    fn rendered_variant() -> hue_variants::VariantResult {
        use hue_variants::core_modules::pixel_buffer::PixelBuffer;
        use hue_variants::{VariantPipeline, VariantRequest};
        let base = PixelBuffer::filled(2, 2, [200, 10, 10, 255]).unwrap();
        let request = VariantRequest::new(base, TargetColor::new(Rgb::new(200, 10, 10)), vec![42]);
        VariantPipeline::new(request).unwrap().collect_results().unwrap().remove(0)
    }

    #[tokio::test]
    async fn manifest_is_written_when_a_batch_fails_part_way() {
        let dir = tempfile::tempdir().unwrap();
        let events = futures::stream::iter(vec![
            Ok(BatchEvent::Variant(rendered_variant())),
            Err(hue_variants::VariantError::from(std::io::Error::other("disk full"))),
        ]);

        assert!(write_batch(events, dir.path()).await.is_err());
        assert!(dir.path().join("variant_001.png").exists());
        let manifest = std::fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).unwrap();
        let entries: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["seed"], 42);
    }

    #[tokio::test]
    async fn complete_batch_reports_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let events = futures::stream::iter(vec![
            Ok(BatchEvent::Variant(rendered_variant())),
            Ok(BatchEvent::Complete { produced: 1 }),
        ]);
        assert_eq!(write_batch(events, dir.path()).await.unwrap(), 1);
    }

    #[test]
    fn target_and_pick_conflict() {
        let argv = [
            "hue_variants", "--input", "a.png", "--output", "o", "--target", "#000000", "--pick",
            "0,0",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
