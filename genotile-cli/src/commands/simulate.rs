//! Simulate command - drive the engine through a synthetic browsing session.
//!
//! A viewport pans across a contig while zooming out and back in. Every
//! frame requests the visible tiles, resolves fallbacks for gaps, textures
//! the touched blocks on a headless device and evicts over capacity. Data
//! comes from a synthetic signal source with configurable latency and
//! failure rate.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Handle;
use tracing::info;

use genotile::config::EngineConfig;
use genotile::engine::TileEngine;
use genotile::fallback::{needs_fallback, FadeTracker, FallbackResolver, GapTile, OpacityProbe};
use genotile::fetch::{BoxFuture, FetchError, FetchRequest, FetchStats, TileSource};
use genotile::texture::{
    DeviceCounters, GpuDevice, HeadlessDevice, TextureBlockManager, TextureStats,
};
use genotile::tile::{BlockKey, SignalPayload, TileState};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the simulate command.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Frames to render
    #[arg(long, default_value = "240")]
    pub frames: u32,

    /// Frame interval in milliseconds
    #[arg(long, default_value = "16")]
    pub frame_ms: u64,

    /// Contig to browse
    #[arg(long, default_value = "chr1")]
    pub set_id: String,

    /// Contig length in bases
    #[arg(long, default_value = "50000000")]
    pub contig_length: u64,

    /// Viewport width in pixels
    #[arg(long, default_value = "1600")]
    pub viewport_px: u32,

    /// Starting density in bases per pixel
    #[arg(long, default_value = "1.0")]
    pub start_density: f64,

    /// Density multiplier per frame (out for the first half, back in after)
    #[arg(long, default_value = "1.05")]
    pub zoom_factor: f64,

    /// Fraction of the viewport panned per frame
    #[arg(long, default_value = "0.05")]
    pub pan_fraction: f64,

    /// Base fetch latency in milliseconds
    #[arg(long, default_value = "40")]
    pub latency_ms: u64,

    /// Extra random latency of up to this many milliseconds
    #[arg(long, default_value = "40")]
    pub jitter_ms: u64,

    /// Probability a fetch fails
    #[arg(long, default_value = "0.02")]
    pub failure_rate: f64,

    /// Override the texture capacity from the config file
    #[arg(long)]
    pub max_textures: Option<usize>,

    /// Seed for latency and failure draws
    #[arg(long, default_value = "1")]
    pub seed: u64,
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, config_path: Option<&Path>, verbose: bool) -> Result<(), CliError> {
    validate(&args)?;

    // the progress bar owns the terminal; log events go to the file only
    let progress_drawn = Term::stderr().is_term();
    let runner = CliRunner::new(config_path, verbose, !progress_drawn)?;
    runner.log_startup("simulate");

    let mut config = runner.config().engine;
    if let Some(max_textures) = args.max_textures {
        config.textures = config.textures.with_max_textures(max_textures);
    }

    println!("{}", style("genotile session simulation").bold().cyan());
    println!(
        "  {} frames over {} ({} bp), tiles {}×{}, capacity {} textures",
        args.frames,
        args.set_id,
        args.contig_length,
        config.blocks.tile_width(),
        config.blocks.rows_per_block(),
        config.textures.max_textures
    );
    println!(
        "  latency {}+{} ms, failure rate {:.1}%",
        args.latency_ms,
        args.jitter_ms,
        args.failure_rate * 100.0
    );
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let progress = ProgressBar::new(args.frames as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("  Frames: [{bar:30}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let started = Instant::now();
    let report = runtime.block_on(run_session(&args, &config, &progress));
    progress.finish_and_clear();
    let report = report?;

    info!(
        fetch = %report.fetch,
        textures = %report.textures,
        "Simulation finished"
    );
    print_report(&report, started.elapsed());
    Ok(())
}

fn validate(args: &SimulateArgs) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err(CliError::Config(format!(
            "failure rate must be between 0 and 1, got {}",
            args.failure_rate
        )));
    }
    if args.zoom_factor < 1.0 {
        return Err(CliError::Config(format!(
            "zoom factor must be at least 1, got {}",
            args.zoom_factor
        )));
    }
    if args.contig_length == 0 || args.viewport_px == 0 {
        return Err(CliError::Config(
            "contig length and viewport width must be positive".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// Smooth synthetic coverage track.
pub struct SyntheticSignalSource {
    latency: Duration,
    jitter_ms: u64,
    failure_rate: f64,
    rng: Mutex<StdRng>,
}

impl SyntheticSignalSource {
    pub fn new(latency: Duration, jitter_ms: u64, failure_rate: f64, seed: u64) -> Self {
        Self {
            latency,
            jitter_ms,
            failure_rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Delay and failure for the next fetch.
    fn draw(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock();
        let jitter = rng.random_range(0..=self.jitter_ms);
        let fail = rng.random::<f64>() < self.failure_rate;
        (self.latency + Duration::from_millis(jitter), fail)
    }
}

/// Signal value at base `x`.
fn synthetic_value(x: f64) -> f32 {
    ((x / 40_000.0).sin() * 40.0 + (x / 3_500.0).sin() * 10.0 + 50.0) as f32
}

impl TileSource<SignalPayload> for SyntheticSignalSource {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<SignalPayload, FetchError>> {
        let (delay, fail) = self.draw();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if fail {
                return Err(FetchError::Transport("synthetic failure".to_string()));
            }
            let rate = request.sampling_rate as f64;
            let samples = (0..request.expected_samples())
                .map(|i| synthetic_value(request.start as f64 + (i as f64 + 0.5) * rate))
                .collect();
            Ok(SignalPayload::new(samples))
        })
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewport {
    center: f64,
    density: f64,
    width_px: f64,
    contig_length: f64,
}

impl Viewport {
    fn new(args: &SimulateArgs) -> Self {
        let width_px = args.viewport_px as f64;
        let density = args.start_density.max(1.0);
        Self {
            center: width_px * density / 2.0,
            density,
            width_px,
            contig_length: args.contig_length as f64,
        }
    }

    fn range(&self) -> (f64, f64) {
        let half = self.width_px * self.density / 2.0;
        (self.center - half, self.center + half)
    }

    /// Advance one frame: zoom out during the first half, in during the
    /// second, and pan right, wrapping at the contig end.
    fn step(&mut self, frame: u32, frames: u32, zoom_factor: f64, pan_fraction: f64) {
        let max_density = (self.contig_length / self.width_px).max(1.0);
        self.density = if frame < frames / 2 {
            self.density * zoom_factor
        } else {
            self.density / zoom_factor
        }
        .clamp(1.0, max_density);

        let width = self.width_px * self.density;
        self.center += width * pan_fraction;
        if self.center - width / 2.0 >= self.contig_length {
            self.center = width / 2.0;
        }
    }
}

#[derive(Debug, Default)]
struct SessionReport {
    frames: u32,
    tiles_visited: usize,
    gap_tiles: usize,
    fallbacks_drawn: usize,
    blocks: usize,
    resident_textures: usize,
    fetch: FetchStats,
    textures: TextureStats,
    device: DeviceCounters,
}

async fn run_session(
    args: &SimulateArgs,
    config: &EngineConfig,
    progress: &ProgressBar,
) -> Result<SessionReport, CliError> {
    let source = Arc::new(SyntheticSignalSource::new(
        Duration::from_millis(args.latency_ms),
        args.jitter_ms,
        args.failure_rate,
        args.seed,
    ));
    let mut engine = TileEngine::new(source, config.blocks, Handle::current());
    engine.set_maximum_x(args.contig_length);

    let mut device = HeadlessDevice::default();
    let mut textures =
        TextureBlockManager::<SignalPayload>::new(device.capabilities(), config.textures, &config.blocks)?;
    let mut resolver = FallbackResolver::new(config.fallback);
    let mut fade = FadeTracker::new(config.fallback.fade_duration, Instant::now());

    let mut viewport = Viewport::new(args);
    let frame_interval = Duration::from_millis(args.frame_ms);
    let mut report = SessionReport::default();

    for frame in 0..args.frames {
        fade.advance(Instant::now());
        resolver.begin_frame();
        engine.poll_completions();

        let (x0, x1) = viewport.range();
        let density = viewport.density;
        let mut visible: Vec<(GapTile, TileState)> = Vec::new();
        engine.get_tiles(&args.set_id, x0, x1, density, true, |tile| {
            visible.push((GapTile::from_tile(tile, density), tile.state()));
        });
        report.tiles_visited += visible.len();

        let mut touched: HashSet<BlockKey> = HashSet::new();
        for (gap, state) in &visible {
            engine.mark_last_used(&gap.key);
            touched.insert(gap.key.block.clone());

            let opacity = fade.opacity(&gap.key, *state);
            if needs_fallback(*state, opacity) {
                report.gap_tiles += 1;
                let fallbacks = resolver.resolve(engine.store_mut(), gap, &mut fade);
                report.fallbacks_drawn += fallbacks.len();
                touched.extend(fallbacks.into_iter().map(|fallback| fallback.key.block));
            }
        }

        for block in &touched {
            textures.get_texture(&mut device, engine.store_mut(), block)?;
        }
        textures.flush_uploads(&mut device, engine.store())?;
        let evicted: HashSet<BlockKey> = textures
            .evict(&mut device, engine.store_mut())
            .into_iter()
            .collect();
        if !evicted.is_empty() {
            fade.retain(|key| !evicted.contains(&key.block));
        }

        report.frames += 1;
        progress.inc(1);
        tokio::time::sleep(frame_interval).await;
        viewport.step(frame, args.frames, args.zoom_factor, args.pan_fraction);
    }

    // fetches still in flight land in the cache even though nothing draws them
    while engine.next_completion().await.is_some() {}

    report.blocks = engine.store().block_count();
    report.resident_textures = textures.texture_count();
    report.fetch = engine.stats();
    report.textures = textures.stats();
    report.device = device.counters();
    Ok(report)
}

fn print_report(report: &SessionReport, elapsed: Duration) {
    println!("{}", style("Session Results").bold().green());
    println!("  Frames:            {}", report.frames);
    println!("  Elapsed:           {:.2}s", elapsed.as_secs_f64());
    println!("  Tiles visited:     {}", report.tiles_visited);
    println!("  Gap tiles:         {}", report.gap_tiles);
    println!("  Fallbacks drawn:   {}", report.fallbacks_drawn);
    println!();

    println!("{}", style("Fetches").bold());
    println!("  Issued:            {}", report.fetch.issued);
    println!("  Completed:         {}", report.fetch.completed);
    println!("  Failed:            {}", report.fetch.failed);
    println!("  Oversized:         {}", report.fetch.oversized);
    println!("  Orphaned:          {}", report.fetch.orphaned);
    println!();

    println!("{}", style("Textures").bold());
    println!("  Blocks cached:     {}", report.blocks);
    println!("  Resident:          {}", report.resident_textures);
    println!("  Allocated:         {}", report.textures.allocated);
    println!("  Rows uploaded:     {}", report.textures.rows_uploaded);
    println!("  Evicted:           {}", report.textures.evicted);
    println!(
        "  Device:            created={} updated={} deleted={}",
        report.device.created, report.device.updated, report.device.deleted
    );
}
