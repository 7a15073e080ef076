use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clip_review::config::{ReviewConfig, SamplingMode};
use clip_review::processing::GridBatcher;
use clip_review::session::{ReviewSession, VideoOutcome};
use clip_review::video::FfmpegSource;
use clip_review::vision::{ChatCompletionsClient, VisionClient};
use clip_review::{sampling, ReviewResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Compliance review for short video clips using a vision model.
#[derive(Parser, Debug)]
#[command(name = "clip-review", version)]
#[command(about = "Sample a video, ask a vision model about it, and score the result")]
struct Cli {
    /// TOML config file; defaults apply when it does not exist
    #[arg(short, long, global = true, default_value = "review.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Review videos (files or directories of videos)
    Review {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Do not write screenshots or JSON reports
        #[arg(long)]
        no_artifacts: bool,
    },
    /// Extract the sampled frames of a video to disk
    Sample {
        file: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        #[arg(short, long, default_value = "output/frames")]
        out: PathBuf,
    },
    /// Build the grid images a review would send, and save them
    Grid {
        file: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        #[arg(short, long, default_value = "output/grids")]
        out: PathBuf,
    },
    /// Review a single image
    Image {
        file: PathBuf,
        /// The image is a composed grid
        #[arg(long)]
        grid: bool,
    },
    /// Check provider credentials and reachability
    TestAi,
    /// Print the effective rules and settings
    Rules,
}

/// Command-line overrides for the `[sampling]` and `[grid]` sections.
#[derive(Args, Debug, Default)]
struct SamplingArgs {
    /// Sampling mode: uniform or scene
    #[arg(long)]
    mode: Option<SamplingMode>,
    /// Samples per second (uniform mode)
    #[arg(long)]
    fps: Option<f64>,
    /// Fixed seconds between samples (uniform mode)
    #[arg(long)]
    interval: Option<f64>,
    /// Maximum number of samples
    #[arg(short = 'n', long)]
    max_frames: Option<usize>,
    /// Scene-change threshold (scene mode)
    #[arg(short, long)]
    threshold: Option<f64>,
    /// Minimum seconds between scene samples
    #[arg(short = 'i', long)]
    min_interval: Option<f64>,
    /// Review composite grids instead of single frames
    #[arg(long)]
    grid: bool,
    /// Grid columns (and rows)
    #[arg(long)]
    cols: Option<u32>,
}

impl SamplingArgs {
    fn apply(&self, config: &mut ReviewConfig) {
        let s = &mut config.sampling;
        if let Some(mode) = self.mode {
            s.mode = mode;
        }
        if let Some(fps) = self.fps {
            s.fps = fps;
            s.interval_secs = None;
        }
        if let Some(interval) = self.interval {
            s.interval_secs = Some(interval);
        }
        if let Some(max) = self.max_frames {
            s.max_frames = max;
        }
        if let Some(threshold) = self.threshold {
            s.scene_threshold = threshold;
        }
        if let Some(min_interval) = self.min_interval {
            s.min_interval = min_interval;
        }
        if self.grid {
            config.grid.enabled = true;
        }
        if let Some(cols) = self.cols {
            config.grid.cols = cols;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clip_review=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Review {
            paths,
            sampling,
            no_artifacts,
        } => {
            sampling.apply(&mut config);
            config.validate().map_err(anyhow::Error::msg)?;
            let client = ChatCompletionsClient::from_options(&config.provider)
                .context("cannot review without a working vision client")?;
            let session = ReviewSession::builder()
                .config(config)
                .client(Box::new(client))
                .write_artifacts(!no_artifacts)
                .build()?;
            print_reports(&session.run(&paths));
        }
        Command::Sample { file, sampling, out } => {
            sampling.apply(&mut config);
            config.validate().map_err(anyhow::Error::msg)?;
            let video = FfmpegSource::open(&file)?;
            let plan = sampling::sample(&video, &config.sampling)?;
            fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;
            for (n, s) in plan.samples.iter().enumerate() {
                let path = out.join(format!("frame_{n:04}_{:.2}s.jpg", s.timestamp));
                fs::write(&path, &s.image).with_context(|| format!("writing {}", path.display()))?;
            }
            println!("saved {} frames to {}", plan.len(), out.display());
        }
        Command::Grid { file, sampling, out } => {
            sampling.apply(&mut config);
            config.validate().map_err(anyhow::Error::msg)?;
            let video = FfmpegSource::open(&file)?;
            let plan = sampling::sample(&video, &config.sampling)?;
            let grids = GridBatcher::new(&config.grid).batch(&plan.samples);
            fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;
            for (n, g) in grids.iter().enumerate() {
                let path = out.join(format!("grid_{n:03}.jpg"));
                fs::write(&path, &g.image).with_context(|| format!("writing {}", path.display()))?;
                println!("{}  {}x{}  {}", path.display(), g.width, g.height, g.time_range());
            }
            println!("{} samples packed into {} grids", plan.len(), grids.len());
        }
        Command::Image { file, grid } => {
            config.validate().map_err(anyhow::Error::msg)?;
            let client = ChatCompletionsClient::from_options(&config.provider)?;
            let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let result = clip_review::review_image(bytes, grid, &config, &client)?;
            print_result(&file, &result);
        }
        Command::TestAi => {
            let client = ChatCompletionsClient::from_options(&config.provider)?;
            let reply = client.test_connection()?;
            println!("{} ({}) answered: {}", config.provider.kind.name(), client.model(), reply.trim());
        }
        Command::Rules => {
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<ReviewConfig> {
    if path.exists() {
        ReviewConfig::load_from_file(path).with_context(|| format!("loading {}", path.display()))
    } else {
        tracing::debug!(config = %path.display(), "no config file, using defaults");
        Ok(ReviewConfig::default())
    }
}

fn print_result(path: &Path, result: &ReviewResult) {
    let verdict = if result.is_compliant { "PASS" } else { "FAIL" };
    println!("{verdict}  {:>3}/100  {}", result.overall_score, path.display());
    println!("      {}", result.summary);
    for issue in &result.issues {
        println!(
            "      [{:>8}] {:>7.2}s  {}: {}",
            issue.severity, issue.timestamp, issue.category, issue.description
        );
    }
}

fn print_reports(reports: &[clip_review::session::VideoReport]) {
    for report in reports {
        match &report.outcome {
            VideoOutcome::Reviewed {
                result,
                screenshots,
                report: json,
            } => {
                print_result(&report.path, result);
                for (t, shot) in screenshots {
                    println!("      screenshot {t:.2}s -> {}", shot.display());
                }
                if let Some(json) = json {
                    println!("      report -> {}", json.display());
                }
            }
            VideoOutcome::Undetermined { reason } => {
                println!("????  undetermined  {}: {reason}", report.path.display());
            }
            VideoOutcome::Skipped { reason } => {
                println!("SKIP  {}: {reason}", report.path.display());
            }
        }
    }
}
