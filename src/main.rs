use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceprep::{config, dataset, pick, storage};
use faceprep_vision::pipeline::{self, AlignedFace, ColorMode};
use faceprep_vision::{Aligner, ApertureMask, FaceItem, LandmarkSession, Population};
use log::{debug, info, warn};

#[derive(Parser)]
#[command(name = "faceprep")]
#[command(
    version,
    about = "Landmark-based face alignment for stimulus preparation"
)]
struct Cli {
    /// Config file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log numeric detail for every image
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the canonical template from the landmark population and save it
    Template {
        /// Where to write the template (defaults to the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Align, mask and composite every image with landmarks
    Align {
        /// Reuse a saved template instead of averaging the current population
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
    /// Pick landmarks for one image from stdin commands
    Pick {
        image: PathBuf,
        /// Landmark file to write (defaults to the landmark directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Required number of landmarks
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Print the effective config, or write the defaults
    Config {
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_target(false)
        .format_timestamp(None)
        .init();

    let config_path = cli.config.as_deref();
    if let Commands::Config { init: true } = cli.command {
        return init_config(config_path);
    }
    let cfg = config::load_config(config_path)?;

    match cli.command {
        Commands::Template { output } => template(&cfg, output),
        Commands::Align { template } => align(&cfg, template),
        Commands::Pick {
            image,
            output,
            count,
        } => pick_landmarks(&cfg, &image, output, count),
        Commands::Config { .. } => {
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

fn discover(cfg: &config::Config) -> Result<Vec<FaceItem>> {
    info!("Reading landmarks from {}", cfg.paths.landmark_dir.display());
    let found = dataset::discover(&cfg.paths)?;
    if !found.skipped.is_empty() {
        warn!("{} face(s) skipped during discovery", found.skipped.len());
    }
    Ok(found.items)
}

fn build_population(cfg: &config::Config, items: Vec<FaceItem>) -> Result<Population> {
    Population::build(items, cfg.reference_pair()).context("building canonical template")
}

fn default_template_path(cfg: &config::Config) -> PathBuf {
    cfg.paths.output_dir.join(storage::TEMPLATE_FILE_NAME)
}

fn persist(cfg: &config::Config, population: &Population, path: &Path) -> Result<()> {
    let names = population.members.iter().map(|m| m.name.clone()).collect();
    let record = storage::TemplateRecord::new(&population.template, names);
    storage::save_template(path, &record).context("Failed to save canonical template")?;
    info!(
        "Saved template {} ({} landmarks, reference {}/{}) to {}",
        record.id,
        record.points.len(),
        cfg.reference.left,
        cfg.reference.right,
        path.display()
    );
    Ok(())
}

fn template(cfg: &config::Config, output: Option<PathBuf>) -> Result<()> {
    let items = discover(cfg)?;
    let population = build_population(cfg, items)?;

    let rescaled = population
        .template
        .rescale(&cfg.geometry())
        .context("rescaling canonical template")?;
    info!("Canonical landmarks on {}x{} canvas:", cfg.canvas.width, cfg.canvas.height);
    for (i, p) in rescaled.points().points().iter().enumerate() {
        info!("  {}: ({:.2}, {:.2})", i, p.x, p.y);
    }

    let path = output
        .or_else(|| cfg.paths.template_file.clone())
        .unwrap_or_else(|| default_template_path(cfg));
    persist(cfg, &population, &path)
}

fn align(cfg: &config::Config, template: Option<PathBuf>) -> Result<()> {
    let items = discover(cfg)?;

    // Phase 1: everything below depends on the finished template.
    let population = match template.or_else(|| cfg.paths.template_file.clone()) {
        Some(path) => {
            info!("Using saved template {}", path.display());
            let record = storage::load_template(&path)?;
            let canonical = record.to_template(cfg.reference_pair())?;
            Population::with_template(items, canonical).context("applying saved template")?
        }
        None => {
            let population = build_population(cfg, items)?;
            persist(cfg, &population, &default_template_path(cfg))?;
            population
        }
    };

    let rescaled = population
        .template
        .rescale(&cfg.geometry())
        .context("rescaling canonical template")?;
    debug!("rescaled template: {:?}", rescaled.points().to_xy());

    let mut aligner = Aligner::new(rescaled).with_color(cfg.color_mode());
    if let Some(params) = cfg.aperture_params() {
        let mask = ApertureMask::new(cfg.canvas.width, cfg.canvas.height, &params)
            .context("building aperture mask")?;
        aligner = aligner.with_mask(mask);
    }
    if let Some(compositor) = cfg.compositor() {
        aligner = aligner.with_compositor(compositor);
    }

    std::fs::create_dir_all(&cfg.paths.output_dir)
        .with_context(|| format!("creating {}", cfg.paths.output_dir.display()))?;

    // Phase 2: independent per-image work.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.workers)
        .build()
        .context("Failed to start worker pool")?;
    info!(
        "Aligning {} face(s) on {} worker(s)",
        population.members.len(),
        pool.current_num_threads()
    );
    let report = pool.install(|| {
        pipeline::run_batch(&aligner, &population.members, |item, face| {
            write_output(cfg, aligner.color(), item, face)
        })
    });

    let write_failures = report.write_failures().count();
    if write_failures > 0 {
        anyhow::bail!(
            "{} aligned image(s) could not be written to {}",
            write_failures,
            cfg.paths.output_dir.display()
        );
    }
    info!(
        "✓ {} face(s) aligned, {} skipped",
        report.written.len(),
        report.failed.len() + population.skipped.len()
    );
    Ok(())
}

fn write_output(
    cfg: &config::Config,
    color: ColorMode,
    item: &FaceItem,
    face: &AlignedFace,
) -> faceprep_vision::Result<PathBuf> {
    let path = dataset::output_path(&cfg.paths, &item.name);
    match color {
        ColorMode::Rgb => face.image.save(&path)?,
        ColorMode::Grayscale => image::imageops::grayscale(&face.image).save(&path)?,
    }
    Ok(path)
}

fn pick_landmarks(
    cfg: &config::Config,
    image: &Path,
    output: Option<PathBuf>,
    count: Option<usize>,
) -> Result<()> {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .context("image path has no file name")?;
    let output = output.unwrap_or_else(|| dataset::landmark_path(&cfg.paths, stem));

    let mut session = LandmarkSession::new(image);
    if let Some(n) = count {
        session = session.with_expected(n);
    }
    eprintln!("\nPicking landmarks for {}\n{}\n", image.display(), pick::HELP);

    match pick::run_session(session, std::io::stdin().lock())? {
        Some(set) => {
            set.save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("Saved {} landmarks to {}", set.len(), output.display());
        }
        None => info!("No landmarks saved, skipping."),
    }
    Ok(())
}

fn init_config(path: Option<&Path>) -> Result<()> {
    let target = path.unwrap_or(config::CONFIG_PATH.as_path());
    config::save_config(&config::Config::default(), Some(target))
        .with_context(|| format!("writing {}", target.display()))?;
    info!("Wrote default config to {}", target.display());
    Ok(())
}
