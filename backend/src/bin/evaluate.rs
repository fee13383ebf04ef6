use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use neurodl_backend::config::{AppConfig, ClassifierConfig};
use neurodl_backend::evaluation::{discover_dataset, evaluate};
use neurodl_backend::ModelSet;
use std::path::PathBuf;

/// Scores the classifiers (and the ensemble meta model) against a labelled test set.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory with one sub-directory of images per class
    #[arg(short, long, default_value = "data/raw_dataset/Testing")]
    test_dir: PathBuf,

    /// Where evaluation.json is written
    #[arg(short, long, default_value = "training_outputs/evaluation")]
    output_dir: PathBuf,

    /// YAML config; defaults to NEURODL_CONFIG or built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Evaluate the configured single classifier instead of the default ensemble
    #[arg(long, default_value_t = false)]
    single: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    if !config.models.classifier.is_ensemble() && !args.single {
        config.models.classifier = ClassifierConfig::default_ensemble();
    }
    // segmentation plays no part in scoring
    config.models.segmentation = None;

    log::info!("Loading test data from {}", args.test_dir.display());
    let dataset = discover_dataset(&args.test_dir)?;
    log::info!(
        "Found {} images in {} classes: {:?}",
        dataset.len(),
        dataset.class_labels.len(),
        dataset.class_labels
    );

    let models = ModelSet::load(&config.models)?;

    let progress_bar = ProgressBar::new(dataset.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    let report = evaluate(&models.classifier, &dataset, || progress_bar.inc(1))?;
    progress_bar.finish_and_clear();

    println!("{}", report.render_summary());
    let path = report.write_json(&args.output_dir)?;
    log::info!("Report saved to {}", path.display());
    Ok(())
}
