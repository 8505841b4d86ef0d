use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use homolog_core::models::{ingest, RawMedication};
use homolog_core::recommender::{
    homologate_batch, BATCH_SCORE_MINIMUM, DEFAULT_RECOMMENDATIONS, DEFAULT_SCORE_MINIMUM,
};
use homolog_core::{train, Database, RecommendationService, SimilarityWeights, TrainedModel};

#[derive(Parser, Debug)]
#[command(name = "homolog")]
#[command(about = "Medication homolog recommender", long_about = None)]
struct Args {
    /// Path to the SQLite store
    #[arg(long, default_value = "homolog.db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a JSON array of registry rows into the reference table
    Import {
        input: PathBuf,
    },

    /// Train a model on the reference table and save its bundle
    Train {
        /// JSON file with similarity weights
        #[arg(long)]
        weights: Option<PathBuf>,
    },

    /// Recommend homologs for one CUM using the latest bundle
    Recommend {
        cum: String,

        #[arg(short, default_value_t = DEFAULT_RECOMMENDATIONS)]
        n: usize,

        #[arg(long, default_value_t = DEFAULT_SCORE_MINIMUM)]
        min_score: f64,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Best homolog for every CUM in a file (one per line)
    Batch {
        input: PathBuf,

        #[arg(long, default_value_t = BATCH_SCORE_MINIMUM)]
        min_score: f64,
    },

    /// List saved model bundles
    Bundles,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let db = Database::open(&args.db).with_context(|| format!("opening {}", args.db.display()))?;

    match args.command {
        Command::Import { input } => {
            let text = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let rows: Vec<RawMedication> = serde_json::from_str(&text).context("parsing registry rows")?;
            let report = ingest(rows);
            let written = db.upsert_medications(&report.records)?;
            info!(written, rejected = report.rejected.len(), "import complete");
        }
        Command::Train { weights } => {
            let weights = load_weights(weights.as_deref())?;
            let model = train(db.list_medications()?, weights)?;
            db.save_model_bundle(&model)?;
            println!("{}", serde_json::to_string_pretty(model.meta())?);
        }
        Command::Recommend { cum, n, min_score, json } => {
            let model = latest_model(&db)?;
            let service = RecommendationService::new(&model);
            let result = service.recommend(cum.trim(), n, min_score);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if let Some(error) = &result.error {
                println!("{}: {}", error.code(), error);
            } else if result.recomendaciones.is_empty() {
                println!("No homologs at or above {:.2}", min_score);
            } else {
                for m in &result.recomendaciones {
                    println!("{}\t{:.4}\t{}", m.medication.cum, m.score, m.medication.producto);
                }
            }
        }
        Command::Batch { input, min_score } => {
            let text = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let model = latest_model(&db)?;
            let service = RecommendationService::new(&model);
            let report = homologate_batch(&service, text.lines(), min_score);

            println!("cum\tcum_homologo\tproducto_homologo\tscore");
            for entry in &report.entries {
                println!(
                    "{}\t{}\t{}\t{:.4}",
                    entry.cum,
                    entry.outcome.cum_label(),
                    entry.outcome.producto_label(),
                    entry.outcome.score()
                );
            }
        }
        Command::Bundles => {
            for bundle in db.list_model_bundles()? {
                println!(
                    "{}\t{}\tv{}\t{} valid / {} total\t{} combos",
                    bundle.model_id,
                    bundle.trained_at,
                    bundle.format_version,
                    bundle.valid_records,
                    bundle.total_records,
                    bundle.combo_clusters
                );
            }
        }
    }

    Ok(())
}

fn load_weights(path: Option<&Path>) -> Result<SimilarityWeights> {
    let Some(path) = path else {
        return Ok(SimilarityWeights::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let weights: SimilarityWeights = serde_json::from_str(&text).context("parsing weights")?;
    weights.validate()?;
    Ok(weights)
}

fn latest_model(db: &Database) -> Result<TrainedModel> {
    match db.load_latest_model_bundle()? {
        Some(model) => Ok(model),
        None => bail!("no trained model found; run `homolog train` first"),
    }
}
