use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use survival_predictor::{config::Config, ml::run_training_job, telemetry, AppError};

#[derive(Parser)]
#[command(name = "survival-cli")]
#[command(about = "Passenger survival predictor CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model and write the artifact
    Train {
        /// CSV dataset (overrides configuration)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Artifact output path (overrides configuration)
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Seed for the train/test split
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Request a prediction from a running server
    Predict {
        /// Raw JSON payload; individual feature flags are ignored when set
        #[arg(short, long)]
        json: Option<String>,

        #[arg(long)]
        pclass: Option<u8>,

        #[arg(long)]
        sex: Option<String>,

        #[arg(long)]
        age: Option<f64>,

        #[arg(long)]
        sib_sp: Option<u32>,

        #[arg(long)]
        parch: Option<u32>,

        #[arg(long)]
        fare: Option<f64>,

        #[arg(long)]
        embarked: Option<String>,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Train {
            dataset,
            artifact,
            seed,
        } => {
            let config = Config::load().unwrap_or_else(|e| {
                eprintln!("Warning: failed to load configuration ({}), using defaults", e);
                Config::default()
            });
            telemetry::init_tracing(&config.observability);

            let mut training = config.training.clone();
            if let Some(dataset) = dataset {
                training.dataset_path = dataset;
            }
            if let Some(seed) = seed {
                training.seed = seed;
            }
            let artifact_path = artifact.unwrap_or_else(|| config.model.artifact_path.clone());

            let outcome = match run_training_job(&training, &artifact_path) {
                Ok(outcome) => outcome,
                Err(AppError::DatasetNotFound(path)) => {
                    eprintln!("Error: dataset '{}' not found", path.display());
                    eprintln!("Pass --dataset or set SURVIVAL__TRAINING__DATASET_PATH");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };

            println!(
                "Trained on {} rows, evaluated on {} rows",
                outcome.n_train, outcome.n_test
            );
            println!();
            print!("{}", outcome.test_metrics);
            println!();
            println!("Model saved to: {}", artifact_path.display());
        }

        Commands::Predict {
            json,
            pclass,
            sex,
            age,
            sib_sp,
            parch,
            fare,
            embarked,
        } => {
            let payload: Value = match json {
                Some(raw) => serde_json::from_str(&raw).context("--json is not valid JSON")?,
                None => {
                    let mut fields = Map::new();
                    let mut put = |key: &str, value: Value| {
                        if !value.is_null() {
                            fields.insert(key.to_string(), value);
                        }
                    };
                    put("Pclass", json!(pclass));
                    put("Sex", json!(sex));
                    put("Age", json!(age));
                    put("SibSp", json!(sib_sp));
                    put("Parch", json!(parch));
                    put("Fare", json!(fare));
                    put("Embarked", json!(embarked));
                    Value::Object(fields)
                }
            };

            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .json(&payload)
                .send()
                .await
                .with_context(|| format!("failed to reach {}", cli.endpoint))?;

            let status = response.status();
            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !status.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await
                .with_context(|| format!("failed to reach {}", cli.endpoint))?;

            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
