// src/bin/train.rs
//! Offline trainer CLI.
//!
//! ```text
//! cargo run --bin train -- --input data/messages.tsv --output models/scam_model.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use scam_detector::train::{accuracy, parse_corpus, train, TrainOptions};

#[derive(Debug, Parser)]
#[command(name = "train", about = "Fit the TF-IDF + logistic scam classifier")]
struct Args {
    /// JSON-lines or `label<TAB>message` corpus.
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the artifact.
    #[arg(short, long, default_value = "models/scam_model.json")]
    output: PathBuf,

    #[arg(long, default_value_t = 10_000)]
    max_features: usize,

    #[arg(long, default_value_t = 300)]
    epochs: usize,

    #[arg(long, default_value_t = 0.5)]
    learning_rate: f64,

    /// L2 regularization strength.
    #[arg(long, default_value_t = 1e-3)]
    l2: f64,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    scam_detector::init_tracing();
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading corpus {}", args.input.display()))?;
    let examples = parse_corpus(&raw)?;

    let opts = TrainOptions {
        max_features: args.max_features,
        epochs: args.epochs,
        learning_rate: args.learning_rate,
        l2: args.l2,
    };
    let model = train(&examples, &opts)?;
    let acc = accuracy(&model, &examples);

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    // write-then-rename so a running server never sees a half-written artifact
    let tmp = args.output.with_extension("json.tmp");
    std::fs::write(&tmp, model.to_json_string()?)
        .with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, &args.output)
        .with_context(|| format!("replacing {}", args.output.display()))?;

    tracing::info!(
        examples = examples.len(),
        vocabulary = model.vectorizer.len(),
        training_accuracy = acc,
        output = %args.output.display(),
        "artifact written"
    );
    Ok(())
}
