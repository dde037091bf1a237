// src/bin/detect.rs
//! Classify a single message or file from the command line and print the JSON result.

use std::path::PathBuf;

use clap::Parser;
use scam_detector::config::{ocr::OcrConfig, ServerConfig};
use scam_detector::RawInput;

#[derive(Debug, Parser)]
#[command(name = "detect", about = "Classify a message or document as scam or real")]
struct Args {
    /// Message text to classify.
    #[arg(short, long, conflicts_with = "file")]
    message: Option<String>,

    /// Document to classify (pdf, docx, txt, or an image).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Override the model artifact path.
    #[arg(long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    scam_detector::init_tracing();
    let args = Args::parse();

    let mut server = ServerConfig::from_env()?;
    if let Some(m) = args.model {
        server.model_path = m;
    }
    let state = scam_detector::build_state(&server, &OcrConfig::from_env()?)?;

    let input = match (args.message, args.file) {
        (Some(m), _) => RawInput::Message(m),
        (None, Some(path)) => {
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();
            RawInput::Document {
                bytes: std::fs::read(&path)?,
                format,
            }
        }
        (None, None) => anyhow::bail!("pass --message or --file"),
    };

    let result = state.pipeline.classify(&input).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
