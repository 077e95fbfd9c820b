pub mod cache;
pub mod cancel;
pub mod codec;
pub mod commands;
pub mod config;
pub mod db;
pub mod device;
pub mod error;
pub mod logging;
pub mod models;
pub mod ocr;
pub mod services;
pub mod types;

pub use cache::{CacheStore, MemoryCache};
pub use cancel::CancelToken;
pub use config::AppConfig;
pub use db::Db;
pub use error::{Result, ScanError};
pub use ocr::{Endpoints, HttpRemoteClient, RemoteClient};
pub use services::capture::{CaptureOutcome, CaptureSession, CaptureState};
pub use services::gallery_sync::{GallerySynchronizer, GalleryView, SyncState};
pub use types::{
    Confidence, GallerySnapshot, ImageRecord, Language, RawImage, RecognitionRequest,
    RecognitionResult,
};

use clap::{Parser, Subcommand};
use commands::AppState;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(
    name = "cross-label",
    version,
    about = "Capture product labels, recognize their text and browse the label gallery"
)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send an image to the recognition service and print the extracted text
    Recognize {
        image: PathBuf,
        /// Recognition language (en, pt, es)
        #[arg(long)]
        lang: Option<Language>,
        /// Minimum confidence, 0 < c <= 1 (or low, medium, high)
        #[arg(long)]
        confidence: Option<Confidence>,
        /// Keep a copy of the image in this album directory (default album if no value)
        #[arg(long, num_args = 0..=1, value_name = "DIR")]
        save_to: Option<Option<PathBuf>>,
        /// Write the annotated image here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the gallery: cached first, then refreshed from the server
    Gallery,
    /// Upload an image to the gallery server
    Upload { image: PathBuf },
    /// Drop the local gallery cache
    ClearCache,
    /// List clients, their models and the labels to check
    Catalog { client: Option<String> },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Could not start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command) -> Result<()> {
    if let Command::Catalog { client } = &command {
        return print_json(&commands::list_catalog(client.as_deref())?);
    }

    let state = AppState::new(AppConfig::load()?)?;
    let outcome = match command {
        Command::Recognize {
            image,
            lang,
            confidence,
            save_to,
            out,
        } => {
            let report = state
                .recognize_file(&image, lang, confidence, save_to, out)
                .await?;
            print_json(&report)
        }
        Command::Gallery => {
            let mut printed = Ok(());
            let listing = state
                .show_gallery(|cached| printed = print_json(cached))
                .await?;
            printed.and_then(|_| print_json(&listing))
        }
        Command::Upload { image } => {
            let entry = state.upload_file(&image).await?;
            print_json(&entry)
        }
        Command::ClearCache => state.clear_cache().await,
        Command::Catalog { .. } => Ok(()),
    };
    state.gallery.shutdown();
    outcome
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ScanError::Storage(format!("Could not format output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
