//! Demo binary: match one reference selfie against a directory of photos.
//!
//! Usage: `facematch <reference-image> <photos-dir> [config.yaml]`
//!
//! Candidate photos are the image files directly inside `photos-dir`, taken
//! in lexical filename order. The config's `source` section decides where
//! their bytes load from: `kind: file` reads the configured root (the
//! photos directory when no config file is given), `kind: http` fetches
//! each file name relative to `base_url`. The run can be interrupted with
//! Ctrl+C, which cancels in-flight work instead of killing the process
//! mid-write.

use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use facematch::{
    Candidate, CancelToken, FacematchConfig, HashExtractor, MatchError, MatchPipeline,
    source_from_config,
};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("facematch=info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (reference_path, photos_dir, config_path) = match args.as_slice() {
        [reference, photos] => (reference.clone(), photos.clone(), None),
        [reference, photos, config] => (reference.clone(), photos.clone(), Some(config.clone())),
        _ => {
            eprintln!("usage: facematch <reference-image> <photos-dir> [config.yaml]");
            return ExitCode::FAILURE;
        }
    };

    match run(&reference_path, &photos_dir, config_path.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "matching failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    reference_path: &str,
    photos_dir: &str,
    config_path: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let config = match config_path {
        Some(path) => FacematchConfig::from_file(path)?,
        None => {
            let mut config = FacematchConfig::default();
            // Without a config file the photos directory is the source root.
            config.source.root = Some(photos_dir.to_string());
            config
        }
    };

    let reference = tokio::fs::read(reference_path).await?;
    let candidates = list_candidates(photos_dir).await?;
    if candidates.is_empty() {
        tracing::warn!(dir = photos_dir, "no candidate images found");
    }

    let extractor = Arc::new(HashExtractor::from_config(&config.extractor));
    let source = source_from_config(&config.source)?;
    tracing::info!(kind = %config.source.kind, "image source configured");
    let pipeline = MatchPipeline::new(extractor, source, config.matcher.clone())?;

    let cancel = CancelToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        watcher.cancel();
    });

    let report = match pipeline
        .run_with_cancel(&reference, candidates, &cancel)
        .await
    {
        Ok(report) => report,
        Err(MatchError::Cancelled) => {
            tracing::info!("run cancelled, no report produced");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("{}", serde_json::to_string_pretty(&report.outcomes)?);
    tracing::info!(
        candidates = report.len(),
        matched = report.matched_count(),
        no_face = report.no_face_count(),
        failed = report.failed_count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "done"
    );
    Ok(())
}

/// List image files directly inside `dir`, in lexical filename order.
async fn list_candidates(dir: &str) -> Result<Vec<Candidate>, Box<dyn Error>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if has_image_extension(name) {
            names.push(name.to_string());
        }
    }
    names.sort();

    // The full file name doubles as the id: stems collide across extensions
    // (`a.jpg` / `a.png`) and ids must be unique within a batch.
    Ok(names
        .into_iter()
        .map(|name| Candidate::new(name.clone(), name))
        .collect())
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, cancelling run"),
        _ = terminate => tracing::info!("received SIGTERM, cancelling run"),
    }
}
