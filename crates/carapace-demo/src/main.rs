use bytes::Bytes;
use carapace_core::{ClassificationResult, Error};
use carapace_classifier::ModelHandle;
use carapace_demo::cli::{Cli, Commands};
use carapace_demo::output::{self, ClassificationLine};
use carapace_demo::{DemoConfig, Session, SessionEvent};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let config = DemoConfig::load(&cli.global)?;

    if let Commands::Info { json } = cli.command {
        if json {
            println!("{}", output::model_card_json(&config.model_card)?);
        } else {
            println!("{}", config.model_card);
        }
        return Ok(());
    }

    tracing::info!(
        model = %config.classifier.model.url,
        runtime = ?config.classifier.model.runtime,
        "Starting carapace"
    );

    let session = Arc::new(Session::new(&config)?);
    let logger = tokio::spawn(log_events(session.subscribe()));

    let outcome = run(&session, cli.command).await;

    logger.abort();
    outcome
}

async fn run(session: &Session, command: Commands) -> anyhow::Result<()> {
    let handle = load_with_retries(session).await?;

    match command {
        Commands::Info { .. } => {}

        Commands::Load => {
            println!(
                "Model ready: {} ({} format, {} backend)",
                session.model_url(),
                handle.format(),
                handle.backend()
            );
        }

        Commands::Classify { images, json } => {
            for path in &images {
                let outcome = classify_file(session, path).await;
                if json {
                    println!("{}", ClassificationLine::new(path, &outcome).to_json()?);
                    continue;
                }
                match outcome {
                    Ok(result) => println!("{}", output::text_report(path, &result)),
                    Err(e) => eprintln!("{}: {}", path.display(), e),
                }
            }
            session.remove_image();
        }
    }

    Ok(())
}

/// Initial load, then retries while the session offers them
async fn load_with_retries(session: &Session) -> anyhow::Result<ModelHandle> {
    let mut result = session.load_model().await;

    while let Err(e) = &result {
        if !session.can_retry() {
            break;
        }
        tracing::warn!(
            error = %e,
            retries_remaining = session.retries_remaining(),
            "Model load failed, retrying"
        );
        result = session.retry_model().await;
    }

    Ok(result?)
}

async fn classify_file(session: &Session, path: &Path) -> carapace_core::Result<ClassificationResult> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::invalid_image(format!("not a file: {}", path.display())))?;

    let bytes = tokio::fs::read(path).await?;
    session.upload(&name, Bytes::from(bytes))?;
    session.classify().await
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::ModelProgress { progress }) => {
                tracing::info!(progress, "Loading model");
            }
            Ok(SessionEvent::ModelLoaded { format, backend }) => {
                tracing::info!(%format, %backend, "Model loaded");
            }
            Ok(SessionEvent::ModelFailed {
                message,
                retries_remaining,
                can_retry,
            }) => {
                tracing::error!(%message, retries_remaining, can_retry, "Model load failed");
            }
            Ok(event) => {
                tracing::debug!(?event, "Session event");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "carapace=debug,carapace_demo=debug,carapace_classifier=debug"
    } else {
        "carapace=info,carapace_demo=info,carapace_classifier=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
