mod cli;
mod ui;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, content_type_for};
use mirrorworld::AvatarClient;
use mirrorworld::config::MirrorConfig;
use mirrorworld::pipeline::{JobOrchestrator, PipelineStage};
use mirrorworld::scene::{LogRenderer, SceneHandoff};
use ui::JobProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = MirrorConfig::load()?;
    cli.apply_overrides(&mut config);

    match &cli.command {
        Command::Generate { photo } => generate(&config, photo).await,
        Command::Health => health(&config).await,
        Command::Stages => {
            for stage in PipelineStage::ALL {
                println!("{:>2}  {:<16} {}", stage.position(), stage, stage.description());
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "mirrorworld=debug,info"
    } else {
        "mirrorworld=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn generate(config: &MirrorConfig, photo: &Path) -> Result<()> {
    let content_type = content_type_for(photo)
        .with_context(|| format!("unsupported photo format: {}", photo.display()))?;
    let image =
        std::fs::read(photo).with_context(|| format!("failed to read {}", photo.display()))?;

    let client = AvatarClient::from_config(config)?;
    let mut orchestrator = JobOrchestrator::new(&client, config.poll_config());
    let mut states = orchestrator.subscribe();

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let progress = JobProgress::start(&photo.display().to_string());
    let watch = async {
        while let Some(state) = states.recv().await {
            progress.update(&state);
        }
    };
    let (report, ()) = tokio::join!(orchestrator.run(&image, content_type), watch);

    let result = report.clone().into_result();
    progress.complete(&result);
    progress.print_report(&report);

    let assets = result?;
    let (renderer, mut events) = LogRenderer::new();
    let mut handoff = SceneHandoff::new(renderer, &config.environment);
    handoff.present(&assets);
    while let Ok(event) = events.try_recv() {
        debug!(?event, "scene event");
    }
    Ok(())
}

async fn health(config: &MirrorConfig) -> Result<()> {
    let client = AvatarClient::from_config(config)?;
    let status = client.health().await?;
    if !status.is_healthy() {
        bail!("{} reported status `{}`", config.base_url, status.status);
    }
    println!("{} is healthy ({})", status.service, config.base_url);
    Ok(())
}
