use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use vignette_cli::{
    format_artifact_table, generation_params, init_tracing, parse_item_ref, ThumbnailKind,
};
use vignette_core::VignetteConfig;
use vignette_processing::ThumbnailServices;
use vignette_repository::{create_repository, ContentRepository};
use vignette_worker::{
    EndOfRequestScheduler, GenerationJobHandler, JobHandler, JobQueue, JobQueueConfig,
    ThumbnailCoordinator,
};

#[derive(Parser, Debug)]
#[command(name = "vignette")]
#[command(about = "Generate document and video thumbnails")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the first page of a document item into a square thumbnail
    Document {
        /// Item as [workspace:]id
        item: String,
        #[arg(long, default_value = "thumbnail")]
        name: String,
        #[arg(long, default_value_t = 150)]
        size: u32,
    },
    /// Extract a frame of a video item into a thumbnail
    Video {
        /// Item as [workspace:]id
        item: String,
        #[arg(long, default_value = "thumbnail")]
        name: String,
        /// Seconds from the start of the video
        #[arg(long, default_value_t = 1)]
        offset: i64,
        /// Bounding box as WxH
        #[arg(long, default_value = "320x240")]
        size: String,
    },
    /// Request a thumbnail as a content event would, inline or as a deferred job
    Request {
        /// Item as [workspace:]id
        item: String,
        #[arg(long, value_enum)]
        kind: ThumbnailKind,
        #[arg(long, default_value = "thumbnail")]
        name: String,
        /// Edge length for documents, WxH for videos
        #[arg(long)]
        size: Option<String>,
        #[arg(long, default_value_t = 1)]
        offset: i64,
    },
    /// Extract a frame of a local video file into an image file
    Frame {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 1)]
        offset: i64,
        #[arg(long, default_value = "320x240")]
        size: String,
    },
    /// List the thumbnails stored for an item
    List {
        /// Item as [workspace:]id
        item: String,
        /// Output format: json or table (default: table)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show which thumbnail services can run with the current configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = VignetteConfig::from_env().context("Failed to load configuration")?;
    let repository = create_repository(&config.repository).await?;
    let services = ThumbnailServices::from_config(&config, Arc::clone(&repository));

    match args.command {
        Command::Document { item, name, size } => {
            let item = resolve(&repository, &item).await?;
            let created = services
                .document
                .try_create_thumbnail(&item, &name, size)
                .await?;
            report(&repository, &item.reference, &name, created).await
        }
        Command::Video {
            item,
            name,
            offset,
            size,
        } => {
            let item = resolve(&repository, &item).await?;
            let created = services
                .video
                .try_create_thumbnail(&item, &name, offset, &size)
                .await?;
            report(&repository, &item.reference, &name, created).await
        }
        Command::Request {
            item,
            kind,
            name,
            size,
            offset,
        } => {
            let params = generation_params(kind, size.as_deref(), offset)?;
            let item = resolve(&repository, &item).await?;

            let handler: Arc<dyn JobHandler> = Arc::new(GenerationJobHandler::new(
                Arc::clone(&repository),
                services.clone(),
            ));
            let queue = JobQueue::new(
                JobQueueConfig::from(&config.queue),
                Arc::downgrade(&handler),
            );

            let scope = Arc::new(EndOfRequestScheduler::new(Arc::new(queue.clone())));
            let coordinator = ThumbnailCoordinator::new(services, scope.clone());
            let outcome = coordinator.request_thumbnail(&item, &name, params).await;
            scope.complete().await;
            queue.shutdown().await;

            let stats = queue.stats();
            println!("Request {}: {}", item.path, outcome);
            if stats.submitted > 0 {
                println!(
                    "Jobs: {} submitted, {} generated, {} skipped, {} retried, {} failed",
                    stats.submitted, stats.generated, stats.skipped, stats.retried, stats.failed
                );
            }
            Ok(())
        }
        Command::Frame {
            input,
            output,
            offset,
            size,
        } => {
            if services
                .video
                .generate_thumbnail(&input, &output, offset, &size)
                .await?
            {
                println!("Wrote {}", output.display());
                Ok(())
            } else {
                Err(anyhow!("No frame extractor available (check FFMPEG_PATH)"))
            }
        }
        Command::List { item, format } => {
            let item = parse_item_ref(&item)?;
            let artifacts = repository.list_artifacts(&item).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&artifacts)?),
                _ => print!("{}", format_artifact_table(&artifacts)),
            }
            Ok(())
        }
        Command::Status => {
            println!(
                "Repository: {:?} ({})",
                repository.backend_type(),
                config.repository.path.as_deref().unwrap_or("-")
            );
            println!(
                "Document thumbnails: {} (background job: {})",
                enabled(services.document.is_enabled()),
                services.document.use_background_job()
            );
            println!(
                "Video thumbnails: {} (background job: {})",
                enabled(services.video.is_enabled()),
                services.video.use_background_job()
            );
            Ok(())
        }
    }
}

async fn resolve(
    repository: &Arc<dyn ContentRepository>,
    arg: &str,
) -> Result<vignette_core::SourceItem> {
    let reference = parse_item_ref(arg)?;
    repository
        .resolve(&reference)
        .await
        .with_context(|| format!("Failed to resolve item {}", reference))
}

async fn report(
    repository: &Arc<dyn ContentRepository>,
    item: &vignette_core::ItemRef,
    name: &str,
    created: bool,
) -> Result<()> {
    if !created {
        println!("No thumbnail generated for {}", item);
        return Ok(());
    }

    let artifacts = repository.list_artifacts(item).await?;
    let artifacts: Vec<_> = artifacts.into_iter().filter(|a| a.name == name).collect();
    print!("{}", format_artifact_table(&artifacts));
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
