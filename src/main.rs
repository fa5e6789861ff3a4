use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lessonforge::anthropic::{AnthropicClient, AnthropicGenerator};
use lessonforge::cache::MemoryContentCache;
use lessonforge::cli::{Cli, Command};
use lessonforge::config::ForgeConfig;
use lessonforge::generation::RateLimitedGenerator;
use lessonforge::manager::JobManager;
use lessonforge::orchestrator::GenerationOrchestrator;
use lessonforge::prompt::BuiltinPrompts;
use lessonforge::queue::{MemoryWorkQueue, WorkItem, WorkQueue};
use lessonforge::server::{self, AppState};
use lessonforge::state_machine::JobRequest;
use lessonforge::store::{JobStore, JsonFileJobStore};
use lessonforge::ui::{self, JobProgress};
use lessonforge::worker::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ForgeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind, workers } => serve(config, bind, workers).await,
        Command::Run {
            topic,
            audience,
            content_types,
        } => {
            run(
                config,
                JobRequest {
                    topic,
                    audience,
                    content_types,
                },
            )
            .await
        }
        Command::Status { job_id } => status(config, &job_id).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "lessonforge=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct Pipeline {
    store: Arc<JsonFileJobStore>,
    queue: Arc<MemoryWorkQueue>,
    orchestrator: GenerationOrchestrator,
}

async fn build_pipeline(config: &ForgeConfig) -> Result<Pipeline> {
    if config.api_key.is_empty() {
        bail!("no API key: set ANTHROPIC_API_KEY or api_key in lessonforge.toml");
    }

    let client = AnthropicClient::new(config.api_key.clone(), config.request_timeout())?;
    let generator = RateLimitedGenerator::new(
        Arc::new(AnthropicGenerator::new(client, config.model.clone())),
        config.pipeline.global_generation_limit,
    );

    let store = Arc::new(
        JsonFileJobStore::open(&config.data_dir)
            .await
            .with_context(|| format!("opening job store at {}", config.data_dir.display()))?,
    );
    let queue = Arc::new(MemoryWorkQueue::new(config.visibility_timeout()));
    let manager = JobManager::new(store.clone(), queue.clone(), config.quality_gate());

    let orchestrator = GenerationOrchestrator::new(
        Arc::new(generator),
        Arc::new(BuiltinPrompts),
        Arc::new(config.assessor()),
        Arc::new(MemoryContentCache::new()),
        manager,
        config.pipeline_settings(),
    );

    Ok(Pipeline {
        store,
        queue,
        orchestrator,
    })
}

async fn serve(config: ForgeConfig, bind: Option<String>, workers: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(&config).await?;

    let requeued = pipeline.store.unsettled().await?;
    for job_id in &requeued {
        pipeline
            .queue
            .enqueue(WorkItem {
                job_id: job_id.clone(),
            })
            .await?;
    }
    if !requeued.is_empty() {
        info!(count = requeued.len(), "requeued unsettled jobs from a previous run");
    }

    let pool = WorkerPool::spawn(
        workers.unwrap_or(config.pipeline.workers),
        pipeline.queue.clone(),
        pipeline.orchestrator.clone(),
    );

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(address = %bind, workers = pool.size(), "lessonforge listening");

    let app = server::router(AppState {
        manager: pipeline.orchestrator.manager().clone(),
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "could not listen for ctrl-c");
            }
            info!("shutdown requested");
        })
        .await?;

    pipeline.queue.close().await;
    pool.shutdown().await;
    Ok(())
}

async fn run(config: ForgeConfig, request: JobRequest) -> Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let manager = pipeline.orchestrator.manager().clone();

    let job_id = manager.create_job(&request).await?;
    let delivery = pipeline.queue.dequeue().await?;

    let progress = JobProgress::start(&request.topic);
    let orchestrator = pipeline.orchestrator.clone();
    let worker_job_id = job_id.clone();
    let mut processing =
        tokio::spawn(async move { orchestrator.process(&worker_job_id, "cli").await });

    let outcome = loop {
        tokio::select! {
            joined = &mut processing => break joined?,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if let Some(job) = pipeline.store.get(&job_id).await? {
                    progress.update(&job);
                }
            }
        }
    };
    outcome?;
    pipeline.queue.ack(&delivery).await?;

    let view = manager.get_job(&job_id).await?.view();
    progress.complete(&view);
    progress.print_view(&view);
    Ok(())
}

async fn status(config: ForgeConfig, job_id: &str) -> Result<()> {
    let store = JsonFileJobStore::open(&config.data_dir).await?;
    match store.get(job_id).await? {
        Some(job) => {
            ui::print_view(&job.view());
            Ok(())
        }
        None => bail!("job not found: {job_id}"),
    }
}
