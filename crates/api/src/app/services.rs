//! Pipeline wiring shared by the HTTP handlers and the worker pool.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use folio_ai::{ContentGenerator, HttpContentGenerator, HttpGeneratorConfig, UnavailableGenerator};
use folio_infra::PipelineConfig;
use folio_infra::external::{HttpProviderClient, ProviderEndpoints, TracingMailer};
use folio_infra::jobs::{InMemoryJobQueue, JobQueue, WorkerConfig, WorkerPool};
use folio_infra::pipeline::{JobProducer, PipelineDeps, Records, StatusReader, register_handlers};

pub struct AppServices {
    pub config: Arc<PipelineConfig>,
    pub deps: PipelineDeps,
    pub queue: Arc<dyn JobQueue>,
    pub producer: JobProducer,
    pub reader: StatusReader,
}

impl AppServices {
    pub fn new(deps: PipelineDeps, queue: Arc<dyn JobQueue>) -> Self {
        let producer = JobProducer::new(
            deps.records.clone(),
            queue.clone(),
            deps.config.retry.clone(),
        );
        let reader = StatusReader::new(deps.records.clone());
        Self {
            config: deps.config.clone(),
            deps,
            queue,
            producer,
            reader,
        }
    }

    /// Worker pool with a handler for every topic, on the same queue and
    /// stores as the HTTP handlers.
    pub fn worker_pool(&self) -> WorkerPool {
        let mut pool = WorkerPool::new(self.queue.clone()).with_lease(self.config.visibility_timeout);
        register_handlers(&mut pool, &self.deps);
        pool
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_poll_interval(self.config.poll_interval)
            .with_max_concurrent(self.config.max_concurrent)
    }
}

/// Build every collaborator from `config`.
pub async fn build_services(config: PipelineConfig) -> anyhow::Result<AppServices> {
    let generator: Arc<dyn ContentGenerator> = match &config.ai {
        Some(ai) => {
            let mut http = HttpGeneratorConfig::new(ai.endpoint.clone(), ai.api_key.clone());
            if let Some(model) = &ai.model {
                http = http.with_model(model.clone());
            }
            let generator = HttpContentGenerator::new(http).context("building the AI client")?;
            info!(endpoint = %ai.endpoint, model = generator.model(), "AI generator configured");
            Arc::new(generator)
        }
        None => {
            warn!("no AI endpoint configured; handlers will use fallback content");
            Arc::new(UnavailableGenerator)
        }
    };

    let providers = HttpProviderClient::new(ProviderEndpoints::default(), config.provider_timeout)
        .context("building the provider client")?;
    let queue = build_queue(&config).await?;

    let deps = PipelineDeps {
        records: Records::in_memory(),
        generator,
        providers: Arc::new(providers),
        mailer: Arc::new(TracingMailer),
        config: Arc::new(config),
    };
    Ok(AppServices::new(deps, queue))
}

#[cfg(feature = "postgres")]
async fn build_queue(config: &PipelineConfig) -> anyhow::Result<Arc<dyn JobQueue>> {
    if let Some(url) = &config.database_url {
        let queue = folio_infra::jobs::PostgresJobQueue::connect(url)
            .await
            .context("connecting to the job database")?;
        queue.ensure_schema().await.context("creating job tables")?;
        info!("using the postgres job queue");
        return Ok(Arc::new(queue));
    }
    Ok(Arc::new(InMemoryJobQueue::new()))
}

#[cfg(not(feature = "postgres"))]
async fn build_queue(config: &PipelineConfig) -> anyhow::Result<Arc<dyn JobQueue>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but the postgres feature is off; using the in-memory queue");
    }
    Ok(Arc::new(InMemoryJobQueue::new()))
}
