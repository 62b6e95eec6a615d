//! The YoID node orchestrator.
//!
//! Opens storage, wires the pipeline against the configured provider, runs
//! the HTTP API, and ticks each batch job on its own interval.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use yoid_core::JobConfig;
use yoid_credentials::EntityCatalog;
use yoid_pipeline::JobKind;
use yoid_provider::{HttpProvider, SsiProvider};

use crate::config::NodeConfig;
use crate::state::NodeState;
use crate::storage::{RocksRecordStore, Storage, StoredDirectory};

pub struct YoidNode {
    config: NodeConfig,
    state: Option<Arc<NodeState>>,
    api_task: Option<JoinHandle<()>>,
    job_tasks: Vec<JoinHandle<()>>,
}

impl YoidNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            state: None,
            api_task: None,
            job_tasks: Vec::new(),
        }
    }

    /// Initialize and start the node: storage, pipeline, HTTP API, job tickers.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting YoID node");

        let storage = Arc::new(Storage::open(&self.config.storage.data_dir)?);
        tracing::info!(path = %self.config.storage.data_dir.display(), "storage initialized");

        let catalog = match self.config.catalog_path {
            Some(ref path) => EntityCatalog::load(path)?,
            None => EntityCatalog::builtin()?,
        };
        tracing::info!(entities = catalog.entities().len(), "entity catalog loaded");

        let provider = HttpProvider::new(self.config.provider.clone())?;
        tracing::info!(base_url = %provider.base_url(), "provider client ready");
        let provider: Arc<dyn SsiProvider> = Arc::new(provider);

        let state = Arc::new(NodeState::new(
            self.config.pipeline.clone(),
            provider,
            Arc::new(catalog),
            Arc::new(RocksRecordStore::tenants(storage.clone())),
            Arc::new(RocksRecordStore::issuances(storage.clone())),
            Arc::new(StoredDirectory::new(storage)),
        ));

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let api_state = state.clone();
        self.api_task = Some(tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        }));

        let pipeline = &self.config.pipeline;
        self.job_tasks = vec![
            spawn_job(state.clone(), JobKind::TenantCreation, &pipeline.tenant_creation),
            spawn_job(
                state.clone(),
                JobKind::CredentialIssuance,
                &pipeline.credential_issuance,
            ),
        ];

        self.state = Some(state);
        Ok(())
    }

    /// Wait until the API server stops.
    pub async fn run(&mut self) -> Result<()> {
        let api_task = self
            .api_task
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        api_task.await?;
        Ok(())
    }

    /// Stop the job tickers. A run in progress is abandoned at its next
    /// await point; its records stay Pending and are picked up next start.
    pub async fn shutdown(&mut self) -> Result<()> {
        for task in self.job_tasks.drain(..) {
            task.abort();
        }
        if let Some(task) = self.api_task.take() {
            task.abort();
        }
        tracing::info!("YoID node stopped");
        Ok(())
    }
}

/// One ticker per job; overlapping runs queue on the scheduler lock.
fn spawn_job(state: Arc<NodeState>, job: JobKind, config: &JobConfig) -> JoinHandle<()> {
    let period = Duration::from_secs(config.interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.run_job(job).await {
                Ok(report) => tracing::info!(
                    job = %job,
                    completed = report.completed(),
                    failed = report.failed(),
                    unresolved = report.unresolved(),
                    deadline_reached = report.deadline_reached,
                    "job run finished"
                ),
                Err(e) => tracing::error!(job = %job, error = %e, "job run aborted"),
            }
        }
    })
}
