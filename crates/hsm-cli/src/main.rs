mod callbacks;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hsm_core::app::{Executor, WorkerGroup};
use hsm_core::config::RuntimeConfig;
use hsm_core::domain::WorkflowKey;
use hsm_core::impls::{InMemoryDeliveryQueue, InMemoryTaskStore};
use hsm_core::ports::{DeliveryQueue, IdGenerator, SystemClock, UlidGenerator};
use hsm_core::typed::{HandlerSet, RegistryBuilder};

use callbacks::{
    BackoffHandler, BackoffTask, CallbackMachine, InvocationHandler, InvocationTask,
    RefreshHandler, RefreshTask,
};

/// Drive a callback machine through a few transitions and execute its tasks.
#[derive(Debug, Parser)]
#[command(name = "hsm", version)]
struct Args {
    /// JSON runtime config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Callback destination.
    #[arg(long, default_value = "my-endpoint")]
    destination: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_json_file(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;

    // (A) startup: registry and handlers are built once, then shared
    let registry = Arc::new(
        RegistryBuilder::new()
            .register::<InvocationTask>()?
            .register::<BackoffTask>()?
            .register::<RefreshTask>()?
            .expect_types(&config.expected_task_types)
            .build()?,
    );
    let mut handlers = HandlerSet::new();
    handlers.register::<InvocationTask, _>(InvocationHandler)?;
    handlers.register::<BackoffTask, _>(BackoffHandler)?;
    handlers.register::<RefreshTask, _>(RefreshHandler)?;

    let store = Arc::new(InMemoryTaskStore::new());
    let queue = Arc::new(InMemoryDeliveryQueue::new());
    let executor = Arc::new(Executor::new(registry.clone(), Arc::new(handlers), store.clone()));
    let ids = UlidGenerator::new(SystemClock);

    // (B) three transitions committed before any delivery: only the tasks of
    // the last one (and the concurrent refreshes) should run
    let key = WorkflowKey::new("default", "wf1", ids.generate_run_id());
    let mut machine = CallbackMachine::new("wf1/callback-1".parse()?, &args.destination);
    store.commit(&registry, &machine, &key, &ids)?;
    machine.attempt_failed();
    store.commit(&registry, &machine, &key, &ids)?;
    machine.rescheduled();
    store.commit(&registry, &machine, &key, &ids)?;

    let outbox = store.take_outbox();
    let expected = outbox.len() as u64;
    for envelope in outbox {
        queue.push(envelope).await.context("deliver task")?;
    }
    info!(tasks = expected, "delivered outbox");

    // (C) execute
    let group = WorkerGroup::spawn(queue.clone(), executor, &config);
    let stats = group.stats();
    while stats.snapshot().total() < expected {
        sleep(Duration::from_millis(20)).await;
    }
    group.shutdown_and_join().await;

    println!("{}", serde_json::to_string_pretty(&stats.snapshot())?);
    Ok(())
}
