//! rwhazard - two readers and two writers racing over two resources

use std::sync::Arc;

use clap::Parser;
use rwhazard::{Config, EventSink, ResourceLock, Role, TracingSink, Worker};
use tracing::info;

#[derive(Parser)]
#[command(name = "rwhazard")]
#[command(author, version, about = "Provoke lock-ordering hazards in two-phase locking", long_about = None)]
struct Cli {
    /// Give every worker the same lock order (no hazard)
    #[arg(long)]
    matched: bool,

    /// Operations per worker
    #[arg(long)]
    operations: Option<usize>,

    /// Average idle time between operations, in milliseconds
    #[arg(long)]
    sleep_ms: Option<u64>,

    /// Upper bound of each condition wait, in nanoseconds
    #[arg(long)]
    wait_nanos: Option<u64>,

    /// Initial backoff after a second-lock failure, in milliseconds
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Number of integers guarded by each resource
    #[arg(long)]
    payload_len: Option<usize>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(v) = self.operations {
            config.operation_count = v;
        }
        if let Some(v) = self.sleep_ms {
            config.average_sleep = std::time::Duration::from_millis(v);
        }
        if let Some(v) = self.wait_nanos {
            config.wait_time_unit = std::time::Duration::from_nanos(v);
        }
        if let Some(v) = self.backoff_ms {
            config.backoff_unit = std::time::Duration::from_millis(v);
        }
        if let Some(v) = self.payload_len {
            config.payload_len = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("rwhazard=debug".parse()?),
        )
        .with_thread_names(true)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let var = Arc::new(ResourceLock::from_config(&config));
    let var2 = Arc::new(ResourceLock::from_config(&config));

    // the second worker of each role takes the pair in reverse unless --matched
    let (first2, second2) = if cli.matched {
        (var.clone(), var2.clone())
    } else {
        (var2.clone(), var.clone())
    };

    let reader1 = Worker::new(Role::Reader, var.clone(), var2.clone(), 1);
    let reader2 = Worker::new(Role::Reader, first2.clone(), second2.clone(), 2);
    let writer1 = Worker::new(Role::Writer, var.clone(), var2.clone(), 1);
    let writer2 = Worker::new(Role::Writer, first2, second2, 2);

    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);
    let handles = [reader2, writer1, reader1, writer2]
        .into_iter()
        .map(|w| rwhazard::spawn(w.with_config(config.clone()), sink.clone()))
        .collect::<rwhazard::Result<Vec<_>>>()?;

    for handle in handles {
        info!(worker = handle.label(), "waiting for worker");
        let report = handle.join()?;
        info!(
            worker = %report.label,
            operations = report.operations,
            first_failures = report.stats.first_failures,
            backoffs = report.stats.second_failures,
            "finished"
        );
    }

    info!("{}", var.describe());
    info!("{}", var2.describe());
    Ok(())
}
