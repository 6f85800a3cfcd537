use std::sync::Arc;
use std::time::Duration;

use hammer_api::Disruptor;
use hammer_engine::{CommandDisruptor, FailoverScenario};
use hammer_store_memory::Availability;

use crate::cmd::open_factory;
use crate::config::{EffectiveFailover, FailoverArgs, load_file};
use crate::error::CliError;

pub async fn run(config_path: Option<&str>, args: &FailoverArgs) -> Result<(), CliError> {
    let file = load_file(config_path)?;
    let eff = EffectiveFailover::new(args, &file)?;
    let (factory, memory) = open_factory(eff.store, &eff.connect)?;

    let disruptor: Arc<dyn Disruptor> = match (eff.disrupt_command, memory) {
        (Some(argv), _) => Arc::new(CommandDisruptor::new(argv)?),
        // Dry run: the node drops out and a replacement is up immediately.
        (None, Some(mem)) => Arc::new(mem.disruptor(Availability::Down, Some(Duration::ZERO))),
        (None, None) => {
            return Err(CliError::Config(
                "failover against postgres needs --disrupt-cmd or [failover] disrupt_command".into(),
            ));
        }
    };

    let report = FailoverScenario::new(factory, disruptor, eff.scenario).run().await?;
    tracing::info!(
        seeded = report.seeded.len(),
        after = report.after.len(),
        disruption_ms = report.disruption_latency.as_millis() as u64,
        probe_ms = report.probe_latency.as_millis() as u64,
        "failover scenario complete"
    );
    Ok(())
}
