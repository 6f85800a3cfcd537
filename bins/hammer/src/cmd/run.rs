use tokio_util::sync::CancellationToken;

use hammer_engine::Harness;

use crate::cmd::open_factory;
use crate::config::{EffectiveRun, RunArgs, load_file};
use crate::error::CliError;

pub async fn run(config_path: Option<&str>, args: &RunArgs) -> Result<(), CliError> {
    let file = load_file(config_path)?;
    let eff = EffectiveRun::new(args, &file)?;
    let (factory, _) = open_factory(eff.store, &eff.run.connect)?;

    tracing::info!(
        store = %factory.describe(),
        writers = eff.run.writers,
        readers = eff.run.readers,
        duration_s = eff.run.duration.as_secs(),
        "hammer starting"
    );

    let token = CancellationToken::new();
    let interrupt = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => {
                        tracing::info!("interrupt received, stopping...");
                        token.cancel();
                    }
                    Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
                },
                _ = token.cancelled() => {}
            }
        })
    };

    let result = Harness::new(eff.run, factory, token.clone()).run().await;
    token.cancel();
    let _ = interrupt.await;
    let summary = result?;

    tracing::info!(
        reason = ?summary.reason,
        elapsed_s = summary.elapsed.as_secs_f64(),
        writes = summary.writes,
        reads = summary.reads,
        errors = summary.error_total,
        "hammer finished"
    );
    if summary.tasks_aborted > 0 {
        tracing::warn!(aborted = summary.tasks_aborted, "some tasks had to be aborted");
    }
    Ok(())
}
