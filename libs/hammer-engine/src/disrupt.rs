use tokio::process::Command;

use hammer_api::{BoxFuture, DisruptError, Disruptor};

use crate::error::EngineError;

/// Runs an external program that removes or restarts the primary node,
/// e.g. `kubectl delete pod postgres-0`.
///
/// The command's own completion is all that is awaited; whether the cluster
/// has finished failing over by then is not known.
#[derive(Debug, Clone)]
pub struct CommandDisruptor {
    argv: Vec<String>,
}

impl CommandDisruptor {
    pub fn new(argv: Vec<String>) -> Result<Self, EngineError> {
        if argv.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(EngineError::Config("disrupt command must name a program".into()));
        }
        Ok(Self { argv })
    }
}

impl Disruptor for CommandDisruptor {
    fn disrupt(&self) -> BoxFuture<'_, Result<(), DisruptError>> {
        Box::pin(async move {
            let target = self.describe();
            let (program, args) = match self.argv.split_first() {
                Some(split) => split,
                None => return Err(DisruptError::new(target, "empty command")),
            };

            tracing::info!(command = %target, "running disruption");
            let output = Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| DisruptError::new(&target, e.to_string()))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(DisruptError::new(
                    target,
                    format!("{}: {}", output.status, stderr.trim()),
                ));
            }
            tracing::debug!(command = %target, "disruption command finished");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        self.argv.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(CommandDisruptor::new(vec![]), Err(EngineError::Config(_))));
        assert!(CommandDisruptor::new(argv(&[" "])).is_err());
    }

    #[tokio::test]
    async fn successful_command() {
        let d = CommandDisruptor::new(argv(&["true"])).unwrap();
        d.disrupt().await.unwrap();
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let d = CommandDisruptor::new(argv(&["sh", "-c", "echo boom >&2; exit 3"])).unwrap();
        let err = d.disrupt().await.unwrap_err();
        assert_eq!(err.target, "sh -c echo boom >&2; exit 3");
        assert!(err.detail.contains("boom"), "{}", err.detail);
    }

    #[tokio::test]
    async fn missing_program() {
        let d = CommandDisruptor::new(argv(&["/nonexistent/hammer-disrupt"])).unwrap();
        assert!(d.disrupt().await.is_err());
    }
}
