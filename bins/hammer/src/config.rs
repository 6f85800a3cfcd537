use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use hammer_api::config::DEFAULT_POOL_SIZE;
use hammer_api::{ConnectConfig, Credentials};
use hammer_engine::config::{FileConfig, TargetSection};
use hammer_engine::{FailoverConfig, RunConfig, WorkloadConfig};

use crate::error::CliError;

/// Config file looked up when `--config` is not given. May be absent.
const DEFAULT_CONFIG_PATH: &str = "hammer.toml";

#[derive(Parser)]
#[command(name = "hammer", about = "Concurrent database load and failover exerciser")]
pub struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, env = "HAMMER_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hammer the store with concurrent writers and readers.
    Run(RunArgs),
    /// Seed a table, disrupt the primary and probe one write.
    Failover(FailoverArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Postgres,
    /// In-process store, for dry runs.
    Memory,
}

impl StoreKind {
    fn parse(s: &str) -> Result<Self, CliError> {
        match s {
            "postgres" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(CliError::Config(format!(
                "unknown store '{other}' (expected postgres or memory)"
            ))),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct TargetArgs {
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, env = "HAMMER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long)]
    pub database: Option<String>,

    /// Use a connection pool instead of one connection per operation.
    #[arg(long)]
    pub pooled: bool,

    /// Pool capacity. Implies `--pooled`.
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Connect timeout in seconds.
    #[arg(long)]
    pub connect_timeout: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Run duration in seconds.
    #[arg(long)]
    pub duration: Option<u64>,

    #[arg(long)]
    pub writers: Option<usize>,

    #[arg(long)]
    pub readers: Option<usize>,

    /// Seconds between monitor reports.
    #[arg(long)]
    pub sample_interval: Option<u64>,
}

#[derive(Args, Clone, Debug)]
pub struct FailoverArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Command that kills the primary, e.g. `kubectl delete pod postgres-0`.
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub disrupt_cmd: Option<Vec<String>>,

    /// Do not empty `users` before seeding.
    #[arg(long)]
    pub keep_users: bool,
}

/// Read the config file. Only an explicitly named file has to exist.
pub fn load_file(path: Option<&str>) -> Result<FileConfig, CliError> {
    match path {
        Some(p) => Ok(FileConfig::load(p)?),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Ok(FileConfig::load(DEFAULT_CONFIG_PATH)?)
        }
        None => Ok(FileConfig::default()),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective config (defaults < hammer.toml < env/CLI)
// ═══════════════════════════════════════════════════════════════

/// `None` selects simple mode. A size on either layer, or `pooled` without a
/// size, selects pooled mode.
fn pool_size(args: &TargetArgs, file: &TargetSection) -> Option<usize> {
    let size = args.pool_size.or(file.pool_size);
    let pooled = args.pooled || file.pooled.unwrap_or(false);
    match size {
        Some(n) => Some(n),
        None if pooled => Some(DEFAULT_POOL_SIZE),
        None => None,
    }
}

pub struct EffectiveTarget {
    pub store: StoreKind,
    pub connect: ConnectConfig,
}

impl EffectiveTarget {
    pub fn new(args: &TargetArgs, file: &TargetSection) -> Result<Self, CliError> {
        let store = match (args.store, file.store.as_deref()) {
            (Some(kind), _) => kind,
            (None, Some(s)) => StoreKind::parse(s)?,
            (None, None) => StoreKind::Postgres,
        };

        let defaults = ConnectConfig::default();
        let connect = ConnectConfig {
            host: args.host.clone().or(file.host.clone()).unwrap_or(defaults.host),
            port: args.port.or(file.port).unwrap_or(defaults.port),
            credentials: Credentials {
                user: args
                    .user
                    .clone()
                    .or(file.user.clone())
                    .unwrap_or(defaults.credentials.user),
                password: args
                    .password
                    .clone()
                    .or(file.password.clone())
                    .unwrap_or(defaults.credentials.password),
            },
            database: args
                .database
                .clone()
                .or(file.database.clone())
                .unwrap_or(defaults.database),
            pool_size: pool_size(args, file),
            connect_timeout: args
                .connect_timeout
                .or(file.connect_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        };

        Ok(Self { store, connect })
    }
}

pub struct EffectiveRun {
    pub store: StoreKind,
    pub run: RunConfig,
}

impl EffectiveRun {
    pub fn new(args: &RunArgs, file: &FileConfig) -> Result<Self, CliError> {
        let target = EffectiveTarget::new(&args.target, &file.target)?;
        let defaults = RunConfig::default();
        let secs = |cli: Option<u64>, toml: Option<u64>, default: Duration| {
            cli.or(toml).map(Duration::from_secs).unwrap_or(default)
        };

        let run = RunConfig {
            connect: target.connect,
            writers: args.writers.or(file.run.writers).unwrap_or(defaults.writers),
            readers: args.readers.or(file.run.readers).unwrap_or(defaults.readers),
            sample_interval: secs(
                args.sample_interval,
                file.run.sample_interval_secs,
                defaults.sample_interval,
            ),
            duration: secs(args.duration, file.run.duration_secs, defaults.duration),
            workload: WorkloadConfig::default().merged(&file.workload),
            error_log_capacity: file
                .run
                .error_log_capacity
                .unwrap_or(defaults.error_log_capacity),
            shutdown_grace: secs(None, file.run.shutdown_grace_secs, defaults.shutdown_grace),
        };
        run.validate()?;

        Ok(Self { store: target.store, run })
    }
}

pub struct EffectiveFailover {
    pub store: StoreKind,
    pub connect: ConnectConfig,
    pub scenario: FailoverConfig,
    pub disrupt_command: Option<Vec<String>>,
}

impl EffectiveFailover {
    pub fn new(args: &FailoverArgs, file: &FileConfig) -> Result<Self, CliError> {
        let target = EffectiveTarget::new(&args.target, &file.target)?;
        if target.connect.pool_size == Some(0) {
            return Err(CliError::Config("pool size must be positive".into()));
        }
        let reset_users = if args.keep_users {
            false
        } else {
            file.failover
                .reset_users
                .unwrap_or(FailoverConfig::default().reset_users)
        };

        Ok(Self {
            store: target.store,
            connect: target.connect,
            scenario: FailoverConfig { reset_users },
            disrupt_command: args
                .disrupt_cmd
                .clone()
                .or(file.failover.disrupt_command.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn run_defaults() {
        let cli = parse(&["hammer", "run"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        let eff = EffectiveRun::new(&args, &FileConfig::default()).unwrap();

        assert_eq!(eff.store, StoreKind::Postgres);
        assert_eq!(eff.run.connect.target(), "localhost:5432/dev_db");
        assert_eq!(eff.run.duration, Duration::from_secs(300));
        assert_eq!((eff.run.writers, eff.run.readers), (3, 3));
        assert!(!eff.run.connect.is_pooled());
    }

    #[test]
    fn cli_overrides_file() {
        let file = FileConfig::parse(
            r#"
            [target]
            host = "from-file"
            port = 6543
            store = "memory"

            [run]
            writers = 10
            readers = 1
            "#,
        )
        .unwrap();
        let cli = parse(&["hammer", "run", "--host", "from-cli", "--writers", "2", "--pool-size", "4"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        let eff = EffectiveRun::new(&args, &file).unwrap();

        assert_eq!(eff.store, StoreKind::Memory);
        assert_eq!(eff.run.connect.host, "from-cli");
        assert_eq!(eff.run.connect.port, 6543);
        assert_eq!(eff.run.writers, 2);
        assert_eq!(eff.run.readers, 1);
        assert_eq!(eff.run.connect.pool_size, Some(4));
    }

    #[test]
    fn pooled_without_size_uses_default_capacity() {
        let cli = parse(&["hammer", "run", "--pooled"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        let eff = EffectiveRun::new(&args, &FileConfig::default()).unwrap();
        assert_eq!(eff.run.connect.pool_size, Some(5));
        assert!(eff.run.connect.is_pooled());

        let file = FileConfig::parse("[target]\npooled = true").unwrap();
        let cli = parse(&["hammer", "failover"]);
        let Commands::Failover(args) = cli.command else { panic!("expected failover") };
        let eff = EffectiveFailover::new(&args, &file).unwrap();
        assert_eq!(eff.connect.pool_size, Some(DEFAULT_POOL_SIZE));
    }

    #[test]
    fn pool_size_layers() {
        let file = FileConfig::parse("[target]\npool_size = 8").unwrap();

        let cli = parse(&["hammer", "run"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(EffectiveRun::new(&args, &file).unwrap().run.connect.pool_size, Some(8));

        let cli = parse(&["hammer", "run", "--pooled", "--pool-size", "2"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(EffectiveRun::new(&args, &file).unwrap().run.connect.pool_size, Some(2));

        let cli = parse(&["hammer", "run", "--pool-size", "0"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert!(EffectiveRun::new(&args, &FileConfig::default()).is_err());
    }

    #[test]
    fn huge_worker_count_is_rejected() {
        let cli = parse(&["hammer", "run", "--writers", "18446744073709551615"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert!(matches!(
            EffectiveRun::new(&args, &FileConfig::default()),
            Err(CliError::Engine(_))
        ));
    }

    #[test]
    fn unknown_store_in_file_is_rejected() {
        let file = FileConfig::parse("[target]\nstore = \"mysql\"").unwrap();
        let cli = parse(&["hammer", "run"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert!(matches!(EffectiveRun::new(&args, &file), Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_run_is_rejected() {
        let cli = parse(&["hammer", "run", "--writers", "0", "--readers", "0"]);
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert!(EffectiveRun::new(&args, &FileConfig::default()).is_err());
    }

    #[test]
    fn failover_flags() {
        let cli = parse(&[
            "hammer",
            "--config",
            "custom.toml",
            "failover",
            "--keep-users",
            "--disrupt-cmd",
            "kubectl",
            "delete",
            "pod",
            "postgres-0",
            "--force",
        ]);
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        let Commands::Failover(args) = cli.command else { panic!("expected failover") };
        let eff = EffectiveFailover::new(&args, &FileConfig::default()).unwrap();

        assert!(!eff.scenario.reset_users);
        assert_eq!(
            eff.disrupt_command.unwrap(),
            ["kubectl", "delete", "pod", "postgres-0", "--force"]
        );
    }

    #[test]
    fn failover_resets_users_by_default() {
        let cli = parse(&["hammer", "failover"]);
        let Commands::Failover(args) = cli.command else { panic!("expected failover") };
        let eff = EffectiveFailover::new(&args, &FileConfig::default()).unwrap();
        assert!(eff.scenario.reset_users);
        assert!(eff.disrupt_command.is_none());
    }
}
