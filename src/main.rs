//! Ceph Salt Deploy
//!
//! Command line front end for the policy expander and the containerized
//! Ceph daemon orchestrator.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ceph_salt_deploy::{
    CephOrchestrator, CommandRunner, Error, ExecutionContext, MonBootstrap, MonCreate,
    OrchestrationReport, PolicyExpander, RecordingRunner, Result, SaltContext, Settings,
    StaticContext, SystemRunner, UserIds,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Ceph Salt Deploy - pillar generation and containerized Ceph daemons
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (YAML)
    #[arg(long, env = "CEPH_SALT_CONFIG")]
    config: Option<PathBuf>,

    /// Answer grains, pillar and targeting from this inventory file instead of Salt
    #[arg(long, env = "CEPH_SALT_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Ceph container image
    #[arg(long, env = "CEPH_IMAGE")]
    image: Option<String>,

    /// Log external commands instead of running them. Salt queries still
    /// run; files are written and removed under --stage-dir only.
    #[arg(long)]
    dry_run: bool,

    /// Staging root for --dry-run (defaults to a directory under the system
    /// temp dir)
    #[arg(long, requires = "dry_run")]
    stage_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand the role policy into minion and global pillar files
    Deploy,

    /// Run a ceph command in a container and print its output
    Ceph {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// Print the Ceph version shipped in the image
    Version,

    /// Create the local monitor
    CreateMon {
        /// Bootstrap a new cluster instead of joining an existing one
        #[arg(long)]
        bootstrap: bool,

        /// Cluster fsid for bootstrap (defaults to the pillar, then a new one)
        #[arg(long, requires = "bootstrap")]
        fsid: Option<String>,

        #[arg(long, default_value_t = 0)]
        uid: u32,

        #[arg(long, default_value_t = 0)]
        gid: u32,

        /// Do not install and start the systemd unit
        #[arg(long)]
        no_start: bool,
    },

    /// Install and start the local monitor unit
    StartMon {
        #[arg(long, default_value_t = 0)]
        uid: u32,

        #[arg(long, default_value_t = 0)]
        gid: u32,
    },

    /// Remove the local monitor
    RemoveMon,

    /// Create and start the local manager
    CreateMgr,

    /// Create the keyring of a manager in the Salt file cache
    CreateMgrKeyring {
        /// Manager name
        name: String,
    },

    /// Remove the local manager
    RemoveMgr,
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = Settings::load_or_default(args.config.as_deref())?;

    let runner: Arc<dyn CommandRunner> = if args.dry_run {
        let stage_dir = args
            .stage_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ceph-salt-deploy"));
        info!("Dry run, staging files under {}", stage_dir.display());
        settings = settings.staged(&stage_dir);

        let salt = [settings.salt.salt_call.clone(), settings.salt.salt.clone()];
        Arc::new(RecordingRunner::dry_run().delegate(Arc::new(SystemRunner::new()), salt))
    } else {
        Arc::new(SystemRunner::new())
    };

    let ctx: Arc<dyn ExecutionContext> = match &args.inventory {
        Some(path) => Arc::new(StaticContext::load(path)?),
        None => Arc::new(SaltContext::new(runner.clone(), settings.salt.clone())),
    };

    match args.command {
        Command::Deploy => {
            let report = PolicyExpander::new(settings.policy.clone()).deploy(ctx.as_ref())?;
            print_yaml(&report)
        }
        command => {
            let image = args
                .image
                .or_else(|| settings.container.image.clone())
                .ok_or_else(|| {
                    Error::Configuration("no Ceph image given (--image or CEPH_IMAGE)".into())
                })?;
            let orchestrator = CephOrchestrator::new(
                ctx.clone(),
                runner,
                &settings.container,
                settings.layout.clone(),
            )?;
            info!("Using image {} on {}", image, orchestrator.node_name());
            orchestrate(&orchestrator, ctx.as_ref(), &image, command)
        }
    }
}

// =============================================================================
// Orchestration Commands
// =============================================================================

fn orchestrate(
    orchestrator: &CephOrchestrator,
    ctx: &dyn ExecutionContext,
    image: &str,
    command: Command,
) -> Result<()> {
    let report = match command {
        Command::Ceph { args } => {
            print!("{}", orchestrator.ceph_cli(image, &args)?);
            return Ok(());
        }
        Command::Version => {
            print!("{}", orchestrator.ceph_version(image)?);
            return Ok(());
        }
        Command::CreateMon {
            bootstrap,
            fsid,
            uid,
            gid,
            no_start,
        } => {
            let bootstrap = if bootstrap {
                MonBootstrap::bootstrap_new(ctx, fsid)?
            } else {
                MonBootstrap::JoinExisting
            };
            let plan = MonCreate {
                bootstrap,
                user: UserIds::new(uid, gid),
                start: !no_start,
            };
            orchestrator.create_mon(image, &plan)?
        }
        Command::StartMon { uid, gid } => {
            let name = orchestrator.node_name().to_string();
            orchestrator.start_mon(image, &name, UserIds::new(uid, gid))?
        }
        Command::RemoveMon => orchestrator.remove_mon(image)?,
        Command::CreateMgr => orchestrator.create_mgr(image)?,
        Command::CreateMgrKeyring { name } => orchestrator.create_mgr_keyring(image, &name)?,
        Command::RemoveMgr => orchestrator.remove_mgr()?,
        Command::Deploy => {
            return Err(Error::Configuration(
                "deploy does not run through the orchestrator".into(),
            ))
        }
    };

    print_report(&report)
}

// =============================================================================
// Output
// =============================================================================

fn print_yaml<T: serde::Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

fn print_report(report: &OrchestrationReport) -> Result<()> {
    info!("Completed {} steps", report.steps.len());
    print_yaml(report)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so command output on stdout stays clean
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
