//! Config loading, logging setup, and controller assembly.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use cartpole_config::Config;
use cartpole_core::{EncoderCfg, MotionCfg, ProtocolCfg, build_controller, conversions};
use cartpole_hardware::{RigCfg, SimAngleSensor, SimRig, StdioTransport};
use cartpole_traits::{Clock, MonotonicClock};

use crate::cli::{Cli, FILE_GUARD};

const DEFAULT_CONFIG_PATH: &str = "etc/cartpole.toml";

/// Load the config file, falling back to compiled-in defaults when the
/// default path is absent. An explicitly given path must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if !path.exists() {
        if explicit.is_some() {
            eyre::bail!("config file not found: {}", path.display());
        }
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg = cartpole_config::load_toml(&text)
        .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
    Ok(cfg)
}

/// Initialize tracing on stderr (stdout belongs to the protocol), with an
/// optional rotating JSON file sink from the config.
pub fn init_logging(cli: &Cli, logging: &cartpole_config::Logging) -> Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    if let Some(file) = logging.file.as_deref() {
        let rotation = match logging.rotation.as_deref() {
            Some("daily") => Rotation::DAILY,
            Some("hourly") => Rotation::HOURLY,
            _ => Rotation::NEVER,
        };
        let path = Path::new(file);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| "cartpole.log".as_ref());
        let appender = RollingFileAppender::new(rotation, dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(writer)
            .init();
    } else if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Assemble the simulated rig and run the tick loop until Ctrl-C or until
/// piped input is exhausted and every deferred response has been sent.
pub fn run(cli: &Cli, cfg: &Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .wrap_err("failed to install signal handler")?;
    }

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let defaults = RigCfg::default();
    let rig_cfg = RigCfg {
        span_steps: cli.sim_span_steps.unwrap_or(defaults.span_steps),
        start_frac: cli.sim_start_frac.unwrap_or(defaults.start_frac),
    };
    let span_steps = rig_cfg.span_steps;
    let rig = SimRig::new(rig_cfg, clock.clone());
    let sensor = SimAngleSensor::new(clock.clone());
    let transport = StdioTransport::spawn();
    let input_drained = transport.drained_flag();

    let mut controller = build_controller(
        rig.driver(),
        rig.switches(),
        sensor,
        transport,
        MotionCfg::from(&cfg.stepper),
        EncoderCfg::from(&cfg.encoder),
        ProtocolCfg::from(&cfg.protocol),
        cfg.runner.tick_rate_hz,
        conversions::initial_state(&cfg.limits),
        None,
    )?;

    let period = Duration::from_micros(cartpole_core::util::period_us(cfg.runner.tick_rate_hz));
    tracing::info!(
        span_steps,
        tick_rate_hz = cfg.runner.tick_rate_hz,
        "cartpole sim running"
    );

    while !shutdown.load(Ordering::Relaxed) {
        controller.tick();
        if input_drained.load(Ordering::Relaxed) && controller.idle() {
            tracing::info!("input exhausted, shutting down");
            break;
        }
        clock.sleep(period);
    }

    Ok(())
}
