use crate::config::LogConfig;
use crate::errors::{DbError, DbResult};
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;
use std::path::Path;

pub const METRICS_TARGET: &str = "shelfdb::metrics";

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

// Set once by the first successful init; later calls swap the config in place.
static HANDLE: Mutex<Option<log4rs::Handle>> = Mutex::new(None);

/// Parse a level name, falling back to `Info` for anything unrecognised.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str, keep: u32) -> DbResult<RollingFileAppender> {
    let pattern = dir.join(format!("{stem}.{{}}.log"));
    let roller = FixedWindowRoller::builder()
        .build(&pattern.display().to_string(), keep)
        .map_err(|e| DbError::Logging(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Build the log4rs configuration for `cfg`: `app.log` for everything at the
/// configured level, `metrics.log` for [`METRICS_TARGET`], and optionally
/// `dev.log` for `devlog!` lines.
///
/// # Errors
/// `Config` when no directory is set, `Io`/`Logging` when appenders can't be built.
pub fn build_config(cfg: &LogConfig) -> DbResult<Config> {
    let dir = cfg.dir.as_deref().ok_or_else(|| DbError::Config("log.dir is not set".into()))?;
    std::fs::create_dir_all(dir)?;
    let level = parse_level(&cfg.level);
    let keep = cfg.retention.max(1);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(dir, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, LevelFilter::Info));

    builder = if cfg.dev_file {
        builder
            .appender(Appender::builder().build("dev", Box::new(rolling(dir, "dev", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev")
                    .additive(false)
                    .build(crate::devlog::DEV_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(crate::devlog::DEV_TARGET, LevelFilter::Off))
    };

    builder
        .build(Root::builder().appender("app").build(level))
        .map_err(|e| DbError::Logging(e.to_string()))
}

fn install(config: Config) -> DbResult<()> {
    let mut slot = HANDLE.lock();
    if let Some(handle) = slot.as_ref() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config).map_err(|e| DbError::Logging(e.to_string()))?;
    *slot = Some(handle);
    Ok(())
}

/// Route the process-wide logger according to `cfg`. Does nothing when no
/// directory is configured. Calling again replaces the active configuration.
///
/// # Errors
/// See [`build_config`]; also `Logging` if another logger already owns the
/// process.
pub fn init(cfg: &LogConfig) -> DbResult<()> {
    if cfg.dir.is_none() {
        return Ok(());
    }
    install(build_config(cfg)?)
}

/// Initialise from a log4rs YAML file.
///
/// # Errors
/// `Logging` when the file can't be read or deserialised.
pub fn init_from_file(path: &Path) -> DbResult<()> {
    let config = log4rs::config::load_config_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Logging(e.to_string()))?;
    install(config)
}
