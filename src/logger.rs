use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    Config,
};

use crate::error::XVectorError;

const APPENDER: &str = "stderr";
const PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}";

/// Installs a stderr logger: this crate logs at `level`, every other crate at `warn`.
///
/// Panics are logged before the previous hook runs.
pub fn init_log(level: LevelFilter) -> crate::Result<()> {
    log4rs::init_config(log_config(level)?)
        .map_err(|err| XVectorError::Logger(err.to_string()))?;

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("{info}");
        hook(info);
    }));

    Ok(())
}

fn log_config(level: LevelFilter) -> crate::Result<Config> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build(APPENDER, Box::new(stderr)))
        .logger(Logger::builder().build(env!("CARGO_CRATE_NAME"), level))
        .build(Root::builder().appender(APPENDER).build(LevelFilter::Warn))
        .map_err(|err| XVectorError::Logger(err.to_string()))
}
