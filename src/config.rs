//! Logging setup.

use tracing::log::LevelFilter;

/// Sets up logging; `debug` raises this crate to debug level.
///
/// sqlx logs every statement at debug, so it is capped at info.
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let sqlx_level = if debug {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    let mut logger = simple_logger::SimpleLogger::new()
        .with_level(level)
        .with_module_level("sqlx", sqlx_level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("sea_orm_migration", LevelFilter::Warn)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Logging setup failed: {err}");
        Box::new(std::io::Error::other(err))
    })
}
