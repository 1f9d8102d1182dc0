use std::env;

use chrono::Local;
use log::LevelFilter;

pub fn setup_logging() -> Result<(), fern::InitError> {
    let base_config = fern::Dispatch::new();

    let level = level_from_env(env::var("LOG_LEVEL").ok().as_deref());

    let stderr_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}] {}: {}",
                Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        // kube and hyper are chatty at debug, keep them at warn unless asked for trace
        .level_for("hyper", LevelFilter::Warn)
        .level_for("tower", LevelFilter::Warn)
        .chain(std::io::stderr());

    base_config.chain(stderr_config).apply()?;

    Ok(())
}

fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value {
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        _ => LevelFilter::Warn, // Default to Warn if variable is unset or has an unrecognized value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_level_from_env() {
        assert_eq!(level_from_env(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from_env(Some("error")), LevelFilter::Error);
        assert_eq!(level_from_env(Some("verbose")), LevelFilter::Warn);
        assert_eq!(level_from_env(None), LevelFilter::Warn);
    }
}
