use env_logger::Builder;
use log::LevelFilter;
use crate::config_loader::MasterConfig;

pub fn initialize_logging(config: Option<&MasterConfig>, debug_flag: bool) {
    let mut builder = Builder::new();

    // Determine log level from CLI, then config, then default
    let log_level_str = if debug_flag {
        "debug".to_string()
    } else {
        config
            .and_then(|c| c.app_settings.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    };

    builder.filter_level(parse_level(&log_level_str));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.try_init().unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {}. Logging might not work as expected.", e);
    });
}

fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        s => {
            eprintln!("Unrecognized log level '{}', defaulting to info.", s);
            LevelFilter::Info
        }
    }
}
