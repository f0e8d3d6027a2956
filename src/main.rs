mod cli;
mod operations;

use anyhow::{bail, Result};
use log::{debug, error, info};
use packcam::common::logging_setup;
use packcam::config_loader;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let matches = cli::build_cli().get_matches();
    let debug_flag = matches.get_flag("debug");

    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(cli::DEFAULT_CONFIG_PATH);

    let config_load_start_time = Instant::now();
    let master_config = match config_loader::load_config(config_path) {
        Ok(cfg) => {
            logging_setup::initialize_logging(Some(&cfg), debug_flag);
            info!("✅ Configuration loaded from: {} in {:?}", config_path, config_load_start_time.elapsed());
            cfg
        }
        Err(e) => {
            logging_setup::initialize_logging(None, debug_flag);
            error!("❌ Failed to load master configuration from '{}': {:#}. Exiting.", config_path, e);
            return Err(e.context(format!("Failed to load master configuration from '{}'", config_path)));
        }
    };

    let Some((operation_name, sub_matches)) = matches.subcommand() else {
        bail!("No subcommand given. Try `packcam run`.");
    };
    debug!("🎬 Dispatching to subcommand: {}", operation_name);
    let op_start_time = Instant::now();

    let op_result: Result<()> = match operation_name {
        "run" => operations::run_op::handle_run_cli(master_config, config_path).await,
        "sweep" => operations::sweep_op::handle_sweep_cli(&master_config, sub_matches).await,
        "probe" => operations::probe_op::handle_probe_cli(&master_config, sub_matches).await,
        "search" => operations::archive_op::handle_search_cli(&master_config, sub_matches).await,
        "list" => operations::archive_op::handle_list_cli(&master_config).await,
        other => bail!("Subcommand '{}' not implemented.", other),
    };

    if let Err(e) = op_result {
        error!("❌ Operation '{}' failed after {:?}: {:#}", operation_name, op_start_time.elapsed(), e);
        return Err(e);
    }
    info!("✅ Operation '{}' completed in {:?}.", operation_name, op_start_time.elapsed());
    debug!("🏁 packcam finished in {:?}.", main_start_time.elapsed());
    Ok(())
}
