use clap::{Arg, ArgAction, Command};
use log::debug;
use std::time::Instant;

pub const DEFAULT_CONFIG_PATH: &str = "config/packcam.yaml";

pub fn build_cli() -> Command {
    debug!("⚙️ Building CLI interface...");
    let start_time = Instant::now();
    let cmd = Command::new("packcam")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Records one video per scanned order code from multiple packing-station cameras.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom configuration file")
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true)
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue)
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Starts the recording engine until Ctrl-C (SIGHUP reloads the configuration)")
        )
        .subcommand(
            Command::new("sweep")
                .about("Runs one retention sweep over the video and metadata directories")
                .arg(Arg::new("days").long("days").value_name("DAYS").help("Override the retention window in days").value_parser(clap::value_parser!(u64)).action(ArgAction::Set))
        )
        .subcommand(
            Command::new("probe")
                .about("Opens each camera, reads one frame and reports its size")
                .arg(Arg::new("cameras").long("cameras").value_name("CAM_NAMES").help("Comma-separated list of camera ids or names to probe (default: all)").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("search")
                .about("Finds the recording of an order code and prints its timing")
                .arg(Arg::new("order").value_name("ORDER_CODE").required(true).help("Order code or its prefix").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("list")
                .about("Lists recorded videos, newest first")
        );
    debug!("✅ CLI interface built in {:?}", start_time.elapsed());
    cmd
}
