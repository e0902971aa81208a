use clap::{Arg, ArgAction, Command as ClapCommand};
use log::error;
use std::path::Path;
use std::process;

use coreprep::commands::{CommandFactory, CoreprepCommandFactory};
use coreprep::utils::logger::Logger;
use coreprep::RunConfig;

fn main() {
    let matches = ClapCommand::new("coreprep")
        .version("0.1")
        .about("Cut tissue cores out of multiplex channel images and assemble them into pyramids")
        .arg(
            Arg::new("config")
                .help("Run configuration (TOML)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("cleanup")
                .long("cleanup")
                .help("Delete transferred source images once they have been cut")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .help("Drive mode override (push or poll)")
                .value_name("MODE")
                .required(false),
        )
        .arg(
            Arg::new("scan-only")
                .long("scan-only")
                .help("Only report the channel selection")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Do not draw a progress bar")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    init_logging(matches.get_one::<String>("config").map(Path::new));

    let factory = CoreprepCommandFactory::new();

    match factory.create_command(&matches) {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Log to a run file when the configuration names a log directory,
/// otherwise through env_logger
fn init_logging(config_path: Option<&Path>) {
    let log_dir = config_path
        .and_then(|path| RunConfig::load(path).ok())
        .and_then(|config| config.general.log_dir);

    if let Some(log_dir) = log_dir {
        match Logger::init_global_logger(&log_dir) {
            Ok(path) => {
                log::info!("Logging to {}", path.display());
                return;
            }
            Err(e) => eprintln!("Error setting up run log in {}: {}", log_dir.display(), e),
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
