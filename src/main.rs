use std::sync::Arc;

use dualauth::config::{load_config, print_schema};
use dualauth::startup;
use dualauth::utils::logger::init_logging;

const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => {
                print_schema();
                return;
            }
            "--config" => match args.next() {
                Some(path) => config_path = path,
                None => {
                    eprintln!("--config requires a path");
                    std::process::exit(2);
                }
            },
            other => {
                eprintln!("Unknown argument '{}'. Usage: dualauth [--config PATH] [--schema]", other);
                std::process::exit(2);
            }
        }
    }

    let config = match load_config(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load config from '{}': {}", config_path, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = startup::run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
