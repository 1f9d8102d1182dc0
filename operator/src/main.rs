use kube::CustomResourceExt;
use log::info;
use otel_defs::OpenTelemetryCollector;
use otel_utils::setup_logging;

mod autodetect;
mod config;
mod controller;
mod errors;
mod events;
mod operator;
mod reconcile;
mod store;
mod upgrade;

use config::{OperatorConfig, RunMode};
use operator::start_operator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging()?;

    let config = OperatorConfig::from_env()?;

    match config.mode {
        RunMode::Crd => {
            print!("{}", serde_yaml::to_string(&OpenTelemetryCollector::crd())?);
        }
        RunMode::Operator => {
            info!(
                "Starting in OPERATOR mode, version {}, lease namespace {}",
                config.operator_version, config.namespace
            );
            start_operator(config).await?;
        }
    }

    Ok(())
}
