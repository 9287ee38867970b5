use crate::error::CorsiResult;
use crate::{configuration::Configuration, error::CorsiError};
use cli::run_cli_command;
use tracing::{info, instrument};

mod cli;
mod configuration;
mod database;
mod error;
mod web;

#[instrument(err)]
fn setup_tracing_subscriber() -> CorsiResult<()> {
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::fmt::Layer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    let logging_layer = Layer::default().json().with_span_list(true);
    let subscriber = Registry::default().with(logging_layer);

    set_global_default(subscriber).map_err(|error| CorsiError::SetupTracing {
        source: Box::new(error),
    })?;

    info!("Set up tracing subscriber successfully");

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> CorsiResult<()> {
    // Load configuration
    let configuration = Configuration::from_environment()?;

    setup_tracing_subscriber()?;

    run_cli_command(&configuration).await?;

    Ok(())
}
