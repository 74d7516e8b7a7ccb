//! Run command implementation

use crate::config::Config;
use crate::controller::RiskEngine;
use crate::telemetry;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log at debug level, overriding the configured log_level
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    /// Initialize telemetry, start the engine loop, and run until ctrl-c.
    ///
    /// Producers (order-fill handlers, price feeds) connect through the
    /// engine handle; this process only hosts the monitoring loop.
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut telemetry_config = config.telemetry.clone();
        if self.verbose {
            telemetry_config.log_level = "debug".to_string();
        }
        let _guard = telemetry::init_telemetry(&telemetry_config)?;

        let (engine, handle) = RiskEngine::new(config);
        let task = tokio::spawn(engine.run());

        tracing::info!("risk engine running; press ctrl-c to stop");
        tokio::signal::ctrl_c().await?;

        handle.shutdown().await?;
        task.await?;
        Ok(())
    }
}
