use capguard::cli::{Cli, Commands};
use capguard::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    match cli.command {
        Commands::Run(args) => {
            // Telemetry lives inside the run command; config mode stays quiet
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Limits: {}", serde_json::to_string_pretty(&config.limits)?);
            println!(
                "  Monitor interval: {}ms",
                config.engine.monitor_interval_ms
            );
            println!(
                "  Default trailing stop: {}%",
                config.engine.default_trailing_percent
            );
            println!("  Metrics port: {}", config.telemetry.metrics_port);
        }
    }

    Ok(())
}
