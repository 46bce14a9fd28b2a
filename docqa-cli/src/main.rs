use anyhow::Result;
use clap::Parser;
use docqa_cli::{Cli, execute};
use docqa_telemetry::{TelemetryConfig, init_telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_telemetry(&TelemetryConfig::default().with_format(cli.opts.log_format));

    match execute(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            std::process::exit(1);
        }
    }
}
