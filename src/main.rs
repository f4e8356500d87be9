use clap::Parser;
use tracing::error;

use dashboard_provisioner::client::RedashClient;
use dashboard_provisioner::config::Config;
use dashboard_provisioner::logging;
use dashboard_provisioner::workflow::Provisioner;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashboard_provisioner")]
#[command(about = "Provisions a Redash dashboard from local definition files")]
#[command(version = "0.1.0")]
struct Cli {
    /// Directory containing *.json widget and *.sql query definitions
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    println!(
        "🚀 Provisioning dashboard '{}' at {}",
        config.dashboard_name, config.redash_url
    );

    let client = RedashClient::new(&config.redash_url)?;
    let provisioner = Provisioner::new(&client, &config);

    match provisioner.run(&cli.dir).await {
        Ok(report) => {
            println!("\n📊 Provisioning complete:");
            println!("   Queries: {}", report.queries_created);
            println!("   Visualizations: {}", report.visualizations_created);
            println!("   Widgets: {}", report.widgets_created);
            Ok(())
        }
        Err(e) => {
            error!("Provisioning failed: {e}");
            println!("❌ Provisioning failed: {e}");
            Err(e.into())
        }
    }
}
