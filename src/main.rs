use anyhow::{Context, Result};
use clap::Parser;
use dataqa::{App, ChromeDriver, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scan a page for data-qa identifiers and print the resulting tree as JSON
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Page to open
    url: String,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Attribute carrying the dotted identifier
    #[arg(long)]
    name_attr: Option<String>,

    /// Attribute carrying the element model
    #[arg(long)]
    type_attr: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if cli.name_attr.is_some() || cli.type_attr.is_some() {
        let name_attr = cli.name_attr.unwrap_or(config.naming.name_attr.clone());
        let type_attr = cli.type_attr.unwrap_or(config.naming.type_attr.clone());
        config = config.with_naming(&name_attr, &type_attr);
    }
    if cli.headful {
        config.browser.headless = false;
    }

    let driver = Arc::new(ChromeDriver::launch(&config.browser).context("Failed to start Chrome")?);
    let mut app = App::with_config(driver, config, None).await?;
    app.get(&cli.url).await?;

    let duplicates = app.rescan().await?;
    for identifier in &duplicates {
        warn!("Duplicate identifier: {}", identifier);
    }
    info!("Page has {} top-level identifiers", app.page().keys().count());

    let tree = app.page().json().await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    Ok(())
}
