use autoform::{Autofill, ChromeDriver, Config, ConnectionMode, StaticValues};
use clap::Parser;
use std::path::PathBuf;

/// Drive a multi-step HTML form to completion.
///
/// Launches (or attaches to) Chrome, navigates to the start URL, then fills
/// and submits each page until the URL path reaches the target.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the first form page
    url: String,

    /// Target path that signals completion (e.g. /confirmation)
    #[arg(short, long)]
    target: String,

    /// JSON file mapping field names to values
    #[arg(short, long)]
    values: Option<PathBuf>,

    /// Consecutive no-progress submissions tolerated before failing
    #[arg(long, default_value_t = autoform::DEFAULT_MAX_LOOPS)]
    max_loops: u32,

    /// Directory for pre-submit and stuck-failure screenshots
    #[arg(long)]
    screenshots: Option<PathBuf>,

    /// Path to the Chrome executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Pass --no-sandbox to Chrome (Linux AppArmor workaround)
    #[arg(long)]
    no_sandbox: bool,

    /// Run Chrome headless
    #[arg(long)]
    headless: bool,

    /// Attach to an already-running Chrome on this debug port instead of
    /// launching one
    #[arg(long)]
    debug_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let values = match &args.values {
        Some(path) => StaticValues::from_file(path).await?,
        None => StaticValues::new(),
    };
    if values.is_empty() {
        log::warn!("No field values supplied - every control falls back to random/default completion");
    }

    let driver = match args.debug_port {
        Some(port) => ChromeDriver::connect_debug_port(port).await?,
        None => {
            ChromeDriver::new(ConnectionMode::Sandboxed {
                chrome_path: args.chrome_path.clone(),
                no_sandbox: args.no_sandbox,
                headless: args.headless,
            })
            .await?
        }
    };

    log::info!("Navigating to {}", args.url);
    driver.navigate(&args.url).await?;

    let config = Config {
        max_loops: args.max_loops,
        screenshots: args.screenshots.clone(),
    };

    log::info!("Completing form towards {}", args.target);
    let outcome = Autofill::new(&driver, &values)
        .with_config(config)
        .run(&args.target)
        .await;

    // Leave an attached browser alone; only close one we launched
    if args.debug_port.is_none() {
        if let Err(e) = driver.close().await {
            log::warn!("Failed to close Chrome: {}", e);
        }
    }

    match outcome {
        Ok(()) => {
            log::info!("Arrived at {}", args.target);
            Ok(())
        }
        Err(e) => {
            log::error!("Form completion failed: {}", e);
            Err(e.into())
        }
    }
}
