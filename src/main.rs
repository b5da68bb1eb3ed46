use std::sync::Arc;

use anyhow::Context;
use crawler_console::config::{ConsoleConfig, parse_process_id};
use crawler_console::console::{CrawlerConsole, run_repl};
use crawler_console::crawler::{CrawlerGateway, HttpGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the rendered view.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ConsoleConfig::from_env().context("invalid configuration")?;
    if let Some(raw) = std::env::args().nth(1) {
        config.process_id = Some(parse_process_id("process id argument", &raw)?);
    }

    let gateway: Arc<dyn CrawlerGateway> =
        Arc::new(HttpGateway::new(&config).context("failed to set up management API client")?);

    eprintln!("🕷️  Crawler Console v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.base_url);
    eprintln!("   Poll interval: {}ms", config.poll_interval.as_millis());
    match config.process_id {
        Some(id) => eprintln!("   Process: {id}"),
        None => eprintln!("   Process: none (use 'process <id>')"),
    }
    eprintln!("   Type 'help' for commands, 'quit' to exit.\n");

    let (mut console, notices) = CrawlerConsole::new(gateway, config.poll_interval);
    console.activate(config.process_id);

    run_repl(console, notices).await;
    Ok(())
}
