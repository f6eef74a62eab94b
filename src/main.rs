//! jsconv - analyze JavaScript source plugins and scrape through them

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use js_plugin_converter::core::{CliArgs, Command, Config, Logger};
use js_plugin_converter::plugin::{
    ChapterInfo, ContentSource, Filter, MangaInfo, PluginAnalyzer, PluginConverter, ReqwestFetcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    // Load configuration (CLI args, env vars and config file)
    let config = match Config::load(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Print error to stderr since logging isn't initialized yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logger = match Logger::init(&config.logging) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return Err(e);
        }
    };

    let path = cli.command.file().to_path_buf();
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read plugin source {}", path.display()))?;
    info!(path = %path.display(), bytes = source.len(), strategy = %config.analyzer.strategy, "Loaded plugin source");

    let analyzer = PluginAnalyzer::new(config.analyzer.strategy);

    if let Command::Analyze { pretty, .. } = &cli.command {
        return print_json(&analyzer.analyze(&source), *pretty);
    }

    let fetcher = ReqwestFetcher::from_config(&config.http).context("Failed to build HTTP client")?;
    let converter = PluginConverter::new(Arc::new(fetcher));
    let generated = converter.from_source(&path.display().to_string(), &source, &analyzer)?;

    match cli.command {
        Command::Analyze { .. } => Ok(()),
        Command::Search { query, page, .. } => {
            let results = match query {
                Some(query) => generated.search(&[Filter::Title(query)], page).await,
                None => generated.list_page(None, page).await,
            };
            print_json(&results, true)
        }
        Command::Details { url, .. } => {
            let manga = generated.fetch_details(MangaInfo::new(url)).await;
            print_json(&manga, true)
        }
        Command::Chapters { url, .. } => {
            let chapters = generated.fetch_chapter_list(&MangaInfo::new(url)).await;
            print_json(&chapters, true)
        }
        Command::Content { url, .. } => {
            let pages = generated.fetch_page_list(&ChapterInfo::new(url)).await;
            print_json(&pages, true)
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
