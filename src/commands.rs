use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{error, info};

use crate::assistant::{QueryOrchestrator, content_indexer, open_index_service, openai_client};
use crate::config::{Config, IndexBackend};
use crate::conversation::{GREETING, SessionId};
use crate::crawler::browser::{ChromeLocator, PageLocator};
use crate::crawler::validate_url;
use crate::keyword::extract;

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Answer a single question and print the answer
#[inline]
pub async fn ask(query: &str, session: &SessionId) -> Result<()> {
    let config = Config::load()?;
    let orchestrator = QueryOrchestrator::from_config(&config).await?;

    let bar = spinner("Looking that up...");
    let answer = orchestrator.answer(session, query).await;
    bar.finish_and_clear();

    println!("{}", answer);
    Ok(())
}

/// Interactive question loop sharing one transcript until `exit` or `quit`
#[inline]
pub async fn chat(session: &SessionId) -> Result<()> {
    let config = Config::load()?;
    let orchestrator = QueryOrchestrator::from_config(&config).await?;
    info!("Starting chat session {}", session);

    println!("{} {}", style("Assistant:").cyan().bold(), GREETING);

    loop {
        let line: String = Input::new()
            .with_prompt(style("You").green().bold().to_string())
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            break;
        }

        let bar = spinner("Thinking...");
        let answer = orchestrator.answer(session, line).await;
        bar.finish_and_clear();
        println!("{} {}", style("Assistant:").cyan().bold(), answer);
    }

    println!("Goodbye!");
    Ok(())
}

/// Print the keyword that would be used to look up a product page
#[inline]
pub fn extract_keyword(query: &str) {
    match extract(query) {
        Some(keyword) => println!("{} ({:?})", keyword, keyword.kind),
        None => println!("no keyword"),
    }
}

/// Resolve a keyword to its product page URL with the browser
#[inline]
pub async fn locate(keyword: &str) -> Result<()> {
    let config = Config::load()?;
    let locator = ChromeLocator::new(config.browser.clone());

    let bar = spinner(&format!("Searching {} for {}", config.browser.landing_url, keyword));
    let result = locator.locate(keyword).await;
    bar.finish_and_clear();

    let url = result?;
    println!("{}", url);
    Ok(())
}

/// Index one product page into the configured vector index
#[inline]
pub async fn index(url: &str) -> Result<()> {
    let url = validate_url(url)?;
    let config = Config::load()?;
    let indexer = content_indexer(&config, openai_client(&config)?).await?;

    let bar = spinner(&format!("Indexing {}", url));
    let result = indexer.index_page(&url).await;
    bar.finish_and_clear();

    match result {
        Ok(outcome) => {
            if let Some(title) = &outcome.title {
                println!("Page: {}", title);
            }
            println!(
                "Upserted {} of {} chunks into '{}'",
                outcome.upserted,
                outcome.total_chunks,
                outcome.handle.name()
            );
            Ok(())
        }
        Err(e) => {
            error!("Indexing {} failed: {}", url, e);
            Err(e.into())
        }
    }
}

/// Show configuration and provider reachability
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("{}", style("PartSelect Assistant Status").bold());
    println!("{}", "=".repeat(40));
    println!("Config file: {}", config.config_file_path().display());
    println!();

    println!("{}", style("Completion provider").bold());
    println!("   Chat model: {}", config.openai.chat_model);
    println!("   Embedding model: {}", config.openai.embedding_model);
    match config.openai.resolve_api_key() {
        Ok(_) => println!("   ✅ API key: configured"),
        Err(e) => println!("   ❌ API key: {}", e),
    }
    println!();

    println!("{}", style("Vector index").bold());
    println!("   Backend: {}", config.vector_store.backend);
    println!(
        "   Index: {} ({} dimensions, {})",
        config.vector_store.index_name, config.vector_store.dimension, config.vector_store.metric
    );
    if config.vector_store.backend == IndexBackend::Memory {
        println!("   💤 In-memory indexes are empty until a question is asked");
        return Ok(());
    }

    match open_index_service(&config).await {
        Ok(service) => match service.list_indexes().await {
            Ok(names) if names.contains(&config.vector_store.index_name) => {
                println!("   ✅ Index exists");
            }
            Ok(_) => println!("   ⚠️  Index does not exist yet; it is created on first use"),
            Err(e) => println!("   ❌ Failed to list indexes: {}", e),
        },
        Err(e) => println!("   ❌ Failed to connect: {}", e),
    }

    Ok(())
}
