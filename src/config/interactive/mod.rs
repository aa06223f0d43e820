
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, IndexBackend, OpenAiConfig, VectorStoreConfig};
use crate::crawler::browser::BrowserConfig;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 PartSelect Assistant Configuration").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("OpenAI Configuration").bold().yellow());
    eprintln!("Used for both answers and embeddings. The API key is read from OPENAI_API_KEY.");
    eprintln!();
    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Vector Index").bold().yellow());
    eprintln!("Pinecone keys are read from PINECONE_API_KEY.");
    eprintln!();
    configure_vector_store(&mut config.vector_store)?;

    eprintln!();
    eprintln!("{}", style("Browser").bold().yellow());
    eprintln!("Product pages are found through the catalog site's search box.");
    eprintln!();
    configure_browser(&mut config.browser)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_openai_connection(&config.openai) {
        eprintln!("{}", style("✓ OpenAI connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach OpenAI with the configured key").yellow()
        );
        eprintln!("You can continue, but questions will only get the fallback answer.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("OpenAI:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
    eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    eprintln!("  API Key: {}", key_status(config.openai.resolve_api_key()));

    eprintln!();
    eprintln!("{}", style("Vector Index:").bold().yellow());
    eprintln!("  Backend: {}", style(config.vector_store.backend).cyan());
    eprintln!("  Index: {}", style(&config.vector_store.index_name).cyan());
    eprintln!(
        "  Dimension / Metric: {} / {}",
        style(config.vector_store.dimension).cyan(),
        style(config.vector_store.metric).cyan()
    );
    eprintln!(
        "  Cloud / Region: {} / {}",
        style(&config.vector_store.cloud).cyan(),
        style(&config.vector_store.region).cyan()
    );
    if config.vector_store.backend == IndexBackend::Pinecone {
        eprintln!(
            "  API Key: {}",
            key_status(config.vector_store.resolve_api_key())
        );
    }

    eprintln!();
    eprintln!("{}", style("Pipeline:").bold().yellow());
    eprintln!("  Landing Page: {}", style(&config.browser.landing_url).cyan());
    eprintln!(
        "  Chunks: {} chars, {} overlap",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!(
        "  Window: {} chunks from {} (anchor {})",
        style(config.chunking.window_len).cyan(),
        style(config.chunking.window_start).cyan(),
        style(config.chunking.window_anchor.as_deref().unwrap_or("none")).cyan()
    );
    eprintln!(
        "  Retrieval: top {} with {} attempts",
        style(config.retrieval.top_k).cyan(),
        style(config.retrieval.max_attempts).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn key_status(resolved: Result<String, ConfigError>) -> String {
    match resolved {
        Ok(_) => style("configured").green().to_string(),
        Err(e) => style(e).red().to_string(),
    }
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            let base_dir = Config::config_dir().context("Failed to determine config directory")?;
            Ok(Config {
                base_dir,
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_chat_model(chat_model)?;
    openai.set_embedding_model(embedding_model)?;

    Ok(())
}

fn backend_position(backend: IndexBackend) -> usize {
    IndexBackend::ALL
        .iter()
        .position(|&b| b == backend)
        .unwrap_or(0)
}

fn configure_vector_store(store: &mut VectorStoreConfig) -> Result<()> {
    let labels: Vec<String> = IndexBackend::ALL.iter().map(ToString::to_string).collect();
    let backend_index = Select::new()
        .with_prompt("Vector index backend")
        .default(backend_position(store.backend))
        .items(&labels)
        .interact()?;
    store.backend = IndexBackend::ALL[backend_index];

    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(store.index_name.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = VectorStoreConfig {
                index_name: input.clone(),
                ..VectorStoreConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let dimension: usize = Input::new()
        .with_prompt("Embedding dimension")
        .default(store.dimension)
        .interact_text()?;

    store.set_index_name(index_name)?;
    store.set_dimension(dimension)?;

    Ok(())
}

fn configure_browser(browser: &mut BrowserConfig) -> Result<()> {
    let landing_url: String = Input::new()
        .with_prompt("Catalog landing page")
        .default(browser.landing_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = BrowserConfig {
                landing_url: input.clone(),
                ..BrowserConfig::default()
            };
            candidate.validate()
        })
        .interact_text()?;

    let headless = Confirm::new()
        .with_prompt("Run the browser headless?")
        .default(browser.headless)
        .interact()?;

    let settle_timeout_ms: u64 = Input::new()
        .with_prompt("Search settle timeout (ms)")
        .default(browser.settle_timeout_ms)
        .interact_text()?;

    browser.landing_url = landing_url;
    browser.headless = headless;
    browser.set_settle_timeout(settle_timeout_ms)?;

    Ok(())
}

fn test_openai_connection(openai: &OpenAiConfig) -> bool {
    let Ok(api_key) = openai.resolve_api_key() else {
        return false;
    };
    let url = format!("{}/models", openai.base_url.trim_end_matches('/'));

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    agent
        .get(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .call()
        .is_ok()
}
