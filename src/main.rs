use clap::{Parser, Subcommand};
use partselect_assistant::commands::{ask, chat, extract_keyword, index, locate, show_status};
use partselect_assistant::config::{run_interactive_config, show_config};
use partselect_assistant::conversation::SessionId;

#[derive(Parser)]
#[command(name = "partselect-assistant")]
#[command(about = "Answers refrigerator and dishwasher part questions using product page content")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question, e.g. "How can I install PS11752778?"
        query: String,
        /// Conversation session to continue
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Start an interactive chat
    Chat {
        /// Conversation session to use
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Show which keyword a question would be looked up by
    Extract {
        query: String,
    },
    /// Resolve a part number or model to its product page URL
    Locate {
        keyword: String,
    },
    /// Index a product page into the vector index
    Index {
        url: String,
    },
    /// Configure providers and pipeline settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show configuration and provider status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { query, session } => {
            ask(&query, &SessionId::new(session)).await?;
        }
        Commands::Chat { session } => {
            chat(&SessionId::new(session)).await?;
        }
        Commands::Extract { query } => {
            extract_keyword(&query);
        }
        Commands::Locate { keyword } => {
            locate(&keyword).await?;
        }
        Commands::Index { url } => {
            index(&url).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
