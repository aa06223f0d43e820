use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser automation error: {0}")]
    BrowserAutomation(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Index provisioning error: {0}")]
    IndexProvision(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Retrieval stalled: similarity search returned nothing after {attempts} attempts")]
    RetrievalStall { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod crawler;
pub mod database;
pub mod embeddings;
pub mod http;
pub mod indexer;
pub mod keyword;
pub mod prompt;
pub mod retriever;

#[cfg(test)]
pub(crate) mod test_support;
