// Deterministic stand-ins for the external providers, shared by unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use url::Url;

use crate::conversation::{CompletionProvider, Turn};
use crate::crawler::browser::PageLocator;
use crate::crawler::{Document, PageFetcher};
use crate::database::{
    IndexDescription, IndexSpec, MemoryIndexService, ScoredText, VectorIndexService, VectorRecord,
};
use crate::embeddings::EmbeddingProvider;
use crate::{AssistantError, Result};

/// Completion provider replaying a fixed list of outcomes and recording every transcript it saw
#[derive(Debug, Default)]
pub(crate) struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedCompletion {
    pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub(crate) fn failing() -> Self {
        Self::new(vec![Err(AssistantError::Completion(
            "provider unavailable".to_string(),
        ))])
    }

    pub(crate) fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        self.calls.lock().expect("calls lock").push(turns.to_vec());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(AssistantError::Completion("no scripted reply".to_string())))
    }
}

/// Bag-of-words embeddings: each lowercase word is hashed into one of `dimension` buckets
#[derive(Debug, Clone, Copy)]
pub(crate) struct HashEmbeddings {
    pub(crate) dimension: usize,
}

impl HashEmbeddings {
    pub(crate) fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub(crate) fn vector(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            values[bucket] += 1.0;
        }
        values
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }
}

/// Index whose first `empty_queries` searches come back empty, as a freshly
/// upserted remote index can
#[derive(Debug)]
pub(crate) struct StallingIndex {
    inner: MemoryIndexService,
    empty_queries: AtomicU32,
    queries: AtomicU32,
}

impl StallingIndex {
    pub(crate) fn new(empty_queries: u32) -> Self {
        Self {
            inner: MemoryIndexService::new(),
            empty_queries: AtomicU32::new(empty_queries),
            queries: AtomicU32::new(0),
        }
    }

    pub(crate) fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndexService for StallingIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        self.inner.list_indexes().await
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        self.inner.create_index(spec).await
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        self.inner.describe_index(name).await
    }

    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<usize> {
        self.inner.upsert(index, records).await
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredText>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let stalled = self
            .empty_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if stalled {
            return Ok(Vec::new());
        }
        self.inner.query(index, vector, top_k).await
    }
}

/// Page locator that always resolves to the same URL, or always fails
#[derive(Debug)]
pub(crate) struct StubLocator {
    url: Option<Url>,
    calls: Mutex<Vec<String>>,
}

impl StubLocator {
    pub(crate) fn resolving(url: &str) -> Self {
        Self {
            url: Some(Url::parse(url).expect("valid stub url")),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn broken() -> Self {
        Self {
            url: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn keywords(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl PageLocator for StubLocator {
    async fn locate(&self, keyword: &str) -> Result<Url> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(keyword.to_string());
        self.url.clone().ok_or_else(|| {
            AssistantError::BrowserAutomation("search input not found".to_string())
        })
    }
}

/// Page fetcher serving fixed text for any URL
#[derive(Debug, Clone)]
pub(crate) struct StubFetcher {
    content: Option<String>,
}

impl StubFetcher {
    pub(crate) fn serving(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self { content: None }
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<Document> {
        let content = self
            .content
            .clone()
            .ok_or_else(|| AssistantError::Fetch(format!("{} is unreachable", url)))?;
        Ok(Document {
            url: url.clone(),
            title: Some("Refrigerator Door Shelf Bin".to_string()),
            content,
        })
    }
}

/// Raw text of a product page long enough to fill the positional window,
/// with the description well past the navigation boilerplate
pub(crate) fn product_page_text() -> String {
    let mut page = String::new();
    for section in 0..12 {
        page.push_str(&format!(
            "Navigation section {} with links to\n\t  departments, brands, and\r\n order status pages. ",
            section
        ));
        page.push_str(&"Shop by appliance type and brand. ".repeat(8));
        page.push('\n');
    }
    page.push_str("Product Description\n");
    page.push_str(
        "This refrigerator door shelf bin PS11752778 is a genuine OEM replacement. \
         It attaches to the inside of the fridge door and holds jars and bottles. \
         To install it, slide the bin down onto the door tabs until it clicks. ",
    );
    for review in 0..24 {
        page.push_str(&format!(
            "Customer review {} praises the fit and finish of this bin. ",
            review
        ));
    }
    page
}
