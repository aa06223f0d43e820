use super::*;
use crate::config::VectorStoreConfig;
use crate::conversation::{FALLBACK_ANSWER, Role};
use crate::embeddings::ChunkingConfig;
use crate::retriever::RetrievalConfig;
use crate::test_support::{
    HashEmbeddings, ScriptedCompletion, StallingIndex, StubFetcher, StubLocator, product_page_text,
};

const DIMENSION: usize = 64;
const PRODUCT_URL: &str = "https://www.partselect.com/PS11752778-Whirlpool-WPW10321304-Refrigerator-Door-Shelf-Bin.htm";

struct Harness {
    locator: Arc<StubLocator>,
    provider: Arc<ScriptedCompletion>,
    orchestrator: QueryOrchestrator,
}

fn harness_with(
    locator: StubLocator,
    service: Arc<dyn VectorIndexService>,
    provider: ScriptedCompletion,
) -> Harness {
    let locator = Arc::new(locator);
    let provider = Arc::new(provider);
    let store = VectorStoreConfig {
        dimension: DIMENSION,
        readiness_poll_interval_ms: 0,
        readiness_max_interval_ms: 0,
        propagation_delay_ms: 0,
        ..VectorStoreConfig::default()
    };

    let indexer = ContentIndexer::new(
        service,
        Arc::new(HashEmbeddings::new(DIMENSION)),
        Arc::new(StubFetcher::serving(product_page_text())),
        &store,
        ChunkingConfig::default(),
    );
    let retriever = Retriever::new(RetrievalConfig {
        max_attempts: 2,
        retry_delay_ms: 1,
        ..RetrievalConfig::default()
    });
    let engine = ConversationEngine::new(
        Arc::clone(&provider) as Arc<dyn crate::conversation::CompletionProvider>,
        Arc::new(MemoryConversationStore::new()),
    );

    Harness {
        orchestrator: QueryOrchestrator::new(
            Arc::clone(&locator) as Arc<dyn PageLocator>,
            indexer,
            retriever,
            engine,
        ),
        locator,
        provider,
    }
}

fn harness(provider: ScriptedCompletion) -> Harness {
    harness_with(
        StubLocator::resolving(PRODUCT_URL),
        Arc::new(MemoryIndexService::new()),
        provider,
    )
}

fn last_user_turn(provider: &ScriptedCompletion) -> String {
    provider
        .calls()
        .last()
        .and_then(|turns| turns.last())
        .map(|turn| {
            assert_eq!(turn.role, Role::User);
            turn.content.clone()
        })
        .expect("provider was called")
}

#[tokio::test]
async fn part_number_query_is_answered_with_page_context() {
    let h = harness(ScriptedCompletion::replying(
        "Slide the bin down onto the door tabs until it clicks.",
    ));
    let query = "How can I install PS11752778?";

    let answer = h
        .orchestrator
        .handle(&SessionId::default(), query)
        .await
        .expect("pipeline succeeds");

    assert_eq!(
        answer.as_deref(),
        Some("Slide the bin down onto the door tabs until it clicks.")
    );
    assert_ne!(answer.as_deref(), Some(FALLBACK_ANSWER));
    assert_eq!(h.locator.keywords(), vec!["PS11752778".to_string()]);

    let prompt = last_user_turn(&h.provider);
    assert!(prompt.contains(query));
    assert!(prompt.contains("Context:"));
    assert!(prompt.len() > query.len() + 400);
}

#[tokio::test]
async fn query_without_keyword_is_left_to_the_caller() {
    let h = harness(ScriptedCompletion::replying("Check the water supply line first."));
    let query = "The ice maker on my Whirlpool fridge is not working. How can I fix it?";
    let session = SessionId::new("fridge");

    let handled = h.orchestrator.handle(&session, query).await.expect("no error");
    assert_eq!(handled, None);
    assert!(h.locator.keywords().is_empty());
    assert!(h.provider.calls().is_empty());

    let answer = h.orchestrator.answer(&session, query).await;
    assert_eq!(answer, "Check the water supply line first.");
    assert_eq!(last_user_turn(&h.provider), query);
}

#[tokio::test]
async fn model_query_locates_by_model_token() {
    let h = harness(ScriptedCompletion::replying(
        "Is your WDT780SAEM1 a refrigerator or a dishwasher?",
    ));

    h.orchestrator
        .handle(
            &SessionId::default(),
            "Is this compatible with my WDT780SAEM1 model?",
        )
        .await
        .expect("pipeline succeeds");

    assert_eq!(h.locator.keywords(), vec!["WDT780SAEM1".to_string()]);
}

#[tokio::test]
async fn repeated_keyword_is_located_again() {
    let h = harness(ScriptedCompletion::new(vec![
        Ok("first".to_string()),
        Ok("second".to_string()),
    ]));
    let session = SessionId::default();

    h.orchestrator
        .handle(&session, "What does PS11752778 fit?")
        .await
        .expect("first");
    h.orchestrator
        .handle(&session, "Is PS11752778 in stock?")
        .await
        .expect("second");

    assert_eq!(h.locator.keywords().len(), 2);
}

#[tokio::test]
async fn locator_failure_surfaces_from_handle_and_degrades_in_answer() {
    let h = harness_with(
        StubLocator::broken(),
        Arc::new(MemoryIndexService::new()),
        ScriptedCompletion::replying("General install guidance."),
    );
    let session = SessionId::default();
    let query = "How can I install PS11752778?";

    let result = h.orchestrator.handle(&session, query).await;
    assert!(matches!(result, Err(AssistantError::BrowserAutomation(_))));

    let answer = h.orchestrator.answer(&session, query).await;
    assert_eq!(answer, "General install guidance.");
    assert_eq!(last_user_turn(&h.provider), query);
    assert_eq!(h.orchestrator.engine().transcript(&session).await.len(), 5);
}

#[tokio::test]
async fn retrieval_stall_degrades_to_raw_query() {
    let h = harness_with(
        StubLocator::resolving(PRODUCT_URL),
        Arc::new(StallingIndex::new(u32::MAX)),
        ScriptedCompletion::replying("Without context."),
    );
    let session = SessionId::default();
    let query = "How can I install PS11752778?";

    let result = h.orchestrator.handle(&session, query).await;
    assert!(matches!(
        result,
        Err(AssistantError::RetrievalStall { attempts: 2 })
    ));

    assert_eq!(h.orchestrator.answer(&session, query).await, "Without context.");
    assert_eq!(last_user_turn(&h.provider), query);
}

#[tokio::test]
async fn completion_failure_after_retrieval_is_the_fallback() {
    let h = harness(ScriptedCompletion::failing());
    let session = SessionId::default();

    let answer = h
        .orchestrator
        .handle(&session, "How can I install PS11752778?")
        .await
        .expect("pipeline succeeds");
    assert_eq!(answer.as_deref(), Some(FALLBACK_ANSWER));

    let transcript = h.orchestrator.engine().transcript(&session).await;
    assert_eq!(transcript.last().map(|t| t.role), Some(Role::User));
}

#[tokio::test]
async fn builds_from_config_with_memory_backend() {
    let mut config = Config::default();
    config.openai.api_key = Some("sk-test".to_string());
    config.vector_store.backend = IndexBackend::Memory;

    let orchestrator = QueryOrchestrator::from_config(&config)
        .await
        .expect("orchestrator");
    assert_eq!(orchestrator.indexer().spec().name, "serverless-index");
    assert_eq!(orchestrator.indexer().spec().dimension, 1536);
}

#[tokio::test]
async fn lancedb_backend_opens_under_the_config_dir() {
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.vector_store.backend = IndexBackend::LanceDb;

    let service = open_index_service(&config).await.expect("lancedb opens");
    assert!(service.list_indexes().await.expect("list").is_empty());
    assert!(config.vector_database_path().exists());
}
