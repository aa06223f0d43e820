#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use std::sync::Arc;

use async_trait::async_trait;
use partselect_assistant::config::VectorStoreConfig;
use partselect_assistant::crawler::browser::{BrowserConfig, ChromeLocator, PageLocator};
use partselect_assistant::crawler::{FetchConfig, HttpFetcher};
use partselect_assistant::database::{MemoryIndexService, VectorIndexService};
use partselect_assistant::embeddings::{ChunkingConfig, EmbeddingProvider};
use partselect_assistant::indexer::ContentIndexer;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Two-dimensional embeddings: text length and vowel count
struct LengthEmbeddings;

#[async_trait]
impl EmbeddingProvider for LengthEmbeddings {
    async fn embed_documents(
        &self,
        texts: &[String],
    ) -> partselect_assistant::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
                vec![text.len() as f32, vowels as f32]
            })
            .collect())
    }
}

const LANDING_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head><title>Refrigerator Parts</title></head>
<body>
    <input class="js-headerNavSearch" type="text">
    <script>
        document.querySelector('input').addEventListener('keydown', (event) => {
            if (event.key === 'Enter') {
                window.location.href = '/' + event.target.value + '.htm';
            }
        });
    </script>
</body>
</html>
"#;

fn product_html() -> String {
    let mut html = String::from("<html><head><title>Ice Maker Assembly</title></head><body>");
    for section in 0..30 {
        html.push_str(&format!(
            "<p>Shop refrigerator parts in aisle {} by brand, model and category.</p>",
            section
        ));
    }
    html.push_str("<h2>Product Description</h2>");
    for note in 0..24 {
        html.push_str(&format!(
            "<p>Note {}: this ice maker assembly replaces the original unit.</p>",
            note
        ));
    }
    html.push_str("</body></html>");
    html
}

// Integration test that requires Chrome to be available
#[tokio::test]
async fn located_page_is_fetched_and_indexed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Refrigerator-Parts.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LANDING_HTML, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/PS11722130.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(product_html(), "text/html"))
        .mount(&server)
        .await;

    let locator = ChromeLocator::new(BrowserConfig {
        landing_url: format!("{}/Refrigerator-Parts.htm", server.uri()),
        navigation_timeout_seconds: 10,
        release_delay_ms: 0,
        ..Default::default()
    });

    let url = match locator.locate("PS11722130").await {
        Ok(url) => url,
        Err(e) => {
            // Skip test if Chrome is not available
            let message = e.to_string();
            if message.contains("launch") || message.contains("Chrome") {
                eprintln!("Skipping test - Chrome not available: {}", e);
                return;
            }
            panic!("Unexpected error: {}", e);
        }
    };
    assert_eq!(url.path(), "/PS11722130.htm");

    let service = Arc::new(MemoryIndexService::new());
    let store = VectorStoreConfig {
        dimension: 2,
        readiness_poll_interval_ms: 0,
        readiness_max_interval_ms: 0,
        propagation_delay_ms: 0,
        ..VectorStoreConfig::default()
    };
    let indexer = ContentIndexer::new(
        Arc::clone(&service) as Arc<dyn VectorIndexService>,
        Arc::new(LengthEmbeddings),
        Arc::new(HttpFetcher::new(&FetchConfig::default())),
        &store,
        ChunkingConfig::default(),
    );

    let outcome = indexer.index_page(&url).await.expect("page indexed");
    assert_eq!(outcome.title.as_deref(), Some("Ice Maker Assembly"));
    assert_eq!(outcome.upserted, 6);
    assert_eq!(service.record_count("serverless-index"), 6);
}
