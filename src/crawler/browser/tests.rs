use super::*;

#[test]
fn browser_config_validation() {
    let mut config = BrowserConfig::default();

    // Valid configuration should pass
    config.validate().expect("Default config should be valid");

    // Test invalid timeout
    config.navigation_timeout_seconds = 0;
    assert!(config.validate().is_err());
    config.navigation_timeout_seconds = 400;
    assert!(config.validate().is_err());
    config.navigation_timeout_seconds = 30; // Reset to valid

    // Test invalid settle timeout
    config.settle_timeout_ms = 10;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSettleTimeout(10))
    ));
    config.settle_timeout_ms = 5000;

    // Test empty selector and bad landing page
    config.search_selector = String::new();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::EmptyField("search_selector"))
    ));
    config.search_selector = "input.js-headerNavSearch".to_string();
    config.landing_url = "not a url".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    config.landing_url = BrowserConfig::default().landing_url;

    // Test invalid window dimensions
    config.window_width = 50;
    assert!(config.validate().is_err());
    config.window_width = 1280;
    config.window_height = 5000;
    assert!(config.validate().is_err());
}

#[test]
fn browser_config_setters() {
    let mut config = BrowserConfig::default();

    config
        .set_navigation_timeout(60)
        .expect("can set config property");
    assert_eq!(config.navigation_timeout_seconds, 60);
    assert_eq!(config.navigation_timeout(), Duration::from_secs(60));

    assert!(config.set_navigation_timeout(0).is_err());
    assert!(config.set_navigation_timeout(400).is_err());

    config
        .set_settle_timeout(2500)
        .expect("can set config property");
    assert_eq!(config.settle_timeout_ms, 2500);
    assert!(config.set_settle_timeout(0).is_err());
}

#[test]
fn default_search_targets_catalog() {
    let config = BrowserConfig::default();
    assert_eq!(
        config.landing_url,
        "https://www.partselect.com/Dishwasher-Parts.htm"
    );
    assert_eq!(config.settle_timeout_ms, 5000);
    assert_eq!(config.release_delay_ms, 2000);
}

#[test]
fn landing_page_detection() {
    let landing = "https://www.partselect.com/Dishwasher-Parts.htm";

    assert!(!has_left(landing, landing));
    assert!(!has_left(&format!("{}#top", landing), landing));
    assert!(!has_left("", landing));
    assert!(!has_left("about:blank", landing));
    assert!(has_left(
        "https://www.partselect.com/PS11752778-Whirlpool-WPW10321304-Refrigerator-Door-Shelf-Bin.htm",
        landing
    ));
}

#[test]
fn resolved_url_requires_web_page() {
    assert!(resolved_url("https://www.partselect.com/PS11752778.htm").is_ok());
    assert!(resolved_url("chrome-error://chromewebdata/").is_err());
    assert!(resolved_url("about:blank").is_err());
}

mod integration_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Integration test that requires Chrome to be available
    #[tokio::test]
    async fn search_lands_on_product_page() {
        let server = MockServer::start().await;
        let landing_html = r#"
    <!DOCTYPE html>
    <html>
    <head><title>Dishwasher Parts</title></head>
    <body>
        <input class="js-headerNavSearch" type="text">
        <script>
            document.querySelector('input').addEventListener('keydown', (event) => {
                if (event.key === 'Enter') {
                    window.location.href = '/product/' + event.target.value + '.htm';
                }
            });
        </script>
    </body>
    </html>
    "#;
        Mock::given(method("GET"))
            .and(path("/Dishwasher-Parts.htm"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(landing_html, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/product/PS11752778.htm"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>Door Shelf Bin</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let locator = ChromeLocator::new(BrowserConfig {
            landing_url: format!("{}/Dishwasher-Parts.htm", server.uri()),
            navigation_timeout_seconds: 10,
            release_delay_ms: 0,
            ..Default::default()
        });

        match locator.locate("PS11752778").await {
            Ok(url) => {
                assert_eq!(url.path(), "/product/PS11752778.htm");
            }
            Err(e) => {
                // Skip test if Chrome is not available
                let message = e.to_string();
                if message.contains("launch") || message.contains("Chrome") {
                    eprintln!("Skipping test - Chrome not available: {}", e);
                    return;
                }
                panic!("Unexpected error: {}", e);
            }
        }
    }

    #[tokio::test]
    async fn missing_search_input_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Dishwasher-Parts.htm"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>No search here</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let locator = ChromeLocator::new(BrowserConfig {
            landing_url: format!("{}/Dishwasher-Parts.htm", server.uri()),
            navigation_timeout_seconds: 2,
            release_delay_ms: 0,
            ..Default::default()
        });

        let result = locator.locate("PS11752778").await;
        assert!(matches!(result, Err(AssistantError::BrowserAutomation(_))));
    }
}
