//! Orchestrator tests: fan-out, partial failure, fallbacks, ranking, and
//! deadline behavior, all driven through the capability mocks.

use std::sync::Arc;

use tokio::time::Instant;

use pricescout_common::SiteCatalog;
use pricescout_engine::score::{fuzzy_score, RelevanceScorer};
use pricescout_engine::testing::{listing_page, test_site, MockFetcher, MockModel, ModelBehavior};
use pricescout_engine::SearchEngine;

fn build_engine(
    catalog: SiteCatalog,
    model: MockModel,
    fetcher: MockFetcher,
) -> (Arc<SearchEngine>, Arc<MockFetcher>, Arc<MockModel>) {
    let fetcher = Arc::new(fetcher);
    let model = Arc::new(model);
    let engine = Arc::new(SearchEngine::new(
        Arc::new(catalog),
        model.clone(),
        fetcher.clone(),
    ));
    (engine, fetcher, model)
}

#[tokio::test]
async fn unknown_country_fails_without_network_activity() {
    let catalog = SiteCatalog::new(vec![test_site("Site A", "site-a.test", "US")]);
    let (engine, fetcher, model) = build_engine(catalog, MockModel::offline(), MockFetcher::new());

    let result = engine.search("ZZ", "anything").await;

    assert!(matches!(
        result,
        Err(pricescout_common::SearchError::NoSitesForCountry { .. })
    ));
    assert_eq!(fetcher.fetch_count(), 0);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn partial_site_failure_still_returns_results() {
    let catalog = SiteCatalog::new(vec![
        test_site("Site A", "site-a.test", "US"),
        test_site("Site B", "site-b.test", "US"),
        test_site("Site C", "site-c.test", "US"),
        test_site("Site D", "site-d.test", "US"),
        test_site("Site E", "site-e.test", "US"),
    ]);
    let page = listing_page(&[("Apple iPhone 15 - 128GB Black", "$799.00")]);
    let fetcher = MockFetcher::new()
        .on_page("site-a.test", &page)
        .on_page("site-b.test", &page)
        .failing("site-c.test", "connection refused")
        .failing("site-d.test", "status 503")
        .failing("site-e.test", "timed out");

    let (engine, _, _) = build_engine(catalog, MockModel::offline(), fetcher);

    let response = engine.search("US", "iPhone 15 128GB").await.unwrap();

    // Two surviving sites, one strong listing each.
    assert_eq!(response.count, 2);
    assert_eq!(response.results.len(), 2);
    assert!(response
        .results
        .iter()
        .all(|o| o.site == "Site A" || o.site == "Site B"));
    assert_eq!(response.query, "iPhone 15 128GB");
    assert_eq!(response.country, "US");
}

#[tokio::test(start_paused = true)]
async fn unresponsive_model_degrades_to_fuzzy_within_the_deadline() {
    let catalog = SiteCatalog::new(vec![
        test_site("Site A", "site-a.test", "US"),
        test_site("Site B", "site-b.test", "US"),
    ]);
    let page = listing_page(&[("Apple iPhone 15 - 128GB Black", "$799.00")]);
    let fetcher = MockFetcher::new()
        .on_page("site-a.test", &page)
        .on_page("site-b.test", &page);

    let (engine, _, _) = build_engine(catalog, MockModel::silent(), fetcher);

    let start = Instant::now();
    let response = engine.search("US", "iPhone 15 128GB").await.unwrap();
    let elapsed = start.elapsed();

    assert!(
        elapsed <= pricescout_engine::search::SEARCH_DEADLINE + std::time::Duration::from_secs(2),
        "search took {elapsed:?}"
    );
    assert_eq!(response.count, 2);
    let expected = fuzzy_score("iPhone 15 128GB", "Apple iPhone 15 - 128GB Black");
    for offer in &response.results {
        assert_eq!(offer.confidence, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn accessory_listings_are_filtered_and_matches_ranked_first() {
    let catalog = SiteCatalog::new(vec![
        test_site("Site A", "site-a.test", "US"),
        test_site("Site B", "site-b.test", "US"),
    ]);
    let fetcher = MockFetcher::new()
        .on_page(
            "site-a.test",
            &listing_page(&[("Apple iPhone 15 - 128GB Black", "$799.00")]),
        )
        .on_page("site-b.test", &listing_page(&[("iPhone 15 Case", "$12.99")]));

    let (engine, _, _) = build_engine(catalog, MockModel::offline(), fetcher);

    let response = engine.search("US", "iPhone 15 128GB").await.unwrap();

    // The accessory scores below the retention threshold; only the real
    // handset survives, in first position.
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].product_name, "Apple iPhone 15 - 128GB Black");
    assert!(response.results[0].confidence >= 0.8);
}

#[tokio::test]
async fn llm_extraction_feeds_scored_and_resolved_offers() {
    let extraction_reply = r#"{
        "products": [
            {"title": "Apple iPhone 15 - 128GB Black", "price": "799.00", "currency": "USD", "link": "/p/iphone-15", "confidence": 0.92},
            {"title": "Bargain bin mystery item", "price": "5.00", "currency": "USD", "link": "/p/misc", "confidence": 0.2}
        ]
    }"#;
    let catalog = SiteCatalog::new(vec![test_site("Site A", "site-a.test", "US")]);
    let fetcher = MockFetcher::new().on_page(
        "site-a.test",
        &listing_page(&[("Apple iPhone 15 - 128GB Black", "$799.00")]),
    );
    let model = MockModel::new()
        .on_extraction(ModelBehavior::Reply(extraction_reply.to_string()))
        .on_scoring(ModelBehavior::Reply("0.95".to_string()));

    let (engine, _, _) = build_engine(catalog, model, fetcher);

    let response = engine.search("US", "iPhone 15 128GB").await.unwrap();

    // The low-confidence extraction is dropped before scoring.
    assert_eq!(response.count, 1);
    let offer = &response.results[0];
    assert_eq!(offer.link, "https://site-a.test/p/iphone-15");
    assert_eq!(offer.price, "799.00");
    assert_eq!(offer.confidence, 0.95);
}

#[tokio::test]
async fn retention_threshold_is_inclusive_at_the_boundary() {
    let catalog = SiteCatalog::new(vec![test_site("Site A", "site-a.test", "US")]);
    let fetcher = MockFetcher::new().on_page(
        "site-a.test",
        &listing_page(&[
            ("Apple iPhone 15 gadget one", "$10.00"),
            ("Apple iPhone 15 gadget two", "$20.00"),
        ]),
    );
    let model = MockModel::offline()
        .scoring_reply("gadget one", "0.29")
        .scoring_reply("gadget two", "0.30");

    let (engine, _, _) = build_engine(catalog, model, fetcher);

    let response = engine.search("US", "iPhone 15").await.unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].product_name, "Apple iPhone 15 gadget two");
    assert_eq!(response.results[0].confidence, 0.30);
}

#[tokio::test]
async fn llm_scores_below_the_floor_fall_back_to_fuzzy() {
    let model = Arc::new(
        MockModel::offline()
            .scoring_reply("gadget one", "0.1")
            .scoring_reply("gadget two", "0.05"),
    );
    let scorer = RelevanceScorer::new(model);
    let deadline = Instant::now() + std::time::Duration::from_secs(30);

    // Exactly at the floor: the LLM's word stands.
    let at_floor = scorer.score("iPhone 15", "gadget one", deadline).await;
    assert_eq!(at_floor, 0.1);

    // Below the floor: degenerate parse, replaced by the fuzzy score.
    let below_floor = scorer.score("iPhone 15", "gadget two", deadline).await;
    assert_eq!(below_floor, fuzzy_score("iPhone 15", "gadget two"));
}

#[tokio::test]
async fn scores_stay_in_range_on_every_path() {
    let catalog = SiteCatalog::new(vec![test_site("Site A", "site-a.test", "US")]);
    let fetcher = MockFetcher::new().on_page(
        "site-a.test",
        &listing_page(&[("Apple iPhone 15 overclaimed listing", "$1.00")]),
    );
    // A model that overclaims: parse_score clamps it into range.
    let model = MockModel::offline().scoring_reply("overclaimed", "42.0");

    let (engine, _, _) = build_engine(catalog, model, fetcher);

    let response = engine.search("US", "iPhone 15").await.unwrap();
    assert_eq!(response.count, 1);
    for offer in &response.results {
        assert!((0.0..=1.0).contains(&offer.confidence));
    }
}
