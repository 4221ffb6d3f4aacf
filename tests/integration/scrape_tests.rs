use crate::common::{index_page, listing_page, mount_index, mount_listing, settings, Harness};
use car_harvest::state::PipelineState;
use car_harvest::storage::ListingStore;
use car_harvest::HarvestError;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hrefs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| format!("/auto_{}.html", n)).collect()
}

#[tokio::test]
async fn test_overlapping_pages_store_each_listing_once() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(2, &hrefs(&["a", "b"]))).await;
    mount_index(&server, 2, index_page(2, &hrefs(&["b", "c"]))).await;

    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/auto_{}.html", name)))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(name, Some("9 999 $"))),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let harness = Harness::new(settings(&server, 4));
    let summary = harness.coordinator.run_scrape().await.unwrap();

    assert_eq!(summary.pages_total, 2);
    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(summary.pages_skipped, 0);
    assert_eq!(summary.listings_discovered, 3);
    assert_eq!(summary.records_inserted, 3);
    assert_eq!(summary.records_skipped, 0);
    assert_eq!(summary.records_failed, 0);

    let stats = harness.store.stats().await.unwrap();
    assert_eq!(stats.total, 3);

    let record = harness
        .store
        .find_by_url(&format!("{}/auto_b.html", server.uri()))
        .await
        .unwrap()
        .expect("listing b should be stored");
    assert_eq!(record.title.as_deref(), Some("b"));
    assert_eq!(record.price_usd, Some(9_999));
    assert_eq!(record.odometer, Some(120_000));
    assert_eq!(record.car_vin.as_deref(), Some("VINB"));

    assert_eq!(harness.coordinator.state(), PipelineState::Done(summary));
}

#[tokio::test]
async fn test_second_run_skips_stored_listings() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(1, &hrefs(&["a", "b", "c"]))).await;
    for name in ["a", "b", "c"] {
        mount_listing(
            &server,
            &format!("/auto_{}.html", name),
            listing_page(name, Some("1000")),
        )
        .await;
    }

    let harness = Harness::new(settings(&server, 4));

    let first = harness.coordinator.run_scrape().await.unwrap();
    assert_eq!(first.records_inserted, 3);

    let second = harness.coordinator.run_scrape().await.unwrap();
    assert_eq!(second.records_inserted, 0);
    assert_eq!(second.records_skipped, 3);
    assert_eq!(second.records_failed, 0);

    assert_eq!(harness.store.stats().await.unwrap().total, 3);
}

#[tokio::test]
async fn test_missing_price_is_still_inserted() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(1, &hrefs(&["noprice"]))).await;
    mount_listing(&server, "/auto_noprice.html", listing_page("Audi", None)).await;

    let harness = Harness::new(settings(&server, 2));
    let summary = harness.coordinator.run_scrape().await.unwrap();
    assert_eq!(summary.records_inserted, 1);

    let record = harness
        .store
        .find_by_url(&format!("{}/auto_noprice.html", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.title.as_deref(), Some("Audi"));
    assert_eq!(record.price_usd, None);
    assert_eq!(record.car_vin.as_deref(), Some("VINAUDI"));
}

#[tokio::test]
async fn test_in_flight_requests_never_exceed_capacity() {
    let server = MockServer::start().await;
    let capacity = 3;

    let names: Vec<String> = (0..6).map(|i| i.to_string()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    for page in 1..=4 {
        Mock::given(method("GET"))
            .and(path("/search/"))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(index_page(4, &hrefs(&names)))
                    .set_delay(Duration::from_millis(30)),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path_regex_listing())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page("car", Some("500")))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, capacity));
    let summary = harness.coordinator.run_scrape().await.unwrap();

    assert_eq!(summary.listings_discovered, 6);
    assert_eq!(summary.records_inserted, 6);
    assert!(
        harness.fetcher.peak() <= capacity as usize,
        "peak {} exceeded capacity {}",
        harness.fetcher.peak(),
        capacity
    );
    assert_eq!(harness.coordinator.throttle().in_flight(), 0);
}

fn path_regex_listing() -> wiremock::matchers::PathRegexMatcher {
    wiremock::matchers::path_regex(r"^/auto_\d+\.html$")
}

#[tokio::test]
async fn test_index_phase_finishes_before_details_start() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(3, &hrefs(&["1", "2"]))).await;
    mount_index(&server, 2, index_page(3, &hrefs(&["3"]))).await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("page", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(index_page(3, &hrefs(&["4"])))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex_listing())
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page("car", None)))
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 8));
    harness.coordinator.run_scrape().await.unwrap();

    let spans = harness.fetcher.spans();
    let last_index_end = spans
        .iter()
        .filter(|s| s.path == "/search/")
        .map(|s| s.finished)
        .max()
        .unwrap();
    let first_detail_start = spans
        .iter()
        .filter(|s| s.path.starts_with("/auto_"))
        .map(|s| s.started)
        .min()
        .unwrap();

    // resolver + three index pages, then four listings
    assert_eq!(spans.len(), 8);
    assert!(last_index_end < first_detail_start);
}

#[tokio::test]
async fn test_first_page_failure_aborts_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex_listing())
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page("car", None)))
        .expect(0)
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 4));
    let result = harness.coordinator.run_scrape().await;

    assert!(matches!(result, Err(HarvestError::Pagination { .. })));
    assert!(matches!(harness.coordinator.state(), PipelineState::Failed(_)));
    assert_eq!(harness.store.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_failed_index_page_is_skipped() {
    let server = MockServer::start().await;

    for page in 1..=10u32 {
        if page == 7 {
            Mock::given(method("GET"))
                .and(path("/search/"))
                .and(query_param("page", "7"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;
        } else {
            let href = format!("/auto_{}.html", page);
            mount_index(&server, page, index_page(10, &[href])).await;
        }
    }
    Mock::given(method("GET"))
        .and(path_regex_listing())
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page("car", Some("1"))))
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 5));
    let summary = harness.coordinator.run_scrape().await.unwrap();

    assert_eq!(summary.pages_total, 10);
    assert_eq!(summary.pages_crawled, 9);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(summary.listings_discovered, 9);
    assert_eq!(summary.records_inserted, 9);
    assert!(matches!(harness.coordinator.state(), PipelineState::Done(_)));
}

#[tokio::test]
async fn test_missing_listing_counts_as_failed() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(1, &hrefs(&["1", "404"]))).await;
    mount_listing(&server, "/auto_1.html", listing_page("car", Some("100"))).await;
    Mock::given(method("GET"))
        .and(path("/auto_404.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 2));
    let summary = harness.coordinator.run_scrape().await.unwrap();

    assert_eq!(summary.records_inserted, 1);
    assert_eq!(summary.records_failed, 1);
    assert_eq!(
        summary.records_inserted + summary.records_skipped + summary.records_failed,
        summary.listings_discovered
    );
}

#[tokio::test]
async fn test_phone_number_is_resolved() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(1, &hrefs(&["42"]))).await;
    mount_listing(
        &server,
        "/auto_42.html",
        r#"<html><body data-auto-id="42">
            <h1 class="head">Toyota Camry</h1>
            <script class="js-user-secure-42" data-hash="s1gn" data-expires="3600"></script>
        </body></html>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/users/phones/42/"))
        .and(query_param("hash", "s1gn"))
        .and(query_param("expires", "3600"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"formattedPhoneNumber":"(050) 111 22 33"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 2));
    let summary = harness.coordinator.run_scrape().await.unwrap();
    assert_eq!(summary.records_inserted, 1);

    let record = harness
        .store
        .find_by_url(&format!("{}/auto_42.html", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.phone_number.as_deref(), Some("+380501112233"));
}

#[tokio::test]
async fn test_phone_failure_leaves_number_absent() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(1, &hrefs(&["7"]))).await;
    mount_listing(
        &server,
        "/auto_7.html",
        r#"<html><body data-auto-id="7"><h1 class="head">Kia</h1></body></html>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/users/phones/7/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 2));
    let summary = harness.coordinator.run_scrape().await.unwrap();
    assert_eq!(summary.records_inserted, 1);

    let record = harness
        .store
        .find_by_url(&format!("{}/auto_7.html", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.phone_number, None);
}

#[tokio::test]
async fn test_timed_out_run_does_not_block_the_next_one() {
    let server = MockServer::start().await;

    mount_index(&server, 1, index_page(1, &hrefs(&["slow"]))).await;
    Mock::given(method("GET"))
        .and(path("/auto_slow.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page("slow", Some("700")))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let harness = Harness::new(settings(&server, 2));

    let first = tokio::time::timeout(
        Duration::from_millis(100),
        harness.coordinator.run_scrape(),
    )
    .await;
    assert!(first.is_err());
    assert_eq!(
        harness.coordinator.state(),
        PipelineState::Failed("interrupted".to_string())
    );

    let second = harness.coordinator.run_scrape().await.unwrap();
    assert_eq!(second.records_inserted, 1);
    assert!(matches!(harness.coordinator.state(), PipelineState::Done(_)));
}
