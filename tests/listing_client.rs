mod common;

use std::net::TcpListener;
use std::sync::Arc;

use common::{image_post, listing_body, StubServer};
use loon::controller::{self, Controller, Form, LoadOutcome};
use loon::data::{ListingService, Page, RedditListingService};
use loon::reddit::{self, Category, ListingError, ListingOptions};

fn service(base_url: &str) -> RedditListingService {
    let client = reddit::Client::new(reddit::ClientConfig {
        user_agent: "loon-test/0.1".into(),
        base_url: Some(base_url.into()),
        ..Default::default()
    })
    .expect("client");
    RedditListingService::new(Arc::new(client))
}

/// Fetches a page and accepts it, the way a finished load does.
fn fetch_and_commit(
    service: &RedditListingService,
    community: &str,
    category: Category,
    opts: &ListingOptions,
) -> Page {
    let page = service.fetch_listing(community, category, opts).unwrap();
    service.record_cursor(community, page.after.clone());
    page
}

#[test]
fn cursor_is_sent_on_next_fetch_and_cleared_at_end() {
    let server = StubServer::spawn(vec![
        (200, listing_body(vec![image_post("a", 1)], Some("t1"))),
        (200, listing_body(vec![image_post("b", 2)], None)),
        (200, listing_body(vec![image_post("a", 1)], None)),
    ]);
    let service = service(&server.base_url);
    let opts = ListingOptions {
        limit: 30,
        ..Default::default()
    };

    let page = service.fetch_listing("pics", Category::Top, &opts).unwrap();
    assert_eq!(page.posts.len(), 1);
    assert_eq!(page.after.as_deref(), Some("t1"));
    assert_eq!(server.next_request(), "/r/pics/top.json?limit=30&g=GLOBAL");
    // fetching alone does not move the cursor
    assert_eq!(service.cursor("pics"), None);
    service.record_cursor("pics", page.after);
    assert_eq!(service.cursor("pics").as_deref(), Some("t1"));

    fetch_and_commit(&service, "pics", Category::Top, &opts);
    assert_eq!(
        server.next_request(),
        "/r/pics/top.json?limit=30&g=GLOBAL&after=t1"
    );
    assert_eq!(service.cursor("pics"), None);

    fetch_and_commit(&service, "pics", Category::Top, &opts);
    assert_eq!(server.next_request(), "/r/pics/top.json?limit=30&g=GLOBAL");
}

#[test]
fn ended_listing_only_clears_its_own_cursor() {
    let server = StubServer::spawn(vec![
        (200, listing_body(vec![image_post("a", 1)], Some("t1"))),
        (200, listing_body(vec![image_post("b", 1)], None)),
        (200, listing_body(vec![], None)),
    ]);
    let service = service(&server.base_url);
    let opts = ListingOptions::default();

    fetch_and_commit(&service, "pics", Category::Hot, &opts);
    server.next_request();
    fetch_and_commit(&service, "aww", Category::Hot, &opts);
    server.next_request();
    fetch_and_commit(&service, "pics", Category::Hot, &opts);
    assert!(server.next_request().ends_with("&after=t1"));
}

#[test]
fn content_filter_runs_before_results_are_returned() {
    let mut adult = image_post("adult", 9);
    adult["over_18"] = true.into();
    let mut text = image_post("text", 9);
    text["post_hint"] = "self".into();
    let server = StubServer::spawn(vec![(
        200,
        listing_body(vec![image_post("a", 1), adult, text, image_post("b", 2)], None),
    )]);
    let service = service(&server.base_url);

    let page = service
        .fetch_listing("pics", Category::New, &ListingOptions::default())
        .unwrap();
    let ids: Vec<_> = page.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[test]
fn http_errors_carry_status_and_reason() {
    let server = StubServer::spawn(vec![
        (404, r#"{"message": "Not Found", "error": 404}"#.to_string()),
        (503, String::new()),
    ]);
    let service = service(&server.base_url);
    let opts = ListingOptions::default();

    let err = service
        .fetch_listing("doesnotexist", Category::Hot, &opts)
        .unwrap_err();
    assert!(matches!(err, ListingError::HttpStatus { status: 404, .. }));
    assert_eq!(err.reason(), Some("Not Found"));

    let err = service
        .fetch_listing("doesnotexist", Category::Hot, &opts)
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.reason(), Some("Service Unavailable"));
}

#[test]
fn failed_fetch_keeps_existing_cursor() {
    let server = StubServer::spawn(vec![
        (200, listing_body(vec![image_post("a", 1)], Some("t1"))),
        (500, String::new()),
    ]);
    let service = service(&server.base_url);
    let opts = ListingOptions::default();

    fetch_and_commit(&service, "pics", Category::Hot, &opts);
    assert!(service.fetch_listing("pics", Category::Hot, &opts).is_err());
    assert_eq!(service.cursor("pics").as_deref(), Some("t1"));
}

#[test]
fn invalid_payload_is_a_decode_error() {
    let server = StubServer::spawn(vec![(200, "<html>not json</html>".to_string())]);
    let service = service(&server.base_url);

    let err = service
        .fetch_listing("pics", Category::Hot, &ListingOptions::default())
        .unwrap_err();
    assert!(matches!(err, ListingError::Decode(_)));
    assert_eq!(err.reason(), None);
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let service = service(&format!("http://127.0.0.1:{port}"));

    let err = service
        .fetch_listing("pics", Category::Hot, &ListingOptions::default())
        .unwrap_err();
    assert!(matches!(err, ListingError::Transport(_)));
    assert_eq!(err.status(), None);
}

#[test]
fn reset_cursor_starts_from_first_page() {
    let server = StubServer::spawn(vec![
        (200, listing_body(vec![image_post("a", 1)], Some("t1"))),
        (200, listing_body(vec![image_post("a", 1)], Some("t2"))),
    ]);
    let service = service(&server.base_url);
    let opts = ListingOptions::default();

    fetch_and_commit(&service, "pics", Category::Hot, &opts);
    server.next_request();
    service.reset_cursor("pics");
    fetch_and_commit(&service, "pics", Category::Hot, &opts);
    assert!(!server.next_request().contains("after="));
}

#[test]
fn late_response_from_previous_category_keeps_new_cursor() {
    let server = StubServer::spawn(vec![
        (200, listing_body(vec![image_post("t", 5)], Some("top_cursor"))),
        (200, listing_body(vec![image_post("h", 5)], Some("hot_cursor"))),
        (200, listing_body(vec![image_post("u", 5)], None)),
    ]);
    let service = Arc::new(service(&server.base_url));
    let mut controller = Controller::new(
        service.clone(),
        controller::Options {
            form: Form {
                subreddit: "pics".into(),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let hot = controller.begin_load().unwrap();
    controller.set_category(Category::Top);
    let top = controller.begin_load().unwrap();

    // the newer request completes first
    let top_result = top.execute(service.as_ref());
    let hot_result = hot.execute(service.as_ref());
    server.next_request();
    server.next_request();
    assert_eq!(
        controller.finish_load(top.request_id, top_result),
        Some(LoadOutcome::Rendered(1))
    );
    assert_eq!(controller.finish_load(hot.request_id, hot_result), None);
    assert_eq!(service.cursor("pics").as_deref(), Some("top_cursor"));

    controller.load();
    assert_eq!(
        server.next_request(),
        "/r/pics/top.json?limit=15&g=GLOBAL&after=top_cursor"
    );
}
