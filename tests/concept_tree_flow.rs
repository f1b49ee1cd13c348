//! Integration tests for concept trees: loading, per-section isolation,
//! malformed responses, stale loads and turning a node into a section.

use bitscroll::app::{App, AppEvent, Focus};
use bitscroll::config::Config;
use bitscroll::generation::{parse_concept_tree, GenerationClient};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MINING_TREE: &str = r#"{"nodes": [
    {"label": "Mining", "parent": null, "summary": "Securing the ledger with work."},
    {"label": "Difficulty Adjustment", "parent": "Mining", "summary": "Retargets every 2016 blocks."},
    {"label": "Hash Rate", "parent": "Mining", "summary": "Total work per second."}
]}"#;

const LIGHTNING_TREE: &str = r#"{"nodes": [
    {"label": "Lightning Network", "parent": null},
    {"label": "Payment Channels", "parent": "Lightning Network"}
]}"#;

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [ { "message": { "role": "assistant", "content": content } } ]
    })
}

fn tree_request() -> impl wiremock::Match {
    body_partial_json(serde_json::json!({ "response_format": { "type": "json_object" } }))
}

fn app_for(base: &str) -> App {
    let mut config = Config::default();
    config.min_loading_ms = 0;
    let client = GenerationClient::new(reqwest::Client::new(), base);
    App::new(config, client)
}

async fn next_event(rx: &mut mpsc::Receiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for task event")
        .expect("channel closed")
}

#[tokio::test]
async fn test_failed_load_for_one_section_leaves_other_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openrouter"))
        .and(body_string_contains("Mining"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/openrouter"))
        .and(body_string_contains("Lightning Network"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(LIGHTNING_TREE)))
        .mount(&server)
        .await;

    let mut app = app_for(&server.uri());
    app.feed.append("Mining", "Work.");
    app.feed.append("Lightning Network", "Channels.");
    let mining_id = app.feed.sections()[0].id.clone();
    let lightning_id = app.feed.sections()[1].id.clone();
    let (tx, mut rx) = mpsc::channel(8);

    app.selected_section = 0;
    app.toggle_tree(&tx);
    app.selected_section = 1;
    app.toggle_tree(&tx);

    for _ in 0..2 {
        let event = next_event(&mut rx).await;
        app.handle_event(event);
    }

    let mining = app.trees.state(&mining_id).expect("mining state");
    assert!(!mining.loading);
    assert!(mining.nodes.is_empty());
    assert_eq!(
        mining.error.as_deref(),
        Some("Concept map unavailable. Generation service unavailable.")
    );

    let lightning = app.trees.state(&lightning_id).expect("lightning state");
    assert!(!lightning.loading);
    assert_eq!(lightning.error, None);
    let labels: Vec<&str> = lightning.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["Lightning Network", "Payment Channels"]);
}

#[tokio::test]
async fn test_malformed_tree_response_yields_fallback_root() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openrouter"))
        .and(tree_request())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("Sorry, here is a list: mining, pools, ASICs.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new(reqwest::Client::new(), &server.uri());
    let nodes = client.generate_tree("Mining").await.expect("malformed content is not an error");

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].label, "Mining");
    assert_eq!(nodes[0].id, "root-mining");
    assert_eq!(nodes[0].parent_id, None);
}

#[tokio::test]
async fn test_undecodable_response_body_yields_fallback_root() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openrouter"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = GenerationClient::new(reqwest::Client::new(), &server.uri());
    let nodes = client.generate_tree("Mining").await.expect("decode failure is absorbed");

    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].is_root());
}

#[tokio::test]
async fn test_expand_node_appends_section_about_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openrouter"))
        .and(tree_request())
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(MINING_TREE)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/openrouter"))
        .and(body_string_contains("Difficulty Adjustment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "Every 2016 blocks the target moves.\n\nBlocks stay near ten minutes apart.",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut app = app_for(&server.uri());
    app.feed.append("Mining", "Work.");
    let section_id = app.feed.sections()[0].id.clone();
    let (tx, mut rx) = mpsc::channel(8);

    app.toggle_tree(&tx);
    assert_eq!(app.focus, Focus::Tree);
    let event = next_event(&mut rx).await;
    app.handle_event(event);

    let node_id = app
        .trees
        .state(&section_id)
        .and_then(|s| s.nodes.iter().find(|n| n.label == "Difficulty Adjustment"))
        .map(|n| n.id.clone())
        .expect("tree contains the node");
    app.trees.select_node(&section_id, &node_id);

    assert!(app.expand_selected_node(&tx));
    assert!(app.trees.state(&section_id).is_some_and(|s| s.action_loading));
    assert!(!app.expand_selected_node(&tx));

    let event = next_event(&mut rx).await;
    app.handle_event(event);

    assert_eq!(app.feed.sections().len(), 2);
    assert_eq!(app.feed.sections()[1].topic, "Difficulty Adjustment");
    assert_eq!(app.feed.sections()[1].paragraphs().count(), 2);
    let state = app.trees.state(&section_id).expect("state kept");
    assert!(!state.action_loading);
    assert_eq!(state.action_error, None);
}

#[tokio::test]
async fn test_stale_tree_load_never_overwrites_newer_result() {
    let mut app = app_for("http://127.0.0.1:9");
    app.feed.append("Mining", "Work.");
    let section_id = app.feed.sections()[0].id.clone();

    let first = app.trees.load(&section_id, "Mining");
    let second = app.trees.load(&section_id, "Mining");

    app.handle_event(AppEvent::TreeLoaded {
        section_id: section_id.clone(),
        generation: second.generation,
        result: Ok(parse_concept_tree(MINING_TREE, "Mining")),
    });
    app.handle_event(AppEvent::TreeLoaded {
        section_id: section_id.clone(),
        generation: first.generation,
        result: Ok(parse_concept_tree("not json", "Mining")),
    });

    let state = app.trees.state(&section_id).expect("state");
    assert!(!state.loading);
    assert_eq!(state.nodes.len(), 3);
    assert!(state.nodes.iter().any(|n| n.label == "Hash Rate"));
}
