use artifact_hooks::config::Config;
use artifact_hooks::event::{ArtifactStoredEvent, Repository};
use artifact_hooks::gav::path_to_gav;
use artifact_hooks::internal_metrics::Metrics;
use artifact_hooks::notification::{Dispatcher, HttpClientFactory, HttpWebhookSender};
use artifact_hooks::resolver::UrlResolver;
use artifact_hooks::subscriptions::{SubscriptionSnapshot, SubscriptionStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_dispatcher(subscriptions: &str) -> Dispatcher {
    let config = Config::default();
    let store = SubscriptionStore::from_snapshot(SubscriptionSnapshot::parse(subscriptions).unwrap());
    let factory = HttpClientFactory::new(&config.dispatcher, &config.proxy)
        .with_timeout(Duration::from_secs(5));
    Dispatcher::start(
        UrlResolver::new(store),
        Arc::new(HttpWebhookSender::new(factory)),
        &config.dispatcher,
        Metrics::new(),
    )
}

fn stored_event() -> ArtifactStoredEvent {
    ArtifactStoredEvent::new(
        1_700_000_000_000,
        "deployer",
        Repository::new("releases", "Releases"),
        path_to_gav("com/example/app/1.2.3/app-1.2.3-sources.jar").unwrap(),
    )
}

fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/dead/", addr)
}

#[tokio::test]
async fn test_every_level_receives_the_same_body() {
    // Arrange
    let server = MockServer::start().await;
    for hook in ["/one/", "/two/", "/g/", "/r/", "/"] {
        Mock::given(method("POST"))
            .and(path(hook))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    let uri = server.uri();
    let subscriptions = format!(
        "releases.com.example.app = {uri}/one/,{uri}/two/\n\
         releases.com.example = {uri}/g/\n\
         releases = {uri}/r/\n\
         webhooks.default = {uri}/\n\
         webhooks.inherited = true\n"
    );
    let dispatcher = http_dispatcher(&subscriptions);
    let event = stored_event();

    // Act
    assert_eq!(dispatcher.notify(&event), 5);
    assert!(dispatcher.shutdown(Duration::from_secs(10)).await);

    // Assert
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
    let bodies: HashSet<Vec<u8>> = requests.into_iter().map(|r| r.body).collect();
    assert_eq!(bodies.len(), 1, "all subscribers must receive identical bytes");

    let body: serde_json::Value = serde_json::from_slice(bodies.iter().next().unwrap()).unwrap();
    assert_eq!(body, serde_json::from_str::<serde_json::Value>(&event.to_json().unwrap()).unwrap());
    assert_eq!(body["artifact"]["classifier"], "sources");
    assert_eq!(body["repository"]["id"], "releases");
}

#[tokio::test]
async fn test_failing_subscribers_do_not_prevent_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/broken/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slow-ok/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ok/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let subscriptions = format!(
        "releases.com.example.app = {dead},{uri}/broken/,{uri}/slow-ok/,{uri}/ok/\n",
        dead = dead_url()
    );
    let dispatcher = http_dispatcher(&subscriptions);

    assert_eq!(dispatcher.notify(&stored_event()), 4);
    assert!(dispatcher.shutdown(Duration::from_secs(10)).await);
}

#[tokio::test]
async fn test_empty_configuration_makes_no_http_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = http_dispatcher("");

    assert_eq!(dispatcher.notify(&stored_event()), 0);
    assert!(dispatcher.shutdown(Duration::from_secs(5)).await);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_default_only_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/default/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let subscriptions = format!(
        "snapshots = http://unused/\nwebhooks.default = {}/default/\nwebhooks.inherited = false\n",
        server.uri()
    );
    let dispatcher = http_dispatcher(&subscriptions);

    assert_eq!(dispatcher.notify(&stored_event()), 1);
    assert!(dispatcher.shutdown(Duration::from_secs(5)).await);
}
