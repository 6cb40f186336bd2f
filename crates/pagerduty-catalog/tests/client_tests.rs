//! PagerDuty REST client: authorization, pagination and error mapping.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use pagerduty_catalog::config::PagerDutyConfig;
use pagerduty_catalog::{PagerDutyClient, PagerDutyError, ServiceDirectory};

mod helpers;
use helpers::mock_pagerduty::{service_json, short_timeout_client, MockPagerDuty, STATIC_TOKEN};

const ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

#[tokio::test]
async fn test_static_token_is_sent_in_token_format() {
    helpers::init_test_logging();
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .and(path("/services/P1"))
        .and(header("Authorization", format!("Token token={STATIC_TOKEN}").as_str()))
        .and(header("Accept", ACCEPT))
        .and(query_param("include[]", "integrations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "service": service_json("P1", "Checkout", Some("k1")) })),
        )
        .expect(1)
        .mount(mock.server())
        .await;

    let client = mock.client(mock.static_config());
    let service = client.get_service("P1", None).await.unwrap();

    assert_eq!(service.id, "P1");
    assert_eq!(service.name, "Checkout");
    assert_eq!(service.team_name, "Platform");
    assert_eq!(service.escalation_policy_name, "Primary");
    assert_eq!(service.account, "default");
    assert_eq!(service.backstage_integration_key(), Some("k1"));
}

#[tokio::test]
async fn test_oauth_token_is_sent_as_bearer() {
    let mock = MockPagerDuty::new().await;
    mock.mock_oauth_token("oauth-xyz", 3600).await;

    Mock::given(method("GET"))
        .and(path("/services/P1"))
        .and(header("Authorization", "Bearer oauth-xyz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "service": service_json("P1", "Checkout", None) })),
        )
        .expect(1)
        .mount(mock.server())
        .await;

    let client = mock.client(mock.oauth_config("acme"));
    client.get_service("P1", None).await.unwrap();
}

#[tokio::test]
async fn test_list_services_follows_pagination() {
    let mock = MockPagerDuty::new().await;
    mock.mock_services_page(
        0,
        vec![service_json("P1", "a", None), service_json("P2", "b", None)],
        true,
    )
    .await;
    mock.mock_services_page(2, vec![service_json("P3", "c", None)], false)
        .await;

    let client = mock.client(mock.static_config());
    let services = client.list_services(None).await.unwrap();

    let ids: Vec<&str> = services.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P3"]);
}

#[tokio::test]
async fn test_list_all_services_covers_every_account() {
    let mock = MockPagerDuty::new().await;

    for (token, id) in [("us-token", "PUS"), ("eu-token", "PEU")] {
        Mock::given(method("GET"))
            .and(path("/services"))
            .and(header("Authorization", format!("Token token={token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [service_json(id, id, None)],
                "more": false
            })))
            .expect(1)
            .mount(mock.server())
            .await;
    }

    let client = mock.client(mock.multi_config(&[("us", true, "us-token"), ("eu", false, "eu-token")]));
    let mut services = client.list_all_services().await.unwrap();
    services.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(services.len(), 2);
    assert_eq!((services[0].id.as_str(), services[0].account.as_str()), ("PEU", "eu"));
    assert_eq!((services[1].id.as_str(), services[1].account.as_str()), ("PUS", "us"));
}

#[tokio::test]
async fn test_integration_key_lookup_prefers_owning_service() {
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .and(query_param("query", "key-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [
                service_json("P1", "fuzzy match", Some("key-20")),
                service_json("P2", "owner", Some("key-2"))
            ],
            "more": false
        })))
        .mount(mock.server())
        .await;

    let client = mock.client(mock.static_config());
    let service = client
        .get_service_by_integration_key("key-2", None)
        .await
        .unwrap();
    assert_eq!(service.id, "P2");
}

#[tokio::test]
async fn test_integration_key_lookup_without_match_is_not_found() {
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "services": [],
            "more": false
        })))
        .mount(mock.server())
        .await;

    let client = mock.client(mock.static_config());
    let err = client
        .get_service_by_integration_key("missing", None)
        .await
        .unwrap_err();
    assert!(matches!(err, PagerDutyError::NotFound { status: 404, .. }));
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    for (status, check) in [
        (401u16, "auth"),
        (403, "auth"),
        (404, "not_found"),
        (500, "api"),
    ] {
        let mock = MockPagerDuty::new().await;
        mock.mock_services_status(status).await;

        let client = mock.client(mock.static_config());
        let err = client.list_services(None).await.unwrap_err();

        let matched = match check {
            "auth" => matches!(err, PagerDutyError::Auth { .. }),
            "not_found" => matches!(err, PagerDutyError::NotFound { .. }),
            _ => matches!(err, PagerDutyError::Api { .. }),
        };
        assert!(matched, "status {status} mapped to {err:?}");
        assert_eq!(err.status(), Some(status));
    }
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(mock.server())
        .await;

    let client = mock.client(mock.static_config());
    let err = client.list_services(None).await.unwrap_err();
    assert!(matches!(
        err,
        PagerDutyError::RateLimited {
            status: 429,
            retry_after_secs: Some(30)
        }
    ));
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .and(path("/services/P1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(mock.server())
        .await;

    let client = mock.client(mock.static_config());
    let err = client.get_service("P1", None).await.unwrap_err();
    assert!(matches!(err, PagerDutyError::Parse { status: 500, .. }));
}

#[tokio::test]
async fn test_missing_credential_makes_no_request() {
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(mock.server())
        .await;

    let config = PagerDutyConfig {
        api_base_url: Some(mock.uri()),
        ..Default::default()
    };
    let client = mock.client(config);
    let err = client.list_services(None).await.unwrap_err();
    assert!(matches!(err, PagerDutyError::MissingCredential { .. }));
}

#[tokio::test]
async fn test_missing_credential_names_the_default_account() {
    let mock = MockPagerDuty::new().await;

    // A single account is the default; an empty token leaves it without a credential.
    let client = mock.client(mock.multi_config(&[("eu-ops", false, "")]));
    let err = client.list_services(None).await.unwrap_err();
    match err {
        PagerDutyError::MissingCredential { account } => assert_eq!(account, "eu-ops"),
        other => panic!("expected MissingCredential, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_timeout_is_transport_error() {
    let mock = MockPagerDuty::new().await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "services": [], "more": false }))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(mock.server())
        .await;

    let client = PagerDutyClient::new(
        short_timeout_client(),
        mock.resolver(mock.static_config()),
    );
    let err = client.list_services(None).await.unwrap_err();
    match err {
        PagerDutyError::Transport { message, .. } => assert!(message.contains("timed out")),
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_listing_stops_at_service_cap() {
    let mock = MockPagerDuty::new().await;
    mock.mock_services_page(
        0,
        vec![service_json("P1", "a", None), service_json("P2", "b", None)],
        true,
    )
    .await;
    mock.mock_services_page(
        2,
        vec![service_json("P3", "c", None), service_json("P4", "d", None)],
        true,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "services": [], "more": false })))
        .expect(0)
        .mount(mock.server())
        .await;

    let client = mock.client(mock.static_config()).with_max_services(3);
    let services = client.list_services(None).await.unwrap();

    let ids: Vec<&str> = services.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P2", "P3"]);
}
