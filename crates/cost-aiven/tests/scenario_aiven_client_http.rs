//! AivenClient against a local HTTP mock (no network).
//!
//! Covers auth header, paths, decoding of all three endpoints and the
//! mapping of non-2xx / malformed bodies onto `ProviderError`.

use cost_aiven::{AivenClient, BillingApi, InvoiceStatus, LineType, ProviderError};
use httpmock::prelude::*;
use serde_json::json;

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> AivenClient {
    AivenClient::new_with_base_url(&server.base_url(), TOKEN.to_string()).unwrap()
}

#[tokio::test]
async fn list_invoices_sends_auth_and_decodes() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/billing-group/bg-1/invoice")
                .header("authorization", "aivenv1 test-token");
            then.status(200).json_body(json!({
                "invoices": [
                    { "invoice_number": "INV-1", "total_inc_vat": "120.00", "state": "paid" },
                    { "invoice_number": "INV-2", "total_inc_vat": "80.50", "state": "mailed" },
                    { "invoice_number": "INV-3", "total_inc_vat": "1.00", "state": "estimate" }
                ]
            }));
        })
        .await;

    let invoices = client(&server).list_invoices("bg-1").await.unwrap();
    mock.assert_async().await;

    assert_eq!(invoices.len(), 3);
    assert_eq!(invoices[0].id, "INV-1");
    assert_eq!(invoices[0].status, InvoiceStatus::Paid);
    assert_eq!(invoices[1].total_inc_vat, "80.50");
    assert_eq!(invoices[2].status, InvoiceStatus::Estimate);
}

#[tokio::test]
async fn invoice_lines_decode() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/billing-group/bg-1/invoice/INV-42/lines");
            then.status(200).json_body(json!({
                "lines": [
                    {
                        "timestamp_begin": "2024-03-01T00:00:00Z",
                        "timestamp_end": "2024-03-31T23:59:59Z",
                        "line_total_local": "12.50",
                        "local_currency": "eur",
                        "service_type": "pg",
                        "service_name": "pg-main",
                        "project_name": "team-a",
                        "line_type": "service_charge"
                    },
                    {
                        "timestamp_begin": "2024-03-01T00:00:00Z",
                        "timestamp_end": "2024-03-31T23:59:59Z",
                        "line_total_local": "-5.00",
                        "local_currency": "eur",
                        "service_type": null,
                        "service_name": null,
                        "project_name": null,
                        "line_type": "credit_consumption"
                    }
                ]
            }));
        })
        .await;

    let lines = client(&server).invoice_lines("bg-1", "INV-42").await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].cost, "12.50");
    assert_eq!(lines[0].service_name, "pg-main");
    assert_eq!(lines[0].line_type, LineType::ServiceCharge);
    assert_eq!(lines[1].line_type, LineType::CreditConsumption);
    assert_eq!(lines[1].project_name, "");
}

#[tokio::test]
async fn service_tags_decode() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/project/team-a/service/pg-main/tags");
            then.status(200).json_body(json!({
                "tags": { "tenant": "", "team": "team-a-owners", "environment": "prod" }
            }));
        })
        .await;

    let tags = client(&server).service_tags("team-a", "pg-main").await.unwrap();
    assert_eq!(tags.team, "team-a-owners");
    assert_eq!(tags.environment, "prod");
    assert_eq!(tags.tenant, "");
}

#[tokio::test]
async fn missing_tags_object_is_empty_tags() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/project/p/service/s/tags");
            then.status(200).json_body(json!({}));
        })
        .await;

    let tags = client(&server).service_tags("p", "s").await.unwrap();
    assert_eq!(tags, cost_aiven::Tags::default());
}

#[tokio::test]
async fn non_2xx_maps_to_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/project/p/service/gone/tags");
            then.status(404).body("{\"message\":\"Service not found\"}");
        })
        .await;

    let err = client(&server).service_tags("p", "gone").await.unwrap_err();
    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("Service not found"), "{message}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_maps_to_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/billing-group/bg-1/invoice");
            then.status(200).body("not json");
        })
        .await;

    let err = client(&server).list_invoices("bg-1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn connection_refused_maps_to_transport_error() {
    // Nothing listens on port 9 locally.
    let c = AivenClient::new_with_base_url("http://127.0.0.1:9", TOKEN.to_string()).unwrap();
    let err = c.list_invoices("bg-1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)), "{err:?}");
}
