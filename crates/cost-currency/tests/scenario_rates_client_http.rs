use chrono::NaiveDate;
use cost_currency::{RatesApi, RatesClient, RatesError};
use httpmock::prelude::*;
use serde_json::json;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn timeseries_is_requested_and_decoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/timeseries")
                .query_param("base", "USD")
                .query_param("symbols", "EUR,NOK")
                .query_param("start_date", "2024-01-01")
                .query_param("end_date", "2024-01-02")
                .query_param("access_key", "tok");
            then.status(200).json_body(json!({
                "success": true,
                "rates": {
                    "2024-01-01": { "EUR": 0.905, "NOK": 10.16 },
                    "2024-01-02": { "EUR": 0.911, "NOK": 10.25 }
                }
            }));
        })
        .await;

    let c = RatesClient::new(&server.base_url(), Some("tok".into())).unwrap();
    let rates = c
        .rates_period("USD", "EUR,NOK", d("2024-01-01"), d("2024-01-02"))
        .await
        .unwrap();
    mock.assert_async().await;

    assert_eq!(rates.len(), 2);
    let first = rates.get(&d("2024-01-01")).unwrap();
    assert_eq!(first.eur, 0.905);
    assert_eq!(first.nok, 10.16);
}

#[tokio::test]
async fn success_false_body_is_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/timeseries");
            then.status(200).json_body(json!({
                "success": false,
                "error": { "code": 101, "type": "missing_access_key" }
            }));
        })
        .await;

    let c = RatesClient::new(&server.base_url(), None).unwrap();
    let err = c
        .rates_period("USD", "EUR,NOK", d("2024-01-01"), d("2024-01-02"))
        .await
        .unwrap_err();
    match err {
        RatesError::Api { status, message } => {
            assert_eq!(status, 200);
            assert!(message.contains("missing_access_key"), "{message}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_is_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/timeseries");
            then.status(503).body("maintenance");
        })
        .await;

    let c = RatesClient::new(&server.base_url(), None).unwrap();
    let err = c
        .rates_period("USD", "EUR,NOK", d("2024-01-01"), d("2024-01-02"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RatesError::Api {
            status: 503,
            message: "maintenance".into()
        }
    );
}

#[tokio::test]
async fn missing_symbol_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/timeseries");
            then.status(200)
                .json_body(json!({ "rates": { "2024-01-01": { "EUR": 0.9 } } }));
        })
        .await;

    let c = RatesClient::new(&server.base_url(), None).unwrap();
    let err = c
        .rates_period("USD", "EUR,NOK", d("2024-01-01"), d("2024-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, RatesError::Decode(_)), "{err:?}");
}
