use lg_thinq_ac::{CommandLogMode, CommandVerb, DevicePort, Error, Protocol, ThinqClient};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn client_for(server: &MockServer) -> ThinqClient {
    ThinqClient::builder(server.uri())
        .access_token("token-123")
        .user_number("user-1")
        .build()
}

fn ok_envelope(result: Value) -> Value {
    json!({ "resultCode": "0000", "result": result })
}

#[tokio::test]
async fn fetch_snapshot_parses_envelope() {
    init_tracing();
    let server = MockServer::start().await;
    let body = ok_envelope(json!({
        "snapshot": {
            "airState.operation": 1,
            "airState.tempState.target": 22.5,
        }
    }));
    Mock::given(method("GET"))
        .and(path("/service/devices/device-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let snapshot = client.fetch_snapshot("device-1", Protocol::Thinq2).await.unwrap();
    assert_eq!(snapshot.number("airState.operation"), Some(1.0));
    assert_eq!(snapshot.number("airState.tempState.target"), Some(22.5));
}

#[tokio::test]
async fn fetch_snapshot_rejects_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/devices/device-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"resultCode": "0102", "result": null})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_snapshot("device-1", Protocol::Thinq2).await.unwrap_err();
    match err {
        Error::Command { code, .. } => assert_eq!(code, "0102"),
        other => panic!("expected Command error, got {other:?}"),
    }
}

#[tokio::test]
async fn send_command_posts_control_sync_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/service/devices/device-1/control-sync"))
        .and(body_string_contains("basicCtrl"))
        .and(body_string_contains("airState.opMode"))
        .and(body_string_contains("\"command\":\"Set\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .send_command("device-1", CommandVerb::Set, "airState.opMode", json!(0))
        .await
        .unwrap();
}

#[tokio::test]
async fn send_command_surfaces_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/service/devices/device-1/control-sync"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"resultCode": "0106", "result": null})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .send_command("device-1", CommandVerb::Operation, "airState.operation", json!(1))
        .await
        .unwrap_err();
    match err {
        Error::Command { data_key, code } => {
            assert_eq!(data_key, "airState.operation");
            assert_eq!(code, "0106");
        }
        other => panic!("expected Command error, got {other:?}"),
    }
}

#[tokio::test]
async fn renew_monitoring_posts_event_enable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/service/devices/device-1/control"))
        .and(body_string_contains("allEventEnable"))
        .and(body_string_contains("airState.mon.timeout"))
        .and(body_string_contains("70"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.renew_monitoring("device-1").await.unwrap();
}

#[tokio::test]
async fn legacy_snapshot_is_translated() {
    let server = MockServer::start().await;
    let body = json!({
        "lgedmRoot": {
            "returnCd": "0000",
            "returnData": {
                "Operation": "1",
                "OpMode": "0",
                "TempCur": "23",
                "WindStrength": "4"
            }
        }
    });
    Mock::given(method("POST"))
        .and(path("/rti/rtiResult"))
        .and(body_string_contains("device-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let snapshot = client.fetch_snapshot("device-1", Protocol::Thinq1).await.unwrap();
    assert_eq!(snapshot.number("airState.operation"), Some(1.0));
    assert_eq!(snapshot.number("airState.opMode"), Some(0.0));
    assert_eq!(snapshot.number("airState.tempState.current"), Some(23.0));
    assert!(!snapshot.contains("returnCd"));
}

#[tokio::test]
async fn legacy_command_carries_lease_and_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rti/rtiControl"))
        .and(body_string_contains("work-42"))
        .and(body_string_contains("Start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lgedmRoot": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .send_legacy_command("device-1", "work-42", "airState.operation", json!("Start"))
        .await
        .unwrap();
}

#[tokio::test]
async fn http_errors_map_to_http_variant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/devices/device-1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_snapshot("device-1", Protocol::Thinq2).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn command_log_captures_commands_as_ndjson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/service/devices/device-1/control-sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({}))))
        .mount(&server)
        .await;

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let log_path = tmp.path().to_str().unwrap().to_string();
    let client = ThinqClient::builder(server.uri())
        .access_token("token-123")
        .command_log(CommandLogMode::Full, &log_path)
        .build();

    client
        .send_command("device-1", CommandVerb::Set, "airState.opMode", json!(2))
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let line: Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(line["dir"], "cmd");
    assert_eq!(line["dataKey"], "airState.opMode");
    assert!(line["ts"].as_str().is_some());
}
