//! Wire format tests for request and response models.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;

use mptcpkit_api::models::{
    IpResponse, PingResponse, STATUS_OK, ServiceKeyResponse, WanUpdateRequest, WanUpdateResponse,
};

#[test]
fn test_wan_update_request_keeps_order() {
    let request: WanUpdateRequest =
        serde_json::from_value(json!({"ips": ["5.6.7.8", "1.2.3.4"]})).unwrap();
    assert_eq!(request.ips, vec!["5.6.7.8", "1.2.3.4"]);
}

#[test]
fn test_wan_update_request_requires_ips() {
    let result: Result<WanUpdateRequest, _> = serde_json::from_value(json!({}));
    let err = result.unwrap_err().to_string();
    assert!(err.contains("missing field `ips`"));
}

#[test]
fn test_wan_update_request_rejects_non_strings() {
    let result: Result<WanUpdateRequest, _> = serde_json::from_value(json!({"ips": [1, 2]}));
    assert!(result.is_err());
}

#[test]
fn test_wan_update_request_ignores_unknown_fields() {
    let request: WanUpdateRequest =
        serde_json::from_value(json!({"ips": ["1.2.3.4"], "extra": true})).unwrap();
    assert_eq!(request.ips.len(), 1);
}

#[test]
fn test_wan_update_response_shape() {
    let value = serde_json::to_value(WanUpdateResponse::ok("done\n".to_string())).unwrap();
    assert_eq!(value, json!({"status": "ok", "output": "done\n"}));
}

#[test]
fn test_service_key_response_shape() {
    let value = serde_json::to_value(ServiceKeyResponse::ok("Y".to_string())).unwrap();
    assert_eq!(value, json!({"status": STATUS_OK, "key": "Y"}));
}

#[test]
fn test_ping_response_shape() {
    let value = serde_json::to_value(PingResponse::pong()).unwrap();
    assert_eq!(value, json!({"message": "pong"}));
}

#[test]
fn test_ip_response_shape() {
    let value = serde_json::to_value(IpResponse {
        ip: "unknown".to_string(),
    })
    .unwrap();
    assert_eq!(value, json!({"ip": "unknown"}));
}
