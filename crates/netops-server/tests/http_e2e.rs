//! HTTP end-to-end tests: a real netops server runs in-process on a random
//! port over the in-memory shaping backend, driven by a real HTTP client.

use netops_server::{TestServer, DEADLINE_HEADER};
use netops_tc::{Handle, PortMatch, TcOpKind};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

fn agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

fn post(server: &TestServer, path: &str, body: &str, headers: &[(&str, String)]) -> (u16, Value) {
    let mut req = agent()
        .post(format!("{}{path}", server.url))
        .header("Content-Type", "application/json");
    for (name, value) in headers {
        req = req.header(*name, value.as_str());
    }
    let mut resp = req.send(body).unwrap();
    let status = resp.status().as_u16();
    let text = resp.body_mut().read_to_string().unwrap();
    (status, serde_json::from_str(&text).unwrap())
}

fn get(server: &TestServer, path: &str) -> (u16, Value) {
    let mut resp = agent().get(format!("{}{path}", server.url)).call().unwrap();
    let status = resp.status().as_u16();
    let text = resp.body_mut().read_to_string().unwrap();
    (status, serde_json::from_str(&text).unwrap())
}

fn qos_body(slice_id: &str, slice_name: &str, ceil: u32) -> String {
    json!({
        "slice_id": slice_id,
        "slice_name": slice_name,
        "qos_profile_name": "gold",
        "tc_type": "BANDWIDTH_CONTROL",
        "class_type": "HTB",
        "bw_ceiling": ceil,
        "bw_guaranteed": ceil / 5,
        "priority": 1,
        "dscp_class": "AF11"
    })
    .to_string()
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

#[test]
fn http_e2e_health() {
    let server = TestServer::start().unwrap();
    let (status, body) = get(&server, "/health");
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[test]
fn http_e2e_qos_gateway_delete_flow() {
    let server = TestServer::start().unwrap();

    let (status, body) = post(&server, "/v1/slice-qos-profile", &qos_body("s1", "red", 5000), &[]);
    assert_eq!(status, 200);
    assert_eq!(body["status_msg"], "Slice QoS policy enforced successfully");

    let context = json!({
        "slice_id": "s1",
        "local_slice_gw_id": "gw-1",
        "local_slice_gw_host_type": "SLICE_GW_CLIENT",
        "local_slice_gw_node_port": "31000",
        "remote_slice_gw_node_port": "32000"
    })
    .to_string();
    let (status, body) = post(&server, "/v1/connection-context", &context, &[]);
    assert_eq!(status, 200);
    assert_eq!(
        body["status_msg"],
        "Connection Context Updated Successfully in netops pod"
    );

    post(&server, "/v1/slice-qos-profile", &qos_body("s1", "red", 5000), &[]);
    let filters = server.backend.filters();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].port, PortMatch::Destination(32000));
    assert_eq!(filters[0].flowid, Handle::new(17, 12));

    let (status, slices) = get(&server, "/v1/slices");
    assert_eq!(status, 200);
    assert_eq!(slices[0]["slice_id"], "s1");
    assert_eq!(slices[0]["parent_class_fq_id"], "17:11");
    assert_eq!(slices[0]["gateways"][0]["tc_configured"], true);

    let (status, slice) = get(&server, "/v1/slices/s1");
    assert_eq!(status, 200);
    assert_eq!(slice["tc"]["bw_ceiling"], 5000);

    let event = json!({ "slice_name": "red", "event": "EV_DELETE" }).to_string();
    let (status, body) = post(&server, "/v1/slice-lifecycle-event", &event, &[]);
    assert_eq!(status, 200);
    assert_eq!(
        body["status_msg"],
        "Slice life cycle event handled successfully"
    );
    assert!(!server.backend.has_root());

    let (_, slices) = get(&server, "/v1/slices");
    assert_eq!(slices, json!([]));
}

#[test]
fn http_e2e_empty_messages_are_rejected() {
    let server = TestServer::start().unwrap();

    let (status, body) = post(&server, "/v1/slice-qos-profile", "", &[]);
    assert_eq!(status, 400);
    assert_eq!(body["code"], "InvalidArgument");
    assert_eq!(body["message"], "Qos profile message is empty");

    let (status, body) = post(&server, "/v1/slice-lifecycle-event", "null", &[]);
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Slice lifecycle message is empty");

    let (status, body) = post(&server, "/v1/connection-context", "", &[]);
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Connection Context is Empty");

    let context = json!({ "slice_id": "s1", "local_slice_gw_host_type": "SLICE_GW_SERVER" });
    let (status, body) = post(&server, "/v1/connection-context", &context.to_string(), &[]);
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Invalid Slice Gateway Node Port");

    assert!(server.backend.history().is_empty());
}

#[test]
fn http_e2e_malformed_json_is_bad_request() {
    let server = TestServer::start().unwrap();
    let (status, body) = post(&server, "/v1/slice-qos-profile", "{oops", &[]);
    assert_eq!(status, 400);
    assert_eq!(body["code"], "InvalidArgument");
}

#[test]
fn http_e2e_expired_deadline_is_canceled() {
    let server = TestServer::start().unwrap();
    let past = (now_ms() - 1_000).to_string();

    let (status, body) = post(
        &server,
        "/v1/slice-qos-profile",
        &qos_body("s1", "red", 5000),
        &[(DEADLINE_HEADER, past.clone())],
    );
    assert_eq!(status, 499);
    assert_eq!(body["code"], "Canceled");
    assert_eq!(body["message"], "Client canceled, ignoring qos update message.");

    let (status, body) = post(&server, "/v1/connection-context", "", &[(DEADLINE_HEADER, past)]);
    assert_eq!(status, 499);
    assert_eq!(body["message"], "Client cancelled, abandoning.");
    assert!(server.backend.history().is_empty());

    let future = (now_ms() + 60_000).to_string();
    let (status, _) = post(
        &server,
        "/v1/slice-qos-profile",
        &qos_body("s1", "red", 5000),
        &[(DEADLINE_HEADER, future)],
    );
    assert_eq!(status, 200);
}

#[test]
fn http_e2e_backend_failure_is_internal() {
    let server = TestServer::start().unwrap();
    server.backend.fail_next(TcOpKind::AddRootQdisc);

    let (status, body) = post(&server, "/v1/slice-qos-profile", &qos_body("s1", "red", 5000), &[]);
    assert_eq!(status, 500);
    assert_eq!(body["code"], "Internal");
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Failed to enforce QoS policy: "));

    let (status, _) = post(&server, "/v1/slice-qos-profile", &qos_body("s1", "red", 5000), &[]);
    assert_eq!(status, 200);
}

#[test]
fn http_e2e_unknown_routes_and_methods() {
    let server = TestServer::start().unwrap();

    let (status, body) = get(&server, "/v2/nothing");
    assert_eq!(status, 404);
    assert_eq!(body["code"], "NotFound");

    let (status, _) = get(&server, "/v1/slice-qos-profile");
    assert_eq!(status, 405);

    let (status, _) = post(&server, "/health", "", &[]);
    assert_eq!(status, 405);

    let (status, body) = get(&server, "/v1/slices/ghost");
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Failed to read slice state: SliceId ghost is not found");
}
