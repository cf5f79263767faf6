//! Wire-format tests for ferry-core payloads.

use ferry_core::agent::{Agent, AgentAddress, AgentState};
use ferry_core::build::{Build, BuildOutcome, BuildState};
use ferry_core::ids::*;
use ferry_core::protocol::*;
use pretty_assertions::assert_eq;

#[test]
fn test_status_response_shape() {
    let mut build = Build::new(BuildId::new(0), "abc123", "npm test");
    build.state = BuildState::Success;
    build.stdout = "ok\n".to_string();

    let json = serde_json::to_value(StatusResponse {
        builds: vec![build],
    })
    .expect("serialize");

    let first = &json["builds"][0];
    assert_eq!(first["id"], 0);
    assert_eq!(first["revision"], "abc123");
    assert_eq!(first["hash"], "abc123");
    assert_eq!(first["command"], "npm test");
    assert_eq!(first["state"], "success");
    assert_eq!(first["stdout"], "ok\n");
    assert!(first["startedAt"].is_null());
}

#[test]
fn test_status_response_parses_back() {
    let build = Build::new(BuildId::new(4), "r1", "c1");
    let json = serde_json::to_string(&StatusResponse {
        builds: vec![build.clone()],
    })
    .expect("serialize");

    let parsed: StatusResponse = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed.builds, vec![build]);
}

#[test]
fn test_agent_list_shape() {
    let mut agent = Agent::new(AgentId::new(1), AgentAddress::new("h1", 7001));
    agent.state = AgentState::Error;

    let json = serde_json::to_value(AgentListResponse {
        agents: vec![agent],
    })
    .expect("serialize");

    assert_eq!(json["agents"][0]["id"], 1);
    assert_eq!(json["agents"][0]["state"], "error");
    assert!(json["agents"][0]["lastSeenAt"].is_null());
}

#[test]
fn test_report_defaults_missing_streams() {
    let report: BuildResultReport =
        serde_json::from_str(r#"{"buildId":9,"state":"success"}"#).expect("deserialize");

    assert_eq!(report.state, BuildOutcome::Success);
    assert!(report.stdout.is_empty());
    assert!(report.stderr.is_empty());
}

#[test]
fn test_register_request_from_address() {
    let address = AgentAddress::new("10.0.0.5", 8081);
    let request = RegisterAgentRequest::from(&address);
    assert_eq!(request.address(), address);
    assert_eq!(
        serde_json::to_value(&request).expect("serialize"),
        serde_json::json!({"host": "10.0.0.5", "port": 8081})
    );
}
