use std::collections::HashSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::api::{ApiError, AuthScheme, HttpMethod};
use crate::backends::{github, vercel, Backend};
use crate::config::ServerConfig;
use crate::testing::StubClient;
use crate::tools::operation::RequestKind;
use crate::tools::{DispatchState, Dispatcher, OperationSpec, ToolCallInput};

fn dispatcher_for(backend: Backend, client: Arc<StubClient>) -> Dispatcher {
    Dispatcher::new(Arc::new(backend.registry().unwrap()), client)
}

fn path_placeholders(path: &str) -> Vec<String> {
    path.split('{')
        .skip(1)
        .filter_map(|rest| rest.split_once('}'))
        .map(|(name, _)| name.trim_end_matches('*').to_string())
        .collect()
}

fn all_operations() -> Vec<OperationSpec> {
    github::operations()
        .into_iter()
        .chain(vercel::operations())
        .collect()
}

#[test]
fn every_backend_registry_builds_with_unique_names() {
    for backend in Backend::ALL {
        let registry = backend.registry().unwrap_or_else(|e| panic!("{backend}: {e}"));
        assert!(!registry.is_empty());
        let names: HashSet<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names.len(), registry.len(), "{backend} has duplicate names");
    }
}

#[test]
fn path_placeholders_are_declared_and_required() {
    for spec in all_operations() {
        let RequestKind::Rest { path, .. } = &spec.request().kind else {
            continue;
        };
        let descriptor = spec.descriptor();
        let required: Vec<&str> = descriptor.required_fields().collect();
        for name in path_placeholders(path) {
            assert!(
                descriptor.property(&name).is_some(),
                "{}: '{name}' is not a declared property",
                descriptor.name
            );
            assert!(
                required.contains(&name.as_str()),
                "{}: '{name}' is used in the path but not required",
                descriptor.name
            );
        }
    }
}

#[tokio::test]
async fn every_listed_tool_is_dispatchable() {
    for backend in Backend::ALL {
        let client = Arc::new(StubClient::new());
        let dispatcher = dispatcher_for(backend, client);
        for tool in dispatcher.list_tools() {
            let outcome = dispatcher
                .dispatch(ToolCallInput::new(tool.name.clone(), json!({})))
                .await;
            assert_ne!(
                outcome.state,
                DispatchState::UnknownTool,
                "{backend}/{} is listed but not dispatchable",
                tool.name
            );
        }
    }
}

#[test]
fn backend_names_parse_case_insensitively() {
    assert_eq!("GitHub".parse::<Backend>(), Ok(Backend::GitHub));
    assert_eq!(" vercel ".parse::<Backend>(), Ok(Backend::Vercel));
    assert!("gitlab".parse::<Backend>().is_err());
    assert_eq!(Backend::names(), vec!["github", "vercel"]);
}

#[test]
fn github_profile_pins_api_version() {
    let profile = github::profile();
    assert_eq!(profile.base_url, github::BASE_URL);
    assert_eq!(profile.auth, AuthScheme::Bearer);
    assert!(profile.has_header("accept"));
    assert!(profile
        .headers
        .contains(&("X-GitHub-Api-Version".to_string(), "2022-11-28".to_string())));
}

#[test]
fn vercel_profile_scopes_to_team_when_configured() {
    assert!(vercel::profile(None).default_query.is_empty());
    assert_eq!(
        vercel::profile(Some("team_42")).default_query,
        vec![("teamId".to_string(), "team_42".to_string())]
    );
}

#[test]
fn configured_base_url_and_tenant_reach_the_profile() {
    let env = |key: &str| match key {
        "VERCEL_TEAM_ID" => Some("team_7".to_string()),
        "TOOLBRIDGE_BASE_URL" => Some("http://localhost:4010".to_string()),
        _ => None,
    };
    let args = vec!["vercel".to_string(), "tok".to_string()];
    let config = ServerConfig::from_sources(&args, env).unwrap();

    let profile = config.backend.profile(&config);
    assert_eq!(profile.base_url, "http://localhost:4010");
    assert_eq!(
        profile.default_query,
        vec![("teamId".to_string(), "team_7".to_string())]
    );
}

#[tokio::test]
async fn create_branch_resolves_default_branch_first() {
    let client = Arc::new(
        StubClient::new()
            .then(Ok(json!({ "name": "r", "default_branch": "main" })))
            .then(Ok(json!({ "ref": "refs/heads/main", "object": { "sha": "abc123" } })))
            .then(Ok(json!({ "ref": "refs/heads/feature/x", "object": { "sha": "abc123" } }))),
    );
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    let result = dispatcher
        .call_tool(ToolCallInput::new(
            "create_branch",
            json!({ "owner": "o", "repo": "r", "branch": "feature/x" }),
        ))
        .await;
    assert!(!result.is_error(), "{}", result.joined_text());
    assert!(result.joined_text().contains("refs/heads/feature/x"));

    let requests = client.requests();
    let calls: Vec<(HttpMethod, &str)> = requests
        .iter()
        .map(|r| (r.method, r.path.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![
            (HttpMethod::Get, "/repos/o/r"),
            (HttpMethod::Get, "/repos/o/r/git/ref/heads/main"),
            (HttpMethod::Post, "/repos/o/r/git/refs"),
        ]
    );
    assert_eq!(
        requests[2].body,
        Some(json!({ "ref": "refs/heads/feature/x", "sha": "abc123" }))
    );
}

#[tokio::test]
async fn create_branch_from_explicit_source_skips_lookup() {
    let client = Arc::new(
        StubClient::new()
            .then(Ok(json!({ "object": { "sha": "def456" } })))
            .then(Ok(json!({ "ref": "refs/heads/hotfix" }))),
    );
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    dispatcher
        .call_tool(ToolCallInput::new(
            "create_branch",
            json!({ "owner": "o", "repo": "r", "branch": "hotfix", "from_branch": "release" }),
        ))
        .await;

    let paths: Vec<String> = client.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec!["/repos/o/r/git/ref/heads/release", "/repos/o/r/git/refs"]
    );
}

#[tokio::test]
async fn create_branch_stops_when_source_ref_is_missing() {
    let client = Arc::new(StubClient::new().then(Err(ApiError::Status {
        status: 404,
        body: "Not Found".to_string(),
    })));
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    let outcome = dispatcher
        .dispatch(ToolCallInput::new(
            "create_branch",
            json!({ "owner": "o", "repo": "r", "branch": "b", "from_branch": "nope" }),
        ))
        .await;

    assert_eq!(outcome.state, DispatchState::Failed);
    assert!(outcome.result.joined_text().contains("404"));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn create_branch_encodes_source_ref_segments() {
    let client = Arc::new(
        StubClient::new()
            .then(Ok(json!({ "object": { "sha": "fed789" } })))
            .then(Ok(json!({ "ref": "refs/heads/copy" }))),
    );
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    dispatcher
        .call_tool(ToolCallInput::new(
            "create_branch",
            json!({ "owner": "o", "repo": "r", "branch": "copy", "from_branch": "fix/#12 crash" }),
        ))
        .await;
    assert_eq!(
        client.requests()[0].path,
        "/repos/o/r/git/ref/heads/fix/%2312%20crash"
    );

    let outcome = dispatcher
        .dispatch(ToolCallInput::new(
            "create_branch",
            json!({ "owner": "..", "repo": "user", "branch": "b", "from_branch": "main" }),
        ))
        .await;
    assert_eq!(outcome.state, DispatchState::InvalidArguments);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn file_upload_is_base64_encoded() {
    let client = Arc::new(StubClient::new());
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    dispatcher
        .call_tool(ToolCallInput::new(
            "create_or_update_file",
            json!({
                "owner": "o",
                "repo": "r",
                "path": "src/main.rs",
                "content": "fn main() {}",
                "message": "init",
                "branch": "dev"
            }),
        ))
        .await;

    let request = client.last_request();
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.path, "/repos/o/r/contents/src/main.rs");
    assert_eq!(
        request.body,
        Some(json!({ "message": "init", "branch": "dev", "content": "Zm4gbWFpbigpIHt9" }))
    );
}

#[tokio::test]
async fn search_maps_query_to_q() {
    let client = Arc::new(StubClient::returning(json!({ "total_count": 0 })));
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    let result = dispatcher
        .call_tool(ToolCallInput::new(
            "search_repositories",
            json!({ "query": "language:rust", "per_page": 10 }),
        ))
        .await;

    assert_eq!(result.joined_text(), r#"{"total_count":0}"#);
    assert_eq!(
        client.last_request().query,
        vec![
            ("q".to_string(), json!("language:rust")),
            ("per_page".to_string(), json!(10)),
        ]
    );
}

#[tokio::test]
async fn env_var_type_defaults_to_encrypted() {
    let client = Arc::new(StubClient::new());
    let dispatcher = dispatcher_for(Backend::Vercel, client.clone());
    let base = json!({ "project": "web", "key": "API_URL", "value": "https://x", "target": ["production"] });

    dispatcher
        .call_tool(ToolCallInput::new("create_env_var", base.clone()))
        .await;
    let body = client.last_request().body.unwrap();
    assert_eq!(body["type"], "encrypted");
    assert_eq!(body["target"], json!(["production"]));

    let mut plain = base;
    plain["type"] = Value::from("plain");
    dispatcher
        .call_tool(ToolCallInput::new("create_env_var", plain))
        .await;
    assert_eq!(client.last_request().body.unwrap()["type"], "plain");
    assert_eq!(client.last_request().path, "/v10/projects/web/env");
}

#[tokio::test]
async fn domain_check_reports_absence_without_error() {
    let client = Arc::new(StubClient::failing(ApiError::Status {
        status: 404,
        body: r#"{"error":{"code":"not_found"}}"#.to_string(),
    }));
    let dispatcher = dispatcher_for(Backend::Vercel, client);

    let result = dispatcher
        .call_tool(ToolCallInput::new("check_domain", json!({ "domain": "example.com" })))
        .await;
    assert!(!result.is_error());
    assert_eq!(result.joined_text(), "example.com is not configured.");
}

#[tokio::test]
async fn missing_repository_coordinates_never_reach_the_network() {
    let client = Arc::new(StubClient::new());
    let dispatcher = dispatcher_for(Backend::GitHub, client.clone());

    for args in [json!({ "owner": "o" }), json!({ "repo": "r" })] {
        let outcome = dispatcher
            .dispatch(ToolCallInput::new("get_repository", args))
            .await;
        assert_eq!(outcome.state, DispatchState::InvalidArguments);
    }
    assert_eq!(client.calls(), 0);
}
