//! Vercel REST tools.
//!
//! Every tool here is a plain `OperationSpec`. When a team id is configured it
//! is attached to every request through the profile's default query, so none
//! of the schemas below mention it.

use crate::api::{AuthScheme, BackendProfile};
use crate::tools::operation::{FieldMapping, OperationSpec, ResponseShape};
use crate::tools::{ObjectSchema, RegistryError, ToolRegistry};

pub const BASE_URL: &str = "https://api.vercel.com";
pub const TEAM_QUERY_PARAM: &str = "teamId";

pub fn profile(team_id: Option<&str>) -> BackendProfile {
    let profile = BackendProfile::new("vercel", BASE_URL).with_auth(AuthScheme::Bearer);
    match team_id {
        Some(team) => profile.with_default_query(TEAM_QUERY_PARAM, team),
        None => profile,
    }
}

pub fn registry() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder().operations(operations()).build()
}

fn project() -> ObjectSchema {
    ObjectSchema::new()
        .string("project", "Project id or name")
        .required(&["project"])
}

const ENV_TYPES: &[&str] = &["plain", "encrypted", "sensitive", "secret", "system"];

pub fn operations() -> Vec<OperationSpec> {
    vec![
        // Projects
        OperationSpec::get(
            "list_projects",
            "List projects",
            ObjectSchema::new()
                .string("search", "Filter projects by name")
                .integer("limit", "Maximum number of projects to return"),
            "/v9/projects",
        )
        .query(&["search", "limit"]),
        OperationSpec::get(
            "get_project",
            "Get a project by id or name",
            project(),
            "/v9/projects/{project}",
        ),
        OperationSpec::post(
            "create_project",
            "Create a new project",
            ObjectSchema::new()
                .string("name", "Project name")
                .string("framework", "Framework preset (e.g. nextjs)")
                .string("rootDirectory", "Directory of the app inside the repository")
                .object("gitRepository", "Git repository to connect ({ type, repo })")
                .required(&["name"]),
            "/v10/projects",
        )
        .body(&["name", "framework", "rootDirectory", "gitRepository"]),
        OperationSpec::delete(
            "delete_project",
            "Delete a project",
            project(),
            "/v9/projects/{project}",
        )
        .respond(ResponseShape::Confirmation("Deleted project {project}.")),
        // Deployments
        OperationSpec::get(
            "list_deployments",
            "List deployments, newest first",
            ObjectSchema::new()
                .string("projectId", "Only deployments of this project")
                .enumeration("target", "Deployment target", &["production", "preview"])
                .enumeration(
                    "state",
                    "Deployment state",
                    &["BUILDING", "ERROR", "INITIALIZING", "QUEUED", "READY", "CANCELED"],
                )
                .integer("limit", "Maximum number of deployments to return"),
            "/v6/deployments",
        )
        .query(&["projectId", "target", "state", "limit"]),
        OperationSpec::get(
            "get_deployment",
            "Get a deployment by id or URL",
            ObjectSchema::new()
                .string("deployment", "Deployment id or hostname")
                .required(&["deployment"]),
            "/v13/deployments/{deployment}",
        ),
        OperationSpec::post(
            "create_deployment",
            "Create a deployment from a connected Git source",
            ObjectSchema::new()
                .string("name", "Project name")
                .string("project", "Project id (overrides name lookup)")
                .enumeration("target", "Deployment target", &["production", "staging"])
                .object("gitSource", "Git source ({ type, repoId, ref })")
                .required(&["name"]),
            "/v13/deployments",
        )
        .body(&["name", "project", "target", "gitSource"]),
        OperationSpec::patch(
            "cancel_deployment",
            "Cancel a deployment that is still building",
            ObjectSchema::new()
                .string("deployment", "Deployment id")
                .required(&["deployment"]),
            "/v12/deployments/{deployment}/cancel",
        ),
        // Environment variables
        OperationSpec::get(
            "list_env_vars",
            "List environment variables of a project",
            project().boolean("decrypt", "Return decrypted values"),
            "/v9/projects/{project}/env",
        )
        .query(&["decrypt"]),
        OperationSpec::post(
            "create_env_var",
            "Create an environment variable on a project",
            project()
                .string("key", "Variable name")
                .string("value", "Variable value")
                .enumeration("type", "Storage type", ENV_TYPES)
                .array("target", "Environments the variable applies to (production, preview, development)", "string")
                .string("gitBranch", "Only apply to this preview branch")
                .required(&["key", "value", "target"]),
            "/v10/projects/{project}/env",
        )
        .body(&["key", "value", "target", "gitBranch"])
        // Later fields overwrite earlier ones, so an explicit `type` wins.
        .body_field(FieldMapping::constant("type", "encrypted"))
        .body(&["type"]),
        OperationSpec::delete(
            "delete_env_var",
            "Delete an environment variable from a project",
            project()
                .string("envId", "Environment variable id")
                .required(&["envId"]),
            "/v9/projects/{project}/env/{envId}",
        )
        .respond(ResponseShape::Confirmation(
            "Deleted environment variable {envId} from {project}.",
        )),
        // Domains
        OperationSpec::get(
            "list_domains",
            "List domains registered or added to the account",
            ObjectSchema::new().integer("limit", "Maximum number of domains to return"),
            "/v5/domains",
        )
        .query(&["limit"]),
        OperationSpec::get(
            "check_domain",
            "Check whether a domain is configured on the account",
            ObjectSchema::new()
                .string("domain", "Domain name")
                .required(&["domain"]),
            "/v5/domains/{domain}",
        )
        .respond(ResponseShape::Exists {
            found: "{domain} is configured.",
            missing: "{domain} is not configured.",
        }),
        // Account
        OperationSpec::get(
            "get_user",
            "Get the authenticated user",
            ObjectSchema::new(),
            "/v2/user",
        )
        .respond(ResponseShape::Field("/user")),
    ]
}
