//! GitHub REST and GraphQL tools.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::api::{ApiClient, AuthScheme, BackendProfile};
use crate::core::tool::ToolDescriptor;
use crate::mcp::types::CallToolResult;
use crate::tools::operation::{
    encode_path, encode_segment, FieldMapping, OperationSpec, ResponseShape,
};
use crate::tools::types::{arg_str, opt_str, OperationAdapter, ToolError};
use crate::tools::{ObjectSchema, RegistryError, ToolRegistry};

pub const BASE_URL: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";

pub fn profile() -> BackendProfile {
    BackendProfile::new("github", BASE_URL)
        .with_auth(AuthScheme::Bearer)
        .with_header("Accept", "application/vnd.github+json")
        .with_header("X-GitHub-Api-Version", API_VERSION)
}

pub fn registry() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .operations(operations())
        .register(create_branch_descriptor(), CreateBranch)
        .build()
}

fn repo() -> ObjectSchema {
    ObjectSchema::new()
        .string("owner", "Repository owner (user or organization)")
        .string("repo", "Repository name")
        .required(&["owner", "repo"])
}

fn paged(schema: ObjectSchema) -> ObjectSchema {
    schema
        .integer("page", "Page number (1-based)")
        .integer("per_page", "Results per page (max 100)")
}

const ISSUE_STATES: &[&str] = &["open", "closed", "all"];
const DIRECTIONS: &[&str] = &["asc", "desc"];

pub fn operations() -> Vec<OperationSpec> {
    vec![
        // Repositories
        OperationSpec::get(
            "search_repositories",
            "Search for GitHub repositories",
            paged(ObjectSchema::new())
                .string("query", "Search query (GitHub search syntax)")
                .enumeration("sort", "Sort field", &["stars", "forks", "help-wanted-issues", "updated"])
                .enumeration("order", "Sort order", DIRECTIONS)
                .required(&["query"]),
            "/search/repositories",
        )
        .query_field(FieldMapping::renamed("q", "query"))
        .query(&["sort", "order", "page", "per_page"]),
        OperationSpec::get(
            "get_repository",
            "Get details of a repository",
            repo(),
            "/repos/{owner}/{repo}",
        ),
        OperationSpec::post(
            "create_repository",
            "Create a new repository for the authenticated user",
            ObjectSchema::new()
                .string("name", "Repository name")
                .string("description", "Repository description")
                .boolean("private", "Whether the repository is private")
                .boolean("auto_init", "Initialize with a README")
                .required(&["name"]),
            "/user/repos",
        )
        .body(&["name", "description", "private", "auto_init"]),
        OperationSpec::post(
            "fork_repository",
            "Fork a repository to your account or an organization",
            repo().string("organization", "Organization to fork into"),
            "/repos/{owner}/{repo}/forks",
        )
        .body(&["organization"]),
        OperationSpec::delete(
            "delete_repository",
            "Delete a repository. Requires the delete_repo scope",
            repo(),
            "/repos/{owner}/{repo}",
        )
        .respond(ResponseShape::Confirmation("Deleted repository {owner}/{repo}.")),
        OperationSpec::put(
            "star_repository",
            "Star a repository for the authenticated user",
            repo(),
            "/user/starred/{owner}/{repo}",
        )
        .respond(ResponseShape::Confirmation("Starred {owner}/{repo}.")),
        OperationSpec::get(
            "check_starred",
            "Check whether the authenticated user has starred a repository",
            repo(),
            "/user/starred/{owner}/{repo}",
        )
        .respond(ResponseShape::Exists {
            found: "{owner}/{repo} is starred.",
            missing: "{owner}/{repo} is not starred.",
        }),
        OperationSpec::get(
            "check_collaborator",
            "Check whether a user is a collaborator on a repository",
            repo()
                .string("username", "GitHub username")
                .required(&["username"]),
            "/repos/{owner}/{repo}/collaborators/{username}",
        )
        .respond(ResponseShape::Exists {
            found: "{username} is a collaborator on {owner}/{repo}.",
            missing: "{username} is not a collaborator on {owner}/{repo}.",
        }),
        // Contents
        OperationSpec::get(
            "get_file_contents",
            "Get the contents of a file or directory",
            repo()
                .string("path", "Path to the file or directory")
                .string("ref", "Branch, tag or commit SHA")
                .required(&["path"]),
            "/repos/{owner}/{repo}/contents/{path*}",
        )
        .query(&["ref"]),
        OperationSpec::put(
            "create_or_update_file",
            "Create or update a single file in a repository",
            repo()
                .string("path", "Path of the file")
                .string("content", "File content (plain text, encoded for you)")
                .string("message", "Commit message")
                .string("branch", "Branch to commit to")
                .string("sha", "Blob SHA of the file being replaced (required for updates)")
                .required(&["path", "content", "message"]),
            "/repos/{owner}/{repo}/contents/{path*}",
        )
        .body(&["message", "branch", "sha"])
        .body_field(FieldMapping::base64("content", "content")),
        OperationSpec::get(
            "get_readme_download_url",
            "Get the raw download URL of a repository README",
            repo().string("ref", "Branch, tag or commit SHA"),
            "/repos/{owner}/{repo}/readme",
        )
        .query(&["ref"])
        .respond(ResponseShape::Field("/download_url")),
        OperationSpec::get(
            "list_commits",
            "List commits of a branch",
            paged(repo())
                .string("sha", "Branch name or commit SHA to start from")
                .string("path", "Only commits touching this path")
                .string("author", "GitHub login or email address"),
            "/repos/{owner}/{repo}/commits",
        )
        .query(&["sha", "path", "author", "page", "per_page"]),
        // Issues
        OperationSpec::get(
            "list_issues",
            "List issues in a repository",
            paged(repo())
                .enumeration("state", "Issue state", ISSUE_STATES)
                .array("labels", "Only issues with all of these labels", "string")
                .enumeration("sort", "Sort field", &["created", "updated", "comments"])
                .enumeration("direction", "Sort direction", DIRECTIONS)
                .string("since", "Only issues updated after this ISO 8601 timestamp"),
            "/repos/{owner}/{repo}/issues",
        )
        .query(&["state", "labels", "sort", "direction", "since", "page", "per_page"]),
        OperationSpec::get(
            "get_issue",
            "Get a single issue",
            repo()
                .integer("issue_number", "Issue number")
                .required(&["issue_number"]),
            "/repos/{owner}/{repo}/issues/{issue_number}",
        ),
        OperationSpec::post(
            "create_issue",
            "Create a new issue",
            repo()
                .string("title", "Issue title")
                .string("body", "Issue body")
                .array("assignees", "Logins to assign", "string")
                .array("labels", "Labels to apply", "string")
                .integer("milestone", "Milestone number")
                .required(&["title"]),
            "/repos/{owner}/{repo}/issues",
        )
        .body(&["title", "body", "assignees", "labels", "milestone"]),
        OperationSpec::patch(
            "update_issue",
            "Update an existing issue",
            repo()
                .integer("issue_number", "Issue number")
                .string("title", "New title")
                .string("body", "New body")
                .enumeration("state", "New state", &["open", "closed"])
                .array("labels", "Replacement labels", "string")
                .array("assignees", "Replacement assignees", "string")
                .required(&["issue_number"]),
            "/repos/{owner}/{repo}/issues/{issue_number}",
        )
        .body_remaining(),
        OperationSpec::post(
            "add_issue_comment",
            "Add a comment to an issue or pull request",
            repo()
                .integer("issue_number", "Issue or pull request number")
                .string("body", "Comment text")
                .required(&["issue_number", "body"]),
            "/repos/{owner}/{repo}/issues/{issue_number}/comments",
        )
        .body(&["body"]),
        // Pull requests
        OperationSpec::get(
            "list_pull_requests",
            "List pull requests in a repository",
            paged(repo())
                .enumeration("state", "Pull request state", ISSUE_STATES)
                .string("head", "Filter by head user/org and branch (user:ref-name)")
                .string("base", "Filter by base branch")
                .enumeration("sort", "Sort field", &["created", "updated", "popularity", "long-running"])
                .enumeration("direction", "Sort direction", DIRECTIONS),
            "/repos/{owner}/{repo}/pulls",
        )
        .query(&["state", "head", "base", "sort", "direction", "page", "per_page"]),
        OperationSpec::post(
            "create_pull_request",
            "Open a new pull request",
            repo()
                .string("title", "Pull request title")
                .string("head", "Branch containing the changes")
                .string("base", "Branch to merge into")
                .string("body", "Pull request description")
                .boolean("draft", "Open as a draft")
                .required(&["title", "head", "base"]),
            "/repos/{owner}/{repo}/pulls",
        )
        .body(&["title", "head", "base", "body", "draft"]),
        OperationSpec::put(
            "merge_pull_request",
            "Merge a pull request",
            repo()
                .integer("pull_number", "Pull request number")
                .string("commit_title", "Title for the merge commit")
                .string("commit_message", "Extra detail for the merge commit")
                .enumeration("merge_method", "Merge method", &["merge", "squash", "rebase"])
                .required(&["pull_number"]),
            "/repos/{owner}/{repo}/pulls/{pull_number}/merge",
        )
        .body(&["commit_title", "commit_message", "merge_method"]),
        // GraphQL
        OperationSpec::graphql(
            "get_viewer",
            "Get the login and profile of the authenticated user",
            ObjectSchema::new(),
            "query { viewer { login name url } }",
        )
        .respond(ResponseShape::Field("/viewer")),
        OperationSpec::graphql(
            "list_discussions",
            "List recent discussions in a repository",
            repo().integer("first", "Number of discussions to return (max 100)"),
            "query($owner: String!, $repo: String!, $first: Int) { \
             repository(owner: $owner, name: $repo) { \
             discussions(first: $first) { nodes { number title url author { login } } } } }",
        )
        .variables(&["owner", "repo", "first"])
        .respond(ResponseShape::Field("/repository/discussions/nodes")),
    ]
}

fn create_branch_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "create_branch",
        "Create a new branch from an existing one (defaults to the repository default branch)",
        repo()
            .string("branch", "Name of the branch to create")
            .string("from_branch", "Source branch; the default branch when omitted")
            .required(&["branch"])
            .build(),
    )
}

/// Reads the source ref, then creates the new ref from its SHA. The two
/// requests are sequential and nothing is undone if the second one fails.
pub struct CreateBranch;

#[async_trait]
impl OperationAdapter for CreateBranch {
    async fn invoke(
        &self,
        args: &Map<String, Value>,
        client: &dyn ApiClient,
    ) -> Result<CallToolResult, ToolError> {
        let owner = encode_segment("owner", arg_str(args, "owner")?)?;
        let repo = encode_segment("repo", arg_str(args, "repo")?)?;
        let branch = arg_str(args, "branch")?;

        let from = match opt_str(args, "from_branch") {
            Some(from) => from.to_string(),
            None => {
                let details = client.get(&format!("/repos/{owner}/{repo}"), &[]).await?;
                details
                    .get("default_branch")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ToolError::Execution("repository has no default branch".to_string())
                    })?
            }
        };

        let from_path = encode_path("from_branch", &from)?;
        let base = client
            .get(&format!("/repos/{owner}/{repo}/git/ref/heads/{from_path}"), &[])
            .await?;
        let sha = base
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Execution(format!("ref heads/{from} has no object sha")))?;

        let created = client
            .post(
                &format!("/repos/{owner}/{repo}/git/refs"),
                Some(json!({ "ref": format!("refs/heads/{branch}"), "sha": sha })),
            )
            .await?;
        Ok(CallToolResult::json(&created))
    }
}
