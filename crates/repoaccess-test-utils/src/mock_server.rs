//! Mock GitHub and GitLab API servers.

use crate::fixtures::Fixtures;
use serde_json::Value;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mocks matching a specific credential outrank the catch-all rejections.
const AUTHORIZED_PRIORITY: u8 = 1;
const FLAKY_PRIORITY: u8 = 2;
const REJECT_PRIORITY: u8 = 10;

fn base_url(server: &MockServer) -> Url {
    // The API base must end in '/' for segment joining.
    Url::parse(&format!("{}/", server.uri())).expect("mock server uri is a valid url")
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map_or(0, |requests| requests.len())
}

async fn mount_json(server: &MockServer, route: String, body: &Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, route: String, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "message": format!("mock status {status}")
        })))
        .with_priority(REJECT_PRIORITY)
        .mount(server)
        .await;
}

async fn mount_flaky(server: &MockServer, route: String, failures: u64, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(failures)
        .with_priority(FLAKY_PRIORITY)
        .mount(server)
        .await;
}

/// Mock GitHub REST API.
#[derive(Debug)]
pub struct MockGitHub {
    server: MockServer,
}

impl MockGitHub {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// API base URL, to be used as the GitHub API override.
    #[must_use]
    pub fn api_url(&self) -> Url {
        base_url(&self.server)
    }

    /// The underlying wiremock server.
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve `GET /repos/{owner}/{name}` to anyone.
    pub async fn repository(&self, owner: &str, name: &str, default_branch: &str) {
        let body = Fixtures::github_repository(owner, name, default_branch);
        mount_json(&self.server, format!("/repos/{owner}/{name}"), &body).await;
    }

    /// Serve `GET /repos/{owner}/{name}` only for `Bearer {token}`; any other
    /// credential gets 401.
    pub async fn repository_for_token(
        &self,
        owner: &str,
        name: &str,
        default_branch: &str,
        token: &str,
    ) {
        let route = format!("/repos/{owner}/{name}");
        Mock::given(method("GET"))
            .and(path(route.clone()))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(Fixtures::github_repository(
                    owner,
                    name,
                    default_branch,
                )),
            )
            .with_priority(AUTHORIZED_PRIORITY)
            .mount(&self.server)
            .await;
        mount_status(&self.server, route, 401).await;
    }

    /// Serve the branch list of a repository.
    pub async fn branches(&self, owner: &str, name: &str, branches: &[&str]) {
        let body = Fixtures::github_branches(branches);
        mount_json(&self.server, format!("/repos/{owner}/{name}/branches"), &body).await;
    }

    /// Serve `GET /user`.
    pub async fn user(&self, login: &str) {
        mount_json(&self.server, "/user".to_string(), &Fixtures::github_user(login)).await;
    }

    /// Serve one page of `GET /user/repos` with an optional `Link` header.
    pub async fn user_repos_page(&self, page: u32, repositories: Value, link: Option<&str>) {
        let mut response = ResponseTemplate::new(200).set_body_json(repositories);
        if let Some(link) = link {
            response = response.insert_header("link", link);
        }
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", page.to_string().as_str()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Answer every request to `route` with `status`.
    pub async fn status(&self, route: &str, status: u16) {
        mount_status(&self.server, route.to_string(), status).await;
    }

    /// Answer the first `failures` requests to `route` with `status`; later
    /// requests fall through to the other mocks.
    pub async fn flaky(&self, route: &str, failures: u64, status: u16) {
        mount_flaky(&self.server, route.to_string(), failures, status).await;
    }

    /// Answer the first request to `route` with 429 and a `Retry-After` of
    /// `seconds`.
    pub async fn rate_limited_once(&self, route: &str, seconds: u64) {
        Mock::given(method("GET"))
            .and(path(route.to_string()))
            .respond_with(
                ResponseTemplate::new(429).insert_header("Retry-After", seconds.to_string()),
            )
            .up_to_n_times(1)
            .with_priority(FLAKY_PRIORITY)
            .mount(&self.server)
            .await;
    }

    /// Requests received so far.
    pub async fn request_count(&self) -> usize {
        request_count(&self.server).await
    }
}

/// Mock GitLab REST API (v4).
#[derive(Debug)]
pub struct MockGitLab {
    server: MockServer,
}

impl MockGitLab {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// API base URL, to be used as the GitLab API override.
    #[must_use]
    pub fn api_url(&self) -> Url {
        base_url(&self.server)
    }

    /// The underlying wiremock server.
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// Request path of a project, with the namespace percent-encoded.
    #[must_use]
    pub fn project_path(path_with_namespace: &str) -> String {
        format!("/projects/{}", path_with_namespace.replace('/', "%2F"))
    }

    /// Serve a project to anyone.
    pub async fn project(&self, path_with_namespace: &str, default_branch: &str) {
        let body = Fixtures::gitlab_project(path_with_namespace, default_branch);
        mount_json(&self.server, Self::project_path(path_with_namespace), &body).await;
    }

    /// Serve a project only for `PRIVATE-TOKEN: {token}`; any other
    /// credential gets 401.
    pub async fn project_for_token(&self, path_with_namespace: &str, default_branch: &str, token: &str) {
        let route = Self::project_path(path_with_namespace);
        Mock::given(method("GET"))
            .and(path(route.clone()))
            .and(header("private-token", token))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(Fixtures::gitlab_project(path_with_namespace, default_branch)),
            )
            .with_priority(AUTHORIZED_PRIORITY)
            .mount(&self.server)
            .await;
        mount_status(&self.server, route, 401).await;
    }

    /// Serve the branch list of a project.
    pub async fn branches(&self, path_with_namespace: &str, branches: &[&str]) {
        let route = format!("{}/repository/branches", Self::project_path(path_with_namespace));
        mount_json(&self.server, route, &Fixtures::gitlab_branches(branches)).await;
    }

    /// Serve `GET /user`.
    pub async fn user(&self, username: &str) {
        mount_json(&self.server, "/user".to_string(), &Fixtures::gitlab_user(username)).await;
    }

    /// Serve one page of `GET /projects` with GitLab pagination headers.
    pub async fn projects_page(&self, page: u32, projects: Value, total: u64, total_pages: u32) {
        let mut response = ResponseTemplate::new(200)
            .set_body_json(projects)
            .insert_header("x-total", total.to_string().as_str())
            .insert_header("x-total-pages", total_pages.to_string().as_str())
            .insert_header("x-page", page.to_string().as_str());
        if page < total_pages {
            response = response.insert_header("x-next-page", (page + 1).to_string().as_str());
        }
        if page > 1 {
            response = response.insert_header("x-prev-page", (page - 1).to_string().as_str());
        }
        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(query_param("page", page.to_string().as_str()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Answer every request to `route` with `status`.
    pub async fn status(&self, route: &str, status: u16) {
        mount_status(&self.server, route.to_string(), status).await;
    }

    /// Answer the first `failures` requests to `route` with `status`.
    pub async fn flaky(&self, route: &str, failures: u64, status: u16) {
        mount_flaky(&self.server, route.to_string(), failures, status).await;
    }

    /// Requests received so far.
    pub async fn request_count(&self) -> usize {
        request_count(&self.server).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_github_repository_for_token() {
        let mock = MockGitHub::start().await;
        mock.repository_for_token("octo", "hello", "main", "good").await;
        let url = mock.api_url().join("repos/octo/hello").unwrap();

        let client = reqwest::Client::new();
        let ok = client
            .get(url.clone())
            .bearer_auth("good")
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status().as_u16(), 200);

        let rejected = client.get(url).bearer_auth("bad").send().await.unwrap();
        assert_eq!(rejected.status().as_u16(), 401);
        assert_eq!(mock.request_count().await, 2);
    }

    #[tokio::test]
    async fn test_gitlab_project_path_is_encoded() {
        assert_eq!(
            MockGitLab::project_path("group/sub/proj"),
            "/projects/group%2Fsub%2Fproj"
        );

        let mock = MockGitLab::start().await;
        mock.flaky("/user", 1, 503).await;
        mock.user("jdoe").await;
        let url = mock.api_url().join("user").unwrap();

        let client = reqwest::Client::new();
        let first = client.get(url.clone()).send().await.unwrap();
        assert_eq!(first.status().as_u16(), 503);
        let second = client.get(url).send().await.unwrap();
        assert_eq!(second.status().as_u16(), 200);
    }
}
