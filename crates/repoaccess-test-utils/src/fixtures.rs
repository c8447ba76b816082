//! Provider API payloads.

use serde_json::{Value, json};

/// Canned provider responses.
#[derive(Debug, Clone, Copy)]
pub struct Fixtures;

impl Fixtures {
    /// GitHub `GET /repos/{owner}/{repo}` body.
    #[must_use]
    pub fn github_repository(owner: &str, name: &str, default_branch: &str) -> Value {
        json!({
            "id": 1_296_269,
            "name": name,
            "full_name": format!("{owner}/{name}"),
            "description": format!("{name} test repository"),
            "html_url": format!("https://github.com/{owner}/{name}"),
            "default_branch": default_branch,
            "forks_count": 3,
            "stargazers_count": 42,
            "size": 108,
            "created_at": "2011-01-26T19:01:12Z",
            "private": false,
            "visibility": "public"
        })
    }

    /// GitHub `GET /user` body.
    #[must_use]
    pub fn github_user(login: &str) -> Value {
        json!({
            "login": login,
            "id": 583_231,
            "name": "Test User",
            "email": null,
            "avatar_url": format!("https://avatars.githubusercontent.com/{login}"),
            "html_url": format!("https://github.com/{login}")
        })
    }

    /// GitHub branch list body.
    #[must_use]
    pub fn github_branches(names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|name| json!({"name": name, "commit": {"sha": "0".repeat(40)}}))
                .collect(),
        )
    }

    /// GitLab `GET /projects/{id}` body.
    #[must_use]
    pub fn gitlab_project(path_with_namespace: &str, default_branch: &str) -> Value {
        let name = path_with_namespace
            .rsplit('/')
            .next()
            .unwrap_or(path_with_namespace);
        json!({
            "id": 278_964,
            "name": name,
            "description": null,
            "default_branch": default_branch,
            "forks_count": 1,
            "star_count": 7,
            "http_url_to_repo": format!("https://gitlab.com/{path_with_namespace}.git"),
            "path_with_namespace": path_with_namespace,
            "visibility": "private",
            "created_at": "2015-05-20T10:00:00Z",
            "statistics": {"repository_size": 1_048_576}
        })
    }

    /// GitLab `GET /user` body.
    #[must_use]
    pub fn gitlab_user(username: &str) -> Value {
        json!({
            "username": username,
            "id": 1,
            "name": "Test User",
            "email": format!("{username}@example.com"),
            "avatar_url": null,
            "web_url": format!("https://gitlab.com/{username}")
        })
    }

    /// GitLab branch list body.
    #[must_use]
    pub fn gitlab_branches(names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|name| json!({"name": name, "default": false, "protected": false}))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixture_shapes() {
        let repo = Fixtures::github_repository("octo", "hello", "trunk");
        assert_eq!(repo["full_name"], "octo/hello");
        assert_eq!(repo["default_branch"], "trunk");

        let project = Fixtures::gitlab_project("group/sub/proj", "main");
        assert_eq!(project["name"], "proj");

        assert_eq!(Fixtures::github_branches(&["a", "b"]).as_array().map(Vec::len), Some(2));
    }
}
