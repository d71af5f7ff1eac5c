//! Third-party profile providers and their normalization into
//! [`NormalizedProfile`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use folio_documents::{NormalizedProfile, ProjectEntry, Provider};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Transport { provider: Provider, message: String },
    #[error("{provider} returned {status}")]
    Status { provider: Provider, status: u16 },
    #[error("{provider} response could not be parsed: {message}")]
    Malformed { provider: Provider, message: String },
}

#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    async fn fetch_profile(
        &self,
        provider: Provider,
        token: &str,
    ) -> Result<NormalizedProfile, ProviderError>;
}

/// API roots, overridable for tests.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub github: String,
    pub gitlab: String,
    pub linkedin: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            github: "https://api.github.com".to_string(),
            gitlab: "https://gitlab.com/api/v4".to_string(),
            linkedin: "https://api.linkedin.com/v2".to_string(),
        }
    }
}

pub struct HttpProviderClient {
    client: Client,
    endpoints: ProviderEndpoints,
}

impl HttpProviderClient {
    pub fn new(endpoints: ProviderEndpoints, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("folio-pipeline")
            .build()?;
        Ok(Self { client, endpoints })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        provider: Provider,
        url: String,
        token: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| ProviderError::Malformed {
            provider,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn fetch_profile(
        &self,
        provider: Provider,
        token: &str,
    ) -> Result<NormalizedProfile, ProviderError> {
        match provider {
            Provider::Github => {
                let root = &self.endpoints.github;
                let user: GithubUser = self.get_json(provider, format!("{root}/user"), token).await?;
                let repos: Vec<GithubRepo> = self
                    .get_json(
                        provider,
                        format!("{root}/user/repos?sort=updated&per_page=30"),
                        token,
                    )
                    .await?;
                Ok(normalize_github(user, repos))
            }
            Provider::Gitlab => {
                let root = &self.endpoints.gitlab;
                let user: GitlabUser = self.get_json(provider, format!("{root}/user"), token).await?;
                let projects: Vec<GitlabProject> = self
                    .get_json(
                        provider,
                        format!("{root}/projects?owned=true&order_by=last_activity_at&per_page=30"),
                        token,
                    )
                    .await?;
                Ok(normalize_gitlab(user, projects))
            }
            Provider::Linkedin => {
                let root = &self.endpoints.linkedin;
                let info: LinkedinUserInfo =
                    self.get_json(provider, format!("{root}/userinfo"), token).await?;
                Ok(normalize_linkedin(info))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    company: Option<String>,
    blog: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    name: String,
    description: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    stargazers_count: u32,
    language: Option<String>,
    #[serde(default)]
    fork: bool,
}

#[derive(Debug, Deserialize)]
struct GitlabUser {
    username: String,
    name: Option<String>,
    bio: Option<String>,
    job_title: Option<String>,
    web_url: Option<String>,
    website_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitlabProject {
    name: String,
    description: Option<String>,
    web_url: Option<String>,
    #[serde(default)]
    star_count: u32,
}

#[derive(Debug, Deserialize)]
struct LinkedinUserInfo {
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    email: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn link(links: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(v) = non_empty(value) {
        links.insert(key.to_string(), v);
    }
}

fn normalize_github(user: GithubUser, repos: Vec<GithubRepo>) -> NormalizedProfile {
    let mut skills: Vec<String> = Vec::new();
    let mut projects = Vec::new();
    for repo in repos.into_iter().filter(|r| !r.fork) {
        if let Some(lang) = non_empty(repo.language) {
            if !skills.contains(&lang) {
                skills.push(lang);
            }
        }
        projects.push(ProjectEntry {
            name: repo.name,
            description: non_empty(repo.description),
            url: repo.html_url,
            stars: repo.stargazers_count,
        });
    }

    let mut links = BTreeMap::new();
    link(&mut links, "github", user.html_url);
    link(&mut links, "website", user.blog);

    NormalizedProfile {
        name: non_empty(user.name).or(Some(user.login)),
        headline: non_empty(user.company),
        bio: non_empty(user.bio),
        skills,
        projects,
        links,
        ..NormalizedProfile::default()
    }
}

fn normalize_gitlab(user: GitlabUser, projects: Vec<GitlabProject>) -> NormalizedProfile {
    let mut links = BTreeMap::new();
    link(&mut links, "gitlab", user.web_url);
    link(&mut links, "website", user.website_url);

    NormalizedProfile {
        name: non_empty(user.name).or(Some(user.username)),
        headline: non_empty(user.job_title),
        bio: non_empty(user.bio),
        projects: projects
            .into_iter()
            .map(|p| ProjectEntry {
                name: p.name,
                description: non_empty(p.description),
                url: p.web_url,
                stars: p.star_count,
            })
            .collect(),
        links,
        ..NormalizedProfile::default()
    }
}

fn normalize_linkedin(info: LinkedinUserInfo) -> NormalizedProfile {
    let name = non_empty(info.name).or_else(|| {
        let full = format!(
            "{} {}",
            info.given_name.unwrap_or_default(),
            info.family_name.unwrap_or_default()
        );
        non_empty(Some(full))
    });

    let mut links = BTreeMap::new();
    link(&mut links, "email", info.email.map(|e| format!("mailto:{e}")));

    NormalizedProfile {
        name,
        links,
        ..NormalizedProfile::default()
    }
}
