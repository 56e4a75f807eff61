use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::domain::RepositoryCoordinates;
use crate::error::SyncError;

pub const DEFAULT_TOPICS_URL: &str = "https://api.github.com/graphql";

/// Number of topics requested per repository.
pub const TOPIC_LIMIT: usize = 10;

const TOPICS_QUERY: &str = "query($org: String!, $repo: String!, $first: Int!) { \
    organization(login: $org) { name url \
    repository(name: $repo) { name url description \
    repositoryTopics(first: $first) { edges { node { topic { name } } } } } } }";

/// Topic tags attached to a source repository.
pub trait TopicClient {
    fn fetch_topics(&self, coords: &RepositoryCoordinates) -> Result<Vec<String>, SyncError>;
}

#[derive(Clone)]
pub struct GithubTopicClient {
    client: Client,
    endpoint: String,
    token: String,
}

impl GithubTopicClient {
    pub fn new(token: &str) -> Result<Self, SyncError> {
        Self::with_endpoint(DEFAULT_TOPICS_URL, token)
    }

    pub fn with_endpoint(endpoint: &str, token: &str) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pkgmeta/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::InvalidConfig(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| SyncError::TopicsHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.trim().to_string(),
        })
    }

    fn handle_status(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GitHub request failed".to_string());
        Err(SyncError::TopicsStatus { status, message })
    }
}

impl TopicClient for GithubTopicClient {
    fn fetch_topics(&self, coords: &RepositoryCoordinates) -> Result<Vec<String>, SyncError> {
        if !coords.is_resolvable() {
            return Err(SyncError::UnrecognizedRepositoryUrl(coords.to_string()));
        }
        let payload = json!({
            "query": TOPICS_QUERY,
            "variables": {"org": coords.org, "repo": coords.repo, "first": TOPIC_LIMIT},
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|err| SyncError::TopicsHttp(err.to_string()))?;
        info!(%coords, status = response.status().as_u16(), "GitHub responded");
        let response = Self::handle_status(response)?;
        let body: TopicsResponse = response
            .json()
            .map_err(|err| SyncError::TopicsResponse(err.to_string()))?;
        extract_topics(body)
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicsResponse {
    data: Option<TopicsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TopicsData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    repository_topics: TopicConnection,
}

#[derive(Debug, Deserialize)]
struct TopicConnection {
    #[serde(default)]
    edges: Vec<Option<TopicEdge>>,
}

#[derive(Debug, Deserialize)]
struct TopicEdge {
    node: Option<TopicNode>,
}

#[derive(Debug, Deserialize)]
struct TopicNode {
    topic: Option<Topic>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    name: Option<String>,
}

/// Topic names from a GraphQL response, skipping null entries. A response
/// without the organization and repository objects is an error.
pub fn extract_topics(body: TopicsResponse) -> Result<Vec<String>, SyncError> {
    let repository = body
        .data
        .and_then(|data| data.organization)
        .and_then(|org| org.repository)
        .ok_or_else(|| {
            let messages = body
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect::<Vec<_>>();
            if messages.is_empty() {
                SyncError::TopicsResponse("repository not found".to_string())
            } else {
                SyncError::TopicsResponse(messages.join("; "))
            }
        })?;

    Ok(repository
        .repository_topics
        .edges
        .into_iter()
        .flatten()
        .filter_map(|edge| edge.node)
        .filter_map(|node| node.topic)
        .filter_map(|topic| topic.name)
        .collect())
}
