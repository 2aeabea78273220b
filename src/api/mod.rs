//! Backend search endpoints feeding the suggestion popup.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::doc::RefKind;
use crate::resolver::{Candidate, TriggerConfig};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub api_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let default_api_url = "http://localhost:6689".to_string();

        // Both `window.ENV.API_URL` (documented) and `window.ENV.api_url`
        // (legacy) are accepted.
        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"API_URL".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }

                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"api_url".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }
                }
            }
        }

        Self {
            api_url: default_api_url,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Clone, Debug)]
struct SearchRequest {
    query: String,
    limit: usize,
}

/// One row out of a search endpoint. `referenceKind` is optional on the
/// wire; each endpoint has a default kind for rows without one.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct SearchHit {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(rename = "referenceKind", default)]
    pub reference_kind: Option<String>,
}

pub(crate) fn hit_to_candidate(hit: SearchHit, default_kind: RefKind) -> Candidate {
    let kind = hit
        .reference_kind
        .as_deref()
        .and_then(RefKind::from_wire)
        .unwrap_or(default_kind);
    Candidate {
        id: hit.id,
        label: hit.label,
        subtitle: hit.subtitle,
        kind,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchClient {
    base_url: String,
}

impl SearchClient {
    pub fn new() -> Self {
        Self {
            base_url: EnvConfig::new().api_url,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }

    async fn search(&self, endpoint: &str, query: &str, limit: usize) -> ApiResult<Vec<SearchHit>> {
        let client = reqwest::Client::new();
        let url = format!("{}/search/{endpoint}", self.base_url);
        let req = client.post(url).json(&SearchRequest {
            query: query.to_string(),
            limit,
        });

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            res.json().await.map_err(ApiError::parse)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Search failed"))
        }
    }

    pub async fn search_people(&self, query: &str, limit: usize) -> ApiResult<Vec<Candidate>> {
        let hits = self.search("people", query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| hit_to_candidate(h, RefKind::Person))
            .collect())
    }

    pub async fn search_organisaties(
        &self,
        query: &str,
        limit: usize,
    ) -> ApiResult<Vec<Candidate>> {
        let hits = self.search("organisaties", query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| hit_to_candidate(h, RefKind::Organisatie))
            .collect())
    }

    /// Nodes, tasks and tags share one endpoint; the hit's own
    /// `referenceKind` disambiguates.
    pub async fn search_mentionables(
        &self,
        query: &str,
        limit: usize,
    ) -> ApiResult<Vec<Candidate>> {
        let hits = self.search("mentionables", query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| hit_to_candidate(h, RefKind::CorpusNode))
            .collect())
    }
}

impl Default for SearchClient {
    fn default() -> Self {
        Self::new()
    }
}

fn or_empty(result: ApiResult<Vec<Candidate>>, ctx: &str) -> Vec<Candidate> {
    match result {
        Ok(items) => items,
        Err(err) => {
            web_sys::console::warn_1(&format!("{ctx} ({:?}): {err}", err.kind).into());
            vec![]
        }
    }
}

/// `@` trigger: people first, then organisations. Opens with results
/// before anything is typed. Failed lookups degrade to an empty list so
/// the editor keeps working offline.
pub fn mention_trigger(client: SearchClient) -> TriggerConfig {
    TriggerConfig {
        trigger: '@',
        needs_query: false,
        provider: Rc::new(move |query: String| {
            let client = client.clone();
            Box::pin(async move {
                let mut items = or_empty(
                    client.search_people(&query, 8).await,
                    "people search failed",
                );
                items.extend(or_empty(
                    client.search_organisaties(&query, 5).await,
                    "organisatie search failed",
                ));
                items
            })
        }),
    }
}

/// `#` trigger: corpus nodes, tasks and tags. Waits for a non-empty
/// query.
pub fn hashtag_trigger(client: SearchClient) -> TriggerConfig {
    TriggerConfig {
        trigger: '#',
        needs_query: true,
        provider: Rc::new(move |query: String| {
            let client = client.clone();
            Box::pin(async move {
                or_empty(
                    client.search_mentionables(&query, 10).await,
                    "mentionable search failed",
                )
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(kind: Option<&str>) -> SearchHit {
        SearchHit {
            id: "x1".to_string(),
            label: "X".to_string(),
            subtitle: None,
            reference_kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_hit_kind_falls_back_to_endpoint_default() {
        assert_eq!(hit_to_candidate(hit(None), RefKind::Person).kind, RefKind::Person);
        assert_eq!(
            hit_to_candidate(hit(Some("task")), RefKind::CorpusNode).kind,
            RefKind::Task
        );
        // Unknown wire kinds fall back too instead of failing the row.
        assert_eq!(
            hit_to_candidate(hit(Some("gremlin")), RefKind::Organisatie).kind,
            RefKind::Organisatie
        );
    }

    #[test]
    fn test_search_hit_deserializes_minimal_row() {
        let hit: SearchHit =
            serde_json::from_str(r#"{"id":"p1","label":"Jane Doe"}"#).expect("parses");
        assert_eq!(hit.id, "p1");
        assert_eq!(hit.subtitle, None);
        assert_eq!(hit.reference_kind, None);
    }

    #[test]
    fn test_trigger_configs() {
        let client = SearchClient::with_base_url("http://localhost:1");
        let mention = mention_trigger(client.clone());
        assert_eq!(mention.trigger, '@');
        assert!(!mention.needs_query);

        let hashtag = hashtag_trigger(client);
        assert_eq!(hashtag.trigger, '#');
        assert!(hashtag.needs_query);
    }
}
