use super::{MetadataProvider, ProviderError, ProviderMatch};
use crate::config::MetadataConfig;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

const SEARCH_QUERY: &str = r"
    query ($search: String) {
        Page(page: 1, perPage: 1) {
            media(search: $search, type: ANIME) {
                id
                title { romaji english }
                coverImage { extraLarge large medium }
                description(asHtml: false)
                averageScore
                genres
            }
        }
    }
";

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    search: &'a str,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Deserialize)]
struct Page {
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct Media {
    id: i32,
    title: Title,
    #[serde(rename = "coverImage")]
    cover_image: Option<CoverImage>,
    description: Option<String>,
    #[serde(rename = "averageScore")]
    average_score: Option<i32>,
    genres: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CoverImage {
    #[serde(rename = "extraLarge")]
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
}

#[derive(Deserialize)]
struct Title {
    romaji: Option<String>,
    english: Option<String>,
}

/// AniList GraphQL client.
#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    api_url: String,
}

impl AnilistClient {
    pub fn new(config: &MetadataConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    fn map_media(m: Media) -> ProviderMatch {
        let cover_urls = m
            .cover_image
            .map(|c| {
                [c.extra_large, c.large, c.medium]
                    .into_iter()
                    .flatten()
                    .collect()
            })
            .unwrap_or_default();

        #[allow(clippy::cast_precision_loss)]
        let rating = m.average_score.map(|s| s as f32 / 10.0);

        ProviderMatch {
            external_id: m.id,
            title: m.title.english.or(m.title.romaji).unwrap_or_default(),
            synopsis: m
                .description
                .map(|d| strip_markup(&d))
                .filter(|d| !d.is_empty()),
            genres: m.genres.unwrap_or_default(),
            cover_urls,
            rating,
        }
    }
}

#[async_trait]
impl MetadataProvider for AnilistClient {
    async fn search(&self, title: &str) -> Result<Option<ProviderMatch>, ProviderError> {
        let request_body = GraphQLRequest {
            query: SEARCH_QUERY,
            variables: Variables { search: title },
        };

        let response: GraphQLResponse = self
            .client
            .post(&self.api_url)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.errors.first() {
            return Err(ProviderError::Decode(format!(
                "AniList returned errors: {}",
                error.message
            )));
        }
        let Some(data) = response.data else {
            return Err(ProviderError::Decode("AniList response has no data".to_string()));
        };

        let found = data.page.media.into_iter().next().map(Self::map_media);

        debug!(title, found = found.is_some(), "AniList search finished");
        Ok(found)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(bytes.to_vec())
    }
}

/// Turns AniList's lightly formatted synopsis into plain text.
fn strip_markup(description: &str) -> String {
    static BREAK_RE: OnceLock<Regex> = OnceLock::new();
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let break_re =
        BREAK_RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("Invalid regex"));
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("Invalid regex"));

    let text = break_re.replace_all(description, "\n");
    let text = tag_re.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);

    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
