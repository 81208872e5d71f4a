use std::fmt;

use async_trait::async_trait;
use nt_core::{
    ArticleApi, ArticleDetail, ArticleId, ArticleSummary, ChatApi, ChatMessage, ChatReply,
    ClientConfig, Error, FilterState, HealthStatus, Result, TagCategories, TitlesPage,
    TitlesQuery,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::schema::{
    ChatBody, ChatHistoryResponse, ChatSendResponse, ClearResponse, CommentsAck, CommentsBody,
    ErrorBody, RatingAck, RatingBody, ReadingTimeBody, TagsAck, TagsBody, TagsResponse,
    UnprocessedResponse,
};

/// Talks to the news backend over HTTP.
pub struct HttpNewsApi {
    client: Client,
    base_url: Url,
    config: ClientConfig,
}

impl HttpNewsApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url()?,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// GET with the configured retry policy; reads are idempotent.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut attempt = 0;
        loop {
            let result = match self.client.get(url.clone()).send().await {
                Ok(response) => decode(response).await,
                Err(e) => Err(Error::from(e)),
            };
            match result {
                Err(e) if attempt < self.config.retries && e.is_retryable() => {
                    let delay = self.config.retry_delay(attempt);
                    attempt += 1;
                    warn!(
                        "GET {} failed ({}), retrying {}/{} in {}s",
                        url.path(),
                        e,
                        attempt,
                        self.config.retries,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    fn request<B: Serialize + ?Sized>(&self, method: Method, url: Url, body: &B) -> RequestBuilder {
        debug!("{} {}", method, url.path());
        self.client.request(method, url).json(body)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(method, self.endpoint(path)?, body).send().await?;
        decode(response).await
    }

    /// Chat routes answer `{success, error}` even on error statuses, so the
    /// body is decoded whatever the status.
    async fn send_lenient<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(u16, T)>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let request = match body {
            Some(body) => self.request(method, url, body),
            None => self.client.request(method, url),
        };
        let response = request.send().await?;
        let status = response.status().as_u16();
        let path = response.url().path().to_string();
        let bytes = response.bytes().await?;
        let value = serde_json::from_slice(&bytes).map_err(|e| Error::Decode(format!("{}: {}", path, e)))?;
        Ok((status, value))
    }
}

impl fmt::Debug for HttpNewsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpNewsApi")
            .field("client", &"<reqwest::Client>")
            .field("base_url", &self.base_url.as_str())
            .field("retries", &self.config.retries)
            .finish()
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let path = response.url().path().to_string();
    let bytes = response.bytes().await?;

    let server_message = || {
        serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.error)
    };

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(server_message().unwrap_or(path)));
    }
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: server_message().unwrap_or_else(|| status.to_string()),
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(format!("{}: {}", path, e)))
}

/// `articles/filter?tags=a&tags=b&min_rating=3`
pub(crate) fn filter_url(mut url: Url, filter: &FilterState) -> Url {
    if filter.is_empty() {
        return url;
    }
    {
        let mut pairs = url.query_pairs_mut();
        for tag in &filter.tags {
            pairs.append_pair("tags", tag);
        }
        if filter.min_rating > 0 {
            pairs.append_pair("min_rating", &filter.min_rating.to_string());
        }
    }
    url
}

#[async_trait]
impl ArticleApi for HttpNewsApi {
    fn name(&self) -> &str {
        "http"
    }

    async fn article_count(&self) -> Result<u64> {
        self.get(self.endpoint("length")?).await
    }

    async fn titles(&self, query: &TitlesQuery) -> Result<TitlesPage> {
        self.send(Method::POST, "titles", query).await
    }

    async fn article(&self, id: ArticleId) -> Result<ArticleDetail> {
        self.get(self.endpoint(&format!("article/{}", id))?).await
    }

    async fn unprocessed_articles(&self) -> Result<Vec<ArticleDetail>> {
        let response: UnprocessedResponse = self.get(self.endpoint("unpretreat")?).await?;
        Ok(response.unpretreat_articles)
    }

    async fn set_rating(&self, id: ArticleId, rating: u8) -> Result<u8> {
        let rating = nt_core::types::validate_rating(rating)?;
        let ack: RatingAck = self
            .send(Method::PUT, &format!("articles/{}/rating", id), &RatingBody { rating })
            .await?;
        Ok(ack.rating)
    }

    async fn add_reading_time(&self, id: ArticleId, seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Ok(());
        }
        let _: serde_json::Value = self
            .send(Method::POST, &format!("articles/{}/reading-time", id), &ReadingTimeBody { seconds })
            .await?;
        Ok(())
    }

    async fn set_comments(&self, id: ArticleId, comments: &str) -> Result<String> {
        let ack: CommentsAck = self
            .send(Method::PUT, &format!("articles/{}/comments", id), &CommentsBody { comments })
            .await?;
        Ok(ack.comments)
    }

    async fn set_tags(&self, id: ArticleId, tags: &[String]) -> Result<Vec<String>> {
        let ack: TagsAck = self
            .send(Method::PUT, &format!("articles/{}/tags", id), &TagsBody { tags })
            .await?;
        Ok(ack.tags)
    }

    async fn tags(&self) -> Result<Vec<String>> {
        let response: TagsResponse = self.get(self.endpoint("tags")?).await?;
        Ok(response.tags)
    }

    async fn tag_categories(&self) -> Result<TagCategories> {
        self.get(self.endpoint("tags/categories")?).await
    }

    async fn filter_articles(&self, filter: &FilterState) -> Result<Vec<ArticleSummary>> {
        self.get(filter_url(self.endpoint("articles/filter")?, filter)).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.get(self.endpoint("health")?).await
    }
}

#[async_trait]
impl ChatApi for HttpNewsApi {
    async fn chat_history(&self, id: ArticleId) -> Result<Vec<ChatMessage>> {
        let (status, response): (u16, ChatHistoryResponse) = self
            .send_lenient::<(), _>(Method::GET, &format!("articles/{}/chat/history", id), None)
            .await?;
        response.into_messages(status)
    }

    async fn send_chat(&self, id: ArticleId, question: &str, model: &str) -> Result<ChatReply> {
        let body = ChatBody { question, model };
        let (_, response): (u16, ChatSendResponse) = self
            .send_lenient(Method::POST, &format!("articles/{}/chat", id), Some(&body))
            .await?;
        response.into_reply()
    }

    async fn clear_chat(&self, id: ArticleId) -> Result<()> {
        let (status, response): (u16, ClearResponse) = self
            .send_lenient::<(), _>(Method::DELETE, &format!("articles/{}/chat/clear", id), None)
            .await?;
        if response.success {
            Ok(())
        } else {
            Err(Error::Api {
                status,
                message: response.error.unwrap_or_else(|| "failed to clear chat history".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(url: &str) -> HttpNewsApi {
        HttpNewsApi::new(&ClientConfig::default().with_api_url(url)).unwrap()
    }

    #[test]
    fn test_endpoints_join_under_base() {
        let api = api("http://localhost:5000/api");
        assert_eq!(api.endpoint("length").unwrap().as_str(), "http://localhost:5000/api/length");
        assert_eq!(
            api.endpoint("articles/3/chat/history").unwrap().as_str(),
            "http://localhost:5000/api/articles/3/chat/history"
        );
    }

    #[test]
    fn test_filter_url() {
        let base = Url::parse("http://localhost/api/articles/filter").unwrap();

        let mut filter = FilterState::default();
        assert_eq!(filter_url(base.clone(), &filter).as_str(), "http://localhost/api/articles/filter");

        filter.toggle_tag("tech");
        filter.toggle_tag("ai");
        filter.set_min_rating(3);
        assert_eq!(
            filter_url(base, &filter).as_str(),
            "http://localhost/api/articles/filter?tags=ai&tags=tech&min_rating=3"
        );
    }

    #[test]
    fn test_debug_hides_client() {
        let debug = format!("{:?}", api("http://localhost:5000/api/"));
        assert!(debug.contains("<reqwest::Client>"));
        assert!(debug.contains("localhost:5000"));
    }
}
