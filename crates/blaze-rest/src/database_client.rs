//! Realtime database over its REST surface.
//!
//! Each location is addressed as `{url}/{path}.json`. Subscriptions use the
//! streaming form of `GET` (`Accept: text/event-stream`).

use async_trait::async_trait;
use blaze_api::{StoreError, Value, ValueStream};
use blaze_core::sanitize::contains_absent;
use blaze_core::RealtimeStore;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, DatabaseConfig};
use crate::http::{build_client, build_streaming_client, describe_error, status_summary};
use crate::models::{DatabaseErrorBody, PushResponse};
use crate::sse::{Applied, ServerEvent, Snapshot, SseParser};

pub struct RestDatabase {
    config: DatabaseConfig,
    base: Url,
    client: reqwest::Client,
    streaming_client: reqwest::Client,
}

impl RestDatabase {
    pub fn new(config: DatabaseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let invalid = |reason: String| ConfigError::InvalidUrl {
            component: "Database",
            url: config.url.clone(),
            reason,
        };
        let base = Url::parse(config.url.trim()).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        Ok(Self {
            config,
            base,
            client: build_client(),
            streaming_client: build_streaming_client(),
        })
    }

    /// `{url}/{path}.json`; the empty path is the root. Each path segment is
    /// percent-encoded, so keys may contain `?`, `%`, `#` or spaces.
    pub fn location_url(&self, path: &str) -> Url {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (last, parents): (&str, &[&str]) = match segments.split_last() {
            Some((last, parents)) => (*last, parents),
            None => ("", &[]),
        };

        let mut url = self.base.clone();
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty();
            parts.extend(parents);
            parts.push(&format!("{last}.json"));
        }
        url
    }

    fn request(&self, client: &reqwest::Client, method: Method, path: &str) -> RequestBuilder {
        let builder = client.request(method, self.location_url(path));
        match &self.config.auth_token {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        operation: &str,
    ) -> Result<String, StoreError> {
        let url = self.location_url(path).to_string();
        debug!("{} {}", method, url);

        let mut builder = self.request(&self.client, method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::network(describe_error(e, &url, operation)))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            StoreError::network(format!("Failed to read response body from {}: {}", url, e))
        })?;

        if !status.is_success() {
            return Err(status_error(status, path, &url, &text));
        }
        Ok(text)
    }
}

/// Map an unsuccessful response to the store error kind callers branch on.
pub fn status_error(status: StatusCode, path: &str, url: &str, body: &str) -> StoreError {
    let message = serde_json::from_str::<DatabaseErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| status_summary(status, url, body));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied { message },
        StatusCode::NOT_FOUND => StoreError::NotFound {
            path: path.to_string(),
        },
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Quota { message }
        }
        StatusCode::BAD_REQUEST => StoreError::InvalidData { message },
        _ => StoreError::Backend { message },
    }
}

fn reject_absent(value: &Value) -> Result<(), StoreError> {
    if contains_absent(value) {
        return Err(StoreError::InvalidData {
            message: "value contains an absent field".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl RealtimeStore for RestDatabase {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        reject_absent(&value)?;
        self.send(Method::PUT, path, Some(&value), "write").await?;
        Ok(())
    }

    async fn update(&self, path: &str, value: Value) -> Result<(), StoreError> {
        reject_absent(&value)?;
        if value.as_object().is_none() {
            return Err(StoreError::InvalidData {
                message: format!("update expects an object, got {}", value.kind()),
            });
        }
        self.send(Method::PATCH, path, Some(&value), "update").await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        reject_absent(&value)?;
        let text = self.send(Method::POST, path, Some(&value), "push").await?;
        let response: PushResponse = serde_json::from_str(&text).map_err(|e| {
            StoreError::backend(format!("Unexpected push response for '{}': {}", path, e))
        })?;
        Ok(response.name)
    }

    async fn get(&self, path: &str) -> Result<Value, StoreError> {
        let text = self.send(Method::GET, path, None, "read").await?;
        Value::from_json_str(&text).map_err(|e| StoreError::InvalidData {
            message: format!("Malformed value at '{}': {}", path, e),
        })
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.send(Method::DELETE, path, None, "remove").await?;
        Ok(())
    }

    fn subscribe(&self, path: &str) -> ValueStream {
        let request = self
            .request(&self.streaming_client, Method::GET, path)
            .header(ACCEPT, "text/event-stream");
        let listen = Listen::Connecting {
            request,
            path: path.to_string(),
            url: self.location_url(path).to_string(),
        };
        Box::pin(stream::unfold(listen, Listen::next))
    }
}

/// State of one streaming listener.
enum Listen {
    Connecting {
        request: RequestBuilder,
        path: String,
        url: String,
    },
    Streaming {
        body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
        parser: SseParser,
        snapshot: Snapshot,
        url: String,
    },
    Finished,
}

impl Listen {
    async fn next(self) -> Option<(Result<Value, StoreError>, Listen)> {
        let mut state = self;
        loop {
            state = match state {
                Listen::Finished => return None,
                Listen::Connecting { request, path, url } => {
                    let response = match request.send().await {
                        Ok(response) => response,
                        Err(e) => {
                            let err = StoreError::network(describe_error(e, &url, "subscribe"));
                            return Some((Err(err), Listen::Finished));
                        }
                    };

                    let status = response.status();
                    if !status.is_success() {
                        let text = response.text().await.unwrap_or_default();
                        return Some((Err(status_error(status, &path, &url, &text)), Listen::Finished));
                    }

                    info!("Listening to {}", url);
                    Listen::Streaming {
                        body: response
                            .bytes_stream()
                            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                            .boxed(),
                        parser: SseParser::new(),
                        snapshot: Snapshot::new(),
                        url,
                    }
                }
                Listen::Streaming {
                    mut body,
                    mut parser,
                    mut snapshot,
                    url,
                } => {
                    while let Some(raw) = parser.next_event() {
                        let event = match ServerEvent::parse(&raw) {
                            Ok(event) => event,
                            Err(err) => {
                                warn!("Dropping malformed event from {}: {}", url, err);
                                continue;
                            }
                        };
                        match snapshot.apply(event) {
                            Applied::Changed => {
                                let value = snapshot.value().clone();
                                return Some((
                                    Ok(value),
                                    Listen::Streaming {
                                        body,
                                        parser,
                                        snapshot,
                                        url,
                                    },
                                ));
                            }
                            Applied::Ignored => {}
                            Applied::Closed(err) => return Some((Err(err), Listen::Finished)),
                        }
                    }

                    match body.next().await {
                        Some(Ok(chunk)) => {
                            parser.feed(&chunk);
                            Listen::Streaming {
                                body,
                                parser,
                                snapshot,
                                url,
                            }
                        }
                        Some(Err(e)) => {
                            let err = StoreError::network(describe_error(e, &url, "stream"));
                            return Some((Err(err), Listen::Finished));
                        }
                        None => {
                            debug!("Stream from {} ended", url);
                            return None;
                        }
                    }
                }
            };
        }
    }
}
