//! Server-sent events from the realtime database streaming endpoint.
//!
//! [`SseParser`] splits a byte stream into events regardless of how the
//! network chunks it. [`ServerEvent`] interprets the database's event types,
//! and [`Snapshot`] folds `put` / `patch` events into the full value at the
//! subscribed location.

use blaze_api::{StoreError, Value};
use tracing::debug;

use crate::models::StreamPayload;

/// One raw event: the `event:` name and the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes as they arrive. `\r` is dropped so CRLF streams parse
    /// like LF streams.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));
    }

    /// The next complete event, if one has been fully received.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                return Some(event);
            }
        }
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_empty() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: if event.is_empty() {
            "message".to_string()
        } else {
            event
        },
        data: data.join("\n"),
    })
}

/// Event types of the database stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Replace the value at `path` (relative to the subscribed location)
    Put { path: String, data: Value },
    /// Merge the children of `data` into the value at `path`
    Patch { path: String, data: Value },
    KeepAlive,
    /// The security rules no longer allow reading the location
    Cancel,
    /// The auth token expired or was revoked
    AuthRevoked,
    Other(String),
}

impl ServerEvent {
    pub fn parse(raw: &SseEvent) -> Result<Self, StoreError> {
        let payload = || -> Result<StreamPayload, StoreError> {
            serde_json::from_str(&raw.data).map_err(|e| StoreError::InvalidData {
                message: format!("Malformed {} event: {}", raw.event, e),
            })
        };

        Ok(match raw.event.as_str() {
            "put" => {
                let p = payload()?;
                ServerEvent::Put {
                    path: p.path,
                    data: Value::from(p.data),
                }
            }
            "patch" => {
                let p = payload()?;
                ServerEvent::Patch {
                    path: p.path,
                    data: Value::from(p.data),
                }
            }
            "keep-alive" => ServerEvent::KeepAlive,
            "cancel" => ServerEvent::Cancel,
            "auth_revoked" => ServerEvent::AuthRevoked,
            other => ServerEvent::Other(other.to_string()),
        })
    }
}

/// What applying one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The snapshot changed; deliver it
    Changed,
    Ignored,
    /// The stream is over
    Closed(StoreError),
}

/// Full current value at the subscribed location.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    value: Value,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self { value: Value::Null }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn apply(&mut self, event: ServerEvent) -> Applied {
        match event {
            ServerEvent::Put { path, data } => {
                self.value.set_path(&path, data);
                Applied::Changed
            }
            ServerEvent::Patch { path, data } => match data {
                Value::Object(children) => {
                    let base = path.trim_end_matches('/');
                    for (key, child) in children {
                        self.value.set_path(&format!("{base}/{key}"), child);
                    }
                    Applied::Changed
                }
                other => {
                    self.value.set_path(&path, other);
                    Applied::Changed
                }
            },
            ServerEvent::KeepAlive => Applied::Ignored,
            ServerEvent::Cancel => Applied::Closed(StoreError::PermissionDenied {
                message: "listener cancelled by security rules".to_string(),
            }),
            ServerEvent::AuthRevoked => Applied::Closed(StoreError::PermissionDenied {
                message: "auth token revoked or expired".to_string(),
            }),
            ServerEvent::Other(name) => {
                debug!("Ignoring stream event '{}'", name);
                Applied::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_split_across_chunks() {
        let mut parser = SseParser::new();
        parser.feed(b"event: put\r\ndata: {\"path\":\"/\",");
        assert_eq!(parser.next_event(), None);

        parser.feed(b"\"data\":{\"a\":1}}\r\n\r\n: comment\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            parser.next_event(),
            Some(SseEvent {
                event: "put".to_string(),
                data: r#"{"path":"/","data":{"a":1}}"#.to_string(),
            })
        );
        assert_eq!(
            parser.next_event().map(|e| e.event),
            Some("keep-alive".to_string())
        );
        assert_eq!(parser.next_event(), None);
    }

    #[test]
    fn test_multi_line_data_is_joined() {
        let mut parser = SseParser::new();
        parser.feed(b"data: one\ndata: two\n\n");
        let event = parser.next_event().unwrap();
        assert_eq!(event.event, "message");
        assert_eq!(event.data, "one\ntwo");
    }

    #[test]
    fn test_put_and_patch_fold_into_snapshot() {
        let mut snapshot = Snapshot::new();
        let events = [
            r#"{"path": "/", "data": {"a": 1, "b": {"c": 2}}}"#,
            r#"{"path": "/b", "data": {"d": 3, "c": null}}"#,
            r#"{"path": "/a", "data": null}"#,
        ];

        for (i, data) in events.iter().enumerate() {
            let raw = SseEvent {
                event: if i == 1 { "patch" } else { "put" }.to_string(),
                data: data.to_string(),
            };
            let event = ServerEvent::parse(&raw).unwrap();
            assert_eq!(snapshot.apply(event), Applied::Changed);
        }

        assert_eq!(snapshot.value(), &Value::from(json!({"b": {"d": 3}})));
    }

    #[test]
    fn test_writes_into_array_children_keep_siblings() {
        let mut snapshot = Snapshot::new();
        let apply = |snapshot: &mut Snapshot, event: &str, data: serde_json::Value| {
            let raw = SseEvent {
                event: event.to_string(),
                data: data.to_string(),
            };
            snapshot.apply(ServerEvent::parse(&raw).unwrap())
        };

        apply(&mut snapshot, "put", json!({"path": "/", "data": {"tags": ["a", "b"]}}));
        apply(&mut snapshot, "put", json!({"path": "/tags/1", "data": "x"}));
        assert_eq!(snapshot.value(), &Value::from(json!({"tags": ["a", "x"]})));

        apply(&mut snapshot, "patch", json!({"path": "/tags", "data": {"2": "y"}}));
        assert_eq!(snapshot.value(), &Value::from(json!({"tags": ["a", "x", "y"]})));
    }

    #[test]
    fn test_control_events() {
        let raw = |event: &str| SseEvent {
            event: event.to_string(),
            data: "null".to_string(),
        };
        let mut snapshot = Snapshot::new();

        assert_eq!(
            snapshot.apply(ServerEvent::parse(&raw("keep-alive")).unwrap()),
            Applied::Ignored
        );
        assert!(matches!(
            snapshot.apply(ServerEvent::parse(&raw("cancel")).unwrap()),
            Applied::Closed(StoreError::PermissionDenied { .. })
        ));
        assert!(matches!(
            snapshot.apply(ServerEvent::parse(&raw("auth_revoked")).unwrap()),
            Applied::Closed(_)
        ));
    }

    #[test]
    fn test_malformed_put_is_invalid_data() {
        let raw = SseEvent {
            event: "put".to_string(),
            data: "not json".to_string(),
        };
        assert!(matches!(
            ServerEvent::parse(&raw),
            Err(StoreError::InvalidData { .. })
        ));
    }
}
