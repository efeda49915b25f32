//! SanitizingMutationGateway - validated, sanitized, audited access to the
//! realtime store.
//!
//! A request names a path, a [`Mutation`] and optionally an actor. Dispatch
//! checks the connection, validates the request, and for creates and updates
//! builds the write payload as `clean(payload ∪ audit block)` before handing
//! it to the store. Reads and subscriptions return raw store values.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use blaze_api::{StoreError, Value, ValueMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Instrument};

use crate::audit::{AuditRecord, AuditStamper, ANONYMOUS_ACTOR};
use crate::connection::Connection;
use crate::error::{GatewayError, Result};
use crate::sanitize;
use crate::subscription::SubscriptionHandle;
use crate::traits::RealtimeStore;

/// Receives the full value at a subscribed path after every change.
pub type ValueCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Receives errors reported by the store for a subscription.
pub type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

/// The closed set of gateway actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Delete,
    CreateWithGeneratedId,
    Get,
    Subscribe,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::CreateWithGeneratedId,
        Action::Get,
        Action::Subscribe,
    ];

    /// Short lowercase name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::CreateWithGeneratedId => "createWithId",
            Action::Get => "get",
            Action::Subscribe => "onValue",
        }
    }

    /// Whether requests with this action must carry a payload.
    pub fn requires_payload(&self) -> bool {
        matches!(
            self,
            Action::Create | Action::Update | Action::CreateWithGeneratedId
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = GatewayError;

    /// Accepts both the short names (`createWithId`, `onValue`, ...) and the
    /// variant names (`CreateWithGeneratedId`, `Subscribe`, ...).
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" | "Create" => Ok(Action::Create),
            "update" | "Update" => Ok(Action::Update),
            "delete" | "Delete" => Ok(Action::Delete),
            "createWithId" | "CreateWithGeneratedId" => Ok(Action::CreateWithGeneratedId),
            "get" | "Get" => Ok(Action::Get),
            "onValue" | "Subscribe" => Ok(Action::Subscribe),
            other => Err(GatewayError::UnsupportedAction {
                action: other.to_string(),
            }),
        }
    }
}

/// What to do at the request path. Each variant carries only what it needs.
pub enum Mutation {
    Create {
        payload: Value,
    },
    /// Merge into the existing value rather than replacing it.
    Update {
        payload: Value,
    },
    Delete,
    CreateWithGeneratedId {
        payload: Value,
    },
    Get,
    Subscribe {
        on_change: ValueCallback,
        on_error: Option<ErrorCallback>,
    },
}

impl Mutation {
    pub fn action(&self) -> Action {
        match self {
            Mutation::Create { .. } => Action::Create,
            Mutation::Update { .. } => Action::Update,
            Mutation::Delete => Action::Delete,
            Mutation::CreateWithGeneratedId { .. } => Action::CreateWithGeneratedId,
            Mutation::Get => Action::Get,
            Mutation::Subscribe { .. } => Action::Subscribe,
        }
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Create { payload }
            | Mutation::Update { payload }
            | Mutation::CreateWithGeneratedId { payload } => f
                .debug_struct(self.action().name())
                .field("payload", payload)
                .finish(),
            Mutation::Subscribe { on_error, .. } => f
                .debug_struct(self.action().name())
                .field("has_error_handler", &on_error.is_some())
                .finish(),
            Mutation::Delete | Mutation::Get => f.write_str(self.action().name()),
        }
    }
}

/// One gateway call. Lives for the duration of a single dispatch.
#[derive(Debug)]
pub struct MutationRequest {
    pub path: String,
    pub mutation: Mutation,
    /// Who performs the action; `"anonymous"` when unset.
    pub actor_id: Option<String>,
}

impl MutationRequest {
    pub fn new(path: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            path: path.into(),
            mutation,
            actor_id: None,
        }
    }

    pub fn create(path: impl Into<String>, payload: Value) -> Self {
        Self::new(path, Mutation::Create { payload })
    }

    pub fn update(path: impl Into<String>, payload: Value) -> Self {
        Self::new(path, Mutation::Update { payload })
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, Mutation::Delete)
    }

    pub fn create_with_id(path: impl Into<String>, payload: Value) -> Self {
        Self::new(path, Mutation::CreateWithGeneratedId { payload })
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path, Mutation::Get)
    }

    pub fn subscribe(path: impl Into<String>, on_change: ValueCallback) -> Self {
        Self::new(
            path,
            Mutation::Subscribe {
                on_change,
                on_error: None,
            },
        )
    }

    /// Attach an error handler to a `Subscribe` request. No-op otherwise.
    pub fn on_error(mut self, handler: ErrorCallback) -> Self {
        if let Mutation::Subscribe { on_error, .. } = &mut self.mutation {
            *on_error = Some(handler);
        }
        self
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// The acting identity, defaulting to `"anonymous"`.
    pub fn actor(&self) -> &str {
        self.actor_id.as_deref().unwrap_or(ANONYMOUS_ACTOR)
    }
}

/// Loosely-typed request as it arrives from scripts or JSON input:
/// `{ "path": ..., "action": "createWithId", "data": {...}, "actionBy": ... }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMutationRequest {
    #[serde(default)]
    pub path: String,
    /// Defaults to `update` when missing.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub action_by: Option<String>,
}

impl RawMutationRequest {
    /// Convert to a typed request. `listener` is required for `onValue`.
    ///
    /// Validates the action name and payload presence; the path is checked by
    /// dispatch.
    pub fn into_request(self, listener: Option<ValueCallback>) -> Result<MutationRequest> {
        let action = match self.action.as_deref() {
            Some(name) => name.parse::<Action>()?,
            None => Action::Update,
        };

        let payload = || -> Result<Value> {
            match self.data.clone() {
                Some(data) => Ok(data),
                None => Err(GatewayError::validation(format!(
                    "action '{}' requires data",
                    action
                ))),
            }
        };

        let mutation = match action {
            Action::Create => Mutation::Create {
                payload: payload()?,
            },
            Action::Update => Mutation::Update {
                payload: payload()?,
            },
            Action::CreateWithGeneratedId => Mutation::CreateWithGeneratedId {
                payload: payload()?,
            },
            Action::Delete => Mutation::Delete,
            Action::Get => Mutation::Get,
            Action::Subscribe => Mutation::Subscribe {
                on_change: listener.ok_or_else(|| {
                    GatewayError::validation("action 'onValue' requires a change listener")
                })?,
                on_error: None,
            },
        };

        Ok(MutationRequest {
            path: self.path,
            mutation,
            actor_id: self.action_by,
        })
    }
}

/// Result of a dispatch, shaped by the action.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Create, Update, Delete
    Ack,
    /// CreateWithGeneratedId: the new child key
    GeneratedKey(String),
    /// Get: the raw stored value, `Null` when nothing is stored
    Value(Value),
    /// Subscribe: the listener handle
    Subscription(SubscriptionHandle),
}

impl DispatchOutcome {
    pub fn into_key(self) -> Option<String> {
        match self {
            DispatchOutcome::GeneratedKey(key) => Some(key),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            DispatchOutcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_subscription(self) -> Option<SubscriptionHandle> {
        match self {
            DispatchOutcome::Subscription(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Which audit block a write receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditVerb {
    Created,
    Updated,
}

impl AuditVerb {
    pub fn at_key(&self) -> &'static str {
        match self {
            AuditVerb::Created => "createdAt",
            AuditVerb::Updated => "updatedAt",
        }
    }

    pub fn by_key(&self) -> &'static str {
        match self {
            AuditVerb::Created => "createdBy",
            AuditVerb::Updated => "updatedBy",
        }
    }
}

/// Build the value actually written: the payload's fields plus exactly one
/// audit block, cleaned of absent values.
///
/// The payload must be an object. Payload keys that collide with the audit
/// keys are replaced by the audit block.
pub fn stamped_payload(payload: Value, verb: AuditVerb, record: &AuditRecord) -> Result<Value> {
    let mut fields: ValueMap = match payload {
        Value::Object(fields) => fields,
        Value::Absent => {
            return Err(GatewayError::validation("payload is required"));
        }
        other => {
            return Err(GatewayError::validation(format!(
                "payload must be an object, got {}",
                other.kind()
            )));
        }
    };

    fields.insert(verb.at_key().to_string(), audit_timestamp(record));
    fields.insert(verb.by_key().to_string(), record.to_value());

    Ok(sanitize::clean(Value::Object(fields)))
}

/// The gateway. Cheap to clone; holds no per-request state.
#[derive(Clone, Debug)]
pub struct SanitizingMutationGateway {
    connection: Connection,
    stamper: AuditStamper,
}

impl SanitizingMutationGateway {
    /// Gateway stamping writes with the current process environment.
    pub fn new(connection: Connection) -> Self {
        Self::with_stamper(connection, AuditStamper::default())
    }

    pub fn with_stamper(connection: Connection, stamper: AuditStamper) -> Self {
        Self {
            connection,
            stamper,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Validate and execute one request.
    ///
    /// Checks, in order and before any side effect: the connection is
    /// initialized, the path is non-empty, the payload (for creates and
    /// updates) is present and an object.
    pub async fn dispatch(&self, request: MutationRequest) -> Result<DispatchOutcome> {
        let store = self.connection.database()?;
        validate_path(&request.path)?;

        let action = request.mutation.action();
        let span = info_span!(
            "dispatch",
            path = %request.path,
            action = %action,
            actor = %request.actor()
        );

        self.execute(store, request).instrument(span).await
    }

    async fn execute(
        &self,
        store: Arc<dyn RealtimeStore>,
        request: MutationRequest,
    ) -> Result<DispatchOutcome> {
        let actor = request.actor().to_string();
        let path = request.path;

        match request.mutation {
            Mutation::Create { payload } => {
                let value = self.prepare_write(payload, AuditVerb::Created, &actor)?;
                store
                    .set(&path, value)
                    .await
                    .map_err(|e| GatewayError::store("create", &path, e))?;
                debug!("Created value at '{}'", path);
                Ok(DispatchOutcome::Ack)
            }
            Mutation::Update { payload } => {
                let value = self.prepare_write(payload, AuditVerb::Updated, &actor)?;
                store
                    .update(&path, value)
                    .await
                    .map_err(|e| GatewayError::store("update", &path, e))?;
                debug!("Updated value at '{}'", path);
                Ok(DispatchOutcome::Ack)
            }
            Mutation::CreateWithGeneratedId { payload } => {
                let value = self.prepare_write(payload, AuditVerb::Created, &actor)?;
                let key = store
                    .push(&path, value)
                    .await
                    .map_err(|e| GatewayError::store("createWithId", &path, e))?;
                debug!("Created value at '{}/{}'", path, key);
                Ok(DispatchOutcome::GeneratedKey(key))
            }
            Mutation::Delete => {
                store
                    .remove(&path)
                    .await
                    .map_err(|e| GatewayError::store("delete", &path, e))?;
                debug!("Deleted '{}'", path);
                Ok(DispatchOutcome::Ack)
            }
            Mutation::Get => {
                let value = store
                    .get(&path)
                    .await
                    .map_err(|e| GatewayError::store("get", &path, e))?;
                Ok(DispatchOutcome::Value(value))
            }
            Mutation::Subscribe {
                on_change,
                on_error,
            } => {
                let stream = store.subscribe(&path);
                debug!("Subscribed to '{}'", path);
                Ok(DispatchOutcome::Subscription(SubscriptionHandle::spawn(
                    path, stream, on_change, on_error,
                )))
            }
        }
    }

    /// Validate and execute a loosely-typed request.
    ///
    /// Same checks as [`dispatch`](Self::dispatch), with the action name
    /// checked after the path: initialization, path, action, payload.
    pub async fn dispatch_raw(
        &self,
        raw: RawMutationRequest,
        listener: Option<ValueCallback>,
    ) -> Result<DispatchOutcome> {
        self.connection.database()?;
        validate_path(&raw.path)?;
        let request = raw.into_request(listener)?;
        self.dispatch(request).await
    }

    /// Payload stamped for `verb` by `actor` at the current instant.
    fn prepare_write(&self, payload: Value, verb: AuditVerb, actor: &str) -> Result<Value> {
        let record = self.stamper.stamp_at(actor, Utc::now());
        stamped_payload(payload, verb, &record)
    }

    pub async fn create(&self, path: &str, payload: Value, actor_id: Option<&str>) -> Result<()> {
        self.dispatch(with_actor(MutationRequest::create(path, payload), actor_id))
            .await
            .map(|_| ())
    }

    pub async fn update(&self, path: &str, payload: Value, actor_id: Option<&str>) -> Result<()> {
        self.dispatch(with_actor(MutationRequest::update(path, payload), actor_id))
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.dispatch(MutationRequest::delete(path)).await.map(|_| ())
    }

    /// Create under a generated child key; returns the key.
    pub async fn create_with_id(
        &self,
        path: &str,
        payload: Value,
        actor_id: Option<&str>,
    ) -> Result<String> {
        let outcome = self
            .dispatch(with_actor(
                MutationRequest::create_with_id(path, payload),
                actor_id,
            ))
            .await?;
        outcome
            .into_key()
            .ok_or_else(|| GatewayError::validation("createWithId produced no key"))
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let outcome = self.dispatch(MutationRequest::get(path)).await?;
        outcome
            .into_value()
            .ok_or_else(|| GatewayError::validation("get produced no value"))
    }

    pub async fn subscribe(
        &self,
        path: &str,
        on_change: ValueCallback,
        on_error: Option<ErrorCallback>,
    ) -> Result<SubscriptionHandle> {
        let mut request = MutationRequest::subscribe(path, on_change);
        if let Some(handler) = on_error {
            request = request.on_error(handler);
        }
        let outcome = self.dispatch(request).await?;
        outcome
            .into_subscription()
            .ok_or_else(|| GatewayError::validation("onValue produced no subscription"))
    }
}

fn with_actor(request: MutationRequest, actor_id: Option<&str>) -> MutationRequest {
    match actor_id {
        Some(actor) => request.by(actor),
        None => request,
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(GatewayError::validation("path must not be empty"));
    }
    Ok(())
}

/// The `<verb>At` value written alongside `record`.
pub fn audit_timestamp(record: &AuditRecord) -> Value {
    Value::from(record.timestamp.as_str())
}
