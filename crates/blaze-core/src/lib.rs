//! Sanitizing gateway over a backend-as-a-service
//!
//! Every write to the realtime store goes through the same pipeline:
//! - `sanitize::clean` strips values the store cannot represent
//! - `audit::AuditStamper` builds the `createdBy` / `updatedBy` record
//! - `gateway::SanitizingMutationGateway` validates the request and dispatches
//!   it to the `RealtimeStore` collaborator
//!
//! Credential and blob operations share the same boundary (`credentials`,
//! `blobs`) but pass data through untouched. `memory` provides in-memory
//! collaborators for tests and offline use.

pub mod audit;
pub mod blobs;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod sanitize;
pub mod subscription;
pub mod traits;

pub use audit::{
    classify_browser, AuditRecord, AuditStamper, ClientContext, HostEnvironment,
    ProcessEnvironment, StaticEnvironment, ANONYMOUS_ACTOR,
};
pub use blobs::{BlobGateway, ProgressCallback, UploadRequest};
pub use connection::{Backend, Connection};
pub use credentials::{AuthAction, AuthOutcome, CredentialGateway};
pub use error::{GatewayError, Result};
pub use gateway::{
    Action, DispatchOutcome, ErrorCallback, Mutation, MutationRequest, RawMutationRequest,
    SanitizingMutationGateway, ValueCallback,
};
pub use subscription::SubscriptionHandle;
pub use traits::{AuthProvider, BlobStore, RealtimeStore, TransferProgress};

pub use blaze_api::{AuthError, StoreError, Value, ValueMap};
