//! PersistenceStore (§4.11): durable storage for Sessions, Events,
//! PresetQueries, Workflows. A `sqlx::PgPool`-backed repository struct, with
//! migrations run via `sqlx::migrate!` at startup.

pub mod encryption;
pub mod error;
pub mod event_emitter;
pub mod models;
pub mod repositories;

pub use encryption::{generate_encryption_key, EncryptedPayload, EncryptionService};
pub use error::{Result, StorageError};
pub use event_emitter::{create_db_event_emitter, DbEventEmitter};
pub use models::*;
pub use repositories::Database;
