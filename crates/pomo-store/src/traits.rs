//! Store trait definitions

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{AuditEvent, StoreResult};

/// Key under which the timer settings are saved
pub const SETTINGS_KEY: &str = "pomodoro_settings";

/// Key under which the session state is saved
pub const STATE_KEY: &str = "pomodoro_state";

/// Main store trait
pub trait Store: Send + Sync {
    // Key/value

    /// Load the value saved under `key`, if any
    fn load(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Save `value` under `key`, replacing what was there
    fn save(&self, key: &str, value: &Value) -> StoreResult<()>;

    // Audit log

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Most recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    fn is_healthy(&self) -> bool;
}

/// Load and decode a typed value
pub fn load_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> StoreResult<Option<T>> {
    match store.load(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode and save a typed value
pub fn save_json<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> StoreResult<()> {
    store.save(key, &serde_json::to_value(value)?)
}
