//! Credit gate: the only read-modify-write in the pipeline.
//!
//! The usage counter is checked and incremented inside one store transaction
//! so two concurrent requests cannot both pass the limit. Admins bypass the
//! check but are still counted. Unknown users get a fresh profile.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::errors::AppError;
use crate::store::{DocumentStore, StoreError};

pub const USERS_COLLECTION: &str = "users";
pub const ROLE_ADMIN: &str = "admin";
const ROLE_USER: &str = "user";

const FIELD_ROLE: &str = "role";
const FIELD_USED: &str = "jobSearchesUsed";
const FIELD_LIMIT: &str = "jobSearchLimit";

/// Counter state after a successful charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatus {
    pub used: u64,
    pub limit: u64,
    pub is_admin: bool,
}

/// Charges one search to `user_id`, or fails with `QuotaExhausted` without
/// writing anything.
pub async fn consume_search_credit(
    store: &dyn DocumentStore,
    user_id: &str,
    default_limit: u32,
) -> Result<CreditStatus, AppError> {
    let written = store
        .transact(
            USERS_COLLECTION,
            user_id,
            Box::new(move |current| charge(current, default_limit)),
        )
        .await
        .map_err(|e| match e {
            StoreError::Aborted(message) => AppError::QuotaExhausted(message),
            other => AppError::Store(other),
        })?;

    let status = read_status(&written, default_limit);
    info!(
        "Charged job search to user {user_id}: {}/{}{}",
        status.used,
        status.limit,
        if status.is_admin { " (admin)" } else { "" }
    );
    Ok(status)
}

fn charge(current: Option<Value>, default_limit: u32) -> Result<Value, StoreError> {
    let mut profile = match current {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(StoreError::NotAnObject),
        None => {
            let mut map = Map::new();
            map.insert(FIELD_ROLE.to_string(), json!(ROLE_USER));
            map.insert(FIELD_LIMIT.to_string(), json!(default_limit));
            map
        }
    };

    let status = read_status(&Value::Object(profile.clone()), default_limit);
    if !status.is_admin && status.used >= status.limit {
        return Err(StoreError::Aborted(format!(
            "Job search limit reached ({}/{}). Upgrade your plan for more searches.",
            status.used, status.limit
        )));
    }

    profile.insert(FIELD_USED.to_string(), json!(status.used + 1));
    Ok(Value::Object(profile))
}

fn read_status(profile: &Value, default_limit: u32) -> CreditStatus {
    CreditStatus {
        used: profile.get(FIELD_USED).and_then(Value::as_u64).unwrap_or(0),
        limit: profile
            .get(FIELD_LIMIT)
            .and_then(Value::as_u64)
            .unwrap_or(u64::from(default_limit)),
        is_admin: profile.get(FIELD_ROLE).and_then(Value::as_str) == Some(ROLE_ADMIN),
    }
}
