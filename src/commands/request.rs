//! Request Operations
//!
//! The two operations the transport exposes. Each one validates its
//! parameters, touches the store once and produces a [`Response`]. They are
//! plain async functions so the [`CommandHandler`](super::CommandHandler) can
//! run them under a deadline.

use crate::storage::{Entry, SetError, Store};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Message carried by every successful response.
pub const SUCCESS: &str = "success";

/// Request failures that are reported to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// A required parameter was absent or empty
    #[error("parameter '{0}' is missing")]
    MissingParameter(&'static str),

    /// The store refused the entry (key already present, or bad TTL)
    #[error(transparent)]
    Rejected(#[from] SetError),

    /// Nothing is stored under the key
    #[error("Found nothing")]
    NotFound,
}

/// Result of a request, delivered to the caller through the deadline race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub message: String,
    pub result: Option<Entry>,
    pub success: bool,
    /// Why the request failed; `None` on success
    pub error: Option<RequestError>,
}

impl Response {
    pub fn ok(entry: Entry) -> Self {
        Self {
            message: SUCCESS.to_string(),
            result: Some(entry),
            success: true,
            error: None,
        }
    }

    pub fn failure(error: RequestError) -> Self {
        Self {
            message: error.to_string(),
            result: None,
            success: false,
            error: Some(error),
        }
    }
}

impl From<Result<Entry, RequestError>> for Response {
    fn from(result: Result<Entry, RequestError>) -> Self {
        match result {
            Ok(entry) => Response::ok(entry),
            Err(e) => Response::failure(e),
        }
    }
}

fn require(name: &'static str, value: &str) -> Result<(), RequestError> {
    if value.is_empty() {
        return Err(RequestError::MissingParameter(name));
    }
    Ok(())
}

/// Stores `value` under `key`.
///
/// `ttl_seconds` of `None` or `Some(0)` uses the store's default TTL.
pub async fn handle_set(
    store: Arc<Store>,
    key: String,
    value: String,
    ttl_seconds: Option<u64>,
) -> Response {
    Response::from(set_entry(&store, key, value, ttl_seconds))
}

/// Looks up `key`.
///
/// A logically expired entry that has not been swept yet is still returned.
pub async fn handle_get(store: Arc<Store>, key: String) -> Response {
    Response::from(get_entry(&store, &key))
}

fn set_entry(
    store: &Store,
    key: String,
    value: String,
    ttl_seconds: Option<u64>,
) -> Result<Entry, RequestError> {
    require("key", &key)?;
    require("value", &value)?;

    let ttl = Duration::from_secs(ttl_seconds.unwrap_or(0));
    Ok(store.set(key, value, ttl)?)
}

fn get_entry(store: &Store, key: &str) -> Result<Entry, RequestError> {
    require("key", key)?;
    store.get(key).ok_or(RequestError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_store() -> Arc<Store> {
        Arc::new(Store::new(Duration::from_secs(10), Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = create_store();

        let response = handle_set(store.clone(), "foo".into(), "bar".into(), None).await;
        assert!(response.success);
        assert_eq!(response.message, "success");
        assert_eq!(response.result.unwrap().value(), "bar");

        let response = handle_get(store, "foo".into()).await;
        assert!(response.success);
        assert_eq!(response.message, "success");
        assert_eq!(response.result.unwrap().value(), "bar");
    }

    #[tokio::test]
    async fn test_duplicate_set_scenario() {
        let store = create_store();

        handle_set(store.clone(), "foo".into(), "bar".into(), None).await;
        let response = handle_set(store.clone(), "foo".into(), "baz".into(), None).await;

        assert!(!response.success);
        assert!(response.message.contains("foo"));
        assert!(response.result.is_none());
        assert!(matches!(response.error, Some(RequestError::Rejected(SetError::AlreadyExists(_)))));

        let response = handle_get(store, "foo".into()).await;
        assert_eq!(response.result.unwrap().value(), "bar");
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let store = create_store();

        let response = handle_set(store.clone(), String::new(), "bar".into(), None).await;
        assert_eq!(response.error, Some(RequestError::MissingParameter("key")));
        assert_eq!(response.message, "parameter 'key' is missing");

        let response = handle_set(store.clone(), "foo".into(), String::new(), None).await;
        assert_eq!(response.error, Some(RequestError::MissingParameter("value")));

        let response = handle_get(store.clone(), String::new()).await;
        assert_eq!(response.error, Some(RequestError::MissingParameter("key")));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_get_miss() {
        let response = handle_get(create_store(), "nothing".into()).await;
        assert!(!response.success);
        assert_eq!(response.message, "Found nothing");
        assert_eq!(response.error, Some(RequestError::NotFound));
    }

    #[tokio::test]
    async fn test_overflowing_ttl_is_a_failed_response() {
        let store = create_store();

        let response = handle_set(store.clone(), "k".into(), "v".into(), Some(u64::MAX)).await;
        assert!(!response.success);
        assert_eq!(response.message, "invalid expire time");
        assert!(matches!(
            response.error,
            Some(RequestError::Rejected(SetError::InvalidTtl(_)))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_ttl() {
        let store = create_store();

        let response = handle_set(store.clone(), "foo".into(), "bar".into(), Some(3)).await;
        assert_eq!(response.result.unwrap().ttl_remaining(), Duration::from_secs(3));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let response = handle_get(store, "foo".into()).await;
        assert_eq!(response.result.unwrap().ttl_remaining(), Duration::from_secs(2));
    }
}
