//! Command Dispatch
//!
//! Turns a parsed request into a [`Command`], runs the matching request
//! operation under the configured [`Deadline`], and encodes the outcome as a
//! RESP reply.
//!
//! ## Commands
//!
//! - `SET key value [EX seconds]` → `+OK`, or `-ERR <key> already added`
//! - `GET key` → the value, or `$-1` if nothing is stored
//! - `TTL key` → whole seconds left, `0` if expired but not yet swept,
//!   `-2` if nothing is stored
//! - `PING [message]`, `QUIT`
//!
//! A request that outlives the deadline is answered with
//! `-TIMEOUT deadline of <n>ms exceeded`.

use crate::commands::deadline::{Deadline, DeadlineError};
use crate::commands::request::{handle_get, handle_set, RequestError, Response};
use crate::config::{Config, MAX_TTL_SECS};
use crate::protocol::{Request, RespValue};
use crate::storage::Store;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reply for `TTL` on a key that is not stored (same as Redis).
const TTL_MISSING: i64 = -2;

/// A validated command.
///
/// Parameter *presence* is not checked here: a missing key or value is
/// passed on as an empty string and rejected by the request operation,
/// inside the deadline race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping(Option<Bytes>),
    Set {
        key: String,
        value: String,
        ttl_seconds: Option<u64>,
    },
    Get {
        key: String,
    },
    Ttl {
        key: String,
    },
    Quit,
}

impl Command {
    /// Parses a command from its RESP arguments.
    ///
    /// Returns the error reply to send back if the command is unknown or
    /// malformed.
    pub fn from_request(mut request: Request) -> Result<Self, RespValue> {
        if request.is_empty() {
            return Err(RespValue::error("ERR empty command"));
        }
        let name = String::from_utf8_lossy(&request[0]).to_uppercase();
        let mut args = request.drain(1..);

        let command = match name.as_str() {
            "PING" => Command::Ping(args.next()),
            "QUIT" => Command::Quit,
            "SET" => {
                let key = optional_string(args.next())?;
                let value = optional_string(args.next())?;
                let ttl_seconds = match (args.next(), args.next()) {
                    (None, _) => None,
                    (Some(opt), Some(secs)) if opt.eq_ignore_ascii_case(b"EX") => {
                        Some(parse_seconds(&secs)?)
                    }
                    _ => return Err(RespValue::error("ERR syntax error")),
                };
                Command::Set {
                    key,
                    value,
                    ttl_seconds,
                }
            }
            "GET" => Command::Get {
                key: optional_string(args.next())?,
            },
            "TTL" => Command::Ttl {
                key: optional_string(args.next())?,
            },
            _ => {
                return Err(RespValue::error(format!(
                    "ERR unknown command '{}'",
                    name
                )))
            }
        };

        if args.next().is_some() {
            return Err(RespValue::error(format!(
                "ERR wrong number of arguments for '{}' command",
                name
            )));
        }
        Ok(command)
    }
}

/// Converts an argument to a string; an absent argument becomes empty.
fn optional_string(arg: Option<Bytes>) -> Result<String, RespValue> {
    match arg {
        None => Ok(String::new()),
        Some(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|_| RespValue::error("ERR arguments must be valid UTF-8")),
    }
}

/// Parses an `EX` argument: whole seconds in `1..=MAX_TTL_SECS`.
fn parse_seconds(arg: &[u8]) -> Result<u64, RespValue> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|secs| (1..=MAX_TTL_SECS).contains(secs))
        .ok_or_else(|| RespValue::error("ERR invalid expire time"))
}

/// Whole seconds left, saturating at `i64::MAX`.
fn seconds_reply(remaining: Duration) -> RespValue {
    RespValue::integer(i64::try_from(remaining.as_secs()).unwrap_or(i64::MAX))
}

/// Counters for request outcomes.
#[derive(Debug, Default)]
pub struct CommandStats {
    pub executed: AtomicU64,
    pub deadline_exceeded: AtomicU64,
    pub worker_lost: AtomicU64,
}

/// Executes commands against the store under a deadline.
///
/// Cheap to clone; every connection gets its own copy.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
    deadline: Deadline,
    stats: Arc<CommandStats>,
}

impl CommandHandler {
    pub fn new(store: Arc<Store>, deadline: Deadline) -> Self {
        Self {
            store,
            deadline,
            stats: Arc::new(CommandStats::default()),
        }
    }

    /// Creates a handler using the configured write timeout.
    pub fn from_config(store: Arc<Store>, config: &Config) -> Self {
        Self::new(store, Deadline::new(config.write_timeout()))
    }

    pub fn stats(&self) -> &CommandStats {
        &self.stats
    }

    /// Runs `SET` under the deadline.
    pub async fn set(
        &self,
        key: String,
        value: String,
        ttl_seconds: Option<u64>,
    ) -> Result<Response, DeadlineError> {
        let work = handle_set(Arc::clone(&self.store), key, value, ttl_seconds);
        self.observe(self.deadline.run(work).await)
    }

    /// Runs `GET` under the deadline.
    pub async fn get(&self, key: String) -> Result<Response, DeadlineError> {
        let work = handle_get(Arc::clone(&self.store), key);
        self.observe(self.deadline.run(work).await)
    }

    fn observe(
        &self,
        outcome: Result<Response, DeadlineError>,
    ) -> Result<Response, DeadlineError> {
        self.stats.executed.fetch_add(1, Ordering::Relaxed);
        match &outcome {
            Ok(response) if !response.success => {
                debug!(message = %response.message, "Request failed");
            }
            Ok(_) => {}
            Err(DeadlineError::Exceeded(_)) => {
                self.stats.deadline_exceeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e @ DeadlineError::WorkerLost) => {
                self.stats.worker_lost.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Request worker failed");
            }
        }
        outcome
    }

    /// Executes a command and returns the reply.
    pub async fn execute(&self, command: Command) -> RespValue {
        match command {
            Command::Ping(None) => RespValue::pong(),
            Command::Ping(Some(message)) => RespValue::bulk_string(message),
            Command::Quit => RespValue::ok(),
            Command::Set {
                key,
                value,
                ttl_seconds,
            } => match self.set(key, value, ttl_seconds).await {
                Ok(response) if response.success => RespValue::ok(),
                Ok(response) => failure_reply(&response),
                Err(e) => deadline_reply(&e),
            },
            Command::Get { key } => match self.get(key).await {
                Ok(Response {
                    result: Some(entry),
                    ..
                }) => RespValue::bulk_string(entry.value().to_string()),
                Ok(Response {
                    error: Some(RequestError::NotFound),
                    ..
                }) => RespValue::null(),
                Ok(response) => failure_reply(&response),
                Err(e) => deadline_reply(&e),
            },
            Command::Ttl { key } => match self.get(key).await {
                Ok(Response {
                    result: Some(entry),
                    ..
                }) => seconds_reply(entry.ttl_remaining()),
                Ok(Response {
                    error: Some(RequestError::NotFound),
                    ..
                }) => RespValue::integer(TTL_MISSING),
                Ok(response) => failure_reply(&response),
                Err(e) => deadline_reply(&e),
            },
        }
    }
}

fn failure_reply(response: &Response) -> RespValue {
    RespValue::error(format!("ERR {}", response.message))
}

fn deadline_reply(error: &DeadlineError) -> RespValue {
    match error {
        DeadlineError::Exceeded(_) => RespValue::error(format!("TIMEOUT {}", error)),
        DeadlineError::WorkerLost => RespValue::error(format!("ERR {}", error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        let store = Arc::new(Store::new(Duration::from_secs(10), Duration::from_secs(1)));
        CommandHandler::new(store, Deadline::new(Duration::from_secs(2)))
    }

    fn make_command(args: &[&str]) -> Command {
        let request = args.iter().map(|s| Bytes::from(s.to_string())).collect();
        Command::from_request(request).unwrap()
    }

    #[test]
    fn test_parse_set_with_ttl() {
        assert_eq!(
            make_command(&["set", "foo", "bar", "ex", "30"]),
            Command::Set {
                key: "foo".into(),
                value: "bar".into(),
                ttl_seconds: Some(30),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        let parse = |args: &[&str]| {
            Command::from_request(args.iter().map(|s| Bytes::from(s.to_string())).collect())
        };

        assert_eq!(
            parse(&["FLUSHALL"]),
            Err(RespValue::error("ERR unknown command 'FLUSHALL'"))
        );
        assert_eq!(
            parse(&["SET", "k", "v", "EX"]),
            Err(RespValue::error("ERR syntax error"))
        );
        assert_eq!(
            parse(&["SET", "k", "v", "EX", "soon"]),
            Err(RespValue::error("ERR invalid expire time"))
        );
        assert_eq!(
            parse(&["GET", "a", "b"]),
            Err(RespValue::error("ERR wrong number of arguments for 'GET' command"))
        );
    }

    #[test]
    fn test_missing_arguments_reach_validation() {
        assert_eq!(
            make_command(&["SET", "foo"]),
            Command::Set {
                key: "foo".into(),
                value: String::new(),
                ttl_seconds: None,
            }
        );
    }

    #[tokio::test]
    async fn test_ping() {
        let handler = create_handler();
        assert_eq!(handler.execute(make_command(&["PING"])).await, RespValue::pong());
        assert_eq!(
            handler.execute(make_command(&["PING", "hello"])).await,
            RespValue::bulk_string("hello")
        );
    }

    #[tokio::test]
    async fn test_set_get() {
        let handler = create_handler();

        let reply = handler.execute(make_command(&["SET", "foo", "bar"])).await;
        assert_eq!(reply, RespValue::ok());

        let reply = handler.execute(make_command(&["GET", "foo"])).await;
        assert_eq!(reply, RespValue::bulk_string("bar"));
    }

    #[tokio::test]
    async fn test_set_existing_key() {
        let handler = create_handler();

        handler.execute(make_command(&["SET", "foo", "bar"])).await;
        let reply = handler.execute(make_command(&["SET", "foo", "baz"])).await;
        assert_eq!(reply, RespValue::error("ERR foo already added"));

        let reply = handler.execute(make_command(&["GET", "foo"])).await;
        assert_eq!(reply, RespValue::bulk_string("bar"));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let handler = create_handler();
        let reply = handler.execute(make_command(&["GET", "nonexistent"])).await;
        assert_eq!(reply, RespValue::null());
    }

    #[tokio::test]
    async fn test_validation_failure() {
        let handler = create_handler();
        let reply = handler.execute(make_command(&["SET", "foo"])).await;
        assert_eq!(reply, RespValue::error("ERR parameter 'value' is missing"));

        let reply = handler.execute(make_command(&["GET"])).await;
        assert_eq!(reply, RespValue::error("ERR parameter 'key' is missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl() {
        let handler = create_handler();

        handler
            .execute(make_command(&["SET", "foo", "bar", "EX", "5"]))
            .await;
        assert_eq!(
            handler.execute(make_command(&["TTL", "foo"])).await,
            RespValue::integer(5)
        );
        assert_eq!(
            handler.execute(make_command(&["TTL", "missing"])).await,
            RespValue::integer(-2)
        );
    }

    #[tokio::test]
    async fn test_direct_set_get_outcomes() {
        let handler = create_handler();

        let response = handler.set("foo".into(), "bar".into(), None).await.unwrap();
        assert!(response.success);

        let response = handler.get("foo".into()).await.unwrap();
        assert_eq!(response.result.unwrap().value(), "bar");
        assert_eq!(handler.stats().executed.load(Ordering::Relaxed), 2);
        assert_eq!(handler.stats().deadline_exceeded.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_huge_expire_time_rejected() {
        let handler = create_handler();

        let request = ["SET", "k", "v", "EX", "18446744073709551615"]
            .iter()
            .map(|s| Bytes::from(s.to_string()))
            .collect();
        assert_eq!(
            Command::from_request(request),
            Err(RespValue::error("ERR invalid expire time"))
        );

        let over_cap = (MAX_TTL_SECS + 1).to_string();
        let request = ["SET", "k", "v", "EX", over_cap.as_str()]
            .iter()
            .map(|s| Bytes::from(s.to_string()))
            .collect();
        assert!(Command::from_request(request).is_err());

        // Same bound as Redis: EX must be positive.
        let request = ["SET", "k", "v", "EX", "0"]
            .iter()
            .map(|s| Bytes::from(s.to_string()))
            .collect();
        assert!(Command::from_request(request).is_err());

        // The store is untouched and still usable.
        let reply = handler.execute(make_command(&["SET", "k", "v"])).await;
        assert_eq!(reply, RespValue::ok());
        assert_eq!(handler.stats().worker_lost.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_overflowing_ttl_reaches_store_as_error() {
        // Bypasses the parser: the store itself must refuse, not panic.
        let handler = create_handler();

        let reply = handler
            .execute(Command::Set {
                key: "k".into(),
                value: "v".into(),
                ttl_seconds: Some(u64::MAX),
            })
            .await;
        assert_eq!(reply, RespValue::error("ERR invalid expire time"));
        assert_eq!(handler.stats().worker_lost.load(Ordering::Relaxed), 0);

        let reply = handler.execute(make_command(&["SET", "k", "v"])).await;
        assert_eq!(reply, RespValue::ok());
    }

    #[test]
    fn test_seconds_reply_saturates() {
        assert_eq!(seconds_reply(Duration::from_millis(4_900)), RespValue::integer(4));
        assert_eq!(seconds_reply(Duration::MAX), RespValue::integer(i64::MAX));
    }

    #[test]
    fn test_deadline_reply() {
        let reply = deadline_reply(&DeadlineError::Exceeded(Duration::from_secs(2)));
        assert_eq!(reply, RespValue::error("TIMEOUT deadline of 2000ms exceeded"));
    }
}
