//! Celery message protocol v2 over the Redis transport.
//!
//! Submissions are JSON envelopes pushed onto the queue list; results are read from
//! the `celery-task-meta-<id>` keys the workers' result backend writes.
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use redis::{AsyncCommands, aio::MultiplexedConnection};
use serde_json::{Value, json};
use tracing::{debug, trace};

use taskdock_core::{Broker, BrokerError, Submission};
use taskdock_model::{ResultState, TaskHandle};

use crate::{broker_error, connect};

const META_PREFIX: &str = "celery-task-meta-";

/// Result backend key of an invocation.
pub fn meta_key(handle: &TaskHandle) -> String {
    format!("{META_PREFIX}{handle}")
}

/// Serialize `submission` as a protocol v2 message with id `handle`.
pub fn encode_message(submission: &Submission, handle: &TaskHandle, origin: &str) -> Value {
    let body = json!([
        submission.args,
        submission.kwargs,
        { "callbacks": null, "errbacks": null, "chain": null, "chord": null }
    ]);
    let id = handle.as_str();
    json!({
        "body": STANDARD.encode(body.to_string()),
        "content-encoding": "utf-8",
        "content-type": "application/json",
        "headers": {
            "lang": "py",
            "task": submission.task,
            "id": id,
            "shadow": null,
            "eta": null,
            "expires": null,
            "group": null,
            "group_index": null,
            "retries": 0,
            "timelimit": [null, null],
            "root_id": id,
            "parent_id": null,
            "argsrepr": Value::Array(submission.args.clone()).to_string(),
            "kwargsrepr": Value::Object(submission.kwargs.clone()).to_string(),
            "origin": origin,
            "ignore_result": false,
        },
        "properties": {
            "correlation_id": id,
            "reply_to": uuid::Uuid::new_v4().to_string(),
            "delivery_mode": 2,
            "delivery_info": { "exchange": "", "routing_key": submission.queue },
            "priority": 0,
            "body_encoding": "base64",
            "delivery_tag": uuid::Uuid::new_v4().to_string(),
        },
    })
}

/// Interpret a result backend record; `None` (no record yet) is pending.
pub fn decode_meta(raw: Option<&str>) -> Result<ResultState, BrokerError> {
    let Some(raw) = raw else {
        return Ok(ResultState::Pending);
    };
    let meta: Value = serde_json::from_str(raw)
        .map_err(|e| BrokerError::Protocol(format!("invalid result record: {e}")))?;
    let status = meta
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| BrokerError::Protocol("result record has no status".into()))?;
    let result = meta.get("result").cloned().unwrap_or(Value::Null);

    Ok(match status {
        "SUCCESS" => ResultState::Success { value: result },
        "FAILURE" => ResultState::Failure {
            error: failure_message(&result),
        },
        "REVOKED" => ResultState::Failure {
            error: "task was revoked".into(),
        },
        _ => ResultState::Pending,
    })
}

/// `ExcType: message` from a serialized exception.
fn failure_message(result: &Value) -> String {
    let exc_type = result.get("exc_type").and_then(Value::as_str);
    let message = match result.get("exc_message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
        None => match result {
            Value::String(s) => s.clone(),
            Value::Null => "task failed".to_string(),
            other => other.to_string(),
        },
    };
    match exc_type {
        Some(t) => format!("{t}: {message}"),
        None => message,
    }
}

/// Broker speaking the Celery protocol through Redis.
#[derive(Clone)]
pub struct CeleryBroker {
    broker: MultiplexedConnection,
    backend: MultiplexedConnection,
    origin: String,
}

impl CeleryBroker {
    /// Connect to the broker and result backend databases.
    pub async fn connect(broker_url: &str, backend_url: &str) -> Result<Self, BrokerError> {
        let broker = connect(broker_url)
            .await
            .map_err(|e| BrokerError::Unavailable(format!("broker connection failed: {e}")))?;
        let backend = connect(backend_url)
            .await
            .map_err(|e| BrokerError::Unavailable(format!("result backend connection failed: {e}")))?;
        Ok(Self {
            broker,
            backend,
            origin: "taskdock".to_string(),
        })
    }

    /// Value of the `origin` header.
    #[inline]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

#[async_trait]
impl Broker for CeleryBroker {
    fn name(&self) -> &'static str {
        "celery"
    }

    async fn submit(&self, submission: &Submission) -> Result<TaskHandle, BrokerError> {
        let handle = TaskHandle::generate();
        let message = encode_message(submission, &handle, &self.origin).to_string();

        let mut conn = self.broker.clone();
        let _: i64 = conn
            .lpush(&submission.queue, message)
            .await
            .map_err(|e| broker_error(e, &submission.queue))?;
        debug!(task = %submission.task, queue = %submission.queue, task_id = %handle, "celery message published");
        Ok(handle)
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<ResultState, BrokerError> {
        let key = meta_key(handle);
        let mut conn = self.backend.clone();
        let raw: Option<String> = conn.get(&key).await.map_err(|e| broker_error(e, &key))?;
        let state = decode_meta(raw.as_deref())?;
        trace!(task_id = %handle, state = state.as_label(), "result polled");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn submission() -> Submission {
        let mut kwargs = Map::new();
        kwargs.insert("width".into(), json!(640));
        Submission {
            task: "mcp_app.resize_image".into(),
            queue: "images".into(),
            args: vec![json!("cat.png")],
            kwargs,
        }
    }

    #[test]
    fn message_carries_task_routing_and_body() {
        let handle = TaskHandle::new("7d0c1c9e-0000-4000-8000-000000000001");
        let msg = encode_message(&submission(), &handle, "taskdock@host");

        assert_eq!(msg["headers"]["task"], "mcp_app.resize_image");
        assert_eq!(msg["headers"]["id"], handle.as_str());
        assert_eq!(msg["headers"]["root_id"], handle.as_str());
        assert_eq!(msg["headers"]["origin"], "taskdock@host");
        assert_eq!(msg["properties"]["correlation_id"], handle.as_str());
        assert_eq!(msg["properties"]["delivery_info"]["routing_key"], "images");
        assert_eq!(msg["properties"]["body_encoding"], "base64");

        let raw = STANDARD.decode(msg["body"].as_str().unwrap()).unwrap();
        let body: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(body[0], json!(["cat.png"]));
        assert_eq!(body[1], json!({ "width": 640 }));
        assert_eq!(body[2]["chain"], Value::Null);
    }

    #[test]
    fn missing_or_running_records_are_pending() {
        assert_eq!(decode_meta(None).unwrap(), ResultState::Pending);
        assert_eq!(
            decode_meta(Some(r#"{"status":"STARTED","result":{"pid":12}}"#)).unwrap(),
            ResultState::Pending
        );
    }

    #[test]
    fn success_record_yields_value() {
        let raw = r#"{"status":"SUCCESS","result":{"width":640},"traceback":null,"task_id":"x"}"#;
        assert_eq!(
            decode_meta(Some(raw)).unwrap(),
            ResultState::Success {
                value: json!({ "width": 640 })
            }
        );
    }

    #[test]
    fn failure_record_yields_exception_text() {
        let raw = r#"{"status":"FAILURE","result":{"exc_type":"ValueError","exc_message":["width must be positive"],"exc_module":"builtins"}}"#;
        assert_eq!(
            decode_meta(Some(raw)).unwrap(),
            ResultState::Failure {
                error: "ValueError: width must be positive".into()
            }
        );
        assert!(matches!(
            decode_meta(Some(r#"{"status":"REVOKED"}"#)).unwrap(),
            ResultState::Failure { .. }
        ));
    }

    #[test]
    fn garbage_record_is_protocol_error() {
        assert!(matches!(
            decode_meta(Some("not json")),
            Err(BrokerError::Protocol(_))
        ));
        assert!(matches!(
            decode_meta(Some(r#"{"result":1}"#)),
            Err(BrokerError::Protocol(_))
        ));
    }

    #[test]
    fn meta_key_format() {
        assert_eq!(meta_key(&TaskHandle::new("abc")), "celery-task-meta-abc");
    }
}
