use launcher_protocol::{Command, CommandResponse, ErrorCode};
use launcher_session::{BrokerError, SessionBroker};
use serde_json::Value;
use std::sync::Arc;

/// Shared node state accessible by all client connections.
pub struct NodeState {
    pub broker: Arc<SessionBroker>,
}

impl NodeState {
    pub fn new(broker: Arc<SessionBroker>) -> Arc<Self> {
        Arc::new(Self { broker })
    }
}

/// Handle a single command from a client.
pub async fn handle_command(state: &NodeState, cmd: Command) -> CommandResponse {
    tracing::debug!(?cmd, "handling command");
    match cmd {
        Command::GetDevice => match state.broker.device_view().await {
            Ok(view) => ok_response(Some(Value::Object(view))),
            Err(e) => broker_error(&e),
        },
        Command::GetUser => match state.broker.user_view().await {
            Ok(view) => ok_response(Some(Value::Object(view))),
            Err(e) => broker_error(&e),
        },
        Command::GetSettings => match state.broker.get_settings().await {
            Ok(settings) => match serde_json::to_value(settings) {
                Ok(value) => ok_response(Some(value)),
                Err(e) => error_response(ErrorCode::ServerError, &e.to_string()),
            },
            Err(e) => broker_error(&e),
        },
    }
}

pub fn ok_response(data: Option<Value>) -> CommandResponse {
    CommandResponse::Ok { data }
}

pub fn error_response(code: ErrorCode, message: &str) -> CommandResponse {
    CommandResponse::Error {
        code,
        message: message.to_string(),
    }
}

fn broker_error(err: &BrokerError) -> CommandResponse {
    let (code, message) = err.to_error_code();
    tracing::debug!(?code, %message, "command failed");
    CommandResponse::Error { code, message }
}
