use crate::handler::{NodeState, error_response, handle_command};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use launcher_protocol::{Command, CommandResponse, ErrorCode, MAX_LINE_BYTES};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Start the Unix socket server. Accepts client connections and processes commands.
pub async fn serve(state: Arc<NodeState>, socket_path: &Path) -> Result<()> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).ok();
        }
    }

    // Remove stale socket
    if socket_path.exists() {
        std::fs::remove_file(socket_path).ok();
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600)).ok();
    }

    tracing::info!(path = %socket_path.display(), "command socket listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(state, stream).await {
                tracing::debug!(err = %e, "client disconnected");
            }
        });
    }
}

async fn handle_client(state: Arc<NodeState>, stream: tokio::net::UnixStream) -> Result<()> {
    let (r, w) = stream.into_split();
    let mut reader = FramedRead::new(r, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut writer = FramedWrite::new(w, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let hello = CommandResponse::Hello {
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    writer.send(serde_json::to_string(&hello)?).await?;

    while let Some(line) = reader.next().await {
        let line = line?;
        let resp = match parse_command(&line) {
            Ok(cmd) => handle_command(&state, cmd).await,
            Err(resp) => resp,
        };
        writer.send(serde_json::to_string(&resp)?).await?;
    }

    Ok(())
}

/// Decode one request line. Anything that is JSON but not a routed action
/// is `invalid_action`; anything else is `invalid_request`.
fn parse_command(line: &str) -> Result<Command, CommandResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        error_response(ErrorCode::InvalidRequest, &format!("invalid request: {e}"))
    })?;
    let action = match value.get("cmd") {
        Some(Value::String(action)) => action.clone(),
        _ => {
            return Err(error_response(
                ErrorCode::InvalidRequest,
                "request has no cmd field",
            ));
        }
    };
    serde_json::from_value(value).map_err(|_| {
        tracing::debug!(%action, "rejecting unknown action");
        error_response(ErrorCode::InvalidAction, &format!("unknown action: {action}"))
    })
}
