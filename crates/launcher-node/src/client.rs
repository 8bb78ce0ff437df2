use anyhow::{Context, Result, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use launcher_protocol::{Command, CommandResponse, MAX_LINE_BYTES};
use std::path::Path;
use tokio::net::UnixStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Client for the launcher node's command socket.
pub struct LauncherClient {
    reader: FramedRead<tokio::net::unix::OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<tokio::net::unix::OwnedWriteHalf, LinesCodec>,
    version: String,
}

impl LauncherClient {
    /// Connect to the launcher node at the given socket path.
    /// Waits for the Hello response before returning.
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("failed to connect to {}", socket_path.display()))?;
        let (r, w) = stream.into_split();
        let reader = FramedRead::new(r, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
        let writer = FramedWrite::new(w, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

        let mut client = Self {
            reader,
            writer,
            version: String::new(),
        };

        match client.next_response().await? {
            CommandResponse::Hello { version } => {
                client.version = version;
                Ok(client)
            }
            other => Err(anyhow!("expected Hello, got {other:?}")),
        }
    }

    /// Node version from the Hello handshake.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn send(&mut self, cmd: Command) -> Result<()> {
        self.send_line(serde_json::to_string(&cmd)?).await
    }

    /// Send a raw line, for actions outside [`Command`].
    pub async fn send_line(&mut self, line: String) -> Result<()> {
        self.writer.send(line).await?;
        Ok(())
    }

    pub async fn next_response(&mut self) -> Result<CommandResponse> {
        let Some(line) = self.reader.next().await else {
            bail!("launcher node disconnected");
        };
        Ok(serde_json::from_str(&line?)?)
    }

    /// Send a command and return its Ok/Error response.
    pub async fn call(&mut self, cmd: Command) -> Result<CommandResponse> {
        self.send(cmd).await?;
        self.reply().await
    }

    /// Send a command and return its data, failing on an Error response.
    pub async fn request(&mut self, cmd: Command) -> Result<Option<serde_json::Value>> {
        match self.call(cmd).await? {
            CommandResponse::Ok { data } => Ok(data),
            CommandResponse::Error { code, message } => bail!("{code:?}: {message}"),
            CommandResponse::Hello { .. } => bail!("unexpected hello"),
        }
    }

    async fn reply(&mut self) -> Result<CommandResponse> {
        loop {
            match self.next_response().await? {
                CommandResponse::Hello { .. } => continue,
                resp => return Ok(resp),
            }
        }
    }

    /// Send a raw line and return its Ok/Error response.
    pub async fn call_line(&mut self, line: &str) -> Result<CommandResponse> {
        self.send_line(line.to_string()).await?;
        self.reply().await
    }
}
