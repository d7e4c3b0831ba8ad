//! Box subscriber

use tokio::net::unix::pipe;

use super::admin::send_request;
use super::config::ClientConfig;
use super::pipe::ReplyPipe;
use crate::channel::{Channels, FifoChannels};
use crate::error::{ProtocolError, Result};
use crate::protocol::{read_record, Message, OpCode, Request, RequestKind};

/// Subscriber attached to one box
///
/// Receives the box's full history first, then each new message as it is
/// published. The stream ends when the broker closes the pipe: the box was
/// removed, never existed, or the broker shut down.
#[derive(Debug)]
pub struct Subscriber {
    reader: pipe::Receiver,
    box_name: String,
    received: u64,
    _pipe: ReplyPipe,
}

impl Subscriber {
    /// Register with the broker and open the message pipe
    pub async fn connect(config: &ClientConfig, box_name: &str) -> Result<Self> {
        let pipe = ReplyPipe::create(&config.pipe_path)?;
        send_request(
            config,
            &Request::new(RequestKind::RegisterSubscriber, pipe.name(), box_name),
        )
        .await?;

        let channels = FifoChannels::new(config.open_timeout);
        let reader = channels.open_reader(pipe.name()).await?;

        tracing::debug!(box_name = %box_name, "Subscriber connected");
        Ok(Self {
            reader,
            box_name: box_name.to_string(),
            received: 0,
            _pipe: pipe,
        })
    }

    /// Wait for the next message; `None` once the broker closes the pipe
    pub async fn next_message(&mut self) -> Result<Option<String>> {
        let Some(message) = read_record::<Message, _>(&mut self.reader).await? else {
            return Ok(None);
        };

        if message.code != OpCode::SubscriberMessage {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: "subscriber message",
                actual: message.code.as_u8(),
            }
            .into());
        }

        self.received += 1;
        Ok(Some(message.text))
    }

    pub fn box_name(&self) -> &str {
        &self.box_name
    }

    /// Messages received so far
    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Hand every message of `box_name` to `on_message` until the stream ends
///
/// Returns the number of messages received.
pub async fn subscribe<F>(config: &ClientConfig, box_name: &str, mut on_message: F) -> Result<u64>
where
    F: FnMut(&str),
{
    let mut subscriber = Subscriber::connect(config, box_name).await?;

    while let Some(text) = subscriber.next_message().await? {
        on_message(&text);
    }

    Ok(subscriber.received())
}
