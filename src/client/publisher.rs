//! Box publisher
//!
//! Registers as the publisher of a box and writes one message per line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::unix::pipe;

use super::admin::send_request;
use super::config::ClientConfig;
use super::pipe::ReplyPipe;
use crate::channel::{Channels, FifoChannels};
use crate::error::Result;
use crate::protocol::constants::MAX_MESSAGE_TEXT;
use crate::protocol::message::truncate_utf8;
use crate::protocol::{write_record, Message, Request, RequestKind};

/// Publisher attached to one box
///
/// The broker accepts a single publisher per box. When another one is
/// already active the broker closes the pipe straight away and the first
/// `send` fails with a broken pipe.
///
/// # Example
/// ```no_run
/// use mbroker::client::{ClientConfig, Publisher};
///
/// # async fn example() -> mbroker::Result<()> {
/// let config = ClientConfig::new("/tmp/mbroker", "/tmp/pub-1");
/// let mut publisher = Publisher::connect(&config, "news").await?;
/// publisher.send("hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Publisher {
    writer: pipe::Sender,
    box_name: String,
    sent: u64,
    _pipe: ReplyPipe,
}

impl Publisher {
    /// Register with the broker and open the message pipe
    pub async fn connect(config: &ClientConfig, box_name: &str) -> Result<Self> {
        let pipe = ReplyPipe::create(&config.pipe_path)?;
        send_request(
            config,
            &Request::new(RequestKind::RegisterPublisher, pipe.name(), box_name),
        )
        .await?;

        let channels = FifoChannels::new(config.open_timeout);
        let writer = channels.open_writer(pipe.name()).await?;

        tracing::debug!(box_name = %box_name, "Publisher connected");
        Ok(Self {
            writer,
            box_name: box_name.to_string(),
            sent: 0,
            _pipe: pipe,
        })
    }

    /// Send one message; text past the field capacity is cut off
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let mut text = text.to_string();
        if text.len() > MAX_MESSAGE_TEXT {
            tracing::warn!(len = text.len(), max = MAX_MESSAGE_TEXT, "Truncating message");
            truncate_utf8(&mut text, MAX_MESSAGE_TEXT);
        }

        write_record(&mut self.writer, &Message::publisher(text)).await?;
        self.sent += 1;
        Ok(())
    }

    pub fn box_name(&self) -> &str {
        &self.box_name
    }

    /// Messages sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

/// Publish every line of `input` to `box_name`
///
/// Returns the number of messages sent once `input` is exhausted.
pub async fn publish_lines<R>(config: &ClientConfig, box_name: &str, input: R) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut publisher = Publisher::connect(config, box_name).await?;
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        publisher.send(&line).await?;
    }

    Ok(publisher.sent())
}
