//! Administrative requests: create, remove and list boxes

use std::io;

use tokio::io::AsyncRead;

use super::config::ClientConfig;
use super::pipe::ReplyPipe;
use crate::channel::{Channels, FifoChannels};
use crate::error::{Error, Result};
use crate::protocol::{read_record, write_record, BoxAnswer, BoxListEntry, Record, Request, RequestKind};

/// Write one request to the broker's administrative FIFO
pub async fn send_request(config: &ClientConfig, request: &Request) -> Result<()> {
    let register = config
        .register_path
        .to_str()
        .ok_or_else(|| Error::Config("register path is not UTF-8".into()))?;

    let channels = FifoChannels::new(config.open_timeout);
    let mut writer = channels.open_writer(register).await?;
    write_record(&mut writer, request).await?;

    tracing::debug!(kind = %request.kind, box_name = %request.box_name, "Request sent");
    Ok(())
}

/// Ask the broker to create `box_name`
pub async fn create_box(config: &ClientConfig, box_name: &str) -> Result<BoxAnswer> {
    box_request(config, RequestKind::CreateBox, box_name).await
}

/// Ask the broker to remove `box_name`
pub async fn remove_box(config: &ClientConfig, box_name: &str) -> Result<BoxAnswer> {
    box_request(config, RequestKind::RemoveBox, box_name).await
}

/// Fetch every box; an empty broker yields an empty list
pub async fn list_boxes(config: &ClientConfig) -> Result<Vec<BoxListEntry>> {
    let pipe = ReplyPipe::create(&config.pipe_path)?;
    send_request(config, &Request::list(pipe.name())).await?;

    let channels = FifoChannels::new(config.open_timeout);
    let mut reader = channels.open_reader(pipe.name()).await?;

    let mut entries = Vec::new();
    loop {
        let entry: BoxListEntry = read_reply(&mut reader).await?;
        let last = entry.last;
        if !entry.is_placeholder() {
            entries.push(entry);
        }
        if last {
            return Ok(entries);
        }
    }
}

async fn box_request(config: &ClientConfig, kind: RequestKind, box_name: &str) -> Result<BoxAnswer> {
    let pipe = ReplyPipe::create(&config.pipe_path)?;
    let request = Request::new(kind, pipe.name(), box_name);
    send_request(config, &request).await?;

    let channels = FifoChannels::new(config.open_timeout);
    let mut reader = channels.open_reader(pipe.name()).await?;
    read_reply(&mut reader).await
}

async fn read_reply<T, R>(reader: &mut R) -> Result<T>
where
    T: Record,
    R: AsyncRead + Unpin,
{
    read_record(reader).await?.ok_or_else(|| {
        Error::Channel(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "broker closed the pipe without answering",
        ))
    })
}
