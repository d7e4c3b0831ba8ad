//! Subscriber session
//!
//! Replays the box from offset zero and then follows it live. Each line of
//! the box becomes one subscriber message, in order. The session blocks
//! whenever its cursor reaches the tail and wakes on the next append, or
//! ends as soon as the client closes its end.

use std::io;

use bytes::BytesMut;

use super::context::SessionContext;
use super::state::SessionState;
use crate::channel::ReplyWriter;
use crate::error::Result;
use crate::protocol::constants::MAX_MESSAGE_TEXT;
use crate::protocol::{write_record, Message};
use crate::registry::SubscriberLease;
use crate::stats::BrokerStats;

/// Stream the leased box to `writer` until the client or the box goes away
///
/// Only returns with an error: a broken channel, a removed box, or a
/// storage failure. The lease is released either way.
pub async fn run_subscriber<W>(
    ctx: &SessionContext,
    mut lease: SubscriberLease,
    mut writer: W,
    chunk_size: usize,
    state: &mut SessionState,
    stats: &BrokerStats,
) -> Result<()>
where
    W: ReplyWriter,
{
    state.attach();
    tracing::info!(
        session_id = ctx.session_id,
        box_name = %lease.box_name(),
        "Subscriber attached"
    );

    let mut cursor: u64 = 0;
    let mut pending = BytesMut::new();

    loop {
        let chunk = lease.read_from(cursor, chunk_size)?;
        if chunk.is_empty() {
            tokio::select! {
                waited = lease.wait_for_data(cursor) => waited?,
                _ = writer.closed() => {
                    return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
                }
            }
            continue;
        }

        cursor += chunk.len() as u64;
        pending.extend_from_slice(&chunk);

        while let Some(end) = pending.iter().position(|&b| b == b'\n') {
            let line = pending.split_to(end + 1);
            let text = String::from_utf8_lossy(&line[..end]);

            for piece in split_text(&text, MAX_MESSAGE_TEXT) {
                write_record(&mut writer, &Message::subscriber(piece)).await?;
                state.record(piece.len());
                stats.message_delivered(piece.len());
            }
        }
    }
}

/// Split `text` into pieces of at most `max` bytes on character boundaries
///
/// An empty line yields one empty piece.
fn split_text(text: &str, max: usize) -> Vec<&str> {
    if text.len() <= max {
        return vec![text];
    }

    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = max.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (piece, tail) = rest.split_at(end);
        pieces.push(piece);
        rest = tail;
    }
    pieces
}
