//! Publisher session
//!
//! Reads messages from the client's channel one record at a time and
//! appends each to the box as a newline-terminated line. Text bytes are
//! stored as sent, UTF-8 or not. Ends cleanly when the client closes its end.

use tokio::io::AsyncRead;

use super::context::SessionContext;
use super::state::SessionState;
use crate::error::{ProtocolError, Result};
use crate::protocol::{read_record, OpCode, RawMessage};
use crate::registry::PublisherLease;
use crate::stats::BrokerStats;

/// Pump messages from `reader` into the leased box until end of stream
///
/// The lease is released when this returns, on success and on error alike.
pub async fn run_publisher<R>(
    ctx: &SessionContext,
    lease: PublisherLease,
    mut reader: R,
    state: &mut SessionState,
    stats: &BrokerStats,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    state.attach();
    tracing::info!(
        session_id = ctx.session_id,
        box_name = %lease.box_name(),
        "Publisher attached"
    );

    while let Some(message) = read_record::<RawMessage, _>(&mut reader).await? {
        if message.code != OpCode::PublisherMessage {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: "publisher message",
                actual: message.code.as_u8(),
            }
            .into());
        }

        let mut line = Vec::from(message.text);
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }

        let written = lease.append(&line)?;
        state.record(written);
        stats.message_published(written);

        tracing::trace!(
            session_id = ctx.session_id,
            bytes = written,
            size = lease.entry().size(),
            "Message appended"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::error::Error;
    use crate::protocol::constants::MESSAGE_LEN;
    use crate::protocol::{write_record, Message};
    use crate::registry::{BoxRegistry, RegistryConfig};
    use crate::session::SessionRole;

    async fn setup() -> (Arc<BoxRegistry>, SessionContext) {
        let registry = Arc::new(BoxRegistry::in_memory(RegistryConfig::default()));
        registry.create("news").await.unwrap();
        let ctx = SessionContext::new(1, 0, SessionRole::Publisher, "news", "/tmp/p");
        (registry, ctx)
    }

    #[tokio::test]
    async fn test_messages_appended_with_newline() {
        let (registry, ctx) = setup().await;
        let entry = registry.lookup("news").await.unwrap();
        let lease = entry.attach_publisher().unwrap();
        let stats = BrokerStats::new();
        let mut state = SessionState::new(SessionRole::Publisher);

        let (mut client, broker) = tokio::io::duplex(8192);
        write_record(&mut client, &Message::publisher("hello")).await.unwrap();
        write_record(&mut client, &Message::publisher("world\n")).await.unwrap();
        drop(client);

        run_publisher(&ctx, lease, broker, &mut state, &stats).await.unwrap();

        assert_eq!(state.messages, 2);
        assert_eq!(entry.size(), 12);
        assert_eq!(entry.publisher_count(), 0);

        let reader = entry.attach_subscriber().unwrap();
        assert_eq!(&reader.read_from(0, 64).unwrap()[..], b"hello\nworld\n");
    }

    #[tokio::test]
    async fn test_non_utf8_text_stored_verbatim() {
        let (registry, ctx) = setup().await;
        let entry = registry.lookup("news").await.unwrap();
        let lease = entry.attach_publisher().unwrap();
        let stats = BrokerStats::new();
        let mut state = SessionState::new(SessionRole::Publisher);

        let mut record = vec![0u8; 1 + MESSAGE_LEN];
        record[0] = OpCode::PublisherMessage.as_u8();
        record[1..5].copy_from_slice(&[b'o', 0xff, 0xfe, b'k']);

        let (mut client, broker) = tokio::io::duplex(8192);
        client.write_all(&record).await.unwrap();
        write_record(&mut client, &Message::publisher("next")).await.unwrap();
        drop(client);

        run_publisher(&ctx, lease, broker, &mut state, &stats).await.unwrap();

        assert_eq!(state.messages, 2);
        let reader = entry.attach_subscriber().unwrap();
        assert_eq!(&reader.read_from(0, 64).unwrap()[..], b"o\xff\xfek\nnext\n");
    }

    #[tokio::test]
    async fn test_wrong_code_ends_session_and_releases() {
        let (registry, ctx) = setup().await;
        let entry = registry.lookup("news").await.unwrap();
        let lease = entry.attach_publisher().unwrap();
        let stats = BrokerStats::new();
        let mut state = SessionState::new(SessionRole::Publisher);

        let (mut client, broker) = tokio::io::duplex(8192);
        write_record(&mut client, &Message::subscriber("nope")).await.unwrap();

        let err = run_publisher(&ctx, lease, broker, &mut state, &stats)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnexpectedOpCode { actual: 10, .. })
        ));
        assert_eq!(entry.publisher_count(), 0);
    }

    #[tokio::test]
    async fn test_truncated_record_ends_session() {
        let (registry, ctx) = setup().await;
        let entry = registry.lookup("news").await.unwrap();
        let lease = entry.attach_publisher().unwrap();
        let stats = BrokerStats::new();
        let mut state = SessionState::new(SessionRole::Publisher);

        let (mut client, broker) = tokio::io::duplex(8192);
        client.write_all(&[9, b'h', b'i']).await.unwrap();
        drop(client);

        let err = run_publisher(&ctx, lease, broker, &mut state, &stats)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::Truncated { .. })));
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.publisher_count(), 0);
    }

    #[tokio::test]
    async fn test_box_removed_mid_session() {
        let (registry, ctx) = setup().await;
        let entry = registry.lookup("news").await.unwrap();
        let lease = entry.attach_publisher().unwrap();
        let stats = BrokerStats::new();
        let mut state = SessionState::new(SessionRole::Publisher);

        registry.remove("news").await.unwrap();

        let (mut client, broker) = tokio::io::duplex(8192);
        write_record(&mut client, &Message::publisher("late")).await.unwrap();

        let err = run_publisher(&ctx, lease, broker, &mut state, &stats)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
        assert_eq!(state.messages, 0);
    }
}
