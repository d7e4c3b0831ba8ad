//! Administrative channel dispatcher
//!
//! Reads fixed-size requests off the administrative channel and queues them
//! for the worker pool. Backpressure is the queue's: when it is full the
//! dispatcher stops reading until a worker frees a slot.

use tokio::io::AsyncRead;

use crate::error::{Error, ProtocolError};
use crate::protocol::{read_record, Request};
use crate::queue::BoundedQueue;
use crate::stats::BrokerStats;

/// Why the dispatcher stopped
#[derive(Debug)]
pub enum DispatchEnd {
    /// The administrative channel reached end of stream
    EndOfStream,
    /// The queue was closed underneath the dispatcher
    QueueClosed,
    /// Truncated record or read failure
    Failed(Error),
}

/// Run the dispatch loop until the channel ends or fails
///
/// A full-size record with bad content is dropped and the loop goes on; a
/// truncated record or I/O error ends it.
pub async fn dispatch<R>(mut admin: R, queue: &BoundedQueue<Request>, stats: &BrokerStats) -> DispatchEnd
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_record::<Request, _>(&mut admin).await {
            Ok(Some(request)) => {
                stats.request_received();
                tracing::debug!(
                    kind = %request.kind,
                    box_name = %request.box_name,
                    reply_path = %request.reply_path,
                    queued = queue.len(),
                    "Request received"
                );

                if queue.push(request).await.is_err() {
                    return DispatchEnd::QueueClosed;
                }
            }
            Ok(None) => return DispatchEnd::EndOfStream,
            Err(Error::Protocol(e)) if !matches!(e, ProtocolError::Truncated { .. }) => {
                stats.request_invalid();
                tracing::warn!(error = %e, "Dropping malformed request");
            }
            Err(e) => return DispatchEnd::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::protocol::{write_record, Record, RequestKind};

    #[tokio::test]
    async fn test_requests_queued_in_order() {
        let queue = BoundedQueue::new(8);
        let stats = BrokerStats::new();
        let (mut client, admin) = tokio::io::duplex(4096);

        write_record(&mut client, &Request::new(RequestKind::CreateBox, "/c1", "a")).await.unwrap();
        write_record(&mut client, &Request::list("/c2")).await.unwrap();
        write_record(&mut client, &Request::new(RequestKind::RemoveBox, "/c3", "a")).await.unwrap();
        drop(client);

        let end = dispatch(admin, &queue, &stats).await;
        assert!(matches!(end, DispatchEnd::EndOfStream));

        assert_eq!(queue.pop().await.unwrap().reply_path, "/c1");
        assert_eq!(queue.pop().await.unwrap().reply_path, "/c2");
        assert_eq!(queue.pop().await.unwrap().reply_path, "/c3");
        assert_eq!(stats.snapshot(1, 0, 8).requests_received, 3);
    }

    #[tokio::test]
    async fn test_malformed_request_skipped() {
        let queue = BoundedQueue::new(8);
        let stats = BrokerStats::new();
        let (mut client, admin) = tokio::io::duplex(4096);

        let mut bogus = BytesMut::zeroed(Request::SIZE);
        bogus[0] = 42;
        client.write_all(&bogus).await.unwrap();
        write_record(&mut client, &Request::list("/ok")).await.unwrap();
        drop(client);

        let end = dispatch(admin, &queue, &stats).await;
        assert!(matches!(end, DispatchEnd::EndOfStream));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().await.unwrap().reply_path, "/ok");
        assert_eq!(stats.snapshot(1, 0, 8).requests_invalid, 1);
    }

    #[tokio::test]
    async fn test_truncated_request_ends_loop() {
        let queue = BoundedQueue::new(8);
        let stats = BrokerStats::new();
        let (mut client, admin) = tokio::io::duplex(4096);

        client.write_all(&[3, b'/', b'x']).await.unwrap();
        drop(client);

        let end = dispatch(admin, &queue, &stats).await;
        assert!(matches!(
            end,
            DispatchEnd::Failed(Error::Protocol(ProtocolError::Truncated { .. }))
        ));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_stops_dispatch() {
        let queue = BoundedQueue::new(1);
        queue.close();
        let stats = BrokerStats::new();
        let (mut client, admin) = tokio::io::duplex(4096);
        write_record(&mut client, &Request::list("/c")).await.unwrap();

        let end = dispatch(admin, &queue, &stats).await;
        assert!(matches!(end, DispatchEnd::QueueClosed));
    }
}
