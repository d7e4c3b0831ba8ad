//! Broker front end
//!
//! Owns the registry, the request queue and the worker pool, and runs the
//! dispatcher over the administrative channel until shutdown.

use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::task::{JoinError, JoinHandle};

use super::config::BrokerConfig;
use super::dispatcher::{dispatch, DispatchEnd};
use super::worker::Worker;
use crate::channel::fifo::{create_fifo, remove_fifo};
use crate::channel::{Channels, FifoChannels};
use crate::error::Result;
use crate::protocol::Request;
use crate::queue::BoundedQueue;
use crate::registry::{BoxRegistry, RegistryConfig};
use crate::stats::{BrokerStats, StatsSnapshot};

/// Message broker
pub struct Broker<C: Channels> {
    config: BrokerConfig,
    registry: Arc<BoxRegistry>,
    queue: Arc<BoundedQueue<Request>>,
    channels: Arc<C>,
    stats: Arc<BrokerStats>,
    next_session_id: Arc<AtomicU64>,
}

impl<C: Channels> Broker<C> {
    /// Create a broker over an in-memory store with default registry limits
    pub fn new(config: BrokerConfig, channels: C) -> Self {
        let registry = BoxRegistry::in_memory(RegistryConfig::default());
        Self::with_registry(config, channels, Arc::new(registry))
    }

    /// Create a broker over an existing registry
    pub fn with_registry(config: BrokerConfig, channels: C, registry: Arc<BoxRegistry>) -> Self {
        let queue = BoundedQueue::new(config.effective_queue_capacity().max(1));

        Self {
            config,
            registry,
            queue: Arc::new(queue),
            channels: Arc::new(channels),
            stats: Arc::new(BrokerStats::new()),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Get a reference to the box registry
    pub fn registry(&self) -> &Arc<BoxRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<BrokerStats> {
        &self.stats
    }

    /// Current counters, gauges and queue depth
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(
            self.config.max_sessions,
            self.queue.len(),
            self.queue.capacity(),
        )
    }

    /// Serve requests read from `admin` until it ends or `shutdown` resolves
    ///
    /// On return every worker has stopped and every box is gone. A read
    /// failure on the administrative channel is returned as the error.
    pub async fn serve<R, F>(&self, admin: R, shutdown: F) -> Result<()>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        let workers = self.spawn_workers();
        let reporter = self.spawn_stats_reporter();

        tracing::info!(
            workers = self.config.max_sessions,
            queue_capacity = self.queue.capacity(),
            "Broker serving"
        );

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            end = dispatch(admin, &self.queue, &self.stats) => match end {
                DispatchEnd::EndOfStream => {
                    tracing::info!("Administrative channel closed");
                    Ok(())
                }
                DispatchEnd::QueueClosed => Ok(()),
                DispatchEnd::Failed(e) => {
                    tracing::error!(error = %e, "Dispatcher failed");
                    Err(e)
                }
            },
        };

        self.shutdown(workers).await;
        reporter.abort();

        let snapshot = self.snapshot();
        tracing::info!(
            requests = snapshot.requests_received,
            messages_published = snapshot.messages_published,
            messages_delivered = snapshot.messages_delivered,
            uptime_secs = snapshot.uptime.as_secs(),
            "Broker stopped"
        );

        result
    }

    fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        (0..self.config.max_sessions)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&self.queue),
                    registry: Arc::clone(&self.registry),
                    channels: Arc::clone(&self.channels),
                    stats: Arc::clone(&self.stats),
                    next_session_id: Arc::clone(&self.next_session_id),
                    read_chunk_size: self.config.read_chunk_size,
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }

    /// Periodically log a stats line, louder when the pool is saturated
    fn spawn_stats_reporter(&self) -> JoinHandle<()> {
        let stats = Arc::clone(&self.stats);
        let queue = Arc::clone(&self.queue);
        let workers = self.config.max_sessions;
        let period = self.config.stats_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let snapshot = stats.snapshot(workers, queue.len(), queue.capacity());

                if snapshot.is_saturated() {
                    tracing::warn!(
                        busy_workers = snapshot.busy_workers,
                        queued = snapshot.queued,
                        active_sessions = snapshot.active_sessions(),
                        "All workers busy, requests waiting"
                    );
                } else {
                    tracing::info!(
                        busy_workers = snapshot.busy_workers,
                        queued = snapshot.queued,
                        publishers = snapshot.active_publishers,
                        subscribers = snapshot.active_subscribers,
                        messages_published = snapshot.messages_published,
                        messages_delivered = snapshot.messages_delivered,
                        "Broker stats"
                    );
                }
            }
        })
    }

    async fn shutdown(&self, mut workers: Vec<JoinHandle<()>>) {
        let dropped = self.queue.close();
        if !dropped.is_empty() {
            self.stats.requests_dropped(dropped.len() as u64);
            tracing::warn!(dropped = dropped.len(), "Dropped queued requests");
        }

        // Waiting subscribers wake up and end their sessions
        let boxes = self.registry.clear().await;
        tracing::debug!(boxes, "Registry cleared");

        let join_all = async {
            for handle in workers.iter_mut() {
                worker_exited(handle.await);
            }
        };

        if tokio::time::timeout(self.config.shutdown_grace, join_all).await.is_err() {
            let stuck = workers.iter().filter(|h| !h.is_finished()).count();
            tracing::warn!(workers = stuck, "Aborting workers still in a session");
            for handle in &workers {
                handle.abort();
            }
        }
    }
}

/// Log a worker that ended by panicking; returns whether it did
fn worker_exited(joined: std::result::Result<(), JoinError>) -> bool {
    match joined {
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "Worker panicked");
            true
        }
        _ => false,
    }
}

impl Broker<FifoChannels> {
    /// Create a broker that talks to clients over named pipes
    pub fn fifo(config: BrokerConfig, registry_config: RegistryConfig) -> Self {
        let channels = FifoChannels::new(config.channel_open_timeout);
        let registry = Arc::new(BoxRegistry::in_memory(registry_config));
        Self::with_registry(config, channels, registry)
    }

    /// Create the administrative FIFO and serve it until `shutdown` resolves
    ///
    /// The FIFO is removed again on the way out.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        let path = self.config.admin_path.clone();
        create_fifo(&path)?;
        tracing::info!(path = %path.display(), "Broker listening");

        let result = match FifoChannels::open_admin(&path) {
            Ok(admin) => self.serve(admin, shutdown).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = remove_fifo(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove administrative FIFO");
        }

        result
    }
}

impl<C: Channels> std::fmt::Debug for Broker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::DuplexStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::channel::MemoryChannels;
    use crate::protocol::{
        read_record, write_record, BoxAnswer, BoxListEntry, Message, OpCode, RequestKind,
    };

    struct Harness {
        broker: Arc<Broker<MemoryChannels>>,
        channels: MemoryChannels,
        admin: DuplexStream,
        shutdown: Option<oneshot::Sender<()>>,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn start(config: BrokerConfig) -> Self {
            let channels = MemoryChannels::new(Duration::from_secs(2));
            let broker = Arc::new(Broker::new(config, channels.clone()));
            let (admin, broker_admin) = tokio::io::duplex(64 * 1024);
            let (shutdown, signal) = oneshot::channel::<()>();

            let task = {
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    broker
                        .serve(broker_admin, async {
                            let _ = signal.await;
                        })
                        .await
                })
            };

            Self {
                broker,
                channels,
                admin,
                shutdown: Some(shutdown),
                task,
            }
        }

        async fn send(&mut self, kind: RequestKind, path: &str, name: &str) -> DuplexStream {
            let reply = self.channels.connect(path);
            write_record(&mut self.admin, &Request::new(kind, path, name))
                .await
                .unwrap();
            reply
        }

        async fn answer(&mut self, kind: RequestKind, path: &str, name: &str) -> BoxAnswer {
            let mut reply = self.send(kind, path, name).await;
            read_record(&mut reply).await.unwrap().unwrap()
        }

        async fn list(&mut self, path: &str) -> Vec<BoxListEntry> {
            let mut reply = self.send(RequestKind::ListBoxes, path, "").await;
            let mut entries = Vec::new();
            loop {
                let entry: BoxListEntry = read_record(&mut reply).await.unwrap().unwrap();
                let last = entry.last;
                entries.push(entry);
                if last {
                    return entries;
                }
            }
        }

        async fn stop(mut self) -> Result<()> {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
            self.task.await.unwrap()
        }
    }

    async fn next_text(reader: &mut DuplexStream) -> String {
        let message: Message = read_record(reader).await.unwrap().unwrap();
        assert_eq!(message.code, OpCode::SubscriberMessage);
        message.text
    }

    fn config(workers: usize) -> BrokerConfig {
        BrokerConfig::default()
            .max_sessions(workers)
            .shutdown_grace(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_create_twice() {
        let mut h = Harness::start(config(2));

        let answer = h.answer(RequestKind::CreateBox, "/c1", "b").await;
        assert_eq!(answer.code, OpCode::CreateBoxAnswer);
        assert!(answer.is_ok());

        let answer = h.answer(RequestKind::CreateBox, "/c2", "b").await;
        assert_eq!(answer.return_code, -1);
        assert!(answer.error_message.contains("already exists"));

        assert_eq!(h.broker.registry().box_count().await, 1);
        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_box() {
        let mut h = Harness::start(config(1));

        let answer = h.answer(RequestKind::RemoveBox, "/c", "nope").await;
        assert_eq!(answer.code, OpCode::RemoveBoxAnswer);
        assert!(!answer.is_ok());
        assert!(!answer.error_message.is_empty());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_list() {
        let mut h = Harness::start(config(2));

        let entries = h.list("/l1").await;
        assert_eq!(entries, vec![BoxListEntry::placeholder()]);

        for name in ["gamma", "alpha", "beta"] {
            assert!(h.answer(RequestKind::CreateBox, "/c", name).await.is_ok());
        }

        let entries = h.list("/l2").await;
        let names: Vec<_> = entries.iter().map(|e| e.box_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert_eq!(entries.iter().filter(|e| e.last).count(), 1);
        assert!(entries[2].last);

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let mut h = Harness::start(config(3));
        assert!(h.answer(RequestKind::CreateBox, "/c", "news").await.is_ok());

        let mut publisher = h.send(RequestKind::RegisterPublisher, "/p", "news").await;
        write_record(&mut publisher, &Message::publisher("hello")).await.unwrap();
        write_record(&mut publisher, &Message::publisher("world")).await.unwrap();

        let mut subscriber = h.send(RequestKind::RegisterSubscriber, "/s", "news").await;
        assert_eq!(next_text(&mut subscriber).await, "hello");
        assert_eq!(next_text(&mut subscriber).await, "world");

        write_record(&mut publisher, &Message::publisher("more")).await.unwrap();
        assert_eq!(next_text(&mut subscriber).await, "more");

        let entries = h.list("/l").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].box_name, "news");
        assert_eq!(entries[0].size, 17);
        assert_eq!(entries[0].publishers, 1);
        assert_eq!(entries[0].subscribers, 1);

        let snapshot = h.broker.snapshot();
        assert_eq!(snapshot.messages_published, 3);
        assert_eq!(snapshot.active_publishers, 1);
        assert_eq!(snapshot.active_subscribers, 1);

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_publisher_rejected() {
        let mut h = Harness::start(config(3));
        assert!(h.answer(RequestKind::CreateBox, "/c", "news").await.is_ok());

        let mut first = h.send(RequestKind::RegisterPublisher, "/p1", "news").await;
        write_record(&mut first, &Message::publisher("one")).await.unwrap();

        // The first publisher is attached once its message is stored
        let mut subscriber = h.send(RequestKind::RegisterSubscriber, "/s", "news").await;
        assert_eq!(next_text(&mut subscriber).await, "one");

        let mut second = h.send(RequestKind::RegisterPublisher, "/p2", "news").await;
        let closed: Option<Message> = read_record(&mut second).await.unwrap();
        assert!(closed.is_none());

        assert_eq!(h.broker.snapshot().sessions_rejected, 1);
        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_to_missing_box() {
        let mut h = Harness::start(config(1));

        let mut subscriber = h.send(RequestKind::RegisterSubscriber, "/s", "ghost").await;
        let closed: Option<Message> = read_record(&mut subscriber).await.unwrap();
        assert!(closed.is_none());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_ends_sessions() {
        let mut h = Harness::start(config(3));
        assert!(h.answer(RequestKind::CreateBox, "/c", "news").await.is_ok());

        let mut publisher = h.send(RequestKind::RegisterPublisher, "/p", "news").await;
        write_record(&mut publisher, &Message::publisher("hi")).await.unwrap();
        let mut subscriber = h.send(RequestKind::RegisterSubscriber, "/s", "news").await;
        assert_eq!(next_text(&mut subscriber).await, "hi");

        assert!(h.answer(RequestKind::RemoveBox, "/r", "news").await.is_ok());

        // The waiting subscriber wakes and its channel closes
        let closed: Option<Message> = read_record(&mut subscriber).await.unwrap();
        assert!(closed.is_none());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_starve_admin_requests() {
        let mut h = Harness::start(config(1));
        assert!(h.answer(RequestKind::CreateBox, "/c1", "news").await.is_ok());

        // The only worker is now held by the publisher session
        let publisher = h.send(RequestKind::RegisterPublisher, "/p", "news").await;
        let mut reply = h.send(RequestKind::CreateBox, "/c2", "other").await;

        let waiting =
            tokio::time::timeout(Duration::from_millis(100), read_record::<BoxAnswer, _>(&mut reply))
                .await;
        assert!(waiting.is_err());
        assert!(h.broker.snapshot().is_saturated());

        // Ending the session frees the worker for the queued request
        drop(publisher);
        let answer: BoxAnswer = read_record(&mut reply).await.unwrap().unwrap();
        assert!(answer.is_ok());

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_wakes_subscribers() {
        let mut h = Harness::start(config(2));
        assert!(h.answer(RequestKind::CreateBox, "/c", "news").await.is_ok());

        let mut subscriber = h.send(RequestKind::RegisterSubscriber, "/s", "news").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.broker.snapshot().active_subscribers, 1);

        let broker = Arc::clone(&h.broker);
        h.stop().await.unwrap();

        let closed: Option<Message> = read_record(&mut subscriber).await.unwrap();
        assert!(closed.is_none());
        assert_eq!(broker.registry().box_count().await, 0);
        assert_eq!(broker.snapshot().busy_workers, 0);
    }

    #[tokio::test]
    async fn test_hung_up_subscriber_frees_worker() {
        let mut h = Harness::start(config(2));
        assert!(h.answer(RequestKind::CreateBox, "/c", "quiet").await.is_ok());

        let subscriber = h.send(RequestKind::RegisterSubscriber, "/s", "quiet").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.broker.snapshot().active_subscribers, 1);

        // Nothing is ever published; the hang-up alone ends the session
        drop(subscriber);

        let mut freed = false;
        for _ in 0..50 {
            let snapshot = h.broker.snapshot();
            if snapshot.active_subscribers == 0 && snapshot.busy_workers == 0 {
                freed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(freed);

        let entries = h.list("/l").await;
        assert_eq!(entries[0].box_name, "quiet");
        assert_eq!(entries[0].subscribers, 0);

        h.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_panic_is_reported() {
        let panicked = tokio::spawn(async { panic!("boom") }).await;
        assert!(worker_exited(panicked));

        let finished = tokio::spawn(async {}).await;
        assert!(!worker_exited(finished));

        let aborted = tokio::spawn(std::future::pending::<()>());
        aborted.abort();
        assert!(!worker_exited(aborted.await));
    }

    #[tokio::test]
    async fn test_admin_channel_closed() {
        let h = Harness::start(config(1));
        drop(h.admin);
        assert!(h.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let broker = Broker::new(BrokerConfig::default().max_sessions(0), MemoryChannels::default());
        let (_client, admin) = tokio::io::duplex(64);

        let result = broker.serve(admin, std::future::pending()).await;
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
