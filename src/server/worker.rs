//! Request workers
//!
//! Each worker pops one request at a time and handles it to completion.
//! Publisher and subscriber registrations keep the worker for the whole
//! session; everything else answers and returns to the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::channel::Channels;
use crate::error::{Error, Result};
use crate::protocol::{write_record, BoxAnswer, BoxListEntry, OpCode, Request, RequestKind};
use crate::queue::BoundedQueue;
use crate::registry::{BoxEntry, BoxRegistry, RegistryError};
use crate::session::{run_publisher, run_subscriber, SessionContext, SessionRole, SessionState};
use crate::stats::{BrokerStats, Gauge};
use crate::storage::StorageError;

/// One member of the worker pool
pub struct Worker<C: Channels> {
    pub(super) id: usize,
    pub(super) queue: Arc<BoundedQueue<Request>>,
    pub(super) registry: Arc<BoxRegistry>,
    pub(super) channels: Arc<C>,
    pub(super) stats: Arc<BrokerStats>,
    pub(super) next_session_id: Arc<AtomicU64>,
    pub(super) read_chunk_size: usize,
}

impl<C: Channels> Worker<C> {
    /// Serve requests until the queue is closed
    pub async fn run(self) {
        tracing::debug!(worker_id = self.id, "Worker started");

        while let Ok(request) = self.queue.pop().await {
            let _busy = self.stats.track(Gauge::BusyWorkers);
            self.handle(request).await;
        }

        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    async fn handle(&self, request: Request) {
        let kind = request.kind;
        let result = match kind {
            RequestKind::CreateBox => self.create_box(&request).await,
            RequestKind::RemoveBox => self.remove_box(&request).await,
            RequestKind::ListBoxes => self.list_boxes(&request).await,
            RequestKind::RegisterPublisher => self.publisher_session(&request).await,
            RequestKind::RegisterSubscriber => self.subscriber_session(&request).await,
        };

        if let Err(e) = result {
            tracing::warn!(
                worker_id = self.id,
                kind = %kind,
                reply_path = %request.reply_path,
                error = %e,
                "Request failed"
            );
        }
    }

    async fn create_box(&self, request: &Request) -> Result<()> {
        let answer = match self.registry.create(&request.box_name).await {
            Ok(()) => {
                self.stats.box_created();
                BoxAnswer::ok(OpCode::CreateBoxAnswer)
            }
            Err(e) => {
                self.stats.admin_failed();
                tracing::info!(box_name = %request.box_name, error = %e, "Create refused");
                BoxAnswer::error(OpCode::CreateBoxAnswer, e.to_string())
            }
        };

        self.reply(&request.reply_path, &answer).await
    }

    async fn remove_box(&self, request: &Request) -> Result<()> {
        let answer = match self.registry.remove(&request.box_name).await {
            Ok(()) => {
                self.stats.box_removed();
                BoxAnswer::ok(OpCode::RemoveBoxAnswer)
            }
            Err(e) => {
                self.stats.admin_failed();
                tracing::info!(box_name = %request.box_name, error = %e, "Remove refused");
                BoxAnswer::error(OpCode::RemoveBoxAnswer, e.to_string())
            }
        };

        self.reply(&request.reply_path, &answer).await
    }

    async fn list_boxes(&self, request: &Request) -> Result<()> {
        let boxes = self.registry.list().await;
        let mut writer = self.channels.open_writer(&request.reply_path).await?;

        if boxes.is_empty() {
            return write_record(&mut writer, &BoxListEntry::placeholder()).await;
        }

        let count = boxes.len();
        for (i, summary) in boxes.into_iter().enumerate() {
            let entry = BoxListEntry {
                last: i + 1 == count,
                box_name: summary.name,
                size: summary.size,
                publishers: summary.publishers,
                subscribers: summary.subscribers,
            };
            write_record(&mut writer, &entry).await?;
        }

        tracing::debug!(boxes = count, reply_path = %request.reply_path, "Listed boxes");
        Ok(())
    }

    async fn publisher_session(&self, request: &Request) -> Result<()> {
        let ctx = self.context(SessionRole::Publisher, request);
        let mut state = SessionState::new(SessionRole::Publisher);

        let lease = match self.lookup(&request.box_name).await.and_then(|e| e.attach_publisher()) {
            Ok(lease) => lease,
            Err(e) => {
                self.reject(&ctx, &e);
                // Opening and dropping our end ends the client's writes
                drop(self.channels.open_reader(&request.reply_path).await?);
                return Ok(());
            }
        };

        let reader = self.channels.open_reader(&request.reply_path).await?;
        let _active = self.stats.track(Gauge::ActivePublishers);
        let result = run_publisher(&ctx, lease, reader, &mut state, &self.stats).await;

        self.finish(&ctx, &mut state, result);
        Ok(())
    }

    async fn subscriber_session(&self, request: &Request) -> Result<()> {
        let ctx = self.context(SessionRole::Subscriber, request);
        let mut state = SessionState::new(SessionRole::Subscriber);

        let lease = match self.lookup(&request.box_name).await.and_then(|e| e.attach_subscriber()) {
            Ok(lease) => lease,
            Err(e) => {
                self.reject(&ctx, &e);
                // The client reads end of stream before any message
                drop(self.channels.open_writer(&request.reply_path).await?);
                return Ok(());
            }
        };

        let writer = self.channels.open_writer(&request.reply_path).await?;
        let _active = self.stats.track(Gauge::ActiveSubscribers);
        let result = run_subscriber(
            &ctx,
            lease,
            writer,
            self.read_chunk_size,
            &mut state,
            &self.stats,
        )
        .await;

        self.finish(&ctx, &mut state, result);
        Ok(())
    }

    async fn lookup(&self, name: &str) -> std::result::Result<Arc<BoxEntry>, RegistryError> {
        self.registry
            .lookup(name)
            .await
            .ok_or_else(|| RegistryError::NoSuchBox(name.to_string()))
    }

    async fn reply(&self, path: &str, answer: &BoxAnswer) -> Result<()> {
        let mut writer = self.channels.open_writer(path).await?;
        write_record(&mut writer, answer).await
    }

    fn context(&self, role: SessionRole, request: &Request) -> SessionContext {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        SessionContext::new(
            session_id,
            self.id,
            role,
            &request.box_name,
            &request.reply_path,
        )
    }

    fn reject(&self, ctx: &SessionContext, error: &RegistryError) {
        self.stats.session_rejected();
        tracing::info!(
            session_id = ctx.session_id,
            role = %ctx.role,
            box_name = %ctx.box_name,
            error = %error,
            "Session rejected"
        );
    }

    fn finish(&self, ctx: &SessionContext, state: &mut SessionState, result: Result<()>) {
        state.close();

        let duration_ms = state.duration().as_millis() as u64;
        match result {
            Ok(()) => tracing::info!(
                session_id = ctx.session_id,
                role = %ctx.role,
                box_name = %ctx.box_name,
                messages = state.messages,
                bytes = state.bytes,
                duration_ms,
                "Session closed"
            ),
            Err(e) if e.is_disconnect() => tracing::debug!(
                session_id = ctx.session_id,
                role = %ctx.role,
                box_name = %ctx.box_name,
                messages = state.messages,
                duration_ms,
                "Client disconnected"
            ),
            Err(Error::Registry(RegistryError::Storage(StorageError::Removed(_)))) => {
                tracing::info!(
                    session_id = ctx.session_id,
                    role = %ctx.role,
                    box_name = %ctx.box_name,
                    messages = state.messages,
                    "Box removed under session"
                )
            }
            Err(e) => tracing::warn!(
                session_id = ctx.session_id,
                role = %ctx.role,
                box_name = %ctx.box_name,
                error = %e,
                "Session failed"
            ),
        }
    }
}
