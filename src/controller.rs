//! Single owner of a chat session.
//!
//! The controller runs as one tokio task. Commands arrive on an `mpsc`
//! channel, snapshots leave on a `watch` channel, and every slow operation
//! (catalog fetch, enrichment, resolver call) runs in its own spawned task
//! whose completion is fed back into the same loop. State is therefore only
//! ever mutated from one place, yet a document switch is applied immediately
//! even while a reply is outstanding.
//!
//! ```text
//!  ControllerHandle ──Command──▶ ┌──────────────────┐ ──spawn──▶ catalog / resolver
//!                                │ SessionController │
//!  watch::Receiver ◀──Snapshot── └──────────────────┘ ◀─Internal─ task completions
//! ```

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::catalog::{CatalogSource, CatalogStatus, DocumentCatalog};
use crate::error::{ChatError, SendFailure, SendRejection};
use crate::models::Document;
use crate::resolver::ResponseResolver;
use crate::session::{ChatSession, PendingSend, SendOutcome, SessionView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select a catalog entry by id, or clear with `None`.
    SelectDocument(Option<String>),
    SendMessage(String),
    ReloadCatalog,
    Shutdown,
}

/// Everything a front end needs to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub catalog: CatalogStatus,
    /// Id of a selection whose enrichment is still running.
    pub selecting: Option<String>,
    pub session: SessionView,
    /// Why the most recent send was refused, if it was.
    pub last_rejection: Option<SendRejection>,
    /// Sends that reached a final outcome: reply, failure, rejection, or a
    /// reply dropped because the selection changed.
    pub settled_sends: u64,
    /// Replies dropped because the selection changed while they were out.
    pub discarded_sends: u64,
    /// Selections that reached a final outcome (committed or rolled back).
    pub settled_selections: u64,
    /// Catalog loads that finished, successfully or not.
    pub settled_loads: u64,
}

enum Internal {
    CatalogLoaded {
        seq: u64,
        result: Result<Vec<Document>, ChatError>,
    },
    Enriched {
        seq: u64,
        result: Result<Document, ChatError>,
    },
    Replied {
        pending: PendingSend,
        result: Result<String, SendFailure>,
    },
}

pub struct SessionController {
    catalog: DocumentCatalog,
    session: ChatSession,
    resolver: Arc<dyn ResponseResolver>,
    timeout: Duration,
    load_seq: u64,
    selection_seq: u64,
    selecting: Option<String>,
    last_rejection: Option<SendRejection>,
    settled_sends: u64,
    discarded_sends: u64,
    settled_selections: u64,
    settled_loads: u64,
    internal_tx: mpsc::UnboundedSender<Internal>,
    snapshots: watch::Sender<Snapshot>,
}

/// Cloneable front-end side of a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionController {
    /// Start a controller task and begin loading the catalog.
    ///
    /// `timeout` bounds each resolver call; the backend offers no
    /// cancellation of its own.
    pub fn spawn(
        catalog: Arc<dyn CatalogSource>,
        resolver: Arc<dyn ResponseResolver>,
        timeout: Duration,
    ) -> ControllerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let catalog = DocumentCatalog::new(catalog);
        let session = ChatSession::new();
        let initial = Snapshot {
            catalog: catalog.status().clone(),
            selecting: None,
            session: session.view(),
            last_rejection: None,
            settled_sends: 0,
            discarded_sends: 0,
            settled_selections: 0,
            settled_loads: 0,
        };
        let (snap_tx, snap_rx) = watch::channel(initial);

        let controller = SessionController {
            catalog,
            session,
            resolver,
            timeout,
            load_seq: 0,
            selection_seq: 0,
            selecting: None,
            last_rejection: None,
            settled_sends: 0,
            discarded_sends: 0,
            settled_selections: 0,
            settled_loads: 0,
            internal_tx,
            snapshots: snap_tx,
        };
        tokio::spawn(controller.run(cmd_rx, internal_rx));

        ControllerHandle {
            commands: cmd_tx,
            snapshots: snap_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        self.reload_catalog();
        self.publish();

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    None | Some(Command::Shutdown) => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(event) = internal.recv() => self.handle_internal(event),
            }
            self.publish();
        }
        tracing::debug!("controller stopped");
    }

    fn publish(&self) {
        self.snapshots.send_replace(Snapshot {
            catalog: self.catalog.status().clone(),
            selecting: self.selecting.clone(),
            session: self.session.view(),
            last_rejection: self.last_rejection,
            settled_sends: self.settled_sends,
            discarded_sends: self.discarded_sends,
            settled_selections: self.settled_selections,
            settled_loads: self.settled_loads,
        });
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SelectDocument(id) => self.select(id),
            Command::SendMessage(text) => self.send(text),
            Command::ReloadCatalog => self.reload_catalog(),
            Command::Shutdown => {}
        }
    }

    fn reload_catalog(&mut self) {
        self.load_seq += 1;
        let seq = self.load_seq;
        self.catalog.begin_load();

        let source = self.catalog.source();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = source.list().await;
            let _ = tx.send(Internal::CatalogLoaded { seq, result });
        });
    }

    fn select(&mut self, id: Option<String>) {
        // Any newer selection supersedes an enrichment still in flight.
        self.selection_seq += 1;
        self.selecting = None;

        let Some(id) = id else {
            self.session.select_document(None);
            self.settled_selections += 1;
            return;
        };

        let Some(summary) = self.catalog.find(&id).cloned() else {
            let reason = match self.catalog.status() {
                CatalogStatus::Ready(_) => "not in catalog",
                _ => "catalog not loaded",
            };
            self.session.fail_selection(&ChatError::DocumentEnrichment {
                id,
                reason: reason.to_string(),
            });
            self.settled_selections += 1;
            return;
        };

        let seq = self.selection_seq;
        self.selecting = Some(id);
        let source = self.catalog.source();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = source.details(&summary).await;
            let _ = tx.send(Internal::Enriched { seq, result });
        });
    }

    fn send(&mut self, text: String) {
        let pending = match self.session.begin_send(&text) {
            Ok(p) => p,
            Err(rejection) => {
                tracing::debug!(%rejection, "send rejected");
                self.last_rejection = Some(rejection);
                self.settled_sends += 1;
                return;
            }
        };
        self.last_rejection = None;

        let resolver = self.resolver.clone();
        let timeout = self.timeout;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let call = resolver.resolve(&pending.document, &pending.history, &pending.text);
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(SendFailure::Timeout(timeout)),
            };
            let _ = tx.send(Internal::Replied { pending, result });
        });
    }

    fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::CatalogLoaded { seq, result } => {
                if seq != self.load_seq {
                    return;
                }
                self.catalog.finish_load(result);
                self.settled_loads += 1;
            }
            Internal::Enriched { seq, result } => {
                if seq != self.selection_seq {
                    tracing::debug!("dropping superseded enrichment");
                    return;
                }
                self.selecting = None;
                // Failures are already recorded on the session.
                let _ = self.session.finish_selection(result);
                self.settled_selections += 1;
            }
            Internal::Replied { pending, result } => {
                if self.session.complete_send(pending, result) == SendOutcome::Discarded {
                    self.discarded_sends += 1;
                }
                self.settled_sends += 1;
            }
        }
    }
}

impl ControllerHandle {
    async fn command(&self, cmd: Command) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| anyhow!("session controller has stopped"))
    }

    pub async fn select(&self, id: Option<String>) -> Result<()> {
        self.command(Command::SelectDocument(id)).await
    }

    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.command(Command::SendMessage(text.into())).await
    }

    pub async fn reload_catalog(&self) -> Result<()> {
        self.command(Command::ReloadCatalog).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown).await
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `pred`.
    pub async fn wait_for(&self, pred: impl FnMut(&Snapshot) -> bool) -> Result<Snapshot> {
        let mut rx = self.snapshots.clone();
        let snap = rx
            .wait_for(pred)
            .await
            .map_err(|_| anyhow!("session controller has stopped"))?;
        Ok(snap.clone())
    }

    /// Wait for the catalog to finish its current load.
    pub async fn catalog_ready(&self) -> Result<Snapshot> {
        self.wait_for(|s| !matches!(s.catalog, CatalogStatus::Loading))
            .await
    }

    /// Select and wait until the selection is committed or rolled back.
    pub async fn select_and_wait(&self, id: Option<String>) -> Result<Snapshot> {
        let before = self.snapshot().settled_selections;
        self.select(id).await?;
        self.wait_for(|s| s.settled_selections > before).await
    }

    /// Send and wait until the reply, failure, or rejection is applied.
    pub async fn send_and_wait(&self, text: impl Into<String>) -> Result<Snapshot> {
        let before = self.snapshot().settled_sends;
        self.send(text).await?;
        self.wait_for(|s| s.settled_sends > before).await
    }

    /// Reload the catalog and wait for the outcome.
    pub async fn reload_and_wait(&self) -> Result<Snapshot> {
        let before = self.snapshot().settled_loads;
        self.reload_catalog().await?;
        self.wait_for(|s| s.settled_loads > before).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::models::Message;
    use crate::resolver::LocalResolver;
    use crate::session::SessionState;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Resolver that blocks until released, then echoes.
    struct GatedResolver {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ResponseResolver for GatedResolver {
        fn name(&self) -> &str {
            "gated"
        }

        async fn resolve(
            &self,
            _document: &Document,
            _history: &[Message],
            text: &str,
        ) -> Result<String, SendFailure> {
            self.gate.notified().await;
            Ok(format!("echo: {}", text))
        }
    }

    fn local() -> ControllerHandle {
        SessionController::spawn(
            Arc::new(StaticCatalog::builtin()),
            Arc::new(LocalResolver::new()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_select_and_send() {
        let handle = local();
        let snap = handle.catalog_ready().await.unwrap();
        assert!(matches!(snap.catalog, CatalogStatus::Ready(ref d) if d.len() == 4));

        let snap = handle.select_and_wait(Some("4".into())).await.unwrap();
        assert_eq!(snap.session.state, SessionState::Ready);

        let snap = handle.send_and_wait("Summarize").await.unwrap();
        assert_eq!(snap.session.messages.len(), 2);
        assert!(snap.session.messages[1].content.starts_with("Key points from Star of Chile"));
        assert_eq!(snap.session.state, SessionState::Ready);
    }

    #[tokio::test]
    async fn test_send_without_document_rejected() {
        let handle = local();
        handle.catalog_ready().await.unwrap();
        let snap = handle.send_and_wait("hello").await.unwrap();
        assert_eq!(snap.last_rejection, Some(SendRejection::NoDocument));
        assert!(snap.session.messages.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_rolls_back() {
        let handle = local();
        handle.catalog_ready().await.unwrap();
        handle.select_and_wait(Some("1".into())).await.unwrap();
        let snap = handle.select_and_wait(Some("404".into())).await.unwrap();
        assert_eq!(snap.session.document.as_ref().map(|d| d.id.as_str()), Some("1"));
        assert_eq!(snap.session.state, SessionState::Errored);
    }

    #[tokio::test]
    async fn test_second_send_while_awaiting_is_rejected() {
        let gate = Arc::new(Notify::new());
        let handle = SessionController::spawn(
            Arc::new(StaticCatalog::builtin()),
            Arc::new(GatedResolver { gate: gate.clone() }),
            Duration::from_secs(5),
        );
        handle.catalog_ready().await.unwrap();
        handle.select_and_wait(Some("2".into())).await.unwrap();

        handle.send("first").await.unwrap();
        handle.wait_for(|s| s.session.awaiting).await.unwrap();

        let snap = handle.send_and_wait("second").await.unwrap();
        assert_eq!(snap.last_rejection, Some(SendRejection::AlreadyAwaiting));
        assert_eq!(snap.session.messages.len(), 1);
        assert_eq!(snap.session.state, SessionState::Awaiting);

        gate.notify_one();
        let snap = handle.wait_for(|s| !s.session.awaiting).await.unwrap();
        assert_eq!(snap.session.messages.len(), 2);
        assert_eq!(snap.session.messages[1].content, "echo: first");
    }

    #[tokio::test]
    async fn test_switch_while_awaiting_discards_reply() {
        let gate = Arc::new(Notify::new());
        let handle = SessionController::spawn(
            Arc::new(StaticCatalog::builtin()),
            Arc::new(GatedResolver { gate: gate.clone() }),
            Duration::from_secs(5),
        );
        handle.catalog_ready().await.unwrap();
        handle.select_and_wait(Some("4".into())).await.unwrap();
        handle.send("hello").await.unwrap();
        handle.wait_for(|s| s.session.awaiting).await.unwrap();

        let snap = handle.select_and_wait(Some("3".into())).await.unwrap();
        assert_eq!(snap.session.state, SessionState::Ready);
        assert!(snap.session.messages.is_empty());

        gate.notify_one();
        let snap = handle.wait_for(|s| s.discarded_sends == 1).await.unwrap();
        assert!(snap.session.messages.is_empty());
        assert_eq!(snap.session.state, SessionState::Ready);
        assert_eq!(snap.session.document.as_ref().map(|d| d.id.as_str()), Some("3"));
    }

    #[tokio::test]
    async fn test_waiter_settles_when_reply_is_discarded() {
        let gate = Arc::new(Notify::new());
        let handle = SessionController::spawn(
            Arc::new(StaticCatalog::builtin()),
            Arc::new(GatedResolver { gate: gate.clone() }),
            Duration::from_secs(5),
        );
        handle.catalog_ready().await.unwrap();
        handle.select_and_wait(Some("4".into())).await.unwrap();

        let other = handle.clone();
        let waiter = tokio::spawn(async move { other.send_and_wait("hello").await });
        handle.wait_for(|s| s.session.awaiting).await.unwrap();

        handle.select_and_wait(Some("3".into())).await.unwrap();
        gate.notify_one();

        let snap = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("send_and_wait did not settle")
            .unwrap()
            .unwrap();
        assert_eq!(snap.discarded_sends, 1);
        assert!(snap.session.messages.is_empty());
    }

    /// Catalog whose listing blocks until released.
    struct SlowCatalog {
        inner: StaticCatalog,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl CatalogSource for SlowCatalog {
        fn name(&self) -> &str {
            "slow"
        }

        async fn list(&self) -> Result<Vec<Document>, ChatError> {
            self.gate.notified().await;
            self.inner.list().await
        }

        async fn details(&self, summary: &Document) -> Result<Document, ChatError> {
            self.inner.details(summary).await
        }
    }

    #[tokio::test]
    async fn test_select_before_catalog_loaded() {
        let gate = Arc::new(Notify::new());
        let handle = SessionController::spawn(
            Arc::new(SlowCatalog {
                inner: StaticCatalog::builtin(),
                gate: gate.clone(),
            }),
            Arc::new(LocalResolver::new()),
            Duration::from_secs(5),
        );

        let snap = handle.select_and_wait(Some("1".into())).await.unwrap();
        assert_eq!(
            snap.session.error.as_deref(),
            Some("Failed to load document 1: catalog not loaded")
        );

        gate.notify_one();
        handle.catalog_ready().await.unwrap();
        let snap = handle.select_and_wait(Some("1".into())).await.unwrap();
        assert_eq!(snap.session.state, SessionState::Ready);
    }

    #[tokio::test]
    async fn test_timeout_errors_session() {
        let handle = SessionController::spawn(
            Arc::new(StaticCatalog::builtin()),
            Arc::new(GatedResolver {
                gate: Arc::new(Notify::new()),
            }),
            Duration::from_millis(50),
        );
        handle.catalog_ready().await.unwrap();
        handle.select_and_wait(Some("1".into())).await.unwrap();
        let snap = handle.send_and_wait("anyone there?").await.unwrap();
        assert_eq!(snap.session.state, SessionState::Errored);
        assert_eq!(snap.session.messages.len(), 1);
        assert!(snap.session.error.unwrap().contains("no reply within"));
    }
}
