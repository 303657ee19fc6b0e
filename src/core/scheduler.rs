/// Debounced, single-flight search
///
/// Callers send requests over a channel to one worker task. The worker waits
/// for a quiet period before running a query, runs at most one query at a
/// time, and resolves every ticket that a newer request replaced with
/// `Superseded`. Only the newest ticket can ever receive results.

use crate::core::sorter::{self, SortState};
use crate::db::{Database, ResultSet};
use crate::error::{KeeperError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Something that can answer a search term
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    async fn run(&self, term: &str) -> Result<ResultSet>;
}

#[async_trait]
impl SearchBackend for Database {
    async fn run(&self, term: &str) -> Result<ResultSet> {
        self.query_index(term).await
    }
}

/// What the worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Waiting for input to go quiet
    Pending,
    /// A query is executing and its result is still wanted
    Running,
}

struct SearchRequest {
    term: String,
    sort: SortState,
    reply: oneshot::Sender<Result<ResultSet>>,
}

impl SearchRequest {
    fn supersede(self) {
        tracing::debug!("Search for {:?} superseded", self.term);
        let _ = self.reply.send(Err(KeeperError::Superseded));
    }
}

/// Handle for one `search` call
#[derive(Debug)]
pub struct SearchTicket {
    term: String,
    reply: oneshot::Receiver<Result<ResultSet>>,
}

impl SearchTicket {
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Wait for this search's outcome
    ///
    /// Resolves to `Superseded` as soon as a newer search replaces it.
    pub async fn wait(self) -> Result<ResultSet> {
        self.reply.await.unwrap_or(Err(KeeperError::SchedulerClosed))
    }
}

struct Pending {
    request: SearchRequest,
    deadline: Instant,
}

struct Running {
    generation: u64,
    /// `None` once superseded: the result will be thrown away
    request: Option<SearchRequest>,
}

struct Worker<B> {
    backend: Arc<B>,
    quiet_period: Duration,
    pending: Option<Pending>,
    running: Option<Running>,
    generation: u64,
    done: mpsc::UnboundedSender<(u64, Result<ResultSet>)>,
    state: watch::Sender<SessionState>,
}

impl<B: SearchBackend> Worker<B> {
    fn accept(&mut self, request: SearchRequest) {
        if let Some(previous) = self.pending.take() {
            previous.request.supersede();
        }
        if let Some(running) = self.running.as_mut() {
            if let Some(in_flight) = running.request.take() {
                in_flight.supersede();
            }
        }

        tracing::trace!("Search for {:?} pending", request.term);
        self.pending = Some(Pending {
            request,
            deadline: Instant::now() + self.quiet_period,
        });
        self.publish();
    }

    fn dispatch(&mut self) {
        let Some(Pending { request, .. }) = self.pending.take() else {
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        let backend = Arc::clone(&self.backend);
        let term = request.term.clone();
        let done = self.done.clone();

        tracing::debug!("Running search #{} for {:?}", generation, term);
        tokio::spawn(async move {
            let task = tokio::spawn(async move { backend.run(&term).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(KeeperError::Worker(e.to_string())),
            };
            let _ = done.send((generation, outcome));
        });

        self.running = Some(Running {
            generation,
            request: Some(request),
        });
        self.publish();
    }

    fn finish(&mut self, generation: u64, outcome: Result<ResultSet>) {
        let running = match self.running.take() {
            Some(running) if running.generation == generation => running,
            other => {
                self.running = other;
                return;
            }
        };

        match running.request {
            None => tracing::debug!("Discarding result of superseded search #{}", generation),
            Some(request) => {
                let delivered = outcome.map(|set| ResultSet {
                    rows: sorter::apply(&set.rows, &request.sort),
                    recovered: set.recovered,
                });
                match &delivered {
                    Ok(set) => tracing::debug!(
                        "Delivering {} results for {:?}",
                        set.len(),
                        request.term
                    ),
                    Err(e) => tracing::warn!("Search for {:?} failed: {}", request.term, e),
                }
                let _ = request.reply.send(delivered);
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let state = if self.pending.is_some() {
            SessionState::Pending
        } else if self
            .running
            .as_ref()
            .is_some_and(|running| running.request.is_some())
        {
            SessionState::Running
        } else {
            SessionState::Idle
        };
        self.state.send_replace(state);
    }

    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<SearchRequest>,
        mut completions: mpsc::UnboundedReceiver<(u64, Result<ResultSet>)>,
    ) {
        loop {
            let deadline = self.pending.as_ref().map(|p| p.deadline);
            let slot_free = self.running.is_none();

            tokio::select! {
                // New input wins ties so a finished query never beats its replacement
                biased;

                message = requests.recv() => match message {
                    Some(request) => self.accept(request),
                    None => break,
                },
                Some((generation, outcome)) = completions.recv() => {
                    self.finish(generation, outcome);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() && slot_free => {
                    self.dispatch();
                }
            }
        }

        tracing::debug!("Search worker stopped");
    }
}

/// Front door to the search worker
pub struct SearchScheduler {
    requests: mpsc::UnboundedSender<SearchRequest>,
    state: watch::Receiver<SessionState>,
    worker: JoinHandle<()>,
}

impl SearchScheduler {
    /// Start the worker on the current tokio runtime
    pub fn spawn<B: SearchBackend>(backend: Arc<B>, quiet_period: Duration) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let worker = Worker {
            backend,
            quiet_period,
            pending: None,
            running: None,
            generation: 0,
            done: done_tx,
            state: state_tx,
        };

        Self {
            requests: requests_tx,
            state: state_rx,
            worker: tokio::spawn(worker.run(requests_rx, done_rx)),
        }
    }

    /// Queue a search in store/relevance order
    pub fn search(&self, term: &str) -> SearchTicket {
        self.search_sorted(term, SortState::unsorted())
    }

    /// Queue a search whose results are reordered by `sort` before delivery
    pub fn search_sorted(&self, term: &str, sort: SortState) -> SearchTicket {
        let term = term.trim().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = SearchRequest {
            term: term.clone(),
            sort,
            reply: reply_tx,
        };

        // If the worker is gone the reply sender is dropped with the request
        // and the ticket resolves to SchedulerClosed.
        let _ = self.requests.send(request);

        SearchTicket {
            term,
            reply: reply_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Stop accepting searches and wait for the worker to exit
    ///
    /// Outstanding tickets resolve to `SchedulerClosed`.
    pub async fn shutdown(self) {
        drop(self.requests);
        let _ = self.worker.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sorter::{Column, Direction};
    use crate::db::{RecordFields, RecordSummary};
    use std::sync::Mutex;
    use tokio::time::sleep;

    const QUIET: Duration = Duration::from_millis(300);

    /// Answers with one row per term after a fixed delay
    struct FakeBackend {
        delay: Duration,
        executed: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl FakeBackend {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                executed: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    fn summary(id: i64, purpose: &str) -> RecordSummary {
        RecordSummary {
            id,
            created: "2025-01-01T00:00:00.000000Z".to_string(),
            modified: "2025-01-01T00:00:00.000000Z".to_string(),
            purpose: Some(purpose.to_string()),
            tags_summary: String::new(),
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn run(&self, term: &str) -> Result<ResultSet> {
            self.executed.lock().unwrap().push(term.to_string());
            sleep(self.delay).await;
            if self.fail_on == Some(term) {
                return Err(KeeperError::StorageTimeout("database is locked".to_string()));
            }
            Ok(ResultSet::new(vec![
                summary(1, term),
                summary(2, term),
                summary(3, term),
            ]))
        }
    }

    fn purpose_of(set: &ResultSet) -> Option<String> {
        set.rows.first().and_then(|r| r.purpose.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_burst() {
        let backend = Arc::new(FakeBackend::new(Duration::from_millis(50)));
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let a = scheduler.search("a");
        sleep(Duration::from_millis(100)).await;
        let ab = scheduler.search("ab");
        sleep(Duration::from_millis(100)).await;
        let abc = scheduler.search("abc");

        let result = abc.wait().await.unwrap();
        assert_eq!(purpose_of(&result).as_deref(), Some("abc"));
        assert!(matches!(a.wait().await, Err(KeeperError::Superseded)));
        assert!(matches!(ab.wait().await, Err(KeeperError::Superseded)));
        assert_eq!(backend.executed(), vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_quiet_period() {
        let backend = Arc::new(FakeBackend::new(Duration::from_millis(10)));
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let ticket = scheduler.search("slow");
        sleep(Duration::from_millis(250)).await;
        assert!(backend.executed().is_empty());
        assert_eq!(scheduler.state(), SessionState::Pending);

        assert!(ticket.wait().await.is_ok());
        assert_eq!(backend.executed(), vec!["slow".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_stale_delivery() {
        let backend = Arc::new(FakeBackend::new(Duration::from_secs(1)));
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let a = scheduler.search("a");
        // "a" is now executing
        sleep(Duration::from_millis(400)).await;
        assert_eq!(scheduler.state(), SessionState::Running);
        let b = scheduler.search("b");

        assert!(matches!(a.wait().await, Err(KeeperError::Superseded)));
        let result = b.wait().await.unwrap();
        assert_eq!(purpose_of(&result).as_deref(), Some("b"));
        assert_eq!(backend.executed(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_slot() {
        let backend = Arc::new(FakeBackend::new(Duration::from_secs(2)));
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let _a = scheduler.search("a");
        sleep(Duration::from_millis(400)).await;
        let b = scheduler.search("b");

        // b's quiet period is long over, but a still holds the slot
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(backend.executed(), vec!["a".to_string()]);

        assert!(b.wait().await.is_ok());
        assert_eq!(backend.executed().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_caller_then_idle() {
        let mut fake = FakeBackend::new(Duration::from_millis(10));
        fake.fail_on = Some("boom");
        let backend = Arc::new(fake);
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let failed = scheduler.search("boom").wait().await;
        assert!(matches!(failed, Err(KeeperError::StorageTimeout(_))));
        assert_eq!(scheduler.state(), SessionState::Idle);

        let ok = scheduler.search("fine").wait().await;
        tokio_test::assert_ok!(ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticket_term_is_the_term_run() {
        let backend = Arc::new(FakeBackend::new(Duration::from_millis(10)));
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let ticket = scheduler.search("  padded term \n");
        assert_eq!(ticket.term(), "padded term");

        let result = ticket.wait().await.unwrap();
        assert_eq!(purpose_of(&result).as_deref(), Some("padded term"));
        assert_eq!(backend.executed(), vec!["padded term".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_applied_before_delivery() {
        let backend = Arc::new(FakeBackend::new(Duration::from_millis(10)));
        let scheduler = SearchScheduler::spawn(backend, QUIET);

        let sort = SortState::by(Column::Id, Direction::Descending);
        let result = scheduler.search_sorted("x", sort).wait().await.unwrap();
        assert_eq!(result.ids(), vec![3, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_pending_tickets() {
        let backend = Arc::new(FakeBackend::new(Duration::from_millis(10)));
        let scheduler = SearchScheduler::spawn(Arc::clone(&backend), QUIET);

        let ticket = scheduler.search("never");
        scheduler.shutdown().await;

        assert!(matches!(ticket.wait().await, Err(KeeperError::SchedulerClosed)));
        assert!(backend.executed().is_empty());
    }

    #[tokio::test]
    async fn test_against_database() {
        let db = Database::new_test().await.unwrap();
        let id = db
            .create_record(&RecordFields::default().with_body("explain recursion"))
            .await
            .unwrap();
        db.create_record(&RecordFields::default().with_body("write a limerick"))
            .await
            .unwrap();

        let scheduler = SearchScheduler::spawn(Arc::new(db), Duration::from_millis(20));

        let result = scheduler.search("recur").wait().await.unwrap();
        assert_eq!(result.ids(), vec![id]);

        let everything = scheduler.search("").wait().await.unwrap();
        assert_eq!(everything.len(), 2);

        let invalid = scheduler.search("recur AND").wait().await;
        assert!(matches!(invalid, Err(KeeperError::InvalidQuery(_))));
    }
}
