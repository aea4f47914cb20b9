//! Work dispatch and worker lifecycle.
//!
//! A single generator task owns the key source and feeds work items through
//! a bounded channel to a fixed pool of checker workers. The engine owns a
//! broadcast shutdown channel: an interrupt handler (or a fatal error inside
//! any task) sends on it, every task winds down, and the engine reports the
//! final checked count.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::address::derive_address;
use crate::keyspace::{Candidate, GeneratedKey};
use crate::ledger::LedgerQuery;
use crate::progress::ProgressCounter;
use crate::recorder::{Finding, FindingsLog};

/// One candidate queued for a balance check. Owned by the generator until
/// channel handoff, then exclusively by one worker.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Source password for brain-wallet scans.
    pub password: Option<String>,
    /// The candidate private key.
    pub candidate: Candidate,
    /// Derived account address.
    pub address: String,
}

/// Handoff capacity between the generator and the workers. Kept at one so
/// the generator is throttled to the aggregate worker rate and never queues
/// unbounded work.
const CHANNEL_CAPACITY: usize = 1;

/// How often the running total is logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Coordinates the generator, the worker pool, and shutdown.
pub struct DispatchEngine {
    workers: usize,
    ledger: Arc<dyn LedgerQuery>,
    findings: Arc<FindingsLog>,
    checked: Arc<ProgressCounter>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DispatchEngine {
    /// Create an engine with a fixed pool of `workers` checkers.
    pub fn new(
        workers: usize,
        ledger: Arc<dyn LedgerQuery>,
        findings: Arc<FindingsLog>,
        checked: Arc<ProgressCounter>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            workers,
            ledger,
            findings,
            checked,
            shutdown_tx,
        }
    }

    /// Handle for triggering a coordinated stop (e.g. from a signal handler).
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until the source is exhausted, a fatal error occurs, or shutdown
    /// is signalled. Returns the final checked count.
    ///
    /// Finite sources close the channel when done; workers drain it and are
    /// all joined before the count is reported, so the total is exact.
    pub async fn run<S>(&self, source: S) -> anyhow::Result<u64>
    where
        S: Iterator<Item = GeneratedKey> + Send + 'static,
    {
        info!(workers = self.workers, "starting dispatch engine");

        let (tx, rx) = mpsc::channel::<WorkItem>(CHANNEL_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            workers.spawn(check_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&self.ledger),
                Arc::clone(&self.findings),
                Arc::clone(&self.checked),
                self.shutdown_tx.subscribe(),
            ));
        }
        // Workers hold the only receiver clones from here on, so a finished
        // pool closes the producer's send side.
        drop(rx);

        let producer = tokio::spawn(produce(source, tx, self.shutdown_tx.subscribe()));
        let reporter = self.spawn_reporter();

        // First fatal error wins; everything else is told to stop.
        let mut failure: Option<anyhow::Error> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if failure.is_none() {
                        error!("fatal worker error: {:#}", e);
                        let _ = self.shutdown_tx.send(());
                        failure = Some(e);
                    }
                }
                Err(e) => {
                    if failure.is_none() {
                        let _ = self.shutdown_tx.send(());
                        failure = Some(anyhow::anyhow!("worker panicked: {}", e));
                    }
                }
            }
        }

        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if failure.is_none() {
                    error!("fatal generator error: {:#}", e);
                    failure = Some(e);
                }
            }
            Err(e) => {
                if failure.is_none() {
                    failure = Some(anyhow::anyhow!("generator panicked: {}", e));
                }
            }
        }

        reporter.abort();

        let total = self.checked.get();
        match failure {
            Some(e) => {
                info!(total, "engine stopped after error");
                Err(e)
            }
            None => {
                info!(total, "engine stopped");
                Ok(total)
            }
        }
    }

    fn spawn_reporter(&self) -> tokio::task::JoinHandle<()> {
        let checked = Arc::clone(&self.checked);
        let mut stop = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATUS_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        info!(checked = checked.get(), "progress");
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    }
}

/// Generator loop: derive each candidate's address and hand it to the pool.
/// The bounded channel blocks the send whenever every worker is busy.
async fn produce<S>(
    source: S,
    queue: mpsc::Sender<WorkItem>,
    mut stop: broadcast::Receiver<()>,
) -> anyhow::Result<()>
where
    S: Iterator<Item = GeneratedKey> + Send + 'static,
{
    for (password, candidate) in source {
        let address = derive_address(&candidate)?;
        let item = WorkItem {
            password,
            candidate,
            address,
        };

        tokio::select! {
            sent = queue.send(item) => {
                if sent.is_err() {
                    // All workers are gone; nothing left to feed.
                    break;
                }
            }
            _ = stop.recv() => {
                debug!("generator stopping");
                break;
            }
        }
    }

    // Dropping the sender closes the channel; workers exit once drained.
    Ok(())
}

/// Worker loop: receive, query, record hits, count, repeat.
async fn check_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    ledger: Arc<dyn LedgerQuery>,
    findings: Arc<FindingsLog>,
    checked: Arc<ProgressCounter>,
    mut stop: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    loop {
        let received = tokio::select! {
            item = async { queue.lock().await.recv().await } => item,
            _ = stop.recv() => {
                debug!(worker_id, "worker stopping");
                return Ok(());
            }
        };

        // Channel closed and drained: the source is exhausted.
        let Some(item) = received else {
            return Ok(());
        };

        // In-flight lookups are abandoned on shutdown rather than awaited,
        // keeping worst-case shutdown latency bounded.
        let outcome = tokio::select! {
            outcome = ledger.balance(&item.address) => outcome,
            _ = stop.recv() => {
                debug!(worker_id, "worker stopping mid-lookup");
                return Ok(());
            }
        };

        match outcome {
            Ok(balance) => {
                if !balance.is_zero() {
                    let finding = Finding {
                        password: item.password,
                        key_hex: item.candidate.to_hex(),
                        address: item.address,
                        balance,
                    };
                    info!("positive balance: {}", finding.line());
                    findings.record(&finding).await?;
                    let total = checked.increment();
                    debug!(worker_id, total, "checked");
                } else {
                    let total = checked.increment();
                    debug!(worker_id, address = %item.address, total, "checked, empty");
                }
            }
            Err(e) if e.is_fatal() => {
                return Err(anyhow::Error::new(e)
                    .context(format!("checking balance of {}", item.address)));
            }
            Err(e) => {
                warn!(worker_id, address = %item.address, error = %e, "lookup failed, skipping candidate");
                checked.increment();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::KeySource;
    use crate::ledger::QueryError;
    use async_trait::async_trait;
    use primitive_types::U256;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::tempdir;

    /// Ledger stub answering from a fixed table, zero by default.
    struct TableLedger {
        balances: HashMap<String, U256>,
    }

    #[async_trait]
    impl LedgerQuery for TableLedger {
        async fn balance(&self, address: &str) -> Result<U256, QueryError> {
            Ok(self.balances.get(address).copied().unwrap_or_default())
        }
    }

    /// Ledger stub that never answers.
    struct StalledLedger;

    #[async_trait]
    impl LedgerQuery for StalledLedger {
        async fn balance(&self, _address: &str) -> Result<U256, QueryError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    /// Ledger stub whose transport is dead.
    struct DeadLedger;

    #[async_trait]
    impl LedgerQuery for DeadLedger {
        async fn balance(&self, _address: &str) -> Result<U256, QueryError> {
            Err(QueryError::Transport("unexpected end of stream".to_string()))
        }
    }

    /// Infinite source that counts how many candidates it has produced.
    struct CountingSource {
        cursor: Candidate,
        produced: Arc<AtomicU64>,
    }

    impl Iterator for CountingSource {
        type Item = GeneratedKey;

        fn next(&mut self) -> Option<GeneratedKey> {
            self.cursor = self.cursor.successor();
            self.produced.fetch_add(1, Ordering::SeqCst);
            Some((None, self.cursor))
        }
    }

    async fn engine_with(
        workers: usize,
        ledger: Arc<dyn LedgerQuery>,
    ) -> (DispatchEngine, Arc<ProgressCounter>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let findings = Arc::new(FindingsLog::open(&dir.path().join("found.txt")).await.unwrap());
        let checked = Arc::new(ProgressCounter::new());
        let engine = DispatchEngine::new(workers, ledger, findings, Arc::clone(&checked));
        (engine, checked, dir)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finite_source_counts_every_item() {
        let passwords: Vec<String> = (0..40).map(|n| format!("pw-{}", n)).collect();
        let ledger = Arc::new(TableLedger {
            balances: HashMap::new(),
        });
        let (engine, checked, _dir) = engine_with(4, ledger).await;

        let total = engine.run(KeySource::passwords(passwords)).await.unwrap();
        assert_eq!(total, 40);
        assert_eq!(checked.get(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transient_errors_are_counted_and_skipped() {
        struct FlakyLedger;

        #[async_trait]
        impl LedgerQuery for FlakyLedger {
            async fn balance(&self, _address: &str) -> Result<U256, QueryError> {
                Err(QueryError::Lookup("503 service unavailable".to_string()))
            }
        }

        let passwords: Vec<String> = (0..10).map(|n| format!("pw-{}", n)).collect();
        let (engine, checked, _dir) = engine_with(2, Arc::new(FlakyLedger)).await;

        let total = engine.run(KeySource::passwords(passwords)).await.unwrap();
        assert_eq!(total, 10);
        assert_eq!(checked.get(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transport_failure_halts_the_engine() {
        let seed = Candidate::from_hex(&"0".repeat(64)).unwrap();
        let (engine, _checked, _dir) = engine_with(2, Arc::new(DeadLedger)).await;

        let result = engine.run(KeySource::sequential(seed)).await;
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("transport failed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutdown_stops_an_infinite_scan() {
        let seed = Candidate::from_hex(&"0".repeat(64)).unwrap();
        let ledger = Arc::new(TableLedger {
            balances: HashMap::new(),
        });
        let (engine, _checked, _dir) = engine_with(2, ledger).await;
        let shutdown = engine.shutdown_handle();

        let run = tokio::spawn(async move { engine.run(KeySource::sequential(seed)).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.send(()).unwrap();

        let total = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("engine must stop promptly after shutdown")
            .unwrap()
            .unwrap();
        assert!(total > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_generator_is_throttled_by_slow_workers() {
        let workers = 2;
        let produced = Arc::new(AtomicU64::new(0));
        let source = CountingSource {
            cursor: Candidate::from_hex(&"0".repeat(64)).unwrap(),
            produced: Arc::clone(&produced),
        };

        let (engine, _checked, _dir) = engine_with(workers, Arc::new(StalledLedger)).await;
        let shutdown = engine.shutdown_handle();

        let run = tokio::spawn(async move { engine.run(source).await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Every worker can hold one item, one can sit in the channel, and
        // one can be mid-send. The generator must not run further ahead.
        let lead = produced.load(Ordering::SeqCst);
        assert!(
            lead <= (workers + CHANNEL_CAPACITY + 1) as u64,
            "generator ran {} candidates ahead",
            lead
        );

        shutdown.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("engine must stop promptly after shutdown")
            .unwrap()
            .unwrap();
    }
}
