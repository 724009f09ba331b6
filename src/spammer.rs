use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::Submit;
use crate::error::{Error, Result};
use crate::generator::Generator;

const PROGRESS_EVERY: Duration = Duration::from_secs(10);

/// Outcome of a finished (or interrupted) run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub requested: usize,
    pub attempted: u32,
    pub successful: u32,
    /// Non-200 status -> occurrences.
    pub errors: BTreeMap<u16, u32>,
    /// Submissions that never got a response.
    pub transport_failures: u32,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl Summary {
    pub fn failed(&self) -> u32 {
        self.errors.values().sum::<u32>() + self.transport_failures
    }

    /// Percentage of the requested submissions that succeeded.
    pub fn success_ratio(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        self.successful as f64 / self.requested as f64 * 100.0
    }

    /// Successful submissions per second.
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.successful as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    attempted: AtomicU32,
    sent: AtomicU32,
    transport: AtomicU32,
    errors: std::sync::Mutex<BTreeMap<u16, u32>>,
}

impl Tally {
    fn record_status(&self, status: u16) {
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        *errors.entry(status).or_insert(0) += 1;
    }

    fn failed(&self) -> u32 {
        let errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        errors.values().sum::<u32>() + self.transport.load(Ordering::Relaxed)
    }

    fn summary(&self, requested: usize, elapsed: Duration, interrupted: bool) -> Summary {
        Summary {
            requested,
            attempted: self.attempted.load(Ordering::SeqCst),
            successful: self.sent.load(Ordering::SeqCst),
            errors: self.errors.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            transport_failures: self.transport.load(Ordering::SeqCst),
            elapsed,
            interrupted,
        }
    }
}

/// Fans submissions out over a fixed pool of workers.
pub struct Spammer<S> {
    submitter: Arc<S>,
    generator: Arc<Generator>,
    workers: usize,
    stop: Arc<AtomicBool>,
}

impl<S> Spammer<S>
where
    S: Submit + 'static,
{
    pub fn new(submitter: S, generator: Generator, workers: usize) -> Self {
        Self {
            submitter: Arc::new(submitter),
            generator: Arc::new(generator),
            workers: workers.max(1),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag makes every worker stop before its next job.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub async fn run(&self, requests: usize) -> Result<Summary> {
        // surface deterministic generation errors before anything is sent
        self.generator.generate(&mut rand::rng())?;

        let start = Instant::now();
        let tally = Arc::new(Tally::default());

        let (tx, rx) = mpsc::channel(requests.max(1));
        for job in 0..requests {
            if tx.send(job).await.is_err() {
                break;
            }
        }
        // workers drain the queue and see it closed once empty
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));

        info!(requests, workers = self.workers, "starting workers");
        let progress = tokio::spawn(report_progress(tally.clone(), start));

        let mut pool = JoinSet::new();
        for worker in 0..self.workers {
            pool.spawn(work(
                worker,
                queue.clone(),
                self.submitter.clone(),
                self.generator.clone(),
                tally.clone(),
                self.stop.clone(),
            ));
        }

        let mut failure = None;
        while let Some(joined) = pool.join_next().await {
            let outcome = joined.map_err(|e| Error::Worker(e.to_string())).and_then(|r| r);
            if let Err(err) = outcome {
                self.stop.store(true, Ordering::SeqCst);
                failure.get_or_insert(err);
            }
        }
        progress.abort();

        if let Some(err) = failure {
            return Err(err);
        }
        let summary = tally.summary(requests, start.elapsed(), self.stop.load(Ordering::SeqCst));
        if summary.interrupted {
            warn!(attempted = summary.attempted, "run interrupted");
        }
        Ok(summary)
    }
}

async fn work<S: Submit + 'static>(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<usize>>>,
    submitter: Arc<S>,
    generator: Arc<Generator>,
    tally: Arc<Tally>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        let Some(job) = queue.lock().await.recv().await else {
            return Ok(());
        };

        let submission = generator.generate(&mut rand::rng())?;
        tally.attempted.fetch_add(1, Ordering::SeqCst);

        match submitter.submit(&submission.payload).await {
            Ok(200) => {
                tally.sent.fetch_add(1, Ordering::SeqCst);
            }
            Ok(status) => {
                debug!(worker, job, status, "submission rejected");
                tally.record_status(status);
            }
            Err(err) => {
                warn!(worker, job, "submission failed: {err}");
                tally.transport.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

async fn report_progress(tally: Arc<Tally>, start: Instant) {
    let mut ticker = tokio::time::interval(PROGRESS_EVERY);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let sent = tally.sent.load(Ordering::Relaxed);
        info!(
            "[*] {} requests sent. {} failed requests. {:.3} average requests per second.",
            sent,
            tally.failed(),
            sent as f64 / start.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::generator::{Answer, Payload, Policy};
    use crate::schema::{Field, FieldType, Rule, Validation, ValidatorSubType, ValidatorType};

    /// Answers with `statuses` in rotation; a zero status simulates a dropped connection.
    struct Recorder {
        calls: AtomicU32,
        statuses: Vec<u16>,
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(statuses: &[u16]) -> Self {
            Self {
                calls: AtomicU32::new(0),
                statuses: statuses.to_vec(),
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Submit for Recorder {
        async fn submit(&self, payload: &Payload) -> Result<u16> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if let Some(Answer::One(value)) = payload.get("entry.1") {
                self.seen.lock().unwrap().push(value.clone());
            }
            match self.statuses[call % self.statuses.len()] {
                0 => Err(Error::Worker("connection reset".to_string())),
                status => Ok(status),
            }
        }
    }

    fn free_text() -> Field {
        Field {
            id: 1,
            kind: FieldType::ShortAnswer,
            name: "Anything".to_string(),
            choices: Vec::new(),
            validation: None,
            required: true,
            extended: false,
        }
    }

    fn generator(fields: Vec<Field>) -> Generator {
        Generator::new(fields, Policy::default()).unwrap()
    }

    #[tokio::test]
    async fn test_run_tallies_statuses() {
        let spammer = Spammer::new(Recorder::new(&[200, 200, 429, 500]), generator(vec![free_text()]), 8);
        let summary = spammer.run(100).await.unwrap();

        assert_eq!(summary.requested, 100);
        assert_eq!(summary.attempted, 100);
        assert_eq!(summary.successful, 50);
        assert_eq!(summary.errors, BTreeMap::from([(429, 25), (500, 25)]));
        assert_eq!(summary.transport_failures, 0);
        assert_eq!(summary.failed(), 50);
        assert!(!summary.interrupted);
        assert_eq!(summary.success_ratio(), 50.0);
        assert_eq!(spammer.submitter.calls.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_every_submission_is_freshly_generated() {
        let spammer = Spammer::new(Recorder::new(&[200]), generator(vec![free_text()]), 4);
        spammer.run(20).await.unwrap();
        let seen = spammer.submitter.seen.lock().unwrap();
        assert_eq!(seen.len(), 20);
        let distinct: HashSet<&String> = seen.iter().collect();
        assert_eq!(distinct.len(), 20);
    }

    #[tokio::test]
    async fn test_transport_failures_are_counted() {
        let spammer = Spammer::new(Recorder::new(&[200, 0]), generator(vec![free_text()]), 3);
        let summary = spammer.run(10).await.unwrap();
        assert_eq!(summary.successful, 5);
        assert_eq!(summary.transport_failures, 5);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_fatal_generation_error_aborts_before_sending() {
        let args = vec!["40".to_string()];
        let rule = Rule::resolve(9, ValidatorType::Number, ValidatorSubType::EqualTo, &args).unwrap();
        let field = Field {
            id: 9,
            validation: Some(Validation {
                kind: ValidatorType::Number,
                sub_kind: ValidatorSubType::EqualTo,
                args,
                error_message: None,
                rule,
            }),
            ..free_text()
        };
        let spammer = Spammer::new(Recorder::new(&[200]), generator(vec![field]), 4);
        assert!(matches!(spammer.run(10).await, Err(Error::Unsatisfiable { id: 9, .. })));
        assert_eq!(spammer.submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_flag_halts_workers() {
        let spammer = Spammer::new(Recorder::new(&[200]), generator(vec![free_text()]), 4);
        spammer.stop_handle().store(true, Ordering::SeqCst);
        let summary = spammer.run(50).await.unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.attempted, 0);
    }

    #[tokio::test]
    async fn test_zero_requests() {
        let spammer = Spammer::new(Recorder::new(&[200]), generator(vec![free_text()]), 0);
        let summary = spammer.run(0).await.unwrap();
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.success_ratio(), 0.0);
    }
}
