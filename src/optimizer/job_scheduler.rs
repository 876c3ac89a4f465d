//! # Job Scheduler
//!
//! Pool limitato (un permesso di semaforo per CPU) che esegue un job per file.
//!
//! ## Ciclo di vita di un job:
//! `Queued` (in attesa del permesso) → `Running` (corpo in `spawn_blocking`)
//! → `Completed` | `Failed`. Nessuna priorità, cancellazione o retry.
//!
//! ## Polling:
//! `poll()` raccoglie i job terminati, logga una sola volta l'eventuale
//! errore (o panic) e scarta l'handle; ritorna il numero di job ancora attivi.
//! `drain()` attende tutti i job in volo, usato allo shutdown.

use anyhow::Result;
use futures::FutureExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::optimizer::task_optimizer::TaskOptimizer;
use crate::processing_log::ProcessingLog;
use crate::settings::UserSettings;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

struct Job {
    handle: JoinHandle<Result<()>>,
    state: Arc<Mutex<JobState>>,
}

/// Bounded pool of independent jobs
pub struct JobScheduler {
    semaphore: Arc<Semaphore>,
    jobs: Mutex<HashMap<JobId, Job>>,
    optimizer: Arc<TaskOptimizer>,
    log: Arc<ProcessingLog>,
    workers: usize,
}

impl JobScheduler {
    pub fn new(workers: usize, optimizer: Arc<TaskOptimizer>, log: Arc<ProcessingLog>) -> Self {
        let workers = workers.max(1);
        debug!("🔧 Job scheduler with {} worker slot(s)", workers);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            jobs: Mutex::new(HashMap::new()),
            optimizer,
            log,
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue one asset. Must be called from within a tokio runtime.
    pub fn submit(
        &self,
        asset_path: PathBuf,
        settings: UserSettings,
        output_root: PathBuf,
    ) -> JobId {
        let optimizer = self.optimizer.clone();
        self.submit_with(move || optimizer.process(&asset_path, &settings, &output_root))
    }

    pub(crate) fn submit_with<F>(&self, body: F) -> JobId
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(JobState::Queued));
        let semaphore = self.semaphore.clone();
        let task_state = state.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            set_state(&task_state, JobState::Running);

            let result = match tokio::task::spawn_blocking(body).await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!("job panicked: {}", e)),
            };

            set_state(
                &task_state,
                if result.is_ok() { JobState::Completed } else { JobState::Failed },
            );
            result
        });

        self.lock_jobs().insert(id, Job { handle, state });
        id
    }

    /// Reap finished jobs and return how many are still in flight
    pub fn poll(&self) -> usize {
        let mut jobs = self.lock_jobs();
        let finished: Vec<JobId> = jobs
            .iter()
            .filter(|(_, job)| job.handle.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            let Some(mut job) = jobs.remove(&id) else { continue };
            match (&mut job.handle).now_or_never() {
                Some(outcome) => self.report(id, outcome),
                // finished but not yet observable; try again next poll
                None => {
                    jobs.insert(id, job);
                }
            }
        }

        jobs.len()
    }

    /// Current state of a job that has not been reaped yet
    pub fn state(&self, id: &JobId) -> Option<JobState> {
        self.lock_jobs()
            .get(id)
            .map(|job| *job.state.lock().unwrap_or_else(|p| p.into_inner()))
    }

    /// Wait for every in-flight job, including ones submitted meanwhile
    pub async fn drain(&self) {
        loop {
            let jobs: Vec<(JobId, Job)> = self.lock_jobs().drain().collect();
            if jobs.is_empty() {
                break;
            }
            for (id, job) in jobs {
                let outcome = job.handle.await;
                self.report(id, outcome);
            }
        }
    }

    fn report(&self, id: JobId, outcome: std::result::Result<Result<()>, tokio::task::JoinError>) {
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{:#}", e),
            Err(e) => e.to_string(),
        };
        self.log.info(format!("🚨 Task {} ended with an error: {}", id, error));
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn set_state(state: &Mutex<JobState>, value: JobState) {
    *state.lock().unwrap_or_else(|p| p.into_inner()) = value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profiles;
    use crate::tool_runner::testing::{runner, FakeExecutor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn scheduler(workers: usize, log: Arc<ProcessingLog>) -> JobScheduler {
        let optimizer = TaskOptimizer::new(
            Arc::new(Profiles::default()),
            runner(FakeExecutor::succeeding(), log.clone()),
            log.clone(),
        );
        JobScheduler::new(workers, Arc::new(optimizer), log)
    }

    async fn wait_idle(scheduler: &JobScheduler) {
        for _ in 0..500 {
            if scheduler.poll() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("jobs did not finish");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_job_is_reported_once() {
        let log = Arc::new(ProcessingLog::new());
        let scheduler = scheduler(2, log.clone());

        let done = Arc::new(AtomicUsize::new(0));
        for k in 0..5 {
            let done = done.clone();
            scheduler.submit_with(move || {
                if k == 3 {
                    return Err(anyhow::anyhow!("boom in job 3"));
                }
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        wait_idle(&scheduler).await;
        assert_eq!(scheduler.poll(), 0);
        assert_eq!(done.load(Ordering::SeqCst), 4);

        let errors: Vec<_> = log.snapshot().into_iter().filter(|l| l.contains("ended with an error")).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("boom in job 3"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_does_not_affect_siblings() {
        let log = Arc::new(ProcessingLog::new());
        let scheduler = scheduler(1, log.clone());

        scheduler.submit_with(|| panic!("kaboom"));
        let ok = scheduler.submit_with(|| Ok(()));

        wait_idle(&scheduler).await;
        assert_eq!(scheduler.state(&ok), None);
        let errors = log.snapshot().into_iter().filter(|l| l.contains("ended with an error")).count();
        assert_eq!(errors, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_is_bounded() {
        let log = Arc::new(ProcessingLog::new());
        let scheduler = scheduler(2, log);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let (running, peak) = (running.clone(), peak.clone());
            scheduler.submit_with(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        scheduler.drain().await;
        assert_eq!(scheduler.poll(), 0);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_states_progress() {
        let log = Arc::new(ProcessingLog::new());
        let scheduler = scheduler(1, log);

        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let blocker = scheduler.submit_with(move || {
            let _ = rx.recv();
            Ok(())
        });

        for _ in 0..200 {
            if scheduler.state(&blocker) == Some(JobState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(scheduler.state(&blocker), Some(JobState::Running));

        let waiting = scheduler.submit_with(|| Ok(()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.state(&waiting), Some(JobState::Queued));
        assert_eq!(scheduler.poll(), 2);

        tx.send(()).unwrap();
        scheduler.drain().await;
        assert_eq!(scheduler.poll(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_runs_the_task_optimizer() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("broken.png");
        std::fs::write(&src, b"not a png").unwrap();
        let good = dir.path().join("good.png");
        image::RgbImage::from_pixel(20, 10, image::Rgb([9, 9, 9])).save(&good).unwrap();

        let log = Arc::new(ProcessingLog::new());
        let scheduler = scheduler(2, log.clone());
        let settings = UserSettings {
            sizes_to_process: vec!["full_size".into()],
            ..Default::default()
        };
        let out = dir.path().join("output");
        scheduler.submit(src, settings.clone(), out.clone());
        scheduler.submit(good, settings, out.clone());

        scheduler.drain().await;
        assert!(out.join("good/good_full_size.webp").is_file());
        assert!(!out.join("broken").exists());
        let lines = log.snapshot();
        assert_eq!(lines.iter().filter(|l| l.contains("🚨")).count(), 1);
        assert!(lines.contains(&"🚨 Error: Unable to recognize 'broken.png'.".to_string()));
    }
}
