//! Lifecycle controller for the single in-flight generation job.
//!
//! State only changes inside this module. Every network call is stamped with
//! the generation counter that was current when it was dispatched and its
//! result is dropped if the counter has moved on (cancel, timeout, new job).

use crate::config::FLUX_MODEL_ENDPOINT;
use crate::credentials::CredentialStore;
use crate::error::{AppError, ValidationError};
use crate::generator::backend::{GenerationRelay, RelayError};
use crate::job::{ControllerState, FailureKind, JobFailure};
use fx_core::{GenerationRequest, JobHandle, JobStatus, normalize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub mod backend;
pub mod jobs;
#[cfg(test)]
pub(crate) mod testing;

/// Shortest poll period; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model_endpoint: String,
    pub poll_interval: Duration,
    pub job_timeout: Option<Duration>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model_endpoint: FLUX_MODEL_ENDPOINT.to_string(),
            poll_interval: Duration::from_secs(1),
            job_timeout: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Clone)]
pub struct Generator {
    shared: Arc<Shared>,
}

struct Shared {
    relay: Arc<dyn GenerationRelay>,
    credentials: Arc<dyn CredentialStore>,
    config: GeneratorConfig,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ControllerState>,
}

#[derive(Default)]
struct Lifecycle {
    state: ControllerState,
    handle: Option<JobHandle>,
    generation: u64,
    poll_stop: Option<CancellationToken>,
}

#[derive(Debug, PartialEq, Eq)]
enum PollStep {
    Continue,
    Stop,
}

impl Generator {
    pub fn new(
        relay: Arc<dyn GenerationRelay>,
        credentials: Arc<dyn CredentialStore>,
        mut config: GeneratorConfig,
    ) -> Self {
        config.poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let (state_tx, _) = watch::channel(ControllerState::Idle);

        Self {
            shared: Arc::new(Shared {
                relay,
                credentials,
                config,
                lifecycle: Mutex::new(Lifecycle::default()),
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.shared.state_tx.borrow().clone()
    }

    /// Receives every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.shared.state_tx.subscribe()
    }

    pub fn active_job(&self) -> Option<JobHandle> {
        self.lock().handle.clone()
    }

    /// Resolves once no job is submitting or polling.
    pub async fn wait_until_settled(&self) -> ControllerState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_active()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Submits a new job and starts polling it.
    ///
    /// Rejected without touching state when the request is empty, no API key
    /// is stored, or another job is still submitting or polling.
    pub async fn submit(&self, request: GenerationRequest) -> Result<JobHandle, AppError> {
        if request.is_empty() {
            return Err(ValidationError::EmptyRequest.into());
        }
        let api_key = self
            .shared
            .credentials
            .get()
            .ok_or(ValidationError::MissingCredential)?;

        let generation = {
            let mut lc = self.lock();
            if lc.state.is_active() {
                tracing::warn!(
                    state = lc.state.label(),
                    "Rejecting submission while a job is active"
                );
                return Err(AppError::ConcurrentJob);
            }
            if let Some(stop) = lc.poll_stop.take() {
                stop.cancel();
            }
            lc.generation += 1;
            lc.handle = None;
            self.transition(&mut lc, ControllerState::Submitting);
            lc.generation
        };

        let params = normalize(request.strength);
        tracing::info!(
            generation,
            strength = request.strength,
            has_image = request.source_image.is_some(),
            steps = params.num_inference_steps,
            "Submitting generation job"
        );
        let result = jobs::submit_job(
            self.shared.relay.as_ref(),
            &api_key,
            &self.shared.config.model_endpoint,
            &request,
            &params,
        )
        .await;

        let result = {
            let mut lc = self.lock();
            if lc.generation == generation {
                return match result {
                    Ok(handle) => {
                        let stop = CancellationToken::new();
                        lc.handle = Some(handle.clone());
                        lc.poll_stop = Some(stop.clone());
                        self.transition(&mut lc, ControllerState::Polling);
                        drop(lc);

                        let this = self.clone();
                        let polled = handle.clone();
                        let poller = tokio::spawn(async move {
                            this.poll_loop(generation, polled, api_key, stop).await
                        });
                        let this = self.clone();
                        tokio::spawn(async move { this.watch_poller(generation, poller).await });
                        Ok(handle)
                    }
                    Err(e) => {
                        tracing::error!(generation, error = %e, "Submission failed");
                        let kind = match e {
                            AppError::MalformedResponse(_) => FailureKind::MalformedResponse,
                            _ => FailureKind::Submission,
                        };
                        self.transition(
                            &mut lc,
                            ControllerState::Failed(JobFailure::new(kind, e.to_string())),
                        );
                        Err(e)
                    }
                };
            }
            result
        };

        // Canceled while the creation call was in flight. The upstream job
        // exists now, so cancel it too.
        if let Ok(handle) = result {
            tracing::info!(job_id = %handle.id, "Canceling job created after local cancel");
            let _ = self.spawn_background_cancel(api_key, handle).await;
        }
        Err(AppError::Canceled)
    }

    /// Cancels the active job.
    ///
    /// State moves to `Canceled` before any network call, so the result of
    /// the upstream cancellation only reaches the caller. Returns `Ok(false)`
    /// when there was nothing to cancel.
    pub async fn cancel(&self) -> Result<bool, AppError> {
        let handle = {
            let mut lc = self.lock();
            if !lc.state.is_active() {
                tracing::debug!(state = lc.state.label(), "Nothing to cancel");
                return Ok(false);
            }
            lc.generation += 1;
            if let Some(stop) = lc.poll_stop.take() {
                stop.cancel();
            }
            let handle = lc.handle.take();
            self.transition(&mut lc, ControllerState::Canceled);
            handle
        };

        // Still submitting: there is no upstream job to cancel yet.
        let Some(handle) = handle else {
            return Ok(true);
        };
        let api_key = self
            .shared
            .credentials
            .get()
            .ok_or(ValidationError::MissingCredential)?;

        // Spawned so the request survives the caller dropping this future.
        let relay = self.shared.relay.clone();
        let task =
            tokio::spawn(async move { jobs::cancel_job(relay.as_ref(), &api_key, &handle).await });
        match task.await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Upstream cancellation failed");
                Err(e)
            }
            Err(e) => Err(AppError::Cancellation(RelayError::Transport(e.to_string()))),
        }
    }

    /// Submits `request` and follows it until it settles.
    ///
    /// `interrupt` resolving at any point, submission included, cancels the
    /// job. A job created after the interrupt is canceled upstream before this
    /// returns. Rejections and failed upstream cancellations come back as
    /// errors; everything else ends in the returned state.
    pub async fn run(
        &self,
        request: GenerationRequest,
        interrupt: impl Future<Output = ()>,
    ) -> Result<ControllerState, AppError> {
        tokio::pin!(interrupt);
        let mut submission = tokio::spawn({
            let this = self.clone();
            async move { this.submit(request).await }
        });

        tokio::select! {
            joined = &mut submission => {
                match flatten_join(joined) {
                    Err(e) if e.is_rejection() => return Err(e),
                    Err(e) => tracing::debug!(error = %e, "Submission did not start a job"),
                    Ok(_) => {}
                }
                tokio::select! {
                    state = self.wait_until_settled() => Ok(state),
                    _ = &mut interrupt => self.interrupted().await,
                }
            }
            _ = &mut interrupt => {
                let state = self.interrupted().await;
                if let Err(e) = flatten_join(submission.await) {
                    tracing::debug!(error = %e, "Interrupted submission finished");
                }
                state
            }
        }
    }

    async fn interrupted(&self) -> Result<ControllerState, AppError> {
        tracing::info!(state = self.state().label(), "Interrupted");
        self.cancel().await?;
        Ok(self.state())
    }

    /// Fails the job if its poll task ended without settling it.
    async fn watch_poller(&self, generation: u64, poller: JoinHandle<()>) {
        let reason = match poller.await {
            Ok(()) => "poll loop exited".to_string(),
            Err(e) => {
                tracing::error!(generation, error = %e, "Poll task died");
                format!("poll task died: {e}")
            }
        };

        let mut lc = self.lock();
        if lc.generation != generation || lc.state != ControllerState::Polling {
            return;
        }
        lc.handle = None;
        lc.poll_stop = None;
        self.transition(
            &mut lc,
            ControllerState::Failed(JobFailure::new(FailureKind::Poll, reason)),
        );
    }

    async fn poll_loop(
        &self,
        generation: u64,
        handle: JobHandle,
        api_key: String,
        stop: CancellationToken,
    ) {
        let interval = self.shared.config.poll_interval;
        let started = Instant::now();
        let mut ticker = time::interval_at(started + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::debug!(job_id = %handle.id, generation, "Poll loop stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Some(limit) = self.shared.config.job_timeout {
                if started.elapsed() >= limit {
                    self.apply_timeout(generation, &handle, api_key, limit);
                    return;
                }
            }

            // Awaited in place: the next tick cannot start before this one lands.
            let outcome = jobs::poll_job(self.shared.relay.as_ref(), &api_key, &handle).await;
            if self.apply_poll(generation, &handle, outcome) == PollStep::Stop {
                return;
            }
        }
    }

    fn apply_poll(
        &self,
        generation: u64,
        handle: &JobHandle,
        outcome: Result<JobStatus, AppError>,
    ) -> PollStep {
        let mut lc = self.lock();
        if lc.generation != generation || lc.state != ControllerState::Polling {
            tracing::debug!(job_id = %handle.id, generation, "Dropping stale poll result");
            return PollStep::Stop;
        }

        let next = match outcome {
            Ok(JobStatus::Queued | JobStatus::Processing) => {
                tracing::debug!(job_id = %handle.id, "Job still running");
                return PollStep::Continue;
            }
            Ok(JobStatus::Succeeded { output_url }) => {
                tracing::info!(job_id = %handle.id, output = %output_url, "Job succeeded");
                ControllerState::Succeeded { output: output_url }
            }
            Ok(JobStatus::Failed { error }) => {
                let message = error.unwrap_or_else(|| "Prediction failed".to_string());
                tracing::warn!(job_id = %handle.id, error = %message, "Job failed upstream");
                ControllerState::Failed(JobFailure::new(FailureKind::JobFailed, message))
            }
            Ok(JobStatus::Canceled) => {
                tracing::info!(job_id = %handle.id, "Job canceled upstream");
                ControllerState::Canceled
            }
            Err(e) => {
                tracing::error!(job_id = %handle.id, error = %e, "Polling failed");
                let kind = match e {
                    AppError::MalformedResponse(_) => FailureKind::MalformedResponse,
                    _ => FailureKind::Poll,
                };
                ControllerState::Failed(JobFailure::new(kind, e.to_string()))
            }
        };

        lc.handle = None;
        lc.poll_stop = None;
        self.transition(&mut lc, next);
        PollStep::Stop
    }

    fn apply_timeout(&self, generation: u64, handle: &JobHandle, api_key: String, limit: Duration) {
        let mut lc = self.lock();
        if lc.generation != generation || lc.state != ControllerState::Polling {
            return;
        }
        tracing::warn!(job_id = %handle.id, limit_secs = limit.as_secs(), "Job timed out");
        lc.handle = None;
        lc.poll_stop = None;
        let failure = JobFailure::new(
            FailureKind::TimedOut,
            format!("no result after {}s", limit.as_secs()),
        );
        self.transition(&mut lc, ControllerState::Failed(failure));
        drop(lc);

        // Detached: the controller has already settled.
        drop(self.spawn_background_cancel(api_key, handle.clone()));
    }

    /// Best-effort upstream cancel whose outcome never reaches state.
    fn spawn_background_cancel(&self, api_key: String, handle: JobHandle) -> JoinHandle<()> {
        let relay = self.shared.relay.clone();
        tokio::spawn(async move {
            if let Err(e) = jobs::cancel_job(relay.as_ref(), &api_key, &handle).await {
                tracing::warn!(job_id = %handle.id, error = %e, "Background cancellation failed");
            }
        })
    }

    fn transition(&self, lc: &mut Lifecycle, next: ControllerState) {
        tracing::info!(
            from = lc.state.label(),
            to = next.label(),
            generation = lc.generation,
            "State transition"
        );
        lc.state = next.clone();
        self.shared.state_tx.send_replace(next);
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn flatten_join<T>(
    joined: Result<Result<T, AppError>, tokio::task::JoinError>,
) -> Result<T, AppError> {
    joined.unwrap_or_else(|e| Err(AppError::Submission(RelayError::Transport(e.to_string()))))
}
