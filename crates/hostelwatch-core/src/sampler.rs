//! Bounded retry around a [`PositionSource`].
//!
//! Each call to [`RetryingSampler::poll`] gets a fresh retry budget: a timeout
//! is retried up to `max_attempts` times with a fixed delay in between, every
//! other failure kind is surfaced on the first occurrence.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SamplerConfig;
use crate::position::{PositionRequest, PositionSample, PositionSource, SensorFailure};

/// Retry settings for one polling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on attempts per tick, the first one included.
    pub max_attempts: u32,

    /// Pause between a timed-out attempt and the next one.
    pub retry_delay: Duration,

    /// Deadline for a single attempt.
    pub timeout: Duration,

    /// Request the platform's high-accuracy mode.
    pub high_accuracy: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            high_accuracy: true,
        }
    }
}

impl From<&SamplerConfig> for RetryPolicy {
    fn from(config: &SamplerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            high_accuracy: config.high_accuracy,
        }
    }
}

/// Drives a [`PositionSource`] with bounded retry on timeouts.
pub struct RetryingSampler {
    source: Box<dyn PositionSource>,
    policy: RetryPolicy,
    attempts: u32,
    last_attempts: u32,
}

impl RetryingSampler {
    /// Wraps `source` with the given retry policy.
    #[must_use]
    pub fn new(source: Box<dyn PositionSource>, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            attempts: 0,
            last_attempts: 0,
        }
    }

    /// The active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Attempts made by the poll in progress; zero between polls.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempts the last completed poll needed.
    #[must_use]
    pub const fn last_attempts(&self) -> u32 {
        self.last_attempts
    }

    /// Samples a position, retrying timeouts within the policy's budget.
    ///
    /// # Errors
    ///
    /// Returns [`SensorFailure::Timeout`] once every attempt timed out, or the
    /// first non-timeout failure unchanged.
    pub async fn poll(&mut self) -> Result<PositionSample, SensorFailure> {
        // A cancelled poll can leave a partial count behind.
        self.attempts = 0;

        let request = PositionRequest {
            timeout: self.policy.timeout,
            high_accuracy: self.policy.high_accuracy,
        };

        let outcome = loop {
            self.attempts += 1;

            let result =
                match tokio::time::timeout(self.policy.timeout, self.source.sample(&request)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(SensorFailure::Timeout),
                };

            match result {
                Ok(sample) => break Ok(sample),
                Err(failure)
                    if failure.is_retryable() && self.attempts < self.policy.max_attempts =>
                {
                    warn!(
                        attempt = self.attempts,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = u64::try_from(self.policy.retry_delay.as_millis())
                            .unwrap_or(u64::MAX),
                        "sample_timeout_retrying"
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(failure) => break Err(failure),
            }
        };

        self.last_attempts = std::mem::take(&mut self.attempts);

        match &outcome {
            Ok(sample) => debug!(
                attempts = self.last_attempts,
                latitude = sample.latitude,
                longitude = sample.longitude,
                accuracy_m = sample.accuracy_meters,
                "sample_acquired"
            ),
            Err(failure) => warn!(
                attempts = self.last_attempts,
                kind = failure.code(),
                error = %failure,
                "sample_failed"
            ),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::time::Instant;

    /// Replays scripted results, then repeats the fallback.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<PositionSample, SensorFailure>>>,
        fallback: Option<Result<PositionSample, SensorFailure>>,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedSource {
        fn new(
            script: Vec<Result<PositionSample, SensorFailure>>,
            fallback: Option<Result<PositionSample, SensorFailure>>,
        ) -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    script: Mutex::new(script.into()),
                    fallback,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl PositionSource for ScriptedSource {
        async fn sample(&self, _: &PositionRequest) -> Result<PositionSample, SensorFailure> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            match next.or_else(|| self.fallback.clone()) {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    fn fix() -> PositionSample {
        PositionSample::now(12.9, 77.6, 8.0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_timeouts_stop_after_three_attempts() {
        let (source, calls) = ScriptedSource::new(vec![], Some(Err(SensorFailure::Timeout)));
        let mut sampler = RetryingSampler::new(Box::new(source), RetryPolicy::default());

        let started = Instant::now();
        let result = sampler.poll().await;

        assert_eq!(result, Err(SensorFailure::Timeout));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(sampler.last_attempts(), 3);
        assert_eq!(sampler.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_is_cut_off_by_the_deadline() {
        let (source, calls) = ScriptedSource::new(vec![], None);
        let mut sampler = RetryingSampler::new(Box::new(source), RetryPolicy::default());

        let started = Instant::now();
        assert_eq!(sampler.poll().await, Err(SensorFailure::Timeout));

        assert_eq!(calls.lock().unwrap().len(), 3);
        // three 10s deadlines and two 2s pauses
        assert!(started.elapsed() >= Duration::from_secs(34));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_not_retried() {
        let (source, calls) =
            ScriptedSource::new(vec![Err(SensorFailure::PermissionDenied)], Some(Ok(fix())));
        let mut sampler = RetryingSampler::new(Box::new(source), RetryPolicy::default());

        let started = Instant::now();
        assert_eq!(sampler.poll().await, Err(SensorFailure::PermissionDenied));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_and_unknown_surface_immediately() {
        let (source, calls) = ScriptedSource::new(
            vec![
                Err(SensorFailure::Unavailable("no satellites".into())),
                Err(SensorFailure::Unknown("driver crashed".into())),
            ],
            None,
        );
        let mut sampler = RetryingSampler::new(Box::new(source), RetryPolicy::default());

        assert!(matches!(
            sampler.poll().await,
            Err(SensorFailure::Unavailable(_))
        ));
        assert!(matches!(sampler.poll().await, Err(SensorFailure::Unknown(_))));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_timeouts() {
        let (source, calls) = ScriptedSource::new(
            vec![Err(SensorFailure::Timeout), Err(SensorFailure::Timeout)],
            Some(Ok(fix())),
        );
        let mut sampler = RetryingSampler::new(Box::new(source), RetryPolicy::default());

        let sample = sampler.poll().await.unwrap();
        assert!((sample.latitude - 12.9).abs() < f64::EPSILON);
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert_eq!(sampler.last_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_poll_gets_a_fresh_budget() {
        let (source, calls) = ScriptedSource::new(
            vec![
                Err(SensorFailure::Timeout),
                Err(SensorFailure::Timeout),
                Err(SensorFailure::Timeout),
                Err(SensorFailure::Timeout),
            ],
            Some(Ok(fix())),
        );
        let mut sampler = RetryingSampler::new(Box::new(source), RetryPolicy::default());

        assert_eq!(sampler.poll().await, Err(SensorFailure::Timeout));
        assert!(sampler.poll().await.is_ok());
        assert_eq!(sampler.last_attempts(), 2);
        assert_eq!(calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_policy_from_config_never_drops_below_one_attempt() {
        let config = SamplerConfig {
            max_attempts: 0,
            ..SamplerConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }
}
