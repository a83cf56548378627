use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::{GraphliftError, Result};
use crate::service::{BuildJobStatus, BuildResult, BuildService};

use super::RemoteBuildSettings;

/// Poll `job_id` until it reaches a terminal status or the budget runs out.
///
/// Calls are spaced by `poll_interval`. Neither a call nor the wait between
/// calls extends past the deadline, and no call is issued once it has passed. Up to
/// `max_poll_errors` consecutive failed calls are tolerated.
pub async fn await_completion(
    service: &dyn BuildService,
    job_id: &str,
    settings: &RemoteBuildSettings,
) -> Result<BuildResult> {
    let started = Instant::now();
    let deadline = started + settings.poll_timeout;
    let timed_out = || GraphliftError::PollTimeout {
        job_id: job_id.to_string(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    let mut polls = 0u32;
    let mut consecutive_errors = 0u32;
    loop {
        polls += 1;
        let response = match timeout_at(deadline, service.get_status(job_id)).await {
            Err(_) => {
                crate::metrics::STATUS_POLLS_TOTAL
                    .with_label_values(&["timeout"])
                    .inc();
                return Err(timed_out());
            }
            Ok(Err(e)) => {
                crate::metrics::STATUS_POLLS_TOTAL
                    .with_label_values(&["error"])
                    .inc();
                consecutive_errors += 1;
                if consecutive_errors > settings.max_poll_errors {
                    return Err(e);
                }
                warn!(job_id, polls, consecutive_errors, error = %e, "status call failed");
                None
            }
            Ok(Ok(response)) => {
                crate::metrics::STATUS_POLLS_TOTAL
                    .with_label_values(&["ok"])
                    .inc();
                consecutive_errors = 0;
                Some(response)
            }
        };

        if let Some(response) = response {
            debug!(job_id, polls, status = %response.status, "polled build job");
            match response.status {
                BuildJobStatus::Completed => {
                    return response.result.ok_or_else(|| GraphliftError::MissingResult {
                        job_id: job_id.to_string(),
                    });
                }
                BuildJobStatus::Failed => {
                    return Err(GraphliftError::JobFailed {
                        job_id: job_id.to_string(),
                        reason: response
                            .error
                            .unwrap_or_else(|| "service reported failure".to_string()),
                    });
                }
                _ => {}
            }
        }

        sleep_until((Instant::now() + settings.poll_interval).min(deadline)).await;
        if Instant::now() >= deadline {
            return Err(timed_out());
        }
    }
}
