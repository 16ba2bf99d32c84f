//! Extraction trigger and progress stream
//!
//! The backend offers no progress channel: `extract_pdf` is a single request
//! that answers once. In `Simulated` mode the stream animates a fixed ramp
//! after that answer arrives (100 on success, stopping at 70 on failure).
//! In `Indeterminate` mode it reports no percentage until the answer.
//! Either way every update says whether its percentage is simulated.

use crate::error::IntakeError;
use crate::models::{ExtractionStatus, ExtractionUpdate};
use crate::services::backend::ProcessingBackend;
use futures::Stream;
use mdi_common::config::{ProgressConfig, ProgressMode};
use std::sync::Arc;
use std::time::Duration;

/// Where the simulated ramp stops when extraction fails
pub const FAILED_RAMP_CEILING: u8 = 70;

/// Where the simulated ramp stops when extraction succeeds
pub const SUCCESS_RAMP_CEILING: u8 = 100;

/// Shown when a failed extraction carries no backend message
pub const EXTRACTION_FAILED_FALLBACK: &str = "Failed to extract the PDF. Please try again.";

/// Trigger extraction of `pdf_id` and stream progress until a terminal status
///
/// The last item is always `Success` or `Failed`.
pub fn extraction_updates(
    backend: Arc<dyn ProcessingBackend>,
    pdf_id: i64,
    progress: ProgressConfig,
) -> impl Stream<Item = ExtractionUpdate> + Send + 'static {
    async_stream::stream! {
        let simulated = progress.mode == ProgressMode::Simulated;

        yield ExtractionUpdate {
            progress: simulated.then_some(0),
            status: ExtractionStatus::Pending,
            message: None,
            simulated,
        };

        tracing::info!(pdf_id, "Triggering extraction");
        let outcome = backend.extract_pdf(pdf_id).await;

        let (status, message) = match outcome {
            Ok(()) => {
                tracing::info!(pdf_id, "Extraction accepted by backend");
                (ExtractionStatus::Success, None)
            }
            Err(e) => {
                tracing::warn!(pdf_id, error = %e, "Extraction failed");
                (ExtractionStatus::Failed, Some(failure_message(&e)))
            }
        };

        if simulated {
            let ceiling = ramp_ceiling(status);
            let step = progress.step.max(1);
            let interval = Duration::from_millis(progress.interval_ms);

            let mut value: u8 = 0;
            while value.saturating_add(step) < ceiling {
                tokio::time::sleep(interval).await;
                value += step;
                yield ExtractionUpdate {
                    progress: Some(value),
                    status: ExtractionStatus::Pending,
                    message: None,
                    simulated: true,
                };
            }

            tokio::time::sleep(interval).await;
            yield ExtractionUpdate {
                progress: Some(ceiling),
                status,
                message,
                simulated: true,
            };
        } else {
            yield ExtractionUpdate {
                progress: (status == ExtractionStatus::Success).then_some(SUCCESS_RAMP_CEILING),
                status,
                message,
                simulated: false,
            };
        }
    }
}

fn ramp_ceiling(status: ExtractionStatus) -> u8 {
    match status {
        ExtractionStatus::Success => SUCCESS_RAMP_CEILING,
        _ => FAILED_RAMP_CEILING,
    }
}

/// Backend message if it sent one, the fallback otherwise
fn failure_message(err: &IntakeError) -> String {
    match err {
        IntakeError::Rejected { message: Some(m), .. } | IntakeError::Status { message: Some(m), .. }
            if !m.trim().is_empty() =>
        {
            m.clone()
        }
        _ => EXTRACTION_FAILED_FALLBACK.to_string(),
    }
}
