// crates/vidfx-core/src/media_types.rs
//
// Types that flow across the channel between the export worker thread and
// the host loop. No ffmpeg, no UI — just plain data.

use uuid::Uuid;

/// Lifecycle of one export job.
///
/// `Queued → Processing → MergingAudio → {Completed | CompletedWithoutAudio}`
/// is the happy path; `Cancelling → Cancelled` is entered on user request
/// and observed cooperatively by the worker, `Failed` on any error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Queued,
    Processing,
    /// Silent video fully encoded; the audio remux step is running.
    MergingAudio,
    /// Cancel requested; the worker has not yet observed the flag.
    Cancelling,
    Cancelled,
    Completed,
    /// The external transcoder was unavailable and the fallback produced a
    /// video-only output. Terminal and user-visible as a distinct state —
    /// not a failure.
    CompletedWithoutAudio,
    Failed(String),
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportStatus::Cancelled
                | ExportStatus::Completed
                | ExportStatus::CompletedWithoutAudio
                | ExportStatus::Failed(_)
        )
    }

    /// Status-line text shown next to the job.
    pub fn label(&self) -> String {
        match self {
            ExportStatus::Queued                => "Waiting...".into(),
            ExportStatus::Processing            => "Processing...".into(),
            ExportStatus::MergingAudio          => "Merging audio...".into(),
            ExportStatus::Cancelling            => "Cancelling...".into(),
            ExportStatus::Cancelled             => "Cancelled".into(),
            ExportStatus::Completed             => "Completed".into(),
            ExportStatus::CompletedWithoutAudio => "Completed (no audio)".into(),
            ExportStatus::Failed(msg)           => format!("Error: {msg}"),
        }
    }
}

/// Updates sent from the export worker thread to the host loop.
///
/// The worker never touches job state directly — it only sends these, and
/// the host applies them on its own tick (single-writer access to
/// UI-adjacent state).
#[derive(Debug, Clone)]
pub enum ExportUpdate {
    /// Overall progress, 0–100. Frame encoding covers 0–75; the remux
    /// phase accounts for the remainder.
    Progress { job_id: Uuid, percent: u8 },
    Status   { job_id: Uuid, status: ExportStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ExportStatus::Completed.is_terminal());
        assert!(ExportStatus::CompletedWithoutAudio.is_terminal());
        assert!(ExportStatus::Cancelled.is_terminal());
        assert!(ExportStatus::Failed("x".into()).is_terminal());
        assert!(!ExportStatus::Queued.is_terminal());
        assert!(!ExportStatus::Processing.is_terminal());
        assert!(!ExportStatus::MergingAudio.is_terminal());
        assert!(!ExportStatus::Cancelling.is_terminal());
    }
}
