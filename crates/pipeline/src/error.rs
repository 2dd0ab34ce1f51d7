use toolz_vcs::VcsError;
use toolz_worker::DispatchError;

/// Failure of a pipeline step that runs before work is handed off.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// The dispatcher refused a task. The first `queued` tasks of the batch
    /// were accepted and still run.
    #[error("{source} ({queued} of {total} ref tasks queued)")]
    Dispatch {
        queued: usize,
        total: usize,
        #[source]
        source: DispatchError,
    },
}
