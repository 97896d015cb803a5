use crate::OperationId;

/// All event types emitted by depot operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepotEvent {
    /// A requested package could not be found during lookup.
    LookupMiss { repo: String, item: String },
    /// A lookup expected one package but matched several.
    LookupAmbiguous {
        repo: String,
        item: String,
        count: usize,
    },
    /// Content changes computed for a repository, before submission.
    ReconcilePlanned {
        repo: String,
        release: Option<String>,
        add: usize,
        remove: usize,
        retained: usize,
    },
    /// A task changed state while being polled.
    TaskProgress { task: String, stage: TaskStage },
    /// An upload is starting.
    UploadStarting { op_id: OperationId, source: String },
    /// An upload finished and the package was read back.
    UploadComplete {
        op_id: OperationId,
        source: String,
        package_id: String,
    },
    /// An upload failed.
    UploadFailed {
        op_id: OperationId,
        source: String,
        error: String,
    },
    /// Batch operation overall progress.
    BatchProgress {
        completed: u32,
        total: u32,
        failed: u32,
    },
}

/// Task polling stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStage {
    Waiting,
    Running,
    /// Status read was rejected as unauthorized and is being retried once.
    RetryingUnauthorized,
    Completed,
    Failed,
    Canceled,
    Skipped,
}

