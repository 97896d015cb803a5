use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use depot_config::Config;
use depot_events::{next_op_id, DepotEvent, EventSinkHandle, NullSink};
use depot_gateway::{GatewayError, PackageApi, Session, TaskPoller};
use depot_id::{Identifier, PackageType};
use rayon::{prelude::*, ThreadPoolBuilder};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Uploads run on this many workers, each with its own session.
pub const UPLOAD_WORKERS: usize = 5;

type SessionFactory = Arc<dyn Fn() -> Session + Send + Sync>;

#[derive(Debug, Clone)]
pub struct UploadedPackage {
    pub source: String,
    pub package_id: Identifier,
    pub record: Value,
}

#[derive(Debug, Clone)]
pub struct FailedUpload {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedPackage>,
    pub failed: Vec<FailedUpload>,
}

/// Creates packages from URLs in parallel.
///
/// Sessions are never shared between workers: each worker builds its own,
/// so credentials and correlation ids stay with one thread.
pub struct PackageUploader {
    sessions: SessionFactory,
    package_type: PackageType,
    relative_path: Option<String>,
    events: EventSinkHandle,
}

impl PackageUploader {
    pub fn new(config: &Config, package_type: PackageType) -> Self {
        let config = config.clone();
        Self::with_sessions(move || Session::new(&config), package_type)
    }

    /// Uses `sessions` to build each worker's session.
    pub fn with_sessions<F>(sessions: F, package_type: PackageType) -> Self
    where
        F: Fn() -> Session + Send + Sync + 'static,
    {
        Self {
            sessions: Arc::new(sessions),
            package_type,
            relative_path: None,
            events: Arc::new(NullSink),
        }
    }

    /// Path the package is stored under. Only meaningful for a single URL.
    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    /// Uploads every URL and reports what was created and what failed.
    pub fn upload(&self, urls: &[String]) -> Result<UploadReport> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(UPLOAD_WORKERS)
            .thread_name(|i| format!("depot-upload-{i}"))
            .build()?;

        let total = urls.len() as u32;
        let completed = AtomicU32::new(0);
        let failed = AtomicU32::new(0);
        info!(total, package_type = %self.package_type, "uploading packages");

        let results: Vec<std::result::Result<UploadedPackage, FailedUpload>> = pool.install(|| {
            urls.par_iter()
                .map_init(
                    || (self.sessions)().with_events(self.events.clone()),
                    |session, url| {
                        let outcome = self.upload_one(session, url);
                        if outcome.is_err() {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        self.events.emit(DepotEvent::BatchProgress {
                            completed: completed.fetch_add(1, Ordering::Relaxed) + 1,
                            total,
                            failed: failed.load(Ordering::Relaxed),
                        });
                        outcome
                    },
                )
                .collect()
        });

        let mut report = UploadReport::default();
        for result in results {
            match result {
                Ok(package) => report.uploaded.push(package),
                Err(failure) => report.failed.push(failure),
            }
        }
        Ok(report)
    }

    fn upload_one(
        &self,
        session: &Session,
        url: &str,
    ) -> std::result::Result<UploadedPackage, FailedUpload> {
        let op_id = next_op_id();
        self.events.emit(DepotEvent::UploadStarting {
            op_id,
            source: url.to_string(),
        });

        match self.create(session, url) {
            Ok((package_id, record)) => {
                debug!(source = url, package = %package_id, "package uploaded");
                self.events.emit(DepotEvent::UploadComplete {
                    op_id,
                    source: url.to_string(),
                    package_id: package_id.to_string(),
                });
                Ok(UploadedPackage {
                    source: url.to_string(),
                    package_id,
                    record,
                })
            }
            Err(e) => {
                warn!(source = url, error = %e, "package upload failed");
                self.events.emit(DepotEvent::UploadFailed {
                    op_id,
                    source: url.to_string(),
                    error: e.to_string(),
                });
                Err(FailedUpload {
                    source: url.to_string(),
                    error: e.to_string(),
                })
            }
        }
    }

    fn create(&self, session: &Session, url: &str) -> depot_gateway::Result<(Identifier, Value)> {
        let packages = PackageApi::new(session);
        let task =
            packages.create_from_url(self.package_type, url, self.relative_path.as_deref())?;
        let package_id = TaskPoller::new(session)
            .created_resources(&task)?
            .into_iter()
            .find(Identifier::is_package)
            .ok_or(GatewayError::MissingField("created_resources"))?;
        let record = packages.read(&package_id)?;
        Ok((package_id, record))
    }
}
