//! # Export Pipeline
//!
//! Fetches one document in several formats at once and writes each to disk.
//!
//! ## Model
//!
//! `run` spawns one task per [`ExportTarget`]. Every task:
//!
//! 1. requests the export for its MIME type,
//! 2. re-fetches the document metadata, which resolves the job's
//!    [`DocumentRef`] and supplies the display name,
//! 3. checks that the export answered `200`,
//! 4. streams the body into `{output_dir}/{display_name}.{extension}`.
//!
//! Failures stay local to their task. The pipeline waits for every task and
//! always returns one [`ExportJob`] per target, in target order, including
//! for a task that panicked.

use crate::directory::DocumentRef;
use crate::error::{ExportError, Result};
use crate::targets::ExportTarget;
use bridge_traits::storage::DocumentService;
use core_runtime::logging::strip_path;
use futures::future::join_all;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, info_span, instrument, warn, Instrument};

/// Terminal or pending state of a single export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Pending,
    Success(PathBuf),
    Failed(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }
}

/// One (document, target) export and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    /// Unresolved when the worker never got the document metadata
    pub document: DocumentRef,
    pub target: ExportTarget,
    pub outcome: JobOutcome,
}

impl ExportJob {
    fn pending(document_id: &str, target: ExportTarget) -> Self {
        Self {
            document: DocumentRef::unresolved(document_id),
            target,
            outcome: JobOutcome::Pending,
        }
    }

    /// Record the terminal outcome; later calls are ignored
    fn finish(&mut self, outcome: JobOutcome) {
        if self.outcome == JobOutcome::Pending {
            self.outcome = outcome;
        }
    }
}

impl fmt::Display for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            JobOutcome::Pending => write!(f, "[{}] pending", self.target),
            JobOutcome::Success(path) => write!(f, "[{}] saved {}", self.target, path.display()),
            JobOutcome::Failed(reason) => write!(f, "[{}] failed: {}", self.target, reason),
        }
    }
}

/// Counts over a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn of(jobs: &[ExportJob]) -> Self {
        let succeeded = jobs.iter().filter(|job| job.outcome.is_success()).count();
        Self {
            succeeded,
            failed: jobs.len() - succeeded,
        }
    }
}

#[derive(Clone)]
pub struct ExportPipeline {
    service: Arc<dyn DocumentService>,
    output_dir: PathBuf,
}

impl ExportPipeline {
    pub fn new(service: Arc<dyn DocumentService>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export `document_id` once per target, concurrently.
    ///
    /// Never fails as a whole: every problem is recorded on the job it
    /// affected.
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub async fn run(&self, document_id: &str, targets: &[ExportTarget]) -> Vec<ExportJob> {
        let mut jobs: Vec<ExportJob> = targets
            .iter()
            .cloned()
            .map(|target| ExportJob::pending(document_id, target))
            .collect();

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            let reason = ExportError::FileIo {
                path: self.output_dir.clone(),
                source: e,
            }
            .to_string();
            error!(error = %reason, "Cannot create output directory");
            for job in &mut jobs {
                job.finish(JobOutcome::Failed(reason.clone()));
            }
            return jobs;
        }

        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let service = self.service.clone();
                let output_dir = self.output_dir.clone();
                let mut document = DocumentRef::unresolved(document_id);
                let span = info_span!("export", mime_type = %target.mime_type);

                tokio::spawn(
                    async move {
                        let result =
                            export_one(service.as_ref(), &output_dir, &mut document, &target).await;
                        (document, result)
                    }
                    .instrument(span),
                )
            })
            .collect();

        for (job, joined) in jobs.iter_mut().zip(join_all(handles).await) {
            let outcome = match joined {
                Ok((document, result)) => {
                    job.document = document;
                    match result {
                        Ok(path) => JobOutcome::Success(path),
                        Err(e) => {
                            warn!(format = %job.target, error = %e, "Export failed");
                            JobOutcome::Failed(e.to_string())
                        }
                    }
                }
                Err(join_error) => {
                    let e = ExportError::WorkerAborted(join_error.to_string());
                    error!(format = %job.target, error = %e, "Export worker aborted");
                    JobOutcome::Failed(e.to_string())
                }
            };
            job.finish(outcome);
        }

        let summary = RunSummary::of(&jobs);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Export run finished"
        );
        jobs
    }
}

async fn export_one(
    service: &dyn DocumentService,
    output_dir: &Path,
    document: &mut DocumentRef,
    target: &ExportTarget,
) -> Result<PathBuf> {
    let export = service.export_file(&document.id, &target.mime_type).await?;

    let metadata = service
        .get_file(&document.id)
        .await
        .map_err(|e| ExportError::from_lookup(e, &document.id))?;
    *document = DocumentRef::from(metadata);

    if !export.is_ok() {
        return Err(ExportError::ExportStatus {
            status: export.status,
        });
    }

    let path = output_dir.join(target.file_name(&file_stem(&document.display_name)));
    let io_error = |source| ExportError::FileIo {
        path: path.clone(),
        source,
    };

    // Last writer wins when two documents share a display name
    let mut file = tokio::fs::File::create(&path).await.map_err(io_error)?;
    let mut body = export.body;
    let bytes = tokio::io::copy(&mut body, &mut file)
        .await
        .map_err(io_error)?;
    file.flush().await.map_err(io_error)?;

    info!(
        file = %strip_path(&path.to_string_lossy()),
        bytes,
        "Export saved"
    );
    Ok(path)
}

/// Display names may contain path separators; keep the file inside the output directory
fn file_stem(display_name: &str) -> String {
    display_name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DocumentKind;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::{ExportResponse, RemoteDocument};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves canned export bodies keyed by MIME type
    struct CannedService {
        name: String,
        exports: HashMap<String, (u16, &'static str)>,
    }

    impl CannedService {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                exports: HashMap::new(),
            }
        }

        fn export(mut self, mime_type: &str, status: u16, body: &'static str) -> Self {
            self.exports.insert(mime_type.to_string(), (status, body));
            self
        }
    }

    #[async_trait]
    impl DocumentService for CannedService {
        async fn list_files(&self) -> BridgeResult<Vec<RemoteDocument>> {
            Ok(vec![])
        }

        async fn get_file(&self, file_id: &str) -> BridgeResult<RemoteDocument> {
            Ok(RemoteDocument {
                id: file_id.to_string(),
                name: self.name.clone(),
                mime_type: "application/vnd.google-apps.document".to_string(),
            })
        }

        async fn export_file(&self, _file_id: &str, mime_type: &str) -> BridgeResult<ExportResponse> {
            match self.exports.get(mime_type) {
                Some((status, body)) => Ok(ExportResponse {
                    status: *status,
                    body: Box::new(std::io::Cursor::new(body.as_bytes())),
                }),
                None => Err(BridgeError::OperationFailed("connection reset".to_string())),
            }
        }
    }

    /// Panics on export to exercise worker isolation
    struct PanickingService;

    #[async_trait]
    impl DocumentService for PanickingService {
        async fn list_files(&self) -> BridgeResult<Vec<RemoteDocument>> {
            Ok(vec![])
        }

        async fn get_file(&self, _file_id: &str) -> BridgeResult<RemoteDocument> {
            Err(BridgeError::NotFound("unused".to_string()))
        }

        async fn export_file(&self, _file_id: &str, mime_type: &str) -> BridgeResult<ExportResponse> {
            panic!("exporter crashed for {}", mime_type)
        }
    }

    #[tokio::test]
    async fn test_all_targets_succeed() {
        let dir = TempDir::new().unwrap();
        let service = CannedService::new("Quarterly Report")
            .export(&ExportTarget::docx().mime_type, 200, "PK docx")
            .export(&ExportTarget::pdf().mime_type, 200, "%PDF");

        let pipeline = ExportPipeline::new(Arc::new(service), dir.path());
        let jobs = pipeline.run("abc123", &ExportTarget::defaults()).await;

        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs[0].outcome,
            JobOutcome::Success(dir.path().join("Quarterly Report.docx"))
        );
        assert_eq!(
            jobs[1].outcome,
            JobOutcome::Success(dir.path().join("Quarterly Report.pdf"))
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Quarterly Report.pdf")).unwrap(),
            "%PDF"
        );
        assert_eq!(RunSummary::of(&jobs), RunSummary { succeeded: 2, failed: 0 });
    }

    #[tokio::test]
    async fn test_jobs_carry_resolved_document() {
        let dir = TempDir::new().unwrap();
        let service = CannedService::new("Quarterly Report")
            .export(&ExportTarget::pdf().mime_type, 500, "backend error");

        let pipeline = ExportPipeline::new(Arc::new(service), dir.path());
        let jobs = pipeline.run("abc123", &[ExportTarget::pdf()]).await;

        // Metadata is fetched before the status check, so a failed export is still named
        assert!(!jobs[0].outcome.is_success());
        assert_eq!(
            jobs[0].document,
            DocumentRef {
                id: "abc123".to_string(),
                display_name: "Quarterly Report".to_string(),
                kind: DocumentKind::NativeDocument,
            }
        );
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let service = CannedService::new("Quarterly Report")
            .export(&ExportTarget::docx().mime_type, 500, "backend error")
            .export(&ExportTarget::pdf().mime_type, 200, "%PDF");

        let pipeline = ExportPipeline::new(Arc::new(service), dir.path());
        let jobs = pipeline.run("abc123", &ExportTarget::defaults()).await;

        match &jobs[0].outcome {
            JobOutcome::Failed(reason) => assert!(reason.contains("500")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(jobs[1].outcome.is_success());
        assert!(!dir.path().join("Quarterly Report.docx").exists());
    }

    #[tokio::test]
    async fn test_network_error_is_recorded() {
        let dir = TempDir::new().unwrap();
        let service = CannedService::new("Notes").export(&ExportTarget::pdf().mime_type, 200, "%PDF");

        let pipeline = ExportPipeline::new(Arc::new(service), dir.path());
        let jobs = pipeline.run("abc123", &ExportTarget::defaults()).await;

        assert!(matches!(&jobs[0].outcome, JobOutcome::Failed(r) if r.contains("connection reset")));
        assert!(jobs[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_panicking_worker_still_yields_outcome() {
        let dir = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(Arc::new(PanickingService), dir.path());
        let jobs = pipeline.run("abc123", &ExportTarget::defaults()).await;

        assert_eq!(jobs.len(), 2);
        for job in &jobs {
            assert!(matches!(&job.outcome, JobOutcome::Failed(r) if r.contains("aborted")));
            assert_eq!(job.document, DocumentRef::unresolved("abc123"));
        }
    }

    #[tokio::test]
    async fn test_unknown_mime_type_uses_sentinel_extension() {
        let dir = TempDir::new().unwrap();
        let service = CannedService::new("Notes").export("text/markdown", 200, "# Notes");

        let pipeline = ExportPipeline::new(Arc::new(service), dir.path());
        let jobs = pipeline
            .run("abc123", &[ExportTarget::from_mime("text/markdown")])
            .await;

        assert_eq!(
            jobs[0].outcome,
            JobOutcome::Success(dir.path().join("Notes.unknown"))
        );
    }

    #[tokio::test]
    async fn test_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("exports").join("nested");
        let service = CannedService::new("Notes").export(&ExportTarget::pdf().mime_type, 200, "%PDF");

        let pipeline = ExportPipeline::new(Arc::new(service), &output);
        let jobs = pipeline.run("abc123", &[ExportTarget::pdf()]).await;

        assert!(jobs[0].outcome.is_success());
        assert!(output.join("Notes.pdf").exists());
    }

    #[tokio::test]
    async fn test_uncreatable_output_directory_fails_every_job() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let service = CannedService::new("Notes");
        let pipeline = ExportPipeline::new(Arc::new(service), blocker.join("exports"));
        let jobs = pipeline.run("abc123", &ExportTarget::defaults()).await;

        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|job| !job.outcome.is_success()));
    }

    #[tokio::test]
    async fn test_path_separators_in_display_name() {
        let dir = TempDir::new().unwrap();
        let service = CannedService::new("Q1/Q2 Plan").export(&ExportTarget::pdf().mime_type, 200, "%PDF");

        let pipeline = ExportPipeline::new(Arc::new(service), dir.path());
        let jobs = pipeline.run("abc123", &[ExportTarget::pdf()]).await;

        assert_eq!(
            jobs[0].outcome,
            JobOutcome::Success(dir.path().join("Q1_Q2 Plan.pdf"))
        );
    }

    #[test]
    fn test_job_finishes_once() {
        let mut job = ExportJob::pending("abc123", ExportTarget::pdf());
        job.finish(JobOutcome::Failed("first".to_string()));
        job.finish(JobOutcome::Success(PathBuf::from("ignored")));
        assert_eq!(job.outcome, JobOutcome::Failed("first".to_string()));
        assert_eq!(job.to_string(), "[pdf] failed: first");
    }
}
