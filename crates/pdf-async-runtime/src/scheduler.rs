//! Debounced live preview.
//!
//! Callers hand every new collection snapshot to [`PreviewScheduler::notify`]
//! and poll [`PreviewScheduler::next_event`] alongside their other work. Only
//! the newest snapshot is kept; it is compiled once the debounce window passes
//! without another notification.

use crate::debounce::Debouncer;
use crate::latest::LatestOnly;
use crate::notice::{Notice, NoticeKind};
use crate::preview::{PreviewResource, PreviewSlot};
use crate::{Result, RuntimeError};
use pdf_assemble::{AssembleError, CompileInput, CompileReport, SkippedPage, compile_async};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Something the owner of a scheduler should show
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    Published {
        revision: u64,
        path: PathBuf,
        report: CompileReport,
        skipped: Vec<SkippedPage>,
    },
    /// The collection became empty; there is nothing to preview
    Cleared { revision: u64 },
    /// The pass failed and the previous preview is still published
    Failed { revision: u64, notice: Notice },
}

/// Output of one background pass
#[derive(Debug)]
struct PassOutcome {
    revision: u64,
    result: Result<(PreviewResource, CompileReport, Vec<SkippedPage>)>,
}

#[derive(Debug)]
pub struct PreviewScheduler {
    debouncer: Debouncer,
    pending: Option<CompileInput>,
    /// Newest revision seen by `notify`
    latest_revision: Option<u64>,
    pass: LatestOnly<PassOutcome>,
    slot: PreviewSlot,
    passes_started: usize,
}

impl PreviewScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(window),
            pending: None,
            latest_revision: None,
            pass: LatestOnly::new(),
            slot: PreviewSlot::new(),
            passes_started: 0,
        }
    }

    pub fn set_window(&mut self, window: Duration) {
        self.debouncer.set_window(window);
    }

    /// Record a new snapshot and restart the debounce window.
    pub fn notify(&mut self, snapshot: CompileInput) {
        log::debug!("Preview requested for revision {}", snapshot.revision);
        self.latest_revision = Some(snapshot.revision);
        self.pending = Some(snapshot);
        self.debouncer.schedule();
    }

    /// Compile `snapshot` right away, skipping the debounce window.
    pub fn refresh(&mut self, snapshot: CompileInput) {
        self.latest_revision = Some(snapshot.revision);
        self.pending = Some(snapshot);
        self.debouncer.cancel();
        self.start_pass();
    }

    /// Drop the pending snapshot and abort any running pass.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.debouncer.cancel();
        self.pass.cancel();
    }

    /// True when nothing is scheduled or compiling
    pub fn is_idle(&self) -> bool {
        !self.debouncer.is_pending() && !self.pass.is_running()
    }

    pub fn slot(&self) -> &PreviewSlot {
        &self.slot
    }

    /// Number of compile passes started
    pub fn passes_started(&self) -> usize {
        self.passes_started
    }

    /// Save the published preview to `path`.
    pub async fn download(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.slot.download(path).await
    }

    /// Drive the scheduler until it has something to report.
    ///
    /// Never resolves while idle. Cancel safe, so it can sit in a
    /// `tokio::select!` next to a command channel.
    pub async fn next_event(&mut self) -> PreviewEvent {
        loop {
            let waiting = self.debouncer.is_pending();
            let running = self.pass.is_running();
            if !waiting && !running {
                std::future::pending::<()>().await;
            }

            tokio::select! {
                ready = self.debouncer.wait_ready(), if waiting => {
                    if ready {
                        self.start_pass();
                    }
                }
                outcome = self.pass.wait(), if running => {
                    if let Some(event) = outcome.and_then(|outcome| self.accept(outcome)) {
                        return event;
                    }
                }
            }
        }
    }

    fn start_pass(&mut self) {
        let Some(snapshot) = self.pending.take() else {
            return;
        };
        self.passes_started += 1;
        log::debug!("Compiling preview for revision {}", snapshot.revision);
        self.pass.spawn(build_preview(snapshot));
    }

    fn accept(&mut self, outcome: PassOutcome) -> Option<PreviewEvent> {
        let PassOutcome { revision, result } = outcome;
        if self.latest_revision.is_some_and(|latest| revision < latest) {
            log::debug!("Discarding stale preview for revision {}", revision);
            return None;
        }

        match result {
            Ok((resource, report, skipped)) => {
                let path = resource.path().to_path_buf();
                self.slot.publish(resource);
                Some(PreviewEvent::Published {
                    revision,
                    path,
                    report,
                    skipped,
                })
            }
            Err(RuntimeError::Assemble(AssembleError::NoPages)) => {
                self.slot.clear();
                Some(PreviewEvent::Cleared { revision })
            }
            Err(e) => {
                let notice = match &e {
                    RuntimeError::Assemble(inner) => Notice::compile_failed(inner),
                    other => Notice::error(
                        NoticeKind::CompileFailure,
                        format!("Preview could not be updated: {}", other),
                    ),
                };
                notice.log();
                Some(PreviewEvent::Failed { revision, notice })
            }
        }
    }
}

async fn build_preview(snapshot: CompileInput) -> PassOutcome {
    let revision = snapshot.revision;
    PassOutcome {
        revision,
        result: compile_preview(snapshot).await,
    }
}

async fn compile_preview(
    snapshot: CompileInput,
) -> Result<(PreviewResource, CompileReport, Vec<SkippedPage>)> {
    let revision = snapshot.revision;
    let compiled = compile_async(snapshot).await?;
    let resource = PreviewResource::create_async(revision, compiled.bytes).await?;
    Ok((resource, compiled.report, compiled.skipped))
}
