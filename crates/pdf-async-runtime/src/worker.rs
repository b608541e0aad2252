use crate::latest::LatestOnly;
use crate::notice::{Notice, NoticeKind};
use crate::scheduler::{PreviewEvent, PreviewScheduler};
use crate::session::{AssemblySession, PageSource, UploadReport};
use crate::{PdfCommand, PdfUpdate};
use pdf_assemble::{PageRasterizer, compile_async, io};
use std::sync::Arc;
use tokio::sync::mpsc;

struct WorkerState {
    session: AssemblySession,
    scheduler: PreviewScheduler,
    renders: LatestOnly<PdfUpdate>,
}

/// Async worker task that processes assembly commands and sends updates.
///
/// Runs until the command channel closes; the published preview is released
/// on the way out.
pub async fn worker_task(
    session: AssemblySession,
    mut command_rx: mpsc::UnboundedReceiver<PdfCommand>,
    update_tx: mpsc::UnboundedSender<PdfUpdate>,
) {
    let window = session.options().debounce();
    let mut state = WorkerState {
        session,
        scheduler: PreviewScheduler::new(window),
        renders: LatestOnly::new(),
    };

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else { break };
                process_command(cmd, &mut state, &mut command_rx, &update_tx).await;
            }
            event = state.scheduler.next_event() => {
                handle_preview_event(event, &update_tx);
            }
            rendered = state.renders.wait(), if state.renders.is_running() => {
                if let Some(update) = rendered {
                    let _ = update_tx.send(update);
                }
            }
        }
    }

    log::debug!("Command channel closed, stopping worker");
}

async fn process_command(
    cmd: PdfCommand,
    state: &mut WorkerState,
    command_rx: &mut mpsc::UnboundedReceiver<PdfCommand>,
    update_tx: &mpsc::UnboundedSender<PdfUpdate>,
) {
    match cmd {
        PdfCommand::Upload { uploads } => {
            let report = state
                .session
                .upload(uploads, |current, total| {
                    send_progress(update_tx, current, total)
                })
                .await;
            finish_upload(report, state, update_tx).await;
        }
        PdfCommand::UploadFiles { paths } => {
            let report = state
                .session
                .upload_files(&paths, |current, total| {
                    send_progress(update_tx, current, total)
                })
                .await;
            finish_upload(report, state, update_tx).await;
        }
        PdfCommand::Edit { op } => match state.session.apply(&op) {
            Ok(()) => collection_changed(state, update_tx).await,
            Err(e) => {
                let _ = update_tx.send(PdfUpdate::Error {
                    message: format!("Could not apply {:?}: {}", op, e),
                });
            }
        },
        PdfCommand::RenderPage {
            mut page,
            mut scale,
        } => {
            // Deduplicate render commands - keep the most recent one
            while let Ok(next_cmd) = command_rx.try_recv() {
                if let PdfCommand::RenderPage {
                    page: new_page,
                    scale: new_scale,
                } = next_cmd
                {
                    log::debug!("Discarding queued page render, using newer request");
                    page = new_page;
                    scale = new_scale;
                } else {
                    // Non-render command found, process it before rendering
                    Box::pin(process_command(next_cmd, state, command_rx, update_tx)).await;
                }
            }

            match state.session.page_source(page) {
                Ok(source) => {
                    state
                        .renders
                        .spawn(render_page(state.session.rasterizer(), source, scale));
                }
                Err(e) => {
                    let _ = update_tx.send(PdfUpdate::Error {
                        message: format!("Cannot render {}: {}", page, e),
                    });
                }
            }
        }
        PdfCommand::RefreshPreview => {
            // Drain any queued refreshes, one pass covers them all
            while let Ok(next_cmd) = command_rx.try_recv() {
                if let PdfCommand::RefreshPreview = next_cmd {
                    log::debug!("Discarding queued preview refresh");
                } else {
                    Box::pin(process_command(next_cmd, state, command_rx, update_tx)).await;
                }
            }
            state.scheduler.refresh(state.session.snapshot());
        }
        PdfCommand::Download { dir } => {
            let path = dir.join(&state.session.options().output_file_name);
            match state.scheduler.download(&path).await {
                Ok(path) => {
                    let _ = update_tx.send(PdfUpdate::Downloaded { path });
                }
                Err(e) => {
                    let _ = update_tx.send(PdfUpdate::Error {
                        message: format!("Download failed: {}", e),
                    });
                }
            }
        }
        PdfCommand::ExportAnnotated { annotations, path } => {
            let snapshot = state.session.snapshot();
            let result = async {
                let compiled = compile_async(snapshot).await?;
                let page_count = compiled.report.page_count;
                let flattened = io::flatten_async(compiled.bytes, annotations).await?;
                io::save_pdf(&flattened, &path).await?;
                Ok::<_, pdf_assemble::AssembleError>(page_count)
            }
            .await;

            let update = match result {
                Ok(page_count) => PdfUpdate::Exported { path, page_count },
                Err(e) => PdfUpdate::Error {
                    message: format!("Export failed: {}", e),
                },
            };
            let _ = update_tx.send(update);
        }
        #[cfg(feature = "serde")]
        PdfCommand::LoadConfig { path } => {
            let loaded = pdf_assemble::AssemblyOptions::load(&path)
                .await
                .map_err(crate::RuntimeError::from)
                .and_then(|options| {
                    state.session.set_options(options.clone())?;
                    Ok(options)
                });
            match loaded {
                Ok(options) => {
                    state.scheduler.set_window(options.debounce());
                    let _ = update_tx.send(PdfUpdate::ConfigLoaded { options });
                }
                Err(e) => {
                    let _ = update_tx.send(PdfUpdate::Error {
                        message: format!("Failed to load config: {}", e),
                    });
                }
            }
        }
    }
}

fn send_progress(update_tx: &mpsc::UnboundedSender<PdfUpdate>, current: usize, total: usize) {
    let _ = update_tx.send(PdfUpdate::Progress {
        operation: "Adding files".to_string(),
        current,
        total,
    });
}

async fn finish_upload(
    report: UploadReport,
    state: &mut WorkerState,
    update_tx: &mpsc::UnboundedSender<PdfUpdate>,
) {
    let skipped = report.skipped();
    for notice in report.notices {
        let _ = update_tx.send(PdfUpdate::Notice(notice));
    }
    let changed = !report.added.is_empty();
    let _ = update_tx.send(PdfUpdate::UploadComplete {
        added: report.added,
        skipped,
    });
    if changed {
        collection_changed(state, update_tx).await;
    }
}

/// Publish the new order, schedule a preview and redraw stale thumbnails.
async fn collection_changed(state: &mut WorkerState, update_tx: &mpsc::UnboundedSender<PdfUpdate>) {
    let collection = state.session.collection();
    let _ = update_tx.send(PdfUpdate::OrderChanged {
        revision: collection.revision(),
        order: collection.assembly_order().to_vec(),
    });
    state.scheduler.notify(state.session.snapshot());

    let (updated, notices) = state.session.refresh_thumbnails().await;
    for (page, thumbnail) in updated {
        let _ = update_tx.send(PdfUpdate::ThumbnailReady { page, thumbnail });
    }
    for notice in notices {
        let _ = update_tx.send(PdfUpdate::Notice(notice));
    }
}

fn handle_preview_event(event: PreviewEvent, update_tx: &mpsc::UnboundedSender<PdfUpdate>) {
    match event {
        PreviewEvent::Published {
            revision,
            path,
            report,
            skipped,
        } => {
            for page in skipped {
                let _ = update_tx.send(PdfUpdate::Notice(Notice::warning(
                    NoticeKind::CompileFailure,
                    format!("{} left out of the preview: {}", page.page_id, page.reason),
                )));
            }
            let _ = update_tx.send(PdfUpdate::PreviewReady {
                revision,
                path,
                page_count: report.page_count,
            });
        }
        PreviewEvent::Cleared { .. } => {
            let _ = update_tx.send(PdfUpdate::PreviewCleared);
        }
        PreviewEvent::Failed { notice, .. } => {
            let _ = update_tx.send(PdfUpdate::Notice(notice));
        }
    }
}

async fn render_page(rasterizer: Arc<dyn PageRasterizer>, source: PageSource, scale: f32) -> PdfUpdate {
    let page = source.page;
    let rendered = tokio::task::spawn_blocking(move || {
        rasterizer.render_page(&source.pdf, source.source_page, scale, source.rotation)
    })
    .await;

    match rendered {
        Ok(Ok(image)) => PdfUpdate::PageRendered {
            page,
            width: image.width(),
            height: image.height(),
            rgba_data: image.into_raw(),
        },
        Ok(Err(e)) => render_failed(page, &e),
        Err(e) => render_failed(page, &e),
    }
}

fn render_failed(page: pdf_assemble::PageId, error: &dyn std::fmt::Display) -> PdfUpdate {
    let notice = Notice::warning(
        NoticeKind::PageRenderFailure,
        format!("{} could not be rendered: {}", page, error),
    );
    notice.log();
    PdfUpdate::Notice(notice)
}
