use std::future::Future;
use std::io::Write;

use crate::app::App;
use crate::feed::{CycleEvent, CycleReport, Scheduler, SchedulerError};
use crate::storage::Feed;
use crate::util::{format_duration, parse_duration, strip_control_chars};

use super::CommandError;

/// Collect feeds every `interval` until `shutdown` resolves.
pub async fn agg<S>(
    app: &mut App,
    interval: &str,
    shutdown: S,
    out: &mut dyn Write,
) -> Result<(), CommandError>
where
    S: Future<Output = ()>,
{
    let interval = parse_duration(interval)?;
    if interval.is_zero() {
        return Err(CommandError::InvalidArgument(
            "interval must be greater than zero".to_string(),
        ));
    }

    writeln!(out, "Collecting feeds every {}", format_duration(interval))?;
    out.flush()?;

    let mut scheduler = Scheduler::new(app.db.clone(), app.fetcher.clone(), interval);
    let summary = scheduler
        .run(shutdown, |event| {
            // Output is best effort; a closed stdout must not stop collection
            let _ = match event {
                CycleEvent::Claimed(feed) => write_claim(&mut *out, feed),
                CycleEvent::Finished(Ok(report)) => write_cycle(&mut *out, report),
                CycleEvent::Finished(Err(SchedulerError::NoFeeds)) => {
                    tracing::debug!("Nothing to fetch yet");
                    Ok(())
                }
                CycleEvent::Finished(Err(SchedulerError::Fetch { source, .. })) => {
                    writeln!(out, "  fetch failed: {source}")
                }
                CycleEvent::Finished(Err(e)) => writeln!(out, "  cycle failed: {e}"),
            };
        })
        .await;

    writeln!(
        out,
        "Stopped after {} cycles ({} failed, {} new posts)",
        summary.cycles, summary.failed_cycles, summary.posts_inserted
    )?;
    Ok(())
}

fn write_claim(out: &mut dyn Write, feed: &Feed) -> std::io::Result<()> {
    writeln!(
        out,
        "fetching feed: {} ({})",
        strip_control_chars(&feed.name),
        strip_control_chars(&feed.url)
    )?;
    out.flush()
}

fn write_cycle(out: &mut dyn Write, report: &CycleReport) -> std::io::Result<()> {
    writeln!(
        out,
        "  {} new posts, {} already seen",
        report.ingest.inserted, report.ingest.duplicates
    )?;
    out.flush()
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received SIGINT, shutting down");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}
