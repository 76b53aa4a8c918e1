//! Live event streaming handler.
//!
//! Follows the live ring rather than the latest-event channel so bursts
//! that arrive between two wakeups are still printed in full.

use std::sync::Arc;

use tokio::sync::mpsc;
use vigil_api::{ConnectionEvent, ConnectionEventKind};
use vigil_core::{CoreError, Dashboard, DashboardConfig, EventRecord};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: DashboardConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let dashboard = Dashboard::new(config)?;
    let color = output::should_color(&global.color);

    // The single automatic reconnect failing ends the watch.
    let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
    let errors = dashboard
        .connection()
        .on_connection_event(ConnectionEventKind::Error, move |event| {
            if let ConnectionEvent::Error(e) = event {
                let _ = fail_tx.send(e.clone());
            }
        });
    let drops = dashboard
        .connection()
        .on_connection_event(ConnectionEventKind::Disconnect, |event| {
            if let ConnectionEvent::Disconnected {
                reason: Some(reason),
            } = event
            {
                tracing::warn!(%reason, "broker connection lost, retrying once");
            }
        });

    let mut live = dashboard.store().subscribe_live();
    if args.history {
        dashboard.start().await?;
        for record in dashboard.store().history().iter().rev() {
            let line = output::render_event(&global.output, record, color)?;
            output::print_output(&line, global.quiet);
        }
    } else {
        dashboard.connect().await?;
    }
    if !global.quiet {
        eprintln!(
            "Watching {} (Ctrl-C to stop)",
            dashboard.connection().endpoint()
        );
    }

    let mut last_id: Option<String> = None;
    let mut seen = 0usize;
    let mut pending = unseen(live.current(), last_id.as_deref());
    let result = loop {
        for record in pending.drain(..) {
            if args.count.is_some_and(|n| seen >= n) {
                break;
            }
            match output::render_event(&global.output, &record, color) {
                Ok(line) => output::print_output(&line, global.quiet),
                Err(e) => tracing::warn!(error = %e, "event could not be rendered"),
            }
            last_id = Some(record.id.clone());
            seen += 1;
        }
        if args.count.is_some_and(|n| seen >= n) {
            break Ok(());
        }

        tokio::select! {
            snapshot = live.changed() => match snapshot {
                Some(snapshot) => pending = unseen(&snapshot, last_id.as_deref()),
                None => break Ok(()),
            },
            Some(err) = fail_rx.recv() => break Err(CliError::from(CoreError::from(err))),
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    errors.unsubscribe();
    drops.unsubscribe();
    dashboard.shutdown().await;
    result
}

/// Records newer than `last_id`, oldest first.
///
/// The live snapshot is newest first; everything ahead of the last printed
/// record is new. When `last_id` has been evicted from the ring the whole
/// snapshot counts as new.
fn unseen(snapshot: &[Arc<EventRecord>], last_id: Option<&str>) -> Vec<Arc<EventRecord>> {
    let mut fresh: Vec<_> = snapshot
        .iter()
        .take_while(|r| Some(r.id.as_str()) != last_id)
        .cloned()
        .collect();
    fresh.reverse();
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Origin, Timestamp};

    fn rec(id: &str) -> Arc<EventRecord> {
        Arc::new(EventRecord {
            id: id.into(),
            origin: Origin::Device,
            message: String::new(),
            timestamp: Timestamp::Millis(0),
            device_id: None,
            device_name: None,
            door_open: None,
            is_live: true,
        })
    }

    fn ids(records: &[Arc<EventRecord>]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn first_snapshot_is_printed_oldest_first() {
        let snap = vec![rec("c"), rec("b"), rec("a")];
        assert_eq!(ids(&unseen(&snap, None)), vec!["a", "b", "c"]);
    }

    #[test]
    fn only_records_ahead_of_last_printed_are_new() {
        let snap = vec![rec("e"), rec("d"), rec("c"), rec("b")];
        assert_eq!(ids(&unseen(&snap, Some("c"))), vec!["d", "e"]);
        assert!(unseen(&snap, Some("e")).is_empty());
    }
}
