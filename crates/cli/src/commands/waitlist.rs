//! Waitlist commands.

use std::io::Write;

use zynvo_core::WaitlistEntry;
use zynvo_site::services::waitlist::{SyncReport, SyncStatus};
use zynvo_site::state::AppState;

use super::CommandError;

/// Print the public waitlist count.
pub async fn count(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    let count = state.repository().get_waitlist_count().await;
    writeln!(out, "{count}")?;
    Ok(())
}

/// Sign up one email. A rejected signup becomes an error so the exit code reflects it.
pub async fn signup(
    state: &AppState,
    email: &str,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let result = state.repository().add_to_waitlist(email).await;
    if !result.success {
        return Err(CommandError::SignupFailed(result.message));
    }

    writeln!(out, "{}", result.message)?;
    tracing::info!(outcome = ?result.outcome, "Signup recorded");
    Ok(())
}

/// Push the offline queue and print a summary.
pub async fn sync(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    let report = state.repository().sync_offline_emails().await;
    writeln!(out, "{}", describe_sync(&report))?;
    Ok(())
}

/// List every stored entry, newest first.
pub async fn entries(state: &AppState, json: bool, out: &mut impl Write) -> Result<(), CommandError> {
    let entries = state.repository().get_all_waitlist_entries().await;

    if json {
        serde_json::to_writer_pretty(&mut *out, &entries)?;
        writeln!(out)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(out, "No entries.")?;
        return Ok(());
    }

    for entry in &entries {
        writeln!(out, "{}", entry_line(entry))?;
    }
    writeln!(out, "{} entries", entries.len())?;
    Ok(())
}

/// Print connectivity, local queue and flag state.
pub fn status(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    let repository = state.repository();

    writeln!(
        out,
        "online:           {}",
        state.connectivity().is_online()
    )?;
    writeln!(
        out,
        "permission error: {}",
        repository.has_permission_error()
    )?;
    writeln!(out, "queued:           {}", repository.queue_len())?;
    writeln!(
        out,
        "cached count:     {}",
        repository
            .cached_count()
            .map_or_else(|| "none".to_string(), |count| count.to_string())
    )?;
    writeln!(
        out,
        "last sync:        {}",
        repository
            .last_sync()
            .map_or_else(|| "never".to_string(), |at| at.to_rfc3339())
    )?;
    Ok(())
}

/// Clear a sticky permission-error flag.
pub fn reset_permission(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    let repository = state.repository();
    if !repository.has_permission_error() {
        writeln!(out, "No permission error recorded.")?;
        return Ok(());
    }

    repository.reset_permission_error();
    tracing::info!("Permission error flag cleared");
    writeln!(out, "Permission error cleared.")?;
    Ok(())
}

fn describe_sync(report: &SyncReport) -> String {
    match report.status {
        SyncStatus::NothingToSync => "Nothing to sync.".to_string(),
        SyncStatus::SkippedOffline => {
            format!("Offline, {} entries still queued.", report.remaining)
        }
        SyncStatus::SkippedPermissionError => format!(
            "Skipped: permission error recorded, {} entries still queued.",
            report.remaining
        ),
        SyncStatus::AlreadyRunning => "A sync is already running.".to_string(),
        SyncStatus::Completed | SyncStatus::Incomplete | SyncStatus::AbortedPermissionDenied => {
            let mut line = format!(
                "Synced {}, already present {}, failed {}, remaining {}.",
                report.synced, report.already_present, report.failed, report.remaining
            );
            if report.status == SyncStatus::AbortedPermissionDenied {
                line.push_str(" Aborted: permission denied.");
            }
            line
        }
    }
}

fn entry_line(entry: &WaitlistEntry) -> String {
    let date = entry
        .timestamp
        .map_or_else(|| "N/A".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
    format!(
        "{:<40} {:<16} {:<9} {}",
        entry.email.as_str(),
        date,
        entry.status,
        entry.source
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::test_support::{output, state};
    use zynvo_site::services::waitlist::{Failure, Operation};

    #[tokio::test]
    async fn test_count_prints_estimate_floor() {
        let (_, state) = state();
        let mut out = Vec::new();
        count(&state, &mut out).await.unwrap();
        let printed: u64 = output(out).trim().parse().unwrap();
        assert!(printed >= 12_847);
    }

    #[tokio::test]
    async fn test_signup_stores_entry() {
        let (remote, state) = state();
        let mut out = Vec::new();
        signup(&state, "Fan@Example.com", &mut out).await.unwrap();

        assert_eq!(output(out).trim(), "Successfully added to waitlist!");
        assert_eq!(remote.entries()[0].email.as_str(), "fan@example.com");
    }

    #[tokio::test]
    async fn test_signup_invalid_email_fails() {
        let (remote, state) = state();
        let mut out = Vec::new();
        let err = signup(&state, "nope", &mut out).await.unwrap_err();

        assert!(matches!(err, CommandError::SignupFailed(_)));
        assert!(out.is_empty());
        assert!(remote.entries().is_empty());
    }

    #[tokio::test]
    async fn test_offline_signup_then_sync() {
        let (remote, state) = state();
        state.connectivity().set_online(false);

        let mut out = Vec::new();
        signup(&state, "queued@example.com", &mut out).await.unwrap();
        assert_eq!(state.repository().queue_len(), 1);

        let mut out = Vec::new();
        sync(&state, &mut out).await.unwrap();
        assert_eq!(output(out).trim(), "Offline, 1 entries still queued.");

        state.connectivity().set_online(true);
        let mut out = Vec::new();
        sync(&state, &mut out).await.unwrap();
        assert_eq!(
            output(out).trim(),
            "Synced 1, already present 0, failed 0, remaining 0."
        );
        assert_eq!(remote.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_entries_table_and_json() {
        let (_, state) = state();
        state
            .repository()
            .add_to_waitlist("first@example.com")
            .await;

        let mut out = Vec::new();
        entries(&state, false, &mut out).await.unwrap();
        let text = output(out);
        assert!(text.contains("first@example.com"));
        assert!(text.trim_end().ends_with("1 entries"));

        let mut out = Vec::new();
        entries(&state, true, &mut out).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["email"], "first@example.com");
    }

    #[tokio::test]
    async fn test_entries_empty() {
        let (_, state) = state();
        let mut out = Vec::new();
        entries(&state, false, &mut out).await.unwrap();
        assert_eq!(output(out).trim(), "No entries.");
    }

    #[tokio::test]
    async fn test_status_and_reset_permission() {
        let (remote, state) = state();
        remote.fail(Operation::AddEntry, Failure::PermissionDenied);
        state.repository().add_to_waitlist("denied@example.com").await;
        assert!(state.repository().has_permission_error());

        let mut out = Vec::new();
        status(&state, &mut out).unwrap();
        let text = output(out);
        assert!(text.contains("permission error: true"));
        assert!(text.contains("queued:           1"));
        assert!(text.contains("last sync:        never"));

        let mut out = Vec::new();
        reset_permission(&state, &mut out).unwrap();
        assert_eq!(output(out).trim(), "Permission error cleared.");
        assert!(!state.repository().has_permission_error());

        let mut out = Vec::new();
        reset_permission(&state, &mut out).unwrap();
        assert_eq!(output(out).trim(), "No permission error recorded.");
    }

    #[test]
    fn test_describe_sync_abort() {
        let report = SyncReport {
            status: SyncStatus::AbortedPermissionDenied,
            synced: 1,
            already_present: 0,
            failed: 0,
            remaining: 2,
        };
        assert_eq!(
            describe_sync(&report),
            "Synced 1, already present 0, failed 0, remaining 2. Aborted: permission denied."
        );
    }
}
