//! Admin aggregation over the waitlist.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use zynvo_core::{EntryStatus, WaitlistEntry};

use super::repository::WaitlistRepository;

const CSV_HEADER: [&str; 4] = ["Email", "Date", "Status", "Source"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the admin page shows, loaded in one go.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    /// Newest first.
    pub entries: Vec<WaitlistEntry>,
    /// Public count, including locally queued signups.
    pub total_count: u64,
    pub today_count: usize,
    pub pending_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl AdminDashboard {
    /// Fetch entries and count concurrently.
    #[instrument(skip(repository))]
    pub async fn load(repository: &WaitlistRepository) -> Self {
        let (entries, total_count) = tokio::join!(
            repository.get_all_waitlist_entries(),
            repository.get_waitlist_count()
        );
        tracing::debug!(entries = entries.len(), total_count, "Loaded admin dashboard");
        Self::from_parts(entries, total_count, Utc::now())
    }

    #[must_use]
    pub fn from_parts(entries: Vec<WaitlistEntry>, total_count: u64, now: DateTime<Utc>) -> Self {
        Self {
            today_count: today_count(&entries, now),
            pending_count: pending_count(&entries),
            entries,
            total_count,
            generated_at: now,
        }
    }

    /// Entries as CSV: `Email,Date,Status,Source`, one row per entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be written.
    pub fn to_csv(&self) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;

        for entry in &self.entries {
            let date = entry
                .timestamp
                .map_or_else(|| "N/A".to_string(), short_date);
            writer.write_record([
                entry.email.as_str(),
                date.as_str(),
                entry.status.as_str(),
                entry.source.as_str(),
            ])?;
        }

        writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }

    /// `zynvo-waitlist-<YYYY-MM-DD>.csv`, dated when the dashboard was loaded.
    #[must_use]
    pub fn export_filename(&self) -> String {
        format!(
            "zynvo-waitlist-{}.csv",
            self.generated_at.format("%Y-%m-%d")
        )
    }
}

/// Entries created on `now`'s calendar day. Undated entries count as today.
#[must_use]
pub fn today_count(entries: &[WaitlistEntry], now: DateTime<Utc>) -> usize {
    let today = now.date_naive();
    entries
        .iter()
        .filter(|entry| entry.timestamp.is_none_or(|ts| ts.date_naive() == today))
        .count()
}

#[must_use]
pub fn pending_count(entries: &[WaitlistEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| entry.status == EntryStatus::Pending)
        .count()
}

/// `M/D/YYYY`, no padding.
fn short_date(ts: DateTime<Utc>) -> String {
    format!("{}/{}/{}", ts.month(), ts.day(), ts.year())
}
