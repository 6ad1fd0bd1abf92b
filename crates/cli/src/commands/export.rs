//! CSV export command.

use std::io::Write;
use std::path::{Path, PathBuf};

use zynvo_site::services::waitlist::AdminDashboard;
use zynvo_site::state::AppState;

use super::CommandError;

/// Export every entry as CSV.
///
/// Writes to `path`, to the dashboard's dated filename when `path` is `None`,
/// or to `out` when `path` is `-`.
pub async fn run(
    state: &AppState,
    path: Option<PathBuf>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let dashboard = AdminDashboard::load(state.repository()).await;
    let csv = dashboard.to_csv()?;

    let path = path.unwrap_or_else(|| PathBuf::from(dashboard.export_filename()));
    if path == Path::new("-") {
        out.write_all(&csv)?;
        return Ok(());
    }

    std::fs::write(&path, &csv)?;
    tracing::info!(path = %path.display(), rows = dashboard.entries.len(), "Exported waitlist");
    writeln!(
        out,
        "Wrote {} entries to {} (total {}, today {}, pending {})",
        dashboard.entries.len(),
        path.display(),
        dashboard.total_count,
        dashboard.today_count,
        dashboard.pending_count
    )?;
    Ok(())
}
