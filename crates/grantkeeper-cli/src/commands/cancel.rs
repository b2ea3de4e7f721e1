use crate::commands::open_archive;
use anyhow::Result;
use std::path::Path;

/// Mark an archived record as cancelled
///
/// Cancellation is never inferred from dates; this is the only way in.
pub fn execute(archive: Option<&Path>, id: &str) -> Result<()> {
    let mut index = open_archive(archive)?;
    let outcome = index.cancel(id)?;

    if outcome.changes.is_empty() {
        println!("{} was already cancelled", id);
    } else {
        println!("Cancelled {}", outcome.entry.id);
    }
    Ok(())
}
