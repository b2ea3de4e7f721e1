use crate::commands::open_archive;
use anyhow::Result;
use std::path::Path;

pub fn execute(archive: Option<&Path>, id: &str) -> Result<()> {
    let mut index = open_archive(archive)?;
    let entry = index.remove(id)?;
    println!(
        "Removed {} ({})",
        entry.id,
        entry.title.as_deref().unwrap_or("untitled")
    );
    Ok(())
}
