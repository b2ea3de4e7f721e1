use crate::OutputFormat;
use crate::commands::open_archive;
use anyhow::Result;
use grantkeeper_core::ArchiveStats;
use std::path::Path;

pub fn archive_stats(archive: Option<&Path>) -> Result<ArchiveStats> {
    let index = open_archive(archive)?;
    Ok(index.stats().clone())
}

pub fn execute(archive: Option<&Path>, format: OutputFormat) -> Result<()> {
    let stats = archive_stats(archive)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Table => {
            println!("Metric,Count");
            println!("total,{}", stats.total);
            println!("active,{}", stats.active);
            println!("upcoming,{}", stats.upcoming);
            println!("expired,{}", stats.expired);
            println!("cancelled,{}", stats.cancelled);
            for (category, count) in &stats.by_category {
                println!("category:{},{}", category, count);
            }
        }
        OutputFormat::Pretty => output_pretty(&stats),
    }
    Ok(())
}

fn output_pretty(stats: &ArchiveStats) {
    use console::style;

    println!("\n{}", style("Archive Statistics").bold().cyan());
    println!("{}", style("==================").cyan());
    println!("  Total:      {}", stats.total);
    println!("  Active:     {}", stats.active);
    println!("  Upcoming:   {}", stats.upcoming);
    println!("  Expired:    {}", stats.expired);
    println!("  Cancelled:  {}", stats.cancelled);

    if !stats.by_category.is_empty() {
        println!("\n{}", style("By category:").bold());
        for (category, count) in &stats.by_category {
            println!("  {:<20} {}", category, count);
        }
    }
    println!();
}
