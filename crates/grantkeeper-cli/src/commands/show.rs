use crate::OutputFormat;
use crate::commands::open_archive;
use anyhow::Result;
use grantkeeper_core::Record;
use std::path::Path;

pub fn execute(archive: Option<&Path>, id: &str, format: OutputFormat) -> Result<()> {
    let index = open_archive(archive)?;
    let record = index.get(id)?;
    let location = index
        .entry(id)
        .map(|e| e.storage_location.clone())
        .unwrap_or_default();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Table => output_table(&record),
        OutputFormat::Pretty => output_pretty(&record, &location),
    }
    Ok(())
}

fn output_pretty(record: &Record, location: &str) {
    use console::style;

    println!(
        "\n{}",
        style(record.title.as_deref().unwrap_or("(untitled)")).bold().cyan()
    );
    println!("  Id:            {}", record.id());
    println!("  Status:        {}", record.status());
    if let Some(amount) = &record.amount {
        println!("  Amount:        {}", amount);
    }
    if let (Some(min), Some(max)) = (record.amount_min, record.amount_max) {
        let currency = record.currency.as_deref().unwrap_or("");
        println!("  Range:         {} - {} {}", min, max, currency);
    }
    if let Some(opens) = record.application_opens {
        println!("  Opens:         {}", opens);
    }
    if let Some(deadline) = record.deadline {
        println!("  Deadline:      {}", deadline);
    }
    if let Some(url) = &record.url {
        println!("  URL:           {}", url);
    }
    if let Some(provider) = &record.provider {
        println!("  Provider:      {}", provider);
    }
    if let Some(category) = &record.category {
        println!("  Category:      {}", category);
    }
    if !record.tags.is_empty() {
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        println!("  Tags:          {}", tags.join(", "));
    }
    if let Some(score) = record.quality_score() {
        println!("  Quality:       {:.2}", score);
    }
    println!("  Collected:     {}", record.collection_date().to_rfc3339());
    println!("  Verified:      {}", record.last_verified().to_rfc3339());
    println!("  Stored at:     {}", location);
    if let Some(description) = &record.description {
        println!("\n{}", description);
    }
    println!();
}

fn output_table(record: &Record) {
    println!("Field,Value");
    println!("id,{}", record.id());
    println!("title,\"{}\"", record.title.as_deref().unwrap_or("").replace('"', "'"));
    println!("status,{}", record.status());
    println!("amount,\"{}\"", record.amount.as_deref().unwrap_or(""));
    println!(
        "deadline,{}",
        record.deadline.map(|d| d.to_string()).unwrap_or_default()
    );
    println!("url,{}", record.url.as_deref().unwrap_or(""));
    println!(
        "qualityScore,{}",
        record.quality_score().map(|s| format!("{:.3}", s)).unwrap_or_default()
    );
}
