use crate::{error::CrawlerError, persistent::ExportRow, Storage};
use chrono::NaiveDate;
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

const HEADER: [&str; 7] = [
    "id",
    "site",
    "company_name",
    "search_phrase",
    "title",
    "url",
    "searched_date",
];

pub fn output_file_name(date: NaiveDate) -> String {
    format!("search_results-{}.csv", date.format("%Y-%m-%d"))
}

pub fn write_rows<W: Write>(writer: W, rows: &[ExportRow]) -> Result<(), CrawlerError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub async fn export_results<S: Storage + ?Sized>(
    storage: &S,
    dir: &Path,
    date: NaiveDate,
) -> Result<(PathBuf, usize), CrawlerError> {
    let rows = storage.export_results().await?;
    let mut buf = Vec::new();
    write_rows(&mut buf, &rows)?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(output_file_name(date));
    tokio::fs::write(&path, buf).await?;
    info!("Exported {} results to {}", rows.len(), path.display());
    Ok((path, rows.len()))
}
