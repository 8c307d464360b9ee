use crate::error::CrawlerError;
use serde::Deserialize;
use std::{fs::File, io::Read, path::Path};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub search_text: String,
    pub country: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompanyRow {
    #[serde(rename = "Company name")]
    name: String,
    #[serde(rename = "Search text", default)]
    search_text: Option<String>,
    #[serde(rename = "Country", default)]
    country: Option<String>,
    #[serde(rename = "Site address", default)]
    address: Option<String>,
}

/// Derived from the name exactly as written, surrounding blanks included.
pub fn company_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn trimmed(value: Option<String>) -> Option<String> {
    non_blank(value).map(|v| v.trim().to_string())
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        let search_text = non_blank(row.search_text).unwrap_or_else(|| row.name.clone());
        Company {
            id: company_id(&row.name),
            search_text,
            country: trimmed(row.country),
            address: trimmed(row.address),
            name: row.name,
        }
    }
}

/// Reads companies in input order. Rows that cannot be parsed, or that have
/// no name, are logged and left out.
pub fn read_companies<R: Read>(reader: R) -> Result<Vec<Company>, CrawlerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    rdr.headers()?;

    let mut companies = Vec::new();
    for (line, result) in rdr.deserialize::<CompanyRow>().enumerate() {
        match result {
            Ok(row) if row.name.trim().is_empty() => {
                warn!("Row {} has no company name", line + 1);
            }
            Ok(row) => companies.push(Company::from(row)),
            Err(e) => warn!("Skipping row {}: {}", line + 1, e),
        }
    }
    Ok(companies)
}

pub fn load_companies<P: AsRef<Path>>(path: P) -> Result<Vec<Company>, CrawlerError> {
    let path = path.as_ref();
    let companies = read_companies(File::open(path)?)?;
    info!("Loaded {} companies from {}", companies.len(), path.display());
    Ok(companies)
}
