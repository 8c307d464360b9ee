use crate::browser::PageError;

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error")]
    Database(#[from] sqlx::error::Error),

    #[error("Company {company_id} is already recorded for {site}")]
    DuplicateKey { company_id: String, site: String },

    #[error("Company {company_id} is not recorded for {site}")]
    NotFound { company_id: String, site: String },

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("CSV error")]
    Csv(#[from] csv::Error),

    #[error("Invalid session snapshot")]
    Json(#[from] serde_json::Error),

    #[error("Page error: {0}")]
    Page(#[from] PageError),
}
