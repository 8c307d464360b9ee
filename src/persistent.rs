use crate::{CrawlerError, Storage, Table};
use chrono::{DateTime, FixedOffset};
use futures::TryStreamExt;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::{path::Path, str::FromStr};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanySiteRecord {
    pub company_id: String,
    pub site: String,
    pub name: String,
    pub search_text: String,
    pub last_searched_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExportRow {
    pub id: i64,
    pub site: String,
    pub company_name: String,
    pub search_phrase: String,
    pub title: String,
    pub url: String,
    pub searched_date: Option<DateTime<FixedOffset>>,
}

pub struct NewCompany<'a> {
    pub company_id: &'a str,
    pub name: &'a str,
    pub site: &'a str,
    pub search_text: &'a str,
}

pub struct NewSearchResult<'a> {
    pub company_id: &'a str,
    pub site: &'a str,
    pub url: &'a str,
    pub title: &'a str,
    pub searched_date: DateTime<FixedOffset>,
}

pub struct CompanyTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for CompanyTable {
    type Record<'a> = NewCompany<'a>;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn columns(&self) -> &'static str {
        r#"
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            site TEXT NOT NULL,
            search_text TEXT NOT NULL,
            last_searched_date DATETIME,
            UNIQUE(id, site)
        "#
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<u64, sqlx::Error> {
        let mut tx = self.get_pool().begin().await?;
        let query = format!(
            "INSERT OR IGNORE INTO {} (id, name, site, search_text) VALUES (?, ?, ?, ?)",
            self.name
        );
        let written = sqlx::query(&query)
            .bind(record.company_id)
            .bind(record.name)
            .bind(record.site)
            .bind(record.search_text)
            .execute(&mut tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(written)
    }
}

impl CompanyTable {
    async fn get(
        &self,
        company_id: &str,
        site: &str,
    ) -> Result<Option<CompanySiteRecord>, sqlx::Error> {
        let query = format!(
            "SELECT id, name, site, search_text, last_searched_date FROM {} WHERE id = ? AND site = ?",
            self.name
        );
        let row = sqlx::query(&query)
            .bind(company_id)
            .bind(site)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<CompanySiteRecord, sqlx::Error> {
            Ok(CompanySiteRecord {
                company_id: row.try_get("id")?,
                name: row.try_get("name")?,
                site: row.try_get("site")?,
                search_text: row.try_get("search_text")?,
                last_searched_date: row.try_get("last_searched_date")?,
            })
        })
        .transpose()
    }

    async fn set_last_searched(
        &self,
        company_id: &str,
        site: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "UPDATE {} SET last_searched_date = ? WHERE id = ? AND site = ?",
            self.name
        );
        let written = sqlx::query(&query)
            .bind(timestamp)
            .bind(company_id)
            .bind(site)
            .execute(&mut tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(written)
    }
}

pub struct SearchResultTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for SearchResultTable {
    type Record<'a> = NewSearchResult<'a>;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn columns(&self) -> &'static str {
        r#"
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site TEXT NOT NULL,
            company_id TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            searched_date DATETIME
        "#
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<u64, sqlx::Error> {
        let mut tx = self.get_pool().begin().await?;
        let query = format!(
            "INSERT INTO {} (company_id, url, title, site, searched_date) VALUES (?, ?, ?, ?, ?)",
            self.name
        );
        let written = sqlx::query(&query)
            .bind(record.company_id)
            .bind(record.url.trim())
            .bind(record.title)
            .bind(record.site)
            .bind(record.searched_date)
            .execute(&mut tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(written)
    }
}

pub struct Persistent {
    pub companies: CompanyTable,
    pub results: SearchResultTable,
    pool: SqlitePool,
}

impl Persistent {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Persistent, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        Self::init(pool).await
    }

    /// A private database that lives as long as the returned store.
    pub async fn in_memory() -> Result<Persistent, CrawlerError> {
        let opt = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opt)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Persistent, CrawlerError> {
        let p = Persistent {
            companies: CompanyTable {
                name: "company".to_string(),
                pool: pool.clone(),
            },
            results: SearchResultTable {
                name: "search_results".to_string(),
                pool: pool.clone(),
            },
            pool,
        };

        p.companies.create().await?;
        p.results.create().await?;

        Ok(p)
    }
}

#[async_trait::async_trait]
impl Storage for Persistent {
    async fn lookup(
        &self,
        company_id: &str,
        site: &str,
    ) -> Result<Option<CompanySiteRecord>, CrawlerError> {
        Ok(self.companies.get(company_id, site).await?)
    }

    async fn record_search(
        &self,
        company_name: &str,
        company_id: &str,
        site: &str,
        search_phrase: &str,
    ) -> Result<(), CrawlerError> {
        let written = self
            .companies
            .insert(NewCompany {
                company_id,
                name: company_name,
                site,
                search_text: search_phrase,
            })
            .await?;

        if written == 0 {
            return Err(CrawlerError::DuplicateKey {
                company_id: company_id.to_string(),
                site: site.to_string(),
            });
        }
        debug!("Recorded {} ({}) for {}", company_name, company_id, site);
        Ok(())
    }

    async fn touch_searched(
        &self,
        company_id: &str,
        site: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<(), CrawlerError> {
        if self
            .companies
            .set_last_searched(company_id, site, timestamp)
            .await?
            == 0
        {
            return Err(CrawlerError::NotFound {
                company_id: company_id.to_string(),
                site: site.to_string(),
            });
        }
        Ok(())
    }

    async fn append_result(
        &self,
        company_id: &str,
        site: &str,
        url: &str,
        title: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<(), CrawlerError> {
        self.results
            .insert(NewSearchResult {
                company_id,
                site,
                url,
                title,
                searched_date: timestamp,
            })
            .await?;
        Ok(())
    }

    async fn export_results(&self) -> Result<Vec<ExportRow>, CrawlerError> {
        let query = format!(
            r#"
                SELECT
                    sr.id AS id,
                    sr.site AS site,
                    c.name AS company_name,
                    c.search_text AS search_phrase,
                    sr.title AS title,
                    sr.url AS url,
                    sr.searched_date AS searched_date
                FROM {} sr
                INNER JOIN {} c
                ON sr.company_id = c.id AND sr.site = c.site
                ORDER BY sr.id
            "#,
            self.results.get_name(),
            self.companies.get_name()
        );

        let mut exported = vec![];
        let mut rows = sqlx::query(&query).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            exported.push(ExportRow {
                id: row.try_get("id")?,
                site: row.try_get("site")?,
                company_name: row.try_get("company_name")?,
                search_phrase: row.try_get("search_phrase")?,
                title: row.try_get("title")?,
                url: row.try_get("url")?,
                searched_date: row.try_get("searched_date")?,
            });
        }

        Ok(exported)
    }
}
