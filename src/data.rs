use crate::utils;
use sqlx::{Row, SqlitePool};

#[async_trait::async_trait]
pub trait Table {
    type Record<'a>;

    fn get_name(&self) -> &str;
    fn get_pool(&self) -> &SqlitePool;

    /// Column list and constraints placed between the parentheses of
    /// `CREATE TABLE`.
    fn columns(&self) -> &'static str;

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<u64, sqlx::Error>;

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !utils::is_table_exists(self.get_pool(), self.get_name()).await? {
            let query = format!("CREATE TABLE {} ({})", self.get_name(), self.columns());
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
            tracing::debug!("Created table {}", self.get_name());
        } else {
            tracing::debug!("Use table {}", self.get_name());
        }
        Ok(())
    }

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.get_name());
        Ok(sqlx::query(&query)
            .fetch_one(self.get_pool())
            .await?
            .try_get(0)?)
    }
}
