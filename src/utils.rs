use chrono::{DateTime, FixedOffset, Local};
use sqlx::SqlitePool;

pub(crate) async fn is_table_exists(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?
            .is_some(),
    )
}

pub fn get_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

/// Number of calendar-day boundaries between `earlier` and `now`, both taken
/// in the offset of `now`. Negative when `earlier` lies in the future.
pub fn calendar_days_between(now: DateTime<FixedOffset>, earlier: DateTime<FixedOffset>) -> i64 {
    let earlier = earlier.with_timezone(now.offset());
    (now.date_naive() - earlier.date_naive()).num_days()
}

pub(crate) fn normalize_text(text: &str) -> String {
    lazy_regex::regex!(r"\s+")
        .replace_all(text.trim(), " ")
        .into_owned()
}
