use std::collections::HashMap;

use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::validation::{Field, Rule, Validate};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Requested page window. Zero page or limit is never observable: both are
/// coerced to their defaults on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_LIMIT)
    }
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: if page == 0 { DEFAULT_PAGE } else { page },
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
        }
    }

    /// Reads `page` and `limit` from query parameters. Absent, non-numeric,
    /// zero or negative values fall back to the defaults.
    pub fn parse(query: &HashMap<String, String>) -> Self {
        let read = |key: &str| query.get(key).and_then(|raw| parse_positive(raw)).unwrap_or(0);
        Self::new(read("page"), read("limit"))
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total_rows: u64) -> u64 {
        total_rows.div_ceil(self.limit)
    }

    pub fn into_page<T>(self, rows: Vec<T>, total_rows: u64) -> Page<T> {
        Page {
            rows,
            total_rows,
            total_pages: self.total_pages(total_rows),
            page: self.page,
        }
    }
}

impl Validate for Pagination {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::number("page", self.page, &[Rule::Min(1)]),
            Field::number("limit", self.limit, &[Rule::Min(1), Rule::Max(MAX_LIMIT)]),
        ]
    }
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|v| *v > 0)
        .and_then(|v| u64::try_from(v).ok())
}

/// One page of rows plus totals for the whole collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total_rows: u64,
    pub total_pages: u64,
    pub page: u64,
}

impl<T> Page<T> {
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            rows: self.rows.into_iter().map(f).collect::<Result<_, _>>()?,
            total_rows: self.total_rows,
            total_pages: self.total_pages,
            page: self.page,
        })
    }
}

/// A table that can be listed page by page in reverse id order.
pub trait Paginated: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    const COLUMNS: &'static str;
}

/// Counts the whole table, then fetches the requested window ordered by id
/// descending.
pub async fn execute<T: Paginated>(db: &PgPool, pagination: Pagination) -> Result<Page<T>, sqlx::Error> {
    let total_rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", T::TABLE))
        .fetch_one(db)
        .await?;

    let rows = sqlx::query_as::<_, T>(&format!(
        "SELECT {} FROM {} ORDER BY id DESC LIMIT $1 OFFSET $2",
        T::COLUMNS,
        T::TABLE
    ))
    .bind(i64::try_from(pagination.limit()).unwrap_or(i64::MAX))
    .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
    .fetch_all(db)
    .await?;

    Ok(pagination.into_page(rows, u64::try_from(total_rows).unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_absent() {
        let p = Pagination::parse(&query(&[]));
        assert_eq!((p.page(), p.limit()), (1, 10));
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn garbage_zero_and_negative_fall_back() {
        let p = Pagination::parse(&query(&[("page", "abc"), ("limit", "-5")]));
        assert_eq!((p.page(), p.limit()), (1, 10));

        let p = Pagination::parse(&query(&[("page", "0"), ("limit", "0")]));
        assert_eq!((p.page(), p.limit()), (1, 10));
    }

    #[test]
    fn explicit_values_and_offset() {
        let p = Pagination::parse(&query(&[("page", "3"), ("limit", "10")]));
        assert_eq!((p.page(), p.limit()), (3, 10));
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn total_pages_is_ceiling() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(25), 3);
    }

    #[test]
    fn limit_above_ceiling_is_rejected() {
        let err = Pagination::new(1, 101).validate().unwrap_err();
        assert_eq!(err.errors, vec!["limit must be 100 or less"]);
        assert!(Pagination::new(7, 100).validate().is_ok());
    }

    #[test]
    fn page_maps_rows_and_keeps_totals() {
        let page = Pagination::new(2, 2).into_page(vec![1, 2], 5);
        let mapped = page.try_map(|n| Ok::<_, String>(n * 10)).unwrap();
        assert_eq!(mapped.rows, vec![10, 20]);
        assert_eq!((mapped.total_rows, mapped.total_pages, mapped.page), (5, 3, 2));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore] // Requires actual database
    async fn execute_windows_rows_newest_first(db: PgPool) {
        use crate::users::repo_types::UserRow;

        for n in 1..=25u128 {
            sqlx::query("INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, 'hash', 'regular')")
                .bind(uuid::Uuid::from_u128(n))
                .bind(format!("User {n}"))
                .bind(format!("user{n}@example.com"))
                .execute(&db)
                .await
                .unwrap();
        }

        let first = execute::<UserRow>(&db, Pagination::new(1, 10)).await.unwrap();
        assert_eq!((first.total_rows, first.total_pages), (25, 3));
        assert_eq!(first.rows.len(), 10);
        assert_eq!(first.rows[0].id, uuid::Uuid::from_u128(25));

        let third = execute::<UserRow>(&db, Pagination::new(3, 10)).await.unwrap();
        assert_eq!(third.rows.len(), 5);
        assert_eq!(third.rows[4].id, uuid::Uuid::from_u128(1));

        let past_end = execute::<UserRow>(&db, Pagination::new(4, 10)).await.unwrap();
        assert!(past_end.rows.is_empty());
        assert_eq!(past_end.total_pages, 3);
    }
}
