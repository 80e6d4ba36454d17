// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

use crate::error::SyncError;
use crate::types::{CollectionType, LocalCollection};

#[derive(Debug, Clone)]
pub struct Collections {
    pool: SqlitePool,
}

impl Collections {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        account: &str,
        kind: &str,
    ) -> Result<Vec<CollectionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account, kind, url, display_name, color, ctag
FROM collections
WHERE account = ? AND kind = ?
ORDER BY id;
";

        sqlx::query_as(SQL)
            .bind(account)
            .bind(kind)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_every(&self) -> Result<Vec<CollectionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account, kind, url, display_name, color, ctag
FROM collections
ORDER BY account, kind, url;
";

        sqlx::query_as(SQL).fetch_all(&self.pool).await
    }

    pub async fn insert(
        &self,
        account: &str,
        kind: &str,
        url: &str,
        display_name: &str,
        color: Option<i64>,
    ) -> Result<CollectionRecord, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO collections (account, kind, url, display_name, color, ctag)
VALUES (?, ?, ?, ?, ?, NULL)
RETURNING id, account, kind, url, display_name, color, ctag;
";

        sqlx::query_as(SQL)
            .bind(account)
            .bind(kind)
            .bind(url)
            .bind(display_name)
            .bind(color)
            .fetch_one(&self.pool)
            .await
    }

    /// Updates the metadata, leaving the color alone if `color` is `None`.
    pub async fn update(
        &self,
        id: i64,
        display_name: &str,
        color: Option<Option<i64>>,
    ) -> Result<bool, sqlx::Error> {
        const SQL: &str = "UPDATE collections SET display_name = ? WHERE id = ?;";
        const SQL_WITH_COLOR: &str =
            "UPDATE collections SET display_name = ?, color = ? WHERE id = ?;";

        let result = match color {
            Some(color) => {
                sqlx::query(SQL_WITH_COLOR)
                    .bind(display_name)
                    .bind(color)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(SQL)
                    .bind(display_name)
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        const SQL: &str = "DELETE FROM collections WHERE id = ?;";

        let result = sqlx::query(SQL).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// The stored tag, `None` if the collection doesn't exist.
    pub async fn ctag(&self, id: i64) -> Result<Option<Option<String>>, sqlx::Error> {
        const SQL: &str = "SELECT ctag FROM collections WHERE id = ?;";

        let row: Option<(Option<String>,)> = sqlx::query_as(SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(ctag,)| ctag))
    }

    pub async fn set_ctag(&self, id: i64, ctag: Option<&str>) -> Result<bool, sqlx::Error> {
        const SQL: &str = "UPDATE collections SET ctag = ? WHERE id = ?;";

        let result = sqlx::query(SQL)
            .bind(ctag)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRecord {
    id: i64,
    account: String,
    kind: String,
    url: String,
    display_name: String,
    color: Option<i64>,
    ctag: Option<String>,
}

impl TryFrom<CollectionRecord> for LocalCollection {
    type Error = SyncError;

    fn try_from(record: CollectionRecord) -> Result<Self, Self::Error> {
        let kind: CollectionType = record.kind.parse().map_err(|e| {
            SyncError::StorageUnavailable(format!("Corrupt collection {}: {e}", record.id))
        })?;

        Ok(LocalCollection {
            id: record.id,
            account: record.account,
            kind,
            url: record.url,
            display_name: record.display_name,
            color: record.color.and_then(|c| u32::try_from(c).ok()),
            ctag: record.ctag,
        })
    }
}
