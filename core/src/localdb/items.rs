// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::types::Item;

/// Editing an item locally invalidates the collection tag, so that the next
/// pass doesn't skip the collection.
const RESET_CTAG: &str = "UPDATE collections SET ctag = NULL WHERE id = ?;";

#[derive(Debug, Clone)]
pub struct Items {
    pool: SqlitePool,
}

impl Items {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self, collection_id: i64) -> Result<Vec<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence
FROM items
WHERE collection_id = ? AND deleted = 0
ORDER BY id;
";

        sqlx::query_as(SQL)
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_deleted(&self, collection_id: i64) -> Result<Vec<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence
FROM items
WHERE collection_id = ? AND deleted = 1
ORDER BY id;
";

        sqlx::query_as(SQL)
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn mark_for_push(&self, collection_id: i64) -> Result<Vec<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
UPDATE items
SET sequence = CASE WHEN sequence IS NULL THEN 0 ELSE sequence + 1 END
WHERE collection_id = ? AND dirty = 1 AND deleted = 0
RETURNING id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence;
";

        let mut records: Vec<ItemRecord> = sqlx::query_as(SQL)
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await?;
        // RETURNING doesn't guarantee any order
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    pub async fn list_without_remote_id(
        &self,
        collection_id: i64,
    ) -> Result<Vec<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence
FROM items
WHERE collection_id = ? AND remote_id IS NULL AND deleted = 0
ORDER BY id;
";

        sqlx::query_as(SQL)
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence
FROM items
WHERE id = ?;
";

        sqlx::query_as(SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_remote_id(
        &self,
        collection_id: i64,
        remote_id: &str,
    ) -> Result<Option<ItemRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence
FROM items
WHERE collection_id = ? AND remote_id = ?;
";

        sqlx::query_as(SQL)
            .bind(collection_id)
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn remote_ids(&self, collection_id: i64) -> Result<Vec<String>, sqlx::Error> {
        const SQL: &str = "\
SELECT remote_id
FROM items
WHERE collection_id = ? AND remote_id IS NOT NULL
ORDER BY id;
";

        let rows: Vec<(String,)> = sqlx::query_as(SQL)
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn upsert_remote(
        &self,
        collection_id: i64,
        remote_id: &str,
        etag: &str,
        content: &str,
    ) -> Result<ItemRecord, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO items (collection_id, remote_id, etag, content, dirty, deleted)
VALUES (?, ?, ?, ?, 0, 0)
ON CONFLICT(collection_id, remote_id) DO UPDATE SET
    etag    = excluded.etag,
    content = excluded.content,
    dirty   = 0,
    deleted = 0
RETURNING id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence;
";

        sqlx::query_as(SQL)
            .bind(collection_id)
            .bind(remote_id)
            .bind(etag)
            .bind(content)
            .fetch_one(&self.pool)
            .await
    }

    /// Sets the name of the first push of an item that has no remote id yet.
    pub async fn reserve_name(&self, id: i64, name: &str) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE items SET pending_name = ?
WHERE id = ? AND remote_id IS NULL;
";

        let result = sqlx::query(SQL)
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sets the remote id of an item that has none yet.
    pub async fn assign_remote_id(
        &self,
        id: i64,
        remote_id: &str,
        etag: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE items
SET remote_id = ?, pending_name = NULL, etag = ?, dirty = 0
WHERE id = ? AND remote_id IS NULL;
";

        let result = sqlx::query(SQL)
            .bind(remote_id)
            .bind(etag)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The stored tag, `None` if the item doesn't exist.
    pub async fn etag(&self, id: i64) -> Result<Option<Option<String>>, sqlx::Error> {
        const SQL: &str = "SELECT etag FROM items WHERE id = ?;";

        let row: Option<(Option<String>,)> = sqlx::query_as(SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(etag,)| etag))
    }

    pub async fn set_etag(&self, id: i64, etag: Option<&str>) -> Result<bool, sqlx::Error> {
        const SQL: &str = "UPDATE items SET etag = ? WHERE id = ?;";

        let result = sqlx::query(SQL)
            .bind(etag)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_dirty(&self, id: i64) -> Result<bool, sqlx::Error> {
        const SQL: &str = "UPDATE items SET dirty = 0 WHERE id = ?;";

        let result = sqlx::query(SQL).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revert(&self, id: i64) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE items SET dirty = 0, deleted = 0, etag = NULL
WHERE id = ? AND remote_id IS NOT NULL;
";

        let result = sqlx::query(SQL).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn purge(&self, id: i64) -> Result<bool, sqlx::Error> {
        const SQL: &str = "DELETE FROM items WHERE id = ?;";

        let result = sqlx::query(SQL).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create(&self, collection_id: i64, content: &str) -> Result<ItemRecord, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO items (collection_id, content, dirty, deleted)
VALUES (?, ?, 1, 0)
RETURNING id, collection_id, remote_id, pending_name, etag, content, dirty, deleted, sequence;
";

        let mut tx = self.pool.begin().await?;
        let record: ItemRecord = sqlx::query_as(SQL)
            .bind(collection_id)
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;
        reset_ctag(&mut tx, collection_id).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Changes the content of an item that is no tombstone.
    pub async fn edit(&self, id: i64, content: &str) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE items SET content = ?, dirty = 1
WHERE id = ? AND deleted = 0
RETURNING collection_id;
";

        let mut tx = self.pool.begin().await?;
        let row: Option<(i64,)> = sqlx::query_as(SQL)
            .bind(content)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((collection_id,)) = row else {
            return Ok(false);
        };
        reset_ctag(&mut tx, collection_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Removes an item that was never pushed, or turns a pushed one into a tombstone.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        const SQL_PURGE_UNPUSHED: &str = "\
DELETE FROM items WHERE id = ? AND remote_id IS NULL
RETURNING collection_id;
";
        const SQL_TOMBSTONE: &str = "\
UPDATE items SET deleted = 1 WHERE id = ?
RETURNING collection_id;
";

        let mut tx = self.pool.begin().await?;
        let mut row: Option<(i64,)> = sqlx::query_as(SQL_PURGE_UNPUSHED)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if row.is_none() {
            row = sqlx::query_as(SQL_TOMBSTONE)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        }
        let Some((collection_id,)) = row else {
            return Ok(false);
        };
        reset_ctag(&mut tx, collection_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Number of dirty items and tombstones of a collection.
    pub async fn count_pending(&self, collection_id: i64) -> Result<(i64, i64), sqlx::Error> {
        const SQL: &str = "\
SELECT
    COALESCE(SUM(CASE WHEN dirty = 1 AND deleted = 0 THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(deleted), 0)
FROM items
WHERE collection_id = ?;
";

        sqlx::query_as(SQL)
            .bind(collection_id)
            .fetch_one(&self.pool)
            .await
    }
}

async fn reset_ctag(tx: &mut Transaction<'_, Sqlite>, collection_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(RESET_CTAG)
        .bind(collection_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRecord {
    id: i64,
    collection_id: i64,
    remote_id: Option<String>,
    pending_name: Option<String>,
    etag: Option<String>,
    content: String,
    dirty: bool,
    deleted: bool,
    sequence: Option<i64>,
}

impl From<ItemRecord> for Item {
    fn from(record: ItemRecord) -> Self {
        Self {
            local_id: record.id,
            collection_id: record.collection_id,
            remote_id: record.remote_id,
            pending_name: record.pending_name,
            etag: record.etag,
            content: record.content,
            dirty: record.dirty,
            deleted: record.deleted,
            sequence: record.sequence,
        }
    }
}
