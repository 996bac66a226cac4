// SQLite-backed object/association store
//
// Entities are rows in `objects` (JSON payload keyed by snowflake id), relationships are
// rows in `associations`. Every store operation runs on a `SqliteConnection`, so the same
// calls work on a pooled connection and inside a transaction.

use async_trait::async_trait;
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions, SqliteRow,
};
use sqlx::{pool::PoolConnection, QueryBuilder, Row};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{
    AssociationType, Ent, EntityType, TaoAssociation, TaoEntity, TaoId, TaoObject, TaoTime,
};

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::DatabaseError(format!("Invalid database URL {}: {}", url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            // An in-memory database lives only as long as its connections
            .idle_timeout(None)
            .max_lifetime(None)
            // A write transaction dropped before commit comes back still open; close it
            // before the connection is handed out again. Fails harmlessly when none is open.
            .after_release(|conn, _meta| {
                Box::pin(async move {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Ok(true)
                })
            })
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;

        let db = Self { pool };
        db.initialize().await?;
        info!("Database ready at {}", url);
        Ok(db)
    }

    /// Single-connection in-memory database, used by tests
    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn initialize(&self) -> AppResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS objects (
                id INTEGER PRIMARY KEY,
                otype TEXT NOT NULL,
                data TEXT NOT NULL,
                time_created INTEGER NOT NULL,
                time_updated INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS associations (
                id1 INTEGER NOT NULL,
                atype TEXT NOT NULL,
                id2 INTEGER NOT NULL,
                time_created INTEGER NOT NULL,
                PRIMARY KEY (id1, atype, id2)
            )",
            "CREATE INDEX IF NOT EXISTS idx_objects_otype_time ON objects(otype, time_created DESC)",
            "CREATE INDEX IF NOT EXISTS idx_assoc_id1_atype_time ON associations(id1, atype, time_created)",
            "CREATE INDEX IF NOT EXISTS idx_assoc_id2 ON associations(id2)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username
                ON objects(json_extract(data, '$.username')) WHERE otype = 'user'",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email
                ON objects(json_extract(data, '$.email')) WHERE otype = 'user'",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to initialize schema: {}", e)))?;
        }

        Ok(())
    }

    pub async fn acquire(&self) -> AppResult<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {}", e)))
    }

    /// Begin a write transaction with `BEGIN IMMEDIATE`.
    ///
    /// The write lock is taken up front, so concurrent writers queue on the busy timeout
    /// instead of failing when their read snapshot goes stale. Dropping without `commit`
    /// rolls back.
    pub async fn begin_transaction(&self) -> AppResult<WriteTransaction> {
        let mut conn = self.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        Ok(WriteTransaction { conn })
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }
}

/// Open `BEGIN IMMEDIATE` transaction on a pooled connection
pub struct WriteTransaction {
    conn: PoolConnection<Sqlite>,
}

impl WriteTransaction {
    pub async fn commit(mut self) -> AppResult<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.conn
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

/// Upper bound on ids bound into one `IN (...)` list, well below SQLite's variable limit
const ID_CHUNK_SIZE: usize = 500;

fn object_from_row(row: &SqliteRow) -> TaoObject {
    TaoObject {
        id: row.get("id"),
        otype: row.get("otype"),
        data: row.get("data"),
        time_created: row.get("time_created"),
        time_updated: row.get("time_updated"),
    }
}

fn association_from_row(row: &SqliteRow) -> TaoAssociation {
    TaoAssociation {
        id1: row.get("id1"),
        atype: row.get("atype"),
        id2: row.get("id2"),
        time_created: row.get("time_created"),
    }
}

/// Escape LIKE wildcards so user input matches literally (used with `ESCAPE '\'`)
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Object and association operations over a single connection
#[async_trait]
pub trait TaoStore: Send {
    async fn get_object(&mut self, id: TaoId) -> AppResult<Option<TaoObject>>;

    /// Objects with the given ids, in no particular order; missing ids are skipped
    async fn get_objects(&mut self, ids: &[TaoId]) -> AppResult<Vec<TaoObject>>;

    /// All objects of a type, newest first
    async fn objects_by_type(&mut self, otype: EntityType) -> AppResult<Vec<TaoObject>>;

    async fn object_ids_by_type(&mut self, otype: EntityType) -> AppResult<Vec<TaoId>>;

    /// Exact match on a top-level JSON field
    async fn find_object_by_field(
        &mut self,
        otype: EntityType,
        field: &str,
        value: &str,
    ) -> AppResult<Option<TaoObject>>;

    /// Case-insensitive substring match over any of the given JSON fields
    async fn search_objects(
        &mut self,
        otype: EntityType,
        fields: &[&str],
        needle: &str,
    ) -> AppResult<Vec<TaoObject>>;

    async fn insert_object(
        &mut self,
        id: TaoId,
        otype: EntityType,
        data: &str,
        now: TaoTime,
    ) -> AppResult<()>;

    async fn update_object(&mut self, id: TaoId, data: &str, now: TaoTime) -> AppResult<bool>;

    /// Delete an object together with every association touching it
    async fn delete_object(&mut self, id: TaoId) -> AppResult<bool>;

    async fn assoc_exists(&mut self, id1: TaoId, atype: AssociationType, id2: TaoId)
        -> AppResult<bool>;

    /// Add an association and its inverse, if the type has one
    async fn assoc_add(
        &mut self,
        id1: TaoId,
        atype: AssociationType,
        id2: TaoId,
        time: TaoTime,
    ) -> AppResult<()>;

    /// Remove an association and its inverse; false if it did not exist
    async fn assoc_delete(&mut self, id1: TaoId, atype: AssociationType, id2: TaoId)
        -> AppResult<bool>;

    /// Outgoing associations of one type, oldest first
    async fn assoc_range(&mut self, id1: TaoId, atype: AssociationType)
        -> AppResult<Vec<TaoAssociation>>;

    /// Outgoing associations of one type for several sources, oldest first per source
    async fn assoc_range_many(
        &mut self,
        id1s: &[TaoId],
        atype: AssociationType,
    ) -> AppResult<Vec<TaoAssociation>>;

    async fn assoc_targets(&mut self, id1: TaoId, atype: AssociationType) -> AppResult<Vec<TaoId>> {
        Ok(self
            .assoc_range(id1, atype)
            .await?
            .into_iter()
            .map(|assoc| assoc.id2)
            .collect())
    }

    async fn load<T: TaoEntity>(&mut self, id: TaoId) -> AppResult<Option<Ent<T>>> {
        match self.get_object(id).await? {
            Some(obj) if obj.otype == T::ENTITY_TYPE.as_str() => Ok(Some(Ent::decode(obj)?)),
            _ => Ok(None),
        }
    }

    async fn load_many<T: TaoEntity>(&mut self, ids: &[TaoId]) -> AppResult<Vec<Ent<T>>> {
        self.get_objects(ids)
            .await?
            .into_iter()
            .filter(|obj| obj.otype == T::ENTITY_TYPE.as_str())
            .map(|obj| Ent::decode(obj).map_err(AppError::from))
            .collect()
    }

    async fn load_all<T: TaoEntity>(&mut self) -> AppResult<Vec<Ent<T>>> {
        self.objects_by_type(T::ENTITY_TYPE)
            .await?
            .into_iter()
            .map(|obj| Ent::decode(obj).map_err(AppError::from))
            .collect()
    }

    async fn create<T: TaoEntity + Clone>(
        &mut self,
        id: TaoId,
        data: &T,
        now: TaoTime,
    ) -> AppResult<Ent<T>> {
        let payload = serde_json::to_string(data)?;
        self.insert_object(id, T::ENTITY_TYPE, &payload, now).await?;
        Ok(Ent {
            id,
            created: now,
            updated: now,
            data: data.clone(),
        })
    }

    async fn save<T: TaoEntity>(&mut self, ent: &mut Ent<T>, now: TaoTime) -> AppResult<()> {
        let payload = serde_json::to_string(&ent.data)?;
        if !self.update_object(ent.id, &payload, now).await? {
            return Err(AppError::NotFound(format!("Object {} no longer exists", ent.id)));
        }
        ent.updated = now;
        Ok(())
    }
}

#[async_trait]
impl TaoStore for SqliteConnection {
    async fn get_object(&mut self, id: TaoId) -> AppResult<Option<TaoObject>> {
        let row = sqlx::query(
            "SELECT id, otype, data, time_created, time_updated FROM objects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get object {}: {}", id, e)))?;

        Ok(row.as_ref().map(object_from_row))
    }

    async fn get_objects(&mut self, ids: &[TaoId]) -> AppResult<Vec<TaoObject>> {
        let mut objects = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT id, otype, data, time_created, time_updated FROM objects WHERE id IN (",
            );
            let mut separated = qb.separated(",");
            for id in chunk {
                separated.push_bind(*id);
            }
            qb.push(")");

            let rows = qb
                .build()
                .fetch_all(&mut *self)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to get objects: {}", e)))?;
            objects.extend(rows.iter().map(object_from_row));
        }

        Ok(objects)
    }

    async fn objects_by_type(&mut self, otype: EntityType) -> AppResult<Vec<TaoObject>> {
        let rows = sqlx::query(
            "SELECT id, otype, data, time_created, time_updated FROM objects
             WHERE otype = ? ORDER BY time_created DESC, id DESC",
        )
        .bind(otype.as_str())
        .fetch_all(&mut *self)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list {} objects: {}", otype.as_str(), e)))?;

        Ok(rows.iter().map(object_from_row).collect())
    }

    async fn object_ids_by_type(&mut self, otype: EntityType) -> AppResult<Vec<TaoId>> {
        let ids = sqlx::query("SELECT id FROM objects WHERE otype = ?")
            .bind(otype.as_str())
            .fetch_all(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list {} ids: {}", otype.as_str(), e)))?
            .into_iter()
            .map(|row| row.get::<i64, _>(0))
            .collect();

        Ok(ids)
    }

    async fn find_object_by_field(
        &mut self,
        otype: EntityType,
        field: &str,
        value: &str,
    ) -> AppResult<Option<TaoObject>> {
        let row = sqlx::query(
            "SELECT id, otype, data, time_created, time_updated FROM objects
             WHERE otype = ? AND json_extract(data, ?) = ? LIMIT 1",
        )
        .bind(otype.as_str())
        .bind(format!("$.{}", field))
        .bind(value)
        .fetch_optional(&mut *self)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to find {} by {}: {}", otype.as_str(), field, e)))?;

        Ok(row.as_ref().map(object_from_row))
    }

    async fn search_objects(
        &mut self,
        otype: EntityType,
        fields: &[&str],
        needle: &str,
    ) -> AppResult<Vec<TaoObject>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, otype, data, time_created, time_updated FROM objects WHERE otype = ",
        );
        qb.push_bind(otype.as_str());
        qb.push(" AND (");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("LOWER(json_extract(data, ");
            qb.push_bind(format!("$.{}", field));
            qb.push(")) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\'");
        }
        qb.push(") ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to search {}: {}", otype.as_str(), e)))?;

        Ok(rows.iter().map(object_from_row).collect())
    }

    async fn insert_object(
        &mut self,
        id: TaoId,
        otype: EntityType,
        data: &str,
        now: TaoTime,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO objects (id, otype, data, time_created, time_updated) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(otype.as_str())
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&mut *self)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create object with ID {}: {}", id, e)))?;
        Ok(())
    }

    async fn update_object(&mut self, id: TaoId, data: &str, now: TaoTime) -> AppResult<bool> {
        let result = sqlx::query("UPDATE objects SET data = ?, time_updated = ? WHERE id = ?")
            .bind(data)
            .bind(now)
            .bind(id)
            .execute(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update object {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_object(&mut self, id: TaoId) -> AppResult<bool> {
        sqlx::query("DELETE FROM associations WHERE id1 = ? OR id2 = ?")
            .bind(id)
            .bind(id)
            .execute(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete associations of {}: {}", id, e)))?;

        let result = sqlx::query("DELETE FROM objects WHERE id = ?")
            .bind(id)
            .execute(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete object {}: {}", id, e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn assoc_exists(
        &mut self,
        id1: TaoId,
        atype: AssociationType,
        id2: TaoId,
    ) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM associations WHERE id1 = ? AND atype = ? AND id2 = ?")
            .bind(id1)
            .bind(atype.as_str())
            .bind(id2)
            .fetch_optional(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to check association: {}", e)))?;
        Ok(row.is_some())
    }

    async fn assoc_add(
        &mut self,
        id1: TaoId,
        atype: AssociationType,
        id2: TaoId,
        time: TaoTime,
    ) -> AppResult<()> {
        let mut edges = vec![(id1, atype, id2)];
        if let Some(inverse) = atype.inverse() {
            edges.push((id2, inverse, id1));
        }

        for (src, edge_type, dst) in edges {
            sqlx::query(
                "INSERT OR IGNORE INTO associations (id1, atype, id2, time_created) VALUES (?, ?, ?, ?)",
            )
            .bind(src)
            .bind(edge_type.as_str())
            .bind(dst)
            .bind(time)
            .execute(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create association: {}", e)))?;
        }
        Ok(())
    }

    async fn assoc_delete(
        &mut self,
        id1: TaoId,
        atype: AssociationType,
        id2: TaoId,
    ) -> AppResult<bool> {
        let mut edges = vec![(id1, atype, id2)];
        if let Some(inverse) = atype.inverse() {
            edges.push((id2, inverse, id1));
        }

        let mut deleted = 0;
        for (src, edge_type, dst) in edges {
            deleted += sqlx::query("DELETE FROM associations WHERE id1 = ? AND atype = ? AND id2 = ?")
                .bind(src)
                .bind(edge_type.as_str())
                .bind(dst)
                .execute(&mut *self)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to delete association: {}", e)))?
                .rows_affected();
        }
        Ok(deleted > 0)
    }

    async fn assoc_range(
        &mut self,
        id1: TaoId,
        atype: AssociationType,
    ) -> AppResult<Vec<TaoAssociation>> {
        let rows = sqlx::query(
            "SELECT id1, atype, id2, time_created FROM associations
             WHERE id1 = ? AND atype = ? ORDER BY time_created, rowid",
        )
        .bind(id1)
        .bind(atype.as_str())
        .fetch_all(&mut *self)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get associations: {}", e)))?;

        Ok(rows.iter().map(association_from_row).collect())
    }

    async fn assoc_range_many(
        &mut self,
        id1s: &[TaoId],
        atype: AssociationType,
    ) -> AppResult<Vec<TaoAssociation>> {
        let mut assocs = Vec::new();
        for chunk in id1s.chunks(ID_CHUNK_SIZE) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT id1, atype, id2, time_created FROM associations WHERE atype = ",
            );
            qb.push_bind(atype.as_str());
            qb.push(" AND id1 IN (");
            let mut separated = qb.separated(",");
            for id in chunk {
                separated.push_bind(*id);
            }
            qb.push(") ORDER BY time_created, rowid");

            let rows = qb
                .build()
                .fetch_all(&mut *self)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to get associations: {}", e)))?;
            assocs.extend(rows.iter().map(association_from_row));
        }

        Ok(assocs)
    }
}
