//! PostgreSQL store executing the SQL builder's queries through sqlx.

use crate::config::{EntityModel, Record};
use crate::error::DataError;
use crate::sql::{self, Entities, PgBindValue, QueryBuf};
use crate::store::{DataStore, FindQuery, Instance};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

pub struct PgStore {
    pool: PgPool,
    entities: Entities,
}

impl PgStore {
    /// `entities` must cover every entity reachable through includes and search paths.
    pub fn new(pool: PgPool, entities: Entities) -> Self {
        Self { pool, entities }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Record>, DataError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Record>, DataError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(row.as_ref().map(row_to_record))
    }
}

/// Integrity violations (class 23) are constraint failures; everything else stays a database error.
fn map_sqlx_error(e: sqlx::Error) -> DataError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().is_some_and(|c| c.starts_with("23")) {
            return DataError::Constraint(db.message().to_string());
        }
    }
    DataError::Db(e)
}

#[async_trait]
impl DataStore for PgStore {
    async fn find_one(&self, entity: &EntityModel, query: &FindQuery) -> Result<Option<Instance>, DataError> {
        let q = sql::select_find(entity, &query.criteria, &query.filter, &query.includes, Some(1), &self.entities);
        Ok(self.query_optional(&q).await?.map(Instance::persisted))
    }

    async fn find_all(&self, entity: &EntityModel, query: &FindQuery) -> Result<Vec<Instance>, DataError> {
        let q = sql::select_find(entity, &query.criteria, &query.filter, &query.includes, None, &self.entities);
        Ok(self.query_many(&q).await?.into_iter().map(Instance::persisted).collect())
    }

    async fn persist(&self, entity: &EntityModel, instance: Instance) -> Result<Instance, DataError> {
        let q = if instance.is_new_record() {
            sql::insert(entity, instance.values())
        } else {
            let id = instance
                .get(&entity.primary_key)
                .cloned()
                .ok_or_else(|| DataError::Backend(format!("{} instance has no primary key", entity.name)))?;
            sql::update(entity, &id, instance.values())
        };
        let row = self
            .query_optional(&q)
            .await?
            .ok_or_else(|| DataError::Backend(format!("{} row not returned", entity.name)))?;
        Ok(Instance::persisted(row))
    }

    async fn destroy(&self, entity: &EntityModel, instance: &Instance) -> Result<(), DataError> {
        let id = instance.get(&entity.primary_key).cloned().unwrap_or(Value::Null);
        let q = sql::delete(entity, &id);
        match self.query_optional(&q).await? {
            Some(_) => Ok(()),
            None => Err(DataError::Backend(format!("{} {} no longer exists", entity.name, id))),
        }
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
