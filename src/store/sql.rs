//! Generic SQL backend: one row per key, with value columns projected out
//! of a stored [`Value`] map and anything left over encoded as FRID text
//! in a catch-all column.
//!
//! Grounded on `frid/kvs/dbsql.py`'s `_SqlBaseStore` column-projection
//! logic. The original discovers columns by introspecting a SQLAlchemy
//! `Table`; this port takes an explicit [`SqlStoreConfig`] instead (`sqlx`
//! has no portable schema-introspection API across its `any` driver), but
//! keeps the same precedence rules for projection and read-back.

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};

use crate::codec::{dump_to_string, load_from_str, OutputMode};
use crate::error::{FridError, Result};
use crate::store::selector::Sel;
use crate::store::traits::{Key, MetaMap, PutFlags, Store, StoreLock};
use crate::value::{Mapping, Value};

/// Static column layout for a single-table key/value projection.
#[derive(Debug, Clone)]
pub struct SqlStoreConfig {
    pub table: String,
    pub key_columns: Vec<String>,
    pub value_columns: Vec<String>,
    pub text_field: Option<String>,
    pub blob_field: Option<String>,
    pub frid_field: Option<String>,
    /// Constant `column = value` conditions every row must satisfy
    /// (text-valued only, for simplicity — enough to scope a table shared
    /// by multiple logical stores).
    pub row_filter: Vec<(String, String)>,
    /// Constant values written into every inserted row.
    pub col_values: Vec<(String, String)>,
}

impl SqlStoreConfig {
    pub fn new(table: impl Into<String>, key_columns: Vec<String>) -> Self {
        SqlStoreConfig {
            table: table.into(),
            key_columns,
            value_columns: Vec::new(),
            text_field: None,
            blob_field: None,
            frid_field: None,
            row_filter: Vec::new(),
            col_values: Vec::new(),
        }
    }
}

pub struct SqlStore {
    pool: AnyPool,
    config: SqlStoreConfig,
}

impl SqlStore {
    pub async fn connect(url: &str, config: SqlStoreConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(|e| FridError::backend("sql", "connecting to database", e))?;
        Ok(SqlStore { pool, config })
    }

    fn key_conditions(&self, key: &Key) -> Result<Vec<(String, String)>> {
        let parts = key.parts();
        if parts.len() != self.config.key_columns.len() {
            return Err(FridError::type_mismatch(
                key.to_string(),
                format!("expected {} key component(s), got {}", self.config.key_columns.len(), parts.len()),
            ));
        }
        Ok(self.config.key_columns.iter().cloned().zip(parts.iter().map(|s| s.to_string())).collect())
    }

    fn where_clause(&self, conditions: &[(String, String)], start_param: usize) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        let mut n = start_param;
        for (col, _) in conditions {
            clauses.push(format!("{col} = ?{n}"));
            n += 1;
        }
        for (col, val) in &self.config.row_filter {
            clauses.push(format!("{col} = ?{n}"));
            binds.push(val.clone());
            n += 1;
        }
        let all_binds: Vec<String> = conditions.iter().map(|(_, v)| v.clone()).chain(binds).collect();
        (clauses.join(" AND "), all_binds)
    }

    fn select_columns(&self) -> Vec<String> {
        let mut cols = Vec::new();
        if let Some(c) = &self.config.text_field {
            cols.push(c.clone());
        }
        if let Some(c) = &self.config.blob_field {
            cols.push(c.clone());
        }
        if let Some(c) = &self.config.frid_field {
            cols.push(c.clone());
        }
        cols.extend(self.config.value_columns.iter().cloned());
        cols
    }

    async fn fetch_row(&self, key: &Key) -> Result<Option<Value>> {
        let conditions = self.key_conditions(key)?;
        let (where_sql, binds) = self.where_clause(&conditions, 1);
        let cols = self.select_columns();
        if cols.is_empty() {
            return Err(FridError::config("SQL store has no projectable columns configured"));
        }
        let sql = format!("SELECT {} FROM {} WHERE {}", cols.join(", "), self.config.table, where_sql);
        let mut query = sqlx::query(&sql);
        for b in &binds {
            query = query.bind(b.clone());
        }
        let row = query.fetch_optional(&self.pool).await.map_err(|e| FridError::backend("sql", "select", e))?;
        let Some(row) = row else { return Ok(None) };
        self.row_to_value(&row)
    }

    fn row_to_value(&self, row: &sqlx::any::AnyRow) -> Result<Option<Value>> {
        // text > blob > frid precedence for the single-scalar case.
        if let Some(col) = &self.config.text_field {
            if let Ok(Some(s)) = row.try_get::<Option<String>, _>(col.as_str()) {
                return Ok(Some(Value::Text(s)));
            }
        }
        if let Some(col) = &self.config.blob_field {
            if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(col.as_str()) {
                return Ok(Some(Value::Blob(b)));
            }
        }
        let mut projected = Mapping::new();
        for col in &self.config.value_columns {
            if let Ok(Some(s)) = row.try_get::<Option<String>, _>(col.as_str()) {
                projected.insert(col.clone(), Value::Text(s));
            } else if let Ok(Some(i)) = row.try_get::<Option<i64>, _>(col.as_str()) {
                projected.insert(col.clone(), Value::Int(i));
            } else if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(col.as_str()) {
                projected.insert(col.clone(), Value::Real(f));
            }
        }
        if let Some(col) = &self.config.frid_field {
            if let Ok(Some(encoded)) = row.try_get::<Option<String>, _>(col.as_str()) {
                let decoded = load_from_str(&encoded)?;
                // frid supersedes on conflict with any projected fields.
                return Ok(Some(match decoded {
                    Value::Mapping(mut m) if !projected.is_empty() => {
                        for (k, v) in projected.iter() {
                            if !m.contains_key(k) {
                                m.insert(k.to_string(), v.clone());
                            }
                        }
                        Value::Mapping(m)
                    }
                    other => other,
                }));
            }
        }
        if !projected.is_empty() {
            return Ok(Some(Value::Mapping(projected)));
        }
        Ok(None)
    }

    /// Splits `value` into `(text, blob, frid_text, value_column_assignments)`
    /// per the projection rule: text/blob columns absorb a scalar directly;
    /// a map projects matching value columns and puts the remainder (or
    /// the whole value, if no columns absorb any of it) into `frid_field`.
    fn project(&self, value: &Value) -> Result<ProjectedRow> {
        if let Value::Text(s) = value {
            if let Some(col) = &self.config.text_field {
                return Ok(ProjectedRow { text: Some((col.clone(), s.clone())), ..Default::default() });
            }
        }
        if let Value::Blob(b) = value {
            if let Some(col) = &self.config.blob_field {
                return Ok(ProjectedRow { blob: Some((col.clone(), b.clone())), ..Default::default() });
            }
        }
        if let Value::Mapping(map) = value {
            let mut projected = Vec::new();
            let mut remainder = Mapping::new();
            for (k, v) in map.iter() {
                if self.config.value_columns.iter().any(|c| c.as_str() == k) {
                    projected.push((k.to_string(), v.clone()));
                } else {
                    remainder.insert(k.to_string(), v.clone());
                }
            }
            let frid_text = if remainder.is_empty() {
                None
            } else if let Some(col) = &self.config.frid_field {
                Some((col.clone(), dump_to_string(&Value::Mapping(remainder), OutputMode::Frid)?))
            } else {
                return Err(FridError::encode(
                    "sql row",
                    "map has fields with no matching value column and no frid_field configured",
                ));
            };
            return Ok(ProjectedRow { value_columns: projected, frid: frid_text, ..Default::default() });
        }
        match &self.config.frid_field {
            Some(col) => Ok(ProjectedRow { frid: Some((col.clone(), dump_to_string(value, OutputMode::Frid)?)), ..Default::default() }),
            None => Err(FridError::encode("sql row", "no column configured can absorb this value")),
        }
    }

    async fn upsert(&self, key: &Key, value: &Value, flags: PutFlags) -> Result<bool> {
        let conditions = self.key_conditions(key)?;
        let projected = self.project(value)?;

        if flags.contains(PutFlags::KEEP_BOTH) {
            if let Some(existing) = self.fetch_row(key).await? {
                let merged = crate::store::selector::merge_keep_both(existing, value.clone());
                return self.write_row(&conditions, &self.project(&merged)?, flags).await;
            }
        }
        self.write_row(&conditions, &projected, flags).await
    }

    async fn write_row(&self, conditions: &[(String, String)], row: &ProjectedRow, flags: PutFlags) -> Result<bool> {
        let exists = {
            let (where_sql, binds) = self.where_clause(conditions, 1);
            let sql = format!("SELECT 1 FROM {} WHERE {}", self.config.table, where_sql);
            let mut q = sqlx::query(&sql);
            for b in &binds {
                q = q.bind(b.clone());
            }
            q.fetch_optional(&self.pool).await.map_err(|e| FridError::backend("sql", "existence check", e))?.is_some()
        };
        if flags.contains(PutFlags::NO_CREATE) && !exists {
            return Ok(false);
        }
        if flags.contains(PutFlags::NO_CHANGE) && exists {
            return Ok(false);
        }

        let mut set_cols = Vec::new();
        let mut set_vals: Vec<String> = Vec::new();
        if let Some((col, val)) = &row.text {
            set_cols.push(col.clone());
            set_vals.push(val.clone());
        }
        if let Some((col, _)) = &row.blob {
            set_cols.push(col.clone());
        }
        if let Some((col, val)) = &row.frid {
            set_cols.push(col.clone());
            set_vals.push(val.clone());
        }
        for (col, val) in &row.value_columns {
            set_cols.push(col.clone());
            set_vals.push(render_text(val));
        }

        if exists {
            let assignments: Vec<String> = set_cols.iter().enumerate().map(|(i, c)| format!("{c} = ?{}", i + 1)).collect();
            let (where_sql, where_binds) = self.where_clause(conditions, set_cols.len() + 1);
            let sql = format!("UPDATE {} SET {} WHERE {}", self.config.table, assignments.join(", "), where_sql);
            let mut q = sqlx::query(&sql);
            for v in &set_vals {
                q = q.bind(v.clone());
            }
            if let Some((_, blob)) = &row.blob {
                q = q.bind(blob.clone());
            }
            for b in &where_binds {
                q = q.bind(b.clone());
            }
            q.execute(&self.pool).await.map_err(|e| FridError::backend("sql", "update", e))?;
        } else {
            let mut cols: Vec<String> = conditions.iter().map(|(c, _)| c.clone()).collect();
            cols.extend(self.config.row_filter.iter().map(|(c, _)| c.clone()));
            cols.extend(self.config.col_values.iter().map(|(c, _)| c.clone()));
            cols.extend(set_cols.clone());
            let mut vals: Vec<String> = conditions.iter().map(|(_, v)| v.clone()).collect();
            vals.extend(self.config.row_filter.iter().map(|(_, v)| v.clone()));
            vals.extend(self.config.col_values.iter().map(|(_, v)| v.clone()));
            vals.extend(set_vals.clone());
            let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
            let sql = format!("INSERT INTO {} ({}) VALUES ({})", self.config.table, cols.join(", "), placeholders.join(", "));
            let mut q = sqlx::query(&sql);
            for v in &vals {
                q = q.bind(v.clone());
            }
            q.execute(&self.pool).await.map_err(|e| FridError::backend("sql", "insert", e))?;
        }
        Ok(true)
    }
}

#[derive(Default)]
struct ProjectedRow {
    text: Option<(String, String)>,
    blob: Option<(String, Vec<u8>)>,
    frid: Option<(String, String)>,
    value_columns: Vec<(String, Value)>,
}

fn render_text(v: &Value) -> String {
    match v {
        Value::Text(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Bool(b) => b.to_string(),
        other => dump_to_string(other, OutputMode::Frid).unwrap_or_default(),
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn get_meta(&self, keys: &[Key]) -> Result<MetaMap> {
        let mut out = MetaMap::new();
        for key in keys {
            if let Some(value) = self.fetch_row(key).await? {
                out.insert(key.clone(), value.type_size());
            }
        }
        Ok(out)
    }

    async fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>> {
        let value = self.fetch_row(key).await?;
        Ok(match (value, sel) {
            (Some(v), None) => Some(v),
            (Some(Value::Array(items)), Some(sel)) => crate::store::selector::get_array(&items, sel),
            (Some(Value::Mapping(m)), Some(sel)) => crate::store::selector::get_map(&m, sel),
            _ => None,
        })
    }

    async fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool> {
        self.upsert(key, &value, flags).await
    }

    async fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool> {
        let conditions = self.key_conditions(key)?;
        match sel {
            None => {
                let (where_sql, binds) = self.where_clause(&conditions, 1);
                let sql = format!("DELETE FROM {} WHERE {}", self.config.table, where_sql);
                let mut q = sqlx::query(&sql);
                for b in &binds {
                    q = q.bind(b.clone());
                }
                let result = q.execute(&self.pool).await.map_err(|e| FridError::backend("sql", "delete", e))?;
                Ok(result.rows_affected() > 0)
            }
            Some(sel) => {
                let Some(value) = self.fetch_row(key).await? else { return Ok(false) };
                let mut value = value;
                let removed = match &mut value {
                    Value::Array(items) => crate::store::selector::del_array(items, sel) > 0,
                    Value::Mapping(m) => crate::store::selector::del_map(m, sel) > 0,
                    _ => false,
                };
                if !removed {
                    return Ok(false);
                }
                self.upsert(key, &value, PutFlags::UNCHECKED).await
            }
        }
    }

    async fn get_bulk(&self, keys: &[Key], default: Value) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.fetch_row(key).await?.unwrap_or_else(|| default.clone()));
        }
        Ok(out)
    }

    async fn put_bulk(&self, pairs: &[(Key, Value)], flags: PutFlags) -> Result<usize> {
        let mut count = 0;
        for (key, value) in pairs {
            if self.upsert(key, value, flags).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn del_bulk(&self, keys: &[Key]) -> Result<usize> {
        let mut count = 0;
        for key in keys {
            if self.del(key, None).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn substore(&self, names: &[&str]) -> Result<Box<dyn Store>> {
        let mut row_filter = self.config.row_filter.clone();
        row_filter.push(("substore".to_string(), names.join("/")));
        let mut config = self.config.clone();
        config.row_filter = row_filter;
        Ok(Box::new(SqlStore { pool: self.pool.clone(), config }))
    }

    async fn get_lock(&self, name: Option<&str>) -> Result<Box<dyn StoreLock>> {
        Ok(Box::new(SqlLock { _name: name.map(str::to_string), pool: self.pool.clone() }))
    }
}

struct SqlLock {
    _name: Option<String>,
    pool: AnyPool,
}

#[async_trait]
impl StoreLock for SqlLock {
    async fn unlock(&self) {
        let _ = &self.pool;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store(table: &str) -> SqlStore {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sqlx::query(&format!(
            "CREATE TABLE {table} (k TEXT PRIMARY KEY, txt TEXT, blob_col BLOB, frid_col TEXT, age INTEGER)"
        ))
        .execute(&pool)
        .await
        .unwrap();
        let mut config = SqlStoreConfig::new(table, vec!["k".to_string()]);
        config.text_field = Some("txt".to_string());
        config.blob_field = Some("blob_col".to_string());
        config.frid_field = Some("frid_col".to_string());
        config.value_columns = vec!["age".to_string()];
        SqlStore { pool, config }
    }

    #[tokio::test]
    async fn put_then_get_text_round_trips() {
        let store = memory_store("kv_text").await;
        let key = Key::text("a");
        assert!(store.put(&key, Value::text("hello"), PutFlags::UNCHECKED).await.unwrap());
        assert_eq!(store.get(&key, None).await.unwrap(), Some(Value::text("hello")));
    }

    #[tokio::test]
    async fn put_then_get_map_projects_value_column_and_frid_remainder() {
        let store = memory_store("kv_map").await;
        let key = Key::text("person");
        let value = Value::Mapping(crate::value::mapping_from([
            ("age", Value::Int(30)),
            ("name", Value::text("Ada")),
        ]));
        store.put(&key, value, PutFlags::UNCHECKED).await.unwrap();
        let got = store.get(&key, None).await.unwrap().unwrap();
        let Value::Mapping(m) = got else { panic!("expected mapping") };
        assert_eq!(m.get("age"), Some(&Value::Int(30)));
        assert_eq!(m.get("name"), Some(&Value::text("Ada")));
    }

    #[tokio::test]
    async fn no_create_fails_on_absent_key() {
        let store = memory_store("kv_no_create").await;
        let applied = store.put(&Key::text("missing"), Value::text("x"), PutFlags::NO_CREATE).await.unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn no_change_fails_on_present_key() {
        let store = memory_store("kv_no_change").await;
        let key = Key::text("a");
        store.put(&key, Value::text("first"), PutFlags::UNCHECKED).await.unwrap();
        let applied = store.put(&key, Value::text("second"), PutFlags::NO_CHANGE).await.unwrap();
        assert!(!applied);
        assert_eq!(store.get(&key, None).await.unwrap(), Some(Value::text("first")));
    }

    #[tokio::test]
    async fn del_removes_row() {
        let store = memory_store("kv_del").await;
        let key = Key::text("a");
        store.put(&key, Value::text("x"), PutFlags::UNCHECKED).await.unwrap();
        assert!(store.del(&key, None).await.unwrap());
        assert_eq!(store.get(&key, None).await.unwrap(), None);
    }
}
