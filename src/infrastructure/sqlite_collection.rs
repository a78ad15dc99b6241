//! SQLite-backed document collection
//!
//! Documents of every collection share the `queue_documents` table and are
//! stored as JSON text. Filters, sorts and `$set` paths compile to JSON1
//! expressions (`json_extract`, `json_type`, `json_set`), and indexes are
//! expression indexes over the same `json_extract` calls so the planner can
//! use them.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row, SqlitePool};
use tracing::debug;

use super::database_connection::DatabaseConnection;
use crate::domain::{
    Condition, Document, DocumentCollection, Filter, FindOptions, IndexKind, IndexModel, STORAGE_ID_FIELD, SortOrder,
    StoreError, StoreResult, UpdateOutcome,
};

/// A named collection inside a migrated [`DatabaseConnection`].
#[derive(Debug, Clone)]
pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
    namespace: String,
}

impl SqliteCollection {
    pub fn new(connection: &DatabaseConnection, name: impl Into<String>) -> Self {
        let name = name.into();
        let namespace = format!("sqlite#{}/{}", connection.id(), name);
        Self {
            pool: connection.pool().clone(),
            name,
            namespace,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn index_prefix(&self) -> String {
        let sanitized: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{sanitized}__")
    }

    fn row_to_document(row: &SqliteRow) -> StoreResult<Document> {
        let id: i64 = row.try_get("_id")?;
        let body: String = row.try_get("document")?;
        let mut document: Document = serde_json::from_str(&body)?;
        document.insert(STORAGE_ID_FIELD.to_string(), Value::from(id));
        Ok(document)
    }

    fn push_filter(&self, builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) -> StoreResult<()> {
        builder.push(" WHERE collection = ").push_bind(self.name.clone());
        for (path, condition) in filter.clauses() {
            builder.push(" AND ");
            push_condition(builder, path, condition)?;
        }
        Ok(())
    }
}

/// `$."a"."b"` for `a.b`, as an SQL string literal.
fn json_path_literal(path: &str) -> StoreResult<String> {
    let mut json_path = String::from("$");
    for segment in path.split('.') {
        if segment.is_empty() || segment.contains('"') {
            return Err(StoreError::unsupported_filter(format!("field path `{path}`")));
        }
        json_path.push_str(".\"");
        json_path.push_str(segment);
        json_path.push('"');
    }
    Ok(format!("'{}'", json_path.replace('\'', "''")))
}

fn field_expr(path: &str) -> StoreResult<String> {
    if path == STORAGE_ID_FIELD {
        return Ok(STORAGE_ID_FIELD.to_string());
    }
    Ok(format!("json_extract(document, {})", json_path_literal(path)?))
}

/// JSON type of the value at `path`; SQL NULL when the path is missing.
fn type_expr(path: &str) -> StoreResult<String> {
    Ok(format!("json_type(document, {})", json_path_literal(path)?))
}

/// Type-strict equality: `true` never equals `1` and a string never equals
/// the JSON text of an object.
fn push_equals(builder: &mut QueryBuilder<'_, Sqlite>, path: &str, value: &Value) -> StoreResult<()> {
    if path == STORAGE_ID_FIELD {
        match value.as_i64() {
            Some(id) => builder.push("_id = ").push_bind(id),
            None => builder.push("0"),
        };
        return Ok(());
    }

    let expr = field_expr(path)?;
    let json_type = type_expr(path)?;
    match value {
        Value::Null => {
            builder.push(format!("{expr} IS NULL"));
        }
        Value::Bool(flag) => {
            builder.push(format!("{json_type} = '{flag}'"));
        }
        Value::Number(number) => {
            builder.push(format!("({json_type} IN ('integer', 'real') AND {expr} = "));
            match number.as_i64() {
                Some(integer) => builder.push_bind(integer),
                None => builder.push_bind(number.as_f64().unwrap_or(f64::NAN)),
            };
            builder.push(")");
        }
        Value::String(text) => {
            builder
                .push(format!("({json_type} = 'text' AND {expr} = "))
                .push_bind(text.clone())
                .push(")");
        }
        composite => {
            let kind = if composite.is_array() { "array" } else { "object" };
            builder
                .push(format!("({json_type} = '{kind}' AND {expr} = json("))
                .push_bind(serde_json::to_string(composite)?)
                .push("))");
        }
    }
    Ok(())
}

fn push_condition(builder: &mut QueryBuilder<'_, Sqlite>, path: &str, condition: &Condition) -> StoreResult<()> {
    let expr = field_expr(path)?;
    match condition {
        Condition::Eq(value) => push_equals(builder, path, value)?,
        Condition::Ne(Value::Null) => {
            builder.push(format!("{expr} IS NOT NULL"));
        }
        Condition::Ne(value) => {
            builder.push(format!("({expr} IS NULL OR NOT ("));
            push_equals(builder, path, value)?;
            builder.push("))");
        }
        Condition::Exists(should_exist) => {
            let presence = if path == STORAGE_ID_FIELD {
                "1".to_string()
            } else {
                format!("{} IS NOT NULL", type_expr(path)?)
            };
            if *should_exist {
                builder.push(presence);
            } else {
                builder.push(format!("NOT ({presence})"));
            }
        }
        Condition::In(values) if values.is_empty() => {
            builder.push("0");
        }
        Condition::In(values) => {
            builder.push("(");
            for (position, value) in values.iter().enumerate() {
                if position > 0 {
                    builder.push(" OR ");
                }
                push_equals(builder, path, value)?;
            }
            builder.push(")");
        }
    }
    Ok(())
}

/// Intermediate paths of every `$set` target, e.g. `a` and `a.b` for `a.b.c`.
fn parent_paths(set: &[(String, Value)]) -> Vec<String> {
    let mut parents = Vec::new();
    for (path, _) in set {
        let segments: Vec<&str> = path.split('.').collect();
        for depth in 1..segments.len() {
            let parent = segments[..depth].join(".");
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }
    parents
}

/// Every parent of a `$set` target must be missing or an object.
fn push_parents_writable(builder: &mut QueryBuilder<'_, Sqlite>, parents: &[String]) -> StoreResult<()> {
    for parent in parents {
        let json_type = type_expr(parent)?;
        builder.push(format!(" AND ({json_type} IS NULL OR {json_type} = 'object')"));
    }
    Ok(())
}

fn push_sort(builder: &mut QueryBuilder<'_, Sqlite>, sort: &[(String, SortOrder)]) -> StoreResult<()> {
    builder.push(" ORDER BY ");
    for (path, order) in sort {
        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        builder.push(format!("{} {direction}, ", field_expr(path)?));
    }
    builder.push("_id ASC");
    Ok(())
}

enum PathWrite<'a> {
    /// Create an empty object at the path unless something is already there.
    Parent(String),
    Set(&'a str, &'a Value),
}

/// Nested `json_insert`/`json_set` calls applying `set` to `document`.
fn push_set_expression(builder: &mut QueryBuilder<'_, Sqlite>, set: &[(String, Value)]) -> StoreResult<()> {
    let mut writes = Vec::new();
    for (path, value) in set {
        let segments: Vec<&str> = path.split('.').collect();
        for depth in 1..segments.len() {
            writes.push(PathWrite::Parent(segments[..depth].join(".")));
        }
        writes.push(PathWrite::Set(path, value));
    }

    for write in writes.iter().rev() {
        builder.push(match write {
            PathWrite::Parent(_) => "json_insert(",
            PathWrite::Set(..) => "json_set(",
        });
    }
    builder.push("document");
    for write in &writes {
        match write {
            PathWrite::Parent(path) => {
                builder.push(format!(", {}, json('{{}}'))", json_path_literal(path)?));
            }
            PathWrite::Set(path, value) => {
                builder
                    .push(format!(", {}, json(", json_path_literal(path)?))
                    .push_bind(serde_json::to_string(value)?)
                    .push("))");
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentCollection for SqliteCollection {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn insert_one(&self, mut document: Document) -> StoreResult<Document> {
        let explicit_id = match document.remove(STORAGE_ID_FIELD) {
            None => None,
            Some(Value::Number(number)) if number.is_i64() => number.as_i64(),
            Some(other) => {
                return Err(StoreError::invalid_document(format!("`_id` must be an integer, got {other}")));
            }
        };
        let body = serde_json::to_string(&document)?;

        let row = sqlx::query("INSERT INTO queue_documents (_id, collection, document) VALUES (?, ?, ?) RETURNING _id")
            .bind(explicit_id)
            .bind(&self.name)
            .bind(body)
            .fetch_one(&self.pool)
            .await?;

        let id: i64 = row.try_get("_id")?;
        document.insert(STORAGE_ID_FIELD.to_string(), Value::from(id));
        Ok(document)
    }

    async fn find_one(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>> {
        let mut builder = QueryBuilder::new("SELECT _id, document FROM queue_documents");
        self.push_filter(&mut builder, filter)?;
        push_sort(&mut builder, &options.sort)?;
        builder.push(" LIMIT 1");

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
        let mut builder = QueryBuilder::new("SELECT _id, document FROM queue_documents");
        self.push_filter(&mut builder, filter)?;
        push_sort(&mut builder, &[])?;

        let mut rows = builder.build().fetch(&self.pool);
        let mut documents = Vec::new();
        while let Some(row) = rows.try_next().await? {
            documents.push(Self::row_to_document(&row)?);
        }
        Ok(documents)
    }

    async fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM queue_documents");
        self.push_filter(&mut builder, filter)?;

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_one_and_update(&self, filter: &Filter, set: &[(String, Value)]) -> StoreResult<UpdateOutcome> {
        if set.iter().any(|(path, _)| path == STORAGE_ID_FIELD) {
            return Err(StoreError::invalid_document("`_id` is immutable"));
        }
        let parents = parent_paths(set);

        let mut builder = QueryBuilder::new("UPDATE queue_documents SET document = ");
        push_set_expression(&mut builder, set)?;
        builder.push(" WHERE _id = (SELECT _id FROM queue_documents");
        self.push_filter(&mut builder, filter)?;
        builder.push(" ORDER BY _id LIMIT 1)");
        push_parents_writable(&mut builder, &parents)?;
        builder.push(" RETURNING _id, document");

        if let Some(row) = builder.build().fetch_optional(&self.pool).await? {
            return Ok(UpdateOutcome {
                matched: 1,
                document: Some(Self::row_to_document(&row)?),
            });
        }

        // Nothing written: either no match, or a parent on the match is not an object.
        if !parents.is_empty() && self.find_one(filter, &FindOptions::default()).await?.is_some() {
            return Err(StoreError::invalid_document(format!(
                "cannot create fields {:?} inside a non-object value",
                set.iter().map(|(path, _)| path.as_str()).collect::<Vec<_>>()
            )));
        }
        Ok(UpdateOutcome::default())
    }

    async fn create_indexes(&self, indexes: &[IndexModel]) -> StoreResult<Vec<String>> {
        let prefix = self.index_prefix();
        let mut names = Vec::with_capacity(indexes.len());
        for model in indexes {
            let columns = model
                .keys
                .iter()
                .map(|(path, kind)| {
                    let expr = field_expr(path)?;
                    Ok(match kind {
                        IndexKind::Descending => format!("{expr} DESC"),
                        IndexKind::Ascending | IndexKind::Hashed => expr,
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;

            let name = model.name().replace('-', "n");
            let sql = format!(
                "CREATE INDEX IF NOT EXISTS \"{prefix}{name}\" ON queue_documents (collection, {})",
                columns.join(", ")
            );
            debug!("{}", sql);
            sqlx::query(&sql).execute(&self.pool).await?;
            names.push(name);
        }
        Ok(names)
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        let prefix = self.index_prefix();
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'queue_documents' \
             AND substr(name, 1, length(?)) = ? ORDER BY name",
        )
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    async fn average(&self, filter: &Filter, path: &str) -> StoreResult<Option<f64>> {
        let mut builder = QueryBuilder::new(format!("SELECT AVG({}) FROM queue_documents", field_expr(path)?));
        self.push_filter(&mut builder, filter)?;

        let average: Option<f64> = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(average)
    }
}
