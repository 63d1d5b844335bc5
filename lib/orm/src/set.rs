//! Lazy, restartable query results.

use std::sync::Arc;

use cuneiform_sql as sql;
use tracing::debug;

use crate::db::Db;
use crate::error::OrmError;
use crate::expr::{compile, CompiledWhere, Expr};
use crate::record::{self, Record};
use crate::schema::{ModelId, Schema};
use crate::value::Value;

/// A frozen ORDER BY token, built by [`crate::Field::asc`] and
/// [`crate::Field::desc`].
#[derive(Debug, Clone)]
pub struct OrderTerm(pub(crate) String);

/// A description of a set of records: model, optional predicate, limit and
/// ordering. Nothing touches the database until iteration, count, update or
/// delete; every execution re-runs the query against current data.
#[derive(Debug, Clone)]
pub struct RecordSet {
    schema: Arc<Schema>,
    model: ModelId,
    filter: Option<Expr>,
    limit: Option<u32>,
    order: Vec<OrderTerm>,
}

impl RecordSet {
    pub(crate) fn new(schema: Arc<Schema>, model: ModelId) -> RecordSet {
        RecordSet {
            schema,
            model,
            filter: None,
            limit: None,
            order: Vec::new(),
        }
    }

    /// Narrow the set: the result's predicate is the AND of the current one
    /// and `expr`. The receiver is unchanged and stays usable.
    pub fn filter(&self, expr: Expr) -> RecordSet {
        let filter = match &self.filter {
            Some(current) => Some(current.clone().and(expr)),
            None => Some(expr),
        };
        RecordSet {
            schema: self.schema.clone(),
            model: self.model,
            filter,
            limit: self.limit,
            order: self.order.clone(),
        }
    }

    /// Cap the number of rows yielded by iteration.
    pub fn limit(mut self, n: u32) -> RecordSet {
        self.limit = Some(n);
        self
    }

    /// Append an ordering term; earlier terms take precedence.
    pub fn order_by(mut self, term: OrderTerm) -> RecordSet {
        self.order.push(term);
        self
    }

    fn table(&self) -> &str {
        &self.schema.descriptor(self.model).table
    }

    fn compiled(&self) -> Result<Option<CompiledWhere>, OrmError> {
        match &self.filter {
            Some(expr) => Ok(Some(compile(expr, &self.schema)?)),
            None => Ok(None),
        }
    }

    /// The id-projecting SELECT for this set, with its parameters.
    fn id_query(&self) -> Result<(String, Vec<sql::Value>), OrmError> {
        let table = self.table();
        let mut stmt = format!("SELECT \"{}\".\"id\" AS \"id\" FROM \"{}\"", table, table);
        let mut params = Vec::new();
        if let Some(compiled) = self.compiled()? {
            let joins = compiled.join_clause();
            if !joins.is_empty() {
                stmt.push(' ');
                stmt.push_str(&joins);
            }
            stmt.push_str(" WHERE ");
            stmt.push_str(&compiled.fragment);
            params = compiled.params;
        }
        if !self.order.is_empty() {
            let terms: Vec<&str> = self.order.iter().map(|t| t.0.as_str()).collect();
            stmt.push_str(" ORDER BY ");
            stmt.push_str(&terms.join(", "));
        }
        if let Some(n) = self.limit {
            stmt.push_str(&format!(" LIMIT {}", n));
        }
        Ok((stmt, params))
    }

    /// Execute the set and iterate its records. Ids are fetched up front;
    /// each record is then hydrated by its own point-load as the iterator
    /// advances.
    pub fn iter<'a>(&self, db: &'a Db) -> Result<RecordIter<'a>, OrmError> {
        let (stmt, params) = self.id_query()?;
        debug!("select {}: {}", self.table(), stmt);
        let rows = db.sql.query(&stmt, &params)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(row.get_i64("id").ok_or_else(|| {
                OrmError::Internal("id query returned a row without an id".to_string())
            })?);
        }
        Ok(RecordIter {
            db,
            model: self.model,
            ids: ids.into_iter(),
        })
    }

    /// Eagerly collect the whole set.
    pub fn all(&self, db: &Db) -> Result<Vec<Record>, OrmError> {
        self.iter(db)?.collect()
    }

    /// Count without hydrating. Runs COUNT(*) with the same joins and
    /// predicate, so it agrees with what iteration would yield at the same
    /// moment; a limit caps the count like it caps iteration.
    pub fn count(&self, db: &Db) -> Result<u64, OrmError> {
        let (stmt, params) = if self.limit.is_some() {
            let (inner, params) = self.id_query()?;
            (format!("SELECT COUNT(*) AS \"n\" FROM ({})", inner), params)
        } else {
            let table = self.table();
            let mut stmt = format!("SELECT COUNT(*) AS \"n\" FROM \"{}\"", table);
            let mut params = Vec::new();
            if let Some(compiled) = self.compiled()? {
                let joins = compiled.join_clause();
                if !joins.is_empty() {
                    stmt.push(' ');
                    stmt.push_str(&joins);
                }
                stmt.push_str(" WHERE ");
                stmt.push_str(&compiled.fragment);
                params = compiled.params;
            }
            (stmt, params)
        };
        let rows = db.sql.query(&stmt, &params)?;
        rows.first()
            .and_then(|row| row.get_i64("n"))
            .map(|n| n as u64)
            .ok_or_else(|| OrmError::Internal("count query returned no rows".to_string()))
    }

    /// Set-level UPDATE: one statement against the compiled predicate, no
    /// records materialized. Returns the affected row count.
    pub fn update(&self, db: &Db, assignments: Vec<(&str, Value)>) -> Result<u64, OrmError> {
        let desc = self.schema.descriptor(self.model);
        let mut set_clauses = Vec::new();
        let mut params = Vec::new();
        for (name, value) in &assignments {
            if *name == "id" {
                return Err(OrmError::Usage(
                    "can't assign \"id\" in a bulk update".to_string(),
                ));
            }
            let spec = desc.field(name).ok_or_else(|| {
                OrmError::Usage(format!("no field \"{}\" on \"{}\"", name, desc.name))
            })?;
            if spec.is_virtual {
                return Err(OrmError::Usage(format!(
                    "\"{}\" is a reverse relation; it can't be assigned",
                    name
                )));
            }
            spec.check_value(value)?;
            if let Value::Record(r) = value {
                if r.id().is_none() {
                    return Err(OrmError::Validation(format!(
                        "record for \"{}\" is unsaved; save it first",
                        name
                    )));
                }
            }
            set_clauses.push(format!("\"{}\" = ?", spec.name));
            params.push(value.to_param());
        }
        if set_clauses.is_empty() {
            return Ok(0);
        }

        let table = &desc.table;
        let mut stmt = format!("UPDATE \"{}\" SET {}", table, set_clauses.join(", "));
        self.push_restriction(&mut stmt, &mut params, table)?;
        debug!("bulk update {}: {}", table, stmt);
        Ok(db.sql.exec(&stmt, &params)?)
    }

    /// Set-level DELETE. Returns the affected row count.
    pub fn delete(&self, db: &Db) -> Result<u64, OrmError> {
        let table = self.table().to_string();
        let mut stmt = format!("DELETE FROM \"{}\"", table);
        let mut params = Vec::new();
        self.push_restriction(&mut stmt, &mut params, &table)?;
        debug!("bulk delete {}: {}", table, stmt);
        Ok(db.sql.exec(&stmt, &params)?)
    }

    /// WHERE clause for UPDATE/DELETE. Neither statement takes JOIN
    /// clauses, so a predicate with joins restricts by id subquery instead.
    fn push_restriction(
        &self,
        stmt: &mut String,
        params: &mut Vec<sql::Value>,
        table: &str,
    ) -> Result<(), OrmError> {
        match self.compiled()? {
            Some(compiled) if !compiled.joins.is_empty() => {
                stmt.push_str(&format!(
                    " WHERE \"{}\".\"id\" IN (SELECT \"{}\".\"id\" FROM \"{}\" {} WHERE {})",
                    table,
                    table,
                    table,
                    compiled.join_clause(),
                    compiled.fragment
                ));
                params.extend(compiled.params);
            }
            Some(compiled) => {
                stmt.push_str(" WHERE ");
                stmt.push_str(&compiled.fragment);
                params.extend(compiled.params);
            }
            None => {}
        }
        Ok(())
    }
}

/// Iterator over a set's records. Each step point-loads one id; a row
/// deleted between the id query and its load surfaces as `NotFound`.
pub struct RecordIter<'a> {
    db: &'a Db,
    model: ModelId,
    ids: std::vec::IntoIter<i64>,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<Record, OrmError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(match record::load(self.db, self.model, id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(OrmError::NotFound(format!(
                "{} {} not found",
                self.db.schema.descriptor(self.model).table,
                id
            ))),
            Err(e) => Err(e),
        })
    }
}
