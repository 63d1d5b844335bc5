//! The [`Db`] handle: a built schema wired to its storage backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cuneiform_kv::KVStore;
use cuneiform_sql::SQLStore;
use tracing::warn;

use crate::error::OrmError;
use crate::model::{EnumType, Model};
use crate::schema::{ModelId, Schema};
use crate::sync;

/// Handle to one database. Opening injects the SQL backend and the
/// snapshot store and synchronizes every declared model's table; after
/// that the handle is cheap to share and everything flows through it.
pub struct Db {
    pub(crate) schema: Arc<Schema>,
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) kv: Arc<dyn KVStore>,
    tx_depth: AtomicUsize,
}

impl Db {
    /// Wire a built schema to its backends and bring every table in line
    /// with its declaration.
    pub fn open(
        schema: Schema,
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
    ) -> Result<Db, OrmError> {
        let db = Db {
            schema: Arc::new(schema),
            sql,
            kv,
            tx_depth: AtomicUsize::new(0),
        };
        for index in 0..db.schema.models.len() {
            sync::sync_model(&db, ModelId(index))?;
        }
        Ok(db)
    }

    /// Model handle, by declared name.
    pub fn model(&self, name: &str) -> Result<Model, OrmError> {
        let id = self
            .schema
            .model_by_name(name)
            .ok_or_else(|| OrmError::Usage(format!("no model \"{}\"", name)))?;
        Ok(Model::bind(self.schema.clone(), id))
    }

    /// Enum type handle, by declared name.
    pub fn enum_type(&self, name: &str) -> Result<EnumType, OrmError> {
        let id = self
            .schema
            .enum_by_name(name)
            .ok_or_else(|| OrmError::Usage(format!("no enum type \"{}\"", name)))?;
        Ok(EnumType::bind(self.schema.clone(), id))
    }

    /// Run `f` atomically. The outermost call opens a transaction; nested
    /// calls become savepoints, so an inner failure rolls back to its own
    /// boundary while the outer work survives. Without this every
    /// statement commits on its own.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Db) -> Result<T, OrmError>,
    ) -> Result<T, OrmError> {
        let depth = self.tx_depth.fetch_add(1, Ordering::SeqCst);
        let begin = if depth == 0 {
            "BEGIN".to_string()
        } else {
            format!("SAVEPOINT \"sp{}\"", depth)
        };
        if let Err(e) = self.sql.exec(&begin, &[]) {
            self.tx_depth.fetch_sub(1, Ordering::SeqCst);
            return Err(e.into());
        }

        let result = f(self);
        self.tx_depth.fetch_sub(1, Ordering::SeqCst);
        match (&result, depth) {
            (Ok(_), 0) => {
                self.sql.exec("COMMIT", &[])?;
            }
            (Ok(_), depth) => {
                self.sql
                    .exec(&format!("RELEASE SAVEPOINT \"sp{}\"", depth), &[])?;
            }
            (Err(_), 0) => {
                // The caller gets the original error either way.
                if let Err(e) = self.sql.exec("ROLLBACK", &[]) {
                    warn!("rollback failed: {}", e);
                }
            }
            (Err(_), depth) => {
                let name = format!("sp{}", depth);
                if let Err(e) = self
                    .sql
                    .exec(&format!("ROLLBACK TO SAVEPOINT \"{}\"", name), &[])
                {
                    warn!("rollback to savepoint {} failed: {}", name, e);
                } else if let Err(e) = self
                    .sql
                    .exec(&format!("RELEASE SAVEPOINT \"{}\"", name), &[])
                {
                    warn!("release of savepoint {} failed: {}", name, e);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cuneiform_kv::MemStore;
    use cuneiform_sql::SqliteStore;

    use crate::field::FieldDef;
    use crate::schema::SchemaBuilder;
    use crate::value::Value;

    fn open() -> Db {
        let mut b = SchemaBuilder::new();
        b.model("Town").field(FieldDef::str("name"));
        Db::open(
            b.build().unwrap(),
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(MemStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn unknown_names_are_usage_errors() {
        let db = open();
        assert!(matches!(db.model("Nope"), Err(OrmError::Usage(_))));
        assert!(matches!(db.enum_type("Nope"), Err(OrmError::Usage(_))));
    }

    #[test]
    fn transaction_commits_on_ok() {
        let db = open();
        let town = db.model("Town").unwrap();
        db.transaction(|db| {
            let mut t = town.create(vec![("name", "Halle".into())])?;
            t.save(db)
        })
        .unwrap();
        assert_eq!(town.select().count(&db).unwrap(), 1);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let db = open();
        let town = db.model("Town").unwrap();
        let result: Result<(), OrmError> = db.transaction(|db| {
            let mut t = town.create(vec![("name", "Kassel".into())])?;
            t.save(db)?;
            Err(OrmError::Validation("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(town.select().count(&db).unwrap(), 0);
    }

    #[test]
    fn nested_failure_rolls_back_to_its_savepoint() {
        let db = open();
        let town = db.model("Town").unwrap();
        db.transaction(|db| {
            let mut outer = town.create(vec![("name", "Dresden".into())])?;
            outer.save(db)?;

            let inner: Result<(), OrmError> = db.transaction(|db| {
                let mut t = town.create(vec![("name", "Leipzig".into())])?;
                t.save(db)?;
                Err(OrmError::Validation("boom".to_string()))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        let names: Vec<Value> = town
            .select()
            .all(&db)
            .unwrap()
            .into_iter()
            .map(|t| t.get("name").unwrap())
            .collect();
        assert_eq!(names, vec![Value::Str("Dresden".into())]);
    }

    #[test]
    fn transaction_returns_the_closure_value() {
        let db = open();
        let town = db.model("Town").unwrap();
        let id = db
            .transaction(|db| {
                let mut t = town.create(vec![("name", "Weimar".into())])?;
                t.save(db)?;
                Ok(t.id())
            })
            .unwrap();
        assert_eq!(id, Some(1));
    }
}
