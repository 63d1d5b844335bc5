//! cuneiform: a minimal record layer over injected storage backends.
//!
//! Record types are declared once through [`SchemaBuilder`] and frozen into
//! an immutable [`Schema`]; [`Db::open`] wires that schema to a SQL store
//! and a snapshot store, bringing every table in line with its declaration
//! (missing tables are created, added and removed fields become ALTER
//! TABLE).
//!
//! Data flows through [`Record`] values with dirty tracking and cascaded
//! saves, and through [`RecordSet`] queries authored as expression trees
//! over [`Field`] handles. Predicates reach across foreign keys in both
//! directions; the traversal compiles to JOIN clauses, never to N+1 loads.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use cuneiform::{Db, FieldDef, SchemaBuilder, Value};
//! use cuneiform_kv::RedbStore;
//! use cuneiform_sql::SqliteStore;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = SchemaBuilder::new();
//!     builder.model("Town").field(FieldDef::str("name"));
//!     builder
//!         .model("Customer")
//!         .field(FieldDef::str("name").required())
//!         .field(FieldDef::record("town", "Town").default(Value::Null));
//!
//!     let db = Db::open(
//!         builder.build()?,
//!         Arc::new(SqliteStore::open(Path::new("app.db"))?),
//!         Arc::new(RedbStore::open(Path::new("app.redb"))?),
//!     )?;
//!
//!     let town = db.model("Town")?;
//!     let mut karlsruhe = town.create(vec![("name", "Karlsruhe".into())])?;
//!     karlsruhe.save(&db)?;
//!
//!     let customer = db.model("Customer")?;
//!     let mut c = customer.create(vec![
//!         ("name", "solute GmbH".into()),
//!         ("town", karlsruhe.into()),
//!     ])?;
//!     c.save(&db)?;
//!
//!     let in_karlsruhe = customer
//!         .select()
//!         .filter(customer.path(&["town", "name"])?.eq("Karlsruhe"));
//!     for record in in_karlsruhe.iter(&db)? {
//!         println!("{:?}", record?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod expr;
pub mod field;
pub mod model;
pub mod record;
pub mod schema;
pub mod set;
pub mod sync;
pub mod value;

pub use db::Db;
pub use error::OrmError;
pub use expr::{CmpOp, Expr, JoinEdge, Operand};
pub use field::{FieldDef, FieldType};
pub use model::{EnumType, Field, Model};
pub use record::Record;
pub use schema::{Schema, SchemaBuilder};
pub use set::{OrderTerm, RecordIter, RecordSet};
pub use sync::SchemaState;
pub use value::Value;
