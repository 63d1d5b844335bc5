//! Cheap, cloneable handles over a built [`Schema`]: [`Model`] for a record
//! type, [`Field`] for predicate and ordering authoring, [`EnumType`] for
//! enum variants.

use std::sync::Arc;

use tracing::info;

use crate::db::Db;
use crate::error::OrmError;
use crate::expr::{CmpOp, Expr, FieldRef, JoinEdge, JoinNode, Operand};
use crate::field::{FieldSpec, FieldType};
use crate::record::{self, Record};
use crate::schema::{EnumId, ModelId, Schema};
use crate::set::{OrderTerm, RecordSet};
use crate::value::Value;

/// Handle to one record type.
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    id: ModelId,
}

impl Model {
    pub(crate) fn bind(schema: Arc<Schema>, id: ModelId) -> Model {
        Model { schema, id }
    }

    /// Declared name, e.g. `Customer`.
    pub fn name(&self) -> &str {
        &self.schema.descriptor(self.id).name
    }

    /// Backing table name, e.g. `customer`.
    pub fn table(&self) -> &str {
        &self.schema.descriptor(self.id).table
    }

    /// Field handle by name. Reverse relations resolve too; they are valid
    /// traversal roots even though they carry no column.
    pub fn field(&self, name: &str) -> Result<Field, OrmError> {
        let desc = self.schema.descriptor(self.id);
        let field = desc.field_index(name).ok_or_else(|| {
            OrmError::Usage(format!("no field \"{}\" on \"{}\"", name, desc.name))
        })?;
        Ok(Field {
            schema: self.schema.clone(),
            model: self.id,
            field,
            edges: Vec::new(),
        })
    }

    /// Field handle down a relation path, e.g. `&["addr", "town", "name"]`.
    pub fn path(&self, segments: &[&str]) -> Result<Field, OrmError> {
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| OrmError::Usage("empty field path".to_string()))?;
        let mut field = self.field(first)?;
        for segment in rest {
            field = field.join(segment)?;
        }
        Ok(field)
    }

    /// Fresh record from named values. Values are type-checked one by one;
    /// required fields other than `id` must be supplied.
    pub fn create(&self, values: Vec<(&str, Value)>) -> Result<Record, OrmError> {
        Record::create(self.schema.clone(), self.id, values)
    }

    /// Point-load one record by id.
    pub fn get(&self, db: &Db, id: i64) -> Result<Option<Record>, OrmError> {
        record::load(db, self.id, id)
    }

    pub fn get_or_err(&self, db: &Db, id: i64) -> Result<Record, OrmError> {
        self.get(db, id)?.ok_or_else(|| {
            OrmError::NotFound(format!("{} {} not found", self.table(), id))
        })
    }

    /// The whole table as a lazy set; narrow it with [`RecordSet::filter`].
    pub fn select(&self) -> RecordSet {
        RecordSet::new(self.schema.clone(), self.id)
    }

    /// Drop the backing table and forget its layout snapshot, so the next
    /// open recreates it from the declaration.
    pub fn drop_table(&self, db: &Db) -> Result<(), OrmError> {
        db.sql
            .exec(&format!("DROP TABLE IF EXISTS \"{}\"", self.table()), &[])?;
        db.kv.delete(&format!("schema:{}", self.table()))?;
        info!("dropped table \"{}\"", self.table());
        Ok(())
    }
}

/// Handle to one field, optionally reached through accumulated join hops.
/// Comparison methods freeze the current traversal into an [`Expr`] operand.
#[derive(Debug, Clone)]
pub struct Field {
    schema: Arc<Schema>,
    model: ModelId,
    field: usize,
    edges: Vec<JoinEdge>,
}

impl Field {
    fn spec(&self) -> &FieldSpec {
        self.schema.field(self.model, self.field)
    }

    pub fn name(&self) -> &str {
        &self.spec().name
    }

    pub(crate) fn operand(&self) -> Operand {
        let field = FieldRef {
            model: self.model,
            field: self.field,
        };
        if self.edges.is_empty() {
            Operand::Field(field)
        } else {
            Operand::Join(JoinNode {
                edges: self.edges.clone(),
                field,
            })
        }
    }

    fn compare(&self, op: CmpOp, rhs: impl Into<Operand>) -> Expr {
        Expr::Compare {
            op,
            lhs: self.operand(),
            rhs: rhs.into(),
        }
    }

    pub fn eq(&self, rhs: impl Into<Operand>) -> Expr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl Into<Operand>) -> Expr {
        self.compare(CmpOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> Expr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn gt(&self, rhs: impl Into<Operand>) -> Expr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn le(&self, rhs: impl Into<Operand>) -> Expr {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn ge(&self, rhs: impl Into<Operand>) -> Expr {
        self.compare(CmpOp::Ge, rhs)
    }

    /// Hop into the related model and return a handle to `name` there.
    /// Record fields hop forward over their foreign key; reverse relations
    /// hop back over the referencing model's one.
    pub fn join(&self, name: &str) -> Result<Field, OrmError> {
        let spec = self.spec();
        let owner = self.schema.descriptor(self.model);
        let target = match spec.field_type {
            FieldType::Record(target) => target,
            _ => {
                return Err(OrmError::Usage(format!(
                    "\"{}\" is not a relation; can't traverse into \"{}\"",
                    spec.name, name
                )));
            }
        };
        let target_desc = self.schema.descriptor(target);
        let edge = if spec.is_virtual {
            let forward = match &spec.forward_field {
                Some(f) => f.clone(),
                None => {
                    return Err(OrmError::Internal(format!(
                        "reverse relation \"{}\" has no forward field",
                        spec.name
                    )));
                }
            };
            JoinEdge {
                source_table: owner.table.clone(),
                target_table: target_desc.table.clone(),
                source_column: "id".to_string(),
                target_column: forward,
            }
        } else {
            JoinEdge {
                source_table: owner.table.clone(),
                target_table: target_desc.table.clone(),
                source_column: spec.name.clone(),
                target_column: "id".to_string(),
            }
        };
        let field = target_desc.field_index(name).ok_or_else(|| {
            OrmError::Usage(format!("no field \"{}\" on \"{}\"", name, target_desc.name))
        })?;
        let mut edges = self.edges.clone();
        edges.push(edge);
        Ok(Field {
            schema: self.schema.clone(),
            model: target,
            field,
            edges,
        })
    }

    /// Ascending order term for [`RecordSet::order_by`].
    pub fn asc(&self) -> OrderTerm {
        OrderTerm(self.spec().asc.clone())
    }

    /// Descending order term.
    pub fn desc(&self) -> OrderTerm {
        OrderTerm(self.spec().desc.clone())
    }
}

impl From<&Field> for Operand {
    fn from(f: &Field) -> Operand {
        f.operand()
    }
}

/// Handle to one declared enum type.
#[derive(Clone)]
pub struct EnumType {
    schema: Arc<Schema>,
    id: EnumId,
}

impl EnumType {
    pub(crate) fn bind(schema: Arc<Schema>, id: EnumId) -> EnumType {
        EnumType { schema, id }
    }

    pub fn name(&self) -> &str {
        &self.schema.enum_descriptor(self.id).name
    }

    /// Value for a variant, by declared name.
    pub fn value(&self, variant: &str) -> Result<Value, OrmError> {
        let desc = self.schema.enum_descriptor(self.id);
        desc.ordinal_of(variant)
            .map(|ordinal| Value::Enum(self.id, ordinal))
            .ok_or_else(|| {
                OrmError::Usage(format!(
                    "no variant \"{}\" on enum \"{}\"",
                    variant, desc.name
                ))
            })
    }

    /// Variant name for a stored ordinal.
    pub fn variant(&self, ordinal: i64) -> Result<&str, OrmError> {
        let desc = self.schema.enum_descriptor(self.id);
        desc.variant_name(ordinal).ok_or_else(|| {
            OrmError::Usage(format!(
                "no ordinal {} on enum \"{}\"",
                ordinal, desc.name
            ))
        })
    }
}
