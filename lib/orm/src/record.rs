//! In-memory records: construction, typed access, dirty tracking, save and
//! load.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cuneiform_sql as sql;
use tracing::debug;

use crate::db::Db;
use crate::error::OrmError;
use crate::expr::{CmpOp, Expr, FieldRef, Operand};
use crate::field::{FieldSpec, FieldType};
use crate::schema::{ModelId, Schema};
use crate::set::RecordSet;
use crate::value::Value;

/// One row of a record type, held in memory.
///
/// Values live in a map keyed by field name. A field that was never set, or
/// that is NULL in storage, is simply absent and reads as [`Value::Null`];
/// writing `Null` over an absent field is a no-op. Any semantic change flips
/// the dirty flag, and [`Record::save`] clears it.
#[derive(Clone)]
pub struct Record {
    schema: Arc<Schema>,
    model: ModelId,
    values: BTreeMap<String, Value>,
    dirty: bool,
    initializing: bool,
}

impl Record {
    pub(crate) fn create(
        schema: Arc<Schema>,
        model: ModelId,
        values: Vec<(&str, Value)>,
    ) -> Result<Record, OrmError> {
        let mut record = Record {
            schema,
            model,
            values: BTreeMap::new(),
            dirty: false,
            initializing: false,
        };
        let mut supplied: Vec<&str> = Vec::with_capacity(values.len());
        for (name, value) in values {
            record.set(name, value)?;
            supplied.push(name);
        }
        let desc = record.schema.descriptor(model);
        for spec in &desc.fields {
            if spec.required
                && !spec.is_virtual
                && spec.name != "id"
                && !supplied.iter().any(|n| *n == spec.name)
            {
                return Err(OrmError::Validation(format!(
                    "missing required field \"{}\" on {}",
                    spec.name, desc.table
                )));
            }
        }
        // A fresh record is pending by definition, values or not; the row
        // does not exist until the first save.
        record.dirty = true;
        Ok(record)
    }

    pub(crate) fn model_id(&self) -> ModelId {
        self.model
    }

    /// Generated identity; absent until the first save.
    pub fn id(&self) -> Option<i64> {
        match self.values.get("id") {
            Some(Value::Int(id)) => Some(*id),
            _ => None,
        }
    }

    /// True when there are changes the database has not seen.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Stored value, or `Null` for a field that was never set. Reverse
    /// relations are queries, not values; read them with [`Record::related`].
    pub fn get(&self, name: &str) -> Result<Value, OrmError> {
        let desc = self.schema.descriptor(self.model);
        let spec = desc.field(name).ok_or_else(|| {
            OrmError::Usage(format!("no field \"{}\" on \"{}\"", name, desc.name))
        })?;
        if spec.is_virtual {
            return Err(OrmError::Usage(format!(
                "\"{}\" is a reverse relation; read it with related()",
                name
            )));
        }
        Ok(self.values.get(name).cloned().unwrap_or(Value::Null))
    }

    /// Set a field. Writing the value already present is a no-op; otherwise
    /// the value is type-checked, stored, and the record marked dirty
    /// (unless it is being hydrated from storage).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), OrmError> {
        let value = value.into();
        let desc = self.schema.descriptor(self.model);
        let spec = desc.field(name).ok_or_else(|| {
            OrmError::Usage(format!("no field \"{}\" on \"{}\"", name, desc.name))
        })?;
        if spec.is_virtual {
            return Err(OrmError::Usage(format!(
                "\"{}\" is a reverse relation; it can't be assigned",
                name
            )));
        }
        // Absent and NULL are the same stored state.
        let unchanged = match self.values.get(name) {
            Some(current) => *current == value,
            None => value == Value::Null,
        };
        if unchanged {
            return Ok(());
        }
        spec.check_value(&value)?;
        self.values.insert(name.to_string(), value);
        if !self.initializing {
            self.dirty = true;
        }
        Ok(())
    }

    /// The reverse relation `name` as a lazy set over the referencing model,
    /// filtered by its foreign key pointing at this record. On an unsaved
    /// record the set matches nothing.
    pub fn related(&self, name: &str) -> Result<RecordSet, OrmError> {
        let desc = self.schema.descriptor(self.model);
        let spec = desc.field(name).ok_or_else(|| {
            OrmError::Usage(format!("no field \"{}\" on \"{}\"", name, desc.name))
        })?;
        if !spec.is_virtual {
            return Err(OrmError::Usage(format!(
                "\"{}\" is a column, not a reverse relation; read it with get()",
                name
            )));
        }
        let target = match spec.field_type {
            FieldType::Record(target) => target,
            _ => {
                return Err(OrmError::Internal(format!(
                    "reverse relation \"{}\" is not record-typed",
                    name
                )));
            }
        };
        let forward = match &spec.forward_field {
            Some(f) => f.as_str(),
            None => {
                return Err(OrmError::Internal(format!(
                    "reverse relation \"{}\" has no forward field",
                    name
                )));
            }
        };
        let target_desc = self.schema.descriptor(target);
        let field = target_desc.field_index(forward).ok_or_else(|| {
            OrmError::Internal(format!(
                "forward field \"{}\" missing on \"{}\"",
                forward, target_desc.name
            ))
        })?;
        let own_id = match self.id() {
            Some(id) => Value::Int(id),
            None => Value::Null,
        };
        let by_owner = Expr::Compare {
            op: CmpOp::Eq,
            lhs: Operand::Field(FieldRef {
                model: target,
                field,
            }),
            rhs: Operand::Value(own_id),
        };
        Ok(RecordSet::new(self.schema.clone(), target).filter(by_owner))
    }

    /// Persist pending changes: an UPDATE of the explicitly set columns when
    /// the record has an id, otherwise an INSERT of every column (declared
    /// defaults fill the gaps). A clean record issues no statement.
    ///
    /// Embedded records are saved first, depth-first, so their generated
    /// ids are available for the owning row's foreign keys. The ids land in
    /// the embedded copies; to share one referenced record across several
    /// owners, save it before embedding.
    pub fn save(&mut self, db: &Db) -> Result<(), OrmError> {
        if !self.dirty {
            return Ok(());
        }

        for value in self.values.values_mut() {
            if let Value::Record(referenced) = value {
                referenced.save(db)?;
            }
        }

        let desc = self.schema.descriptor(self.model);
        if let Some(id) = self.id() {
            let mut assignments = Vec::new();
            let mut params = Vec::new();
            for spec in &desc.fields {
                if spec.name == "id" || spec.is_virtual {
                    continue;
                }
                if let Some(value) = self.values.get(&spec.name) {
                    assignments.push(format!("\"{}\" = ?", spec.name));
                    params.push(value.to_param());
                }
            }
            if !assignments.is_empty() {
                params.push(sql::Value::Integer(id));
                let stmt = format!(
                    "UPDATE \"{}\" SET {} WHERE \"id\" = ?",
                    desc.table,
                    assignments.join(", ")
                );
                db.sql.exec(&stmt, &params)?;
                debug!("updated {} {}", desc.table, id);
            }
            self.dirty = false;
        } else {
            let mut columns = Vec::new();
            let mut params = Vec::new();
            for spec in &desc.fields {
                if spec.name == "id" || spec.is_virtual {
                    continue;
                }
                columns.push(format!("\"{}\"", spec.name));
                if let Some(value) = self.values.get(&spec.name) {
                    params.push(value.to_param());
                } else if let Some(default) = &spec.default {
                    params.push(default.to_param());
                } else {
                    return Err(OrmError::Validation(format!(
                        "no value for \"{}\" and no default present",
                        spec.name
                    )));
                }
            }
            let table = desc.table.clone();
            let stmt = if columns.is_empty() {
                format!("INSERT INTO \"{}\" DEFAULT VALUES RETURNING \"id\"", table)
            } else {
                format!(
                    "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING \"id\"",
                    table,
                    columns.join(", "),
                    vec!["?"; params.len()].join(", ")
                )
            };
            let rows = db.sql.query(&stmt, &params)?;
            let id = rows
                .first()
                .and_then(|row| row.get_i64("id"))
                .ok_or_else(|| {
                    OrmError::Internal(format!("insert into \"{}\" returned no id", table))
                })?;
            // Straight into the map: recording the identity is not a
            // semantic change.
            self.values.insert("id".to_string(), Value::Int(id));
            self.dirty = false;
            debug!("inserted {} {}", table, id);
        }
        Ok(())
    }
}

/// Point-load one row and hydrate it; `None` when the id does not exist.
/// NULL columns stay absent from the value map, record columns load their
/// referenced row recursively, and the result starts clean.
pub(crate) fn load(db: &Db, model: ModelId, id: i64) -> Result<Option<Record>, OrmError> {
    let desc = db.schema.descriptor(model);
    let columns: Vec<String> = desc
        .fields
        .iter()
        .filter(|f| !f.is_virtual)
        .map(|f| format!("\"{}\"", f.name))
        .collect();
    let stmt = format!(
        "SELECT {} FROM \"{}\" WHERE \"id\" = ?",
        columns.join(", "),
        desc.table
    );
    let rows = db.sql.query(&stmt, &[sql::Value::Integer(id)])?;
    let row = match rows.first() {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut record = Record {
        schema: db.schema.clone(),
        model,
        values: BTreeMap::new(),
        dirty: false,
        initializing: true,
    };
    for spec in desc.fields.iter().filter(|f| !f.is_virtual) {
        let raw = row.get(&spec.name).cloned().unwrap_or(sql::Value::Null);
        let value = from_storage(db, spec, &raw)?;
        if value == Value::Null {
            continue;
        }
        record.set(&spec.name, value)?;
    }
    record.initializing = false;
    record.dirty = false;
    Ok(Some(record))
}

fn from_storage(db: &Db, spec: &FieldSpec, raw: &sql::Value) -> Result<Value, OrmError> {
    match (spec.field_type, raw) {
        (_, sql::Value::Null) => Ok(Value::Null),
        (FieldType::Int, sql::Value::Integer(i)) => Ok(Value::Int(*i)),
        (FieldType::Str, sql::Value::Text(s)) => Ok(Value::Str(s.clone())),
        (FieldType::Enum(id), sql::Value::Integer(ordinal)) => {
            let desc = db.schema.enum_descriptor(id);
            if desc.variant_name(*ordinal).is_none() {
                return Err(OrmError::Validation(format!(
                    "unknown ordinal {} for enum \"{}\" in column \"{}\"",
                    ordinal, desc.name, spec.name
                )));
            }
            Ok(Value::Enum(id, *ordinal))
        }
        (FieldType::Record(target), sql::Value::Integer(fk)) => {
            let referenced = load(db, target, *fk)?.ok_or_else(|| {
                OrmError::NotFound(format!(
                    "{} {} not found (referenced by \"{}\")",
                    db.schema.descriptor(target).table,
                    fk,
                    spec.name
                ))
            })?;
            Ok(Value::Record(referenced))
        }
        _ => Err(OrmError::Validation(format!(
            "malformed stored value for \"{}\"",
            spec.name
        ))),
    }
}

impl PartialEq for Record {
    /// Same record type and same stored values. Dirtiness does not matter.
    fn eq(&self, other: &Record) -> bool {
        self.model == other.model && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.schema.descriptor(self.model);
        write!(f, "<{}", desc.table)?;
        if self.dirty {
            write!(f, "[D]")?;
        }
        for spec in &desc.fields {
            if let Some(value) = self.values.get(&spec.name) {
                write!(f, " {}=", spec.name)?;
                self.fmt_value(value, f)?;
            }
        }
        write!(f, ">")
    }
}

impl Record {
    fn fmt_value(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Enum(id, ordinal) => {
                let desc = self.schema.enum_descriptor(*id);
                match desc.variant_name(*ordinal) {
                    Some(variant) => write!(f, "{}::{}", desc.name, variant),
                    None => write!(f, "{}::{}", desc.name, ordinal),
                }
            }
            Value::Record(r) => write!(f, "{:?}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use cuneiform_kv::MemStore;
    use cuneiform_sql::{SQLError, SQLStore, SqliteStore};

    use crate::field::FieldDef;
    use crate::schema::SchemaBuilder;

    fn demo_schema() -> crate::schema::Schema {
        let mut b = SchemaBuilder::new();
        b.enum_type("CompanyType", &["GmbH", "AG", "KG", "Other"]);
        b.model("Town").field(FieldDef::str("name"));
        b.model("Address")
            .field(FieldDef::str("street"))
            .field(FieldDef::int("house_number").default(Value::Null))
            .field(FieldDef::str("post_code").max_length(5).default(Value::Null))
            .field(FieldDef::record("town", "Town").default(Value::Null));
        b.model("Customer")
            .field(FieldDef::str("name").required())
            .field(FieldDef::enumeration("type", "CompanyType").default(Value::Null))
            .field(FieldDef::record("addr", "Address").default(Value::Null));
        b.build().unwrap()
    }

    fn open() -> Db {
        Db::open(
            demo_schema(),
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(MemStore::new()),
        )
        .unwrap()
    }

    /// SQL store wrapper that records every statement it sees.
    struct Recording {
        inner: SqliteStore,
        log: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new() -> Recording {
            Recording {
                inner: SqliteStore::open_in_memory().unwrap(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn statements(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl SQLStore for Recording {
        fn query(&self, stmt: &str, params: &[sql::Value]) -> Result<Vec<sql::Row>, SQLError> {
            self.log.lock().unwrap().push(stmt.to_string());
            self.inner.query(stmt, params)
        }

        fn exec(&self, stmt: &str, params: &[sql::Value]) -> Result<u64, SQLError> {
            self.log.lock().unwrap().push(stmt.to_string());
            self.inner.exec(stmt, params)
        }
    }

    fn open_recording() -> (Db, Arc<Recording>) {
        let recording = Arc::new(Recording::new());
        let db = Db::open(demo_schema(), recording.clone(), Arc::new(MemStore::new())).unwrap();
        (db, recording)
    }

    #[test]
    fn first_insert_gets_id_one() {
        let db = open();
        let town = db.model("Town").unwrap();
        let mut stuttgart = town.create(vec![("name", "Stuttgart".into())]).unwrap();
        assert!(stuttgart.dirty());
        assert_eq!(stuttgart.id(), None);

        stuttgart.save(&db).unwrap();
        assert!(!stuttgart.dirty());
        assert_eq!(stuttgart.id(), Some(1));

        let loaded = town.get_or_err(&db, 1).unwrap();
        assert_eq!(loaded.get("name").unwrap(), Value::Str("Stuttgart".into()));
        assert!(!loaded.dirty());
        assert_eq!(loaded, stuttgart);
    }

    #[test]
    fn dirty_tracks_semantic_changes_only() {
        let db = open();
        let town = db.model("Town").unwrap();
        let mut t = town.create(vec![("name", "Ulm".into())]).unwrap();
        t.save(&db).unwrap();

        let mut loaded = town.get_or_err(&db, t.id().unwrap()).unwrap();
        assert!(!loaded.dirty());

        // Same value again: no-op.
        loaded.set("name", "Ulm").unwrap();
        assert!(!loaded.dirty());

        // NULL over an absent field: also a no-op.
        let mut addr = db
            .model("Address")
            .unwrap()
            .create(vec![("street", "A".into())])
            .unwrap();
        addr.save(&db).unwrap();
        let mut addr = db.model("Address").unwrap().get_or_err(&db, 1).unwrap();
        addr.set("post_code", Value::Null).unwrap();
        assert!(!addr.dirty());

        loaded.set("name", "Neu-Ulm").unwrap();
        assert!(loaded.dirty());
        loaded.save(&db).unwrap();
        assert!(!loaded.dirty());
        assert_eq!(
            town.get_or_err(&db, t.id().unwrap()).unwrap().get("name").unwrap(),
            Value::Str("Neu-Ulm".into())
        );
    }

    #[test]
    fn clean_save_issues_no_statement() {
        let (db, recording) = open_recording();
        let town = db.model("Town").unwrap();
        let mut t = town.create(vec![("name", "Bonn".into())]).unwrap();
        t.save(&db).unwrap();

        let before = recording.statements().len();
        t.save(&db).unwrap();
        assert_eq!(recording.statements().len(), before);
    }

    #[test]
    fn update_touches_only_set_columns() {
        let (db, recording) = open_recording();
        let customer = db.model("Customer").unwrap();
        let mut c = customer.create(vec![("name", "solute".into())]).unwrap();
        c.save(&db).unwrap();

        let mut loaded = customer.get_or_err(&db, c.id().unwrap()).unwrap();
        loaded.set("name", "solute GmbH").unwrap();
        loaded.save(&db).unwrap();

        let last = recording.statements().last().unwrap().clone();
        assert!(last.starts_with("UPDATE \"customer\" SET"));
        assert!(last.contains("\"name\" = ?"));
        assert!(!last.contains("\"type\""));
        assert!(!last.contains("\"addr\""));
    }

    #[test]
    fn insert_applies_declared_defaults() {
        let db = open();
        let customer = db.model("Customer").unwrap();
        let mut c = customer.create(vec![("name", "plain".into())]).unwrap();
        c.save(&db).unwrap();

        let loaded = customer.get_or_err(&db, c.id().unwrap()).unwrap();
        assert_eq!(loaded.get("type").unwrap(), Value::Null);
        assert_eq!(loaded.get("addr").unwrap(), Value::Null);
    }

    #[test]
    fn insert_without_value_or_default_fails() {
        let db = open();
        let address = db.model("Address").unwrap();
        // street and house_number have neither a value nor a default.
        let mut a = address.create(vec![("post_code", "76133".into())]).unwrap();
        let err = a.save(&db).unwrap_err();
        match err {
            OrmError::Validation(msg) => assert!(msg.contains("street")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn create_enforces_required_fields() {
        let db = open();
        let customer = db.model("Customer").unwrap();
        let err = customer.create(vec![]).unwrap_err();
        match err {
            OrmError::Validation(msg) => assert!(msg.contains("name")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn set_rejects_wrong_types_and_reverse_relations() {
        let db = open();
        let town = db.model("Town").unwrap();
        let mut t = town.create(vec![("name", "Mainz".into())]).unwrap();
        assert!(matches!(t.set("name", 5), Err(OrmError::Validation(_))));
        assert!(matches!(
            t.set("addresses", Value::Null),
            Err(OrmError::Usage(_))
        ));
        assert!(matches!(t.get("addresses"), Err(OrmError::Usage(_))));
        assert!(matches!(t.set("nope", 1), Err(OrmError::Usage(_))));
    }

    #[test]
    fn cascade_saves_depth_first() {
        let db = open();
        let town = db.model("Town").unwrap();
        let address = db.model("Address").unwrap();
        let customer = db.model("Customer").unwrap();

        let ka = town.create(vec![("name", "Karlsruhe".into())]).unwrap();
        let zeppelin = address
            .create(vec![
                ("street", "Zeppelinstr.".into()),
                ("house_number", Value::Int(15)),
                ("post_code", "76185".into()),
                ("town", ka.into()),
            ])
            .unwrap();
        let mut solute = customer
            .create(vec![("name", "solute GmbH".into()), ("addr", zeppelin.into())])
            .unwrap();

        solute.save(&db).unwrap();
        assert_eq!(solute.id(), Some(1));

        // The generated ids landed in the embedded copies.
        let addr = match solute.get("addr").unwrap() {
            Value::Record(r) => r,
            other => panic!("unexpected value: {other:?}"),
        };
        assert_eq!(addr.id(), Some(1));
        assert!(!addr.dirty());
        let t = match addr.get("town").unwrap() {
            Value::Record(r) => r,
            other => panic!("unexpected value: {other:?}"),
        };
        assert_eq!(t.id(), Some(1));

        // Hydration reconstructs the chain.
        let loaded = customer.get_or_err(&db, 1).unwrap();
        let loaded_addr = match loaded.get("addr").unwrap() {
            Value::Record(r) => r,
            other => panic!("unexpected value: {other:?}"),
        };
        assert_eq!(
            loaded_addr.get("street").unwrap(),
            Value::Str("Zeppelinstr.".into())
        );
    }

    #[test]
    fn enum_values_round_trip_as_ordinals() {
        let db = open();
        let company_type = db.enum_type("CompanyType").unwrap();
        let customer = db.model("Customer").unwrap();

        let mut c = customer
            .create(vec![
                ("name", "solute".into()),
                ("type", company_type.value("GmbH").unwrap()),
            ])
            .unwrap();
        c.save(&db).unwrap();

        let loaded = customer.get_or_err(&db, 1).unwrap();
        let value = loaded.get("type").unwrap();
        assert_eq!(value, company_type.value("GmbH").unwrap());
        match value {
            Value::Enum(_, ordinal) => {
                assert_eq!(company_type.variant(ordinal).unwrap(), "GmbH")
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn unknown_enum_ordinal_fails_hydration() {
        let db = open();
        let customer = db.model("Customer").unwrap();
        let mut c = customer.create(vec![("name", "odd".into())]).unwrap();
        c.save(&db).unwrap();

        db.sql
            .exec(
                "UPDATE \"customer\" SET \"type\" = 99 WHERE \"id\" = 1",
                &[],
            )
            .unwrap();
        assert!(matches!(
            customer.get(&db, 1),
            Err(OrmError::Validation(_))
        ));
    }

    #[test]
    fn null_columns_stay_absent() {
        let db = open();
        let customer = db.model("Customer").unwrap();
        let mut c = customer.create(vec![("name", "bare".into())]).unwrap();
        c.save(&db).unwrap();

        let loaded = customer.get_or_err(&db, 1).unwrap();
        assert!(!loaded.values.contains_key("type"));
        assert_eq!(loaded.get("type").unwrap(), Value::Null);
        let shown = format!("{loaded:?}");
        assert!(shown.starts_with("<customer "));
        assert!(shown.contains("name=\"bare\""));
        assert!(!shown.contains("type="));
    }

    #[test]
    fn debug_shows_dirty_marker_and_enum_names() {
        let db = open();
        let company_type = db.enum_type("CompanyType").unwrap();
        let c = db
            .model("Customer")
            .unwrap()
            .create(vec![
                ("name", "solute".into()),
                ("type", company_type.value("AG").unwrap()),
            ])
            .unwrap();
        let shown = format!("{c:?}");
        assert!(shown.starts_with("<customer[D] "));
        assert!(shown.contains("type=CompanyType::AG"));
    }

    #[test]
    fn related_reflects_the_foreign_key() {
        let db = open();
        let address = db.model("Address").unwrap();
        let customer = db.model("Customer").unwrap();

        let mut zeppelin = address.create(vec![("street", "Zeppelinstr.".into())]).unwrap();
        zeppelin.save(&db).unwrap();
        let mut other = address.create(vec![("street", "Postweg".into())]).unwrap();
        other.save(&db).unwrap();

        for name in ["a", "b"] {
            let mut c = customer
                .create(vec![("name", name.into()), ("addr", (&zeppelin).into())])
                .unwrap();
            c.save(&db).unwrap();
        }

        assert_eq!(zeppelin.related("customers").unwrap().count(&db).unwrap(), 2);
        assert_eq!(other.related("customers").unwrap().count(&db).unwrap(), 0);

        // Unsaved records have no id; their reverse set matches nothing.
        let fresh = address.create(vec![("street", "Neu".into())]).unwrap();
        assert_eq!(fresh.related("customers").unwrap().count(&db).unwrap(), 0);
        assert!(matches!(
            fresh.related("street").unwrap_err(),
            OrmError::Usage(_)
        ));
    }

    #[test]
    fn id_only_records_insert_with_default_values() {
        let mut b = SchemaBuilder::new();
        b.model("Marker");
        let recording = Arc::new(Recording::new());
        let db = Db::open(
            b.build().unwrap(),
            recording.clone(),
            Arc::new(MemStore::new()),
        )
        .unwrap();

        let marker = db.model("Marker").unwrap();
        let mut m = marker.create(vec![]).unwrap();
        assert!(m.dirty());
        m.save(&db).unwrap();
        assert_eq!(m.id(), Some(1));
        assert!(recording
            .statements()
            .iter()
            .any(|s| s.contains("DEFAULT VALUES")));
    }

    #[test]
    fn get_or_err_reports_missing_rows() {
        let db = open();
        let town = db.model("Town").unwrap();
        assert!(town.get(&db, 77).unwrap().is_none());
        assert!(matches!(
            town.get_or_err(&db, 77).unwrap_err(),
            OrmError::NotFound(_)
        ));
    }

    #[test]
    fn equality_ignores_dirtiness() {
        let db = open();
        let town = db.model("Town").unwrap();
        let mut a = town.create(vec![("name", "Bremen".into())]).unwrap();
        a.save(&db).unwrap();
        let b = town.get_or_err(&db, a.id().unwrap()).unwrap();
        assert_eq!(a, b);

        let mut c = b.clone();
        c.set("name", "Bremerhaven").unwrap();
        assert_ne!(b, c);
    }
}
