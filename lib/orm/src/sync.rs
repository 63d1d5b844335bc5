//! Snapshot-based schema synchronization.
//!
//! Each table's last-known layout persists as one JSON document in the
//! snapshot store, under `schema:{table}`. On open the layout derived from
//! the declaration is compared against it: no snapshot creates the table,
//! an equal one does nothing, a differing one emits ADD/DROP COLUMN for
//! the difference in field names. Surviving columns are never compared
//! further, so a type change goes unnoticed, and a rename is a drop plus
//! an add (the data does not travel).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::Db;
use crate::error::OrmError;
use crate::field::{FieldSpec, FieldType};
use crate::schema::{ModelDescriptor, ModelId, Schema};

/// One column of a persisted layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnState {
    #[serde(rename = "type")]
    pub column_type: String,
    pub required: bool,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none", default)]
    pub max_length: Option<u32>,
}

/// Serializable layout of one table: its columns and the tables its
/// foreign keys point at. Comparison is plain structural equality after a
/// JSON round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaState {
    pub fields: BTreeMap<String, ColumnState>,
    #[serde(rename = "foreignKeys")]
    pub foreign_keys: BTreeMap<String, String>,
}

pub(crate) fn derive_state(schema: &Schema, model: &ModelDescriptor) -> SchemaState {
    let mut fields = BTreeMap::new();
    let mut foreign_keys = BTreeMap::new();
    for spec in model.fields.iter().filter(|f| !f.is_virtual) {
        fields.insert(
            spec.name.clone(),
            ColumnState {
                column_type: spec.column_type.clone(),
                required: spec.required,
                max_length: spec.max_length,
            },
        );
        if let FieldType::Record(target) = spec.field_type {
            foreign_keys.insert(spec.name.clone(), schema.descriptor(target).table.clone());
        }
    }
    SchemaState {
        fields,
        foreign_keys,
    }
}

fn column_def(spec: &FieldSpec, fk_target: Option<&str>) -> String {
    let mut def = format!("\"{}\" {}", spec.name, spec.column_type);
    if let Some(target) = fk_target {
        def.push_str(&format!(
            " CONSTRAINT \"fk_{}\" REFERENCES \"{}\"(\"id\")",
            spec.name, target
        ));
    }
    def
}

fn snapshot_key(table: &str) -> String {
    format!("schema:{}", table)
}

/// Bring one model's table in line with its declaration and refresh the
/// snapshot. DDL for a migration runs inside a single transaction; the
/// snapshot is only rewritten after it committed.
pub(crate) fn sync_model(db: &Db, model: ModelId) -> Result<(), OrmError> {
    let desc = db.schema.descriptor(model);
    let derived = derive_state(&db.schema, desc);
    let key = snapshot_key(&desc.table);

    let persisted: Option<SchemaState> = match db.kv.get(&key)? {
        Some(bytes) => Some(serde_json::from_slice(&bytes).map_err(|e| {
            OrmError::Internal(format!("deserialize snapshot for \"{}\": {}", desc.table, e))
        })?),
        None => None,
    };

    match persisted {
        None => {
            let columns: Vec<String> = desc
                .fields
                .iter()
                .filter(|f| !f.is_virtual)
                .map(|f| {
                    column_def(f, derived.foreign_keys.get(&f.name).map(|t| t.as_str()))
                })
                .collect();
            let stmt = format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
                desc.table,
                columns.join(", ")
            );
            db.sql.exec(&stmt, &[])?;
            info!("created table \"{}\"", desc.table);
        }
        Some(ref persisted) if *persisted == derived => {
            debug!("schema for \"{}\" unchanged", desc.table);
            return Ok(());
        }
        Some(persisted) => {
            // The diff is over field names only.
            let dropped: Vec<&String> = persisted
                .fields
                .keys()
                .filter(|name| !derived.fields.contains_key(*name))
                .collect();
            let added: Vec<&String> = derived
                .fields
                .keys()
                .filter(|name| !persisted.fields.contains_key(*name))
                .collect();
            if dropped.is_empty() && added.is_empty() {
                debug!("schema snapshot for \"{}\" refreshed", desc.table);
            } else {
                db.transaction(|db| {
                    for name in &dropped {
                        db.sql.exec(
                            &format!(
                                "ALTER TABLE \"{}\" DROP COLUMN \"{}\"",
                                desc.table, name
                            ),
                            &[],
                        )?;
                    }
                    for name in &added {
                        let spec = desc.field(name.as_str()).ok_or_else(|| {
                            OrmError::Internal(format!(
                                "added column \"{}\" missing from \"{}\"",
                                name, desc.name
                            ))
                        })?;
                        let def = column_def(
                            spec,
                            derived.foreign_keys.get(name.as_str()).map(|t| t.as_str()),
                        );
                        db.sql.exec(
                            &format!("ALTER TABLE \"{}\" ADD COLUMN {}", desc.table, def),
                            &[],
                        )?;
                    }
                    Ok(())
                })?;
                info!(
                    "migrated table \"{}\" (+{} -{})",
                    desc.table,
                    added.len(),
                    dropped.len()
                );
            }
        }
    }

    let bytes = serde_json::to_vec(&derived).map_err(|e| {
        OrmError::Internal(format!("serialize snapshot for \"{}\": {}", desc.table, e))
    })?;
    db.kv.set(&key, &bytes)?;
    Ok(())
}
