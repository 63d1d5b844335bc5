//! Schema registry: collects record type declarations into an immutable
//! [`Schema`].
//!
//! Declarations go through [`SchemaBuilder`] once at startup; `build()`
//! resolves named type references (so declaration order is free), synthesizes
//! the `id` field for every model, and wires reverse relations onto
//! referenced models. The built schema is shared read-only behind an `Arc`.

use std::collections::BTreeMap;

use crate::error::OrmError;
use crate::field::{FieldDef, FieldSpec, FieldType, TypeRef};
use crate::value::Value;

/// Handle to a model inside a built schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelId(pub(crate) usize);

/// Handle to an enum type inside a built schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumId(pub(crate) usize);

/// One record type: its table identity and ordered, bound field table.
/// The `id` field is always first.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldSpec>,
}

impl ModelDescriptor {
    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One enumerated type: ordered variant names; a variant's ordinal is its
/// position.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumDescriptor {
    pub(crate) fn ordinal_of(&self, variant: &str) -> Option<i64> {
        self.variants
            .iter()
            .position(|v| v == variant)
            .map(|i| i as i64)
    }

    pub(crate) fn variant_name(&self, ordinal: i64) -> Option<&str> {
        if ordinal < 0 {
            return None;
        }
        self.variants.get(ordinal as usize).map(|s| s.as_str())
    }
}

/// The immutable registry of all declared record and enum types.
#[derive(Debug)]
pub struct Schema {
    pub(crate) models: Vec<ModelDescriptor>,
    pub(crate) enums: Vec<EnumDescriptor>,
    model_index: BTreeMap<String, usize>,
    enum_index: BTreeMap<String, usize>,
}

impl Schema {
    pub(crate) fn model_by_name(&self, name: &str) -> Option<ModelId> {
        self.model_index.get(name).map(|i| ModelId(*i))
    }

    pub(crate) fn enum_by_name(&self, name: &str) -> Option<EnumId> {
        self.enum_index.get(name).map(|i| EnumId(*i))
    }

    pub(crate) fn descriptor(&self, id: ModelId) -> &ModelDescriptor {
        &self.models[id.0]
    }

    pub(crate) fn enum_descriptor(&self, id: EnumId) -> &EnumDescriptor {
        &self.enums[id.0]
    }

    pub(crate) fn field(&self, model: ModelId, index: usize) -> &FieldSpec {
        &self.models[model.0].fields[index]
    }
}

/// Builder for a [`Schema`]. Declare enum types and models, then call
/// [`SchemaBuilder::build`] once.
#[derive(Default)]
pub struct SchemaBuilder {
    models: Vec<ModelBuilder>,
    enums: Vec<EnumBuilder>,
}

struct EnumBuilder {
    name: String,
    variants: Vec<String>,
}

/// Field declarations for one model, appended via [`ModelBuilder::field`].
pub struct ModelBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl ModelBuilder {
    pub fn field(&mut self, def: FieldDef) -> &mut Self {
        self.fields.push(def);
        self
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an enum type. Variant ordinals follow declaration order.
    pub fn enum_type(&mut self, name: &str, variants: &[&str]) -> &mut Self {
        self.enums.push(EnumBuilder {
            name: name.to_string(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Declare a record type. The table name is the lowercased model name;
    /// compound names are not decomposed.
    pub fn model(&mut self, name: &str) -> &mut ModelBuilder {
        self.models.push(ModelBuilder {
            name: name.to_string(),
            fields: Vec::new(),
        });
        let idx = self.models.len() - 1;
        &mut self.models[idx]
    }

    pub fn build(self) -> Result<Schema, OrmError> {
        let mut enums = Vec::with_capacity(self.enums.len());
        let mut enum_index = BTreeMap::new();
        for eb in &self.enums {
            if enum_index.insert(eb.name.clone(), enums.len()).is_some() {
                return Err(OrmError::Config(format!(
                    "duplicate enum type \"{}\"",
                    eb.name
                )));
            }
            for (i, v) in eb.variants.iter().enumerate() {
                if eb.variants[..i].contains(v) {
                    return Err(OrmError::Config(format!(
                        "duplicate variant \"{}\" on enum \"{}\"",
                        v, eb.name
                    )));
                }
            }
            enums.push(EnumDescriptor {
                name: eb.name.clone(),
                variants: eb.variants.clone(),
            });
        }

        let mut model_index = BTreeMap::new();
        let mut tables: BTreeMap<String, String> = BTreeMap::new();
        for (idx, mb) in self.models.iter().enumerate() {
            if model_index.insert(mb.name.clone(), idx).is_some() {
                return Err(OrmError::Config(format!(
                    "duplicate model \"{}\"",
                    mb.name
                )));
            }
            let table = mb.name.to_ascii_lowercase();
            if let Some(other) = tables.insert(table.clone(), mb.name.clone()) {
                return Err(OrmError::Config(format!(
                    "models \"{}\" and \"{}\" both map to table \"{}\"",
                    other, mb.name, table
                )));
            }
        }

        // First pass: bind declared fields, with `id` synthesized up front.
        let mut models = Vec::with_capacity(self.models.len());
        for mb in &self.models {
            let table = mb.name.to_ascii_lowercase();
            let mut fields = Vec::with_capacity(mb.fields.len() + 1);
            fields.push(FieldSpec::bind(
                &table,
                "id",
                FieldType::Int,
                true,
                false,
                None,
                None,
                None,
            ));
            for def in &mb.fields {
                if def.name == "id" {
                    return Err(OrmError::Config(format!(
                        "can't explicitly declare an \"id\" field on \"{}\"",
                        mb.name
                    )));
                }
                if fields.iter().any(|f: &FieldSpec| f.name == def.name) {
                    return Err(OrmError::Config(format!(
                        "duplicate field \"{}\" on \"{}\"",
                        def.name, mb.name
                    )));
                }
                let field_type =
                    resolve_type(&def.type_ref, &mb.name, &def.name, &enum_index, &model_index)?;
                if matches!(def.default, Some(Value::Record(_))) {
                    return Err(OrmError::Config(format!(
                        "record-typed default on \"{}\".\"{}\"; set the reference per record instead",
                        mb.name, def.name
                    )));
                }
                let spec = FieldSpec::bind(
                    &table,
                    &def.name,
                    field_type,
                    def.required,
                    false,
                    def.default.clone(),
                    def.max_length,
                    None,
                );
                if let Some(default) = &spec.default {
                    spec.check_value(default).map_err(|e| {
                        OrmError::Config(format!("default on \"{}\": {}", mb.name, e))
                    })?;
                }
                fields.push(spec);
            }
            models.push(ModelDescriptor {
                name: mb.name.clone(),
                table,
                fields,
            });
        }

        // Second pass: wire a virtual reverse relation onto every referenced
        // model. Collisions must be resolved with an explicit inverse name.
        let mut wirings = Vec::new();
        for (m_idx, mb) in self.models.iter().enumerate() {
            for def in &mb.fields {
                if let TypeRef::Record(target_name) = &def.type_ref {
                    let target = model_index[target_name.as_str()];
                    let reverse = def
                        .inverse
                        .clone()
                        .unwrap_or_else(|| pluralize(&models[m_idx].table));
                    wirings.push((target, reverse, m_idx, def.name.clone()));
                }
            }
        }
        for (target, reverse, declaring, forward) in wirings {
            if models[target].field_index(&reverse).is_some() {
                return Err(OrmError::Config(format!(
                    "reverse relation \"{}\" collides with an existing field on \"{}\"; \
                     declare an explicit inverse name on \"{}\".\"{}\"",
                    reverse, models[target].name, models[declaring].name, forward
                )));
            }
            let target_table = models[target].table.clone();
            models[target].fields.push(FieldSpec::bind(
                &target_table,
                &reverse,
                FieldType::Record(ModelId(declaring)),
                false,
                true,
                None,
                None,
                Some(forward),
            ));
        }

        Ok(Schema {
            models,
            enums,
            model_index,
            enum_index,
        })
    }
}

fn resolve_type(
    type_ref: &TypeRef,
    model: &str,
    field: &str,
    enum_index: &BTreeMap<String, usize>,
    model_index: &BTreeMap<String, usize>,
) -> Result<FieldType, OrmError> {
    match type_ref {
        TypeRef::Int => Ok(FieldType::Int),
        TypeRef::Str => Ok(FieldType::Str),
        TypeRef::Enum(name) => enum_index
            .get(name.as_str())
            .map(|i| FieldType::Enum(EnumId(*i)))
            .ok_or_else(|| {
                OrmError::Config(format!(
                    "unknown enum type \"{}\" on \"{}\".\"{}\"",
                    name, model, field
                ))
            }),
        TypeRef::Record(name) => model_index
            .get(name.as_str())
            .map(|i| FieldType::Record(ModelId(*i)))
            .ok_or_else(|| {
                OrmError::Config(format!(
                    "unknown model \"{}\" on \"{}\".\"{}\"",
                    name, model, field
                ))
            }),
    }
}

fn pluralize(s: &str) -> String {
    if s.ends_with('s') || s.ends_with("sh") || s.ends_with("ch") || s.ends_with('x') {
        format!("{}es", s)
    } else if s.ends_with('y') && s.len() > 1 && !s.ends_with("ey") {
        format!("{}ies", &s[..s.len() - 1])
    } else {
        format!("{}s", s)
    }
}
