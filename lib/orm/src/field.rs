//! Field declarations and their bound form.
//!
//! A [`FieldDef`] is what application code writes; the schema builder
//! resolves its type reference and freezes it into a [`FieldSpec`] with the
//! qualified column reference, order-by tokens, and storage column type.

use crate::error::OrmError;
use crate::schema::{EnumId, ModelId};
use crate::value::Value;

/// Semantic type of a field, resolved against the built schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Str,
    Enum(EnumId),
    Record(ModelId),
}

/// Declaration-side type reference. Enum and record types are named here
/// and resolved when the schema is built, so declaration order does not
/// matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeRef {
    Int,
    Str,
    Enum(String),
    Record(String),
}

/// A single field declaration.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub(crate) name: String,
    pub(crate) type_ref: TypeRef,
    pub(crate) required: bool,
    pub(crate) default: Option<Value>,
    pub(crate) max_length: Option<u32>,
    pub(crate) inverse: Option<String>,
}

impl FieldDef {
    fn new(name: &str, type_ref: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            type_ref,
            required: false,
            default: None,
            max_length: None,
            inverse: None,
        }
    }

    /// An integer field.
    pub fn int(name: &str) -> Self {
        Self::new(name, TypeRef::Int)
    }

    /// A string field, stored as `varchar(max_length)`.
    pub fn str(name: &str) -> Self {
        Self::new(name, TypeRef::Str)
    }

    /// An enumerated field referencing an enum type by name.
    pub fn enumeration(name: &str, enum_name: &str) -> Self {
        Self::new(name, TypeRef::Enum(enum_name.to_string()))
    }

    /// A reference to another record type, stored as a foreign key.
    pub fn record(name: &str, model_name: &str) -> Self {
        Self::new(name, TypeRef::Record(model_name.to_string()))
    }

    /// Require a value at construction time.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Default used when no value was set at insert time.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Maximum length for string fields (defaults to 255).
    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    /// Name of the reverse relation wired onto the referenced model.
    /// Defaults to the pluralized table name of the declaring model.
    pub fn inverse(mut self, name: &str) -> Self {
        self.inverse = Some(name.to_string());
        self
    }
}

/// A field bound to its owning record type.
///
/// The qualified column reference, the order-by tokens, and the storage
/// column type are computed once, when the schema is built, and read-only
/// afterwards. Virtual fields (reverse relations) own no column; their
/// `forward_field` names the foreign-key column on the declaring model.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub is_virtual: bool,
    pub default: Option<Value>,
    pub max_length: Option<u32>,
    pub forward_field: Option<String>,
    /// Qualified column reference, e.g. `"customer"."name"`.
    pub qualified: String,
    pub asc: String,
    pub desc: String,
    /// Storage column type, e.g. `varchar(255)`.
    pub column_type: String,
}

impl FieldSpec {
    pub(crate) fn bind(
        table: &str,
        name: &str,
        field_type: FieldType,
        required: bool,
        is_virtual: bool,
        default: Option<Value>,
        max_length: Option<u32>,
        forward_field: Option<String>,
    ) -> FieldSpec {
        let qualified = format!("\"{}\".\"{}\"", table, name);
        let column_type = if name == "id" {
            "integer primary key autoincrement".to_string()
        } else {
            match field_type {
                FieldType::Int => "integer".to_string(),
                FieldType::Str => format!("varchar({})", max_length.unwrap_or(255)),
                FieldType::Enum(_) | FieldType::Record(_) => "integer".to_string(),
            }
        };
        FieldSpec {
            name: name.to_string(),
            field_type,
            required,
            is_virtual,
            default,
            max_length,
            forward_field,
            asc: format!("{} ASC", qualified),
            desc: format!("{} DESC", qualified),
            qualified,
            column_type,
        }
    }

    /// Check a value against the declared type. NULL is always accepted.
    pub(crate) fn check_value(&self, value: &Value) -> Result<(), OrmError> {
        match (&self.field_type, value) {
            (_, Value::Null) => Ok(()),
            (FieldType::Int, Value::Int(_)) => Ok(()),
            (FieldType::Str, Value::Str(_)) => Ok(()),
            (FieldType::Enum(want), Value::Enum(got, _)) if want == got => Ok(()),
            (FieldType::Enum(_), Value::Enum(_, _)) => Err(OrmError::Validation(format!(
                "field \"{}\" holds a different enum type",
                self.name
            ))),
            (FieldType::Record(want), Value::Record(r)) if *want == r.model_id() => Ok(()),
            (FieldType::Record(_), Value::Record(_)) => Err(OrmError::Validation(format!(
                "field \"{}\" references a different model",
                self.name
            ))),
            _ => Err(OrmError::Validation(format!(
                "field \"{}\" expects {}, got {}",
                self.name,
                self.type_name(),
                value.type_name()
            ))),
        }
    }

    fn type_name(&self) -> &'static str {
        match self.field_type {
            FieldType::Int => "int",
            FieldType::Str => "str",
            FieldType::Enum(_) => "enum",
            FieldType::Record(_) => "record",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(name: &str, field_type: FieldType, max_length: Option<u32>) -> FieldSpec {
        FieldSpec::bind("town", name, field_type, false, false, None, max_length, None)
    }

    #[test]
    fn storage_column_types() {
        assert_eq!(
            bind("id", FieldType::Int, None).column_type,
            "integer primary key autoincrement"
        );
        assert_eq!(bind("n", FieldType::Int, None).column_type, "integer");
        assert_eq!(bind("s", FieldType::Str, None).column_type, "varchar(255)");
        assert_eq!(bind("s", FieldType::Str, Some(5)).column_type, "varchar(5)");
        assert_eq!(
            bind("e", FieldType::Enum(EnumId(0)), None).column_type,
            "integer"
        );
        assert_eq!(
            bind("r", FieldType::Record(ModelId(0)), None).column_type,
            "integer"
        );
    }

    #[test]
    fn bind_freezes_qualified_identifiers() {
        let spec = bind("name", FieldType::Str, None);
        assert_eq!(spec.qualified, "\"town\".\"name\"");
        assert_eq!(spec.asc, "\"town\".\"name\" ASC");
        assert_eq!(spec.desc, "\"town\".\"name\" DESC");
    }

    #[test]
    fn check_value_accepts_declared_type_and_null() {
        let spec = bind("n", FieldType::Int, None);
        assert!(spec.check_value(&Value::Int(1)).is_ok());
        assert!(spec.check_value(&Value::Null).is_ok());
        assert!(spec.check_value(&Value::Str("x".into())).is_err());
    }

    #[test]
    fn check_value_rejects_foreign_enum_type() {
        let spec = bind("e", FieldType::Enum(EnumId(0)), None);
        assert!(spec.check_value(&Value::Enum(EnumId(0), 2)).is_ok());
        let err = spec.check_value(&Value::Enum(EnumId(1), 2)).unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
    }

    #[test]
    fn declaration_options_chain() {
        let def = FieldDef::str("post_code")
            .required()
            .max_length(5)
            .default("00000")
            .inverse("codes");
        assert!(def.required);
        assert_eq!(def.max_length, Some(5));
        assert_eq!(def.default, Some(Value::Str("00000".into())));
        assert_eq!(def.inverse.as_deref(), Some("codes"));
    }
}
