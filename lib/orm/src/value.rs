use cuneiform_sql as sql;

use crate::record::Record;
use crate::schema::EnumId;

/// A field value as the record layer sees it.
///
/// `Enum` carries the enum type plus the variant's ordinal; `Record` holds
/// the referenced record in memory until it is saved and its id can stand
/// in for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Str(String),
    Enum(EnumId, i64),
    Record(Record),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Enum(_, _) => "enum",
            Value::Record(_) => "record",
        }
    }

    /// Marshal to a bound statement parameter. An enum value becomes its
    /// ordinal; a record reference becomes its id, or NULL while unsaved.
    pub(crate) fn to_param(&self) -> sql::Value {
        match self {
            Value::Null => sql::Value::Null,
            Value::Int(i) => sql::Value::Integer(*i),
            Value::Str(s) => sql::Value::Text(s.clone()),
            Value::Enum(_, ordinal) => sql::Value::Integer(*ordinal),
            Value::Record(r) => match r.id() {
                Some(id) => sql::Value::Integer(id),
                None => sql::Value::Null,
            },
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<&Record> for Value {
    fn from(r: &Record) -> Self {
        Value::Record(r.clone())
    }
}
