//! Predicate trees and their compilation to SQL.
//!
//! Comparisons come from the builder methods on [`crate::Field`]; `and`/`or`
//! combine them. Compilation walks the tree left to right and produces a
//! WHERE fragment with `?` placeholders, the parameters in placeholder
//! order, and the accumulated join edges in traversal order.

use cuneiform_sql as sql;

use crate::error::OrmError;
use crate::record::Record;
use crate::schema::{ModelId, Schema};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

/// One foreign-key hop between two tables, in either direction: forward
/// (column to `id`) or reverse (`id` to the referencing column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub source_table: String,
    pub target_table: String,
    pub source_column: String,
    pub target_column: String,
}

impl JoinEdge {
    fn render(&self) -> String {
        format!(
            "JOIN \"{}\" ON \"{}\".\"{}\" = \"{}\".\"{}\"",
            self.target_table,
            self.target_table,
            self.target_column,
            self.source_table,
            self.source_column
        )
    }
}

/// Reference to a bound field: the model plus the index into its field
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub(crate) model: ModelId,
    pub(crate) field: usize,
}

/// A field reached through one or more hops. The edge list is append-only
/// and keeps duplicates; identical edges collapse only when the JOIN clause
/// is rendered.
#[derive(Debug, Clone)]
pub struct JoinNode {
    pub(crate) edges: Vec<JoinEdge>,
    pub(crate) field: FieldRef,
}

/// Operand of a comparison: a field, a field behind joins, or a literal.
#[derive(Debug, Clone)]
pub enum Operand {
    Field(FieldRef),
    Join(JoinNode),
    Value(Value),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Operand {
        Operand::Value(v)
    }
}

impl From<i64> for Operand {
    fn from(i: i64) -> Operand {
        Operand::Value(Value::Int(i))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Operand {
        Operand::Value(Value::Str(s.to_string()))
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Operand {
        Operand::Value(Value::Str(s))
    }
}

impl From<Record> for Operand {
    fn from(r: Record) -> Operand {
        Operand::Value(Value::Record(r))
    }
}

impl From<&Record> for Operand {
    fn from(r: &Record) -> Operand {
        Operand::Value(Value::Record(r.clone()))
    }
}

/// Predicate tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Compare {
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }
}

/// A compiled WHERE clause.
#[derive(Debug)]
pub(crate) struct CompiledWhere {
    pub fragment: String,
    pub params: Vec<sql::Value>,
    pub joins: Vec<JoinEdge>,
}

impl CompiledWhere {
    /// JOIN clauses for the accumulated edges. Identical edges render once;
    /// distinct edges onto the same table are left alone (no aliasing).
    pub fn join_clause(&self) -> String {
        let mut seen: Vec<&JoinEdge> = Vec::new();
        let mut clauses = Vec::new();
        for edge in &self.joins {
            if seen.contains(&edge) {
                continue;
            }
            seen.push(edge);
            clauses.push(edge.render());
        }
        clauses.join(" ")
    }
}

pub(crate) fn compile(expr: &Expr, schema: &Schema) -> Result<CompiledWhere, OrmError> {
    let mut params = Vec::new();
    let mut joins = Vec::new();
    let fragment = compile_node(expr, schema, &mut params, &mut joins)?;
    Ok(CompiledWhere {
        fragment,
        params,
        joins,
    })
}

fn compile_node(
    expr: &Expr,
    schema: &Schema,
    params: &mut Vec<sql::Value>,
    joins: &mut Vec<JoinEdge>,
) -> Result<String, OrmError> {
    match expr {
        Expr::Compare { op, lhs, rhs } => {
            let l = compile_operand(lhs, schema, params, joins)?;
            let r = compile_operand(rhs, schema, params, joins)?;
            Ok(format!("{} {} {}", l, op.sql(), r))
        }
        Expr::And(a, b) => {
            let l = compile_grouped(a, schema, params, joins)?;
            let r = compile_grouped(b, schema, params, joins)?;
            Ok(format!("{} AND {}", l, r))
        }
        Expr::Or(a, b) => {
            let l = compile_grouped(a, schema, params, joins)?;
            let r = compile_grouped(b, schema, params, joins)?;
            Ok(format!("{} OR {}", l, r))
        }
    }
}

/// Compound children are parenthesized so the rendered clause keeps the
/// tree's grouping under SQL operator precedence.
fn compile_grouped(
    expr: &Expr,
    schema: &Schema,
    params: &mut Vec<sql::Value>,
    joins: &mut Vec<JoinEdge>,
) -> Result<String, OrmError> {
    let fragment = compile_node(expr, schema, params, joins)?;
    match expr {
        Expr::Compare { .. } => Ok(fragment),
        _ => Ok(format!("({})", fragment)),
    }
}

fn compile_operand(
    operand: &Operand,
    schema: &Schema,
    params: &mut Vec<sql::Value>,
    joins: &mut Vec<JoinEdge>,
) -> Result<String, OrmError> {
    match operand {
        Operand::Field(fr) => column_of(fr, schema),
        Operand::Join(node) => {
            joins.extend(node.edges.iter().cloned());
            column_of(&node.field, schema)
        }
        Operand::Value(v) => {
            params.push(v.to_param());
            Ok("?".to_string())
        }
    }
}

fn column_of(fr: &FieldRef, schema: &Schema) -> Result<String, OrmError> {
    let spec = schema.field(fr.model, fr.field);
    if spec.is_virtual {
        return Err(OrmError::Usage(format!(
            "\"{}\" is a reverse relation with no column; compare a field reached through it",
            spec.name
        )));
    }
    Ok(spec.qualified.clone())
}
