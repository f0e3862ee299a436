//! Expression tree.
//!
//! Nodes are plain values: built per call, compiled once, then dropped.

use std::fmt;

use crate::clause::SelectClause;
use crate::record::RecordDescriptor;
use crate::value::Value;

/// A field of a record type, as referenced from a query
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub record: &'static RecordDescriptor,
    pub field: &'static str,
}

impl ColumnRef {
    pub fn new(record: &'static RecordDescriptor, field: &'static str) -> Self {
        Self { record, field }
    }

    /// The same field name owned by another record type (shadow or composed types).
    pub fn cast(self, record: &'static RecordDescriptor) -> Self {
        Self {
            record,
            field: self.field,
        }
    }
}

impl fmt::Debug for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.record.name, self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // String matching
    Like,
    NotLike,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Concat,
}

impl BinaryOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::NotLike => "NOT LIKE",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulus => "%",
            BinaryOperator::Concat => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Calendar unit for date functions and intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    pub fn keyword(&self) -> &'static str {
        match self {
            DatePart::Year => "YEAR",
            DatePart::Month => "MONTH",
            DatePart::Day => "DAY",
            DatePart::Hour => "HOUR",
            DatePart::Minute => "MINUTE",
            DatePart::Second => "SECOND",
        }
    }

    /// Length in seconds, months and years approximated as 30 and 365 days
    pub fn seconds(&self) -> i64 {
        match self {
            DatePart::Year => 365 * 86_400,
            DatePart::Month => 30 * 86_400,
            DatePart::Day => 86_400,
            DatePart::Hour => 3_600,
            DatePart::Minute => 60,
            DatePart::Second => 1,
        }
    }
}

/// Right-hand side of an IN predicate
#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Values(Vec<Value>),
    Expressions(Vec<Expr>),
    Select(Box<SelectClause>),
}

/// Expression types
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Field reference, resolved to a column, a computed definition or an override
    Column(ColumnRef),

    /// Value inlined into the SQL text
    Literal(Value),

    /// Value bound through a placeholder
    Bound(Value),

    /// Value of a record field bound through a placeholder (INSERT/UPDATE)
    FieldValue { field: &'static str, value: Value },

    Interval { amount: i64, unit: DatePart },

    /// `*`, as in COUNT(*)
    Wildcard,

    FunctionCall { name: String, args: Vec<Expr> },

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// AND/OR over any number of operands
    Logical {
        op: LogicalOperator,
        operands: Vec<Expr>,
    },

    Not(Box<Expr>),

    IsNull { expr: Box<Expr>, negated: bool },

    In {
        expr: Box<Expr>,
        list: InList,
        negated: bool,
    },

    /// Simple form when `operand` is set, searched form otherwise
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Full-text predicate
    Match { columns: Vec<Expr>, query: String },

    /// Full-text relevance score
    Rank { columns: Vec<Expr>, query: String },

    DatePart { part: DatePart, expr: Box<Expr> },

    DateTrunc { part: DatePart, expr: Box<Expr> },

    EpochSeconds(Box<Expr>),

    Subquery(Box<SelectClause>),

    Exists(Box<SelectClause>),
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn col(record: &'static RecordDescriptor, field: &'static str) -> Self {
        Expr::Column(ColumnRef::new(record, field))
    }

    pub fn bound(value: impl Into<Value>) -> Self {
        Expr::Bound(value.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Expr::FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    pub fn count_all() -> Self {
        Expr::function("COUNT", vec![Expr::Wildcard])
    }

    pub fn interval(amount: i64, unit: DatePart) -> Self {
        Expr::Interval { amount, unit }
    }

    pub fn binary(self, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(self, right: Expr) -> Self {
        self.binary(BinaryOperator::Equal, right)
    }

    pub fn ne(self, right: Expr) -> Self {
        self.binary(BinaryOperator::NotEqual, right)
    }

    pub fn lt(self, right: Expr) -> Self {
        self.binary(BinaryOperator::LessThan, right)
    }

    pub fn le(self, right: Expr) -> Self {
        self.binary(BinaryOperator::LessThanOrEqual, right)
    }

    pub fn gt(self, right: Expr) -> Self {
        self.binary(BinaryOperator::GreaterThan, right)
    }

    pub fn ge(self, right: Expr) -> Self {
        self.binary(BinaryOperator::GreaterThanOrEqual, right)
    }

    pub fn like(self, right: Expr) -> Self {
        self.binary(BinaryOperator::Like, right)
    }

    /// Conjunction; nested ANDs are flattened into one node.
    pub fn and(self, right: Expr) -> Self {
        Expr::logical(LogicalOperator::And, vec![self, right])
    }

    /// Disjunction; nested ORs are flattened into one node.
    pub fn or(self, right: Expr) -> Self {
        Expr::logical(LogicalOperator::Or, vec![self, right])
    }

    pub fn all(operands: Vec<Expr>) -> Self {
        Expr::logical(LogicalOperator::And, operands)
    }

    pub fn any(operands: Vec<Expr>) -> Self {
        Expr::logical(LogicalOperator::Or, operands)
    }

    fn logical(op: LogicalOperator, operands: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                Expr::Logical {
                    op: inner,
                    operands,
                } if inner == op => flat.extend(operands),
                other => flat.push(other),
            }
        }
        Expr::Logical { op, operands: flat }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn in_values(self, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(self),
            list: InList::Values(values),
            negated: false,
        }
    }

    pub fn not_in_values(self, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(self),
            list: InList::Values(values),
            negated: true,
        }
    }

    pub fn in_select(self, select: SelectClause) -> Self {
        Expr::In {
            expr: Box::new(self),
            list: InList::Select(Box::new(select)),
            negated: false,
        }
    }

    /// Records referenced by this expression, for FROM resolution.
    ///
    /// Nested selects resolve their own FROM lists and report nothing here.
    pub fn collect_records(&self, out: &mut Vec<&'static RecordDescriptor>) {
        match self {
            Expr::Column(col) => push_record(out, col.record),
            Expr::Literal(_)
            | Expr::Bound(_)
            | Expr::FieldValue { .. }
            | Expr::Interval { .. }
            | Expr::Wildcard
            | Expr::Subquery(_)
            | Expr::Exists(_) => {}
            Expr::FunctionCall { args, .. } => {
                args.iter().for_each(|a| a.collect_records(out));
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_records(out);
                right.collect_records(out);
            }
            Expr::Logical { operands, .. } => {
                operands.iter().for_each(|o| o.collect_records(out));
            }
            Expr::Not(inner) | Expr::EpochSeconds(inner) => inner.collect_records(out),
            Expr::IsNull { expr, .. }
            | Expr::DatePart { expr, .. }
            | Expr::DateTrunc { expr, .. } => expr.collect_records(out),
            Expr::In { expr, list, .. } => {
                expr.collect_records(out);
                if let InList::Expressions(items) = list {
                    items.iter().for_each(|i| i.collect_records(out));
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    operand.collect_records(out);
                }
                for (when, then) in when_clauses {
                    when.collect_records(out);
                    then.collect_records(out);
                }
                if let Some(else_clause) = else_clause {
                    else_clause.collect_records(out);
                }
            }
            Expr::Match { columns, .. } | Expr::Rank { columns, .. } => {
                columns.iter().for_each(|c| c.collect_records(out));
            }
        }
    }
}

pub(crate) fn push_record(out: &mut Vec<&'static RecordDescriptor>, record: &'static RecordDescriptor) {
    if !out.iter().any(|r| *r == record) {
        out.push(record);
    }
}
