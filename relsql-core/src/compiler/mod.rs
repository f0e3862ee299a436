//! SQL compiler.
//!
//! One traversal of a statement emits a stream of text fragments and
//! placeholder tokens. Rendering the stream yields the SQL text and the
//! bindings together, so the two cannot disagree on parameter order.

use chrono::SecondsFormat;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{push_record, ColumnRef, Expr, InList, LogicalOperator};
use crate::clause::{
    CreateIndexClause, DeleteClause, DropIndexClause, FieldOverride, InsertClause, SelectClause,
    Selection, Statement, UpdateClause,
};
use crate::dialect::Dialect;
use crate::error::{SqlError, SqlResult};
use crate::record::{FieldKind, RecordDescriptor};
use crate::statement::{Binding, CompiledStatement, Token};
use crate::value::Value;


static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern"));

/// Index names arrive as free text; only plain identifiers are accepted.
pub fn validate_identifier(name: &str) -> SqlResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SqlError::InvalidIdentifier(name.to_string()))
    }
}

/// Compile any statement for `dialect`.
pub fn compile(statement: &Statement, dialect: &dyn Dialect) -> SqlResult<CompiledStatement> {
    let mut compiler = Compiler::new(dialect);
    compiler.statement(statement)?;
    Ok(compiler.finish())
}

pub fn compile_select(select: &SelectClause, dialect: &dyn Dialect) -> SqlResult<CompiledStatement> {
    let mut compiler = Compiler::new(dialect);
    compiler.select(select, true)?;
    Ok(compiler.finish())
}

/// Record types visible to one SELECT (or mutation) and their aliases
struct Scope {
    records: Vec<(&'static RecordDescriptor, String)>,
    selected: &'static RecordDescriptor,
    overrides: Vec<FieldOverride>,
    /// Qualify columns with the table alias
    abbreviate: bool,
}

impl Scope {
    fn alias_of(&self, record: &RecordDescriptor) -> Option<&str> {
        self.records
            .iter()
            .find(|(r, _)| *r == record)
            .map(|(_, alias)| alias.as_str())
    }
}

pub struct Compiler<'d> {
    dialect: &'d dyn Dialect,
    tokens: Vec<Token>,
    scopes: Vec<Scope>,
    next_alias: usize,
    overrides_enabled: bool,
}

impl<'d> Compiler<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            tokens: Vec::new(),
            scopes: Vec::new(),
            next_alias: 0,
            overrides_enabled: true,
        }
    }

    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    pub fn finish(self) -> CompiledStatement {
        CompiledStatement::from_tokens(self.tokens, self.dialect)
    }

    pub fn push(&mut self, text: &str) {
        match self.tokens.last_mut() {
            Some(Token::Text(last)) => last.push_str(text),
            _ => self.tokens.push(Token::Text(text.to_string())),
        }
    }

    pub fn bind(&mut self, binding: Binding) {
        self.tokens.push(Token::Param(binding));
    }

    pub fn bind_value(&mut self, value: Value) {
        self.bind(Binding::Value(value));
    }

    pub fn quoted(&mut self, ident: &str) {
        let quoted = self.dialect.quote_identifier(ident);
        self.push(&quoted);
    }

    /// Comma-separated expressions
    pub fn expr_list(&mut self, exprs: &[Expr]) -> SqlResult<()> {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(expr)?;
        }
        Ok(())
    }

    pub fn statement(&mut self, statement: &Statement) -> SqlResult<()> {
        match statement {
            Statement::Select(select) => self.select(select, true),
            Statement::Insert(insert) => self.insert(insert),
            Statement::Update(update) => self.update(update),
            Statement::Delete(delete) => self.delete(delete),
            Statement::CreateIndex(index) => self.create_index(index),
            Statement::DropIndex(index) => self.drop_index(index),
        }
    }

    fn next_alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn in_scope(&self, record: &RecordDescriptor) -> bool {
        self.scopes.iter().any(|s| s.alias_of(record).is_some())
    }

    fn table_of(record: &RecordDescriptor) -> SqlResult<&'static str> {
        record.table().ok_or_else(|| {
            SqlError::invalid_clause(format!("{} is computed and has no table", record.name))
        })
    }

    /// A scope for UPDATE/DELETE/INSERT: the target record only.
    fn mutation_scope(&mut self, record: &'static RecordDescriptor, abbreviate: bool) -> String {
        let alias = self.next_alias();
        self.scopes.push(Scope {
            records: vec![(record, alias.clone())],
            selected: record,
            overrides: Vec::new(),
            abbreviate,
        });
        alias
    }

    // ==================== SELECT ====================

    fn select(&mut self, select: &SelectClause, top_level: bool) -> SqlResult<()> {
        if self.in_scope(select.record) {
            return Err(SqlError::invalid_clause(format!(
                "{} is already selected by an enclosing query",
                select.record.name
            )));
        }

        let mut records = vec![select.record];
        for join in &select.joins {
            push_record(&mut records, join.record);
        }
        let mut referenced = select.referenced_records();
        for join in &select.joins {
            join.on.collect_records(&mut referenced);
        }
        for record in referenced {
            if !self.in_scope(record) {
                push_record(&mut records, record);
            }
        }

        let records = records
            .into_iter()
            .map(|record| (record, self.next_alias()))
            .collect();
        self.scopes.push(Scope {
            records,
            selected: select.record,
            overrides: select.overrides.clone(),
            abbreviate: true,
        });
        let result = self.select_body(select, top_level);
        self.scopes.pop();
        result
    }

    fn select_body(&mut self, select: &SelectClause, top_level: bool) -> SqlResult<()> {
        // grouped or distinct rows are counted over the select as written
        if select.selection == Selection::Count && (select.group_by.is_some() || select.distinct) {
            let rows = SelectClause {
                selection: Selection::Fields,
                ..select.clone()
            };
            self.push("SELECT COUNT(*) FROM (");
            self.select_body(&rows, true)?;
            self.push(") sub");
            return Ok(());
        }

        self.push("SELECT ");
        if select.distinct {
            self.push("DISTINCT ");
        }

        if select.selection == Selection::Count {
            self.push("COUNT(*)");
        } else {
            for (i, field) in select.output_fields().into_iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                match select.definition_for(field) {
                    Some(definition) => self.expr(&definition.expr)?,
                    None => self.column(ColumnRef::new(select.record, field))?,
                }
                if top_level {
                    self.push(" AS ");
                    self.quoted(field);
                }
            }
        }

        self.from_list(select)?;

        if let Some(where_clause) = &select.where_clause {
            self.push(" WHERE ");
            self.expr(&where_clause.condition)?;
        }

        if let Some(group_by) = &select.group_by {
            self.push(" GROUP BY ");
            self.expr_list(&group_by.expressions)?;
        }

        if let Some(order_by) = &select.order_by {
            self.push(" ORDER BY ");
            for (i, item) in order_by.items.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(&item.expr)?;
                self.push(if item.descending { " DESC" } else { " ASC" });
            }
        }

        if let Some(limit) = &select.limit {
            self.push(" LIMIT ");
            self.bind(Binding::Integer(bound_integer("LIMIT", limit.count)?));
            if let Some(offset) = limit.offset {
                self.push(" OFFSET ");
                self.bind(Binding::Integer(bound_integer("OFFSET", offset)?));
            }
        }

        if select.for_update && self.dialect.supports_for_update() {
            self.push(" FOR UPDATE");
        }
        Ok(())
    }

    /// FROM: every table of the current scope not brought in by a JOIN, then the JOINs.
    fn from_list(&mut self, select: &SelectClause) -> SqlResult<()> {
        let tables: Vec<(&'static str, String)> = match self.scopes.last() {
            Some(scope) => scope
                .records
                .iter()
                .filter(|(record, _)| {
                    !record.is_computed() && !select.joins.iter().any(|j| j.record == *record)
                })
                .filter_map(|(record, alias)| record.table().map(|t| (t, alias.clone())))
                .collect(),
            None => Vec::new(),
        };

        if tables.is_empty() {
            if select.joins.is_empty() {
                return Ok(());
            }
            return Err(SqlError::invalid_clause(format!(
                "{} has no table to join against",
                select.record.name
            )));
        }

        self.push(" FROM ");
        for (i, (table, alias)) in tables.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.quoted(table);
            self.push(" ");
            self.push(alias);
        }

        for join in &select.joins {
            let table = Self::table_of(join.record)?;
            let alias = self.alias_of(join.record)?;
            self.push(" ");
            self.push(join.kind.sql());
            self.push(" ");
            self.quoted(table);
            self.push(" ");
            self.push(&alias);
            self.push(" ON ");
            self.expr(&join.on)?;
        }
        Ok(())
    }

    fn alias_of(&self, record: &RecordDescriptor) -> SqlResult<String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.alias_of(record))
            .map(str::to_string)
            .ok_or_else(|| SqlError::UnknownRecord(record.name.to_string()))
    }

    // ==================== Columns ====================

    fn column(&mut self, col: ColumnRef) -> SqlResult<()> {
        let field = col.record.require_field(col.field)?;
        let scope_index = self
            .scopes
            .iter()
            .rposition(|s| s.alias_of(col.record).is_some());

        if self.overrides_enabled {
            let body = scope_index
                .map(|i| &self.scopes[i])
                .filter(|scope| scope.selected == col.record)
                .and_then(|scope| scope.overrides.iter().find(|o| o.field == col.field))
                .map(|o| o.expr.clone());
            if let Some(body) = body {
                self.overrides_enabled = false;
                let result = self.operand(&body);
                self.overrides_enabled = true;
                return result;
            }
        }

        if let FieldKind::Computed {
            definition,
            required,
        } = field.kind
        {
            return match definition {
                Some(sql) => {
                    self.push("(");
                    self.push(sql);
                    self.push(")");
                    Ok(())
                }
                None if !required && col.record.is_computed() => {
                    self.push("NULL");
                    Ok(())
                }
                None => Err(SqlError::invalid_clause(format!(
                    "computed field {}.{} has no definition",
                    col.record.name, col.field
                ))),
            };
        }

        if col.record.is_computed() {
            return Err(SqlError::invalid_clause(format!(
                "{}.{} has no column to read",
                col.record.name, col.field
            )));
        }

        let scope = scope_index
            .map(|i| &self.scopes[i])
            .ok_or_else(|| SqlError::UnknownRecord(col.record.name.to_string()))?;
        if scope.abbreviate {
            let alias = scope.alias_of(col.record).unwrap_or_default().to_string();
            self.push(&alias);
            self.push(".");
        }
        self.quoted(field.column);
        Ok(())
    }

    // ==================== Expressions ====================

    pub fn expr(&mut self, expr: &Expr) -> SqlResult<()> {
        let dialect = self.dialect;
        match expr {
            Expr::Column(col) => self.column(*col),
            Expr::Literal(value) => self.literal(value),
            Expr::Bound(value) => {
                self.bind_value(value.clone());
                Ok(())
            }
            Expr::FieldValue { field, value } => {
                self.bind(Binding::Field {
                    field: *field,
                    value: value.clone(),
                });
                Ok(())
            }
            Expr::Interval { amount, unit } => dialect.write_interval(self, *amount, *unit),
            Expr::Wildcard => {
                self.push("*");
                Ok(())
            }
            Expr::FunctionCall { name, args } => {
                self.push(name);
                self.push("(");
                self.expr_list(args)?;
                self.push(")");
                Ok(())
            }
            Expr::BinaryOp { left, op, right } => {
                self.operand(left)?;
                self.push(" ");
                self.push(op.sql());
                self.push(" ");
                self.operand(right)
            }
            Expr::Logical { op, operands } => self.logical(*op, operands),
            Expr::Not(inner) => {
                self.push("NOT ");
                self.operand(inner)
            }
            Expr::IsNull { expr, negated } => {
                self.operand(expr)?;
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
                Ok(())
            }
            Expr::In {
                expr,
                list,
                negated,
            } => self.in_predicate(expr, list, *negated),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if when_clauses.is_empty() {
                    return Err(SqlError::invalid_clause("CASE without WHEN"));
                }
                self.push("CASE");
                if let Some(operand) = operand {
                    self.push(" ");
                    self.expr(operand)?;
                }
                for (when, then) in when_clauses {
                    self.push(" WHEN ");
                    self.expr(when)?;
                    self.push(" THEN ");
                    self.expr(then)?;
                }
                if let Some(else_clause) = else_clause {
                    self.push(" ELSE ");
                    self.expr(else_clause)?;
                }
                self.push(" END");
                Ok(())
            }
            Expr::Match { columns, query } => dialect.write_match(self, columns, query),
            Expr::Rank { columns, query } => dialect.write_rank(self, columns, query),
            Expr::DatePart { part, expr } => dialect.write_date_part(self, *part, expr),
            Expr::DateTrunc { part, expr } => dialect.write_date_trunc(self, *part, expr),
            Expr::EpochSeconds(inner) => dialect.write_epoch_seconds(self, inner),
            Expr::Subquery(select) => {
                self.push("(");
                self.select(select, false)?;
                self.push(")");
                Ok(())
            }
            Expr::Exists(select) => {
                self.push("EXISTS (");
                self.select(select, false)?;
                self.push(")");
                Ok(())
            }
        }
    }

    /// Render a child of an operator, parenthesized when it is itself an operator.
    fn operand(&mut self, expr: &Expr) -> SqlResult<()> {
        if is_composite(expr) {
            self.push("(");
            self.expr(expr)?;
            self.push(")");
            Ok(())
        } else {
            self.expr(expr)
        }
    }

    fn logical(&mut self, op: LogicalOperator, operands: &[Expr]) -> SqlResult<()> {
        match operands {
            [] => {
                self.push(match op {
                    LogicalOperator::And => "1 = 1",
                    LogicalOperator::Or => "1 = 0",
                });
                Ok(())
            }
            [single] => self.expr(single),
            _ => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        self.push(" ");
                        self.push(op.sql());
                        self.push(" ");
                    }
                    if groups_in_logical(operand) {
                        self.push("(");
                        self.expr(operand)?;
                        self.push(")");
                    } else {
                        self.expr(operand)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn in_predicate(&mut self, expr: &Expr, list: &InList, negated: bool) -> SqlResult<()> {
        let keyword = if negated { " NOT IN (" } else { " IN (" };
        match list {
            InList::Values(values) if values.is_empty() => {
                self.push(if negated { "TRUE" } else { "FALSE" });
                Ok(())
            }
            InList::Values(values) if self.dialect.binds_in_as_array() => {
                self.operand(expr)?;
                self.push(if negated { " <> ALL(" } else { " = ANY(" });
                self.bind_value(Value::Array(values.clone()));
                self.push(")");
                Ok(())
            }
            InList::Values(values) => {
                let chunks: Vec<&[Value]> = values.chunks(self.dialect.max_in_list().max(1)).collect();
                if chunks.len() > 1 {
                    self.push("(");
                }
                for (i, chunk) in chunks.iter().enumerate() {
                    if i > 0 {
                        self.push(if negated { " AND " } else { " OR " });
                    }
                    self.operand(expr)?;
                    self.push(keyword);
                    for (j, value) in chunk.iter().enumerate() {
                        if j > 0 {
                            self.push(", ");
                        }
                        self.bind_value(value.clone());
                    }
                    self.push(")");
                }
                if chunks.len() > 1 {
                    self.push(")");
                }
                Ok(())
            }
            InList::Expressions(items) if items.is_empty() => {
                self.push(if negated { "TRUE" } else { "FALSE" });
                Ok(())
            }
            InList::Expressions(items) => {
                self.operand(expr)?;
                self.push(keyword);
                self.expr_list(items)?;
                self.push(")");
                Ok(())
            }
            InList::Select(select) => {
                self.operand(expr)?;
                self.push(keyword);
                self.select(select, false)?;
                self.push(")");
                Ok(())
            }
        }
    }

    fn literal(&mut self, value: &Value) -> SqlResult<()> {
        match value {
            Value::Null => self.push("NULL"),
            Value::Bool(b) => self.push(if *b { "TRUE" } else { "FALSE" }),
            Value::Integer(i) => self.push(&i.to_string()),
            Value::Real(r) => self.push(&r.to_string()),
            Value::Text(s) => self.push(&quote_literal(s)),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                self.push(&format!("X'{}'", hex));
            }
            Value::Timestamp(t) => {
                self.push(&quote_literal(&t.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
            Value::Array(_) => {
                return Err(SqlError::Unsupported {
                    dialect: self.dialect.name(),
                    what: "array literal".to_string(),
                })
            }
        }
        Ok(())
    }

    // ==================== Mutations ====================

    fn insert(&mut self, insert: &InsertClause) -> SqlResult<()> {
        let table = Self::table_of(insert.record)?;
        self.push("INSERT INTO ");
        self.quoted(table);
        if insert.values.is_empty() {
            self.push(" DEFAULT VALUES");
            return Ok(());
        }

        self.push(" (");
        for (i, assignment) in insert.values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let column = Self::stored_column(insert.record, assignment.field)?;
            self.quoted(column);
        }
        self.push(") VALUES (");

        self.mutation_scope(insert.record, false);
        let mut result = Ok(());
        for (i, assignment) in insert.values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            result = self.expr(&assignment.value);
            if result.is_err() {
                break;
            }
        }
        self.scopes.pop();
        result?;
        self.push(")");
        Ok(())
    }

    fn update(&mut self, update: &UpdateClause) -> SqlResult<()> {
        let table = Self::table_of(update.record)?;
        if update.assignments.is_empty() {
            return Err(SqlError::invalid_clause(format!(
                "UPDATE of {} assigns nothing",
                update.record.name
            )));
        }

        let abbreviate = self.dialect.mutation_allows_alias();
        self.push("UPDATE ");
        self.quoted(table);
        let alias = self.mutation_scope(update.record, abbreviate);
        if abbreviate {
            self.push(" ");
            self.push(&alias);
        }
        let result = self.update_body(update);
        self.scopes.pop();
        result
    }

    fn update_body(&mut self, update: &UpdateClause) -> SqlResult<()> {
        self.push(" SET ");
        for (i, assignment) in update.assignments.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let column = Self::stored_column(update.record, assignment.field)?;
            self.quoted(column);
            self.push(" = ");
            self.expr(&assignment.value)?;
        }
        if let Some(where_clause) = &update.where_clause {
            self.push(" WHERE ");
            self.expr(&where_clause.condition)?;
        }
        Ok(())
    }

    fn delete(&mut self, delete: &DeleteClause) -> SqlResult<()> {
        let table = Self::table_of(delete.record)?;
        let abbreviate = self.dialect.mutation_allows_alias();
        self.push("DELETE FROM ");
        self.quoted(table);
        let alias = self.mutation_scope(delete.record, abbreviate);
        if abbreviate {
            self.push(" ");
            self.push(&alias);
        }
        let result = match &delete.where_clause {
            Some(where_clause) => {
                self.push(" WHERE ");
                self.expr(&where_clause.condition)
            }
            None => Ok(()),
        };
        self.scopes.pop();
        result
    }

    fn stored_column(record: &RecordDescriptor, field: &str) -> SqlResult<&'static str> {
        let descriptor = record.require_field(field)?;
        if descriptor.is_computed() {
            return Err(SqlError::invalid_clause(format!(
                "computed field {}.{} cannot be written",
                record.name, field
            )));
        }
        Ok(descriptor.column)
    }

    fn create_index(&mut self, index: &CreateIndexClause) -> SqlResult<()> {
        validate_identifier(&index.name)?;
        let table = Self::table_of(index.record)?;
        if index.fields.is_empty() {
            return Err(SqlError::invalid_clause(format!(
                "index {} has no fields",
                index.name
            )));
        }
        self.push("CREATE ");
        if index.unique {
            self.push("UNIQUE ");
        }
        self.push("INDEX ");
        if index.if_not_exists && self.dialect.supports_index_if_not_exists() {
            self.push("IF NOT EXISTS ");
        }
        self.quoted(&index.name);
        self.push(" ON ");
        self.quoted(table);
        self.push(" (");
        for (i, field) in index.fields.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let column = Self::stored_column(index.record, field)?;
            self.quoted(column);
        }
        self.push(")");
        Ok(())
    }

    fn drop_index(&mut self, index: &DropIndexClause) -> SqlResult<()> {
        validate_identifier(&index.name)?;
        self.push("DROP INDEX ");
        self.quoted(&index.name);
        if self.dialect.drop_index_needs_table() {
            let table = Self::table_of(index.record)?;
            self.push(" ON ");
            self.quoted(table);
        }
        Ok(())
    }
}

fn bound_integer(clause: &str, value: u64) -> SqlResult<i64> {
    i64::try_from(value)
        .map_err(|_| SqlError::invalid_clause(format!("{} {} is out of range", clause, value)))
}

fn is_composite(expr: &Expr) -> bool {
    match expr {
        Expr::Logical { operands, .. } => match operands.as_slice() {
            [single] => is_composite(single),
            _ => true,
        },
        Expr::BinaryOp { .. }
        | Expr::Not(_)
        | Expr::IsNull { .. }
        | Expr::In { .. }
        | Expr::Match { .. } => true,
        _ => false,
    }
}

/// Operands of AND/OR that need parentheses: a nested AND/OR of the other kind.
fn groups_in_logical(expr: &Expr) -> bool {
    match expr {
        Expr::Logical { operands, .. } => match operands.as_slice() {
            [single] => groups_in_logical(single),
            [] => false,
            _ => true,
        },
        Expr::Match { columns, .. } => columns.len() > 1,
        _ => false,
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
