//! SQL dialects.
//!
//! Default methods render ANSI SQL; each dialect overrides what its database
//! spells differently. Methods that emit SQL write straight into the
//! [`Compiler`] so they can render nested expressions and bind parameters.

use serde::{Deserialize, Serialize};

use crate::ast::{DatePart, Expr};
use crate::compiler::Compiler;
use crate::error::{SqlError, SqlResult};
use crate::value::Value;

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Placeholder for the 1-based parameter `index`
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Largest IN list rendered as a single predicate
    fn max_in_list(&self) -> usize {
        500
    }

    /// Bind IN lists as one array parameter (`= ANY(?)`)
    fn binds_in_as_array(&self) -> bool {
        false
    }

    /// Table aliases are accepted in UPDATE and DELETE
    fn mutation_allows_alias(&self) -> bool {
        false
    }

    fn supports_for_update(&self) -> bool {
        true
    }

    fn supports_index_if_not_exists(&self) -> bool {
        true
    }

    fn drop_index_needs_table(&self) -> bool {
        false
    }

    /// Full-text predicate; the portable form is a LIKE per column.
    fn write_match(&self, c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        require_columns(columns)?;
        let pattern = contains_pattern(query);
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                c.push(" OR ");
            }
            c.expr(column)?;
            c.push(" LIKE ");
            c.bind_value(pattern.clone());
            c.push(LIKE_ESCAPE);
        }
        Ok(())
    }

    /// Full-text relevance; the portable form counts matching columns.
    fn write_rank(&self, c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        require_columns(columns)?;
        let pattern = contains_pattern(query);
        c.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                c.push(" + ");
            }
            c.push("CASE WHEN ");
            c.expr(column)?;
            c.push(" LIKE ");
            c.bind_value(pattern.clone());
            c.push(LIKE_ESCAPE);
            c.push(" THEN 1 ELSE 0 END");
        }
        c.push(")");
        Ok(())
    }

    fn write_date_part(&self, c: &mut Compiler<'_>, part: DatePart, expr: &Expr) -> SqlResult<()> {
        c.push("EXTRACT(");
        c.push(part.keyword());
        c.push(" FROM ");
        c.expr(expr)?;
        c.push(")");
        Ok(())
    }

    fn write_date_trunc(&self, c: &mut Compiler<'_>, part: DatePart, expr: &Expr) -> SqlResult<()> {
        c.push("DATE_TRUNC('");
        c.push(&part.keyword().to_lowercase());
        c.push("', ");
        c.expr(expr)?;
        c.push(")");
        Ok(())
    }

    fn write_epoch_seconds(&self, c: &mut Compiler<'_>, expr: &Expr) -> SqlResult<()> {
        c.push("EXTRACT(EPOCH FROM ");
        c.expr(expr)?;
        c.push(")");
        Ok(())
    }

    /// Intervals without native syntax render as a number of seconds.
    fn write_interval(&self, c: &mut Compiler<'_>, amount: i64, unit: DatePart) -> SqlResult<()> {
        let seconds = amount.checked_mul(unit.seconds()).ok_or_else(|| {
            SqlError::invalid_clause(format!(
                "interval of {} {} does not fit in seconds",
                amount,
                unit.keyword()
            ))
        })?;
        c.push(&seconds.to_string());
        Ok(())
    }
}

const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `%query%` with LIKE wildcards in `query` matched literally
fn contains_pattern(query: &str) -> Value {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Value::Text(pattern)
}

fn require_columns(columns: &[Expr]) -> SqlResult<()> {
    if columns.is_empty() {
        return Err(SqlError::invalid_clause(
            "full-text search needs at least one column",
        ));
    }
    Ok(())
}

/// ANSI SQL
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn strftime_part(part: DatePart) -> &'static str {
        match part {
            DatePart::Year => "%Y",
            DatePart::Month => "%m",
            DatePart::Day => "%d",
            DatePart::Hour => "%H",
            DatePart::Minute => "%M",
            DatePart::Second => "%S",
        }
    }

    fn strftime_start_of(part: DatePart) -> &'static str {
        match part {
            DatePart::Year => "%Y-01-01 00:00:00",
            DatePart::Month => "%Y-%m-01 00:00:00",
            DatePart::Day => "%Y-%m-%d 00:00:00",
            DatePart::Hour => "%Y-%m-%d %H:00:00",
            DatePart::Minute => "%Y-%m-%d %H:%M:00",
            DatePart::Second => "%Y-%m-%d %H:%M:%S",
        }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    // SQLite's default compile-time limit on host parameters
    fn max_in_list(&self) -> usize {
        999
    }

    fn supports_for_update(&self) -> bool {
        false
    }

    fn write_date_part(&self, c: &mut Compiler<'_>, part: DatePart, expr: &Expr) -> SqlResult<()> {
        c.push("CAST(strftime('");
        c.push(Self::strftime_part(part));
        c.push("', ");
        c.expr(expr)?;
        c.push(") AS INTEGER)");
        Ok(())
    }

    fn write_date_trunc(&self, c: &mut Compiler<'_>, part: DatePart, expr: &Expr) -> SqlResult<()> {
        c.push("strftime('");
        c.push(Self::strftime_start_of(part));
        c.push("', ");
        c.expr(expr)?;
        c.push(")");
        Ok(())
    }

    fn write_epoch_seconds(&self, c: &mut Compiler<'_>, expr: &Expr) -> SqlResult<()> {
        c.push("CAST(strftime('%s', ");
        c.expr(expr)?;
        c.push(") AS INTEGER)");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn tsvector(c: &mut Compiler<'_>, columns: &[Expr]) -> SqlResult<()> {
        require_columns(columns)?;
        c.push("to_tsvector(concat_ws(' ', ");
        c.expr_list(columns)?;
        c.push("))");
        Ok(())
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn binds_in_as_array(&self) -> bool {
        true
    }

    fn mutation_allows_alias(&self) -> bool {
        true
    }

    fn write_match(&self, c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        Self::tsvector(c, columns)?;
        c.push(" @@ plainto_tsquery(");
        c.bind_value(Value::from(query));
        c.push(")");
        Ok(())
    }

    fn write_rank(&self, c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        c.push("ts_rank(");
        Self::tsvector(c, columns)?;
        c.push(", plainto_tsquery(");
        c.bind_value(Value::from(query));
        c.push("))");
        Ok(())
    }

    fn write_interval(&self, c: &mut Compiler<'_>, amount: i64, unit: DatePart) -> SqlResult<()> {
        c.push(&format!(
            "INTERVAL '{} {}s'",
            amount,
            unit.keyword().to_lowercase()
        ));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn match_against(c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        require_columns(columns)?;
        c.push("MATCH (");
        c.expr_list(columns)?;
        c.push(") AGAINST (");
        c.bind_value(Value::from(query));
        c.push(" IN NATURAL LANGUAGE MODE)");
        Ok(())
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn supports_index_if_not_exists(&self) -> bool {
        false
    }

    fn drop_index_needs_table(&self) -> bool {
        true
    }

    fn write_match(&self, c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        Self::match_against(c, columns, query)
    }

    // MATCH ... AGAINST evaluates to the relevance score outside WHERE
    fn write_rank(&self, c: &mut Compiler<'_>, columns: &[Expr], query: &str) -> SqlResult<()> {
        Self::match_against(c, columns, query)
    }

    fn write_date_trunc(&self, c: &mut Compiler<'_>, part: DatePart, expr: &Expr) -> SqlResult<()> {
        let format = match part {
            DatePart::Year => "%Y-01-01 00:00:00",
            DatePart::Month => "%Y-%m-01 00:00:00",
            DatePart::Day => "%Y-%m-%d 00:00:00",
            DatePart::Hour => "%Y-%m-%d %H:00:00",
            DatePart::Minute => "%Y-%m-%d %H:%i:00",
            DatePart::Second => "%Y-%m-%d %H:%i:%s",
        };
        c.push("DATE_FORMAT(");
        c.expr(expr)?;
        c.push(", '");
        c.push(format);
        c.push("')");
        Ok(())
    }

    fn write_epoch_seconds(&self, c: &mut Compiler<'_>, expr: &Expr) -> SqlResult<()> {
        c.push("UNIX_TIMESTAMP(");
        c.expr(expr)?;
        c.push(")");
        Ok(())
    }

    fn write_interval(&self, c: &mut Compiler<'_>, amount: i64, unit: DatePart) -> SqlResult<()> {
        c.push(&format!("INTERVAL {} {}", amount, unit.keyword()));
        Ok(())
    }
}

/// Dialect selector used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Generic,
    #[default]
    Sqlite,
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DialectKind::Generic => &GenericDialect,
            DialectKind::Sqlite => &SqliteDialect,
            DialectKind::Postgres => &PostgresDialect,
            DialectKind::MySql => &MySqlDialect,
        }
    }
}

impl std::str::FromStr for DialectKind {
    type Err = SqlError;

    fn from_str(s: &str) -> SqlResult<Self> {
        match s.to_lowercase().as_str() {
            "generic" | "ansi" => Ok(DialectKind::Generic),
            "sqlite" => Ok(DialectKind::Sqlite),
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::MySql),
            other => Err(SqlError::invalid_clause(format!(
                "unknown dialect '{}'",
                other
            ))),
        }
    }
}
