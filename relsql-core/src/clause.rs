//! Clause types: the structural fragments a statement is assembled from.

use crate::ast::{push_record, Expr};
use crate::error::{SqlError, SqlResult};
use crate::record::{Record, RecordDescriptor};

/// WHERE expression
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub condition: Expr,
}

impl WhereClause {
    pub fn new(condition: Expr) -> Self {
        Self { condition }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
}

impl JoinKind {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
        }
    }
}

/// [INNER|LEFT OUTER|RIGHT OUTER] JOIN record ON condition
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub record: &'static RecordDescriptor,
    pub on: Expr,
}

impl JoinClause {
    pub fn inner(record: &'static RecordDescriptor, on: Expr) -> Self {
        Self {
            kind: JoinKind::Inner,
            record,
            on,
        }
    }

    pub fn left(record: &'static RecordDescriptor, on: Expr) -> Self {
        Self {
            kind: JoinKind::LeftOuter,
            record,
            on,
        }
    }

    pub fn right(record: &'static RecordDescriptor, on: Expr) -> Self {
        Self {
            kind: JoinKind::RightOuter,
            record,
            on,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupByClause {
    pub expressions: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub descending: bool,
}

/// ORDER BY expression [ASC|DESC], ...
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub items: Vec<OrderItem>,
}

impl OrderByClause {
    pub fn asc(expr: Expr) -> Self {
        Self {
            items: vec![OrderItem {
                expr,
                descending: false,
            }],
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            items: vec![OrderItem {
                expr,
                descending: true,
            }],
        }
    }

    pub fn then(mut self, expr: Expr, descending: bool) -> Self {
        self.items.push(OrderItem { expr, descending });
        self
    }
}

/// LIMIT count [OFFSET offset]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitClause {
    pub count: u64,
    pub offset: Option<u64>,
}

/// Replaces every reference to `field` of the selected record within the query.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOverride {
    pub field: &'static str,
    pub expr: Expr,
}

/// Supplies the select-list expression for `field` only.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub field: &'static str,
    pub expr: Expr,
}

/// What a SELECT returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every field of the record, in descriptor order
    Fields,
    /// Primary-key fields only
    Keys,
    /// COUNT(*)
    Count,
}

/// One building block handed to [`SelectClause::from_parts`]
#[derive(Debug, Clone, PartialEq)]
pub enum SelectPart {
    Where(WhereClause),
    Join(JoinClause),
    GroupBy(GroupByClause),
    OrderBy(OrderByClause),
    Limit(LimitClause),
    ForUpdate,
    Distinct,
    Override(FieldOverride),
    Definition(FieldDefinition),
}

impl From<WhereClause> for SelectPart {
    fn from(c: WhereClause) -> Self {
        SelectPart::Where(c)
    }
}

impl From<JoinClause> for SelectPart {
    fn from(c: JoinClause) -> Self {
        SelectPart::Join(c)
    }
}

impl From<GroupByClause> for SelectPart {
    fn from(c: GroupByClause) -> Self {
        SelectPart::GroupBy(c)
    }
}

impl From<OrderByClause> for SelectPart {
    fn from(c: OrderByClause) -> Self {
        SelectPart::OrderBy(c)
    }
}

impl From<LimitClause> for SelectPart {
    fn from(c: LimitClause) -> Self {
        SelectPart::Limit(c)
    }
}

impl From<FieldOverride> for SelectPart {
    fn from(c: FieldOverride) -> Self {
        SelectPart::Override(c)
    }
}

impl From<FieldDefinition> for SelectPart {
    fn from(c: FieldDefinition) -> Self {
        SelectPart::Definition(c)
    }
}

/// SELECT against one record type.
///
/// Holds at most one of each singular clause, any number of joins and
/// definitions, and at most one override per field.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub record: &'static RecordDescriptor,
    pub selection: Selection,
    pub where_clause: Option<WhereClause>,
    pub joins: Vec<JoinClause>,
    pub group_by: Option<GroupByClause>,
    pub order_by: Option<OrderByClause>,
    pub limit: Option<LimitClause>,
    pub for_update: bool,
    pub distinct: bool,
    pub overrides: Vec<FieldOverride>,
    pub definitions: Vec<FieldDefinition>,
}

impl SelectClause {
    pub fn new(record: &'static RecordDescriptor) -> Self {
        Self {
            record,
            selection: Selection::Fields,
            where_clause: None,
            joins: Vec::new(),
            group_by: None,
            order_by: None,
            limit: None,
            for_update: false,
            distinct: false,
            overrides: Vec::new(),
            definitions: Vec::new(),
        }
    }

    pub fn from_parts<I>(record: &'static RecordDescriptor, parts: I) -> SqlResult<Self>
    where
        I: IntoIterator<Item = SelectPart>,
    {
        parts
            .into_iter()
            .try_fold(Self::new(record), |select, part| select.with(part))
    }

    /// Add one part; a second singular clause of the same kind is an error.
    pub fn with(mut self, part: impl Into<SelectPart>) -> SqlResult<Self> {
        match part.into() {
            SelectPart::Where(c) => set_once(&mut self.where_clause, c, "WHERE")?,
            SelectPart::Join(c) => self.joins.push(c),
            SelectPart::GroupBy(c) => set_once(&mut self.group_by, c, "GROUP BY")?,
            SelectPart::OrderBy(c) => set_once(&mut self.order_by, c, "ORDER BY")?,
            SelectPart::Limit(c) => set_once(&mut self.limit, c, "LIMIT")?,
            SelectPart::ForUpdate => set_flag(&mut self.for_update, "FOR UPDATE")?,
            SelectPart::Distinct => set_flag(&mut self.distinct, "DISTINCT")?,
            SelectPart::Override(c) => {
                if self.overrides.iter().any(|o| o.field == c.field) {
                    return Err(SqlError::invalid_clause(format!(
                        "field '{}' is overridden twice",
                        c.field
                    )));
                }
                self.overrides.push(c);
            }
            SelectPart::Definition(c) => self.definitions.push(c),
        }
        Ok(self)
    }

    pub fn filter(self, condition: Expr) -> SqlResult<Self> {
        self.with(WhereClause::new(condition))
    }

    pub fn order_by(self, clause: OrderByClause) -> SqlResult<Self> {
        self.with(clause)
    }

    pub fn limit(self, count: u64, offset: Option<u64>) -> SqlResult<Self> {
        self.with(LimitClause { count, offset })
    }

    pub fn uses_overrides(&self) -> bool {
        !self.overrides.is_empty() || !self.definitions.is_empty()
    }

    /// Field names of the result columns, in order.
    pub fn output_fields(&self) -> Vec<&'static str> {
        match self.selection {
            Selection::Fields => self.record.field_names(),
            Selection::Keys => self.record.primary_key.to_vec(),
            Selection::Count => vec!["count"],
        }
    }

    /// Same filter, joins, ordering and limit, returning key columns only.
    pub fn keys_only(&self) -> Self {
        Self {
            selection: Selection::Keys,
            ..self.clone()
        }
    }

    /// COUNT(*) of the rows this select returns.
    ///
    /// A grouped or DISTINCT select keeps its ORDER BY and LIMIT and is
    /// counted as a subquery; otherwise both are dropped.
    pub fn count(&self) -> Self {
        let rows_as_written = self.group_by.is_some() || self.distinct;
        Self {
            selection: Selection::Count,
            order_by: self.order_by.clone().filter(|_| rows_as_written),
            limit: self.limit.filter(|_| rows_as_written),
            for_update: false,
            ..self.clone()
        }
    }

    pub fn override_for(&self, field: &str) -> Option<&FieldOverride> {
        self.overrides.iter().find(|o| o.field == field)
    }

    pub fn definition_for(&self, field: &str) -> Option<&FieldDefinition> {
        self.definitions.iter().find(|d| d.field == field)
    }

    /// Records referenced outside the join list, for FROM resolution.
    pub fn referenced_records(&self) -> Vec<&'static RecordDescriptor> {
        let mut out = Vec::new();
        for o in &self.overrides {
            o.expr.collect_records(&mut out);
        }
        for d in &self.definitions {
            d.expr.collect_records(&mut out);
        }
        if let Some(w) = &self.where_clause {
            w.condition.collect_records(&mut out);
        }
        if let Some(g) = &self.group_by {
            g.expressions.iter().for_each(|e| e.collect_records(&mut out));
        }
        if let Some(o) = &self.order_by {
            o.items.iter().for_each(|i| i.expr.collect_records(&mut out));
        }
        out
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, kind: &str) -> SqlResult<()> {
    if slot.is_some() {
        return Err(SqlError::invalid_clause(format!(
            "SELECT already has a {} clause",
            kind
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn set_flag(flag: &mut bool, kind: &str) -> SqlResult<()> {
    if *flag {
        return Err(SqlError::invalid_clause(format!(
            "SELECT already has a {} clause",
            kind
        )));
    }
    *flag = true;
    Ok(())
}

/// SET field = expression
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: &'static str,
    pub value: Expr,
}

impl Assignment {
    pub fn new(field: &'static str, value: Expr) -> Self {
        Self { field, value }
    }
}

/// INSERT INTO table (columns) VALUES (...)
#[derive(Debug, Clone, PartialEq)]
pub struct InsertClause {
    pub record: &'static RecordDescriptor,
    pub values: Vec<Assignment>,
}

impl InsertClause {
    /// Every stored field of `record`, except generated fields that are still unset.
    pub fn from_record<R: Record>(record: &R) -> SqlResult<Self> {
        let descriptor = R::descriptor();
        let mut values = Vec::new();
        for field in descriptor.stored_fields() {
            let value = record.get(field.name)?;
            if field.is_generated() && value.is_unset() {
                continue;
            }
            values.push(Assignment::new(
                field.name,
                Expr::FieldValue {
                    field: field.name,
                    value,
                },
            ));
        }
        Ok(Self {
            record: descriptor,
            values,
        })
    }
}

/// UPDATE table SET ... [WHERE ...]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateClause {
    pub record: &'static RecordDescriptor,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<WhereClause>,
}

impl UpdateClause {
    pub fn new(
        record: &'static RecordDescriptor,
        assignments: Vec<Assignment>,
        where_clause: Option<WhereClause>,
    ) -> Self {
        Self {
            record,
            assignments,
            where_clause,
        }
    }

    /// Writes every stored non-key field, matching the row by primary key.
    pub fn from_record<R: Record>(record: &R) -> SqlResult<Self> {
        let descriptor = R::descriptor();
        if !descriptor.has_primary_key() {
            return Err(SqlError::invalid_clause(format!(
                "{} has no primary key to update by",
                descriptor.name
            )));
        }
        let mut assignments = Vec::new();
        for field in descriptor.stored_fields() {
            if descriptor.primary_key.contains(&field.name) {
                continue;
            }
            assignments.push(Assignment::new(
                field.name,
                Expr::FieldValue {
                    field: field.name,
                    value: record.get(field.name)?,
                },
            ));
        }
        let mut conditions = Vec::new();
        for field in descriptor.key_fields()? {
            conditions.push(
                Expr::col(descriptor, field.name).eq(Expr::Bound(record.get(field.name)?)),
            );
        }
        Ok(Self::new(
            descriptor,
            assignments,
            Some(WhereClause::new(Expr::all(conditions))),
        ))
    }
}

/// DELETE FROM table [WHERE ...]
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub record: &'static RecordDescriptor,
    pub where_clause: Option<WhereClause>,
}

/// CREATE [UNIQUE] INDEX [IF NOT EXISTS] name ON table (columns)
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexClause {
    pub record: &'static RecordDescriptor,
    pub name: String,
    pub fields: Vec<&'static str>,
    pub unique: bool,
    pub if_not_exists: bool,
}

impl CreateIndexClause {
    pub fn new(record: &'static RecordDescriptor, name: &str, fields: Vec<&'static str>) -> Self {
        Self {
            record,
            name: name.to_string(),
            fields,
            unique: false,
            if_not_exists: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

/// DROP INDEX name
#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexClause {
    pub record: &'static RecordDescriptor,
    pub name: String,
}

impl DropIndexClause {
    pub fn new(record: &'static RecordDescriptor, name: &str) -> Self {
        Self {
            record,
            name: name.to_string(),
        }
    }
}

/// A complete statement, ready to compile
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectClause),
    Insert(InsertClause),
    Update(UpdateClause),
    Delete(DeleteClause),
    CreateIndex(CreateIndexClause),
    DropIndex(DropIndexClause),
}

impl Statement {
    pub fn record(&self) -> &'static RecordDescriptor {
        match self {
            Statement::Select(s) => s.record,
            Statement::Insert(s) => s.record,
            Statement::Update(s) => s.record,
            Statement::Delete(s) => s.record,
            Statement::CreateIndex(s) => s.record,
            Statement::DropIndex(s) => s.record,
        }
    }

    /// Every record type the statement touches, the target first.
    pub fn referenced_records(&self) -> Vec<&'static RecordDescriptor> {
        let mut out = vec![self.record()];
        match self {
            Statement::Select(s) => {
                for join in &s.joins {
                    push_record(&mut out, join.record);
                }
                for record in s.referenced_records() {
                    push_record(&mut out, record);
                }
            }
            Statement::Update(s) => {
                for a in &s.assignments {
                    a.value.collect_records(&mut out);
                }
                if let Some(w) = &s.where_clause {
                    w.condition.collect_records(&mut out);
                }
            }
            Statement::Delete(s) => {
                if let Some(w) = &s.where_clause {
                    w.condition.collect_records(&mut out);
                }
            }
            Statement::Insert(_) | Statement::CreateIndex(_) | Statement::DropIndex(_) => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{User, ORDERS, USERS};
    use crate::value::Value;

    #[test]
    fn test_duplicate_where_rejected() {
        let result = SelectClause::from_parts(
            &USERS,
            vec![
                WhereClause::new(Expr::col(&USERS, "age").gt(Expr::bound(1))).into(),
                WhereClause::new(Expr::col(&USERS, "age").lt(Expr::bound(9))).into(),
            ],
        );
        let err = result.unwrap_err();
        assert_eq!(
            err,
            SqlError::InvalidClause("SELECT already has a WHERE clause".to_string())
        );
    }

    #[test]
    fn test_duplicate_order_by_rejected() {
        let result = SelectClause::new(&USERS)
            .order_by(OrderByClause::asc(Expr::col(&USERS, "age")))
            .and_then(|s| s.order_by(OrderByClause::desc(Expr::col(&USERS, "name"))));
        assert!(result.is_err());
    }

    #[test]
    fn test_many_joins_and_definitions_allowed() {
        let on = Expr::col(&ORDERS, "user_id").eq(Expr::col(&USERS, "id"));
        let select = SelectClause::from_parts(
            &USERS,
            vec![
                JoinClause::inner(&ORDERS, on.clone()).into(),
                JoinClause::left(&ORDERS, on).into(),
                FieldDefinition {
                    field: "name",
                    expr: Expr::literal("x"),
                }
                .into(),
                FieldDefinition {
                    field: "age",
                    expr: Expr::literal(1),
                }
                .into(),
            ],
        )
        .unwrap();
        assert_eq!(select.joins.len(), 2);
        assert_eq!(select.definitions.len(), 2);
        assert!(select.uses_overrides());
    }

    #[test]
    fn test_double_override_rejected() {
        let result = SelectClause::from_parts(
            &USERS,
            vec![
                FieldOverride {
                    field: "age",
                    expr: Expr::literal(1),
                }
                .into(),
                FieldOverride {
                    field: "age",
                    expr: Expr::literal(2),
                }
                .into(),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_keys_only_keeps_filter() {
        let select = SelectClause::new(&USERS)
            .filter(Expr::col(&USERS, "age").gt(Expr::bound(3)))
            .unwrap();
        let keys = select.keys_only();
        assert_eq!(keys.selection, Selection::Keys);
        assert_eq!(keys.where_clause, select.where_clause);
        assert_eq!(keys.output_fields(), vec!["id"]);
        assert_eq!(select.output_fields(), vec!["id", "name", "age", "created_at"]);
    }

    #[test]
    fn test_insert_skips_unset_generated_key() {
        let user = User {
            id: 0,
            name: "Ada".to_string(),
            age: 36,
            created_at: None,
        };
        let insert = InsertClause::from_record(&user).unwrap();
        let fields: Vec<_> = insert.values.iter().map(|a| a.field).collect();
        assert_eq!(fields, vec!["name", "age", "created_at"]);

        let user = User { id: 7, ..user };
        let insert = InsertClause::from_record(&user).unwrap();
        assert_eq!(insert.values[0].field, "id");
        assert_eq!(
            insert.values[0].value,
            Expr::FieldValue {
                field: "id",
                value: Value::Integer(7)
            }
        );
    }

    #[test]
    fn test_update_from_record_matches_key() {
        let user = User {
            id: 4,
            name: "Bob".to_string(),
            age: 20,
            created_at: None,
        };
        let update = UpdateClause::from_record(&user).unwrap();
        let fields: Vec<_> = update.assignments.iter().map(|a| a.field).collect();
        assert_eq!(fields, vec!["name", "age", "created_at"]);
        assert!(update.where_clause.is_some());
    }

    #[test]
    fn test_statement_referenced_records() {
        let select = SelectClause::new(&USERS)
            .filter(Expr::col(&ORDERS, "total").gt(Expr::bound(10)))
            .unwrap();
        let names: Vec<_> = Statement::Select(select)
            .referenced_records()
            .iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["User", "Order"]);
    }
}
