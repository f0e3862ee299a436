//! Record-type metadata consumed by the compiler.
//!
//! Each persisted struct implements [`Record`] and exposes a static
//! [`RecordDescriptor`]: its table (or none, for computed record types), its
//! ordered fields and its primary-key fields. The descriptor replaces runtime
//! reflection; field values travel through `get`/`set` as [`Value`]s.
//!
//! # Example
//!
//! ```rust
//! use relsql_core::{FieldDescriptor, FieldKind, RecordDescriptor, RecordSource};
//!
//! static TAGS: RecordDescriptor = RecordDescriptor {
//!     name: "Tag",
//!     source: RecordSource::Table("tags"),
//!     fields: &[
//!         FieldDescriptor::generated("id", "id"),
//!         FieldDescriptor::persisted("label", "label"),
//!     ],
//!     primary_key: &["id"],
//! };
//!
//! assert_eq!(TAGS.table(), Some("tags"));
//! assert!(TAGS.has_primary_key());
//! ```

use std::fmt;

use crate::error::{SqlError, SqlResult};
use crate::value::Value;

/// How a field gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Stored in a column
    Persisted,
    /// Stored in a column whose value the database assigns on insert
    Generated,
    /// Not stored; rendered from a literal SQL definition or a query override
    Computed {
        definition: Option<&'static str>,
        required: bool,
    },
}

/// Static metadata for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub const fn persisted(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            kind: FieldKind::Persisted,
        }
    }

    pub const fn generated(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            kind: FieldKind::Generated,
        }
    }

    pub const fn computed(
        name: &'static str,
        definition: Option<&'static str>,
        required: bool,
    ) -> Self {
        Self {
            name,
            column: name,
            kind: FieldKind::Computed {
                definition,
                required,
            },
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.kind, FieldKind::Computed { .. })
    }

    pub fn is_generated(&self) -> bool {
        matches!(self.kind, FieldKind::Generated)
    }
}

/// Where a record type's rows come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Table(&'static str),
    /// No backing table; every field is computed or overridden per query
    Computed,
}

/// Static metadata for one record type
#[derive(Debug)]
pub struct RecordDescriptor {
    pub name: &'static str,
    pub source: RecordSource,
    pub fields: &'static [FieldDescriptor],
    pub primary_key: &'static [&'static str],
}

impl RecordDescriptor {
    pub fn table(&self) -> Option<&'static str> {
        match self.source {
            RecordSource::Table(table) => Some(table),
            RecordSource::Computed => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.source, RecordSource::Computed)
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Like [`field`](Self::field) but an unknown name is a configuration error.
    pub fn require_field(&self, name: &str) -> SqlResult<&'static FieldDescriptor> {
        self.field(name)
            .ok_or_else(|| SqlError::unknown_field(self.name, name))
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn key_fields(&self) -> SqlResult<Vec<&'static FieldDescriptor>> {
        self.primary_key
            .iter()
            .map(|name| self.require_field(name))
            .collect()
    }

    /// Fields written by INSERT and UPDATE
    pub fn stored_fields(&self) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_computed())
    }
}

impl PartialEq for RecordDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RecordDescriptor {}

impl fmt::Display for RecordDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A persisted struct with static metadata and field access by name.
pub trait Record: Clone + Default + Send + Sync + 'static {
    fn descriptor() -> &'static RecordDescriptor;

    /// Read a field; unknown names are a configuration error.
    fn get(&self, field: &str) -> SqlResult<Value>;

    /// Write a field; unknown names and type mismatches are errors.
    fn set(&mut self, field: &str, value: Value) -> SqlResult<()>;

    /// Build a fresh instance from values listed in `fields` order.
    fn from_values(fields: &[&'static str], values: Vec<Value>) -> SqlResult<Self> {
        if fields.len() != values.len() {
            return Err(SqlError::invalid_clause(format!(
                "{} expects {} values, got {}",
                Self::descriptor().name,
                fields.len(),
                values.len()
            )));
        }
        let mut record = Self::default();
        for (field, value) in fields.iter().zip(values) {
            record.set(field, value)?;
        }
        Ok(record)
    }

    /// Values of every descriptor field, in descriptor order.
    fn to_values(&self) -> SqlResult<Vec<Value>> {
        Self::descriptor()
            .fields
            .iter()
            .map(|f| self.get(f.name))
            .collect()
    }
}
