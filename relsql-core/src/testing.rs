//! Record fixtures shared by the unit tests of this crate.

use crate::error::{SqlError, SqlResult};
use crate::record::{FieldDescriptor, Record, RecordDescriptor, RecordSource};
use crate::value::Value;

const USER_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::generated("id", "id"),
    FieldDescriptor::persisted("name", "name"),
    FieldDescriptor::persisted("age", "age"),
    FieldDescriptor::persisted("created_at", "created_at"),
];

pub static USERS: RecordDescriptor = RecordDescriptor {
    name: "User",
    source: RecordSource::Table("users"),
    fields: USER_FIELDS,
    primary_key: &["id"],
};

/// Same shape as `USERS`, stored elsewhere
pub static ARCHIVED_USERS: RecordDescriptor = RecordDescriptor {
    name: "ArchivedUser",
    source: RecordSource::Table("archived_users"),
    fields: USER_FIELDS,
    primary_key: &["id"],
};

pub static ORDERS: RecordDescriptor = RecordDescriptor {
    name: "Order",
    source: RecordSource::Table("orders"),
    fields: &[
        FieldDescriptor::generated("id", "id"),
        FieldDescriptor::persisted("user_id", "user_id"),
        FieldDescriptor::persisted("total", "total"),
        FieldDescriptor::computed("total_cents", Some("total * 100"), true),
    ],
    primary_key: &["id"],
};

pub static MEMBERS: RecordDescriptor = RecordDescriptor {
    name: "Member",
    source: RecordSource::Table("members"),
    fields: &[
        FieldDescriptor::persisted("group_id", "group_id"),
        FieldDescriptor::persisted("kind", "kind"),
        FieldDescriptor::persisted("role", "role_name"),
    ],
    primary_key: &["group_id", "kind"],
};

pub static USER_STATS: RecordDescriptor = RecordDescriptor {
    name: "UserStats",
    source: RecordSource::Computed,
    fields: &[
        FieldDescriptor::computed("user_id", None, true),
        FieldDescriptor::computed("order_count", None, true),
        FieldDescriptor::computed("note", None, false),
    ],
    primary_key: &[],
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub created_at: Option<String>,
}

impl Record for User {
    fn descriptor() -> &'static RecordDescriptor {
        &USERS
    }

    fn get(&self, field: &str) -> SqlResult<Value> {
        match field {
            "id" => Ok(self.id.into()),
            "name" => Ok(self.name.clone().into()),
            "age" => Ok(self.age.into()),
            "created_at" => Ok(self.created_at.clone().into()),
            other => Err(SqlError::unknown_field("User", other)),
        }
    }

    fn set(&mut self, field: &str, value: Value) -> SqlResult<()> {
        match field {
            "id" => self.id = value.try_into()?,
            "name" => self.name = value.try_into()?,
            "age" => self.age = value.try_into()?,
            "created_at" => self.created_at = value.optional()?,
            other => return Err(SqlError::unknown_field("User", other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Member {
    pub group_id: i64,
    pub kind: i64,
    pub role: String,
}

impl Record for Member {
    fn descriptor() -> &'static RecordDescriptor {
        &MEMBERS
    }

    fn get(&self, field: &str) -> SqlResult<Value> {
        match field {
            "group_id" => Ok(self.group_id.into()),
            "kind" => Ok(self.kind.into()),
            "role" => Ok(self.role.clone().into()),
            other => Err(SqlError::unknown_field("Member", other)),
        }
    }

    fn set(&mut self, field: &str, value: Value) -> SqlResult<()> {
        match field {
            "group_id" => self.group_id = value.try_into()?,
            "kind" => self.kind = value.try_into()?,
            "role" => self.role = value.try_into()?,
            other => return Err(SqlError::unknown_field("Member", other)),
        }
        Ok(())
    }
}
