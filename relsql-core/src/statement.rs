//! Compiled SQL text and its ordered bindings.

use crate::dialect::Dialect;
use crate::value::Value;

/// One placeholder's value
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Value),
    /// A record field written by INSERT or UPDATE
    Field { field: &'static str, value: Value },
    /// LIMIT / OFFSET
    Integer(i64),
}

impl Binding {
    pub fn value(&self) -> Value {
        match self {
            Binding::Value(v) | Binding::Field { value: v, .. } => v.clone(),
            Binding::Integer(i) => Value::Integer(*i),
        }
    }
}

/// Output of the compiler's single traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Param(Binding),
}

/// SQL text plus the bindings of its placeholders, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

impl CompiledStatement {
    /// Render a token stream; placeholders are numbered in stream order.
    pub fn from_tokens(tokens: Vec<Token>, dialect: &dyn Dialect) -> Self {
        let mut sql = String::new();
        let mut bindings = Vec::new();
        for token in tokens {
            match token {
                Token::Text(text) => sql.push_str(&text),
                Token::Param(binding) => {
                    bindings.push(binding);
                    sql.push_str(&dialect.placeholder(bindings.len()));
                }
            }
        }
        Self { sql, bindings }
    }

    /// Values to bind, in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        self.bindings.iter().map(Binding::value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{GenericDialect, PostgresDialect};

    fn tokens() -> Vec<Token> {
        vec![
            Token::Text("SELECT 1 WHERE a = ".to_string()),
            Token::Param(Binding::Value(Value::from("x"))),
            Token::Text(" LIMIT ".to_string()),
            Token::Param(Binding::Integer(10)),
        ]
    }

    #[test]
    fn test_placeholders_follow_bindings() {
        let stmt = CompiledStatement::from_tokens(tokens(), &GenericDialect);
        assert_eq!(stmt.sql, "SELECT 1 WHERE a = ? LIMIT ?");
        assert_eq!(stmt.params(), vec![Value::from("x"), Value::Integer(10)]);

        let stmt = CompiledStatement::from_tokens(tokens(), &PostgresDialect);
        assert_eq!(stmt.sql, "SELECT 1 WHERE a = $1 LIMIT $2");
    }

    #[test]
    fn test_params_is_repeatable() {
        let stmt = CompiledStatement::from_tokens(tokens(), &GenericDialect);
        assert_eq!(stmt.params(), stmt.params());
    }

    #[test]
    fn test_field_binding_value() {
        let binding = Binding::Field {
            field: "age",
            value: Value::Integer(3),
        };
        assert_eq!(binding.value(), Value::Integer(3));
    }
}
