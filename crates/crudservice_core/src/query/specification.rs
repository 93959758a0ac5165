//! Composable filter predicates.
//!
//! A `Specification` is built by callers, then rendered into a
//! parameterized `WHERE` fragment by the repository at execution time.

use super::quote_identifier;
use rusqlite::types::Value;
use std::ops::Not;

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Filter condition over entity columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Specification {
    /// Matches every row.
    All,
    /// `Eq`/`Ne` against `Value::Null` render as `IS NULL`/`IS NOT NULL`.
    Compare {
        column: String,
        op: Comparison,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
    /// An empty value list matches nothing.
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    /// An empty conjunction matches every row.
    And(Vec<Specification>),
    /// An empty disjunction matches nothing.
    Or(Vec<Specification>),
    Not(Box<Specification>),
}

impl Specification {
    pub fn all() -> Self {
        Self::All
    }

    pub fn compare(column: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Eq, value)
    }

    pub fn not_equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Ge, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }

    /// Equality when `value` is non-null, `IS NULL` otherwise.
    pub fn column_equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Self::IsNull(column.into()),
            value => Self::Compare {
                column: column.into(),
                op: Comparison::Eq,
                value,
            },
        }
    }

    /// Conjunction of `column_equals` conditions, one per pair.
    pub fn columns_equal<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::all_of(
            pairs
                .into_iter()
                .map(|(column, value)| Self::column_equals(column, value)),
        )
    }

    pub fn all_of(specs: impl IntoIterator<Item = Specification>) -> Self {
        Self::And(specs.into_iter().collect())
    }

    pub fn any_of(specs: impl IntoIterator<Item = Specification>) -> Self {
        Self::Or(specs.into_iter().collect())
    }

    pub fn and(self, other: Specification) -> Self {
        match self {
            Self::And(mut specs) => {
                specs.push(other);
                Self::And(specs)
            }
            this => Self::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Specification) -> Self {
        match self {
            Self::Or(mut specs) => {
                specs.push(other);
                Self::Or(specs)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    /// Renders the predicate and its bind values.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut binds = Vec::new();
        self.write_sql(&mut sql, &mut binds);
        (sql, binds)
    }

    fn write_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::All => sql.push_str("1 = 1"),
            Self::Compare { column, op, value } => match (op, value) {
                (Comparison::Eq, Value::Null) => write_null_check(sql, column, "IS NULL"),
                (Comparison::Ne, Value::Null) => write_null_check(sql, column, "IS NOT NULL"),
                _ => {
                    sql.push_str(&quote_identifier(column));
                    sql.push(' ');
                    sql.push_str(op.as_sql());
                    sql.push_str(" ?");
                    binds.push(value.clone());
                }
            },
            Self::Like { column, pattern } => {
                sql.push_str(&quote_identifier(column));
                sql.push_str(" LIKE ?");
                binds.push(Value::Text(pattern.clone()));
            }
            Self::In { column, values } => {
                if values.is_empty() {
                    sql.push_str("1 = 0");
                    return;
                }
                sql.push_str(&quote_identifier(column));
                sql.push_str(" IN (");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                    binds.push(value.clone());
                }
                sql.push(')');
            }
            Self::IsNull(column) => write_null_check(sql, column, "IS NULL"),
            Self::IsNotNull(column) => write_null_check(sql, column, "IS NOT NULL"),
            Self::And(specs) => write_group(sql, binds, specs, " AND ", "1 = 1"),
            Self::Or(specs) => write_group(sql, binds, specs, " OR ", "1 = 0"),
            Self::Not(spec) => {
                sql.push_str("NOT (");
                spec.write_sql(sql, binds);
                sql.push(')');
            }
        }
    }
}

impl Default for Specification {
    fn default() -> Self {
        Self::All
    }
}

impl Not for Specification {
    type Output = Specification;

    fn not(self) -> Self::Output {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

fn write_null_check(sql: &mut String, column: &str, check: &str) {
    sql.push_str(&quote_identifier(column));
    sql.push(' ');
    sql.push_str(check);
}

fn write_group(
    sql: &mut String,
    binds: &mut Vec<Value>,
    specs: &[Specification],
    separator: &str,
    empty: &str,
) {
    if specs.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, spec) in specs.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        spec.write_sql(sql, binds);
    }
    sql.push(')');
}

#[cfg(test)]
mod tests {
    use super::Specification;
    use rusqlite::types::Value;

    #[test]
    fn column_equals_null_renders_is_null_without_binds() {
        let (sql, binds) = Specification::column_equals("color", Value::Null).to_sql();
        assert_eq!(sql, "`color` IS NULL");
        assert!(binds.is_empty());
    }

    #[test]
    fn column_equals_value_binds_parameter() {
        let (sql, binds) = Specification::column_equals("color", "red".to_string()).to_sql();
        assert_eq!(sql, "`color` = ?");
        assert_eq!(binds, vec![Value::Text("red".to_string())]);
    }

    #[test]
    fn columns_equal_builds_conjunction_in_input_order() {
        let spec = Specification::columns_equal([
            ("name", Value::Text("a".to_string())),
            ("color", Value::Null),
        ]);
        let (sql, binds) = spec.to_sql();
        assert_eq!(sql, "(`name` = ? AND `color` IS NULL)");
        assert_eq!(binds.len(), 1);
    }

    #[test]
    fn empty_groups_render_identity_predicates() {
        assert_eq!(Specification::all_of([]).to_sql().0, "1 = 1");
        assert_eq!(Specification::any_of([]).to_sql().0, "1 = 0");
        assert_eq!(
            Specification::is_in("weight", Vec::<i64>::new()).to_sql().0,
            "1 = 0"
        );
    }

    #[test]
    fn and_flattens_and_not_wraps() {
        let spec = Specification::gt("weight", 3_i64)
            .and(Specification::lt("weight", 9_i64))
            .and(!Specification::like("name", "x%"));
        let (sql, binds) = spec.to_sql();
        assert_eq!(
            sql,
            "(`weight` > ? AND `weight` < ? AND NOT (`name` LIKE ?))"
        );
        assert_eq!(
            binds,
            vec![
                Value::Integer(3),
                Value::Integer(9),
                Value::Text("x%".to_string())
            ]
        );
    }

    #[test]
    fn double_negation_unwraps() {
        let spec = !!Specification::is_null("color");
        assert_eq!(spec, Specification::is_null("color"));
    }

    #[test]
    fn in_binds_each_value() {
        let (sql, binds) = Specification::is_in("weight", [1_i64, 2, 3]).to_sql();
        assert_eq!(sql, "`weight` IN (?, ?, ?)");
        assert_eq!(binds.len(), 3);
    }
}
