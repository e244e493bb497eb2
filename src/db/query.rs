//! Positional statement builder
//!
//! SQLite binds `?` placeholders by position, so a clause and the value it
//! binds are always appended in the same call. The argument list can never
//! drift out of step with the text.

use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::Sqlite;

/// A value bound to one `?` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    Text(String),
    BigInt(i64),
}

/// SQL text plus its positional arguments, in bind order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundSql {
    sql: String,
    args: Vec<SqlArg>,
}

impl BoundSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Append SQL that has no placeholders
    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a clause holding exactly one `?` and the value it binds
    pub fn push_text(&mut self, clause: &str, value: impl Into<String>) -> &mut Self {
        debug_assert_eq!(clause.matches('?').count(), 1);
        self.sql.push_str(clause);
        self.args.push(SqlArg::Text(value.into()));
        self
    }

    /// Integer counterpart of [`BoundSql::push_text`]
    pub fn push_int(&mut self, clause: &str, value: i64) -> &mut Self {
        debug_assert_eq!(clause.matches('?').count(), 1);
        self.sql.push_str(clause);
        self.args.push(SqlArg::BigInt(value));
        self
    }

    /// Append `(?, ?, ...)` with one text placeholder per value
    pub fn push_text_list<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sql.push('(');
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push('?');
            self.args.push(SqlArg::Text(value.into()));
        }
        self.sql.push(')');
        self
    }

    /// Wrap this statement as a subquery: `prefix (<self>) suffix`.
    /// Arguments keep their order.
    pub fn wrap(&self, prefix: &str, suffix: &str) -> Self {
        Self {
            sql: format!("{}({}){}", prefix, self.sql, suffix),
            args: self.args.clone(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    /// Turn into an executable Diesel query, binding arguments in order
    pub fn into_query(self) -> BoxedSqlQuery<'static, Sqlite, SqlQuery> {
        let mut query = diesel::sql_query(self.sql).into_boxed::<Sqlite>();
        for arg in self.args {
            query = match arg {
                SqlArg::Text(value) => query.bind::<Text, _>(value),
                SqlArg::BigInt(value) => query.bind::<BigInt, _>(value),
            };
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_and_arg_stay_in_step() {
        let mut q = BoundSql::new("SELECT * FROM t WHERE 1 = 1");
        q.push_text(" AND a = ?", "x")
            .push_int(" AND b = ?", 7)
            .push_sql(" ORDER BY a");

        assert_eq!(q.sql(), "SELECT * FROM t WHERE 1 = 1 AND a = ? AND b = ? ORDER BY a");
        assert_eq!(q.args(), &[SqlArg::Text("x".into()), SqlArg::BigInt(7)]);
    }

    #[test]
    fn test_text_list() {
        let mut q = BoundSql::new("SELECT id FROM host WHERE id IN ");
        q.push_text_list(["a", "b", "c"]);

        assert_eq!(q.sql(), "SELECT id FROM host WHERE id IN (?, ?, ?)");
        assert_eq!(q.args().len(), 3);
    }

    #[test]
    fn test_wrap_keeps_args() {
        let mut q = BoundSql::new("SELECT id FROM t WHERE");
        q.push_text(" name = ?", "web");

        let count = q.wrap("SELECT COUNT(*) AS total FROM ", "");
        assert_eq!(count.sql(), "SELECT COUNT(*) AS total FROM (SELECT id FROM t WHERE name = ?)");
        assert_eq!(count.args(), q.args());
    }
}
