//! Query-side value types.
//!
//! # Responsibility
//! - Compose filter predicates (`Specification`) before execution.
//! - Describe page requests and page results.
//!
//! # Invariants
//! - Values are always bound as parameters; only identifiers are inlined,
//!   and identifiers are always quoted.

pub mod page;
pub mod specification;

/// Quotes one SQL identifier with backticks.
///
/// Backtick-quoted names never fall back to string literals, so an unknown
/// column fails inside SQLite instead of silently matching nothing.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::quote_identifier;

    #[test]
    fn quote_identifier_escapes_embedded_backticks() {
        assert_eq!(quote_identifier("name"), "`name`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
