//! SQL builder with parameterized query construction.
//!
//! All user-supplied values go through DuckDB's parameter binding (`?` placeholders),
//! never through string interpolation. Builder methods return `&mut Self` for chaining.
//!
//! # Example
//!
//! ```rust
//! use price_timeline::SqlBuilder;
//! let (sql, params) = SqlBuilder::new("observations")
//!     .where_in("product_id", &["p-001", "p-002"])
//!     .where_date_between("date", Some("2026-01-01"), Some("2026-01-31"))
//!     .order_by(&["product_id ASC", "date ASC"])
//!     .build();
//! ```

/// Builds parameterized SQL queries safely.
pub struct SqlBuilder {
    select_cols: Vec<String>,
    from_table: String,
    where_clauses: Vec<String>,
    params: Vec<String>,
    order_by_cols: Vec<String>,
}

impl SqlBuilder {
    /// Create a builder targeting the given table or view.
    pub fn new(table: &str) -> Self {
        Self {
            select_cols: vec!["*".to_string()],
            from_table: table.to_string(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            order_by_cols: Vec::new(),
        }
    }

    /// Set the columns to select (replaces the default `*`).
    pub fn select(&mut self, cols: &[&str]) -> &mut Self {
        self.select_cols = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add an IN condition with parameterized values.
    ///
    /// Empty values list produces `FALSE`.
    pub fn where_in(&mut self, column: &str, values: &[&str]) -> &mut Self {
        if values.is_empty() {
            self.where_clauses.push("FALSE".to_string());
            return self;
        }
        let placeholders: Vec<&str> = values.iter().map(|_| "?").collect();
        self.where_clauses
            .push(format!("{} IN ({})", column, placeholders.join(", ")));
        self.params.extend(values.iter().map(|v| v.to_string()));
        self
    }

    /// Add inclusive date bounds on a DATE column.
    ///
    /// Either bound may be `None`, in which case that side is open.
    /// Bounds are ISO `YYYY-MM-DD` strings cast on the DuckDB side.
    pub fn where_date_between(
        &mut self,
        column: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> &mut Self {
        if let Some(from) = from {
            self.where_clauses
                .push(format!("{} >= CAST(? AS DATE)", column));
            self.params.push(from.to_string());
        }
        if let Some(to) = to {
            self.where_clauses
                .push(format!("{} <= CAST(? AS DATE)", column));
            self.params.push(to.to_string());
        }
        self
    }

    /// Require a case-insensitive substring match in any of the given columns.
    ///
    /// Generates: `(contains(LOWER(COALESCE(CAST(a AS VARCHAR), '')), LOWER(?)) OR ...)`.
    /// NULL columns never match. No columns produces `FALSE`.
    pub fn where_contains_any(&mut self, columns: &[&str], needle: &str) -> &mut Self {
        if columns.is_empty() {
            self.where_clauses.push("FALSE".to_string());
            return self;
        }
        let parts: Vec<String> = columns
            .iter()
            .map(|c| format!("contains(LOWER(COALESCE(CAST({} AS VARCHAR), '')), LOWER(?))", c))
            .collect();
        self.where_clauses.push(format!("({})", parts.join(" OR ")));
        self.params
            .extend(columns.iter().map(|_| needle.to_string()));
        self
    }

    /// Add ORDER BY clauses (e.g. `"date ASC"`).
    pub fn order_by(&mut self, clauses: &[&str]) -> &mut Self {
        self.order_by_cols
            .extend(clauses.iter().map(|c| c.to_string()));
        self
    }

    /// Build the final SQL string and parameter list.
    pub fn build(&self) -> (String, Vec<String>) {
        let mut parts = vec![
            format!("SELECT {}", self.select_cols.join(", ")),
            format!("FROM {}", self.from_table),
        ];

        if !self.where_clauses.is_empty() {
            parts.push(format!("WHERE {}", self.where_clauses.join(" AND ")));
        }

        if !self.order_by_cols.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by_cols.join(", ")));
        }

        (parts.join("\n"), self.params.clone())
    }
}
