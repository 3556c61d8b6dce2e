//! Unit tests for the SqlBuilder query construction.

use price_timeline::SqlBuilder;

// ---------------------------------------------------------------------------
// Basic construction
// ---------------------------------------------------------------------------

#[test]
fn new_creates_select_star_from_table() {
    let (sql, params) = SqlBuilder::new("observations").build();
    assert_eq!(sql, "SELECT *\nFROM observations");
    assert!(params.is_empty());
}

#[test]
fn select_replaces_default_star() {
    let (sql, _) = SqlBuilder::new("observations")
        .select(&["product_id", "date"])
        .build();
    assert!(sql.starts_with("SELECT product_id, date\n"));
}

// ---------------------------------------------------------------------------
// WHERE conditions
// ---------------------------------------------------------------------------

#[test]
fn where_in_adds_in_clause() {
    let (sql, params) = SqlBuilder::new("observations")
        .where_in("product_id", &["a", "b", "c"])
        .build();
    assert!(sql.contains("product_id IN (?, ?, ?)"));
    assert_eq!(params, vec!["a", "b", "c"]);
}

#[test]
fn where_in_empty_produces_false() {
    let (sql, params) = SqlBuilder::new("observations")
        .where_in("product_id", &[])
        .build();
    assert!(sql.contains("WHERE FALSE"));
    assert!(params.is_empty());
}

#[test]
fn where_date_between_casts_both_bounds() {
    let (sql, params) = SqlBuilder::new("observations")
        .where_date_between("date", Some("2026-01-01"), Some("2026-01-31"))
        .build();
    assert!(sql.contains("date >= CAST(? AS DATE) AND date <= CAST(? AS DATE)"));
    assert_eq!(params, vec!["2026-01-01", "2026-01-31"]);
}

#[test]
fn where_date_between_open_side_is_skipped() {
    let (sql, params) = SqlBuilder::new("observations")
        .where_date_between("date", None, Some("2026-01-31"))
        .build();
    assert!(!sql.contains(">="));
    assert!(sql.contains("date <= CAST(? AS DATE)"));
    assert_eq!(params, vec!["2026-01-31"]);
}

#[test]
fn where_date_between_without_bounds_is_noop() {
    let (sql, params) = SqlBuilder::new("observations")
        .where_date_between("date", None, None)
        .build();
    assert!(!sql.contains("WHERE"));
    assert!(params.is_empty());
}

#[test]
fn where_contains_any_ors_columns_with_one_param_each() {
    let (sql, params) = SqlBuilder::new("products")
        .where_contains_any(&["product_name", "brand"], "카누")
        .build();
    assert!(sql.contains(
        "(contains(LOWER(COALESCE(CAST(product_name AS VARCHAR), '')), LOWER(?)) \
         OR contains(LOWER(COALESCE(CAST(brand AS VARCHAR), '')), LOWER(?)))"
    ));
    assert_eq!(params, vec!["카누", "카누"]);
}

#[test]
fn where_contains_any_without_columns_produces_false() {
    let (sql, params) = SqlBuilder::new("products")
        .where_contains_any(&[], "카누")
        .build();
    assert!(sql.contains("WHERE FALSE"));
    assert!(params.is_empty());
}

// ---------------------------------------------------------------------------
// ORDER BY
// ---------------------------------------------------------------------------

#[test]
fn order_by_adds_clause() {
    let (sql, _) = SqlBuilder::new("observations")
        .order_by(&["product_id ASC", "date ASC"])
        .build();
    assert!(sql.contains("ORDER BY product_id ASC, date ASC"));
}

// ---------------------------------------------------------------------------
// Combined / chained
// ---------------------------------------------------------------------------

#[test]
fn multiple_where_clauses_joined_with_and_params_in_order() {
    let (sql, params) = SqlBuilder::new("products")
        .where_contains_any(&["brand"], "카누")
        .where_contains_any(&["category"], "디카페인")
        .build();
    assert!(sql.contains(
        "WHERE (contains(LOWER(COALESCE(CAST(brand AS VARCHAR), '')), LOWER(?))) \
         AND (contains(LOWER(COALESCE(CAST(category AS VARCHAR), '')), LOWER(?)))"
    ));
    assert_eq!(params, vec!["카누", "디카페인"]);
}

#[test]
fn snapshot_query_chains_correctly() {
    let (sql, params) = SqlBuilder::new("observations")
        .select(&["product_id", "date"])
        .where_in("product_id", &["p-001", "p-002"])
        .where_date_between("date", None, Some("2026-01-06"))
        .order_by(&["product_id ASC", "date ASC"])
        .build();

    assert_eq!(
        sql,
        "SELECT product_id, date\n\
         FROM observations\n\
         WHERE product_id IN (?, ?) AND date <= CAST(? AS DATE)\n\
         ORDER BY product_id ASC, date ASC"
    );
    assert_eq!(params, vec!["p-001", "p-002", "2026-01-06"]);
}
