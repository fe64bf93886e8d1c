//! Stock item database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use strsim::{jaro_winkler, normalized_levenshtein};

use super::{parse_status, Database, DbError, DbResult};
use crate::models::{now, Packaging, StockItem, StockStatus};

const STOCK_COLUMNS: &str = r#"
    id, item_name, category, unit, packaging_unit, units_per_package,
    current_stock, status, created_at, updated_at
"#;

/// A stock item with its name-match score.
#[derive(Debug, Clone, PartialEq)]
pub struct StockMatch {
    pub item: StockItem,
    /// 0.0 - 1.0
    pub score: f64,
}

impl Database {
    /// Insert a new stock item.
    pub fn insert_stock_item(&self, item: &StockItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO stock_items (
                id, item_name, category, unit, packaging_unit, units_per_package,
                current_stock, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                item.id,
                item.item_name,
                item.category,
                item.packaging.base_unit(),
                item.packaging.packaging_unit(),
                item.packaging.units_per_package(),
                item.current_stock,
                item.status.as_str(),
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a stock item by ID.
    pub fn get_stock_item(&self, id: &str) -> DbResult<Option<StockItem>> {
        load_stock_item(&self.conn, id)
    }

    /// List stock items by name.
    pub fn list_stock_items(&self, active_only: bool) -> DbResult<Vec<StockItem>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM stock_items WHERE status = 'active' ORDER BY item_name",
                STOCK_COLUMNS
            )
        } else {
            format!("SELECT {} FROM stock_items ORDER BY item_name", STOCK_COLUMNS)
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.try_into()?);
        }
        Ok(items)
    }

    /// Active items at or below `threshold` base units.
    pub fn list_low_stock(&self, threshold: f64) -> DbResult<Vec<StockItem>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM stock_items
            WHERE status = 'active' AND current_stock <= ?
            ORDER BY current_stock, item_name
            "#,
            STOCK_COLUMNS
        ))?;

        let rows = stmt.query_map([threshold], read_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.try_into()?);
        }
        Ok(items)
    }

    /// Rank active items by fuzzy name similarity.
    pub fn search_stock_items(
        &self,
        query: &str,
        min_score: f64,
        limit: usize,
    ) -> DbResult<Vec<StockMatch>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<StockMatch> = self
            .list_stock_items(true)?
            .into_iter()
            .map(|item| {
                let score = name_score(&query, &item.item_name.to_lowercase());
                StockMatch { item, score }
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    /// Mark item as inactive (soft delete).
    pub fn deactivate_stock_item(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE stock_items SET status = 'inactive', updated_at = ?2 WHERE id = ?1",
            params![id, now()],
        )?;
        Ok(rows_affected > 0)
    }
}

pub(crate) fn load_stock_item(conn: &Connection, id: &str) -> DbResult<Option<StockItem>> {
    conn.query_row(
        &format!("SELECT {} FROM stock_items WHERE id = ?", STOCK_COLUMNS),
        [id],
        read_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Add `delta` base units. A negative delta that would overdraw stock changes nothing.
///
/// Returns `false` when the item is missing or the stock is insufficient.
pub(crate) fn apply_stock_delta(conn: &Connection, id: &str, delta: f64) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE stock_items SET
            current_stock = current_stock + ?2,
            updated_at = ?3
        WHERE id = ?1 AND current_stock + ?2 >= 0
        "#,
        params![id, delta, now()],
    )?;
    Ok(rows_affected > 0)
}

/// Configure packaging on a still-unconfigured item and add stock in one statement.
///
/// Returns `false` when the item is missing or already has packaging.
pub(crate) fn update_packaging_and_add(
    conn: &Connection,
    id: &str,
    packaging_unit: &str,
    base_unit: &str,
    units_per_package: f64,
    quantity: f64,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE stock_items SET
            packaging_unit = ?2,
            unit = ?3,
            units_per_package = ?4,
            current_stock = current_stock + ?5,
            updated_at = ?6
        WHERE id = ?1 AND packaging_unit IS NULL
        "#,
        params![id, packaging_unit, base_unit, units_per_package, quantity, now()],
    )?;
    Ok(rows_affected > 0)
}

/// Combined fuzzy similarity; substring hits score full marks.
fn name_score(query: &str, name: &str) -> f64 {
    if name.contains(query) {
        return 1.0;
    }
    let best_word = name
        .split_whitespace()
        .map(|word| jaro_winkler(query, word))
        .fold(0.0, f64::max);
    let whole = jaro_winkler(query, name) * 0.6 + normalized_levenshtein(query, name) * 0.4;
    best_word.max(whole)
}

/// Intermediate row struct for database mapping.
struct StockRow {
    id: String,
    item_name: String,
    category: String,
    unit: String,
    packaging_unit: Option<String>,
    units_per_package: Option<f64>,
    current_stock: f64,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StockRow> {
    Ok(StockRow {
        id: row.get(0)?,
        item_name: row.get(1)?,
        category: row.get(2)?,
        unit: row.get(3)?,
        packaging_unit: row.get(4)?,
        units_per_package: row.get(5)?,
        current_stock: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TryFrom<StockRow> for StockItem {
    type Error = DbError;

    fn try_from(row: StockRow) -> Result<Self, Self::Error> {
        let packaging = Packaging::from_columns(row.unit, row.packaging_unit, row.units_per_package)
            .ok_or_else(|| {
                DbError::Constraint(format!("Partial packaging on stock item {}", row.id))
            })?;

        Ok(StockItem {
            id: row.id,
            item_name: row.item_name,
            category: row.category,
            packaging,
            current_stock: row.current_stock,
            status: parse_status(&row.status, "stock status", StockStatus::parse)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get_configured() {
        let db = setup_db();

        let mut item = StockItem::new("Gloves".into(), "supplies".into(), "pcs".into());
        item.packaging = Packaging::Configured {
            packaging_unit: "Box".into(),
            base_unit: "pcs".into(),
            units_per_package: 100.0,
        };
        item.current_stock = 200.0;
        db.insert_stock_item(&item).unwrap();

        let loaded = db.get_stock_item(&item.id).unwrap().unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn test_stock_delta_guards_overdraw() {
        let db = setup_db();

        let mut item = StockItem::new("Saline 100ml".into(), "fluids".into(), "bags".into());
        item.current_stock = 3.0;
        db.insert_stock_item(&item).unwrap();

        assert!(apply_stock_delta(db.conn(), &item.id, -2.0).unwrap());
        assert!(!apply_stock_delta(db.conn(), &item.id, -2.0).unwrap());
        assert!(apply_stock_delta(db.conn(), &item.id, 5.0).unwrap());

        let loaded = db.get_stock_item(&item.id).unwrap().unwrap();
        assert_eq!(loaded.current_stock, 6.0);
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.updated_at).is_ok());
    }

    #[test]
    fn test_packaging_configured_only_once() {
        let db = setup_db();

        let item = StockItem::new("Alcohol swab".into(), "supplies".into(), "pcs".into());
        db.insert_stock_item(&item).unwrap();

        assert!(update_packaging_and_add(db.conn(), &item.id, "Box", "pcs", 200.0, 400.0).unwrap());
        assert!(!update_packaging_and_add(db.conn(), &item.id, "Case", "pcs", 10.0, 10.0).unwrap());

        let loaded = db.get_stock_item(&item.id).unwrap().unwrap();
        assert_eq!(loaded.packaging.packaging_unit(), Some("Box"));
        assert_eq!(loaded.current_stock, 400.0);
    }

    #[test]
    fn test_fuzzy_search() {
        let db = setup_db();

        for name in ["IV Cannula 22G", "Syringe 5ml", "Saline 0.9% 500ml"] {
            db.insert_stock_item(&StockItem::new(name.into(), "supplies".into(), "pcs".into()))
                .unwrap();
        }

        let results = db.search_stock_items("syringe", 0.75, 10).unwrap();
        assert_eq!(results[0].item.item_name, "Syringe 5ml");
        assert_eq!(results[0].score, 1.0);

        // Typo still finds the cannula first
        let results = db.search_stock_items("canula", 0.75, 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].item.item_name, "IV Cannula 22G");

        assert!(db.search_stock_items("  ", 0.0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_low_stock_and_deactivate() {
        let db = setup_db();

        let mut low = StockItem::new("Gauze".into(), "supplies".into(), "pcs".into());
        low.current_stock = 2.0;
        let mut plenty = StockItem::new("Tape".into(), "supplies".into(), "rolls".into());
        plenty.current_stock = 40.0;
        db.insert_stock_item(&low).unwrap();
        db.insert_stock_item(&plenty).unwrap();

        let list = db.list_low_stock(5.0).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, low.id);

        db.deactivate_stock_item(&low.id).unwrap();
        assert!(db.list_low_stock(5.0).unwrap().is_empty());
        assert_eq!(db.list_stock_items(true).unwrap().len(), 1);
        assert_eq!(db.list_stock_items(false).unwrap().len(), 2);
    }
}
