//! Consumable stock: unit conversion, the add-stock wizard, and stock writes.

mod conversion;
mod wizard;

pub use conversion::*;
pub use wizard::*;

use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{self, Database, DbError, StockMatch};
use crate::models::{StockItem, StockStatus};

/// Inventory errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Stock item not found: {0}")]
    ItemNotFound(String),

    #[error("Stock item is inactive: {0}")]
    ItemInactive(String),

    #[error("Invalid stock item: {0}")]
    InvalidItem(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid packaging: {0}")]
    InvalidPackaging(String),

    #[error("Packaging is not configured for this item")]
    PackagingNotConfigured,

    #[error("Packaging is already configured for this item")]
    PackagingAlreadyConfigured,

    #[error("Insufficient stock for {item_id}: {available} available, {requested} requested")]
    InsufficientStock {
        item_id: String,
        available: f64,
        requested: f64,
    },
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Default minimum similarity for stock name search.
pub const DEFAULT_SEARCH_THRESHOLD: f64 = 0.75;

/// Stock item management.
pub struct InventoryManager<'a> {
    db: &'a Database,
    search_threshold: f64,
}

impl<'a> InventoryManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            search_threshold: DEFAULT_SEARCH_THRESHOLD,
        }
    }

    /// Override the minimum score for `search`.
    pub fn with_search_threshold(mut self, threshold: f64) -> Self {
        self.search_threshold = threshold;
        self
    }

    /// Register a new consumable with no stock.
    pub fn create_item(
        &self,
        item_name: &str,
        category: &str,
        unit: &str,
    ) -> InventoryResult<StockItem> {
        let item_name = item_name.trim();
        let unit = unit.trim();
        if item_name.is_empty() {
            return Err(InventoryError::InvalidItem("item name is required".into()));
        }
        if unit.is_empty() {
            return Err(InventoryError::InvalidItem("unit is required".into()));
        }

        let item = StockItem::new(
            item_name.to_string(),
            category.trim().to_string(),
            unit.to_string(),
        );
        self.db.insert_stock_item(&item)?;

        info!(stock_item_id = %item.id, item_name, unit, "stock item created");
        Ok(item)
    }

    /// Add stock to an item, configuring its packaging first if the request asks to.
    ///
    /// Validation happens before any write; a rejected request leaves the item untouched.
    pub fn add_stock(
        &self,
        stock_item_id: &str,
        request: &AddStockRequest,
    ) -> InventoryResult<StockItem> {
        let item = self
            .db
            .get_stock_item(stock_item_id)?
            .ok_or_else(|| InventoryError::ItemNotFound(stock_item_id.to_string()))?;

        if item.status == StockStatus::Inactive {
            return Err(InventoryError::ItemInactive(stock_item_id.to_string()));
        }

        let quantity = match request.addition(&item.packaging).and_then(|a| a.quantity()) {
            Ok(quantity) => quantity,
            Err(e) => {
                warn!(stock_item_id, error = %e, "stock addition rejected");
                return Err(e);
            }
        };

        let tx = self.db.begin()?;

        match request {
            AddStockRequest::ConfigureAndAdd { setup, .. } => {
                // Another session may have configured packaging since the read
                if !db::update_packaging_and_add(
                    &tx,
                    stock_item_id,
                    setup.packaging_unit.trim(),
                    setup.base_unit.trim(),
                    setup.units_per_package,
                    quantity,
                )? {
                    return Err(InventoryError::PackagingAlreadyConfigured);
                }
            }
            _ => {
                if !db::apply_stock_delta(&tx, stock_item_id, quantity)? {
                    return Err(InventoryError::ItemNotFound(stock_item_id.to_string()));
                }
            }
        }

        let updated = db::load_stock_item(&tx, stock_item_id)?
            .ok_or_else(|| InventoryError::ItemNotFound(stock_item_id.to_string()))?;
        tx.commit().map_err(DbError::from)?;

        info!(
            stock_item_id,
            added = quantity,
            current_stock = updated.current_stock,
            unit = updated.unit(),
            "stock added"
        );
        Ok(updated)
    }

    /// Soft-delete an item.
    pub fn deactivate_item(&self, stock_item_id: &str) -> InventoryResult<()> {
        if !self.db.deactivate_stock_item(stock_item_id)? {
            return Err(InventoryError::ItemNotFound(stock_item_id.to_string()));
        }
        info!(stock_item_id, "stock item deactivated");
        Ok(())
    }

    /// Active items ranked by name similarity.
    pub fn search(&self, query: &str, limit: usize) -> InventoryResult<Vec<StockMatch>> {
        let matches = self
            .db
            .search_stock_items(query, self.search_threshold, limit)?;
        debug!(query, count = matches.len(), "stock search");
        Ok(matches)
    }

    /// Active items at or below `threshold` base units.
    pub fn low_stock(&self, threshold: f64) -> InventoryResult<Vec<StockItem>> {
        Ok(self.db.list_low_stock(threshold)?)
    }
}

/// Take `quantity` base units from an item inside the caller's transaction.
pub(crate) fn deduct_stock_in(
    conn: &Connection,
    stock_item_id: &str,
    quantity: f64,
) -> InventoryResult<f64> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(InventoryError::InvalidQuantity(format!(
            "quantity used must be greater than zero, got {}",
            quantity
        )));
    }

    let item = db::load_stock_item(conn, stock_item_id)?
        .ok_or_else(|| InventoryError::ItemNotFound(stock_item_id.to_string()))?;

    if !db::apply_stock_delta(conn, stock_item_id, -quantity)? {
        warn!(
            stock_item_id,
            available = item.current_stock,
            requested = quantity,
            "stock overdraw refused"
        );
        return Err(InventoryError::InsufficientStock {
            item_id: stock_item_id.to_string(),
            available: item.current_stock,
            requested: quantity,
        });
    }

    let remaining = item.current_stock - quantity;
    debug!(stock_item_id, deducted = quantity, remaining, "stock deducted");
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Packaging;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn box_setup() -> PackagingSetup {
        PackagingSetup {
            packaging_unit: "Box".into(),
            base_unit: "pcs".into(),
            units_per_package: 10.0,
        }
    }

    #[test]
    fn test_first_packaging_with_stock() {
        let db = setup_db();
        let inventory = InventoryManager::new(&db);

        let item = inventory.create_item("Gauze", "supplies", "piece").unwrap();
        assert_eq!(item.current_stock, 0.0);

        let updated = inventory
            .add_stock(
                &item.id,
                &AddStockRequest::ConfigureAndAdd {
                    setup: box_setup(),
                    count: 3.0,
                },
            )
            .unwrap();

        assert_eq!(updated.current_stock, 30.0);
        assert_eq!(
            updated.packaging,
            Packaging::Configured {
                packaging_unit: "Box".into(),
                base_unit: "pcs".into(),
                units_per_package: 10.0,
            }
        );
        assert_eq!(updated.unit(), "pcs");

        let updated = inventory
            .add_stock(&item.id, &AddStockRequest::Packages { count: 2.0 })
            .unwrap();
        assert_eq!(updated.current_stock, 50.0);

        let updated = inventory
            .add_stock(&item.id, &AddStockRequest::Direct { amount: 5.0 })
            .unwrap();
        assert_eq!(updated.current_stock, 55.0);
    }

    #[test]
    fn test_rejected_addition_leaves_stock() {
        let db = setup_db();
        let inventory = InventoryManager::new(&db);

        let item = inventory.create_item("Gauze", "supplies", "pcs").unwrap();
        inventory
            .add_stock(&item.id, &AddStockRequest::Direct { amount: 4.0 })
            .unwrap();

        assert!(matches!(
            inventory.add_stock(&item.id, &AddStockRequest::Direct { amount: 0.0 }),
            Err(InventoryError::InvalidQuantity(_))
        ));
        assert!(matches!(
            inventory.add_stock(&item.id, &AddStockRequest::Packages { count: 1.0 }),
            Err(InventoryError::PackagingNotConfigured)
        ));

        let mut bad_setup = box_setup();
        bad_setup.units_per_package = -5.0;
        assert!(inventory
            .add_stock(
                &item.id,
                &AddStockRequest::ConfigureAndAdd {
                    setup: bad_setup,
                    count: 3.0,
                },
            )
            .is_err());

        let stored = db.get_stock_item(&item.id).unwrap().unwrap();
        assert_eq!(stored.current_stock, 4.0);
        assert!(!stored.packaging.is_configured());
    }

    #[test]
    fn test_inactive_and_missing_items() {
        let db = setup_db();
        let inventory = InventoryManager::new(&db);

        let item = inventory.create_item("Tape", "supplies", "rolls").unwrap();
        inventory.deactivate_item(&item.id).unwrap();

        assert!(matches!(
            inventory.add_stock(&item.id, &AddStockRequest::Direct { amount: 1.0 }),
            Err(InventoryError::ItemInactive(_))
        ));
        assert!(matches!(
            inventory.add_stock("missing", &AddStockRequest::Direct { amount: 1.0 }),
            Err(InventoryError::ItemNotFound(_))
        ));
        assert!(matches!(
            inventory.deactivate_item("missing"),
            Err(InventoryError::ItemNotFound(_))
        ));
        assert!(inventory.create_item(" ", "supplies", "pcs").is_err());
    }

    #[test]
    fn test_deduct_refuses_overdraw() {
        let db = setup_db();
        let inventory = InventoryManager::new(&db);

        let item = inventory.create_item("Syringe 5ml", "supplies", "pcs").unwrap();
        inventory
            .add_stock(&item.id, &AddStockRequest::Direct { amount: 3.0 })
            .unwrap();

        assert_eq!(deduct_stock_in(db.conn(), &item.id, 2.0).unwrap(), 1.0);
        assert!(matches!(
            deduct_stock_in(db.conn(), &item.id, 2.0),
            Err(InventoryError::InsufficientStock { .. })
        ));
        assert!(deduct_stock_in(db.conn(), &item.id, 0.0).is_err());
    }

    #[test]
    fn test_search_and_low_stock() {
        let db = setup_db();
        let inventory = InventoryManager::new(&db);

        let cannula = inventory.create_item("IV Cannula 22G", "supplies", "pcs").unwrap();
        let saline = inventory.create_item("Saline 500ml", "fluids", "bags").unwrap();
        inventory
            .add_stock(&saline.id, &AddStockRequest::Direct { amount: 40.0 })
            .unwrap();

        let results = inventory.search("cannula", 10).unwrap();
        assert_eq!(results[0].item.id, cannula.id);

        let low = inventory.low_stock(5.0).unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, cannula.id);
    }
}
