//! Consumable stock models.

use serde::{Deserialize, Serialize};

use super::{new_id, now};

/// How a stock item is packaged.
///
/// Items start `Unconfigured` and move to `Configured` once, typically on the
/// first stock addition that names a packaging unit. `current_stock` is always
/// denominated in the base unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packaging {
    /// Only a base unit is known (e.g., "pcs")
    Unconfigured { unit: String },
    /// One `packaging_unit` holds `units_per_package` of `base_unit`
    Configured {
        packaging_unit: String,
        base_unit: String,
        units_per_package: f64,
    },
}

impl Packaging {
    /// The unit `current_stock` is counted in.
    pub fn base_unit(&self) -> &str {
        match self {
            Packaging::Unconfigured { unit } => unit,
            Packaging::Configured { base_unit, .. } => base_unit,
        }
    }

    pub fn packaging_unit(&self) -> Option<&str> {
        match self {
            Packaging::Unconfigured { .. } => None,
            Packaging::Configured { packaging_unit, .. } => Some(packaging_unit),
        }
    }

    pub fn units_per_package(&self) -> Option<f64> {
        match self {
            Packaging::Unconfigured { .. } => None,
            Packaging::Configured {
                units_per_package, ..
            } => Some(*units_per_package),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Packaging::Configured { .. })
    }

    /// Build from the nullable column triple; partial packaging columns are rejected.
    pub fn from_columns(
        unit: String,
        packaging_unit: Option<String>,
        units_per_package: Option<f64>,
    ) -> Option<Self> {
        match (packaging_unit, units_per_package) {
            (None, None) => Some(Packaging::Unconfigured { unit }),
            (Some(packaging_unit), Some(units_per_package)) => Some(Packaging::Configured {
                packaging_unit,
                base_unit: unit,
                units_per_package,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StockStatus {
    Active,
    Inactive,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Active => "active",
            StockStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(StockStatus::Active),
            "inactive" => Some(StockStatus::Inactive),
            _ => None,
        }
    }
}

/// A consumable inventory line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockItem {
    pub id: String,
    pub item_name: String,
    pub category: String,
    pub packaging: Packaging,
    /// Non-negative, in `packaging.base_unit()`
    pub current_stock: f64,
    pub status: StockStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl StockItem {
    /// A new item with no stock and no packaging.
    pub fn new(item_name: String, category: String, unit: String) -> Self {
        let now = now();
        Self {
            id: new_id(),
            item_name,
            category,
            packaging: Packaging::Unconfigured { unit },
            current_stock: 0.0,
            status: StockStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn unit(&self) -> &str {
        self.packaging.base_unit()
    }

    /// Stock expressed in whole and partial packages, when packaging is known.
    pub fn stock_in_packages(&self) -> Option<f64> {
        self.packaging
            .units_per_package()
            .filter(|u| *u > 0.0)
            .map(|u| self.current_stock / u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_unconfigured() {
        let item = StockItem::new("Syringe 5ml".into(), "supplies".into(), "pcs".into());
        assert_eq!(item.unit(), "pcs");
        assert!(!item.packaging.is_configured());
        assert_eq!(item.current_stock, 0.0);
        assert_eq!(item.stock_in_packages(), None);
    }

    #[test]
    fn test_from_columns() {
        assert_eq!(
            Packaging::from_columns("pcs".into(), None, None),
            Some(Packaging::Unconfigured { unit: "pcs".into() })
        );
        assert_eq!(
            Packaging::from_columns("pcs".into(), Some("Box".into()), Some(10.0)),
            Some(Packaging::Configured {
                packaging_unit: "Box".into(),
                base_unit: "pcs".into(),
                units_per_package: 10.0,
            })
        );
        assert_eq!(
            Packaging::from_columns("pcs".into(), Some("Box".into()), None),
            None
        );
    }

    #[test]
    fn test_stock_in_packages() {
        let mut item = StockItem::new("Gloves".into(), "supplies".into(), "pcs".into());
        item.packaging = Packaging::Configured {
            packaging_unit: "Box".into(),
            base_unit: "pcs".into(),
            units_per_package: 100.0,
        };
        item.current_stock = 250.0;
        assert_eq!(item.stock_in_packages(), Some(2.5));
    }
}
