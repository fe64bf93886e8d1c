//! Packaging-unit to base-unit quantity arithmetic.

use serde::{Deserialize, Serialize};

use super::{InventoryError, InventoryResult};
use crate::models::Packaging;

/// An amount of stock to add, before conversion to base units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockAddition {
    /// Already in base units
    Direct { amount: f64 },
    /// Whole or partial packages, each holding `units_per_package` base units
    Packages { count: f64, units_per_package: f64 },
}

impl StockAddition {
    /// Base-unit quantity to add. Zero, negative and non-finite results are rejected.
    pub fn quantity(&self) -> InventoryResult<f64> {
        let quantity = match *self {
            StockAddition::Direct { amount } => amount,
            StockAddition::Packages {
                count,
                units_per_package,
            } => count * units_per_package,
        };

        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(InventoryError::InvalidQuantity(format!(
                "quantity to add must be greater than zero, got {}",
                quantity
            )));
        }
        Ok(quantity)
    }
}

/// Packaging details entered the first time an item is packaged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackagingSetup {
    pub packaging_unit: String,
    pub base_unit: String,
    pub units_per_package: f64,
}

impl PackagingSetup {
    pub fn validate(&self) -> InventoryResult<()> {
        if self.packaging_unit.trim().is_empty() || self.base_unit.trim().is_empty() {
            return Err(InventoryError::InvalidPackaging(
                "packaging unit and base unit are required".into(),
            ));
        }
        if !self.units_per_package.is_finite() || self.units_per_package <= 0.0 {
            return Err(InventoryError::InvalidPackaging(format!(
                "units per package must be greater than zero, got {}",
                self.units_per_package
            )));
        }
        Ok(())
    }

    pub fn into_packaging(self) -> Packaging {
        Packaging::Configured {
            packaging_unit: self.packaging_unit.trim().to_string(),
            base_unit: self.base_unit.trim().to_string(),
            units_per_package: self.units_per_package,
        }
    }
}

/// What a staff member asked to add to one stock item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddStockRequest {
    /// Base units, whatever the packaging
    Direct { amount: f64 },
    /// Packages, converted with the item's stored factor
    Packages { count: f64 },
    /// Establish packaging on an unconfigured item and add `count` packages
    ConfigureAndAdd { setup: PackagingSetup, count: f64 },
}

impl AddStockRequest {
    /// Resolve against the item's current packaging.
    pub fn addition(&self, packaging: &Packaging) -> InventoryResult<StockAddition> {
        match (self, packaging) {
            (AddStockRequest::Direct { amount }, _) => Ok(StockAddition::Direct { amount: *amount }),
            (AddStockRequest::Packages { count }, Packaging::Configured { units_per_package, .. }) => {
                Ok(StockAddition::Packages {
                    count: *count,
                    units_per_package: *units_per_package,
                })
            }
            (AddStockRequest::Packages { .. }, Packaging::Unconfigured { .. }) => {
                Err(InventoryError::PackagingNotConfigured)
            }
            (AddStockRequest::ConfigureAndAdd { setup, count }, Packaging::Unconfigured { .. }) => {
                setup.validate()?;
                Ok(StockAddition::Packages {
                    count: *count,
                    units_per_package: setup.units_per_package,
                })
            }
            (AddStockRequest::ConfigureAndAdd { .. }, Packaging::Configured { .. }) => {
                Err(InventoryError::PackagingAlreadyConfigured)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn boxes() -> Packaging {
        Packaging::Configured {
            packaging_unit: "Box".into(),
            base_unit: "pcs".into(),
            units_per_package: 10.0,
        }
    }

    fn loose() -> Packaging {
        Packaging::Unconfigured { unit: "pcs".into() }
    }

    #[test]
    fn test_direct_quantity() {
        assert_eq!(StockAddition::Direct { amount: 7.5 }.quantity().unwrap(), 7.5);
    }

    #[test]
    fn test_package_quantity() {
        let addition = StockAddition::Packages {
            count: 3.0,
            units_per_package: 10.0,
        };
        assert_eq!(addition.quantity().unwrap(), 30.0);
    }

    #[test]
    fn test_rejects_non_positive() {
        for addition in [
            StockAddition::Direct { amount: 0.0 },
            StockAddition::Direct { amount: -2.0 },
            StockAddition::Direct { amount: f64::NAN },
            StockAddition::Packages {
                count: 0.0,
                units_per_package: 10.0,
            },
            StockAddition::Packages {
                count: 2.0,
                units_per_package: -1.0,
            },
        ] {
            assert!(matches!(
                addition.quantity(),
                Err(InventoryError::InvalidQuantity(_))
            ));
        }
    }

    #[test]
    fn test_request_resolution() {
        let packages = AddStockRequest::Packages { count: 2.0 };
        assert_eq!(
            packages.addition(&boxes()).unwrap().quantity().unwrap(),
            20.0
        );
        assert!(matches!(
            packages.addition(&loose()),
            Err(InventoryError::PackagingNotConfigured)
        ));

        let configure = AddStockRequest::ConfigureAndAdd {
            setup: PackagingSetup {
                packaging_unit: "Box".into(),
                base_unit: "pcs".into(),
                units_per_package: 10.0,
            },
            count: 3.0,
        };
        assert_eq!(
            configure.addition(&loose()).unwrap().quantity().unwrap(),
            30.0
        );
        assert!(matches!(
            configure.addition(&boxes()),
            Err(InventoryError::PackagingAlreadyConfigured)
        ));
    }

    #[test]
    fn test_setup_validation() {
        let mut setup = PackagingSetup {
            packaging_unit: " ".into(),
            base_unit: "pcs".into(),
            units_per_package: 10.0,
        };
        assert!(setup.validate().is_err());

        setup.packaging_unit = "Box".into();
        setup.units_per_package = 0.0;
        assert!(setup.validate().is_err());

        setup.units_per_package = 12.0;
        assert!(setup.validate().is_ok());
        assert_eq!(setup.into_packaging().units_per_package(), Some(12.0));
    }

    proptest! {
        #[test]
        fn prop_package_quantity_is_product(count in 1u32..1_000, units in 1u32..1_000) {
            let addition = StockAddition::Packages {
                count: f64::from(count),
                units_per_package: f64::from(units),
            };
            prop_assert_eq!(addition.quantity().unwrap(), f64::from(count) * f64::from(units));
        }

        #[test]
        fn prop_direct_quantity_is_identity(amount in 0.001f64..1.0e9) {
            prop_assert_eq!(StockAddition::Direct { amount }.quantity().unwrap(), amount);
        }
    }
}
