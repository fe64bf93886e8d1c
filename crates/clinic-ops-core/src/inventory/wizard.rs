//! Add-stock wizard as an explicit state record and a pure reducer.
//!
//! Unconfigured items walk `Packaging -> BaseUnit -> Quantity -> Ready`.
//! Items that already have packaging start at `Quantity`.

use serde::{Deserialize, Serialize};

use super::conversion::{AddStockRequest, PackagingSetup, StockAddition};
use crate::models::{Packaging, StockItem};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Packaging,
    BaseUnit,
    Quantity,
    Ready,
}

/// How the quantity step is counted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    BaseUnits,
    Packages,
}

/// Wizard state for one stock item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddStockWizard {
    pub step: WizardStep,
    /// Packaging already stored on the item
    pub existing: Packaging,
    pub packaging_unit: Option<String>,
    pub base_unit: Option<String>,
    pub units_per_package: Option<f64>,
    pub mode: EntryMode,
    pub amount: Option<f64>,
    /// Last validation message, cleared on the next accepted action
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WizardAction {
    SetPackagingUnit { packaging_unit: String },
    /// Add in base units without configuring packaging
    SkipPackaging,
    SetBaseUnit {
        base_unit: String,
        units_per_package: f64,
    },
    SetMode { mode: EntryMode },
    SetAmount { amount: f64 },
    Back,
    Reset,
}

impl AddStockWizard {
    /// Initial state for an item.
    pub fn for_item(item: &StockItem) -> Self {
        Self::start(item.packaging.clone())
    }

    fn start(existing: Packaging) -> Self {
        let configured = existing.is_configured();
        Self {
            step: if configured {
                WizardStep::Quantity
            } else {
                WizardStep::Packaging
            },
            packaging_unit: existing.packaging_unit().map(str::to_string),
            base_unit: Some(existing.base_unit().to_string()),
            units_per_package: existing.units_per_package(),
            mode: if configured {
                EntryMode::Packages
            } else {
                EntryMode::BaseUnits
            },
            amount: None,
            error: None,
            existing,
        }
    }

    /// The request to submit once the wizard is `Ready`.
    pub fn request(&self) -> Option<AddStockRequest> {
        if self.step != WizardStep::Ready {
            return None;
        }
        let amount = self.amount?;

        match (self.mode, self.existing.is_configured()) {
            (EntryMode::BaseUnits, _) => Some(AddStockRequest::Direct { amount }),
            (EntryMode::Packages, true) => Some(AddStockRequest::Packages { count: amount }),
            (EntryMode::Packages, false) => Some(AddStockRequest::ConfigureAndAdd {
                setup: PackagingSetup {
                    packaging_unit: self.packaging_unit.clone()?,
                    base_unit: self.base_unit.clone()?,
                    units_per_package: self.units_per_package?,
                },
                count: amount,
            }),
        }
    }

    /// Base units the current entry would add, for the live preview.
    pub fn preview_quantity(&self) -> Option<f64> {
        let amount = self.amount?;
        let addition = match self.mode {
            EntryMode::BaseUnits => StockAddition::Direct { amount },
            EntryMode::Packages => StockAddition::Packages {
                count: amount,
                units_per_package: self.units_per_package?,
            },
        };
        addition.quantity().ok()
    }

    fn reject(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }
}

/// Apply one user action. Invalid actions leave the step unchanged and set `error`.
pub fn reduce(state: AddStockWizard, action: WizardAction) -> AddStockWizard {
    let mut next = state;

    match (next.step, action) {
        (_, WizardAction::Reset) => AddStockWizard::start(next.existing),

        (WizardStep::Packaging, WizardAction::SetPackagingUnit { packaging_unit }) => {
            let packaging_unit = packaging_unit.trim();
            if packaging_unit.is_empty() {
                return next.reject("Enter a packaging unit");
            }
            next.packaging_unit = Some(packaging_unit.to_string());
            next.step = WizardStep::BaseUnit;
            next.error = None;
            next
        }

        (WizardStep::Packaging, WizardAction::SkipPackaging) => {
            next.packaging_unit = None;
            next.units_per_package = None;
            next.mode = EntryMode::BaseUnits;
            next.step = WizardStep::Quantity;
            next.error = None;
            next
        }

        (
            WizardStep::BaseUnit,
            WizardAction::SetBaseUnit {
                base_unit,
                units_per_package,
            },
        ) => {
            let base_unit = base_unit.trim();
            if base_unit.is_empty() {
                return next.reject("Enter a base unit");
            }
            if !units_per_package.is_finite() || units_per_package <= 0.0 {
                return next.reject("Units per package must be greater than zero");
            }
            next.base_unit = Some(base_unit.to_string());
            next.units_per_package = Some(units_per_package);
            next.mode = EntryMode::Packages;
            next.step = WizardStep::Quantity;
            next.error = None;
            next
        }

        (WizardStep::Quantity, WizardAction::SetMode { mode }) => {
            if mode == EntryMode::Packages && next.units_per_package.is_none() {
                return next.reject("Packaging is not configured for this item");
            }
            next.mode = mode;
            next.error = None;
            next
        }

        (WizardStep::Quantity, WizardAction::SetAmount { amount }) => {
            next.amount = Some(amount);
            if next.preview_quantity().is_none() {
                return next.reject("Quantity to add must be greater than zero");
            }
            next.step = WizardStep::Ready;
            next.error = None;
            next
        }

        (WizardStep::BaseUnit, WizardAction::Back) => {
            next.step = WizardStep::Packaging;
            next.error = None;
            next
        }

        (WizardStep::Quantity, WizardAction::Back) => {
            if !next.existing.is_configured() {
                next.step = if next.packaging_unit.is_some() {
                    WizardStep::BaseUnit
                } else {
                    WizardStep::Packaging
                };
            }
            next.error = None;
            next
        }

        (WizardStep::Ready, WizardAction::Back) => {
            next.step = WizardStep::Quantity;
            next.error = None;
            next
        }

        _ => next.reject("Action not available at this step"),
    }
}
