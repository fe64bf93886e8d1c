//! Treatment catalog database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Treatment, TreatmentConsumable};

const TREATMENT_COLUMNS: &str =
    "id, name, category, dosage_unit, common_doses, default_dose, consent_template_id, active";

impl Database {
    /// Insert or update a treatment.
    pub fn upsert_treatment(&self, treatment: &Treatment) -> DbResult<()> {
        let common_doses_json = serde_json::to_string(&treatment.common_doses)?;

        self.conn.execute(
            r#"
            INSERT INTO treatments (
                id, name, category, dosage_unit, common_doses, default_dose,
                consent_template_id, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                dosage_unit = excluded.dosage_unit,
                common_doses = excluded.common_doses,
                default_dose = excluded.default_dose,
                consent_template_id = excluded.consent_template_id,
                active = excluded.active
            "#,
            params![
                treatment.id,
                treatment.name,
                treatment.category,
                treatment.dosage_unit,
                common_doses_json,
                treatment.default_dose,
                treatment.consent_template_id,
                treatment.active,
            ],
        )?;
        Ok(())
    }

    /// Get a treatment by ID.
    pub fn get_treatment(&self, id: &str) -> DbResult<Option<Treatment>> {
        load_treatment(&self.conn, id)
    }

    /// List treatments ordered by category then name.
    pub fn list_treatments(&self, active_only: bool) -> DbResult<Vec<Treatment>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM treatments WHERE active = 1 ORDER BY category, name",
                TREATMENT_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM treatments ORDER BY category, name",
                TREATMENT_COLUMNS
            )
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_row)?;

        let mut treatments = Vec::new();
        for row in rows {
            treatments.push(row?.try_into()?);
        }
        Ok(treatments)
    }

    /// Mark treatment as inactive (soft delete).
    pub fn deactivate_treatment(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("UPDATE treatments SET active = 0 WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Set the default quantity of a consumable used by a treatment.
    pub fn set_treatment_consumable(&self, link: &TreatmentConsumable) -> DbResult<()> {
        if !(link.default_quantity > 0.0) {
            return Err(DbError::Constraint(
                "default quantity must be positive".into(),
            ));
        }
        self.conn.execute(
            r#"
            INSERT INTO treatment_consumables (treatment_id, stock_item_id, default_quantity)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(treatment_id, stock_item_id) DO UPDATE SET
                default_quantity = excluded.default_quantity
            "#,
            params![link.treatment_id, link.stock_item_id, link.default_quantity],
        )?;
        Ok(())
    }

    /// Remove a consumable from a treatment's defaults.
    pub fn remove_treatment_consumable(
        &self,
        treatment_id: &str,
        stock_item_id: &str,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM treatment_consumables WHERE treatment_id = ? AND stock_item_id = ?",
            [treatment_id, stock_item_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Default consumables for a treatment.
    pub fn list_treatment_consumables(
        &self,
        treatment_id: &str,
    ) -> DbResult<Vec<TreatmentConsumable>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT treatment_id, stock_item_id, default_quantity
            FROM treatment_consumables
            WHERE treatment_id = ?
            ORDER BY stock_item_id
            "#,
        )?;

        let rows = stmt.query_map([treatment_id], |row| {
            Ok(TreatmentConsumable {
                treatment_id: row.get(0)?,
                stock_item_id: row.get(1)?,
                default_quantity: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

pub(crate) fn load_treatment(conn: &Connection, id: &str) -> DbResult<Option<Treatment>> {
    conn.query_row(
        &format!("SELECT {} FROM treatments WHERE id = ?", TREATMENT_COLUMNS),
        [id],
        read_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Intermediate row struct for database mapping.
struct TreatmentRow {
    id: String,
    name: String,
    category: String,
    dosage_unit: String,
    common_doses: String,
    default_dose: Option<String>,
    consent_template_id: Option<String>,
    active: bool,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<TreatmentRow> {
    Ok(TreatmentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        dosage_unit: row.get(3)?,
        common_doses: row.get(4)?,
        default_dose: row.get(5)?,
        consent_template_id: row.get(6)?,
        active: row.get(7)?,
    })
}

impl TryFrom<TreatmentRow> for Treatment {
    type Error = DbError;

    fn try_from(row: TreatmentRow) -> Result<Self, Self::Error> {
        Ok(Treatment {
            id: row.id,
            name: row.name,
            category: row.category,
            dosage_unit: row.dosage_unit,
            common_doses: serde_json::from_str(&row.common_doses)?,
            default_dose: row.default_dose,
            consent_template_id: row.consent_template_id,
            active: row.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockItem;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();

        let mut treatment = Treatment::new("Vitamin C".into(), "IV therapy".into(), "mg".into());
        treatment.common_doses = vec!["5000".into(), "10000".into()];
        db.upsert_treatment(&treatment).unwrap();

        let retrieved = db.get_treatment(&treatment.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Vitamin C");
        assert_eq!(retrieved.common_doses, vec!["5000", "10000"]);

        treatment.default_dose = Some("10000".into());
        db.upsert_treatment(&treatment).unwrap();
        let retrieved = db.get_treatment(&treatment.id).unwrap().unwrap();
        assert_eq!(retrieved.default_dose, Some("10000".into()));
    }

    #[test]
    fn test_list_and_deactivate() {
        let db = setup_db();

        let a = Treatment::new("B12".into(), "injectables".into(), "mcg".into());
        let b = Treatment::new("NAD+".into(), "IV therapy".into(), "mg".into());
        db.upsert_treatment(&a).unwrap();
        db.upsert_treatment(&b).unwrap();

        assert_eq!(db.list_treatments(true).unwrap().len(), 2);

        db.deactivate_treatment(&a.id).unwrap();
        let active = db.list_treatments(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
        assert_eq!(db.list_treatments(false).unwrap().len(), 2);
    }

    #[test]
    fn test_treatment_consumables() {
        let db = setup_db();

        let treatment = Treatment::new("NAD+".into(), "IV therapy".into(), "mg".into());
        db.upsert_treatment(&treatment).unwrap();
        let cannula = StockItem::new("IV cannula".into(), "supplies".into(), "pcs".into());
        db.insert_stock_item(&cannula).unwrap();

        let mut link = TreatmentConsumable {
            treatment_id: treatment.id.clone(),
            stock_item_id: cannula.id.clone(),
            default_quantity: 1.0,
        };
        db.set_treatment_consumable(&link).unwrap();

        link.default_quantity = 2.0;
        db.set_treatment_consumable(&link).unwrap();

        let links = db.list_treatment_consumables(&treatment.id).unwrap();
        assert_eq!(links, vec![link.clone()]);

        link.default_quantity = 0.0;
        assert!(db.set_treatment_consumable(&link).is_err());

        assert!(db
            .remove_treatment_consumable(&treatment.id, &cannula.id)
            .unwrap());
        assert!(db.list_treatment_consumables(&treatment.id).unwrap().is_empty());
    }
}
