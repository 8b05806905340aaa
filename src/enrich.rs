// Derived-column stage: shortfall, per-line dispensing rate and catalog
// names. Operates row by row, never dropping anything; division by zero is
// defined as 0 rather than being an error.
use crate::catalog::Catalogs;
use crate::types::{EnrichedRow, NormalizedRow};

pub fn enrich(rows: Vec<NormalizedRow>, catalogs: &Catalogs) -> Vec<EnrichedRow> {
    rows.into_iter()
        .map(|row| enrich_row(row, catalogs))
        .collect()
}

fn enrich_row(row: NormalizedRow, catalogs: &Catalogs) -> EnrichedRow {
    // Null quantities count as 0 for the derived metrics.
    let prescribed = row.quantity_prescribed.unwrap_or(0);
    let dispensed = row.quantity_dispensed.unwrap_or(0);
    let shortfall = (prescribed - dispensed).max(0);
    let dispensing_rate_line = if prescribed > 0 {
        (dispensed as f64 / prescribed as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };

    EnrichedRow {
        physician_name: catalogs.physicians.name_for(row.physician_id).to_string(),
        medication_name: catalogs.medications.name_for(row.medication_id).to_string(),
        pharmacy_name: catalogs.pharmacies.name_for(row.pharmacy_id).to_string(),
        base: row,
        shortfall,
        dispensing_rate_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(prescribed: Option<i32>, dispensed: Option<i32>) -> NormalizedRow {
        NormalizedRow {
            prescription_id: 1,
            patient_id: 1,
            physician_id: 1,
            pharmacy_id: 1,
            medication_id: 1,
            quantity_prescribed: prescribed,
            quantity_dispensed: dispensed,
            stock_at_pharmacy: None,
            is_chronic: false,
            need_date: None,
            year: None,
            month: None,
        }
    }

    #[test]
    fn shortfall_is_floored_at_zero() {
        let out = enrich(
            vec![row(Some(10), Some(4)), row(Some(5), Some(9))],
            &Catalogs::empty(),
        );
        assert_eq!(out[0].shortfall, 6);
        assert_eq!(out[1].shortfall, 0);
    }

    #[test]
    fn rate_is_defined_and_bounded() {
        let out = enrich(
            vec![
                row(Some(10), Some(8)),
                row(Some(0), Some(0)),
                row(None, None),
                row(Some(5), Some(9)),
            ],
            &Catalogs::empty(),
        );
        assert_eq!(out[0].dispensing_rate_line, 0.8);
        assert_eq!(out[1].dispensing_rate_line, 0.0);
        assert_eq!(out[2].dispensing_rate_line, 0.0);
        // over-dispensed lines clamp to 1 to keep the rate in [0, 1]
        assert_eq!(out[3].dispensing_rate_line, 1.0);
        for r in &out {
            assert!((0.0..=1.0).contains(&r.dispensing_rate_line));
        }
    }

    #[test]
    fn joins_placeholders_when_catalogs_are_empty() {
        let out = enrich(vec![row(Some(1), Some(1))], &Catalogs::empty());
        assert_eq!(out[0].physician_name, "Médico sin nombre");
        assert_eq!(out[0].medication_name, "Sin descripción");
        assert_eq!(out[0].pharmacy_name, "Farmacia desconocida");
    }

    #[test]
    fn never_drops_rows() {
        let rows: Vec<NormalizedRow> = (0..37).map(|_| row(Some(1), Some(1))).collect();
        assert_eq!(enrich(rows, &Catalogs::empty()).len(), 37);
    }
}
