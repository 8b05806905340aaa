use crate::error::Result;
use crate::reports::FilterLists;
use crate::types::{
    Alert, LastUpdate, MedicationRankingRow, MonthlySummaryRow, PharmacySummaryRow,
    PhysicianSummaryRow, RunMetadata,
};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

/// Everything one run publishes. Each table is retrievable by the file name
/// the dashboard already fetches; a run overwrites the previous one in full.
pub struct DashboardOutputs {
    pub resumen_mensual: Vec<MonthlySummaryRow>,
    pub top_medicamentos: Vec<MedicationRankingRow>,
    pub top_farmacias: Vec<PharmacySummaryRow>,
    pub top_medicos: Vec<PhysicianSummaryRow>,
    pub alertas: Vec<Alert>,
    pub metadata: RunMetadata,
    pub last_update: LastUpdate,
    pub filtros: FilterLists,
}

pub fn write_all(dir: &Path, outputs: &DashboardOutputs) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_json(dir, "resumen_mensual.json", &outputs.resumen_mensual)?;
    write_json(dir, "top_medicamentos.json", &outputs.top_medicamentos)?;
    write_json(dir, "top_farmacias.json", &outputs.top_farmacias)?;
    write_json(dir, "top_medicos.json", &outputs.top_medicos)?;
    write_json(dir, "alertas.json", &outputs.alertas)?;
    write_json(dir, "metadata.json", &outputs.metadata)?;
    write_json(dir, "last_update.json", &outputs.last_update)?;
    write_json(dir, "filtro_farmacias.json", &outputs.filtros.farmacias)?;
    write_json(dir, "filtro_medicos.json", &outputs.filtros.medicos)?;
    write_json(dir, "filtro_medicamentos.json", &outputs.filtros.medicamentos)?;
    Ok(())
}

pub fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let s = serde_json::to_string_pretty(value)?;
    fs::write(&path, s)?;
    info!("wrote {}", path.display());
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertDetail;
    use chrono::Utc;

    fn sample_outputs() -> DashboardOutputs {
        let now = Utc::now();
        DashboardOutputs {
            resumen_mensual: vec![MonthlySummaryRow {
                anio: 2025,
                mes: 1,
                total_lineas: 3,
                recetas_unicas: 3,
                pacientes_unicos: 2,
                medicos_unicos: 1,
                farmacias_activas: 1,
                total_recetado: 25,
                total_dispensado: 20,
                total_faltante: 5,
                pacientes_cronicos: 0,
                tasa_dispensacion_media: 0.833,
                tasa_dispensacion_global: 0.8,
                tasa_faltante: 0.2,
            }],
            top_medicamentos: vec![],
            top_farmacias: vec![PharmacySummaryRow {
                id: 12,
                nombre: "FARMACIA CENTRAL".to_string(),
                total_lineas: 3,
                pacientes_atendidos: 2,
                medicamentos_unicos: 2,
                total_recetado: 25,
                total_dispensado: 20,
                eficiencia: 80.0,
            }],
            top_medicos: vec![],
            alertas: vec![Alert {
                tipo: "danger".to_string(),
                icon: "fa-exclamation-triangle".to_string(),
                titulo: "Stock crítico en farmacias".to_string(),
                descripcion: "1 medicamentos con existencias por debajo de 100 unidades"
                    .to_string(),
                detalle: AlertDetail::StockCritico {
                    medicamentos: vec![7],
                },
            }],
            metadata: RunMetadata {
                generated_at: now,
                total_records: 3,
                total_pacientes: 2,
                total_medicos: 1,
                total_farmacias: 1,
                total_medicamentos: 2,
                total_recetado: 25,
                total_dispensado: 20,
                total_faltante: 5,
                fecha_minima: None,
                fecha_maxima: None,
            },
            last_update: LastUpdate { last_updated: now },
            filtros: FilterLists {
                farmacias: vec![],
                medicos: vec![],
                medicamentos: vec![],
            },
        }
    }

    #[test]
    fn writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("data");
        write_all(&out, &sample_outputs()).unwrap();

        for name in [
            "resumen_mensual.json",
            "top_medicamentos.json",
            "top_farmacias.json",
            "top_medicos.json",
            "alertas.json",
            "metadata.json",
            "last_update.json",
            "filtro_farmacias.json",
            "filtro_medicos.json",
            "filtro_medicamentos.json",
        ] {
            assert!(out.join(name).exists(), "missing {name}");
        }
    }

    #[test]
    fn emits_the_field_names_the_dashboard_reads() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_path_buf();
        write_all(&out, &sample_outputs()).unwrap();

        let farmacias: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("top_farmacias.json")).unwrap())
                .unwrap();
        let first = &farmacias[0];
        assert_eq!(first["id"], 12);
        assert_eq!(first["totalLineas"], 3);
        assert_eq!(first["pacientesAtendidos"], 2);
        assert_eq!(first["medicamentosUnicos"], 2);
        assert_eq!(first["eficiencia"], 80.0);

        let alertas: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("alertas.json")).unwrap()).unwrap();
        assert_eq!(alertas[0]["tipo"], "danger");
        assert_eq!(alertas[0]["categoria"], "stock_critico");
        assert_eq!(alertas[0]["medicamentos"][0], 7);

        let resumen: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("resumen_mensual.json")).unwrap())
                .unwrap();
        assert_eq!(resumen[0]["total_recetado"], 25);
        assert_eq!(resumen[0]["tasa_dispensacion_global"], 0.8);
    }

    #[test]
    fn serialization_is_deterministic() {
        let outputs = sample_outputs();
        let a = serde_json::to_string_pretty(&outputs.resumen_mensual).unwrap();
        let b = serde_json::to_string_pretty(&outputs.resumen_mensual).unwrap();
        assert_eq!(a, b);
    }
}
