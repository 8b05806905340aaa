use crate::catalog::PHYSICIAN_PLACEHOLDER;
use crate::types::{
    Alert, AlertDetail, EnrichedRow, MedicationFilterEntry, MedicationRankingRow,
    MonthlySummaryRow, PharmacyFilterEntry, PharmacySummaryRow, PhysicianFilterEntry,
    PhysicianSummaryRow, RunMetadata,
};
use crate::util::{average, format_int, ratio, round1, round3};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

pub const STOCK_CRITICAL_THRESHOLD: i32 = 100;
pub const LOW_DISPENSING_THRESHOLD: f64 = 0.7;
const STOCK_ALERT_TOP: usize = 5;
const LOW_RATE_ALERT_TOP: usize = 3;

// Every generator below is an independent pass over the same immutable
// enriched table. Rows without a parsed date carry no (year, month) and are
// skipped by the month-partitioned generators only; the global ones and the
// run metadata still count them.

pub fn generate_monthly_summary(data: &[EnrichedRow]) -> Vec<MonthlySummaryRow> {
    #[derive(Default)]
    struct Acc {
        lineas: usize,
        recetas: HashSet<i64>,
        pacientes: HashSet<i64>,
        medicos: HashSet<i32>,
        farmacias: HashSet<i32>,
        recetado: i64,
        dispensado: i64,
        faltante: i64,
        cronicos: usize,
        tasas: Vec<f64>,
    }

    // BTreeMap keyed by (year, month) yields the ascending output order.
    let mut map: BTreeMap<(i16, u8), Acc> = BTreeMap::new();
    for r in data {
        let (Some(year), Some(month)) = (r.base.year, r.base.month) else {
            continue;
        };
        let e = map.entry((year, month)).or_default();
        e.lineas += 1;
        e.recetas.insert(r.base.prescription_id);
        e.pacientes.insert(r.base.patient_id);
        e.medicos.insert(r.base.physician_id);
        e.farmacias.insert(r.base.pharmacy_id);
        e.recetado += i64::from(r.base.quantity_prescribed.unwrap_or(0));
        e.dispensado += i64::from(r.base.quantity_dispensed.unwrap_or(0));
        e.faltante += i64::from(r.shortfall);
        if r.base.is_chronic {
            e.cronicos += 1;
        }
        e.tasas.push(r.dispensing_rate_line);
    }

    map.into_iter()
        .map(|((anio, mes), acc)| MonthlySummaryRow {
            anio,
            mes,
            total_lineas: acc.lineas,
            recetas_unicas: acc.recetas.len(),
            pacientes_unicos: acc.pacientes.len(),
            medicos_unicos: acc.medicos.len(),
            farmacias_activas: acc.farmacias.len(),
            total_recetado: acc.recetado,
            total_dispensado: acc.dispensado,
            total_faltante: acc.faltante,
            pacientes_cronicos: acc.cronicos,
            tasa_dispensacion_media: round3(average(&acc.tasas)),
            tasa_dispensacion_global: round3(ratio(acc.dispensado, acc.recetado)),
            tasa_faltante: round3(ratio(acc.faltante, acc.recetado)),
        })
        .collect()
}

pub fn generate_top_medications(data: &[EnrichedRow]) -> Vec<MedicationRankingRow> {
    #[derive(Default)]
    struct Acc {
        nombre: String,
        lineas: usize,
        recetado: i64,
        dispensado: i64,
        faltante: i64,
    }

    let mut map: HashMap<(i16, u8, i32), Acc> = HashMap::new();
    for r in data {
        let (Some(year), Some(month)) = (r.base.year, r.base.month) else {
            continue;
        };
        let e = map.entry((year, month, r.base.medication_id)).or_default();
        if e.nombre.is_empty() {
            e.nombre = r.medication_name.clone();
        }
        e.lineas += 1;
        e.recetado += i64::from(r.base.quantity_prescribed.unwrap_or(0));
        e.dispensado += i64::from(r.base.quantity_dispensed.unwrap_or(0));
        e.faltante += i64::from(r.shortfall);
    }

    let mut partitions: BTreeMap<(i16, u8), Vec<MedicationRankingRow>> = BTreeMap::new();
    for ((anio, mes, medicamento_sap), acc) in map {
        partitions
            .entry((anio, mes))
            .or_default()
            .push(MedicationRankingRow {
                anio,
                mes,
                medicamento_sap,
                nombre_medicamento: acc.nombre,
                lineas: acc.lineas,
                recetado: acc.recetado,
                dispensado: acc.dispensado,
                faltante: acc.faltante,
                tasa_global: round3(ratio(acc.dispensado, acc.recetado)),
                ranking_mes: 0,
            });
    }

    // Dense rank per partition: sort by line count descending, then scan,
    // incrementing the rank only when the value changes so ties share it.
    let mut rows = Vec::new();
    for (_, mut partition) in partitions {
        partition.sort_by(|a, b| {
            b.lineas
                .cmp(&a.lineas)
                .then(a.medicamento_sap.cmp(&b.medicamento_sap))
        });
        let mut rank = 0usize;
        let mut prev = None;
        for mut row in partition {
            if prev != Some(row.lineas) {
                rank += 1;
                prev = Some(row.lineas);
            }
            row.ranking_mes = rank;
            rows.push(row);
        }
    }
    rows
}

pub fn generate_top_pharmacies(data: &[EnrichedRow]) -> Vec<PharmacySummaryRow> {
    #[derive(Default)]
    struct Acc {
        nombre: String,
        lineas: usize,
        pacientes: HashSet<i64>,
        medicamentos: HashSet<i32>,
        recetado: i64,
        dispensado: i64,
    }

    // Cumulative year-to-date view: keyed by pharmacy alone, undated rows in.
    let mut map: HashMap<i32, Acc> = HashMap::new();
    for r in data {
        let e = map.entry(r.base.pharmacy_id).or_default();
        if e.nombre.is_empty() {
            e.nombre = r.pharmacy_name.clone();
        }
        e.lineas += 1;
        e.pacientes.insert(r.base.patient_id);
        e.medicamentos.insert(r.base.medication_id);
        e.recetado += i64::from(r.base.quantity_prescribed.unwrap_or(0));
        e.dispensado += i64::from(r.base.quantity_dispensed.unwrap_or(0));
    }

    let mut rows: Vec<PharmacySummaryRow> = map
        .into_iter()
        .map(|(id, acc)| PharmacySummaryRow {
            id,
            nombre: acc.nombre,
            total_lineas: acc.lineas,
            pacientes_atendidos: acc.pacientes.len(),
            medicamentos_unicos: acc.medicamentos.len(),
            total_recetado: acc.recetado,
            total_dispensado: acc.dispensado,
            eficiencia: round1(ratio(acc.dispensado, acc.recetado) * 100.0),
        })
        .collect();
    rows.sort_by(|a, b| b.total_lineas.cmp(&a.total_lineas).then(a.id.cmp(&b.id)));
    rows
}

pub fn generate_top_physicians(data: &[EnrichedRow], cap: usize) -> Vec<PhysicianSummaryRow> {
    #[derive(Default)]
    struct Acc {
        nombre: String,
        recetas: HashSet<i64>,
        pacientes: HashSet<i64>,
        medicamentos: HashSet<i32>,
    }

    let mut map: HashMap<i32, Acc> = HashMap::new();
    for r in data {
        let e = map.entry(r.base.physician_id).or_default();
        if e.nombre.is_empty() {
            e.nombre = r.physician_name.clone();
        }
        e.recetas.insert(r.base.prescription_id);
        e.pacientes.insert(r.base.patient_id);
        e.medicamentos.insert(r.base.medication_id);
    }

    let mut rows: Vec<PhysicianSummaryRow> = map
        .into_iter()
        .map(|(id, acc)| PhysicianSummaryRow {
            id,
            // The catalog placeholder is replaced by an id-derived display
            // name so two unnamed physicians stay distinguishable.
            nombre: if acc.nombre == PHYSICIAN_PLACEHOLDER {
                format!("Médico {id}")
            } else {
                acc.nombre
            },
            recetas: acc.recetas.len(),
            pacientes: acc.pacientes.len(),
            medicamentos: acc.medicamentos.len(),
        })
        .collect();
    rows.sort_by(|a, b| b.recetas.cmp(&a.recetas).then(a.id.cmp(&b.id)));
    rows.truncate(cap);
    rows
}

pub fn generate_alerts(data: &[EnrichedRow]) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let mut stock_counts: HashMap<i32, usize> = HashMap::new();
    for r in data {
        if r.base
            .stock_at_pharmacy
            .is_some_and(|s| s < STOCK_CRITICAL_THRESHOLD)
        {
            *stock_counts.entry(r.base.medication_id).or_default() += 1;
        }
    }
    if !stock_counts.is_empty() {
        let affected = stock_counts.len();
        let mut counts: Vec<(i32, usize)> = stock_counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(STOCK_ALERT_TOP);
        let medicamentos: Vec<i32> = counts.into_iter().map(|(id, _)| id).collect();
        alerts.push(Alert {
            tipo: "danger".to_string(),
            icon: "fa-exclamation-triangle".to_string(),
            titulo: "Stock crítico en farmacias".to_string(),
            descripcion: format!(
                "{} medicamentos con existencias por debajo de {} unidades",
                format_int(affected),
                STOCK_CRITICAL_THRESHOLD
            ),
            detalle: AlertDetail::StockCritico { medicamentos },
        });
    }

    #[derive(Default)]
    struct LowAcc {
        nombre: String,
        lineas: usize,
    }
    let mut low: HashMap<i32, LowAcc> = HashMap::new();
    for r in data {
        let prescribed = r.base.quantity_prescribed.unwrap_or(0);
        if prescribed > 0 && r.dispensing_rate_line < LOW_DISPENSING_THRESHOLD {
            let e = low.entry(r.base.pharmacy_id).or_default();
            if e.nombre.is_empty() {
                e.nombre = r.pharmacy_name.clone();
            }
            e.lineas += 1;
        }
    }
    let mut low: Vec<(i32, LowAcc)> = low.into_iter().collect();
    low.sort_by(|a, b| b.1.lineas.cmp(&a.1.lineas).then(a.0.cmp(&b.0)));
    low.truncate(LOW_RATE_ALERT_TOP);
    for (farmacia_id, acc) in low {
        alerts.push(Alert {
            tipo: "warning".to_string(),
            icon: "fa-pills".to_string(),
            titulo: format!("Baja dispensación: {}", acc.nombre),
            descripcion: format!(
                "{} líneas por debajo del {:.0}% de dispensación",
                format_int(acc.lineas),
                LOW_DISPENSING_THRESHOLD * 100.0
            ),
            detalle: AlertDetail::BajaDispensacion { farmacia_id },
        });
    }

    // The dashboard renders this panel unconditionally; leave a friendly
    // entry instead of an empty array when nothing fired.
    if alerts.is_empty() {
        alerts.push(Alert {
            tipo: "info".to_string(),
            icon: "fa-circle-info".to_string(),
            titulo: "Sin alertas".to_string(),
            descripcion: "Ningún umbral de stock o dispensación fue superado en esta corrida"
                .to_string(),
            detalle: AlertDetail::Informativo,
        });
    }
    alerts
}

pub fn generate_metadata(data: &[EnrichedRow], generated_at: DateTime<Utc>) -> RunMetadata {
    let mut pacientes = HashSet::new();
    let mut medicos = HashSet::new();
    let mut farmacias = HashSet::new();
    let mut medicamentos = HashSet::new();
    let mut recetado = 0i64;
    let mut dispensado = 0i64;
    let mut faltante = 0i64;
    let mut fecha_minima = None;
    let mut fecha_maxima = None;

    for r in data {
        pacientes.insert(r.base.patient_id);
        medicos.insert(r.base.physician_id);
        farmacias.insert(r.base.pharmacy_id);
        medicamentos.insert(r.base.medication_id);
        recetado += i64::from(r.base.quantity_prescribed.unwrap_or(0));
        dispensado += i64::from(r.base.quantity_dispensed.unwrap_or(0));
        faltante += i64::from(r.shortfall);
        if let Some(d) = r.base.need_date {
            fecha_minima = Some(fecha_minima.map_or(d, |m: chrono::NaiveDate| m.min(d)));
            fecha_maxima = Some(fecha_maxima.map_or(d, |m: chrono::NaiveDate| m.max(d)));
        }
    }

    RunMetadata {
        generated_at,
        total_records: data.len(),
        total_pacientes: pacientes.len(),
        total_medicos: medicos.len(),
        total_farmacias: farmacias.len(),
        total_medicamentos: medicamentos.len(),
        total_recetado: recetado,
        total_dispensado: dispensado,
        total_faltante: faltante,
        fecha_minima,
        fecha_maxima,
    }
}

pub struct FilterLists {
    pub farmacias: Vec<PharmacyFilterEntry>,
    pub medicos: Vec<PhysicianFilterEntry>,
    pub medicamentos: Vec<MedicationFilterEntry>,
}

/// Distinct (id, name) pairs per entity for the dashboard dropdowns, sorted
/// by id. The medication list is capped; the cap is logged, never silent.
pub fn generate_filters(data: &[EnrichedRow], max_medications: usize) -> FilterLists {
    let mut farmacias: BTreeMap<i32, String> = BTreeMap::new();
    let mut medicos: BTreeMap<i32, String> = BTreeMap::new();
    let mut medicamentos: BTreeMap<i32, String> = BTreeMap::new();
    for r in data {
        farmacias
            .entry(r.base.pharmacy_id)
            .or_insert_with(|| r.pharmacy_name.clone());
        medicos
            .entry(r.base.physician_id)
            .or_insert_with(|| r.physician_name.clone());
        medicamentos
            .entry(r.base.medication_id)
            .or_insert_with(|| r.medication_name.clone());
    }

    let total_medicamentos = medicamentos.len();
    let mut medicamentos: Vec<MedicationFilterEntry> = medicamentos
        .into_iter()
        .map(|(id, nombre_medicamento)| MedicationFilterEntry {
            id,
            nombre_medicamento,
        })
        .collect();
    if medicamentos.len() > max_medications {
        info!(
            "medication filter capped at {} of {} distinct entries",
            max_medications,
            format_int(total_medicamentos)
        );
        medicamentos.truncate(max_medications);
    }

    FilterLists {
        farmacias: farmacias
            .into_iter()
            .map(|(id, nombre_farmacia)| PharmacyFilterEntry {
                id,
                nombre_farmacia,
            })
            .collect(),
        medicos: medicos
            .into_iter()
            .map(|(id, nombre_medico)| PhysicianFilterEntry { id, nombre_medico })
            .collect(),
        medicamentos,
    }
}
