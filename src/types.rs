use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

// One prescription line exactly as read from a monthly extract. Every field
// is optional text: the exports disagree on column presence, header casing
// and numeric formatting, so typed coercion happens in the loader. Known
// header variants are declared as serde aliases; a column absent from a file
// simply deserializes to `None`.
#[derive(Debug, Default, Deserialize)]
pub struct RawRow {
    #[serde(
        default,
        rename = "NRecetaSAP",
        alias = "n_receta_sap",
        alias = "NumeroReceta"
    )]
    pub prescription_id: Option<String>,
    #[serde(
        default,
        rename = "CédulaPaciente",
        alias = "CedulaPaciente",
        alias = "cedula_paciente"
    )]
    pub patient_id: Option<String>,
    #[serde(
        default,
        rename = "CódigodelMédico",
        alias = "CodigodelMedico",
        alias = "codigo_medico"
    )]
    pub physician_id: Option<String>,
    #[serde(
        default,
        rename = "FarmaciaVentanilla",
        alias = "farmacia_ventanilla",
        alias = "Farmacia"
    )]
    pub pharmacy_id: Option<String>,
    #[serde(
        default,
        rename = "MedicamentoSAP",
        alias = "medicamento_sap",
        alias = "maxcod"
    )]
    pub medication_id: Option<String>,
    #[serde(default, rename = "CantidadRecetada", alias = "cantidad_recetada")]
    pub quantity_prescribed: Option<String>,
    #[serde(
        default,
        rename = "CantidadyaDispensada",
        alias = "CantidadYaDispensada",
        alias = "cantidad_dispensada"
    )]
    pub quantity_dispensed: Option<String>,
    #[serde(
        default,
        rename = "StockFarmacia",
        alias = "stock_farmacia",
        alias = "Existencias"
    )]
    pub stock_at_pharmacy: Option<String>,
    #[serde(default, rename = "Crónico", alias = "Cronico", alias = "cronico")]
    pub is_chronic: Option<String>,
    #[serde(
        default,
        rename = "FechaNecesidad",
        alias = "fecha_necesidad",
        alias = "FechaNecesaria"
    )]
    pub need_date: Option<String>,
}

// Canonical row shape after the loader. Ids default to 0 when the cell was
// missing or garbage; quantities keep `None` so the load report can tell
// coerced cells apart from real zeros. Sums treat `None` as 0.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub prescription_id: i64,
    pub patient_id: i64,
    pub physician_id: i32,
    pub pharmacy_id: i32,
    pub medication_id: i32,
    pub quantity_prescribed: Option<i32>,
    pub quantity_dispensed: Option<i32>,
    pub stock_at_pharmacy: Option<i32>,
    pub is_chronic: bool,
    pub need_date: Option<NaiveDate>,
    // Derived from `need_date`. Rows that kept `None` here are excluded from
    // the month-partitioned aggregates but still count in the global ones.
    pub year: Option<i16>,
    pub month: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct EnrichedRow {
    pub base: NormalizedRow,
    pub shortfall: i32,
    pub dispensing_rate_line: f64,
    pub physician_name: String,
    pub medication_name: String,
    pub pharmacy_name: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlySummaryRow {
    pub anio: i16,
    pub mes: u8,
    pub total_lineas: usize,
    pub recetas_unicas: usize,
    pub pacientes_unicos: usize,
    pub medicos_unicos: usize,
    pub farmacias_activas: usize,
    pub total_recetado: i64,
    pub total_dispensado: i64,
    pub total_faltante: i64,
    pub pacientes_cronicos: usize,
    pub tasa_dispensacion_media: f64,
    pub tasa_dispensacion_global: f64,
    pub tasa_faltante: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MedicationRankingRow {
    pub anio: i16,
    pub mes: u8,
    #[serde(rename = "MedicamentoSAP")]
    #[tabled(rename = "MedicamentoSAP")]
    pub medicamento_sap: i32,
    pub nombre_medicamento: String,
    pub lineas: usize,
    pub recetado: i64,
    pub dispensado: i64,
    pub faltante: i64,
    pub tasa_global: f64,
    pub ranking_mes: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PharmacySummaryRow {
    pub id: i32,
    pub nombre: String,
    pub total_lineas: usize,
    pub pacientes_atendidos: usize,
    pub medicamentos_unicos: usize,
    pub total_recetado: i64,
    pub total_dispensado: i64,
    // Percentage, rounded to one decimal.
    pub eficiencia: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PhysicianSummaryRow {
    pub id: i32,
    pub nombre: String,
    pub recetas: usize,
    pub pacientes: usize,
    pub medicamentos: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct Alert {
    // Severity class the dashboard maps to a colour (`alert-danger`, ...).
    pub tipo: String,
    pub icon: String,
    pub titulo: String,
    pub descripcion: String,
    #[serde(flatten)]
    pub detalle: AlertDetail,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "categoria", rename_all = "snake_case")]
pub enum AlertDetail {
    StockCritico { medicamentos: Vec<i32> },
    BajaDispensacion { farmacia_id: i32 },
    Informativo,
}

#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub total_pacientes: usize,
    pub total_medicos: usize,
    pub total_farmacias: usize,
    pub total_medicamentos: usize,
    pub total_recetado: i64,
    pub total_dispensado: i64,
    pub total_faltante: i64,
    pub fecha_minima: Option<NaiveDate>,
    pub fecha_maxima: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct LastUpdate {
    pub last_updated: DateTime<Utc>,
}

// Distinct (id, name) pairs for the dashboard's dropdowns. Key names match
// the columns the front-end already reads.
#[derive(Debug, Serialize, Clone)]
pub struct PharmacyFilterEntry {
    #[serde(rename = "FarmaciaVentanilla")]
    pub id: i32,
    pub nombre_farmacia: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct PhysicianFilterEntry {
    #[serde(rename = "CódigodelMédico")]
    pub id: i32,
    pub nombre_medico: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct MedicationFilterEntry {
    #[serde(rename = "MedicamentoSAP")]
    pub id: i32,
    pub nombre_medicamento: String,
}
