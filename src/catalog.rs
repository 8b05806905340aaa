// Catalog tables mapping entity codes to display names.
//
// Catalogs are optional: a missing or unreadable file degrades to an empty
// map, and every lookup miss resolves to the entity's fixed placeholder.
// Maps are built once per run and passed by reference into the enricher.
use crate::error::Result;
use crate::util::{csv_reader, format_int, parse_i32_safe};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const PHYSICIAN_PLACEHOLDER: &str = "Médico sin nombre";
pub const MEDICATION_PLACEHOLDER: &str = "Sin descripción";
pub const PHARMACY_PLACEHOLDER: &str = "Farmacia desconocida";

const PHYSICIANS_FILE: &str = "recetas2025_codigosmedicos.csv";
const MEDICATIONS_FILE: &str = "recetas2025_codigosproductos.csv";
const PHARMACIES_FILE: &str = "recetas2025_codigosalmacenes.csv";

/// Immutable `id → name` mapping with a fixed default on miss.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: HashMap<i32, String>,
    placeholder: &'static str,
}

impl Catalog {
    pub fn empty(placeholder: &'static str) -> Self {
        Self {
            entries: HashMap::new(),
            placeholder,
        }
    }

    #[cfg(test)]
    pub fn from_entries(entries: HashMap<i32, String>, placeholder: &'static str) -> Self {
        Self {
            entries,
            placeholder,
        }
    }

    pub fn name_for(&self, id: i32) -> &str {
        self.entries
            .get(&id)
            .map(String::as_str)
            .unwrap_or(self.placeholder)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three reference tables the enricher joins against.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub physicians: Catalog,
    pub medications: Catalog,
    pub pharmacies: Catalog,
}

impl Catalogs {
    pub fn empty() -> Self {
        Self {
            physicians: Catalog::empty(PHYSICIAN_PLACEHOLDER),
            medications: Catalog::empty(MEDICATION_PLACEHOLDER),
            pharmacies: Catalog::empty(PHARMACY_PLACEHOLDER),
        }
    }

    /// Load all three catalogs from `dir`. Any file that is missing or
    /// malformed yields an empty map; placeholders cover the gap downstream.
    pub fn load(dir: &Path) -> Self {
        let physicians = load_catalog(
            &dir.join(PHYSICIANS_FILE),
            b',',
            "CódigodelMédico",
            "NombredelMédico",
            PHYSICIAN_PLACEHOLDER,
        );
        let medications = load_catalog(
            &dir.join(MEDICATIONS_FILE),
            b',',
            "maxcod",
            "TextoBreveMedicamento",
            MEDICATION_PLACEHOLDER,
        );
        // The warehouse export is semicolon-delimited, unlike the other two.
        let pharmacies = load_catalog(
            &dir.join(PHARMACIES_FILE),
            b';',
            "almacen_codigo",
            "almacen_descripcion",
            PHARMACY_PLACEHOLDER,
        );
        info!(
            "catalogs loaded: {} physicians, {} medications, {} pharmacies",
            format_int(physicians.len()),
            format_int(medications.len()),
            format_int(pharmacies.len())
        );
        Self {
            physicians,
            medications,
            pharmacies,
        }
    }
}

fn load_catalog(
    path: &Path,
    delimiter: u8,
    code_col: &str,
    name_col: &str,
    placeholder: &'static str,
) -> Catalog {
    match read_entries(path, delimiter, code_col, name_col) {
        Ok(entries) => Catalog {
            entries,
            placeholder,
        },
        Err(e) => {
            warn!("catalog {} unavailable: {}", path.display(), e);
            Catalog::empty(placeholder)
        }
    }
}

fn read_entries(
    path: &Path,
    delimiter: u8,
    code_col: &str,
    name_col: &str,
) -> Result<HashMap<i32, String>> {
    let mut rdr = csv_reader(path, delimiter)?;
    let headers = rdr.headers()?.clone();
    let code_idx = headers.iter().position(|h| h == code_col);
    let name_idx = headers.iter().position(|h| h == name_col);
    let (Some(code_idx), Some(name_idx)) = (code_idx, name_idx) else {
        warn!(
            "catalog {} lacks expected columns {}/{}",
            path.display(),
            code_col,
            name_col
        );
        return Ok(HashMap::new());
    };

    let mut entries = HashMap::new();
    for record in rdr.records() {
        let Ok(record) = record else { continue };
        let Some(code) = parse_i32_safe(record.get(code_idx)) else {
            continue;
        };
        if let Some(name) = record.get(name_idx).map(str::trim).filter(|s| !s.is_empty()) {
            entries.insert(code, name.to_string());
        }
    }
    Ok(entries)
}
