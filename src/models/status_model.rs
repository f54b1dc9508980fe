//! models/status_model.rs
//! Contrato de datos de la hoja de estado (una fila por destinatario).

use serde::{Deserialize, Serialize};

/// Cabecera esperada, en orden. La primera fila de la hoja debe coincidir exactamente.
pub const STATUS_HEADER: [&str; 8] = [
    "name",
    "email",
    "send_status",
    "send_time",
    "status",
    "open_count",
    "first_opened",
    "last_opened",
];

pub const COL_EMAIL: usize = 1;
pub const COL_STATUS: usize = 4;
pub const COL_OPEN_COUNT: usize = 5;
pub const COL_FIRST_OPENED: usize = 6;
pub const COL_LAST_OPENED: usize = 7;

/// Valor escrito en la columna `status` en cada evento.
pub const OPENED_STATUS: &str = "Opened";

/// Identifica una hoja (por nombre) y una pestaña dentro de ella.
/// Se resuelve en cada request; no se cachea.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetHandle {
    pub sheet: String,
    pub tab: String,
}

impl SheetHandle {
    pub fn new(sheet: impl Into<String>, tab: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            tab: tab.into(),
        }
    }
}

impl std::fmt::Display for SheetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sheet, self.tab)
    }
}

/// Vista tipada sobre una fila posicional. Las celdas ausentes se leen como "".
#[derive(Debug, Clone, Copy)]
pub struct StatusRow<'a> {
    cells: &'a [String],
}

impl<'a> StatusRow<'a> {
    pub fn new(cells: &'a [String]) -> Self {
        Self { cells }
    }

    fn cell(&self, idx: usize) -> &'a str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn email(&self) -> &'a str {
        self.cell(COL_EMAIL)
    }

    pub fn open_count_raw(&self) -> &'a str {
        self.cell(COL_OPEN_COUNT)
    }

    pub fn first_opened(&self) -> &'a str {
        self.cell(COL_FIRST_OPENED)
    }

    /// Contador actual. Vacío o no numérico cuenta como 0; nunca falla.
    pub fn open_count(&self) -> u64 {
        let raw = self.open_count_raw().trim();
        if raw.is_empty() {
            return 0;
        }
        // Sin signo: un valor negativo también cuenta como 0 y el contador nunca baja
        match raw.parse::<u64>() {
            Ok(n) => n,
            Err(e) => {
                log::debug!("open_count '{}' no es numérico ({}); se usa 0", raw, e);
                0
            }
        }
    }
}

/// Escritura de una celda, en notación A1 relativa a la pestaña (`E5`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub cell: String,
    pub value: String,
}

impl CellWrite {
    /// `row` es 1-based (como en la hoja), `col` es 0-based.
    pub fn at(row: usize, col: usize, value: impl Into<String>) -> Self {
        Self {
            cell: a1_cell(row, col),
            value: value.into(),
        }
    }
}

/// Resultado de una actualización aplicada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// Fila 1-based actualizada en la hoja.
    pub row_number: usize,
    pub new_count: u64,
}

/// Índice de columna 0-based a letras (0 -> A, 25 -> Z, 26 -> AA).
pub fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

pub fn a1_cell(row: usize, col: usize) -> String {
    format!("{}{}", column_letters(col), row)
}

/// Inverso de `a1_cell`: `E5` -> (5, 4). Devuelve None si no es una celda simple.
pub fn parse_a1_cell(cell: &str) -> Option<(usize, usize)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    let col = letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
        - 1;
    Some((row, col))
}
