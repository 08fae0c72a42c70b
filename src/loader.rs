use crate::error::AnalysisError;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use tracing::warn;

const SPREADSHEET_EXTENSIONS: &[&str] = &[".xlsx", ".xlsm", ".xls", ".xlsb", ".ods"];

/// A file received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw tabular content of one file: header row plus string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Spreadsheet,
    Delimited,
}

pub fn detect_file_kind(filename: &str) -> FileKind {
    let filename_lower = filename.to_lowercase();
    if SPREADSHEET_EXTENSIONS.iter().any(|ext| filename_lower.ends_with(ext)) {
        FileKind::Spreadsheet
    } else {
        FileKind::Delimited
    }
}

/// Parses every upload. The first failure aborts the whole batch.
pub fn load_files(files: &[UploadedFile]) -> Result<Vec<Table>, AnalysisError> {
    files.iter().map(load_file).collect()
}

pub fn load_file(file: &UploadedFile) -> Result<Table, AnalysisError> {
    match detect_file_kind(&file.filename) {
        FileKind::Spreadsheet => parse_spreadsheet(&file.filename, &file.bytes),
        FileKind::Delimited => {
            let text = decode_text(&file.filename, &file.bytes);
            parse_delimited(&file.filename, &text)
        }
    }
}

/// UTF-8 first (BOM stripped), ISO-8859-1 when the bytes are not valid UTF-8.
fn decode_text(filename: &str, bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        Err(_) => {
            warn!("UTF-8 failed for {}, trying ISO-8859-1...", filename);
            // Every byte maps to the code point of the same value.
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

fn parse_delimited(filename: &str, text: &str) -> Result<Table, AnalysisError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| AnalysisError::parse(filename, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AnalysisError::parse(filename, "No columns to parse from file"));
    }

    let width = headers.len();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| AnalysisError::parse(filename, e))?;
        let mut row: Vec<String> = record.iter().take(width).map(|c| c.to_string()).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(Table {
        source: filename.to_string(),
        headers,
        rows,
    })
}

fn parse_spreadsheet(filename: &str, bytes: &[u8]) -> Result<Table, AnalysisError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AnalysisError::parse(filename, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalysisError::parse(filename, "Workbook has no worksheets"))?
        .map_err(|e| AnalysisError::parse(filename, e))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(header_row) => header_row.iter().map(cell_to_string).collect(),
        None => return Err(AnalysisError::parse(filename, "No columns to parse from file")),
    };

    let rows = sheet_rows
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(Table {
        source: filename.to_string(),
        headers,
        rows,
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_detect_file_kind() {
        assert_eq!(detect_file_kind("ledger.xlsx"), FileKind::Spreadsheet);
        assert_eq!(detect_file_kind("LEDGER.XLS"), FileKind::Spreadsheet);
        assert_eq!(detect_file_kind("q3.ods"), FileKind::Spreadsheet);
        assert_eq!(detect_file_kind("ledger.csv"), FileKind::Delimited);
        assert_eq!(detect_file_kind("export"), FileKind::Delimited);
        assert_eq!(detect_file_kind("xlsx_export.txt"), FileKind::Delimited);
    }

    #[test]
    fn test_load_csv_trims_and_pads() {
        let table = load_file(&upload(
            "jan.csv",
            b" type , Amount ,Note\nIncome, 1000 ,invoice 12\nExpense,300\n",
        ))
        .unwrap();

        assert_eq!(table.source, "jan.csv");
        assert_eq!(table.headers, vec!["type", "Amount", "Note"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Income", "1000", "invoice 12"]);
        assert_eq!(table.rows[1], vec!["Expense", "300", ""]);
    }

    #[test]
    fn test_load_csv_strips_utf8_bom() {
        let table = load_file(&upload("bom.csv", b"\xef\xbb\xbfType,Amount\nIncome,5\n")).unwrap();
        assert_eq!(table.headers[0], "Type");
    }

    #[test]
    fn test_load_csv_falls_back_to_latin1() {
        // 0xE9 is "é" in ISO-8859-1 and invalid as a lone UTF-8 byte.
        let table = load_file(&upload(
            "windows.csv",
            b"Type,Amount,Description\nExpense,42,Caf\xe9\n",
        ))
        .unwrap();
        assert_eq!(table.rows[0][2], "Café");
    }

    #[test]
    fn test_load_empty_csv_is_parse_error() {
        let err = load_file(&upload("empty.csv", b"")).unwrap_err();
        match err {
            AnalysisError::Parse { file, .. } => assert_eq!(file, "empty.csv"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_spreadsheet_is_parse_error() {
        let err = load_file(&upload("broken.xlsx", b"definitely not a zip archive")).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
        assert!(err.to_string().contains("broken.xlsx"));
    }

    #[test]
    fn test_load_files_fails_whole_batch() {
        let files = vec![
            upload("good.csv", b"Type,Amount\nIncome,10\n"),
            upload("bad.xlsx", b"nope"),
        ];
        assert!(load_files(&files).is_err());
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Float(1200.0)), "1200");
        assert_eq!(cell_to_string(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_to_string(&Data::Int(-3)), "-3");
        assert_eq!(cell_to_string(&Data::String("  Income ".to_string())), "Income");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
