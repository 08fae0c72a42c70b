use crate::error::AnalysisError;
use crate::loader::Table;
use crate::models::{HealthStatus, Metrics, TransactionRow};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use std::collections::HashMap;

pub const TYPE_COLUMN: &str = "Type";
pub const AMOUNT_COLUMN: &str = "Amount";
pub const INCOME: &str = "Income";
pub const EXPENSE: &str = "Expense";

static AMOUNT_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,$£€]").unwrap());

/// All uploaded rows under one normalized header set.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub sources: Vec<String>,
    pub rows: Vec<DatasetRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Index into `Dataset::sources`.
    pub source: usize,
    /// 1-based data row number within the source file.
    pub line: usize,
    pub cells: Vec<String>,
}

impl Dataset {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

pub fn normalize_header(raw: &str) -> String {
    title_case(raw.trim())
}

/// Stacks tables in upload order, aligning cells by normalized header name.
/// A column absent from one file reads as empty for that file's rows.
pub fn concat_tables(tables: Vec<Table>) -> Result<Dataset, AnalysisError> {
    if tables.is_empty() {
        return Err(AnalysisError::Validation("No valid files found".to_string()));
    }

    let mut columns: Vec<String> = Vec::new();
    let mut column_lookup: HashMap<String, usize> = HashMap::new();
    let mut layouts: Vec<Vec<Option<usize>>> = Vec::with_capacity(tables.len());

    for table in &tables {
        let mut seen_in_table = Vec::new();
        let layout = table
            .headers
            .iter()
            .map(|raw| {
                let name = normalize_header(raw);
                // First occurrence wins when a file repeats a header.
                if seen_in_table.contains(&name) {
                    return None;
                }
                seen_in_table.push(name.clone());
                let idx = *column_lookup.entry(name.clone()).or_insert_with(|| {
                    columns.push(name);
                    columns.len() - 1
                });
                Some(idx)
            })
            .collect();
        layouts.push(layout);
    }

    let mut sources = Vec::with_capacity(tables.len());
    let mut rows = Vec::new();
    for (source, (table, layout)) in tables.into_iter().zip(layouts).enumerate() {
        for (i, raw_row) in table.rows.into_iter().enumerate() {
            let mut cells = vec![String::new(); columns.len()];
            for (cell, target) in raw_row.into_iter().zip(&layout) {
                if let Some(idx) = target {
                    cells[*idx] = cell;
                }
            }
            rows.push(DatasetRow {
                source,
                line: i + 1,
                cells,
            });
        }
        sources.push(table.source);
    }

    Ok(Dataset {
        columns,
        sources,
        rows,
    })
}

/// Cells read as missing, like a blank cell.
const MISSING_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "#NA", "<NA>",
];

/// Parses an amount cell. `Ok(None)` means the cell is blank or a missing marker.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>, String> {
    if MISSING_TOKENS.contains(&raw.trim()) {
        return Ok(None);
    }

    let stripped = AMOUNT_NOISE.replace_all(raw, "");
    let cleaned: &str = &stripped;
    if cleaned.is_empty() {
        return Ok(None);
    }

    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned),
    };

    let value = Decimal::from_str(digits)
        .or_else(|_| Decimal::from_scientific(digits))
        .map_err(|_| format!("Invalid amount: {}", raw.trim()))?;

    Ok(Some(if negative { -value } else { value }))
}

/// Validates the required columns and converts the dataset into typed rows.
/// Only income and expense rows are kept; their blank amounts are dropped.
pub fn extract_transactions(dataset: &Dataset) -> Result<Vec<TransactionRow>, AnalysisError> {
    let type_idx = dataset.column_index(TYPE_COLUMN);
    let amount_idx = dataset.column_index(AMOUNT_COLUMN);

    let (type_idx, amount_idx) = match (type_idx, amount_idx) {
        (Some(t), Some(a)) => (t, a),
        (t, a) => {
            let missing: Vec<&str> = [(t, TYPE_COLUMN), (a, AMOUNT_COLUMN)]
                .iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| *name)
                .collect();
            return Err(AnalysisError::Validation(format!(
                "CSV must have 'Type' and 'Amount' columns (missing: {})",
                missing.join(", ")
            )));
        }
    };

    let mut transactions = Vec::with_capacity(dataset.rows.len());
    for row in &dataset.rows {
        let kind = title_case(row.cells[type_idx].trim());
        if kind != INCOME && kind != EXPENSE {
            continue;
        }
        let amount = match parse_amount(&row.cells[amount_idx]) {
            Ok(Some(amount)) => amount,
            Ok(None) => continue,
            Err(message) => {
                return Err(AnalysisError::Validation(format!(
                    "{} in {} (row {})",
                    message, dataset.sources[row.source], row.line
                )));
            }
        };
        transactions.push(TransactionRow { kind, amount });
    }

    Ok(transactions)
}

fn overflow(what: &str) -> AnalysisError {
    AnalysisError::Validation(format!("{} is too large to compute", what))
}

/// Sums income and expense rows and derives profit, margin and health.
pub fn summarize(transactions: &[TransactionRow]) -> Result<Metrics, AnalysisError> {
    let sum_of = |kind: &str| -> Option<Decimal> {
        transactions
            .iter()
            .filter(|t| t.kind == kind)
            .try_fold(Decimal::ZERO, |total, t| total.checked_add(t.amount))
    };
    let revenue = sum_of(INCOME).ok_or_else(|| overflow("Total revenue"))?;
    let expenses = sum_of(EXPENSE).ok_or_else(|| overflow("Total expenses"))?;
    metrics_from_totals(revenue, expenses)
}

pub fn metrics_from_totals(revenue: Decimal, expenses: Decimal) -> Result<Metrics, AnalysisError> {
    let net_profit = revenue
        .checked_sub(expenses)
        .ok_or_else(|| overflow("Net profit"))?;

    let margin = if revenue > Decimal::ZERO {
        net_profit
            .checked_div(revenue)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(|pct| pct.round_dp(2))
            .ok_or_else(|| overflow("Margin"))?
    } else {
        Decimal::ZERO
    };

    let margin = margin.to_f64().unwrap_or(0.0);

    Ok(Metrics {
        revenue: revenue.to_f64().unwrap_or(0.0),
        expenses: expenses.to_f64().unwrap_or(0.0),
        net_profit: net_profit.to_f64().unwrap_or(0.0),
        margin,
        health_status: HealthStatus::from_margin(margin),
    })
}

/// Loader output to metrics: concatenate, normalize, validate, sum.
pub fn aggregate(tables: Vec<Table>) -> Result<Metrics, AnalysisError> {
    let dataset = concat_tables(tables)?;
    let transactions = extract_transactions(&dataset)?;
    summarize(&transactions)
}
