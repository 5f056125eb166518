//! Turns a raw export into its canonical table.
//!
//! Scored exports go through: trim headers, rename, check required columns,
//! keep each student's best attempt, drop metadata, coerce numbers, rescale.
//! `Student_Rate` only gets its headers trimmed and missing cells zeroed.

use tracing::{debug, info};

use crate::assessment::{AssessmentKind, ItemRule, ScoringRule, DROPPED_COLUMNS};
use crate::extremum::{select_per_group, Extremum};
use crate::models::{Table, Value, GRADE, STUDENT_ID};
use crate::source::RawTable;

const PLACEHOLDER: &str = "-";

/// Cell spellings that exports use for a missing value.
const MISSING_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("[{table}] missing columns: {missing:?}; present columns: {present:?}")]
    MissingColumns {
        table: String,
        missing: Vec<String>,
        present: Vec<String>,
    },
}

pub fn normalize(kind: AssessmentKind, raw: RawTable) -> Result<Table, NormalizeError> {
    match kind.rule() {
        Some(rule) => normalize_scored(kind, rule, raw),
        None => Ok(fill_missing(kind, raw)),
    }
}

fn fill_missing(kind: AssessmentKind, mut raw: RawTable) -> Table {
    raw.trim_headers();
    let rows = raw
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell.as_deref().map(str::trim) {
                    None => Value::Integer(0),
                    Some(text) if MISSING_MARKERS.contains(&text) => Value::Integer(0),
                    Some(text) => match Value::infer(text) {
                        Value::Real(value) if !value.is_finite() => Value::Integer(0),
                        value => value,
                    },
                })
                .collect()
        })
        .collect();

    Table {
        name: kind.table_name().to_string(),
        columns: raw.headers,
        rows,
    }
}

/// Numeric reading of a raw cell; anything unparseable counts as zero.
fn coerce(cell: Option<&str>) -> f64 {
    cell.and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

fn normalize_scored(
    kind: AssessmentKind,
    rule: &ScoringRule,
    mut raw: RawTable,
) -> Result<Table, NormalizeError> {
    let table = kind.table_name();

    raw.trim_headers();
    raw.rename(&rule.renames());

    let (Some(id_index), Some(grade_index)) =
        (raw.column_index(STUDENT_ID), raw.column_index(GRADE))
    else {
        let missing = [STUDENT_ID, GRADE]
            .into_iter()
            .filter(|column| raw.column_index(column).is_none())
            .map(str::to_string)
            .collect();
        return Err(NormalizeError::MissingColumns {
            table: table.to_string(),
            missing,
            present: raw.headers,
        });
    };

    let rows_in = raw.rows.len();
    let survivors = select_per_group(
        &raw.rows,
        |row| row[id_index].clone(),
        Extremum::Max,
        |a, b| {
            coerce(a[grade_index].as_deref()).total_cmp(&coerce(b[grade_index].as_deref()))
        },
    );
    debug!(table, rows_in, rows_out = survivors.len(), "Kept best attempt per student");

    let kept_columns: Vec<usize> = raw
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !DROPPED_COLUMNS.contains(&name.as_str()))
        .map(|(index, _)| index)
        .collect();

    enum Column<'a> {
        Id,
        Grade,
        Item(&'a ItemRule),
        Other,
    }

    let layout: Vec<(usize, Column)> = kept_columns
        .iter()
        .map(|&index| {
            let name = raw.headers[index].as_str();
            let column = if index == id_index {
                Column::Id
            } else if index == grade_index {
                Column::Grade
            } else if let Some(item) = rule.item(name) {
                Column::Item(item)
            } else {
                Column::Other
            };
            (index, column)
        })
        .collect();

    let rows: Vec<Vec<Value>> = survivors
        .iter()
        .map(|&row_index| {
            let row = &raw.rows[row_index];
            layout
                .iter()
                .map(|(index, column)| {
                    let cell = row[*index].as_deref();
                    let cell = if cell == Some(PLACEHOLDER) { Some("0") } else { cell };
                    match column {
                        Column::Id => cell.map_or(Value::Null, |text| Value::Text(text.to_string())),
                        Column::Grade => Value::Integer(rule.scale_grade(coerce(cell))),
                        Column::Item(item) => Value::Integer(item.scale(coerce(cell))),
                        Column::Other => match row[*index].as_deref() {
                            Some(PLACEHOLDER) => Value::Integer(0),
                            Some(text) => Value::Text(text.to_string()),
                            None => Value::Null,
                        },
                    }
                })
                .collect()
        })
        .collect();

    info!(
        table,
        rows_in,
        rows_out = rows.len(),
        duplicates_dropped = rows_in - rows.len(),
        "Normalized export"
    );

    Ok(Table {
        name: table.to_string(),
        columns: kept_columns
            .into_iter()
            .map(|index| raw.headers[index].clone())
            .collect(),
        rows,
    })
}
