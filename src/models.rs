use std::fmt;

use serde::Serialize;

use crate::assessment::AssessmentKind;

pub const STUDENT_ID: &str = "student_id";
pub const GRADE: &str = "Grade";

/// A single cell of a normalized table, mirroring SQLite's storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Types a raw text cell: integer, then real, else text.
    pub fn infer(raw: &str) -> Value {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            Value::Integer(value)
        } else if let Ok(value) = trimmed.parse::<f64>() {
            Value::Real(value)
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Real(value) => Some(*value),
            Value::Text(text) => text.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(value) => Some(value.to_string()),
            Value::Real(value) => Some(value.to_string()),
            Value::Text(text) => Some(text.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Real(value) => write!(f, "{value}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// A named table with ordered columns, as written to and read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Columns holding per-question scores (`Q1`, `Q2`, ...).
    pub fn item_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, name)| name.starts_with('Q'))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn find_student(&self, student_id: &str) -> Option<&[Value]> {
        let id_index = self.column_index(STUDENT_ID)?;
        self.rows
            .iter()
            .find(|row| row[id_index].as_key().as_deref() == Some(student_id))
            .map(Vec::as_slice)
    }
}

/// A student's grade in one assessment, as shown by the results view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentGrade {
    pub assessment: AssessmentKind,
    pub grade: f64,
}

/// One formative row tagged with the table it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FormativeResult {
    pub student_id: String,
    pub grade: f64,
    pub test: AssessmentKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderperformingStudent {
    pub student_id: String,
    pub summative_grade: f64,
    pub lowest_formative_grade: Option<f64>,
    pub lowest_formative_test: Option<AssessmentKind>,
    pub attempt_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemComparison {
    pub label: String,
    pub absolute: Option<f64>,
    pub cohort_mean: Option<f64>,
    pub relative: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentPerformance {
    pub student_id: String,
    pub assessment: AssessmentKind,
    pub items: Vec<ItemComparison>,
}

impl StudentPerformance {
    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.label.as_str()).collect()
    }

    pub fn absolute_series(&self) -> Vec<Option<f64>> {
        self.items.iter().map(|item| item.absolute).collect()
    }

    pub fn relative_series(&self) -> Vec<Option<f64>> {
        self.items.iter().map(|item| item.relative).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderperformanceReport {
    pub sum_average: Option<f64>,
    pub students: Vec<UnderperformingStudent>,
}

impl UnderperformanceReport {
    pub fn labels(&self) -> Vec<&str> {
        self.students
            .iter()
            .map(|student| student.student_id.as_str())
            .collect()
    }

    pub fn summative_series(&self) -> Vec<f64> {
        self.students
            .iter()
            .map(|student| student.summative_grade)
            .collect()
    }

    /// Lowest formative grades with missing values drawn as zero.
    pub fn lowest_formative_series(&self) -> Vec<f64> {
        self.students
            .iter()
            .map(|student| student.lowest_formative_grade.unwrap_or(0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_prefers_integer_then_real() {
        assert_eq!(Value::infer("42"), Value::Integer(42));
        assert_eq!(Value::infer(" 0.75 "), Value::Real(0.75));
        assert_eq!(Value::infer("yes"), Value::Text("yes".to_string()));
    }

    #[test]
    fn find_student_matches_on_id_column() {
        let table = Table {
            name: "Test_1".to_string(),
            columns: vec![STUDENT_ID.to_string(), GRADE.to_string()],
            rows: vec![
                vec![Value::Text("S1".to_string()), Value::Integer(8000)],
                vec![Value::Integer(77), Value::Integer(5000)],
            ],
        };

        assert_eq!(table.find_student("S1").map(|row| row[1].clone()), Some(Value::Integer(8000)));
        assert!(table.find_student("77").is_some());
        assert!(table.find_student("S9").is_none());
    }
}
