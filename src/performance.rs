use crate::assessment::AssessmentKind;
use crate::models::{ItemComparison, StudentPerformance, Table};

/// Mean of the non-null numeric values in one column.
fn column_mean(table: &Table, index: usize) -> Option<f64> {
    let values: Vec<f64> = table.rows.iter().filter_map(|row| row[index].as_f64()).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// A student's per-question scores next to the cohort mean.
///
/// Returns `None` when the student has no row in `table`.
pub fn compare_student(
    kind: AssessmentKind,
    table: &Table,
    student_id: &str,
) -> Option<StudentPerformance> {
    let row = table.find_student(student_id)?;

    let items = table
        .item_columns()
        .into_iter()
        .map(|index| {
            let absolute = row[index].as_f64();
            let cohort_mean = column_mean(table, index);
            let relative = absolute.zip(cohort_mean).map(|(score, mean)| score - mean);
            ItemComparison {
                label: table.columns[index].clone(),
                absolute,
                cohort_mean,
                relative,
            }
        })
        .collect();

    Some(StudentPerformance {
        student_id: student_id.to_string(),
        assessment: kind,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Value, GRADE, STUDENT_ID};

    fn table() -> Table {
        let row = |id: &str, q1: Value, q2: Value| {
            vec![Value::Text(id.to_string()), Value::Integer(5000), q1, q2]
        };
        Table {
            name: "Test_4".to_string(),
            columns: vec![
                STUDENT_ID.to_string(),
                GRADE.to_string(),
                "Q1".to_string(),
                "Q2".to_string(),
            ],
            rows: vec![
                row("S1", Value::Integer(8000), Value::Integer(2000)),
                row("S2", Value::Integer(4000), Value::Null),
                row("S3", Value::Integer(6000), Value::Integer(4000)),
            ],
        }
    }

    #[test]
    fn deviation_is_relative_to_cohort_mean() {
        let performance = compare_student(AssessmentKind::Test4, &table(), "S1").unwrap();

        assert_eq!(performance.labels(), vec!["Q1", "Q2"]);
        assert_eq!(performance.absolute_series(), vec![Some(8000.0), Some(2000.0)]);
        assert_eq!(performance.relative_series(), vec![Some(2000.0), Some(-1000.0)]);
    }

    #[test]
    fn missing_score_has_no_deviation() {
        let performance = compare_student(AssessmentKind::Test4, &table(), "S2").unwrap();
        assert_eq!(performance.items[1].absolute, None);
        assert_eq!(performance.items[1].cohort_mean, Some(3000.0));
        assert_eq!(performance.items[1].relative, None);
    }

    #[test]
    fn unknown_student_is_not_found() {
        assert!(compare_student(AssessmentKind::Test4, &table(), "S404").is_none());
    }
}
