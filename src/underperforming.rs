use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::assessment::AssessmentKind;
use crate::db;
use crate::extremum::{select_per_group, Extremum};
use crate::models::{FormativeResult, UnderperformanceReport, UnderperformingStudent, Value};

/// Formative attempts needed before a low summative grade counts.
pub const MIN_ATTEMPTS: usize = 3;

/// Keeps rows that have both a student id and a numeric grade.
pub fn graded_rows(rows: Vec<(Value, Value)>) -> Vec<(String, f64)> {
    rows.into_iter()
        .filter_map(|(id, grade)| Some((id.as_key()?, grade.as_f64()?)))
        .collect()
}

pub async fn load_and_detect(pool: &SqlitePool) -> anyhow::Result<UnderperformanceReport> {
    let summative = graded_rows(db::fetch_grades(pool, AssessmentKind::SumTest).await?);

    let mut formative = Vec::new();
    for kind in AssessmentKind::FORMATIVE {
        let rows = graded_rows(db::fetch_grades(pool, kind).await?);
        formative.extend(rows.into_iter().map(|(student_id, grade)| FormativeResult {
            student_id,
            grade,
            test: kind,
        }));
    }
    debug!(
        summative = summative.len(),
        formative = formative.len(),
        "Loaded grades for underperformance check"
    );

    Ok(detect(&summative, &formative))
}

pub fn detect(summative: &[(String, f64)], formative: &[FormativeResult]) -> UnderperformanceReport {
    let attempted: Vec<&FormativeResult> = formative.iter().filter(|row| row.grade > 0.0).collect();

    let mut attempts: HashMap<&str, usize> = HashMap::new();
    for row in &attempted {
        *attempts.entry(row.student_id.as_str()).or_default() += 1;
    }

    let lowest: HashMap<&str, &FormativeResult> = select_per_group(
        &attempted,
        |row| row.student_id.clone(),
        Extremum::Min,
        |a, b| {
            a.grade
                .total_cmp(&b.grade)
                .then_with(|| a.test.table_name().cmp(b.test.table_name()))
        },
    )
    .into_iter()
    .map(|index| (attempted[index].student_id.as_str(), attempted[index]))
    .collect();

    if summative.is_empty() {
        info!("No summative grades; nothing to compare against");
        return UnderperformanceReport {
            sum_average: None,
            students: Vec::new(),
        };
    }

    let sum_average =
        summative.iter().map(|(_, grade)| grade).sum::<f64>() / summative.len() as f64;

    let mut students: Vec<UnderperformingStudent> = summative
        .iter()
        .filter(|(_, grade)| *grade < sum_average)
        .map(|(student_id, grade)| {
            let weakest = lowest.get(student_id.as_str());
            UnderperformingStudent {
                student_id: student_id.clone(),
                summative_grade: *grade,
                lowest_formative_grade: weakest.map(|row| row.grade),
                lowest_formative_test: weakest.map(|row| row.test),
                attempt_count: attempts.get(student_id.as_str()).copied().unwrap_or(0),
            }
        })
        .filter(|student| student.attempt_count >= MIN_ATTEMPTS)
        .collect();

    students.sort_by(|a, b| a.summative_grade.total_cmp(&b.summative_grade));

    info!(
        sum_average,
        underperforming = students.len(),
        "Underperformance check complete"
    );

    UnderperformanceReport {
        sum_average: Some(sum_average),
        students,
    }
}
