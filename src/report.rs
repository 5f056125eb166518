use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::assessment::AssessmentKind;
use crate::models::{AssessmentGrade, StudentPerformance, Table, UnderperformanceReport};

#[derive(Debug, Clone, PartialEq)]
pub struct WeakestTestSummary {
    pub test: AssessmentKind,
    pub count: usize,
    pub avg_grade: f64,
}

/// How many underperforming students had each formative test as their weakest.
pub fn summarize_by_weakest_test(report: &UnderperformanceReport) -> Vec<WeakestTestSummary> {
    let mut map: HashMap<AssessmentKind, (usize, f64)> = HashMap::new();

    for student in &report.students {
        if let (Some(test), Some(grade)) =
            (student.lowest_formative_test, student.lowest_formative_grade)
        {
            let entry = map.entry(test).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += grade;
        }
    }

    let mut summaries: Vec<WeakestTestSummary> = map
        .into_iter()
        .map(|(test, (count, total))| WeakestTestSummary {
            test,
            count,
            avg_grade: total / count as f64,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.test.cmp(&b.test)));
    summaries
}

fn optional(value: Option<f64>) -> String {
    value.map(|value| format!("{value:.0}")).unwrap_or_else(|| "-".to_string())
}

pub fn build_report(generated_on: NaiveDate, report: &UnderperformanceReport) -> String {
    let summaries = summarize_by_weakest_test(report);
    let mut output = String::new();

    let _ = writeln!(output, "# Underperforming Students Report");
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort");

    match report.sum_average {
        Some(average) => {
            let _ = writeln!(output, "- Summative average: {average:.2}");
        }
        None => {
            let _ = writeln!(output, "- No summative grades recorded.");
        }
    }
    let _ = writeln!(
        output,
        "- Underperforming students (at least 3 formative attempts): {}",
        report.students.len()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    if report.students.is_empty() {
        let _ = writeln!(output, "No underperforming students found.");
    } else {
        let _ = writeln!(
            output,
            "| Student | Summative | Lowest formative | Lowest test | Attempts |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|");
        for student in &report.students {
            let _ = writeln!(
                output,
                "| {} | {:.0} | {} | {} | {} |",
                student.student_id,
                student.summative_grade,
                optional(student.lowest_formative_grade),
                student
                    .lowest_formative_test
                    .map_or("-", AssessmentKind::table_name),
                student.attempt_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weakest Formative Test");

    if summaries.is_empty() {
        let _ = writeln!(output, "No formative results for these students.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {}: {} students (avg lowest grade {:.1})",
                summary.test, summary.count, summary.avg_grade
            );
        }
    }

    output
}

fn pad_line<'a>(values: impl Iterator<Item = &'a String>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, &width)| format!("{value:>width$}"))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Plain-text grid of a table for terminal display.
pub fn render_table(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    let _ = writeln!(output, "{}", pad_line(table.columns.iter(), &widths));
    for row in &cells {
        let _ = writeln!(output, "{}", pad_line(row.iter(), &widths));
    }
    output
}

pub fn render_results(student_id: &str, results: &[AssessmentGrade]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Results for student {student_id}:");
    for result in results {
        let _ = writeln!(output, "- {}: {:.0}", result.assessment, result.grade);
    }
    output
}

pub fn render_performance(performance: &StudentPerformance) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Student {} in {} (absolute / cohort mean / relative):",
        performance.student_id, performance.assessment
    );
    for item in &performance.items {
        let _ = writeln!(
            output,
            "- {}: {} / {} / {}",
            item.label,
            optional(item.absolute),
            item.cohort_mean
                .map_or_else(|| "-".to_string(), |mean| format!("{mean:.1}")),
            item.relative
                .map_or_else(|| "-".to_string(), |relative| format!("{relative:+.1}"))
        );
    }
    output
}

pub fn render_underperforming(report: &UnderperformanceReport, limit: usize) -> String {
    let mut output = String::new();
    if let Some(average) = report.sum_average {
        let _ = writeln!(output, "Summative average: {average:.2}");
    }
    let _ = writeln!(output, "Underperforming students, worst first:");
    for student in report.students.iter().take(limit) {
        let _ = writeln!(
            output,
            "- {} summative {:.0}, lowest formative {} ({}), {} attempts",
            student.student_id,
            student.summative_grade,
            optional(student.lowest_formative_grade),
            student
                .lowest_formative_test
                .map_or("-", AssessmentKind::table_name),
            student.attempt_count
        );
    }
    let hidden = report.students.len().saturating_sub(limit);
    if hidden > 0 {
        let _ = writeln!(output, "... and {hidden} more (raise --limit to see them)");
    }
    output
}
