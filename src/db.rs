use std::path::Path;

use anyhow::Context;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{query::Query, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::assessment::AssessmentKind;
use crate::models::{AssessmentGrade, Table, Value, GRADE, STUDENT_ID};

pub async fn open(path: &Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", path.display()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Declared SQLite type for a column, from the values it holds.
fn column_type(rows: &[Vec<Value>], index: usize) -> &'static str {
    let mut declared = "INTEGER";
    for row in rows {
        match &row[index] {
            Value::Null | Value::Integer(_) => {}
            Value::Real(_) => declared = "REAL",
            Value::Text(_) => return "TEXT",
        }
    }
    declared
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Integer(value) => query.bind(*value),
        Value::Real(value) => query.bind(*value),
        Value::Text(text) => query.bind(text.as_str()),
    }
}

/// Replaces the table of the same name with `table`, in one transaction.
pub async fn write_table(pool: &SqlitePool, table: &Table) -> anyhow::Result<()> {
    let name = quote_ident(&table.name);
    let definitions: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{} {}", quote_ident(column), column_type(&table.rows, index)))
        .collect();
    let insert = format!(
        "INSERT INTO {name} VALUES ({})",
        vec!["?"; table.columns.len()].join(", ")
    );

    let mut tx = pool.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {name}"))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("CREATE TABLE {name} ({})", definitions.join(", ")))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to create table {}", table.name))?;

    for row in &table.rows {
        let mut query = sqlx::query(&insert);
        for value in row {
            query = bind_value(query, value);
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!(table = %table.name, rows = table.rows.len(), "Table written");
    Ok(())
}

pub async fn table_names(pool: &SqlitePool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("name")).collect())
}

fn decode_row(row: &SqliteRow) -> Result<Vec<Value>, sqlx::Error> {
    (0..row.len())
        .map(|index| {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_string();
            Ok(match type_name.as_str() {
                "INTEGER" => Value::Integer(row.try_get(index)?),
                "REAL" => Value::Real(row.try_get(index)?),
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(index)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get(index)?),
            })
        })
        .collect()
}

/// All rows of one assessment table, in stored order.
pub async fn fetch_table(pool: &SqlitePool, kind: AssessmentKind) -> anyhow::Result<Table> {
    let name = kind.table_name();

    let columns: Vec<String> =
        sqlx::query("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind(name)
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| row.get("name"))
            .collect();
    if columns.is_empty() {
        anyhow::bail!("table {name} not found; run `normalize` first");
    }

    let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(name)))
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to read table {name}"))?
        .iter()
        .map(decode_row)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(table = name, rows = rows.len(), "Table loaded");
    Ok(Table {
        name: name.to_string(),
        columns,
        rows,
    })
}

/// `(student_id, Grade)` pairs of a graded table.
pub async fn fetch_grades(
    pool: &SqlitePool,
    kind: AssessmentKind,
) -> anyhow::Result<Vec<(Value, Value)>> {
    let sql = format!(
        "SELECT {}, {} FROM {} ORDER BY rowid",
        quote_ident(STUDENT_ID),
        quote_ident(GRADE),
        quote_ident(kind.table_name())
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to read grades from {kind}"))?;

    rows.iter()
        .map(|row| {
            let mut values = decode_row(row)?.into_iter();
            let id = values.next().unwrap_or(Value::Null);
            let grade = values.next().unwrap_or(Value::Null);
            Ok((id, grade))
        })
        .collect()
}

/// One student's grade in every graded table present, sorted by table name.
pub async fn student_results(
    pool: &SqlitePool,
    student_id: &str,
) -> anyhow::Result<Vec<AssessmentGrade>> {
    let present = table_names(pool).await?;
    let mut results = Vec::new();

    for name in present {
        let Ok(kind) = name.parse::<AssessmentKind>() else {
            continue;
        };
        if !AssessmentKind::GRADED.contains(&kind) {
            continue;
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY rowid LIMIT 1",
            quote_ident(GRADE),
            quote_ident(&name),
            quote_ident(STUDENT_ID)
        );
        let row = sqlx::query(&sql).bind(student_id).fetch_optional(pool).await?;
        if let Some(row) = row {
            if let Some(grade) = decode_row(&row)?.first().and_then(Value::as_f64) {
                results.push(AssessmentGrade {
                    assessment: kind,
                    grade,
                });
            }
        }
    }

    results.sort_by(|a, b| a.assessment.table_name().cmp(b.assessment.table_name()));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, grades: &[(&str, i64)]) -> Table {
        Table {
            name: name.to_string(),
            columns: vec![STUDENT_ID.to_string(), GRADE.to_string(), "Q1".to_string()],
            rows: grades
                .iter()
                .map(|(id, grade)| {
                    vec![Value::Text(id.to_string()), Value::Integer(*grade), Value::Real(0.5)]
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn write_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("store.db")).await.unwrap();

        write_table(&pool, &sample("Test_1", &[("S1", 100), ("S2", 200)])).await.unwrap();
        let replacement = sample("Test_1", &[("S9", 900)]);
        write_table(&pool, &replacement).await.unwrap();

        let loaded = fetch_table(&pool, AssessmentKind::Test1).await.unwrap();
        assert_eq!(loaded, replacement);
        pool.close().await;
    }

    #[tokio::test]
    async fn writes_are_idempotent_and_leave_other_tables_alone() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("store.db")).await.unwrap();

        let sum = sample("Sum_Test", &[("S1", 5000)]);
        write_table(&pool, &sum).await.unwrap();
        let test = sample("Test_2", &[("S1", 7000), ("S2", 0)]);
        write_table(&pool, &test).await.unwrap();
        let first = fetch_table(&pool, AssessmentKind::Test2).await.unwrap();
        write_table(&pool, &test).await.unwrap();
        let second = fetch_table(&pool, AssessmentKind::Test2).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetch_table(&pool, AssessmentKind::SumTest).await.unwrap(), sum);
        pool.close().await;
    }

    #[tokio::test]
    async fn student_results_sorted_by_assessment() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("store.db")).await.unwrap();

        write_table(&pool, &sample("Test_2", &[("S1", 4000)])).await.unwrap();
        write_table(&pool, &sample("Mock_Test", &[("S1", 6000)])).await.unwrap();
        write_table(&pool, &sample("Sum_Test", &[("S2", 9000)])).await.unwrap();

        let results = student_results(&pool, "S1").await.unwrap();
        assert_eq!(
            results,
            vec![
                AssessmentGrade { assessment: AssessmentKind::MockTest, grade: 6000.0 },
                AssessmentGrade { assessment: AssessmentKind::Test2, grade: 4000.0 },
            ]
        );
        assert!(student_results(&pool, "S404").await.unwrap().is_empty());
        pool.close().await;
    }

    #[tokio::test]
    async fn student_rate_markers_are_stored_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("store.db")).await.unwrap();

        let csv = "research id,rate\nS1,NaN\nS2,0.5\n";
        let raw = crate::source::RawTable::from_reader(csv.as_bytes()).unwrap();
        let table = crate::normalize::normalize(AssessmentKind::StudentRate, raw).unwrap();
        write_table(&pool, &table).await.unwrap();

        let loaded = fetch_table(&pool, AssessmentKind::StudentRate).await.unwrap();
        assert_eq!(
            loaded.rows,
            vec![
                vec![Value::Text("S1".to_string()), Value::Real(0.0)],
                vec![Value::Text("S2".to_string()), Value::Real(0.5)],
            ]
        );
        pool.close().await;
    }

    #[tokio::test]
    async fn missing_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open(&dir.path().join("store.db")).await.unwrap();
        let err = fetch_table(&pool, AssessmentKind::Test3).await.unwrap_err();
        assert!(err.to_string().contains("Test_3"));
        pool.close().await;
    }
}
