use sqlx::SqlitePool;
use tracing::info;

use crate::assessment::AssessmentKind;
use crate::config::SourceFiles;
use crate::db;
use crate::normalize::normalize;
use crate::source::RawTable;

/// Normalizes every export and replaces its table in the store.
///
/// Stops at the first failure; tables written before it stay written.
pub async fn run(pool: &SqlitePool, sources: &SourceFiles) -> anyhow::Result<Vec<AssessmentKind>> {
    let mut written = Vec::new();

    for kind in AssessmentKind::RUN_ORDER {
        let raw = RawTable::from_path(sources.path(kind))?;
        let table = normalize(kind, raw)?;
        db::write_table(pool, &table).await?;
        written.push(kind);
    }

    info!(tables = written.len(), "Normalization run complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use crate::normalize::NormalizeError;
    use std::path::Path;

    const EXPORTS: [(&str, &str); 7] = [
        (
            "Test_1",
            "research id,State,Grade/600,Q 1 /100\nS1,Finished,480,0.8\nS2,Finished,60,0.1\nS1,Finished,300,0.5\n",
        ),
        ("Test_2", "research id,Grade/700,Q 4 /200\nS1,350,100\nS2,70,-\n"),
        ("Test_3", "research id ,Grade/600\nS1,600\nS2,-\n"),
        ("Test_4", "research id,Grade/1000,Q 1 /500,Q 2 /500\nS1,400,200,200\nS2,100,50,50\n"),
        ("Mock_Test", "research id,Grade/10000,Q 8 /2000\nS1,7000,1000\nS2,1500,300\n"),
        ("Student_Rate", "research id,rate\nS1,0.9\nS2,\n"),
        ("Sum_Test", "research id,Grade/10000\nS1,8000\nS2,3000\n"),
    ];

    fn write_exports(dir: &Path) {
        for (name, csv) in EXPORTS {
            std::fs::write(dir.join(format!("{name}.csv")), csv).unwrap();
        }
    }

    #[tokio::test]
    async fn full_run_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        write_exports(dir.path());
        let sources = SourceFiles::in_dir(dir.path());
        let pool = db::open(&dir.path().join("store.db")).await.unwrap();

        let written = run(&pool, &sources).await.unwrap();
        assert_eq!(written, AssessmentKind::RUN_ORDER.to_vec());
        let first = db::fetch_table(&pool, AssessmentKind::Test1).await.unwrap();

        run(&pool, &sources).await.unwrap();
        let second = db::fetch_table(&pool, AssessmentKind::Test1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.columns, vec!["student_id", "Grade", "Q1"]);
        assert_eq!(
            first.rows[0],
            vec![Value::Text("S1".to_string()), Value::Integer(8000), Value::Integer(80)]
        );
        assert_eq!(first.rows.len(), 2);

        let mock = db::fetch_table(&pool, AssessmentKind::MockTest).await.unwrap();
        assert_eq!(mock.rows[0][2], Value::Integer(5000));
        pool.close().await;
    }

    #[tokio::test]
    async fn schema_error_keeps_earlier_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_exports(dir.path());
        std::fs::write(dir.path().join("Test_3.csv"), "id,Grade/600\nS1,600\n").unwrap();
        let sources = SourceFiles::in_dir(dir.path());
        let pool = db::open(&dir.path().join("store.db")).await.unwrap();

        let err = run(&pool, &sources).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NormalizeError>(),
            Some(NormalizeError::MissingColumns { table, .. }) if table == "Test_3"
        ));

        let present = db::table_names(&pool).await.unwrap();
        assert_eq!(present, vec!["Test_1", "Test_2"]);
        pool.close().await;
    }
}
