use std::io::Read;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// An export exactly as read from disk: header names and text cells.
/// Empty cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("failed to read CSV {}", path.display()))?;
        debug!(path = %path.display(), rows = table.rows.len(), "Loaded raw export");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();

        for record in reader.records() {
            let record = record?;
            let mut row: Vec<Option<String>> = record
                .iter()
                .take(headers.len())
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect();
            row.resize(headers.len(), None);
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }

    /// Removes stray whitespace around header names.
    pub fn trim_headers(&mut self) {
        for header in &mut self.headers {
            *header = header.trim().to_string();
        }
    }

    pub fn rename(&mut self, renames: &[(String, String)]) {
        for header in &mut self.headers {
            if let Some((_, to)) = renames.iter().find(|(from, _)| from == header) {
                *header = to.clone();
            }
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|name| name == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cells_and_pads_short_rows() {
        let csv = " research id ,Grade/600, Q 1 /100\nS1,480,0.8\nS2,,\nS3,-\n";
        let mut table = RawTable::from_reader(csv.as_bytes()).unwrap();
        table.trim_headers();

        assert_eq!(table.headers, vec!["research id", "Grade/600", "Q 1 /100"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec![Some("S2".to_string()), None, None]);
        assert_eq!(table.rows[2], vec![Some("S3".to_string()), Some("-".to_string()), None]);
    }

    #[test]
    fn rename_only_touches_known_headers() {
        let mut table = RawTable {
            headers: vec!["research id".to_string(), "Email".to_string()],
            rows: Vec::new(),
        };
        table.rename(&[("research id".to_string(), "student_id".to_string())]);
        assert_eq!(table.headers, vec!["student_id", "Email"]);
    }
}
