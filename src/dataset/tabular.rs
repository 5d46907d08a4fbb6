//! Identity table ingestion
//!
//! Reads the header-bearing CSV metadata tables of an identity dataset
//! (one row per `(image, identity)` observation) and groups them into the
//! class → samples mapping the class-level split consumes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::utils::error::{CorpusError, Result, ResultExt};

/// Column names of an identity table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableColumns {
    /// Column holding the sample identifier
    pub image_col: String,
    /// Column holding the identity (class) key
    pub class_col: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            image_col: "image_id".to_string(),
            class_col: "original_whale_id".to_string(),
        }
    }
}

/// One `(sample, identity)` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub image_id: String,
    pub identity: String,
}

/// Split one CSV record, honouring double quotes and `""` escapes
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

/// Parse an identity table from an in-memory string
pub fn parse_observations(content: &str, columns: &TableColumns) -> Result<Vec<Observation>> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| CorpusError::Dataset("empty table".to_string()))?;
    let header = split_record(header.trim_start_matches('\u{feff}'));

    let column_index = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CorpusError::Dataset(format!("column '{}' not found in header", name)))
    };
    let image_idx = column_index(&columns.image_col)?;
    let class_idx = column_index(&columns.class_col)?;

    let mut observations = Vec::new();
    for (line_no, line) in lines {
        let record = split_record(line);
        let (Some(image_id), Some(identity)) = (record.get(image_idx), record.get(class_idx)) else {
            return Err(CorpusError::Dataset(format!(
                "line {} has {} columns, expected at least {}",
                line_no + 1,
                record.len(),
                image_idx.max(class_idx) + 1
            )));
        };

        if image_id.is_empty() || identity.is_empty() {
            warn!("Skipping line {}: empty image id or identity", line_no + 1);
            continue;
        }

        observations.push(Observation {
            image_id: image_id.clone(),
            identity: identity.clone(),
        });
    }

    Ok(observations)
}

/// Read the observations of one or more tables, in table order
pub fn read_observations<P: AsRef<Path>>(
    paths: &[P],
    columns: &TableColumns,
) -> Result<Vec<Observation>> {
    let mut observations = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CorpusError::PathNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read table {}", path.display()))?;
        let table = parse_observations(&content, columns).map_err(|e| match e {
            CorpusError::Dataset(msg) => CorpusError::Dataset(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        info!("Read {} observations from {:?}", table.len(), path);
        observations.extend(table);
    }

    Ok(observations)
}

/// Group observations into `<class_prefix><identity>` → sample ids
///
/// Sample order within a class follows row order. Repeated image ids are kept
/// as distinct observations.
pub fn group_by_class(
    observations: impl IntoIterator<Item = Observation>,
    class_prefix: &str,
) -> BTreeMap<String, Vec<String>> {
    let mut occurrences: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for obs in observations {
        occurrences
            .entry(format!("{}{}", class_prefix, obs.identity))
            .or_default()
            .push(obs.image_id);
    }
    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TABLE: &str = "image_id,original_whale_id,species\n\
                         img_1,17,humpback\n\
                         img_2,17,humpback\n\
                         img_3,4,\"blue, pygmy\"\n";

    #[test]
    fn test_split_record_quotes() {
        assert_eq!(split_record("a, \"b,c\" ,d"), vec!["a", "b,c", "d"]);
        assert_eq!(split_record("\"say \"\"hi\"\"\",x"), vec!["say \"hi\"", "x"]);
        assert_eq!(split_record("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_parse_observations() {
        let obs = parse_observations(TABLE, &TableColumns::default()).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(
            obs[2],
            Observation {
                image_id: "img_3".to_string(),
                identity: "4".to_string()
            }
        );
    }

    #[test]
    fn test_missing_column() {
        let columns = TableColumns {
            image_col: "image_id".to_string(),
            class_col: "individual_id".to_string(),
        };
        let result = parse_observations(TABLE, &columns);
        assert!(matches!(result, Err(CorpusError::Dataset(msg)) if msg.contains("individual_id")));
    }

    #[test]
    fn test_short_row_is_error() {
        let result = parse_observations("image_id,original_whale_id\nimg_1\n", &TableColumns::default());
        assert!(matches!(result, Err(CorpusError::Dataset(msg)) if msg.contains("line 2")));
    }

    #[test]
    fn test_empty_identity_skipped() {
        let obs =
            parse_observations("image_id,original_whale_id\nimg_1,\nimg_2,3\n", &TableColumns::default())
                .unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].image_id, "img_2");
    }

    #[test]
    fn test_read_multiple_tables_keeps_duplicates() {
        let dir = TempDir::new().unwrap();
        let train = dir.path().join("train.csv");
        let test = dir.path().join("test.csv");
        fs::write(&train, "image_id,original_whale_id\na,1\nb,1\n").unwrap();
        fs::write(&test, "original_whale_id,image_id\n2,c\n1,a\n").unwrap();

        let obs = read_observations(&[&train, &test], &TableColumns::default()).unwrap();
        let grouped = group_by_class(obs, "whale");

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["whale1"], vec!["a", "b", "a"]);
        assert_eq!(grouped["whale2"], vec!["c"]);
    }

    #[test]
    fn test_read_missing_table() {
        let result = read_observations(&[Path::new("/nonexistent/meta.csv")], &TableColumns::default());
        assert!(matches!(result, Err(CorpusError::PathNotFound(_))));
    }
}
