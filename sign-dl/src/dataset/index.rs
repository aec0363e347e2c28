use crate::common::*;

/// One row of the tabular dataset descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(rename = "Width")]
    pub width: u32,
    #[serde(rename = "Height")]
    pub height: u32,
    #[serde(rename = "Roi.X1")]
    pub x1: u32,
    #[serde(rename = "Roi.Y1")]
    pub y1: u32,
    #[serde(rename = "Roi.X2")]
    pub x2: u32,
    #[serde(rename = "Roi.Y2")]
    pub y2: u32,
    #[serde(rename = "ClassId")]
    pub class_id: i64,
    #[serde(rename = "Path")]
    pub path: PathBuf,
}

/// Parse an index file into a list of records.
pub fn load_index_file(index_file: impl AsRef<Path>) -> Result<Vec<IndexRecord>> {
    let index_file = index_file.as_ref();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(index_file)
        .with_context(|| format!("failed to open index file '{}'", index_file.display()))?;
    let records: Vec<IndexRecord> = reader
        .deserialize()
        .try_collect()
        .with_context(|| format!("malformed index file '{}'", index_file.display()))?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_file_roundtrip() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("sign-dl-index-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let index_file = dir.join("Train.csv");

        let expect = vec![
            IndexRecord {
                width: 40,
                height: 41,
                x1: 5,
                y1: 6,
                x2: 35,
                y2: 36,
                class_id: 7,
                path: PathBuf::from("Train/7/00007_00000.png"),
            },
            IndexRecord {
                width: 28,
                height: 29,
                x1: 2,
                y1: 2,
                x2: 26,
                y2: 27,
                class_id: 0,
                path: PathBuf::from("Train/0/00000_00001.png"),
            },
        ];

        {
            let mut writer = csv::Writer::from_path(&index_file)?;
            for record in &expect {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }

        let records = load_index_file(&index_file)?;
        assert_eq!(records, expect);

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn missing_index_file_fails() {
        let result = load_index_file("/nonexistent/Train.csv");
        assert!(result.is_err());
    }
}
