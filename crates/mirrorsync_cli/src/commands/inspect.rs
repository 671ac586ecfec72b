//! Inspect command implementation.

use crate::catalog::CatalogEntity;
use crate::error::CliResult;
use mirrorsync_store::{FileStore, LocalStore, Record};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult<E> {
    /// Collection name.
    pub collection: &'static str,
    /// Path of the collection file.
    pub path: String,
    /// Sequence number of the latest commit.
    pub sequence: u64,
    /// Stored records.
    pub records: Vec<Record<E>>,
}

/// Runs the inspect command.
pub fn run<E: CatalogEntity>(data_dir: &Path, format: &str) -> CliResult<()> {
    let store = FileStore::<E>::open(data_dir, false)?;
    let result = InspectResult {
        collection: E::COLLECTION,
        path: store.data_path().display().to_string(),
        sequence: store.sequence(),
        records: store.records()?,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print!("{}", render_text(&result)),
    }
    Ok(())
}

fn render_text<E: CatalogEntity>(result: &InspectResult<E>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "mirrorsync store: {}", result.collection);
    let _ = writeln!(out, "Path:     {}", result.path);
    let _ = writeln!(out, "Sequence: {}", result.sequence);
    let _ = writeln!(out, "Records:  {}", result.records.len());

    if !result.records.is_empty() {
        out.push('\n');
        let mut records: Vec<_> = result.records.iter().collect();
        records.sort_by(|a, b| a.identity_key().cmp(b.identity_key()));
        for record in records {
            let _ = writeln!(out, "  {}  {}", record.storage_key(), record.entity().summary());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Country, CountryDto};

    fn result(names: &[(&str, &str)]) -> InspectResult<Country> {
        InspectResult {
            collection: "countries",
            path: "/data/countries.cbor".into(),
            sequence: 3,
            records: names
                .iter()
                .map(|(code, name)| {
                    Record::new(Country {
                        code: (*code).into(),
                        name: (*name).into(),
                    })
                })
                .collect(),
        }
    }

    #[test]
    fn text_lists_records_by_identity() {
        let text = render_text(&result(&[("PT", "Portugal"), ("ES", "Spain")]));
        assert!(text.contains("Sequence: 3"));
        assert!(text.contains("Records:  2"));
        let es = text.find("Spain").unwrap();
        let pt = text.find("Portugal").unwrap();
        assert!(es < pt);
    }

    #[test]
    fn json_includes_storage_keys() {
        let result = result(&[("ES", "Spain")]);
        let key = result.records[0].storage_key().to_string();
        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["records"][0]["storage_key"], key);
        assert_eq!(json["records"][0]["entity"]["code"], "ES");
    }

    #[test]
    fn missing_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run::<Country>(&dir.path().join("absent"), "text").is_err());
    }

    #[test]
    fn reads_synced_store() {
        use mirrorsync_store::SyncableDto as _;

        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::<Country>::open(dir.path(), true).unwrap();
            let dto: CountryDto = serde_json::from_str(r#"{"code":"ES","name":"Spain"}"#).unwrap();
            assert_eq!(dto.build().code, "ES");
            store.reconcile(&[dto]).unwrap();
        }
        assert!(run::<Country>(dir.path(), "json").is_ok());
    }
}
