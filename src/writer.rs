//! CSV serialization of a [`DdfDataset`].
//!
//! Every file gets a header row even when it has no data rows. Fields are
//! quoted only when they contain the delimiter, a quote or a newline, and
//! records end in `\n`. Existing files are overwritten.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::common::*;
use crate::ddf::DdfDataset;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub const DATAPOINT_HEADER: [&str; 5] = [
    ASYLUM_RESIDENCE,
    ORIGIN,
    DISPLACEMENT_TYPE,
    YEAR,
    DISPLACED_POPULATION,
];
pub const AGGREGATED_HEADER: [&str; 4] =
    [ASYLUM_RESIDENCE, DISPLACEMENT_TYPE, YEAR, DISPLACED_POPULATION];
pub const CONCEPT_HEADER: [&str; 3] = ["concept", NAME, "concept_type"];

/// Write a header row followed by one serialized record per row.
pub fn write_table<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: &[T],
) -> Result<(), WriteError> {
    let csv_err = |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .map_err(csv_err)?;

    w.write_record(header).map_err(csv_err)?;
    for row in rows {
        w.serialize(row).map_err(csv_err)?;
    }
    w.flush().map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write an entity table whose id column is named after its domain.
pub fn write_entities(path: &Path, domain: &str, entities: &[Entity]) -> Result<(), WriteError> {
    let rows: Vec<(&str, &str)> = entities
        .iter()
        .map(|e| (e.id.as_str(), e.name.as_str()))
        .collect();
    write_table(path, &[domain, NAME], &rows)
}

pub struct DdfWriter {
    out_dir: PathBuf,
    show_progress: bool,
}

impl DdfWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Write all six files, returning their paths in write order.
    pub fn write(&self, dataset: &DdfDataset) -> Result<Vec<PathBuf>, WriteError> {
        std::fs::create_dir_all(&self.out_dir).map_err(|source| WriteError::Io {
            path: self.out_dir.clone(),
            source,
        })?;

        let jobs: [(&'static str, &dyn Fn(&Path) -> Result<(), WriteError>); 6] = [
            (DATAPOINTS_FILE, &|p: &Path| {
                write_table(p, &DATAPOINT_HEADER, &dataset.datapoints)
            }),
            (AGGREGATED_FILE, &|p: &Path| {
                write_table(p, &AGGREGATED_HEADER, &dataset.aggregated)
            }),
            (ASYLUM_RESIDENCE_ENTITIES_FILE, &|p: &Path| {
                write_entities(p, ASYLUM_RESIDENCE, &dataset.asylum_residence)
            }),
            (ORIGIN_ENTITIES_FILE, &|p: &Path| {
                write_entities(p, ORIGIN, &dataset.origin)
            }),
            (DISPLACEMENT_TYPE_ENTITIES_FILE, &|p: &Path| {
                write_entities(p, DISPLACEMENT_TYPE, &dataset.displacement_type)
            }),
            (CONCEPTS_FILE, &|p: &Path| {
                write_table(p, &CONCEPT_HEADER, &dataset.concepts)
            }),
        ];

        let pb = if self.show_progress {
            ProgressBar::new(jobs.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("  Writing    {bar:40.cyan/blue} {pos}/{len} files {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }

        let mut written = Vec::with_capacity(jobs.len());
        for (file_name, job) in jobs {
            let path = self.out_dir.join(file_name);
            pb.set_message(file_name);
            job(&path)?;
            info!("  Wrote {}", path.display());
            written.push(path);
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddf::concepts;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_datapoints_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATAPOINTS_FILE);
        let rows = [Datapoint {
            asylum_residence: "tcd".to_string(),
            origin: "sdn".to_string(),
            displacement_type: "refugees".to_string(),
            year: Year(2004),
            displaced_population: 200000,
        }];
        write_table(&path, &DATAPOINT_HEADER, &rows).unwrap();
        assert_eq!(
            read(&path),
            "asylum_residence,origin,displacement_type,year,displaced_population\n\
             tcd,sdn,refugees,2004,200000\n"
        );
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AGGREGATED_FILE);
        write_table::<AggregatedDatapoint>(&path, &AGGREGATED_HEADER, &[]).unwrap();
        assert_eq!(
            read(&path),
            "asylum_residence,displacement_type,year,displaced_population\n"
        );
    }

    #[test]
    fn test_entities_quote_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ORIGIN_ENTITIES_FILE);
        let entities = [
            Entity {
                id: "kor".to_string(),
                name: "Korea, Republic of".to_string(),
            },
            Entity {
                id: "srb".to_string(),
                name: "Serbia and Kosovo (S/RES/1244 (1999))".to_string(),
            },
        ];
        write_entities(&path, ORIGIN, &entities).unwrap();
        assert_eq!(
            read(&path),
            "origin,name\n\
             kor,\"Korea, Republic of\"\n\
             srb,Serbia and Kosovo (S/RES/1244 (1999))\n"
        );
    }

    #[test]
    fn test_concepts_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONCEPTS_FILE);
        write_table(&path, &CONCEPT_HEADER, &concepts()).unwrap();
        let text = read(&path);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "concept,name,concept_type");
        assert_eq!(
            lines[1],
            "asylum_residence,Country / territory of asylum/residence,entity_domain"
        );
        assert_eq!(lines[4], "displaced_population,Displaced Population,measure");
        assert_eq!(lines[5], "year,Year,time");
    }

    #[test]
    fn test_write_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("out");
        let written = DdfWriter::new(&out_dir).write(&DdfDataset::default()).unwrap();
        assert_eq!(written[0], out_dir.join(DATAPOINTS_FILE));
        assert!(out_dir.join(CONCEPTS_FILE).exists());
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().to_path_buf();
        std::fs::write(out_dir.join(CONCEPTS_FILE), "stale,content\nfrom,before\nand,more\n").unwrap();

        let dataset = DdfDataset {
            concepts: concepts(),
            ..Default::default()
        };
        let written = DdfWriter::new(&out_dir).write(&dataset).unwrap();
        assert_eq!(written.len(), 6);
        assert!(written.iter().all(|p| p.exists()));
        assert!(read(&out_dir.join(CONCEPTS_FILE)).starts_with("concept,name,concept_type\n"));
        assert_eq!(read(&out_dir.join(ORIGIN_ENTITIES_FILE)), "origin,name\n");
    }
}
