use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use crate::document::{list_files, read_utf8};
use crate::error::{RAGError, Result};

pub const SUBMISSIONS: &str = "sub.txt";
pub const TAGS: &str = "tag.txt";
pub const NUMBERS: &str = "num.txt";

pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// A tab-separated table with a header row.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    header: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn parse(name: &str, text: &str) -> Self {
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
        let header = lines
            .next()
            .map(|h| {
                h.split('\t')
                    .enumerate()
                    .map(|(i, col)| (col.trim().to_string(), i))
                    .collect()
            })
            .unwrap_or_default();
        let rows = lines
            .filter(|l| !l.is_empty())
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect();
        Self {
            name: name.to_string(),
            header,
            rows,
        }
    }

    fn column(&self, col: &str) -> Result<usize> {
        self.header
            .get(col)
            .copied()
            .ok_or_else(|| RAGError::MalformedTable {
                table: self.name.clone(),
                reason: format!("missing column `{col}`"),
            })
    }

    fn optional_column(&self, col: &str) -> Option<usize> {
        self.header.get(col).copied()
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Filing id -> company name.
#[derive(Debug, Default)]
pub struct CompanyLookup {
    names: HashMap<String, Option<String>>,
}

impl CompanyLookup {
    pub fn from_table(table: &Table) -> Result<Self> {
        let adsh = table.column("adsh")?;
        let name = table.optional_column("name");
        let names = table
            .rows
            .iter()
            .map(|row| {
                let company = name
                    .map(|i| cell(row, i).trim())
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                (cell(row, adsh).to_string(), company)
            })
            .collect();
        Ok(Self { names })
    }

    pub fn resolve(&self, adsh: &str) -> Option<&str> {
        self.names.get(adsh).and_then(|n| n.as_deref())
    }
}

/// (tag, version) -> human readable label.
#[derive(Debug, Default)]
pub struct TagLookup {
    labels: HashMap<(String, String), String>,
}

impl TagLookup {
    pub fn from_table(table: &Table) -> Result<Self> {
        let tag = table.column("tag")?;
        let version = table.column("version")?;
        let tlabel = table.optional_column("tlabel");
        let labels = table
            .rows
            .iter()
            .map(|row| {
                let label = tlabel.map(|i| cell(row, i)).unwrap_or("").to_string();
                ((cell(row, tag).to_string(), cell(row, version).to_string()), label)
            })
            .collect();
        Ok(Self { labels })
    }

    /// Empty labels count as misses.
    pub fn resolve(&self, tag: &str, version: &str) -> Option<&str> {
        self.labels
            .get(&(tag.to_string(), version.to_string()))
            .map(String::as_str)
            .filter(|l| !l.is_empty())
    }
}

/// One reported value, straight from a `num.txt` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub adsh: String,
    pub tag: String,
    pub version: String,
    pub value: String,
    pub uom: String,
    pub ddate: String,
}

pub fn parse_facts(table: &Table) -> Result<Vec<Fact>> {
    let adsh = table.column("adsh")?;
    let tag = table.column("tag")?;
    let version = table.column("version")?;
    let value = table.column("value")?;
    let uom = table.column("uom")?;
    let ddate = table.column("ddate")?;

    Ok(table
        .rows
        .iter()
        .map(|row| Fact {
            adsh: cell(row, adsh).to_string(),
            tag: cell(row, tag).to_string(),
            version: cell(row, version).to_string(),
            value: cell(row, value).to_string(),
            uom: cell(row, uom).to_string(),
            ddate: cell(row, ddate).to_string(),
        })
        .collect())
}

pub fn render_sentence(company: &str, label: &str, fact: &Fact) -> String {
    format!(
        "{} reported {} of {} {} on {}.",
        company, label, fact.value, fact.uom, fact.ddate
    )
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeStats {
    pub facts: usize,
    pub company_misses: usize,
    pub tag_misses: usize,
}

/// The three datasets of one filing archive.
#[derive(Debug)]
pub struct Archive {
    pub submissions: Table,
    pub tags: Table,
    pub numbers: Table,
}

impl Archive {
    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        let map: Map<String, Value> =
            serde_json::from_str(text).map_err(|e| RAGError::Deserialization(e.to_string()))?;

        let missing: Vec<&'static str> = [SUBMISSIONS, TAGS, NUMBERS]
            .into_iter()
            .filter(|key| !map.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(RAGError::MissingInputData {
                path: path.to_path_buf(),
                missing,
            });
        }

        let table = |key: &str| -> Result<Table> {
            match map.get(key) {
                Some(Value::String(s)) => Ok(Table::parse(key, s)),
                _ => Err(RAGError::MalformedTable {
                    table: key.to_string(),
                    reason: "dataset is not a string".to_string(),
                }),
            }
        };

        Ok(Self {
            submissions: table(SUBMISSIONS)?,
            tags: table(TAGS)?,
            numbers: table(NUMBERS)?,
        })
    }

    /// Renders every fact as a sentence, in `num.txt` row order.
    pub fn sentences(&self) -> Result<(Vec<String>, NormalizeStats)> {
        let companies = CompanyLookup::from_table(&self.submissions)?;
        let tags = TagLookup::from_table(&self.tags)?;
        let facts = parse_facts(&self.numbers)?;

        let mut stats = NormalizeStats {
            facts: facts.len(),
            ..Default::default()
        };
        let sentences = facts
            .iter()
            .map(|fact| {
                let company = companies.resolve(&fact.adsh).unwrap_or_else(|| {
                    stats.company_misses += 1;
                    UNKNOWN_COMPANY
                });
                let label = tags.resolve(&fact.tag, &fact.version).unwrap_or_else(|| {
                    stats.tag_misses += 1;
                    fact.tag.as_str()
                });
                render_sentence(company, label, fact)
            })
            .collect();
        Ok((sentences, stats))
    }
}

/// Output name for an archive: its file name with `.txt` appended.
pub fn output_path(archive: &Path, out_dir: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".txt");
    out_dir.join(name)
}

pub fn normalize_archive(archive: &Path, out_dir: &Path) -> Result<(PathBuf, NormalizeStats)> {
    info!("Loading {}", archive.display());
    let text = read_utf8(archive)?;
    let parsed = Archive::from_json(archive, &text)?;
    let (sentences, stats) = parsed.sentences()?;
    if stats.company_misses > 0 || stats.tag_misses > 0 {
        debug!(
            "{}: {} company and {} tag lookups fell back to defaults",
            archive.display(),
            stats.company_misses,
            stats.tag_misses
        );
    }

    fs::create_dir_all(out_dir)?;
    let out = output_path(archive, out_dir);
    info!("Saving {} sentences to {}", sentences.len(), out.display());
    fs::write(&out, sentences.join("\n"))?;
    Ok((out, stats))
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<(PathBuf, NormalizeStats)>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, RAGError)>,
}

/// Normalizes every `*.json` archive in `raw_dir`. One bad archive never
/// stops the run; its outcome lands in the report.
pub fn normalize_dir(raw_dir: &Path, out_dir: &Path) -> Result<BatchReport> {
    fs::create_dir_all(out_dir)?;
    let mut report = BatchReport::default();

    for archive in list_files(raw_dir, "json")? {
        match normalize_archive(&archive, out_dir) {
            Ok(done) => report.written.push(done),
            Err(RAGError::MissingInputData { path, missing }) => {
                warn!(
                    "Skipping {}: missing required {}",
                    path.display(),
                    missing.join(", ")
                );
                report.skipped.push(path);
            }
            Err(e) => {
                error!("Error processing {}: {}", archive.display(), e);
                report.failed.push((archive, e));
            }
        }
    }
    Ok(report)
}
