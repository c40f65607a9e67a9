use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const CSV_HEADERS: [&str; 5] = ["location", "caption", "image", "latitude", "longitude"];

/// One memory entry. Identity is its position in the loaded collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub location: String,
    pub caption: String,
    pub image: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Memory {
    /// Text that gets embedded for this memory: location and caption
    /// joined with a space, trimmed. Empty fields collapse away.
    pub fn corpus_text(&self) -> String {
        format!("{} {}", self.location, self.caption)
            .trim()
            .to_string()
    }
}

/// The fixed memory collection, loaded once from CSV and never mutated.
///
/// A missing or malformed file leaves the store in a "not loaded" state
/// instead of failing. Callers check `is_loaded()` and decide whether
/// that is fatal.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<Memory>,
    path: String,
}

impl MemoryStore {
    pub fn load(path: &str) -> Self {
        let records = match Self::read_csv(path) {
            Ok(records) => {
                if records.is_empty() {
                    log::warn!("no memories found in {path}");
                }
                records
            }
            Err(err) => {
                log::error!("failed to load memories from {path}: {err}");
                vec![]
            }
        };

        MemoryStore {
            records,
            path: path.to_string(),
        }
    }

    fn read_csv(path: &str) -> anyhow::Result<Vec<Memory>> {
        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut records = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let location = record
                .get(0)
                .ok_or(anyhow!("couldnt get record location"))?
                .to_string();
            let caption = record
                .get(1)
                .ok_or(anyhow!("couldnt get record caption"))?
                .to_string();
            let image = record
                .get(2)
                .ok_or(anyhow!("couldnt get record image"))?
                .to_string();
            let latitude = record
                .get(3)
                .ok_or(anyhow!("couldnt get record latitude"))?
                .parse::<f64>()?;
            let longitude = record
                .get(4)
                .ok_or(anyhow!("couldnt get record longitude"))?
                .parse::<f64>()?;

            records.push(Memory {
                location,
                caption,
                image,
                latitude,
                longitude,
            });
        }

        log::debug!(
            "took {}ms to read csv",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(records)
    }

    pub fn is_loaded(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Immutable view over the whole collection, in load order.
    pub fn all(&self) -> &[Memory] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Bounds-checked access. Out of range is `None`, never a panic.
    pub fn get(&self, index: usize) -> Option<&Memory> {
        self.records.get(index)
    }

    /// Corpus text for every record, in record order.
    pub fn corpus_texts(&self) -> Vec<String> {
        self.records.iter().map(|m| m.corpus_text()).collect()
    }

    /// Memories whose location contains `name`, case-insensitive.
    pub fn find_by_location(&self, name: &str) -> Vec<Memory> {
        let needle = name.to_lowercase();
        self.records
            .iter()
            .filter(|m| m.location.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}
