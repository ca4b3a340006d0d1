use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::{Edge, Instance};

pub const TSP_DATA_FILE: &str = "tsp-data.json";
pub const FUEL_DATA_FILE: &str = "fuel-data.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed JSON in {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON files holding the saved road graph and fuel edges.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn instance_path(&self) -> PathBuf {
        self.dir.join(TSP_DATA_FILE)
    }

    pub fn fuel_path(&self) -> PathBuf {
        self.dir.join(FUEL_DATA_FILE)
    }

    /// The saved road graph, or an empty one if there is none to read.
    pub fn load_instance(&self) -> Instance<u64> {
        let path = self.instance_path();
        match read_json(&path) {
            Ok(instance) => instance,
            Err(err) => {
                warn!("Starting from an empty road graph: {}", err);
                Instance::default()
            }
        }
    }

    pub fn save_instance(&self, instance: &Instance<u64>) -> Result<(), StoreError> {
        write_json(&self.instance_path(), instance)
    }

    /// The saved fuel edges. The file is created on first use and unreadable contents
    /// count as no edges at all.
    pub fn load_fuel_edges(&self) -> Vec<Edge<u64>> {
        let path = self.fuel_path();
        if !path.exists() {
            debug!("Creating {}", path.display());
            if let Err(err) = write_json::<[Edge<u64>]>(&path, &[]) {
                warn!("{}", err);
                return vec![];
            }
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) => {
                warn!("{}", StoreError::Io { path, source });
                return vec![];
            }
        };
        if raw.trim().is_empty() {
            return vec![];
        }
        match serde_json::from_str(&raw) {
            Ok(edges) => edges,
            Err(source) => {
                warn!("{}", StoreError::Json { path, source });
                vec![]
            }
        }
    }

    pub fn save_fuel_edges(&self, edges: &[Edge<u64>]) -> Result<(), StoreError> {
        write_json(&self.fuel_path(), edges)?;
        debug!("Saved {} fuel edges", edges.len());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_owned(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_owned(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Json {
        path: path.to_owned(),
        source,
    })?;
    writer.flush().map_err(io_err)
}
