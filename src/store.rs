//! The loaded tables. Each one is filled exactly once by its own background
//! load and is read-only afterwards; readers must cope with tables that are
//! still loading or that never arrived.

use std::path::{Path, PathBuf};

use log::{info, warn};
use poll_promise::Promise;

use crate::data::{TableSource, load_gene_names, load_rows};
use crate::error::Result;
use crate::models::{
    ClusterDistribution, ClusterSummary, Coordinate, GeneDistribution, GeneSummary,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Loading,
    Loaded,
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: Vec<T>,
    status: LoadStatus,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            status: LoadStatus::Loading,
        }
    }
}

impl<T> Table<T> {
    pub fn loaded(rows: Vec<T>) -> Self {
        Self {
            rows,
            status: LoadStatus::Loaded,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            status: LoadStatus::Unavailable(reason.into()),
        }
    }

    /// Soft-failing conversion: an error becomes an empty, unavailable table.
    pub fn from_result(source: TableSource, result: Result<Vec<T>>) -> Self {
        match result {
            Ok(rows) => Self::loaded(rows),
            Err(e) => {
                warn!("{} not available: {}", source.file_name(), e);
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn is_available(&self) -> bool {
        self.status == LoadStatus::Loaded
    }
}

/// One finished load, tagged with the table it belongs to.
pub enum LoadedTable {
    ClusterSummary(Table<ClusterSummary>),
    ClusterDistribution(Table<ClusterDistribution>),
    GeneSummary(Table<GeneSummary>),
    GeneDistribution(Table<GeneDistribution>),
    Coordinates(Table<Coordinate>),
    GeneNames(Table<String>),
}

impl LoadedTable {
    pub fn source(&self) -> TableSource {
        match self {
            LoadedTable::ClusterSummary(_) => TableSource::ClusterSummary,
            LoadedTable::ClusterDistribution(_) => TableSource::ClusterDistribution,
            LoadedTable::GeneSummary(_) => TableSource::GeneSummary,
            LoadedTable::GeneDistribution(_) => TableSource::GeneDistribution,
            LoadedTable::Coordinates(_) => TableSource::Coordinates,
            LoadedTable::GeneNames(_) => TableSource::GeneNames,
        }
    }
}

/// Reads one source file. Never fails; see [`Table::from_result`].
pub fn load_table(source: TableSource, data_dir: &Path, infer_schema_length: usize) -> LoadedTable {
    let path = source.path_in(data_dir);
    match source {
        TableSource::ClusterSummary => {
            LoadedTable::ClusterSummary(Table::from_result(source, load_rows(&path, infer_schema_length)))
        }
        TableSource::ClusterDistribution => {
            LoadedTable::ClusterDistribution(Table::from_result(source, load_rows(&path, infer_schema_length)))
        }
        TableSource::GeneSummary => {
            LoadedTable::GeneSummary(Table::from_result(source, load_rows(&path, infer_schema_length)))
        }
        TableSource::GeneDistribution => {
            LoadedTable::GeneDistribution(Table::from_result(source, load_rows(&path, infer_schema_length)))
        }
        TableSource::Coordinates => {
            LoadedTable::Coordinates(Table::from_result(source, load_rows(&path, infer_schema_length)))
        }
        TableSource::GeneNames => {
            LoadedTable::GeneNames(Table::from_result(source, load_gene_names(&path, infer_schema_length)))
        }
    }
}

#[derive(Default)]
pub struct TableStore {
    pub cluster_summary: Table<ClusterSummary>,
    pub cluster_distribution: Table<ClusterDistribution>,
    pub gene_summary: Table<GeneSummary>,
    pub gene_distribution: Table<GeneDistribution>,
    pub coordinates: Table<Coordinate>,
    pub gene_names: Table<String>,
    pending: Vec<Promise<LoadedTable>>,
}

impl TableStore {
    /// Starts every load on its own thread and returns immediately.
    pub fn spawn(data_dir: impl Into<PathBuf>, infer_schema_length: usize) -> Self {
        let data_dir = data_dir.into();
        info!("loading tables from {}", data_dir.display());
        let pending = TableSource::ALL
            .into_iter()
            .map(|source| {
                let dir = data_dir.clone();
                Promise::spawn_thread(source.file_name(), move || {
                    load_table(source, &dir, infer_schema_length)
                })
            })
            .collect();
        Self {
            pending,
            ..Self::default()
        }
    }

    /// Loads every table on the calling thread.
    pub fn load_all(data_dir: &Path, infer_schema_length: usize) -> Self {
        let mut store = Self::default();
        for source in TableSource::ALL {
            store.apply(load_table(source, data_dir, infer_schema_length));
        }
        store
    }

    pub fn apply(&mut self, loaded: LoadedTable) {
        match loaded {
            LoadedTable::ClusterSummary(table) => self.cluster_summary = table,
            LoadedTable::ClusterDistribution(table) => self.cluster_distribution = table,
            LoadedTable::GeneSummary(table) => self.gene_summary = table,
            LoadedTable::GeneDistribution(table) => self.gene_distribution = table,
            LoadedTable::Coordinates(table) => self.coordinates = table,
            LoadedTable::GeneNames(table) => self.gene_names = table,
        }
    }

    /// Moves any finished loads into the store. Returns the tables that arrived.
    pub fn poll(&mut self) -> Vec<TableSource> {
        let mut arrived = Vec::new();
        for promise in std::mem::take(&mut self.pending) {
            match promise.try_take() {
                Ok(loaded) => {
                    arrived.push(loaded.source());
                    self.apply(loaded);
                }
                Err(promise) => self.pending.push(promise),
            }
        }
        arrived
    }

    /// Blocks until every outstanding load has finished.
    pub fn wait_all(&mut self) {
        for promise in std::mem::take(&mut self.pending) {
            let loaded = promise.block_and_take();
            self.apply(loaded);
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn status(&self, source: TableSource) -> &LoadStatus {
        match source {
            TableSource::ClusterSummary => self.cluster_summary.status(),
            TableSource::ClusterDistribution => self.cluster_distribution.status(),
            TableSource::GeneSummary => self.gene_summary.status(),
            TableSource::GeneDistribution => self.gene_distribution.status(),
            TableSource::Coordinates => self.coordinates.status(),
            TableSource::GeneNames => self.gene_names.status(),
        }
    }
}
