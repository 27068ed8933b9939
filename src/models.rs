use std::time::Instant;

use poll_promise::Promise;
use serde::Serialize;

use crate::autocomplete::Autocomplete;
use crate::config::Config;
use crate::domain::DomainId;
use crate::scatter::{ExpressionRange, ScatterSeries};
use crate::store::TableStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub dominant_domain: DomainId,
    pub percent: f64,
    pub total_cells: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterDistribution {
    pub cluster_id: String,
    pub domain: DomainId,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneSummary {
    pub gene: String,
    pub dominant_domain: DomainId,
    pub percent: f64,
    pub total_expressing: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneDistribution {
    pub gene: String,
    pub domain: DomainId,
    pub percent: f64,
}

/// One cell placed in UMAP space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinate {
    pub observation_id: String,
    pub x: f64,
    pub y: f64,
    pub cluster_id: String,
    pub domain: DomainId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneExpression {
    pub observation_id: String,
    pub expression: f64,
}

/// A row keyed by a cluster or gene name that assigns a share of cells to a domain.
///
/// Summary rows report their dominant domain, distribution rows the domain of
/// that slice. Gene keys compare case-insensitively, cluster keys exactly.
pub trait DomainShare {
    const KEY_KIND: &'static str;
    const CASE_INSENSITIVE_KEY: bool;

    fn key(&self) -> &str;
    fn domain(&self) -> DomainId;
    fn percent(&self) -> f64;

    fn key_matches(&self, key: &str) -> bool {
        if Self::CASE_INSENSITIVE_KEY {
            self.key()
                .chars()
                .flat_map(char::to_uppercase)
                .eq(key.chars().flat_map(char::to_uppercase))
        } else {
            self.key() == key
        }
    }
}

impl DomainShare for ClusterSummary {
    const KEY_KIND: &'static str = "cluster";
    const CASE_INSENSITIVE_KEY: bool = false;

    fn key(&self) -> &str {
        &self.cluster_id
    }
    fn domain(&self) -> DomainId {
        self.dominant_domain
    }
    fn percent(&self) -> f64 {
        self.percent
    }
}

impl DomainShare for ClusterDistribution {
    const KEY_KIND: &'static str = "cluster";
    const CASE_INSENSITIVE_KEY: bool = false;

    fn key(&self) -> &str {
        &self.cluster_id
    }
    fn domain(&self) -> DomainId {
        self.domain
    }
    fn percent(&self) -> f64 {
        self.percent
    }
}

impl DomainShare for GeneSummary {
    const KEY_KIND: &'static str = "gene";
    const CASE_INSENSITIVE_KEY: bool = true;

    fn key(&self) -> &str {
        &self.gene
    }
    fn domain(&self) -> DomainId {
        self.dominant_domain
    }
    fn percent(&self) -> f64 {
        self.percent
    }
}

impl DomainShare for GeneDistribution {
    const KEY_KIND: &'static str = "gene";
    const CASE_INSENSITIVE_KEY: bool = true;

    fn key(&self) -> &str {
        &self.gene
    }
    fn domain(&self) -> DomainId {
        self.domain
    }
    fn percent(&self) -> f64 {
        self.percent
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Tab {
    ClusterLookup,
    DomainClusters,
    GeneLookup,
    DomainGenes,
    ClusterTable,
    GeneTable,
    Umap,
    Downloads,
}

impl Tab {
    pub const ALL: [Tab; 8] = [
        Tab::ClusterLookup,
        Tab::DomainClusters,
        Tab::GeneLookup,
        Tab::DomainGenes,
        Tab::ClusterTable,
        Tab::GeneTable,
        Tab::Umap,
        Tab::Downloads,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tab::ClusterLookup => "Cluster Lookup",
            Tab::DomainClusters => "IPN → Clusters",
            Tab::GeneLookup => "Gene Lookup",
            Tab::DomainGenes => "IPN → Genes",
            Tab::ClusterTable => "Cluster Table",
            Tab::GeneTable => "Gene Table",
            Tab::Umap => "UMAP",
            Tab::Downloads => "Downloads",
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum UmapColorMode {
    Cluster,
    Domain,
    Gene,
}

/// Result of one per-gene expression read, tagged with the gene it was for.
pub struct ExpressionResponse {
    pub gene: String,
    pub result: Result<Vec<GeneExpression>, String>,
}

pub struct AppState {
    pub config: Config,
    pub store: TableStore,
    pub selected_tab: Tab,
    pub selected_cluster: Option<String>,
    pub cluster_domain: Option<DomainId>,
    pub gene_domain: Option<DomainId>,
    pub gene_query: String,
    pub gene_query_edited: Option<Instant>,
    pub gene_result_key: Option<String>,
    pub gene_autocomplete: Autocomplete,
    pub gene_filter: String,
    pub gene_page: usize,
    /// Indices into the gene summary table that pass `gene_filter`.
    pub filtered_genes: Vec<usize>,
    pub umap_mode: UmapColorMode,
    pub umap_gene: String,
    pub umap_autocomplete: Autocomplete,
    pub umap_series: Vec<ScatterSeries>,
    /// Scale of the expression colour bar; only set in gene mode.
    pub umap_range: Option<ExpressionRange>,
    pub umap_dirty: bool,
    pub umap_message: Option<String>,
    pub expression: Option<(String, Vec<GeneExpression>)>,
    pub expression_requests: Vec<Promise<ExpressionResponse>>,
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: Config, store: TableStore) -> Self {
        let limit = config.autocomplete_limit;
        Self {
            config,
            store,
            selected_tab: Tab::ClusterLookup,
            selected_cluster: None,
            cluster_domain: None,
            gene_domain: None,
            gene_query: String::new(),
            gene_query_edited: None,
            gene_result_key: None,
            gene_autocomplete: Autocomplete::new(limit),
            gene_filter: String::new(),
            gene_page: 1,
            filtered_genes: Vec::new(),
            umap_mode: UmapColorMode::Cluster,
            umap_gene: String::new(),
            umap_autocomplete: Autocomplete::new(limit),
            umap_series: Vec::new(),
            umap_range: None,
            umap_dirty: true,
            umap_message: None,
            expression: None,
            expression_requests: Vec::new(),
            status_message: None,
        }
    }
}
