use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use polars::prelude::*;

use crate::domain::coerce_domain;
use crate::error::{DashboardError, Result};
use crate::models::{
    ClusterDistribution, ClusterSummary, Coordinate, GeneDistribution, GeneExpression, GeneSummary,
};

pub const GENE_DATA_DIR: &str = "gene_data";

/// The static files the dashboard reads at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableSource {
    ClusterSummary,
    ClusterDistribution,
    GeneSummary,
    GeneDistribution,
    Coordinates,
    GeneNames,
}

impl TableSource {
    pub const ALL: [TableSource; 6] = [
        TableSource::ClusterSummary,
        TableSource::ClusterDistribution,
        TableSource::GeneSummary,
        TableSource::GeneDistribution,
        TableSource::Coordinates,
        TableSource::GeneNames,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            TableSource::ClusterSummary => "cluster_dominant_IPN.csv",
            TableSource::ClusterDistribution => "cluster_to_IPN_summary.csv",
            TableSource::GeneSummary => "gene_dominant_IPN.csv",
            TableSource::GeneDistribution => "gene_to_IPN_summary.csv",
            TableSource::Coordinates => "umap_coordinates.csv",
            TableSource::GeneNames => "gene_list.csv",
        }
    }

    pub fn path_in(self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.file_name())
    }
}

pub fn load_csv_dataset<P: AsRef<Path>>(file_path: P, infer_schema_length: usize) -> Result<DataFrame> {
    let path = file_path.as_ref();
    let file = File::open(path).map_err(|e| DashboardError::unavailable(path, e))?;
    let df = CsvReader::new(file)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(infer_schema_length))
                .with_ignore_errors(true),
        )
        .finish()?;
    debug!("read {} rows from {}", df.height(), path.display());
    Ok(df)
}

/// Typed extraction of one table's rows from a parsed frame.
pub trait CsvRecord: Sized + Send + 'static {
    const TABLE: &'static str;

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>>;
}

fn find_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Option<&'a Column> {
    aliases.iter().find_map(|name| df.column(name).ok())
}

/// Key columns are required: without them the table is unusable.
fn text_column(df: &DataFrame, table: &str, aliases: &[&str]) -> Result<Vec<String>> {
    let column = find_column(df, aliases).ok_or_else(|| DashboardError::MissingColumn {
        table: table.to_string(),
        column: aliases[0].to_string(),
    })?;
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|value| value.map(|s| s.trim().to_string()).unwrap_or_default())
        .collect())
}

/// Numeric columns never fail: missing columns and unparseable cells become zero.
fn number_column(df: &DataFrame, table: &str, aliases: &[&str]) -> Result<Vec<f64>> {
    let Some(column) = find_column(df, aliases) else {
        warn!("{} has no `{}` column, using 0 for every row", table, aliases[0]);
        return Ok(vec![0.0; df.height()]);
    };
    let cast = column.cast(&DataType::Float64)?;
    let mut coerced = 0usize;
    let values: Vec<f64> = cast
        .f64()?
        .into_iter()
        .map(|value| match value {
            Some(v) if v.is_finite() => v,
            _ => {
                coerced += 1;
                0.0
            }
        })
        .collect();
    if coerced > 0 {
        debug!("{}: coerced {} malformed `{}` values to 0", table, coerced, aliases[0]);
    }
    Ok(values)
}

fn count(value: f64) -> u64 {
    if value > 0.0 { value.round() as u64 } else { 0 }
}

impl CsvRecord for ClusterSummary {
    const TABLE: &'static str = "cluster summary";

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let ids = text_column(df, Self::TABLE, &["cluster_id", "cluster"])?;
        let domains = number_column(df, Self::TABLE, &["dominant_domain", "dominant_IPN"])?;
        let percents = number_column(df, Self::TABLE, &["percent"])?;
        let cells = number_column(df, Self::TABLE, &["total_cells"])?;
        Ok(ids
            .into_iter()
            .zip(domains)
            .zip(percents)
            .zip(cells)
            .map(|(((cluster_id, domain), percent), cells)| ClusterSummary {
                cluster_id,
                dominant_domain: coerce_domain(domain),
                percent,
                total_cells: count(cells),
            })
            .collect())
    }
}

impl CsvRecord for ClusterDistribution {
    const TABLE: &'static str = "cluster distribution";

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let ids = text_column(df, Self::TABLE, &["cluster_id", "cluster"])?;
        let domains = number_column(df, Self::TABLE, &["domain", "IPN_domain"])?;
        let percents = number_column(df, Self::TABLE, &["percent"])?;
        Ok(ids
            .into_iter()
            .zip(domains)
            .zip(percents)
            .map(|((cluster_id, domain), percent)| ClusterDistribution {
                cluster_id,
                domain: coerce_domain(domain),
                percent,
            })
            .collect())
    }
}

impl CsvRecord for GeneSummary {
    const TABLE: &'static str = "gene summary";

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let genes = text_column(df, Self::TABLE, &["gene"])?;
        let domains = number_column(df, Self::TABLE, &["dominant_domain", "dominant_IPN"])?;
        let percents = number_column(df, Self::TABLE, &["percent"])?;
        let expressing = number_column(df, Self::TABLE, &["total_expressing"])?;
        Ok(genes
            .into_iter()
            .zip(domains)
            .zip(percents)
            .zip(expressing)
            .map(|(((gene, domain), percent), expressing)| GeneSummary {
                gene,
                dominant_domain: coerce_domain(domain),
                percent,
                total_expressing: count(expressing),
            })
            .collect())
    }
}

impl CsvRecord for GeneDistribution {
    const TABLE: &'static str = "gene distribution";

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let genes = text_column(df, Self::TABLE, &["gene"])?;
        let domains = number_column(df, Self::TABLE, &["domain", "IPN_domain"])?;
        let percents = number_column(df, Self::TABLE, &["percent"])?;
        Ok(genes
            .into_iter()
            .zip(domains)
            .zip(percents)
            .map(|((gene, domain), percent)| GeneDistribution {
                gene,
                domain: coerce_domain(domain),
                percent,
            })
            .collect())
    }
}

impl CsvRecord for Coordinate {
    const TABLE: &'static str = "UMAP coordinates";

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let ids = text_column(df, Self::TABLE, &["observation_id", "cell_barcode"])?;
        let xs = number_column(df, Self::TABLE, &["x", "UMAP_1"])?;
        let ys = number_column(df, Self::TABLE, &["y", "UMAP_2"])?;
        let clusters = text_column(df, Self::TABLE, &["cluster_id", "cluster"])?;
        let domains = number_column(df, Self::TABLE, &["domain", "IPN_domain"])?;
        Ok(ids
            .into_iter()
            .zip(xs)
            .zip(ys)
            .zip(clusters)
            .zip(domains)
            .map(|((((observation_id, x), y), cluster_id), domain)| Coordinate {
                observation_id,
                x,
                y,
                cluster_id,
                domain: coerce_domain(domain),
            })
            .collect())
    }
}

impl CsvRecord for GeneExpression {
    const TABLE: &'static str = "gene expression";

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let ids = text_column(df, Self::TABLE, &["observation_id", "cell_barcode"])?;
        let values = number_column(df, Self::TABLE, &["expression"])?;
        Ok(ids
            .into_iter()
            .zip(values)
            .map(|(observation_id, expression)| GeneExpression {
                observation_id,
                expression,
            })
            .collect())
    }
}

/// The autocomplete candidates: the `gene` column with blanks dropped.
pub fn gene_names_from_frame(df: &DataFrame) -> Result<Vec<String>> {
    let genes = text_column(df, "gene list", &["gene"])?;
    Ok(genes.into_iter().filter(|gene| !gene.is_empty()).collect())
}

pub fn load_rows<T: CsvRecord>(path: &Path, infer_schema_length: usize) -> Result<Vec<T>> {
    let df = load_csv_dataset(path, infer_schema_length)?;
    let rows = T::from_frame(&df)?;
    info!("loaded {} {} rows from {}", rows.len(), T::TABLE, path.display());
    Ok(rows)
}

pub fn load_gene_names(path: &Path, infer_schema_length: usize) -> Result<Vec<String>> {
    let df = load_csv_dataset(path, infer_schema_length)?;
    let names = gene_names_from_frame(&df)?;
    info!("loaded {} gene names from {}", names.len(), path.display());
    Ok(names)
}

/// File-system safe form of a gene name: anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_gene_name(gene: &str) -> String {
    gene.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn gene_expression_path(data_dir: &Path, gene: &str) -> PathBuf {
    data_dir
        .join(GENE_DATA_DIR)
        .join(format!("{}.csv", sanitize_gene_name(gene.trim())))
}

pub fn load_gene_expression(data_dir: &Path, gene: &str, infer_schema_length: usize) -> Result<Vec<GeneExpression>> {
    let path = gene_expression_path(data_dir, gene);
    load_rows(&path, infer_schema_length).inspect_err(|e| {
        warn!("gene expression for {} unavailable: {}", gene, e);
    })
}

/// Writes gene summary rows back out in the source column layout.
pub fn write_gene_summary_csv(rows: &[&GeneSummary], path: &Path) -> Result<()> {
    let mut df = polars::df!(
        "gene" => rows.iter().map(|r| r.gene.as_str()).collect::<Vec<_>>(),
        "dominant_IPN" => rows.iter().map(|r| r.dominant_domain as u32).collect::<Vec<_>>(),
        "percent" => rows.iter().map(|r| r.percent).collect::<Vec<_>>(),
        "total_expressing" => rows.iter().map(|r| r.total_expressing).collect::<Vec<_>>(),
    )?;
    let mut file = File::create(path).map_err(|e| DashboardError::unavailable(path, e))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    info!("exported {} gene rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn sanitizes_gene_names() {
        assert_eq!(sanitize_gene_name("abc/def:1"), "abc_def_1");
        assert_eq!(sanitize_gene_name("si:ch211-1.2_x"), "si_ch211-1.2_x");
        assert_eq!(sanitize_gene_name("gène"), "g_ne");
    }

    #[test]
    fn expression_path_lives_under_gene_data() {
        let path = gene_expression_path(Path::new("data"), " zgc:1 ");
        assert_eq!(path, Path::new("data").join("gene_data").join("zgc_1.csv"));
    }

    #[test]
    fn reads_cluster_summary_with_source_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "c.csv",
            "cluster,dominant_IPN,percent,total_cells\nCluster 1,2,75.5,120\nCluster 2,9,oops,\n",
        );
        let rows: Vec<ClusterSummary> = load_rows(&path, 100).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cluster_id, "Cluster 1");
        assert_eq!(rows[0].dominant_domain, 2);
        assert_eq!(rows[0].percent, 75.5);
        assert_eq!(rows[0].total_cells, 120);
        // out-of-range domain and junk numbers degrade to zero
        assert_eq!(rows[1].dominant_domain, 0);
        assert_eq!(rows[1].percent, 0.0);
        assert_eq!(rows[1].total_cells, 0);
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "g.csv", "name,percent\nShha,3\n");
        let err = load_rows::<GeneSummary>(&path, 100).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { .. }));
    }

    #[test]
    fn missing_numeric_column_fills_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "d.csv", "gene,domain\nShha,4\n");
        let rows: Vec<GeneDistribution> = load_rows(&path, 100).unwrap();
        assert_eq!(rows[0].domain, 4);
        assert_eq!(rows[0].percent, 0.0);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rows::<Coordinate>(&dir.path().join("nope.csv"), 100).unwrap_err();
        assert!(matches!(err, DashboardError::ResourceUnavailable { .. }));
    }

    #[test]
    fn gene_list_drops_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "gene_list.csv", "gene,source\nPitx2,a\n,b\nOtx2,c\n");
        let names = load_gene_names(&path, 100).unwrap();
        assert_eq!(names, vec!["Pitx2".to_string(), "Otx2".to_string()]);
    }

    #[test]
    fn expression_rows_accept_cell_barcode() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(GENE_DATA_DIR)).unwrap();
        write(
            &dir.path().join(GENE_DATA_DIR),
            "Shha.csv",
            "cell_barcode,expression\nAAAC,1.5\nAAAG,0\n",
        );
        let rows = load_gene_expression(dir.path(), "Shha", 100).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].observation_id, "AAAC");
        assert_eq!(rows[0].expression, 1.5);
    }

    #[test]
    fn exported_gene_rows_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![GeneSummary {
            gene: "Pitx2".into(),
            dominant_domain: 5,
            percent: 33.3,
            total_expressing: 42,
        }];
        let refs: Vec<&GeneSummary> = rows.iter().collect();
        let path = dir.path().join("export.csv");
        write_gene_summary_csv(&refs, &path).unwrap();
        let loaded: Vec<GeneSummary> = load_rows(&path, 100).unwrap();
        assert_eq!(loaded, rows);
    }
}
