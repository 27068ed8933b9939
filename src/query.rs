//! Pure lookups over the loaded tables. Nothing here allocates row copies;
//! results borrow from the store.

use std::cmp::Ordering;

use crate::domain::{DomainId, DomainInfo, domain_info};
use crate::error::{DashboardError, Result};
use crate::models::{ClusterDistribution, ClusterSummary, DomainShare, GeneDistribution, GeneSummary};
use crate::store::TableStore;

/// Distribution slices at or below this percentage are not drawn.
pub const DISPLAY_THRESHOLD_PERCENT: f64 = 2.0;

pub fn find_by_key<'a, T: DomainShare>(rows: &'a [T], key: &str) -> Option<&'a T> {
    rows.iter().find(|row| row.key_matches(key))
}

#[derive(Debug)]
pub struct DomainMatches<'a, T> {
    pub rows: Vec<&'a T>,
    /// Number of matching rows before any limit was applied.
    pub total: usize,
}

/// Rows whose domain equals `domain`, highest percent first. Ties keep file order.
pub fn filter_by_domain<T: DomainShare>(rows: &[T], domain: DomainId) -> Vec<&T> {
    let mut matches: Vec<&T> = rows.iter().filter(|row| row.domain() == domain).collect();
    matches.sort_by(|a, b| b.percent().partial_cmp(&a.percent()).unwrap_or(Ordering::Equal));
    matches
}

pub fn top_by_domain<T: DomainShare>(rows: &[T], domain: DomainId, limit: usize) -> DomainMatches<'_, T> {
    let mut matches = filter_by_domain(rows, domain);
    let total = matches.len();
    matches.truncate(limit);
    DomainMatches { rows: matches, total }
}

#[derive(Debug)]
pub struct Distribution<'a, T> {
    pub rows: Vec<&'a T>,
}

impl<'a, T: DomainShare> Distribution<'a, T> {
    /// Slices large enough to draw, in domain order.
    pub fn displayable(&self) -> Vec<&'a T> {
        self.rows
            .iter()
            .copied()
            .filter(|row| row.percent() > DISPLAY_THRESHOLD_PERCENT && domain_info(row.domain()).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Every distribution row for `key`, sorted by domain ascending.
pub fn distribution_for<'a, T: DomainShare>(rows: &'a [T], key: &str) -> Distribution<'a, T> {
    let mut matches: Vec<&T> = rows.iter().filter(|row| row.key_matches(key)).collect();
    matches.sort_by_key(|row| row.domain());
    Distribution { rows: matches }
}

/// Case-insensitive substring filter on the text returned by `field`.
pub fn substring_filter<'a, T>(rows: &'a [T], needle: &str, field: impl Fn(&T) -> &str) -> Vec<&'a T> {
    if needle.is_empty() {
        return rows.iter().collect();
    }
    let needle = needle.to_lowercase();
    rows.iter()
        .filter(|row| field(row).to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    pub rows: &'a [T],
    /// 1-indexed, always within `1..=page_count`.
    pub page_number: usize,
    /// At least 1, so an empty table still shows "Page 1 of 1".
    pub page_count: usize,
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

pub fn paginate<T>(rows: &[T], page_size: usize, page_number: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let page_count = page_count(rows.len(), page_size);
    let page_number = page_number.clamp(1, page_count);
    let start = ((page_number - 1) * page_size).min(rows.len());
    let end = (start + page_size).min(rows.len());
    Page {
        rows: &rows[start..end],
        page_number,
        page_count,
    }
}

/// The first run of ASCII digits in an identifier, or 0 when there is none.
pub fn cluster_number(id: &str) -> u64 {
    id.chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .fold(0u64, |acc, c| {
            acc.saturating_mul(10).saturating_add(c.to_digit(10).unwrap_or(0) as u64)
        })
}

/// Stable sort by the number embedded in each identifier.
pub fn sort_by_cluster_number<T>(rows: &mut [T], id: impl Fn(&T) -> &str) {
    rows.sort_by_key(|row| cluster_number(id(row)));
}

pub fn clusters_in_numeric_order(rows: &[ClusterSummary]) -> Vec<&ClusterSummary> {
    let mut sorted: Vec<&ClusterSummary> = rows.iter().collect();
    sort_by_cluster_number(&mut sorted, |row| row.cluster_id.as_str());
    sorted
}

/// A summary row together with what the lookup views show next to it.
#[derive(Debug)]
pub struct Report<'a, S, D> {
    pub summary: &'a S,
    pub domain: Option<&'static DomainInfo>,
    pub distribution: Distribution<'a, D>,
}

fn report<'a, S: DomainShare, D: DomainShare>(
    summaries: &'a [S],
    distributions: &'a [D],
    key: &str,
) -> Result<Report<'a, S, D>> {
    let summary = find_by_key(summaries, key).ok_or_else(|| DashboardError::KeyNotFound {
        kind: S::KEY_KIND,
        key: key.to_string(),
    })?;
    Ok(Report {
        summary,
        domain: domain_info(summary.domain()),
        distribution: distribution_for(distributions, summary.key()),
    })
}

pub fn cluster_report<'a>(store: &'a TableStore, cluster_id: &str) -> Result<Report<'a, ClusterSummary, ClusterDistribution>> {
    report(
        store.cluster_summary.rows(),
        store.cluster_distribution.rows(),
        cluster_id,
    )
}

pub fn gene_report<'a>(store: &'a TableStore, gene: &str) -> Result<Report<'a, GeneSummary, GeneDistribution>> {
    report(store.gene_summary.rows(), store.gene_distribution.rows(), gene.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(id: &str, domain: DomainId, percent: f64) -> ClusterSummary {
        ClusterSummary {
            cluster_id: id.to_string(),
            dominant_domain: domain,
            percent,
            total_cells: 10,
        }
    }

    fn gene(name: &str, domain: DomainId, percent: f64) -> GeneSummary {
        GeneSummary {
            gene: name.to_string(),
            dominant_domain: domain,
            percent,
            total_expressing: 5,
        }
    }

    fn slice(name: &str, domain: DomainId, percent: f64) -> GeneDistribution {
        GeneDistribution {
            gene: name.to_string(),
            domain,
            percent,
        }
    }

    #[test]
    fn numeric_suffix_sort_orders_one_through_fourteen() {
        let mut ids: Vec<String> = (1..=14).map(|n| format!("C{}", n)).collect();
        ids.sort();
        assert_eq!(ids[1], "C10");

        sort_by_cluster_number(&mut ids, |s| s.as_str());
        let numbers: Vec<u64> = ids.iter().map(|s| cluster_number(s)).collect();
        assert_eq!(numbers, (1..=14).collect::<Vec<u64>>());
    }

    #[test]
    fn cluster_number_takes_first_digit_run() {
        assert_eq!(cluster_number("Cluster 12"), 12);
        assert_eq!(cluster_number("c3_sub7"), 3);
        assert_eq!(cluster_number("unassigned"), 0);
        assert_eq!(cluster_number(""), 0);
    }

    #[test]
    fn identifiers_without_numbers_sort_first_and_keep_order() {
        let mut ids = vec!["Cluster 2", "noise", "Cluster 1", "doublet"];
        sort_by_cluster_number(&mut ids, |s| *s);
        assert_eq!(ids, vec!["noise", "doublet", "Cluster 1", "Cluster 2"]);
    }

    #[test]
    fn paginate_237_rows_into_five_pages() {
        let rows: Vec<usize> = (0..237).collect();
        let first = paginate(&rows, 50, 1);
        assert_eq!(first.page_count, 5);
        assert_eq!(first.rows.len(), 50);

        let last = paginate(&rows, 50, 5);
        assert_eq!(last.rows.len(), 37);
        assert_eq!(last.rows[0], 200);

        let low = paginate(&rows, 50, 0);
        assert_eq!(low.page_number, 1);
        assert_eq!(low.rows, first.rows);

        let high = paginate(&rows, 50, 99);
        assert_eq!(high.page_number, 5);
        assert_eq!(high.rows, last.rows);
    }

    #[test]
    fn paginate_empty_input_has_one_empty_page() {
        let rows: Vec<u8> = Vec::new();
        let page = paginate(&rows, 50, 3);
        assert_eq!(page.page_count, 1);
        assert_eq!(page.page_number, 1);
        assert!(page.rows.is_empty());
        assert_eq!(page_count(0, 0), 1);
    }

    #[test]
    fn filter_by_domain_sorts_descending_and_is_stable() {
        let rows = vec![
            cluster("Cluster 1", 2, 40.0),
            cluster("Cluster 2", 3, 90.0),
            cluster("Cluster 3", 2, 70.0),
            cluster("Cluster 4", 2, 40.0),
        ];
        let ids: Vec<&str> = filter_by_domain(&rows, 2)
            .iter()
            .map(|row| row.cluster_id.as_str())
            .collect();
        assert_eq!(ids, vec!["Cluster 3", "Cluster 1", "Cluster 4"]);
        assert!(filter_by_domain(&rows, 6).is_empty());
    }

    #[test]
    fn top_by_domain_reports_total() {
        let rows: Vec<GeneSummary> = (0..60).map(|i| gene(&format!("g{}", i), 4, i as f64)).collect();
        let top = top_by_domain(&rows, 4, 50);
        assert_eq!(top.rows.len(), 50);
        assert_eq!(top.total, 60);
        assert_eq!(top.rows[0].gene, "g59");
    }

    #[test]
    fn distribution_threshold_only_affects_display() {
        let dist = vec![
            slice("Shha", 3, 1.5),
            slice("Shha", 1, 60.0),
            slice("Shha", 2, 2.0),
            slice("Shha", 5, 36.5),
            slice("Pitx2", 1, 100.0),
        ];
        let shha = distribution_for(&dist, "shha");
        let domains: Vec<DomainId> = shha.rows.iter().map(|r| r.domain).collect();
        assert_eq!(domains, vec![1, 2, 3, 5]);

        let shown: Vec<DomainId> = shha.displayable().iter().map(|r| r.domain).collect();
        assert_eq!(shown, vec![1, 5]);

        // the same small slices still take part in other queries
        assert_eq!(filter_by_domain(&dist, 3).len(), 1);
        assert!(find_by_key(&dist, "Shha").is_some());
    }

    #[test]
    fn displayable_skips_unknown_domains() {
        let dist = vec![slice("Shha", 0, 50.0), slice("Shha", 4, 50.0)];
        let shown = distribution_for(&dist, "Shha").displayable();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].domain, 4);
    }

    #[test]
    fn substring_filter_ignores_case() {
        let rows = vec![gene("Shha", 1, 1.0), gene("SHH2", 1, 1.0), gene("Pitx2", 1, 1.0)];
        assert_eq!(substring_filter(&rows, "", |r| r.gene.as_str()).len(), 3);

        let names: Vec<&str> = substring_filter(&rows, "shh", |r| r.gene.as_str())
            .iter()
            .map(|r| r.gene.as_str())
            .collect();
        assert_eq!(names, vec!["Shha", "SHH2"]);
    }

    #[test]
    fn gene_lookup_ignores_case_cluster_lookup_does_not() {
        let genes = vec![gene("Shha", 1, 10.0)];
        assert_eq!(find_by_key(&genes, "shha").unwrap().gene, "Shha");

        let clusters = vec![cluster("Cluster 1", 1, 10.0)];
        assert!(find_by_key(&clusters, "Cluster 1").is_some());
        assert!(find_by_key(&clusters, "cluster 1").is_none());
    }

    #[test]
    fn empty_tables_answer_not_found() {
        let store = TableStore::default();
        assert!(filter_by_domain(store.cluster_summary.rows(), 1).is_empty());
        assert!(find_by_key(store.cluster_summary.rows(), "Cluster 1").is_none());

        let err = cluster_report(&store, "Cluster 1").unwrap_err();
        assert!(err.is_not_found());
        assert!(gene_report(&store, "Shha").unwrap_err().is_not_found());
    }
}
