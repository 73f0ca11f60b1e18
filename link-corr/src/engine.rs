use crate::config::{LinkAnalysisConfig, Metric};
use crate::expression::ExpressionData;
use crate::histogram::CorrelationHistogram;
use crate::metric::{PearsonMetric, RowPairMetric, SpearmanMetric};
use crate::pvalue::correlation_pvalue;

use dashmap::DashMap;
use indicatif::ParallelProgressIterator;
use log::info;
use matrix_util::utils::generate_triangle_intervals;
use rayon::prelude::*;

///
/// A selected pair of rows, `first < second`. Two links are the same
/// when they join the same rows with the same sign.
///
#[derive(Clone, Copy, Debug)]
pub struct Link {
    pub first: usize,
    pub second: usize,
    pub score: f64,
    /// p-value after the redundant-probe penalty
    pub pvalue: f64,
}

impl Link {
    pub fn is_positive(&self) -> bool {
        self.score >= 0.0
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first
            && self.second == other.second
            && self.is_positive() == other.is_positive()
    }
}

impl Eq for Link {}

impl std::hash::Hash for Link {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.first.hash(state);
        self.second.hash(state);
        self.is_positive().hash(state);
    }
}

/// Counts of what happened to row pairs in a pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorrelationSummary {
    /// pairs of rows that both have a gene
    pub pairs_visited: u64,
    /// rows without any gene
    pub no_gene: u64,
    pub cross_hybridized: u64,
    pub insufficient_samples: u64,
    pub cached: u64,
}

impl CorrelationSummary {
    pub fn add(&mut self, other: &Self) {
        self.pairs_visited += other.pairs_visited;
        self.no_gene += other.no_gene;
        self.cross_hybridized += other.cross_hybridized;
        self.insufficient_samples += other.insufficient_samples;
        self.cached += other.cached;
    }

    /// Pairs that got a score
    pub fn scored(&self) -> u64 {
        self.pairs_visited - self.cross_hybridized - self.insufficient_samples
    }
}

/// Score and p-value cutoffs for the selection pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub upper: f64,
    pub lower: f64,
    /// corrected p-values must be below this
    pub pvalue: f64,
    pub use_pvalue: bool,
    pub absolute_value: bool,
}

impl Thresholds {
    /// Strict inequalities on both score and p-value
    pub fn keeps(&self, score: f64, pvalue: f64) -> bool {
        let by_score = if self.absolute_value {
            score.abs() > self.upper
        } else {
            score > self.upper || score < self.lower
        };
        by_score && (!self.use_pvalue || pvalue < self.pvalue)
    }

    /// Every score these thresholds can keep has `|score| > cache_cut`
    pub fn covered_by_cache(&self, cache_cut: f64) -> bool {
        self.upper >= cache_cut && (self.absolute_value || self.lower <= -cache_cut)
    }
}

fn ordered(i: usize, j: usize) -> (usize, usize) {
    if i <= j {
        (i, j)
    } else {
        (j, i)
    }
}

///
/// Two-pass correlation of all row pairs of an expression matrix.
///
/// Pass 1 (`fill_histogram`) visits every eligible pair once, fills a
/// histogram and caches scores with `|r| > cache_cut`. Pass 2
/// (`select_links`) keeps pairs passing the thresholds, reusing cached
/// scores and only recomputing when the thresholds reach below the
/// cache cut.
///
pub struct CorrelationEngine<'a> {
    data: &'a ExpressionData,
    metric: Box<dyn RowPairMetric + 'a>,
    cache_cut: f64,
    absolute_value: bool,
    block_size: usize,
    cache: DashMap<(usize, usize), (f64, usize)>,
    histogram: CorrelationHistogram,
    summary: CorrelationSummary,
    histogram_filled: bool,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(data: &'a ExpressionData, config: &LinkAnalysisConfig) -> Self {
        let x = &data.matrix().data;
        let metric: Box<dyn RowPairMetric> = match config.metric {
            Metric::Pearson => Box::new(PearsonMetric::new(x, config.min_num_present)),
            Metric::Spearman => Box::new(SpearmanMetric::new(x, config.min_num_present)),
        };
        Self::with_metric(data, metric, config)
    }

    /// Use a custom row metric
    pub fn with_metric(
        data: &'a ExpressionData,
        metric: Box<dyn RowPairMetric + 'a>,
        config: &LinkAnalysisConfig,
    ) -> Self {
        assert_eq!(metric.nrows(), data.nrows(), "metric and data disagree on rows");
        Self {
            data,
            metric,
            cache_cut: config.cache_cut,
            absolute_value: config.absolute_value,
            block_size: config.block_size,
            cache: DashMap::new(),
            histogram: CorrelationHistogram::new(),
            summary: CorrelationSummary::default(),
            histogram_filled: false,
        }
    }

    pub fn histogram(&self) -> &CorrelationHistogram {
        &self.histogram
    }

    pub fn summary(&self) -> &CorrelationSummary {
        &self.summary
    }

    pub fn num_cached(&self) -> usize {
        self.cache.len()
    }

    /// Score cached for rows `i` and `j` in pass 1
    pub fn cached_score(&self, i: usize, j: usize) -> Option<f64> {
        self.cache.get(&ordered(i, j)).map(|e| e.value().0)
    }

    /// Score and samples used, from the cache when present
    fn score(&self, i: usize, j: usize) -> Option<(f64, usize)> {
        match self.cache.get(&(i, j)) {
            Some(e) => Some(*e.value()),
            None => self.metric.correlate(i, j),
        }
    }

    fn corrected_pvalue(&self, i: usize, j: usize, score: f64, n: usize) -> f64 {
        let penalty = (self.data.num_tests(i) * self.data.num_tests(j)) as f64;
        (correlation_pvalue(score, n) * penalty).min(1.0)
    }

    ///
    /// Visit the eligible pairs `(i, j)`, `i < j`, of rows `lb..ub`,
    /// calling `visit(i, j, score, n)` for each pair with a score
    ///
    fn visit_block<F>(&self, lb: usize, ub: usize, summary: &mut CorrelationSummary, mut visit: F)
    where
        F: FnMut(usize, usize, f64, usize),
    {
        let data = self.data;
        let n = data.nrows();
        for i in lb..ub {
            if !data.has_gene(i) {
                continue;
            }
            for j in (i + 1)..n {
                if !data.has_gene(j) {
                    continue;
                }
                summary.pairs_visited += 1;
                if data.cross_hybridizes(i, j) {
                    summary.cross_hybridized += 1;
                    continue;
                }
                match self.score(i, j) {
                    Some((r, used)) => visit(i, j, r, used),
                    None => summary.insufficient_samples += 1,
                }
            }
            if i > 0 && i % 1000 == 0 {
                info!("row {} of {}", i, n);
            }
        }
    }

    ///
    /// Pass 1: score every eligible pair into the histogram and cache
    /// large scores. Nothing is selected.
    ///
    pub fn fill_histogram(&mut self) -> anyhow::Result<()> {
        let nrows = self.data.nrows();
        if self.data.num_eligible_rows() < 2 {
            anyhow::bail!("fewer than two rows with genes to correlate");
        }

        self.cache.clear();
        let jobs = generate_triangle_intervals(nrows, self.block_size);
        let njobs = jobs.len() as u64;
        info!("pass 1 over {} rows in {} jobs", nrows, njobs);

        let this = &*self;
        let partial: Vec<(CorrelationHistogram, CorrelationSummary)> = jobs
            .into_par_iter()
            .progress_count(njobs)
            .map(|(lb, ub)| {
                let mut hist = CorrelationHistogram::new();
                let mut summary = CorrelationSummary::default();
                let mut ncached = 0_u64;
                this.visit_block(lb, ub, &mut summary, |i, j, r, used| {
                    hist.add(if this.absolute_value { r.abs() } else { r });
                    if r.abs() > this.cache_cut {
                        this.cache.insert((i, j), (r, used));
                        ncached += 1;
                    }
                });
                summary.cached = ncached;
                (hist, summary)
            })
            .collect();

        let mut histogram = CorrelationHistogram::new();
        let mut summary = CorrelationSummary {
            no_gene: (nrows - self.data.num_eligible_rows()) as u64,
            ..Default::default()
        };
        for (h, s) in partial.iter() {
            histogram.merge(h);
            summary.add(s);
        }

        info!(
            "pass 1: {} pairs scored, {} cached (|r| > {}), {} cross-hybridizing, {} with too few samples, {} rows without genes",
            summary.scored(),
            summary.cached,
            self.cache_cut,
            summary.cross_hybridized,
            summary.insufficient_samples,
            summary.no_gene
        );

        self.histogram = histogram;
        self.summary = summary;
        self.histogram_filled = true;
        Ok(())
    }

    ///
    /// Pass 2: keep pairs passing `thresholds`, sorted by rows
    ///
    /// * `thresholds` - score cut points and the corrected p-value ceiling
    ///
    pub fn select_links(&self, thresholds: &Thresholds) -> Vec<Link> {
        let keep = |i: usize, j: usize, r: f64, used: usize| -> Option<Link> {
            let pvalue = self.corrected_pvalue(i, j, r, used);
            if thresholds.keeps(r, pvalue) {
                Some(Link {
                    first: i,
                    second: j,
                    score: r,
                    pvalue,
                })
            } else {
                None
            }
        };

        let mut links: Vec<Link> = if self.histogram_filled && thresholds.covered_by_cache(self.cache_cut) {
            info!("pass 2: every candidate score is cached");
            self.cache
                .par_iter()
                .filter_map(|e| {
                    let (&(i, j), &(r, used)) = (e.key(), e.value());
                    keep(i, j, r, used)
                })
                .collect()
        } else {
            info!("pass 2: recomputing scores below the cache cut {}", self.cache_cut);
            let nrows = self.data.nrows();
            let jobs = generate_triangle_intervals(nrows, self.block_size);
            let njobs = jobs.len() as u64;
            jobs.into_par_iter()
                .progress_count(njobs)
                .map(|(lb, ub)| {
                    let mut found = vec![];
                    let mut summary = CorrelationSummary::default();
                    self.visit_block(lb, ub, &mut summary, |i, j, r, used| {
                        if let Some(link) = keep(i, j, r, used) {
                            found.push(link);
                        }
                    });
                    found
                })
                .flatten()
                .collect()
        };

        links.sort_by(|a, b| (a.first, a.second).cmp(&(b.first, b.second)));
        info!("pass 2: kept {} links", links.len());
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ProbeGeneMap;
    use matrix_util::ndarray_io::NamedArray2;
    use ndarray::Array2;

    fn data_with_map(map: Option<&ProbeGeneMap>) -> anyhow::Result<ExpressionData> {
        // rows 0, 1 rise together; row 2 falls; row 3 zig-zags
        let mut x = Array2::<f64>::zeros((4, 10));
        for j in 0..10 {
            let t = j as f64;
            x[[0, j]] = t;
            x[[1, j]] = 2.0 * t + if j % 2 == 0 { 0.1 } else { -0.1 };
            x[[2, j]] = -t;
            x[[3, j]] = if j % 2 == 0 { 1.0 } else { -1.0 };
        }
        let names = (0..4).map(|i| format!("p{}", i).into_boxed_str()).collect();
        let cols = (0..10).map(|j| format!("s{}", j).into_boxed_str()).collect();
        Ok(ExpressionData::new(NamedArray2::new(x, names, cols)?, map))
    }

    fn loose(absolute_value: bool) -> Thresholds {
        Thresholds {
            upper: 0.9,
            lower: -0.9,
            pvalue: 1.0,
            use_pvalue: false,
            absolute_value,
        }
    }

    #[test]
    fn pass_one_counts_every_pair() -> anyhow::Result<()> {
        let data = data_with_map(None)?;
        let config = LinkAnalysisConfig {
            block_size: 1,
            ..Default::default()
        };
        let mut engine = CorrelationEngine::new(&data, &config);
        engine.fill_histogram()?;
        assert_eq!(engine.summary().pairs_visited, 6);
        assert_eq!(engine.histogram().total(), 6);
        // |r| of (0,1), (0,2), (1,2) are near 1
        assert!(engine.cached_score(1, 0).is_some());
        assert!(engine.cached_score(0, 2).is_some());
        Ok(())
    }

    #[test]
    fn cached_and_recomputed_selection_agree() -> anyhow::Result<()> {
        let data = data_with_map(None)?;
        let mut engine = CorrelationEngine::new(&data, &LinkAnalysisConfig::default());
        engine.fill_histogram()?;

        let cached = engine.select_links(&loose(false));
        assert!(loose(false).covered_by_cache(0.5));

        let wide = Thresholds {
            upper: 0.3,
            lower: -0.3,
            ..loose(false)
        };
        assert!(!wide.covered_by_cache(0.5));
        let recomputed: Vec<Link> = engine
            .select_links(&wide)
            .into_iter()
            .filter(|l| loose(false).keeps(l.score, l.pvalue))
            .collect();

        assert_eq!(cached.len(), 3);
        assert_eq!(cached, recomputed);
        for (a, b) in cached.iter().zip(&recomputed) {
            assert_eq!(a.score, b.score);
            assert_eq!(engine.cached_score(a.first, a.second), Some(a.score));
        }
        Ok(())
    }

    #[test]
    fn shared_genes_are_skipped_and_penalized() -> anyhow::Result<()> {
        let mut map = ProbeGeneMap::default();
        map.insert("p0", vec![1]);
        map.insert("p1", vec![1]);
        map.insert("p2", vec![2]);
        map.insert("p3", vec![]);
        let data = data_with_map(Some(&map))?;
        let mut engine = CorrelationEngine::new(&data, &LinkAnalysisConfig::default());
        engine.fill_histogram()?;

        let s = engine.summary();
        assert_eq!(s.no_gene, 1);
        assert_eq!(s.pairs_visited, 3);
        assert_eq!(s.cross_hybridized, 1);

        let links = engine.select_links(&loose(true));
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.second == 2 && !l.is_positive()));
        // gene 1 has two probes
        let raw = correlation_pvalue(links[0].score, 10);
        assert!((links[0].pvalue - (2.0 * raw).min(1.0)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn keep_rule_is_strict() {
        let t = Thresholds {
            upper: 0.5,
            lower: -0.5,
            pvalue: 0.01,
            use_pvalue: true,
            absolute_value: false,
        };
        assert!(!t.keeps(0.5, 0.0));
        assert!(t.keeps(0.51, 0.0));
        assert!(t.keeps(-0.51, 0.0));
        assert!(!t.keeps(0.9, 0.01));
        let zero = Thresholds {
            upper: 0.0,
            lower: 0.0,
            use_pvalue: false,
            ..t
        };
        assert!(zero.keeps(0.01, 1.0) && zero.keeps(-0.01, 1.0));
    }
}
