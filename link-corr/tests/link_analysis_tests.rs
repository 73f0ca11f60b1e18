use link_bits::gene_links::read_gene_links;
use link_corr::config::{LinkAnalysisConfig, Metric, ProfileFilterConfig};
use link_corr::engine::{CorrelationEngine, Thresholds};
use link_corr::expression::{ExpressionData, ProbeGeneMap};
use link_corr::filter::filter_profiles;
use link_corr::links_io::write_links;
use link_corr::metric::{PearsonMetric, RowPairMetric, SpearmanMetric};
use link_corr::run_link_analysis;
use matrix_util::common_io::{create_temp_dir_file, remove_file};
use matrix_util::ndarray_io::NamedArray2;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const NUM_MODULES: usize = 3;
const MODULE_SIZE: usize = 5;
const NUM_NOISE: usize = 15;
const NUM_SAMPLES: usize = 60;

// ─── Fixtures ───────────────────────────────────────────────────────────────

/// Probes `m * MODULE_SIZE .. (m + 1) * MODULE_SIZE` share latent factor
/// `m`; the remaining probes are pure noise. Probe `i` measures gene
/// `100 + i`.
fn module_data(seed: u64) -> anyhow::Result<ExpressionData> {
    let mut rng = StdRng::seed_from_u64(seed);
    let nrows = NUM_MODULES * MODULE_SIZE + NUM_NOISE;

    let factors: Vec<Vec<f64>> = (0..NUM_MODULES)
        .map(|_| (0..NUM_SAMPLES).map(|_| rng.sample::<f64, _>(StandardNormal)).collect())
        .collect();

    let mut x = Array2::<f64>::zeros((nrows, NUM_SAMPLES));
    for i in 0..nrows {
        for j in 0..NUM_SAMPLES {
            let noise: f64 = rng.sample(StandardNormal);
            x[[i, j]] = if i < NUM_MODULES * MODULE_SIZE {
                5.0 + factors[i / MODULE_SIZE][j] + 0.3 * noise
            } else {
                5.0 + noise
            };
        }
    }

    let names: Vec<Box<str>> = (0..nrows).map(|i| format!("probe{}", i).into_boxed_str()).collect();
    let cols = (0..NUM_SAMPLES).map(|j| format!("s{}", j).into_boxed_str()).collect();
    let mut map = ProbeGeneMap::default();
    for (i, p) in names.iter().enumerate() {
        map.insert(p, vec![100 + i as i64]);
    }
    Ok(ExpressionData::new(NamedArray2::new(x, names, cols)?, Some(&map)))
}

fn module_of(row: usize) -> Option<usize> {
    (row < NUM_MODULES * MODULE_SIZE).then_some(row / MODULE_SIZE)
}

fn strict_config() -> LinkAnalysisConfig {
    LinkAnalysisConfig {
        fwe: 1e-4,
        cdf_cut: 0.2,
        ..Default::default()
    }
}

// ─── Correlation properties ─────────────────────────────────────────────────

#[test]
fn row_correlation_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut x = Array2::<f64>::zeros((6, 12));
    x.mapv_inplace(|_| rng.sample(StandardNormal));
    x[[1, 3]] = f64::NAN;
    x[[4, 0]] = f64::NAN;
    x[[4, 7]] = f64::NAN;

    let pearson = PearsonMetric::new(&x, 8);
    let spearman = SpearmanMetric::new(&x, 8);
    for i in 0..6 {
        for j in 0..6 {
            let metrics: [&dyn RowPairMetric; 2] = [&pearson, &spearman];
            for m in metrics {
                let (a, b) = (m.correlate(i, j), m.correlate(j, i));
                match (a, b) {
                    (Some((ra, na)), Some((rb, nb))) => {
                        assert!((ra - rb).abs() < 1e-12);
                        assert_eq!(na, nb);
                    }
                    (None, None) => {}
                    _ => panic!("asymmetric result for ({}, {})", i, j),
                }
            }
        }
    }
}

#[test]
fn second_pass_reuses_cached_scores() -> anyhow::Result<()> {
    let data = module_data(3)?;
    for metric in [Metric::Pearson, Metric::Spearman] {
        let config = LinkAnalysisConfig {
            metric,
            cache_cut: 0.4,
            block_size: 50,
            ..Default::default()
        };
        let mut engine = CorrelationEngine::new(&data, &config);
        engine.fill_histogram()?;
        assert!(engine.num_cached() >= NUM_MODULES * MODULE_SIZE * (MODULE_SIZE - 1) / 2);

        // wide thresholds force recomputation of every uncached pair
        let wide = Thresholds {
            upper: 0.0,
            lower: 0.0,
            pvalue: 1.0,
            use_pvalue: false,
            absolute_value: false,
        };
        let links = engine.select_links(&wide);
        let mut seen_cached = 0;
        for l in links.iter() {
            if l.score.abs() > config.cache_cut {
                assert_eq!(engine.cached_score(l.first, l.second), Some(l.score));
                seen_cached += 1;
            } else {
                assert_eq!(engine.cached_score(l.first, l.second), None);
            }
        }
        assert_eq!(seen_cached, engine.num_cached());
    }
    Ok(())
}

// ─── End to end ─────────────────────────────────────────────────────────────

#[test]
fn modules_are_recovered() -> anyhow::Result<()> {
    let data = module_data(5)?;
    let (data, summary) = filter_profiles(&data, &ProfileFilterConfig::none(), 8)?;
    assert_eq!(summary.kept, NUM_MODULES * MODULE_SIZE + NUM_NOISE);

    let config = strict_config();
    let result = run_link_analysis(&data, &config)?;

    assert_eq!(result.num_eligible_rows, data.nrows());
    assert_eq!(result.histogram.total(), result.summary.scored());
    assert!(result.thresholds.upper > 0.5);

    for l in result.links.iter() {
        assert!(l.first < l.second);
        assert!(l.pvalue < result.thresholds.pvalue);
        assert_eq!(module_of(l.first), module_of(l.second));
        assert!(module_of(l.first).is_some());
        assert!(l.is_positive());
    }
    assert_eq!(result.links.len(), NUM_MODULES * MODULE_SIZE * (MODULE_SIZE - 1) / 2);
    Ok(())
}

#[test]
fn written_links_read_back_as_gene_links() -> anyhow::Result<()> {
    let data = module_data(8)?;
    let config = strict_config();
    let result = run_link_analysis(&data, &config)?;

    let file = create_temp_dir_file(".tsv.gz")?;
    let file = file.to_str().ok_or(anyhow::anyhow!("temp path"))?;
    write_links(&data, &result, &config, file)?;

    let gene_links = read_gene_links(file)?;
    assert_eq!(gene_links.len(), result.links.len());
    for (g, l) in gene_links.iter().zip(result.links.iter()) {
        assert_eq!(g.first, 100 + l.first as i64);
        assert_eq!(g.second, 100 + l.second as i64);
        assert!((g.score - l.score).abs() < 1e-5);
    }
    remove_file(file)?;
    Ok(())
}

#[test]
fn invalid_settings_fail_before_work() -> anyhow::Result<()> {
    let data = module_data(1)?;
    let config = LinkAnalysisConfig {
        cdf_cut: 2.0,
        ..Default::default()
    };
    assert!(run_link_analysis(&data, &config).is_err());
    Ok(())
}
