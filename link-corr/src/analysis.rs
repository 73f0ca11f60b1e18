use crate::config::LinkAnalysisConfig;
use crate::engine::{CorrelationEngine, CorrelationSummary, Link, Thresholds};
use crate::expression::ExpressionData;
use crate::histogram::CorrelationHistogram;
use crate::selector::LinkSelector;

use fnv::FnvHashMap as HashMap;
use log::info;

/// Everything a link analysis of one expression matrix produces
pub struct LinkAnalysisResult {
    pub links: Vec<Link>,
    pub histogram: CorrelationHistogram,
    pub thresholds: Thresholds,
    pub summary: CorrelationSummary,
    pub num_eligible_rows: usize,
    pub num_samples: usize,
}

/// Drop links with negative scores
pub fn omit_negative_links(links: Vec<Link>) -> Vec<Link> {
    let before = links.len();
    let ret: Vec<Link> = links.into_iter().filter(|l| l.is_positive()).collect();
    info!("removed {} negative links", before - ret.len());
    ret
}

///
/// Drop every link touching a row with more than `max_degree` links
///
/// * `links` - selected links
/// * `max_degree` - 0 keeps everything
///
pub fn filter_by_probe_degree(links: Vec<Link>, max_degree: usize) -> Vec<Link> {
    if max_degree == 0 {
        return links;
    }
    let mut degree: HashMap<usize, usize> = HashMap::default();
    for l in links.iter() {
        *degree.entry(l.first).or_default() += 1;
        *degree.entry(l.second).or_default() += 1;
    }
    let hubs = degree.values().filter(|&&d| d > max_degree).count();
    let before = links.len();
    let ret: Vec<Link> = links
        .into_iter()
        .filter(|l| degree[&l.first] <= max_degree && degree[&l.second] <= max_degree)
        .collect();
    info!(
        "{} probes have more than {} links; removed {} links",
        hubs,
        max_degree,
        before - ret.len()
    );
    ret
}

///
/// Correlate all eligible row pairs, choose thresholds from the score
/// distribution and significance, and select links
///
/// * `data` - (filtered) expression data
/// * `config` - analysis settings, validated before any work
///
pub fn run_link_analysis(data: &ExpressionData, config: &LinkAnalysisConfig) -> anyhow::Result<LinkAnalysisResult> {
    config.validate()?;

    let num_eligible_rows = data.num_eligible_rows();
    let num_samples = data.ncols();
    info!(
        "link analysis: {} of {} rows eligible, {} samples, metric {}",
        num_eligible_rows,
        data.nrows(),
        num_samples,
        config.metric
    );

    let mut engine = CorrelationEngine::new(data, config);
    engine.fill_histogram()?;

    let thresholds = LinkSelector::new(config).choose(engine.histogram(), num_eligible_rows, num_samples);

    let mut links = engine.select_links(&thresholds);
    if config.omit_negative_links {
        links = omit_negative_links(links);
    }
    links = filter_by_probe_degree(links, config.probe_degree_threshold);

    info!("{} links selected", links.len());

    Ok(LinkAnalysisResult {
        links,
        histogram: engine.histogram().clone(),
        thresholds,
        summary: engine.summary().clone(),
        num_eligible_rows,
        num_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(first: usize, second: usize, score: f64) -> Link {
        Link {
            first,
            second,
            score,
            pvalue: 0.0,
        }
    }

    #[test]
    fn hub_probes_lose_their_links() {
        let links = vec![link(0, 1, 0.9), link(0, 2, 0.8), link(0, 3, -0.8), link(4, 5, 0.7)];
        let kept = filter_by_probe_degree(links.clone(), 2);
        assert_eq!(kept, vec![link(4, 5, 0.7)]);
        assert_eq!(filter_by_probe_degree(links.clone(), 0).len(), 4);
        assert_eq!(omit_negative_links(links).len(), 3);
    }
}
