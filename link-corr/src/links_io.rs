use crate::analysis::LinkAnalysisResult;
use crate::config::LinkAnalysisConfig;
use crate::engine::Link;
use crate::expression::ExpressionData;

use log::info;
use matrix_util::common_io::write_lines;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const LINK_COLUMNS: [&str; 6] = ["probe1", "probe2", "score", "pvalue", "genes1", "genes2"];

///
/// Keep each link with probability `subset_size / links.len()`
///
/// * `subset_size` - 0 keeps everything
///
pub fn sample_subset(links: &[Link], subset_size: usize, seed: u64) -> Vec<Link> {
    if subset_size == 0 || links.len() <= subset_size {
        return links.to_vec();
    }
    let frac = subset_size as f64 / links.len() as f64;
    let mut rng = StdRng::seed_from_u64(seed);
    links.iter().filter(|_| rng.random::<f64>() < frac).copied().collect()
}

fn gene_list(genes: &[i64]) -> String {
    genes.iter().map(|g| g.to_string()).collect::<Vec<_>>().join(",")
}

///
/// Write selected links as a tab-separated table, preceded by `#`
/// lines describing the settings and thresholds
///
/// * `file` - output file (`.gz` for gzipped)
///
pub fn write_links(
    data: &ExpressionData,
    result: &LinkAnalysisResult,
    config: &LinkAnalysisConfig,
    file: &str,
) -> anyhow::Result<()> {
    let links = sample_subset(&result.links, config.subset_size, config.seed);

    let t = &result.thresholds;
    let mut lines: Vec<Box<str>> = config.header_lines();
    lines.push(format!("# upper_threshold: {}", t.upper).into_boxed_str());
    lines.push(format!("# lower_threshold: {}", t.lower).into_boxed_str());
    lines.push(format!("# max_pvalue: {}", t.pvalue).into_boxed_str());
    lines.push(format!("# eligible_rows: {}", result.num_eligible_rows).into_boxed_str());
    lines.push(format!("# samples: {}", result.num_samples).into_boxed_str());
    lines.push(LINK_COLUMNS.join("\t").into_boxed_str());

    lines.extend(links.iter().map(|l| {
        format!(
            "{}\t{}\t{:.6}\t{:.6e}\t{}\t{}",
            data.probe_name(l.first),
            data.probe_name(l.second),
            l.score,
            l.pvalue,
            gene_list(data.genes(l.first)),
            gene_list(data.genes(l.second))
        )
        .into_boxed_str()
    }));

    write_lines(&lines, file)?;
    info!("wrote {} links to {}", links.len(), file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_is_reproducible() {
        let links: Vec<Link> = (0..1000)
            .map(|i| Link {
                first: i,
                second: i + 1,
                score: 0.9,
                pvalue: 0.0,
            })
            .collect();
        let a = sample_subset(&links, 100, 1);
        let b = sample_subset(&links, 100, 1);
        assert_eq!(a, b);
        assert!(a.len() > 50 && a.len() < 150);
        assert_eq!(sample_subset(&links, 0, 1).len(), 1000);
        assert_eq!(sample_subset(&links, 5000, 1).len(), 1000);
    }
}
