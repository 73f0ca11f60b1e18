use matrix_util::common_io::{read_lines_of_words_delim, Delimiter};
use std::hash::{Hash, Hasher};

/// A coexpression link between two genes. Equality and hashing use
/// (first, second, sign of score), so positive and negative links
/// between the same genes are different links. A zero score counts as
/// positive.
#[derive(Clone, Copy, Debug)]
pub struct GeneLink {
    pub first: i64,
    pub second: i64,
    pub score: f64,
}

impl GeneLink {
    pub fn new(first: i64, second: i64, score: f64) -> Self {
        Self {
            first,
            second,
            score,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.score >= 0.0
    }

    /// The same link with genes in increasing order
    pub fn canonical(&self) -> Self {
        if self.first <= self.second {
            *self
        } else {
            Self::new(self.second, self.first, self.score)
        }
    }
}

impl PartialEq for GeneLink {
    fn eq(&self, other: &Self) -> bool {
        self.first == other.first
            && self.second == other.second
            && self.is_positive() == other.is_positive()
    }
}

impl Eq for GeneLink {}

impl Hash for GeneLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.first.hash(state);
        self.second.hash(state);
        self.is_positive().hash(state);
    }
}

fn column(header: &[Box<str>], name: &str, file: &str) -> anyhow::Result<usize> {
    header
        .iter()
        .position(|h| h.as_ref() == name)
        .ok_or(anyhow::anyhow!("{}: no '{}' column", file, name))
}

fn parse_gene_list(word: &str) -> anyhow::Result<Vec<i64>> {
    word.split(',')
        .filter(|w| !w.trim().is_empty())
        .map(|w| {
            w.trim()
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("bad gene id '{}': {}", w, e))
        })
        .collect()
}

///
/// Read gene links from a probe link table with `genes1`, `genes2` and
/// `score` columns. Probes mapped to several genes give one link per
/// gene pair; self pairs are dropped.
///
/// * `file` - link table (gzipped or not)
///
pub fn read_gene_links(file: &str) -> anyhow::Result<Vec<GeneLink>> {
    let out = read_lines_of_words_delim(file, Delimiter::Tab, true)?;
    let g1 = column(&out.header, "genes1", file)?;
    let g2 = column(&out.header, "genes2", file)?;
    let sc = column(&out.header, "score", file)?;
    let width = out.header.len();

    let mut ret = vec![];
    for (line, words) in out.lines.iter() {
        if words.len() != width {
            anyhow::bail!(
                "{}:{}: expected {} fields, found {}",
                file,
                line,
                width,
                words.len()
            );
        }
        let score = words[sc]
            .trim()
            .parse::<f64>()
            .map_err(|e| anyhow::anyhow!("{}:{}: {}", file, line, e))?;
        let genes1 = parse_gene_list(&words[g1]).map_err(|e| anyhow::anyhow!("{}:{}: {}", file, line, e))?;
        let genes2 = parse_gene_list(&words[g2]).map_err(|e| anyhow::anyhow!("{}:{}: {}", file, line, e))?;
        for &a in genes1.iter() {
            for &b in genes2.iter() {
                if a != b {
                    ret.push(GeneLink::new(a, b, score));
                }
            }
        }
    }
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnv::FnvHashSet as HashSet;

    #[test]
    fn sign_separates_links() {
        let mut set = HashSet::default();
        set.insert(GeneLink::new(1, 2, 0.8));
        set.insert(GeneLink::new(1, 2, 0.9));
        set.insert(GeneLink::new(1, 2, -0.7));
        assert_eq!(set.len(), 2);
        assert_eq!(GeneLink::new(2, 1, 0.5).canonical(), GeneLink::new(1, 2, 0.1));
    }

    #[test]
    fn zero_score_is_positive() {
        assert!(GeneLink::new(1, 2, 0.0).is_positive());
        assert!(!GeneLink::new(1, 2, -0.0001).is_positive());
        assert_eq!(GeneLink::new(1, 2, 0.0), GeneLink::new(1, 2, 0.4));
        assert_ne!(GeneLink::new(1, 2, 0.0), GeneLink::new(1, 2, -0.4));
    }
}
