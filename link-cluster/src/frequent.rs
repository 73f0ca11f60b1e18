use crate::config::ClusterConfig;
use crate::link_set::{sort_link_sets, Leaf, LinkSet};

use link_bits::mask;
use log::{info, warn};

/// A node of the top-down search: a set of leaves and their shared mask
struct SearchNode {
    leaves: Vec<usize>,
    mask: Box<[u64]>,
    /// leaves (in support order) that may still join, all after the last
    /// leaf of `leaves`
    next: usize,
    /// children have been generated
    expanded: bool,
    num_children: usize,
}

///
/// Top-down mining of link sets whose experiments overlap in at least
/// `stringency` bits. Each leaf starts a branch; a branch grows by
/// intersecting with later leaves (in descending support order) while
/// the intersection keeps enough support. Branches that cannot grow are
/// the maximal patterns.
///
pub struct FrequentLinkSetFinder<'a> {
    config: &'a ClusterConfig,
}

impl<'a> FrequentLinkSetFinder<'a> {
    pub fn new(config: &'a ClusterConfig) -> Self {
        Self { config }
    }

    pub fn find(&self, leaves: &[Leaf]) -> anyhow::Result<Vec<LinkSet>> {
        self.config.validate()?;
        let min_support = self.config.stringency;

        let mut order: Vec<usize> = (0..leaves.len())
            .filter(|&i| leaves[i].bits() >= min_support)
            .collect();
        order.sort_by(|&a, &b| leaves[b].bits().cmp(&leaves[a].bits()).then(a.cmp(&b)));

        if order.len() < 2 {
            return Ok(vec![]);
        }

        let mut nodes: Vec<SearchNode> = order
            .iter()
            .enumerate()
            .map(|(k, &l)| SearchNode {
                leaves: vec![l],
                mask: leaves[l].mask.clone(),
                next: k + 1,
                expanded: false,
                num_children: 0,
            })
            .collect();

        let mut stack: Vec<usize> = (0..nodes.len()).rev().collect();
        let mut truncated = false;
        let mut next_log = 2000;

        while let Some(n) = stack.pop() {
            let mut children = vec![];
            for k in nodes[n].next..order.len() {
                let sibling = &leaves[order[k]].mask;
                let parent = &nodes[n].mask;
                if mask::overlap_bits(parent, sibling) < min_support {
                    continue;
                }
                // a sibling inside the parent's support is the exact child
                let m = if mask::is_subset(sibling, parent) {
                    sibling.clone()
                } else {
                    mask::and(parent, sibling)
                };
                let mut ls = nodes[n].leaves.clone();
                ls.push(order[k]);
                children.push(SearchNode {
                    leaves: ls,
                    mask: m,
                    next: k + 1,
                    expanded: false,
                    num_children: 0,
                });
            }

            if nodes.len() + children.len() > self.config.max_nodes {
                truncated = true;
                break;
            }

            nodes[n].expanded = true;
            nodes[n].num_children = children.len();
            let first = nodes.len();
            nodes.extend(children);
            stack.extend((first..nodes.len()).rev());

            if nodes.len() >= next_log {
                info!("{} search nodes", nodes.len());
                next_log += 2000;
            }
        }

        if truncated {
            warn!(
                "stopped expanding at {} nodes; results cover the explored part only",
                self.config.max_nodes
            );
        }

        let mut found: Vec<LinkSet> = nodes
            .iter()
            // an unexpanded node is not known to be maximal
            .filter(|x| x.expanded && x.num_children == 0 && x.leaves.len() >= self.config.min_links)
            .map(|x| LinkSet::new(x.leaves.iter().map(|&l| leaves[l].id).collect(), x.mask.clone()))
            .collect();

        // keep sets not contained in a larger reported set
        found.sort_by(|a, b| b.len().cmp(&a.len()));
        let mut maximal: Vec<LinkSet> = vec![];
        for s in found {
            if !maximal.iter().any(|m| m.len() > s.len() && s.is_subset_of(m)) {
                maximal.push(s);
            }
        }
        sort_link_sets(&mut maximal);

        info!("{} frequent link sets of at least {} links", maximal.len(), self.config.min_links);
        Ok(maximal)
    }
}
