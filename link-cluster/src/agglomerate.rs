use crate::config::ClusterConfig;
use crate::link_set::Leaf;
use crate::tree::{LinkTree, NodeId};

use fnv::FnvHashSet as HashSet;
use link_bits::mask;
use log::info;
use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};

/// Candidate ranking: more overlap, then deeper, then older
type CandidateKey = (usize, usize, Reverse<usize>);

fn candidate_key(tree: &LinkTree, c: NodeId, overlap: usize) -> CandidateKey {
    let node = tree.node(c);
    (overlap, node.level, Reverse(node.order))
}

///
/// Bottom-up agglomeration of links by shared experiment support.
///
/// Every eligible node caches its closest other eligible node. A
/// dependency index maps each node to the nodes whose closest it is, so
/// a merge only recomputes the nodes that pointed at either child.
///
pub struct LinkGraphClustering {
    tree: LinkTree,
    eligible: Vec<NodeId>,
    /// position in `eligible`, by node
    position: Vec<Option<usize>>,
    /// nodes whose closest is this node, by node
    dependents: Vec<HashSet<NodeId>>,
    merge_threshold: usize,
    num_merges: usize,
}

impl LinkGraphClustering {
    ///
    /// Start from one eligible leaf per link; links without support are
    /// left out
    ///
    pub fn new(leaves: &[Leaf], config: &ClusterConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut tree = LinkTree::new();
        for l in leaves.iter().filter(|l| l.bits() > 0) {
            tree.add_leaf(l.id, l.mask.clone());
        }
        let n = tree.len();
        let mut ret = Self {
            tree,
            eligible: (0..n).map(NodeId).collect(),
            position: (0..n).map(Some).collect(),
            dependents: vec![HashSet::default(); n],
            merge_threshold: config.merge_threshold(),
            num_merges: 0,
        };
        let all = ret.eligible.clone();
        ret.refresh_closest(&all);
        Ok(ret)
    }

    pub fn tree(&self) -> &LinkTree {
        &self.tree
    }

    pub fn into_tree(self) -> LinkTree {
        self.tree
    }

    pub fn num_eligible(&self) -> usize {
        self.eligible.len()
    }

    pub fn num_merges(&self) -> usize {
        self.num_merges
    }

    fn find_closest(&self, n: NodeId) -> Option<(NodeId, usize)> {
        let m = &self.tree.node(n).mask;
        self.eligible
            .iter()
            .filter(|&&c| c != n)
            .map(|&c| (c, mask::overlap_bits(m, &self.tree.node(c).mask)))
            .max_by_key(|&(c, ov)| candidate_key(&self.tree, c, ov))
    }

    fn set_closest(&mut self, n: NodeId, closest: Option<(NodeId, usize)>) {
        if let Some(old) = self.tree.node(n).closest {
            self.dependents[old.0].remove(&n);
        }
        let node = self.tree.node_mut(n);
        node.closest = closest.map(|x| x.0);
        node.closest_overlap = closest.map(|x| x.1).unwrap_or(0);
        if let Some((c, _)) = closest {
            self.dependents[c.0].insert(n);
        }
    }

    /// Recompute the closest node of each of `nodes` in parallel
    fn refresh_closest(&mut self, nodes: &[NodeId]) {
        let found: Vec<(NodeId, Option<(NodeId, usize)>)> =
            nodes.par_iter().map(|&n| (n, self.find_closest(n))).collect();
        for (n, c) in found {
            self.set_closest(n, c);
        }
    }

    fn remove_eligible(&mut self, n: NodeId) {
        let Some(pos) = self.position[n.0].take() else {
            return;
        };
        self.eligible.swap_remove(pos);
        if let Some(&moved) = self.eligible.get(pos) {
            self.position[moved.0] = Some(pos);
        }
    }

    fn add_eligible(&mut self, n: NodeId) {
        self.position.resize(self.tree.len(), None);
        self.dependents.resize(self.tree.len(), HashSet::default());
        self.position[n.0] = Some(self.eligible.len());
        self.eligible.push(n);
    }

    /// Eligible node and its closest with the largest overlap
    fn best_pair(&self) -> Option<(NodeId, NodeId, usize)> {
        self.eligible
            .iter()
            .filter_map(|&n| {
                let node = self.tree.node(n);
                node.closest.map(|c| (n, c, node.closest_overlap))
            })
            .max_by(|&(a, b, x), &(c, d, y)| {
                let depth = |p: NodeId, q: NodeId| self.tree.node(p).level.max(self.tree.node(q).level);
                let first = |p: NodeId, q: NodeId| self.tree.node(p).order.min(self.tree.node(q).order);
                x.cmp(&y)
                    .then(depth(a, b).cmp(&depth(c, d)))
                    .then(first(c, d).cmp(&first(a, b)))
                    .then(c.cmp(&a))
            })
    }

    ///
    /// Merge the best pair once. Returns the new node, or `None` when
    /// fewer than two nodes are left or the best overlap is below the
    /// merge threshold.
    ///
    pub fn merge_once(&mut self) -> Option<NodeId> {
        if self.eligible.len() < 2 {
            return None;
        }
        let (a, b, overlap) = self.best_pair()?;
        if overlap < self.merge_threshold {
            return None;
        }
        assert_ne!(a, b, "a node cannot merge with itself");

        let m = mask::and(&self.tree.node(a).mask, &self.tree.node(b).mask);
        let parent = self.tree.add_internal(&[a, b], m);

        self.set_closest(a, None);
        self.set_closest(b, None);
        self.remove_eligible(a);
        self.remove_eligible(b);
        self.add_eligible(parent);

        let mut affected: Vec<NodeId> = self.dependents[a.0].drain().collect();
        affected.extend(self.dependents[b.0].drain());
        affected.sort();
        affected.dedup();

        // the parent is the only new candidate for everyone else
        let pm = self.tree.node(parent).mask.clone();
        let others: Vec<(NodeId, usize)> = self
            .eligible
            .par_iter()
            .filter(|&&n| n != parent && affected.binary_search(&n).is_err())
            .filter_map(|&n| {
                let node = self.tree.node(n);
                let ov = mask::overlap_bits(&node.mask, &pm);
                let better = match node.closest {
                    Some(c) => {
                        candidate_key(&self.tree, parent, ov).cmp(&candidate_key(&self.tree, c, node.closest_overlap))
                            == Ordering::Greater
                    }
                    None => true,
                };
                better.then_some((n, ov))
            })
            .collect();
        for (n, ov) in others {
            self.set_closest(n, Some((parent, ov)));
        }

        affected.push(parent);
        self.refresh_closest(&affected);

        self.num_merges += 1;
        if self.num_merges % 2000 == 0 {
            info!("{} merges, {} eligible nodes", self.num_merges, self.eligible.len());
        }
        Some(parent)
    }

    /// Merge until no pair reaches the merge threshold
    pub fn run(&mut self) -> usize {
        let start = self.num_merges;
        while self.merge_once().is_some() {}
        info!(
            "{} merges; {} nodes left unmerged (threshold {})",
            self.num_merges - start,
            self.eligible.len(),
            self.merge_threshold
        );
        self.num_merges - start
    }
}

/// Cluster `leaves` to completion and return the dendrogram
pub fn cluster_links(leaves: &[Leaf], config: &ClusterConfig) -> anyhow::Result<LinkTree> {
    let mut clustering = LinkGraphClustering::new(leaves, config)?;
    if clustering.num_eligible() < 2 {
        info!("fewer than two links to cluster");
        return Ok(clustering.into_tree());
    }
    clustering.run();
    Ok(clustering.into_tree())
}
