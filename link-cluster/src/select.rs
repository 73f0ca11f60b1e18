use crate::link_set::{sort_link_sets, LinkSet};
use crate::tree::{LinkTree, NodeId};

use fnv::FnvHashSet as HashSet;

fn link_set(tree: &LinkTree, n: NodeId) -> LinkSet {
    LinkSet::new(tree.link_ids(n), tree.node(n).mask.clone())
}

///
/// The `num_clusters` largest top-level clusters by number of links
///
/// * `min_links` - smaller clusters are left out
///
pub fn largest_clusters(tree: &LinkTree, num_clusters: usize, min_links: usize) -> Vec<LinkSet> {
    let mut roots: Vec<(NodeId, usize)> = tree
        .roots()
        .into_iter()
        .filter(|&r| !tree.node(r).is_leaf())
        .map(|r| (r, tree.leaves_under(r).len()))
        .filter(|&(_, n)| n >= min_links)
        .collect();
    roots.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(tree.node(b.0).bits.cmp(&tree.node(a.0).bits))
            .then(a.0.cmp(&b.0))
    });
    roots
        .into_iter()
        .take(num_clusters)
        .map(|(r, _)| link_set(tree, r))
        .collect()
}

///
/// Internal nodes with the most shared experiments, never taking a node
/// together with one of its ancestors or descendants
///
pub fn clusters_by_common_bits(tree: &LinkTree, num_clusters: usize, min_links: usize) -> Vec<LinkSet> {
    let mut candidates: Vec<(NodeId, usize)> = tree
        .node_ids()
        .filter(|&n| !tree.node(n).is_leaf())
        .map(|n| (n, tree.leaves_under(n).len()))
        .filter(|&(_, k)| k >= min_links)
        .collect();
    candidates.sort_by(|a, b| {
        tree.node(b.0)
            .bits
            .cmp(&tree.node(a.0).bits)
            .then(b.1.cmp(&a.1))
            .then(a.0.cmp(&b.0))
    });

    let mut chosen: Vec<NodeId> = vec![];
    for (n, _) in candidates {
        if chosen.len() >= num_clusters {
            break;
        }
        let nested = chosen
            .iter()
            .any(|&c| tree.is_ancestor(c, n) || tree.is_ancestor(n, c));
        if !nested {
            chosen.push(n);
        }
    }
    let mut ret: Vec<LinkSet> = chosen.into_iter().map(|n| link_set(tree, n)).collect();
    sort_link_sets(&mut ret);
    ret
}

///
/// Cut the dendrogram into `num_clusters` groups by undoing the latest
/// merges. Unmerged leaves count as groups of one.
///
pub fn cut_clusters(tree: &LinkTree, num_clusters: usize) -> Vec<LinkSet> {
    let mut groups: HashSet<NodeId> = tree.roots().into_iter().collect();
    let mut internal: Vec<NodeId> = groups.iter().copied().filter(|&n| !tree.node(n).is_leaf()).collect();

    while groups.len() < num_clusters {
        // latest merge among current groups
        internal.sort_by_key(|&n| tree.node(n).order);
        let Some(n) = internal.pop() else {
            break;
        };
        groups.remove(&n);
        for &c in tree.node(n).children.iter() {
            groups.insert(c);
            if !tree.node(c).is_leaf() {
                internal.push(c);
            }
        }
    }

    let mut ret: Vec<LinkSet> = groups.into_iter().map(|n| link_set(tree, n)).collect();
    sort_link_sets(&mut ret);
    ret
}
