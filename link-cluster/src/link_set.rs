use link_bits::{mask, LinkMatrix};
use log::info;

/// One gene pair admitted to clustering
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    /// packed (row, col) id
    pub id: u64,
    pub mask: Box<[u64]>,
}

impl Leaf {
    pub fn bits(&self) -> usize {
        mask::count_bits(&self.mask)
    }
}

///
/// Gene pairs supported by at least `stringency` experiments, strongest
/// first. Pairs without support never become leaves.
///
pub fn collect_leaves(matrix: &LinkMatrix, stringency: usize) -> Vec<Leaf> {
    let bits = matrix.matrix();
    let ret: Vec<Leaf> = matrix
        .links_above(stringency.max(1))
        .into_iter()
        .filter_map(|(i, j, _)| {
            bits.mask(i, j).map(|m| Leaf {
                id: matrix.pack(i, j),
                mask: m.into(),
            })
        })
        .collect();
    info!("{} links with support >= {}", ret.len(), stringency);
    ret
}

/// A group of links and the experiments they share
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSet {
    /// packed pair ids, ascending
    pub link_ids: Vec<u64>,
    /// intersection of the links' masks
    pub mask: Box<[u64]>,
    pub support: usize,
}

impl LinkSet {
    pub fn new(mut link_ids: Vec<u64>, m: Box<[u64]>) -> Self {
        link_ids.sort_unstable();
        let support = mask::count_bits(&m);
        Self {
            link_ids,
            mask: m,
            support,
        }
    }

    pub fn len(&self) -> usize {
        self.link_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.link_ids.is_empty()
    }

    /// Every link of `self` is in `other`
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.link_ids.iter().all(|x| other.link_ids.binary_search(x).is_ok())
    }
}

/// Most support first, then more links, then smaller ids
pub fn sort_link_sets(sets: &mut [LinkSet]) {
    sets.sort_by(|a, b| {
        b.support
            .cmp(&a.support)
            .then(b.len().cmp(&a.len()))
            .then(a.link_ids.cmp(&b.link_ids))
    });
}
