//! Arena-backed dendrogram of links.
//!
//! Nodes live in one vector and refer to each other by [`NodeId`]:
//! - a leaf holds one gene pair (its packed id) and that pair's
//!   experiment mask
//! - an internal node holds the intersection of its children's masks
//!
//! Node order is creation order, so internal nodes appear in merge
//! order and every child precedes its parent.

use link_bits::mask;
use matrix_util::common_io::write_lines;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug)]
pub struct TreeNode {
    /// packed pair id; `None` for internal nodes
    pub id: Option<u64>,
    pub mask: Box<[u64]>,
    /// set bits of `mask`
    pub bits: usize,
    /// nearest eligible node while clustering
    pub closest: Option<NodeId>,
    pub closest_overlap: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// 0 for leaves, one more than the deepest child otherwise
    pub level: usize,
    /// creation order
    pub order: usize,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Depth-first leaf order and merge-ordered internal nodes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Linearized {
    pub leaves: Vec<NodeId>,
    pub internal: Vec<NodeId>,
}

#[derive(Clone, Debug, Default)]
pub struct LinkTree {
    nodes: Vec<TreeNode>,
}

impl LinkTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, n: NodeId) -> &TreeNode {
        &self.nodes[n.0]
    }

    pub fn node_mut(&mut self, n: NodeId) -> &mut TreeNode {
        &mut self.nodes[n.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn add_leaf(&mut self, id: u64, m: Box<[u64]>) -> NodeId {
        let order = self.nodes.len();
        self.nodes.push(TreeNode {
            id: Some(id),
            bits: mask::count_bits(&m),
            mask: m,
            closest: None,
            closest_overlap: 0,
            parent: None,
            children: vec![],
            level: 0,
            order,
        });
        NodeId(order)
    }

    ///
    /// Add a node over `children`, none of which may have a parent yet
    ///
    /// * `children` - at least one existing node
    /// * `m` - mask of the new node
    ///
    pub fn add_internal(&mut self, children: &[NodeId], m: Box<[u64]>) -> NodeId {
        assert!(!children.is_empty(), "internal node needs children");
        let order = self.nodes.len();
        let parent = NodeId(order);
        let mut level = 0;
        for &c in children {
            let child = &mut self.nodes[c.0];
            assert!(child.parent.is_none(), "node {} already has a parent", c.0);
            child.parent = Some(parent);
            level = level.max(child.level + 1);
        }
        self.nodes.push(TreeNode {
            id: None,
            bits: mask::count_bits(&m),
            mask: m,
            closest: None,
            closest_overlap: 0,
            parent: None,
            children: children.to_vec(),
            level,
            order,
        });
        parent
    }

    /// Nodes without a parent, in creation order
    pub fn roots(&self) -> Vec<NodeId> {
        self.node_ids().filter(|&n| self.node(n).parent.is_none()).collect()
    }

    /// From the parent of `n` up to its root
    pub fn ancestors(&self, n: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: self.node(n).parent,
        }
    }

    pub fn is_ancestor(&self, a: NodeId, n: NodeId) -> bool {
        self.ancestors(n).any(|x| x == a)
    }

    /// Leaves under `n`, depth first, children in stored order
    pub fn leaves_under(&self, n: NodeId) -> Vec<NodeId> {
        let mut ret = vec![];
        let mut stack = vec![n];
        while let Some(x) = stack.pop() {
            let node = self.node(x);
            if node.is_leaf() {
                ret.push(x);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        ret
    }

    /// Packed pair ids of the leaves under `n`
    pub fn link_ids(&self, n: NodeId) -> Vec<u64> {
        self.leaves_under(n)
            .into_iter()
            .filter_map(|x| self.node(x).id)
            .collect()
    }

    pub fn linearize(&self) -> Linearized {
        let leaves = self
            .roots()
            .into_iter()
            .flat_map(|r| self.leaves_under(r))
            .collect();
        let internal = self.node_ids().filter(|&n| !self.node(n).is_leaf()).collect();
        Linearized { leaves, internal }
    }

    ///
    /// Newick string of the whole forest; several roots hang under one
    /// unnamed root. Internal nodes carry their support as label.
    ///
    /// * `label` - leaf label
    ///
    pub fn to_newick<F>(&self, label: F) -> String
    where
        F: Fn(&TreeNode) -> String,
    {
        let roots = self.roots();
        let mut out = String::new();
        if roots.len() > 1 {
            out.push('(');
        }
        for (k, &r) in roots.iter().enumerate() {
            if k > 0 {
                out.push(',');
            }
            self.write_newick(r, &label, &mut out);
        }
        if roots.len() > 1 {
            out.push(')');
        }
        out.push(';');
        out
    }

    // explicit stack; chains of merges can be deep
    fn write_newick<F>(&self, root: NodeId, label: &F, out: &mut String)
    where
        F: Fn(&TreeNode) -> String,
    {
        enum Step {
            Enter(NodeId),
            Comma,
            Close(NodeId),
        }
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(n) => {
                    let node = self.node(n);
                    if node.is_leaf() {
                        out.push_str(&label(node));
                    } else {
                        out.push('(');
                        stack.push(Step::Close(n));
                        for (k, &c) in node.children.iter().enumerate().rev() {
                            stack.push(Step::Enter(c));
                            if k > 0 {
                                stack.push(Step::Comma);
                            }
                        }
                    }
                }
                Step::Comma => out.push(','),
                Step::Close(n) => {
                    out.push(')');
                    out.push_str(&self.node(n).bits.to_string());
                }
            }
        }
    }

    ///
    /// Write the dendrogram for TreeView: `file` gets one
    /// `NODE{k}X \t left \t right \t similarity` line per binary merge
    /// and `order_file` gets `GENE{i}X \t label` per leaf in display
    /// order. Similarity is the merged support over the largest leaf
    /// support.
    ///
    pub fn write_gtr<F>(&self, file: &str, order_file: &str, label: F) -> anyhow::Result<()>
    where
        F: Fn(&TreeNode) -> String,
    {
        let lin = self.linearize();
        let mut names = vec![String::new(); self.len()];
        for (i, &n) in lin.leaves.iter().enumerate() {
            names[n.0] = format!("GENE{}X", i);
        }
        for (k, &n) in lin.internal.iter().enumerate() {
            names[n.0] = format!("NODE{}X", k + 1);
        }

        let max_bits = lin
            .leaves
            .iter()
            .map(|&n| self.node(n).bits)
            .max()
            .unwrap_or(1)
            .max(1) as f64;

        let mut gtr: Vec<String> = vec![];
        for &n in lin.internal.iter() {
            let node = self.node(n);
            if node.children.len() != 2 {
                anyhow::bail!("node {} has {} children; gtr needs a binary tree", n.0, node.children.len());
            }
            gtr.push(format!(
                "{}\t{}\t{}\t{:.4}",
                names[n.0],
                names[node.children[0].0],
                names[node.children[1].0],
                node.bits as f64 / max_bits
            ));
        }
        write_lines(&gtr, file)?;

        let order: Vec<String> = lin
            .leaves
            .iter()
            .map(|&n| format!("{}\t{}", names[n.0], label(self.node(n))))
            .collect();
        write_lines(&order, order_file)
    }
}

pub struct Ancestors<'a> {
    tree: &'a LinkTree,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.current?;
        self.current = self.tree.node(n).parent;
        Some(n)
    }
}
