use crate::link_set::LinkSet;
use crate::tree::LinkTree;

use fnv::FnvHashMap as HashMap;
use link_bits::collaborators::{ExperimentLookup, GeneLookup, OntologySource};
use link_bits::LinkMatrix;
use log::info;
use matrix_util::common_io::write_lines;

pub const CLUSTER_COLUMNS: [&str; 6] = ["cluster", "num_links", "support", "links", "experiments", "go_terms"];

/// Names for the genes of every link in `sets`, ids when unknown
fn gene_names<G: GeneLookup>(matrix: &LinkMatrix, genes: &G, sets: &[LinkSet]) -> anyhow::Result<HashMap<i64, Box<str>>> {
    let mut ids: Vec<i64> = sets
        .iter()
        .flat_map(|s| s.link_ids.iter())
        .flat_map(|&id| {
            let (a, b) = matrix.paired_genes(id);
            [a, b]
        })
        .collect();
    ids.sort_unstable();
    ids.dedup();
    let mut ret: HashMap<i64, Box<str>> = ids
        .iter()
        .map(|&g| (g, g.to_string().into_boxed_str()))
        .collect();
    for g in genes.load_genes_by_ids(&ids)? {
        ret.insert(g.id, g.name);
    }
    Ok(ret)
}

///
/// Write link sets as a table, one row per set: links as
/// `gene-gene` pairs, supporting experiments by short name and, with an
/// ontology, the GO terms shared by the most links
///
/// * `file` - output file
/// * `top_terms` - GO terms reported per set
///
pub fn write_clusters<G, E, O>(
    file: &str,
    sets: &[LinkSet],
    matrix: &LinkMatrix,
    genes: &G,
    experiments: &E,
    ontology: Option<&O>,
    top_terms: usize,
) -> anyhow::Result<()>
where
    G: GeneLookup,
    E: ExperimentLookup,
    O: OntologySource,
{
    let names = gene_names(matrix, genes, sets)?;
    let mut lines: Vec<Box<str>> = vec![CLUSTER_COLUMNS.join("\t").into_boxed_str()];

    for (k, s) in sets.iter().enumerate() {
        let links: Vec<String> = s
            .link_ids
            .iter()
            .map(|&id| {
                let (a, b) = matrix.paired_genes(id);
                format!("{}-{}", names[&a], names[&b])
            })
            .collect();

        let ee_ids = matrix.decode_experiments(&s.mask);
        let ees: Vec<Box<str>> = experiments
            .load_experiments_by_ids(&ee_ids)?
            .into_iter()
            .map(|e| e.short_name)
            .collect();

        let terms = match ontology {
            Some(o) => matrix
                .top_go_terms(o, &s.link_ids, top_terms)?
                .into_iter()
                .map(|(t, n)| format!("{}:{}", t, n))
                .collect::<Vec<_>>()
                .join(","),
            None => String::new(),
        };

        lines.push(
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                k + 1,
                s.len(),
                s.support,
                links.join(","),
                ees.join(","),
                terms
            )
            .into_boxed_str(),
        );
    }

    write_lines(&lines, file)?;
    info!("wrote {} clusters to {}", sets.len(), file);
    Ok(())
}

/// Leaf label `gene-gene` for dendrogram exports
pub fn leaf_label<G: GeneLookup>(matrix: &LinkMatrix, genes: &G, id: Option<u64>) -> String {
    let Some(id) = id else {
        return String::new();
    };
    match matrix.paired_gene_names(genes, id) {
        Ok((a, b)) => format!("{}-{}", a, b),
        Err(_) => {
            let (a, b) = matrix.paired_genes(id);
            format!("{}-{}", a, b)
        }
    }
}

///
/// Write `{prefix}.gtr`, `{prefix}.order.tsv` and `{prefix}.nwk` for
/// the dendrogram
///
pub fn write_dendrogram<G: GeneLookup>(tree: &LinkTree, matrix: &LinkMatrix, genes: &G, prefix: &str) -> anyhow::Result<()> {
    let label = |n: &crate::tree::TreeNode| leaf_label(matrix, genes, n.id);
    tree.write_gtr(
        &format!("{}.gtr", prefix),
        &format!("{}.order.tsv", prefix),
        label,
    )?;
    write_lines(&[tree.to_newick(label)], &format!("{}.nwk", prefix))?;
    info!("wrote dendrogram of {} nodes to {}.*", tree.len(), prefix);
    Ok(())
}
