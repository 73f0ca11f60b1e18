use fnv::FnvHashMap as HashMap;
use link_bits::collaborators::{Experiment, Gene, InMemoryCatalog, InMemoryOntology};
use link_bits::{mask, LinkMatrix};
use link_cluster::output::{write_clusters, write_dendrogram};
use link_cluster::select::largest_clusters;
use link_cluster::{cluster_links, collect_leaves, ClusterConfig, FrequentLinkSetFinder, Leaf, LinkGraphClustering};
use matrix_util::common_io::{create_temp_dir_file, read_lines, remove_file};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ─── Fixtures ───────────────────────────────────────────────────────────────

const EXPERIMENTS: [i64; 8] = [100, 101, 102, 103, 104, 105, 106, 107];

/// Genes 1, 2, 3 link to each other in experiments 100..=104; genes
/// 4, 5, 6 form a chain in 104..=107
fn link_matrix() -> anyhow::Result<LinkMatrix> {
    let genes: Vec<i64> = (1..=6).collect();
    let mut m = LinkMatrix::init(&genes, &genes, &EXPERIMENTS)?;
    let pairs: [(i64, i64, &[i64]); 5] = [
        (1, 2, &[100, 101, 102, 103, 104, 105]),
        (1, 3, &[100, 101, 102, 103, 104]),
        (2, 3, &[100, 101, 102, 103, 107]),
        (4, 5, &[104, 105, 106, 107]),
        (5, 6, &[105, 106, 107]),
    ];
    for (a, b, ees) in pairs {
        let mut partners: HashMap<i64, Vec<i64>> = HashMap::default();
        partners.insert(b, ees.to_vec());
        m.count(a, &partners)?;
    }
    Ok(m)
}

fn gene_pairs(m: &LinkMatrix, ids: &[u64]) -> Vec<(i64, i64)> {
    let mut ret: Vec<(i64, i64)> = ids.iter().map(|&id| m.paired_genes(id)).collect();
    ret.sort();
    ret
}

fn temp_file(suffix: &str) -> anyhow::Result<String> {
    Ok(create_temp_dir_file(suffix)?
        .to_str()
        .ok_or(anyhow::anyhow!("temp path"))?
        .to_string())
}

// ─── Agglomeration ──────────────────────────────────────────────────────────

#[test]
fn agglomeration_finds_the_triangle() -> anyhow::Result<()> {
    let m = link_matrix()?;
    let config = ClusterConfig {
        stringency: 2,
        ..Default::default()
    };
    let leaves = collect_leaves(&m, config.stringency);
    assert_eq!(leaves.len(), 5);

    let tree = cluster_links(&leaves, &config)?;
    // two merges: (1,2)+(1,3) over 5 bits, then +(2,3) over 4 bits
    assert_eq!(tree.len(), 7);

    let clusters = largest_clusters(&tree, 5, 2);
    assert_eq!(clusters.len(), 1);
    assert_eq!(gene_pairs(&m, &clusters[0].link_ids), vec![(1, 2), (1, 3), (2, 3)]);
    assert_eq!(clusters[0].support, 4);
    assert_eq!(m.decode_experiments(&clusters[0].mask), vec![100, 101, 102, 103]);
    Ok(())
}

#[test]
fn agglomeration_always_terminates() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(17);
    for trial in 0..5 {
        let leaves: Vec<Leaf> = (0..40)
            .map(|i| {
                let bits: Vec<usize> = (0..64).filter(|_| rng.random_bool(0.3)).collect();
                Leaf {
                    id: i,
                    mask: mask::from_bits(64, &bits),
                }
            })
            .collect();
        let num_leaves = leaves.iter().filter(|l| l.bits() > 0).count();
        let config = ClusterConfig {
            stringency: 1,
            merge_threshold: Some(1 + trial),
            ..Default::default()
        };
        let mut c = LinkGraphClustering::new(&leaves, &config)?;
        let mut before = c.num_eligible();
        while let Some(p) = c.merge_once() {
            assert_eq!(c.num_eligible(), before - 1);
            before = c.num_eligible();
            let node = c.tree().node(p);
            assert_eq!(node.children.len(), 2);
            assert_ne!(node.children[0], node.children[1]);
            for &ch in node.children.iter() {
                assert!(node.bits <= c.tree().node(ch).bits);
            }
        }
        assert!(c.num_merges() < num_leaves);
    }
    Ok(())
}

// ─── Top-down mining ────────────────────────────────────────────────────────

#[test]
fn frequent_sets_from_the_matrix() -> anyhow::Result<()> {
    let m = link_matrix()?;
    let config = ClusterConfig {
        stringency: 3,
        min_links: 2,
        ..Default::default()
    };
    let leaves = collect_leaves(&m, config.stringency);
    let sets = FrequentLinkSetFinder::new(&config).find(&leaves)?;

    assert_eq!(sets.len(), 2);
    assert_eq!(gene_pairs(&m, &sets[0].link_ids), vec![(1, 2), (1, 3), (2, 3)]);
    assert_eq!(sets[0].support, 4);
    assert_eq!(gene_pairs(&m, &sets[1].link_ids), vec![(4, 5), (5, 6)]);
    assert_eq!(sets[1].support, 3);
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────────────

#[test]
fn clusters_and_dendrogram_are_written() -> anyhow::Result<()> {
    let m = link_matrix()?;
    let config = ClusterConfig {
        stringency: 2,
        ..Default::default()
    };
    let leaves = collect_leaves(&m, config.stringency);
    let tree = cluster_links(&leaves, &config)?;
    let clusters = largest_clusters(&tree, 5, 2);

    let genes = (1..=6)
        .map(|g| Gene {
            id: g,
            name: format!("G{}", g).into_boxed_str(),
        })
        .collect();
    let experiments = EXPERIMENTS
        .iter()
        .map(|&e| Experiment {
            id: e,
            short_name: format!("GSE{}", e).into_boxed_str(),
        })
        .collect();
    let catalog = InMemoryCatalog::new(genes, experiments);
    let mut ontology = InMemoryOntology::default();
    for g in 1..=3 {
        ontology.add(g, "GO:0006412");
    }

    let file = temp_file(".clusters.tsv")?;
    write_clusters(&file, &clusters, &m, &catalog, &catalog, Some(&ontology), 3)?;
    let lines = read_lines(&file)?;
    assert_eq!(lines.len(), 2);
    let fields: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(fields[1], "3");
    assert_eq!(fields[2], "4");
    assert!(fields[3].contains("G1-G2"));
    assert_eq!(fields[4], "GSE100,GSE101,GSE102,GSE103");
    assert_eq!(fields[5], "GO:0006412:3");
    remove_file(&file)?;

    let prefix = temp_file("")?;
    write_dendrogram(&tree, &m, &catalog, &prefix)?;
    let gtr = read_lines(&format!("{}.gtr", prefix))?;
    assert_eq!(gtr.len(), 2);
    assert!(gtr[0].starts_with("NODE1X\tGENE"));
    let order = read_lines(&format!("{}.order.tsv", prefix))?;
    assert_eq!(order.len(), 5);
    let newick = read_lines(&format!("{}.nwk", prefix))?;
    assert!(newick[0].ends_with(';'));
    Ok(())
}
