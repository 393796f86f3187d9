//! Co-occurrence graph analytics for diagnostics.
//!
//! Builds an undirected petgraph view of the entity co-occurrence matrix
//! `W = MᵗM + CᵗC` and reports degree centrality and connected components.
//! Results are sorted by relevance (degree desc, size desc).

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::error::GraphError;
use crate::retrieve::propagation::cooccurrence_matrix;

use super::{EntityId, TriGraph};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Undirected weighted co-occurrence graph. Node `i` is entity `i`.
pub fn cooccurrence_graph(graph: &TriGraph) -> GraphResult<UnGraph<EntityId, f64>> {
    let w = cooccurrence_matrix(graph.sentence_entities(), graph.paragraph_entities())?;
    let mut g = UnGraph::with_capacity(graph.entity_count(), w.nnz() / 2);
    for i in 0..graph.entity_count() {
        g.add_node(EntityId(i));
    }
    // W is symmetric; keep the upper triangle so each pair is one edge.
    for (i, j, weight) in w.triplets().filter(|&(i, j, _)| i < j) {
        g.add_edge(NodeIndex::new(i), NodeIndex::new(j), weight);
    }
    Ok(g)
}

// ---------------------------------------------------------------------------
// Degree centrality
// ---------------------------------------------------------------------------

/// Degree centrality for a single entity.
#[derive(Debug, Clone)]
pub struct DegreeCentrality {
    pub entity: EntityId,
    /// Number of distinct co-occurring entities.
    pub neighbors: usize,
    /// Sum of co-occurrence weights.
    pub weighted_degree: f64,
}

/// Degree centrality for all entities. Sorted by weighted degree desc, then
/// by entity id.
pub fn degree_centrality(g: &UnGraph<EntityId, f64>) -> Vec<DegreeCentrality> {
    let mut results: Vec<DegreeCentrality> = g
        .node_indices()
        .map(|idx| {
            let mut neighbors = 0usize;
            let mut weighted_degree = 0.0f64;
            for e in g.edges(idx) {
                neighbors += 1;
                weighted_degree += *e.weight();
            }
            DegreeCentrality {
                entity: g[idx],
                neighbors,
                weighted_degree,
            }
        })
        .collect();
    results.sort_by(|a, b| {
        b.weighted_degree
            .partial_cmp(&a.weighted_degree)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    results
}

// ---------------------------------------------------------------------------
// Connected components
// ---------------------------------------------------------------------------

/// A connected component of the co-occurrence graph.
#[derive(Debug, Clone)]
pub struct ConnectedComponent {
    /// Member entities, ascending.
    pub members: Vec<EntityId>,
    pub size: usize,
}

/// Connected components. Sorted by size desc, then by smallest member.
pub fn connected_components(g: &UnGraph<EntityId, f64>) -> Vec<ConnectedComponent> {
    let mut uf = UnionFind::<usize>::new(g.node_count());
    for e in g.edge_references() {
        uf.union(e.source().index(), e.target().index());
    }

    let labels = uf.into_labeling();
    let mut groups: std::collections::BTreeMap<usize, Vec<EntityId>> = Default::default();
    for (i, root) in labels.into_iter().enumerate() {
        groups.entry(root).or_default().push(EntityId(i));
    }

    let mut components: Vec<ConnectedComponent> = groups
        .into_values()
        .map(|members| ConnectedComponent {
            size: members.len(),
            members,
        })
        .collect();
    components.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.members[0].cmp(&b.members[0])));
    components
}

/// One-line structural summary of a graph.
#[derive(Debug, Clone)]
pub struct GraphSummary {
    pub paragraphs: usize,
    pub sentences: usize,
    pub entities: usize,
    pub mentions: usize,
    pub cooccurrence_edges: usize,
    pub components: usize,
    pub isolated_entities: usize,
    /// Highest-degree entities with their labels.
    pub hubs: Vec<(String, f64)>,
}

impl std::fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "paragraphs:         {}", self.paragraphs)?;
        writeln!(f, "sentences:          {}", self.sentences)?;
        writeln!(f, "entities:           {}", self.entities)?;
        writeln!(f, "mentions:           {}", self.mentions)?;
        writeln!(f, "co-occurrence edges: {}", self.cooccurrence_edges)?;
        writeln!(f, "components:         {}", self.components)?;
        writeln!(f, "isolated entities:  {}", self.isolated_entities)?;
        for (label, degree) in &self.hubs {
            writeln!(f, "  hub {label:<30} {degree:.1}")?;
        }
        Ok(())
    }
}

/// Summarize a graph, listing the `hubs` highest-degree entities.
pub fn summarize(graph: &TriGraph, hubs: usize) -> GraphResult<GraphSummary> {
    let g = cooccurrence_graph(graph)?;
    let degrees = degree_centrality(&g);
    let components = connected_components(&g);
    Ok(GraphSummary {
        paragraphs: graph.paragraphs().len(),
        sentences: graph.sentences().len(),
        entities: graph.entity_count(),
        mentions: graph.sentence_entities().nnz(),
        cooccurrence_edges: g.edge_count(),
        components: components.len(),
        isolated_entities: degrees.iter().filter(|d| d.neighbors == 0).count(),
        hubs: degrees
            .iter()
            .take(hubs)
            .filter(|d| d.neighbors > 0)
            .map(|d| {
                let label = graph.entity_label(d.entity).unwrap_or("?").to_string();
                (label, d.weighted_degree)
            })
            .collect(),
    })
}
