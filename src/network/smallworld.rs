//! Small-world coefficient omega
//!
//! `omega = L_rand / L - C / C_latt` where `L` is the unweighted average
//! shortest-path length, `C` the average clustering coefficient, and the
//! reference values are averaged over `nrand` degree-preserving random and
//! lattice rewirings of the input. Values near 0 indicate small-world
//! structure, negative values lattice-like and positive values random-like
//! graphs. Edge weights are ignored.

use super::SmallWorldConfig;
use crate::structs::{ConcordError, Graph, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// Unweighted simple-graph view used for rewiring
#[derive(Debug, Clone)]
struct Topology {
    adj: Vec<BTreeSet<usize>>,
}

impl Topology {
    fn from_graph(graph: &Graph) -> Self {
        let adj = (0..graph.node_count())
            .map(|node| {
                graph
                    .neighbors(node)
                    .iter()
                    .map(|&(next, _)| next)
                    .filter(|&next| next != node)
                    .collect()
            })
            .collect();
        Self { adj }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    fn edge_count(&self) -> usize {
        self.adj.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adj[a].contains(&b)
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        self.adj[a].insert(b);
        self.adj[b].insert(a);
    }

    fn remove_edge(&mut self, a: usize, b: usize) {
        self.adj[a].remove(&b);
        self.adj[b].remove(&a);
    }

    /// Replace a-b and c-d with a-d and c-b
    fn swap(&mut self, a: usize, b: usize, c: usize, d: usize) {
        self.add_edge(a, d);
        self.add_edge(c, b);
        self.remove_edge(a, b);
        self.remove_edge(c, d);
    }

    fn pick_neighbour(&self, node: usize, rng: &mut StdRng) -> Option<usize> {
        let k = self.adj[node].len();
        if k == 0 {
            return None;
        }
        self.adj[node].iter().nth(rng.gen_range(0..k)).copied()
    }

    fn distances(&self, source: usize) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.len()];
        let mut queue = VecDeque::from([source]);
        dist[source] = Some(0);
        while let Some(node) = queue.pop_front() {
            let next_dist = dist[node].map(|d| d + 1);
            for &next in &self.adj[node] {
                if dist[next].is_none() {
                    dist[next] = next_dist;
                    queue.push_back(next);
                }
            }
        }
        dist
    }

    fn reachable(&self, from: usize, to: usize) -> bool {
        self.distances(from)[to].is_some()
    }

    fn is_connected(&self) -> bool {
        self.len() > 0 && self.distances(0).iter().all(Option::is_some)
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_path_length(&self) -> Result<f64> {
        let n = self.len();
        let mut total = 0usize;
        for source in 0..n {
            for d in self.distances(source) {
                total += d.ok_or_else(|| {
                    ConcordError::Computation("smallworldness: graph is not connected".into())
                })?;
            }
        }
        Ok(total as f64 / (n * (n - 1)) as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_clustering(&self) -> f64 {
        let n = self.len();
        let total: f64 = (0..n)
            .map(|node| {
                let neighbours: Vec<usize> = self.adj[node].iter().copied().collect();
                let k = neighbours.len();
                if k < 2 {
                    return 0.0;
                }
                let mut links = 0usize;
                for (i, &u) in neighbours.iter().enumerate() {
                    links += neighbours[i + 1..]
                        .iter()
                        .filter(|&&v| self.has_edge(u, v))
                        .count();
                }
                2.0 * links as f64 / (k * (k - 1)) as f64
            })
            .sum();
        total / n as f64
    }
}

#[derive(Debug, Clone, Copy)]
enum Reference {
    Random,
    Lattice,
}

/// Distance between two nodes placed on a ring
const fn ring_distance(i: usize, j: usize, n: usize) -> usize {
    let d = i.abs_diff(j);
    if d < n - d {
        d
    } else {
        n - d
    }
}

/// Degree-preserving double-edge swaps that keep the graph connected
///
/// Endpoint pairs are drawn proportionally to degree. The lattice variant
/// only accepts swaps that do not move edges further from the ring diagonal.
fn rewire(
    topology: &Topology,
    niter: usize,
    kind: Reference,
    rng: &mut StdRng,
) -> Result<Topology> {
    let mut g = topology.clone();
    let n = g.len();
    let edges = g.edge_count();

    let degrees: Vec<usize> = g.adj.iter().map(BTreeSet::len).collect();
    let sampler = WeightedIndex::new(&degrees).map_err(|e| {
        ConcordError::Computation(format!("smallworldness: cannot sample nodes: {e}"))
    })?;

    // edges / possible pairs, scaled to the node count
    let attempts = (2 * edges / (n - 1)).max(1);

    for _ in 0..niter * edges {
        for _ in 0..attempts {
            let a = sampler.sample(rng);
            let c = sampler.sample(rng);
            if a == c {
                continue;
            }
            let (Some(b), Some(d)) = (g.pick_neighbour(a, rng), g.pick_neighbour(c, rng)) else {
                continue;
            };
            if b == c || b == d || d == a || g.has_edge(a, d) || g.has_edge(c, b) {
                continue;
            }

            let accept = match kind {
                Reference::Random => true,
                Reference::Lattice => {
                    ring_distance(a, b, n) + ring_distance(c, d, n)
                        >= ring_distance(a, d, n) + ring_distance(c, b, n)
                }
            };
            if !accept {
                continue;
            }

            g.swap(a, b, c, d);
            if g.reachable(a, b) && g.reachable(c, d) {
                break;
            }
            g.swap(a, d, c, b);
        }
    }

    Ok(g)
}

/// Small-world coefficient omega of `graph`
///
/// # Errors
/// `Computation` if the graph has fewer than four nodes, fewer than two
/// edges, is disconnected, or every lattice reference has zero clustering;
/// `Config` if `nrand` or `niter` is zero
#[allow(clippy::cast_precision_loss)]
pub fn omega(graph: &Graph, config: &SmallWorldConfig, rng: &mut StdRng) -> Result<f64> {
    if config.nrand == 0 || config.niter == 0 {
        return Err(ConcordError::Config(
            "smallworldness: niter and nrand must be at least 1".into(),
        ));
    }

    let topology = Topology::from_graph(graph);
    if topology.len() < 4 {
        return Err(ConcordError::Computation(
            "smallworldness: graph has fewer than four nodes".into(),
        ));
    }
    if topology.edge_count() < 2 {
        return Err(ConcordError::Computation(
            "smallworldness: graph has fewer than two edges".into(),
        ));
    }
    if !topology.is_connected() {
        return Err(ConcordError::Computation(
            "smallworldness: graph is not connected".into(),
        ));
    }

    let mut random_lengths = Vec::with_capacity(config.nrand);
    let mut lattice_clustering = Vec::with_capacity(config.nrand);
    for _ in 0..config.nrand {
        let random = rewire(&topology, config.niter, Reference::Random, rng)?;
        random_lengths.push(random.average_path_length()?);
        let lattice = rewire(&topology, config.niter, Reference::Lattice, rng)?;
        lattice_clustering.push(lattice.average_clustering());
    }

    let lr = random_lengths.iter().sum::<f64>() / config.nrand as f64;
    let cl = lattice_clustering.iter().sum::<f64>() / config.nrand as f64;
    if cl <= 0.0 {
        return Err(ConcordError::Computation(
            "smallworldness: lattice references have zero clustering".into(),
        ));
    }

    let l = topology.average_path_length()?;
    let c = topology.average_clustering();
    debug!(l, c, lr, cl, "small-world references computed");

    Ok(lr / l - c / cl)
}
