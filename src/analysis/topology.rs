use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Performs a Topological Sort using Depth-First Search (DFS).
///
/// `parents[i]` lists the equations that must run before equation `i`, sorted
/// ascending. Roots are visited in insertion order and parents in index order,
/// so ties always resolve to insertion order and the result is deterministic.
///
/// On a cycle, returns the members of the strongly connected component that
/// contains the first back edge found, ascending.
pub fn sort(parents: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let count = parents.len();
    let mut order = Vec::with_capacity(count);
    let mut state = vec![VisitState::None; count];

    for i in 0..count {
        if state[i] == VisitState::None {
            if let Err(node) = visit(i, parents, &mut state, &mut order) {
                return Err(cycle_members(parents, node));
            }
        }
    }

    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

fn visit(
    node: usize,
    parents: &[Vec<usize>],
    state: &mut [VisitState],
    order: &mut Vec<usize>,
) -> Result<(), usize> {
    match state[node] {
        VisitState::Visited => return Ok(()),
        VisitState::Visiting => return Err(node),
        VisitState::None => state[node] = VisitState::Visiting,
    }

    for &parent in &parents[node] {
        visit(parent, parents, state, order)?;
    }

    state[node] = VisitState::Visited;
    order.push(node);
    Ok(())
}

/// The full strongly connected component around `node`, not just the DFS path.
fn cycle_members(parents: &[Vec<usize>], node: usize) -> Vec<usize> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(parents.len(), 0);
    let ids: Vec<NodeIndex> = (0..parents.len()).map(|_| graph.add_node(())).collect();
    for (child, ps) in parents.iter().enumerate() {
        for &p in ps {
            graph.add_edge(ids[p], ids[child], ());
        }
    }

    let mut members = tarjan_scc(&graph)
        .into_iter()
        .find(|scc| scc.contains(&ids[node]))
        .map(|scc| scc.into_iter().map(|n| n.index()).collect::<Vec<_>>())
        .unwrap_or_else(|| vec![node]);
    members.sort_unstable();
    members
}

/// Length of the longest same-day dependency chain ending at each equation,
/// given a valid topological `order`.
pub fn depths(parents: &[Vec<usize>], order: &[usize]) -> Vec<usize> {
    let mut depth = vec![0; parents.len()];
    for &node in order {
        depth[node] = parents[node].iter().map(|&p| depth[p] + 1).max().unwrap_or(0);
    }
    depth
}
