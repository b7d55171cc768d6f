use std::collections::{HashMap, HashSet};

use cci_paths::{AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredSystemPathBuf};
use petgraph::{graph::{DiGraph, NodeIndex}, Direction};

use crate::{
    archive::{dir_cache::CachedDirTree, restore_symlink},
    CacheError,
};

/// Second pass of the symlink restorer. Builds a graph with an edge from
/// every deferred symlink's own canonical name to its canonical target,
/// fails the whole restore on a cycle, then walks the graph depth-first
/// from its roots (vertices nothing points at) in post-order, so a
/// dependency is always created before the link that depends on it.
pub(crate) fn restore_deferred(
    anchor: &AbsoluteSystemPath,
    dir_cache: &mut CachedDirTree,
    deferred: Vec<tar::Header>,
) -> Result<Vec<AnchoredSystemPathBuf>, CacheError> {
    let mut graph: DiGraph<AbsoluteSystemPathBuf, ()> = DiGraph::new();
    let mut nodes: HashMap<AbsoluteSystemPathBuf, NodeIndex> = HashMap::new();
    let mut headers: HashMap<AbsoluteSystemPathBuf, tar::Header> = HashMap::new();
    let mut first_seen: Vec<AbsoluteSystemPathBuf> = Vec::new();

    for header in &deferred {
        let name = crate::name_validate::canonicalize_name(header)?;
        let source_key = restore_symlink::canonical_entry_path(anchor, &name);
        let raw_target = header.link_name_bytes().map(|c| c.into_owned()).unwrap_or_default();
        let target_key = restore_symlink::canonicalize_linkname(anchor, &name, &raw_target);

        if !nodes.contains_key(&source_key) {
            first_seen.push(source_key.clone());
        }
        let source_idx = node_for(&mut graph, &mut nodes, source_key.clone());
        let target_idx = node_for(&mut graph, &mut nodes, target_key);
        graph.add_edge(source_idx, target_idx, ());

        // Last deferred entry with this source name wins (clobber rule).
        headers.insert(source_key, header.clone());
    }

    if petgraph::algo::toposort(&graph, None).is_err() {
        tracing::debug!("cycle detected among deferred symlinks");
        return Err(CacheError::CycleDetected);
    }

    let roots: Vec<NodeIndex> = first_seen
        .iter()
        .map(|key| nodes[key])
        .filter(|idx| graph.neighbors_directed(*idx, Direction::Incoming).count() == 0)
        .collect();

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut order: Vec<NodeIndex> = Vec::new();
    for root in roots {
        postorder(&graph, root, &mut visited, &mut order);
    }

    let mut restored = Vec::new();
    for idx in order {
        let key = &graph[idx];
        if let Some(header) = headers.get(key) {
            let name = restore_symlink::restore_symlink_allow_missing_target(anchor, dir_cache, header)?;
            restored.push(name);
        }
    }
    Ok(restored)
}

fn node_for(
    graph: &mut DiGraph<AbsoluteSystemPathBuf, ()>,
    nodes: &mut HashMap<AbsoluteSystemPathBuf, NodeIndex>,
    key: AbsoluteSystemPathBuf,
) -> NodeIndex {
    if let Some(&idx) = nodes.get(&key) {
        idx
    } else {
        let idx = graph.add_node(key.clone());
        nodes.insert(key, idx);
        idx
    }
}

/// Dependencies are emitted before the link that depends on them: a node
/// is pushed only after every node it points to has already been
/// visited.
fn postorder(
    graph: &DiGraph<AbsoluteSystemPathBuf, ()>,
    node: NodeIndex,
    visited: &mut HashSet<NodeIndex>,
    order: &mut Vec<NodeIndex>,
) {
    if !visited.insert(node) {
        return;
    }
    for neighbor in graph.neighbors(node) {
        postorder(graph, neighbor, visited, order);
    }
    order.push(node);
}
