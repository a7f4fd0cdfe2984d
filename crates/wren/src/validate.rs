// Validate — topology checks run before any operator exists
//
// For every node N, in declaration order:
//
//   1. N has a name and an operator type
//   2. every prev/next entry names an existing node
//   3. adjacency is symmetric (N → M implies M lists N as prev, and back)
//   4. every ancestor chain ends at an "Input" node
//   5. every descendant chain ends at an "Output" node
//
// Checks 1-3 run over the whole collection before any walk starts, so a walk
// only ever follows names that resolve. The first failure is returned as
// `Error::Graph`. Duplicate node names are rejected up front since every
// later lookup is by name.
//
// The reachability walks keep a visited set. Meeting N again on its own
// ancestor (or descendant) walk means the graph has a cycle through N.

use std::collections::{HashMap, HashSet};

use wren_core::error::{Error, Result};
use wren_core::{Node, INPUT_OPERATOR, OUTPUT_OPERATOR};

/// Which adjacency list a walk follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ancestors,
    Descendants,
}

impl Direction {
    fn links(self, node: &Node) -> &[String] {
        match self {
            Direction::Ancestors => &node.prev,
            Direction::Descendants => &node.next,
        }
    }

    fn terminal(self) -> &'static str {
        match self {
            Direction::Ancestors => INPUT_OPERATOR,
            Direction::Descendants => OUTPUT_OPERATOR,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Ancestors => "ancestor",
            Direction::Descendants => "descendant",
        }
    }
}

/// Check the node collection. Returns the first problem found.
pub fn validate(nodes: &[Node]) -> Result<()> {
    if nodes.is_empty() {
        return Err(Error::graph("net has no nodes"));
    }

    let mut index: HashMap<&str, &Node> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if !node.name.is_empty() && index.insert(node.name.as_str(), node).is_some() {
            return Err(Error::graph(format!("duplicate node name '{}'", node.name)));
        }
    }

    for node in nodes {
        check_links(node, &index)?;
    }
    for node in nodes {
        walk(node, &index, Direction::Ancestors)?;
        walk(node, &index, Direction::Descendants)?;
    }
    Ok(())
}

fn check_links(node: &Node, index: &HashMap<&str, &Node>) -> Result<()> {
    // 1. identity
    if node.name.is_empty() {
        return Err(Error::graph(format!(
            "node with operator '{}' has an empty name",
            node.operator
        )));
    }
    if node.operator.is_empty() {
        return Err(Error::graph(format!(
            "node '{}' has an empty operator type",
            node.name
        )));
    }

    // 2. neighbours exist
    for next in &node.next {
        if !index.contains_key(next.as_str()) {
            return Err(Error::graph(format!(
                "node '{}' not found next node '{}'",
                node.name, next
            )));
        }
    }
    for prev in &node.prev {
        if !index.contains_key(prev.as_str()) {
            return Err(Error::graph(format!(
                "node '{}' not found prev node '{}'",
                node.name, prev
            )));
        }
    }

    // 3. symmetry
    for next in &node.next {
        if !index[next.as_str()].prev.contains(&node.name) {
            return Err(Error::graph(format!(
                "node '{}' lists '{}' as next, but '{}' does not list it as prev",
                node.name, next, next
            )));
        }
    }
    for prev in &node.prev {
        if !index[prev.as_str()].next.contains(&node.name) {
            return Err(Error::graph(format!(
                "node '{}' lists '{}' as prev, but '{}' does not list it as next",
                node.name, prev, prev
            )));
        }
    }
    Ok(())
}

fn walk(start: &Node, index: &HashMap<&str, &Node>, dir: Direction) -> Result<()> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&Node> = vec![start];

    while let Some(node) = stack.pop() {
        let links = dir.links(node);
        if links.is_empty() {
            if node.operator != dir.terminal() {
                return Err(Error::graph(format!(
                    "node '{}': {} chain ends at '{}', which is not of type '{}'",
                    start.name,
                    dir.label(),
                    node.name,
                    dir.terminal()
                )));
            }
            continue;
        }
        for name in links {
            if name == &start.name {
                return Err(Error::graph(format!(
                    "node '{}': cycle detected through '{}'",
                    start.name, node.name
                )));
            }
            if visited.insert(name.as_str()) {
                let next = index.get(name.as_str()).ok_or_else(|| {
                    Error::graph(format!(
                        "node '{}' not found {} of '{}'",
                        name,
                        dir.label(),
                        start.name
                    ))
                })?;
                stack.push(next);
            }
        }
    }
    Ok(())
}
