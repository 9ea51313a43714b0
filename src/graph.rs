//! Arena of untransformed objects used to nest relationships.
//!
//! Every untransformed resource becomes a node keyed by its JSON:API
//! `(type, id)`. Relationship placeholders become edges. Nesting replaces
//! each placeholder with the node it points at; cycle elimination cuts the
//! edges that close a cycle, leaving a `{ id }` stub in their slot.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::UntransformError;

/// Untransformed objects grouped by resource type.
pub type Buckets = BTreeMap<String, Vec<Value>>;

/// Reference from a relationship slot to a related resource.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub resource_type: String,
    pub resource_id: String,
}

/// One relationship slot on a node's object.
#[derive(Debug)]
struct Edge {
    property: String,
    /// Position in a to-many array; `None` for a to-one slot.
    position: Option<usize>,
    target: Target,
    node: Option<usize>,
    cut: bool,
}

#[derive(Debug)]
struct Node {
    resource_type: String,
    resource_id: Option<String>,
    /// `{ id, ...attributes }` with `{ id }` placeholders for relationships.
    object: Map<String, Value>,
    edges: Vec<Edge>,
}

/// Builder for a node: the output object plus its relationship slots.
#[derive(Debug)]
pub(crate) struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn new(
        resource_type: &str,
        resource_id: Option<&str>,
        object: Map<String, Value>,
    ) -> Self {
        Self {
            node: Node {
                resource_type: resource_type.to_string(),
                resource_id: resource_id.map(String::from),
                object,
                edges: Vec::new(),
            },
        }
    }

    /// Set a to-one relationship to a placeholder pointing at `target`.
    pub fn relate_one(&mut self, property: &str, placeholder: Value, target: Target) {
        self.node.object.insert(property.to_string(), placeholder);
        self.node.edges.push(Edge {
            property: property.to_string(),
            position: None,
            target,
            node: None,
            cut: false,
        });
    }

    /// Set a to-many relationship, one placeholder per target, order kept.
    pub fn relate_many(&mut self, property: &str, slots: Vec<(Value, Target)>) {
        let mut placeholders = Vec::with_capacity(slots.len());
        for (position, (placeholder, target)) in slots.into_iter().enumerate() {
            placeholders.push(placeholder);
            self.node.edges.push(Edge {
                property: property.to_string(),
                position: Some(position),
                target,
                node: None,
                cut: false,
            });
        }
        self.node
            .object
            .insert(property.to_string(), Value::Array(placeholders));
    }

    /// Set an explicitly empty to-one relationship.
    pub fn relate_none(&mut self, property: &str) {
        self.node.object.insert(property.to_string(), Value::Null);
    }
}

/// All untransformed objects of one document, in document order.
#[derive(Debug, Default)]
pub(crate) struct ResourceGraph {
    nodes: Vec<Node>,
    /// Number of leading nodes that came from primary data.
    primary: usize,
    index: HashMap<(String, String), usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node from primary data. Must be called before any included node.
    pub fn push_primary(&mut self, builder: NodeBuilder) {
        debug_assert_eq!(self.primary, self.nodes.len());
        self.push(builder);
        self.primary += 1;
    }

    pub fn push_included(&mut self, builder: NodeBuilder) {
        self.push(builder);
    }

    fn push(&mut self, builder: NodeBuilder) {
        let node = builder.node;
        if let Some(id) = &node.resource_id {
            // first occurrence wins when a resource appears twice
            self.index
                .entry((node.resource_type.clone(), id.clone()))
                .or_insert(self.nodes.len());
        }
        self.nodes.push(node);
    }

    /// Flatten into buckets, optionally nesting and cutting cycles.
    ///
    /// # Errors
    ///
    /// Returns `UntransformError::CircularReference` when nesting a cyclic
    /// graph without cycle removal.
    pub fn into_buckets(
        mut self,
        nest: bool,
        remove_circular: bool,
    ) -> Result<Buckets, UntransformError> {
        let mut buckets = Buckets::new();

        if !nest {
            for node in self.nodes {
                buckets
                    .entry(node.resource_type)
                    .or_default()
                    .push(Value::Object(node.object));
            }
            return Ok(buckets);
        }

        self.link();
        if remove_circular {
            self.eliminate_cycles();
        }

        let mut memo: Vec<Option<Value>> = vec![None; self.nodes.len()];
        let mut on_path = vec![false; self.nodes.len()];
        for i in 0..self.nodes.len() {
            let object = self.materialize(i, &mut memo, &mut on_path)?;
            buckets
                .entry(self.nodes[i].resource_type.clone())
                .or_default()
                .push(object);
        }
        Ok(buckets)
    }

    /// Resolve every edge to the node sharing its `(type, id)`, if any.
    fn link(&mut self) {
        let index = &self.index;
        for node in &mut self.nodes {
            for edge in &mut node.edges {
                let key = (
                    edge.target.resource_type.clone(),
                    edge.target.resource_id.clone(),
                );
                edge.node = index.get(&key).copied();
            }
        }
    }

    /// Depth-first cut of ancestor back-edges.
    ///
    /// Primary nodes are roots first, in document order; any node still
    /// unprocessed afterwards becomes a root of its own.
    fn eliminate_cycles(&mut self) {
        let count = self.nodes.len();
        let mut visited = vec![false; count];
        let mut processed = vec![false; count];

        for root in 0..count {
            if processed[root] {
                continue;
            }
            visited[root] = true;
            self.visit(root, &mut visited, &mut processed);
            visited[root] = false;
            processed[root] = true;
        }
    }

    fn visit(&mut self, node: usize, visited: &mut [bool], processed: &mut [bool]) {
        let mut scheduled: Vec<usize> = Vec::new();

        // neighbors are marked when scheduled, so a later sibling reached
        // from an earlier sibling's subtree is cut rather than expanded
        for edge in &mut self.nodes[node].edges {
            let Some(target) = edge.node else {
                continue;
            };
            if scheduled.contains(&target) {
                continue;
            }
            if visited[target] {
                trace!(
                    property = %edge.property,
                    resource_type = %edge.target.resource_type,
                    id = %edge.target.resource_id,
                    "cutting circular reference"
                );
                edge.cut = true;
            } else if !processed[target] {
                visited[target] = true;
                scheduled.push(target);
            }
        }

        for target in scheduled {
            self.visit(target, visited, processed);
            visited[target] = false;
            processed[target] = true;
        }
    }

    fn materialize(
        &self,
        node: usize,
        memo: &mut [Option<Value>],
        on_path: &mut [bool],
    ) -> Result<Value, UntransformError> {
        if let Some(value) = &memo[node] {
            return Ok(value.clone());
        }
        let current = &self.nodes[node];
        if on_path[node] {
            return Err(UntransformError::CircularReference {
                resource_type: current.resource_type.clone(),
                id: current.resource_id.clone().unwrap_or_default(),
            });
        }
        on_path[node] = true;

        let mut object = current.object.clone();
        for edge in &current.edges {
            let Some(target) = edge.node else {
                continue;
            };
            let value = if edge.cut {
                stub(&self.nodes[target].object)
            } else {
                self.materialize(target, memo, on_path)?
            };
            match (edge.position, object.get_mut(&edge.property)) {
                (None, Some(slot)) => *slot = value,
                (Some(position), Some(Value::Array(items))) => {
                    if let Some(slot) = items.get_mut(position) {
                        *slot = value;
                    }
                }
                _ => {}
            }
        }

        on_path[node] = false;
        let value = Value::Object(object);
        memo[node] = Some(value.clone());
        Ok(value)
    }
}

fn stub(object: &Map<String, Value>) -> Value {
    let mut stub = Map::new();
    if let Some(id) = object.get("id") {
        stub.insert("id".to_string(), id.clone());
    }
    Value::Object(stub)
}
