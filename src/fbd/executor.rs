//! One-cycle diagram evaluation.
//!
//! The executor decodes a program's diagram into an index arena, orders it
//! with Kahn's algorithm, and evaluates each block once. A cyclic diagram
//! degrades rather than fails: acyclic blocks evaluate in order, cycle
//! members run last against whatever their upstreams have produced so far,
//! and a warning is logged.

use super::blocks::{BlockCtx, eval_block};
use super::diagram::Diagram;
use super::graph::topo_order;
use crate::coerce::{json_bool, json_f64};
use crate::error::DiagramError;
use crate::model::FbdProgram;
use log::warn;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Everything one cycle of one program produced.
pub struct CycleOutcome {
    /// Node id → output vector, in diagram node order. Every vector has the
    /// node's declared `outputs` width.
    pub node_values: Vec<(String, Vec<Value>)>,
    /// Point writes requested by DIGITAL_OUT / ANALOG_OUT blocks. The
    /// scheduler applies these; the executor never touches the store.
    pub writes: Vec<(i64, Value)>,
    /// True when the diagram contained a cycle (best-effort pass ran).
    pub cyclic: bool,
}

/// A decoded, ready-to-run program.
pub struct FbdExecutor {
    name: String,
    diagram: Diagram,
    bindings: HashMap<String, i64>,
}

impl FbdExecutor {
    /// Decode the program's stored diagram. Fails only on malformed JSON.
    pub fn new(program: &FbdProgram) -> Result<Self, DiagramError> {
        Ok(Self {
            name: program.name.clone(),
            diagram: Diagram::decode(&program.diagram_json)?,
            bindings: program.bindings.clone(),
        })
    }

    /// Run one cycle. `read_point` supplies the current value of a bound
    /// point for the input blocks.
    pub fn execute_cycle(&self, read_point: impl Fn(i64) -> Option<Value>) -> CycleOutcome {
        let nodes = &self.diagram.nodes;
        let index_of: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        // Resolve edges to the arena; dangling endpoints are dropped.
        let mut arena_edges = Vec::with_capacity(self.diagram.edges.len());
        let mut in_edges: Vec<Vec<(usize, usize, usize)>> = vec![Vec::new(); nodes.len()];
        for edge in &self.diagram.edges {
            let (Some(&from), Some(&to)) = (
                index_of.get(edge.from_node.as_str()),
                index_of.get(edge.to_node.as_str()),
            ) else {
                warn!(
                    "fbd {}: edge references unknown node ({} → {})",
                    self.name, edge.from_node, edge.to_node
                );
                continue;
            };
            arena_edges.push((from, to));
            in_edges[to].push((edge.to_port, from, edge.from_port));
        }

        let ordering = topo_order(nodes.len(), &arena_edges);
        if ordering.cyclic {
            warn!("fbd {}: cycle detected, evaluating best-effort", self.name);
        }

        let mut outputs: Vec<Option<Vec<Value>>> = vec![None; nodes.len()];
        let mut writes = Vec::new();

        for &idx in &ordering.order {
            let node = &nodes[idx];

            // Fixed-width input vector; unconnected ports stay null.
            let mut inputs = vec![Value::Null; node.inputs];
            for &(to_port, from, from_port) in &in_edges[idx] {
                if to_port >= inputs.len() {
                    continue;
                }
                if let Some(upstream) = &outputs[from] {
                    inputs[to_port] = upstream.get(from_port).cloned().unwrap_or(Value::Null);
                }
            }

            // Bindings usually live on the program; editors may also stamp
            // `pointId` into the block's params.
            let bound_point = self
                .bindings
                .get(&node.id)
                .copied()
                .or_else(|| node.params.get("pointId").and_then(Value::as_i64));
            let ctx = BlockCtx {
                params: &node.params,
                bound_value: bound_point.and_then(&read_point),
            };
            let values = match eval_block(&node.block_type, &inputs, node.outputs, &ctx) {
                Ok(values) => values,
                Err(unknown) => {
                    warn!("fbd {}: unknown block type {} ({})", self.name, unknown.0, node.id);
                    vec![Value::Null; node.outputs]
                }
            };

            // Output blocks request a point write, typed by block family.
            if let Some(point_id) = bound_point {
                match node.block_type.as_str() {
                    "DIGITAL_OUT" => writes.push((point_id, json!(json_bool(&inputs_first(&inputs))))),
                    "ANALOG_OUT" => writes.push((point_id, json!(json_f64(&inputs_first(&inputs))))),
                    _ => {}
                }
            }

            outputs[idx] = Some(values);
        }

        let node_values = nodes
            .iter()
            .zip(outputs)
            .map(|(node, values)| {
                (node.id.clone(), values.unwrap_or_else(|| vec![Value::Null; node.outputs]))
            })
            .collect();

        CycleOutcome { node_values, writes, cyclic: ordering.cyclic }
    }
}

fn inputs_first(inputs: &[Value]) -> Value {
    inputs.first().cloned().unwrap_or(Value::Null)
}

/// Flatten per-node output vectors into the persisted
/// `"<id>_out_<port>"` map.
pub fn flatten_values(node_values: &[(String, Vec<Value>)]) -> Map<String, Value> {
    let mut flat = Map::new();
    for (id, values) in node_values {
        for (port, value) in values.iter().enumerate() {
            flat.insert(format!("{id}_out_{port}"), value.clone());
        }
    }
    flat
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn program_from(diagram: Value, bindings: &[(&str, i64)]) -> FbdProgram {
        let mut program = FbdProgram::named(1, "test");
        program.diagram_json = diagram;
        program.bindings = bindings
            .iter()
            .map(|(id, point)| ((*id).to_string(), *point))
            .collect();
        program
    }

    fn no_points(_: i64) -> Option<Value> {
        None
    }

    #[test]
    fn const_gates_three_inputs() {
        // Scenario S3: true/true/false into a 3-input AND and XOR.
        let diagram = json!({
            "nodes": [
                {"id": "A", "type": "CONST_DIG", "inputs": 0, "outputs": 1, "params": {"value": true}},
                {"id": "B", "type": "CONST_DIG", "inputs": 0, "outputs": 1, "params": {"value": true}},
                {"id": "C", "type": "CONST_DIG", "inputs": 0, "outputs": 1, "params": {"value": false}},
                {"id": "AND3", "type": "AND", "inputs": 3, "outputs": 1, "params": {}},
                {"id": "XOR3", "type": "XOR", "inputs": 3, "outputs": 1, "params": {}}
            ],
            "edges": [
                {"fromNode": "A", "fromPort": 0, "toNode": "AND3", "toPort": 0},
                {"fromNode": "B", "fromPort": 0, "toNode": "AND3", "toPort": 1},
                {"fromNode": "C", "fromPort": 0, "toNode": "AND3", "toPort": 2},
                {"fromNode": "A", "fromPort": 0, "toNode": "XOR3", "toPort": 0},
                {"fromNode": "B", "fromPort": 0, "toNode": "XOR3", "toPort": 1},
                {"fromNode": "C", "fromPort": 0, "toNode": "XOR3", "toPort": 2}
            ]
        });
        let executor = FbdExecutor::new(&program_from(diagram, &[])).unwrap();
        let outcome = executor.execute_cycle(no_points);

        let flat = flatten_values(&outcome.node_values);
        assert_eq!(flat["AND3_out_0"], json!(false));
        assert_eq!(flat["XOR3_out_0"], json!(false));
        assert!(!outcome.cyclic);
        assert!(outcome.writes.is_empty());
    }

    #[test]
    fn io_blocks_read_and_write_points() {
        let diagram = json!({
            "nodes": [
                {"id": "in", "type": "ANALOG_IN", "inputs": 0, "outputs": 1, "params": {}},
                {"id": "dbl", "type": "MUL", "inputs": 2, "outputs": 1, "params": {}},
                {"id": "two", "type": "CONST_ANA", "inputs": 0, "outputs": 1, "params": {"value": 2}},
                {"id": "out", "type": "ANALOG_OUT", "inputs": 1, "outputs": 1, "params": {}}
            ],
            "edges": [
                {"fromNode": "in", "fromPort": 0, "toNode": "dbl", "toPort": 0},
                {"fromNode": "two", "fromPort": 0, "toNode": "dbl", "toPort": 1},
                {"fromNode": "dbl", "fromPort": 0, "toNode": "out", "toPort": 0}
            ]
        });
        let program = program_from(diagram, &[("in", 10), ("out", 20)]);
        let executor = FbdExecutor::new(&program).unwrap();
        let outcome = executor.execute_cycle(|id| (id == 10).then(|| json!(21.5)));

        assert_eq!(outcome.writes, vec![(20, json!(43.0))]);
        let flat = flatten_values(&outcome.node_values);
        assert_eq!(flat["dbl_out_0"], json!(43.0));
    }

    #[test]
    fn cyclic_diagram_degrades_gracefully() {
        // Scenario S6: two NOT gates feeding each other.
        let diagram = json!({
            "nodes": [
                {"id": "N1", "type": "NOT", "inputs": 1, "outputs": 1, "params": {}},
                {"id": "N2", "type": "NOT", "inputs": 1, "outputs": 1, "params": {}}
            ],
            "edges": [
                {"fromNode": "N1", "fromPort": 0, "toNode": "N2", "toPort": 0},
                {"fromNode": "N2", "fromPort": 0, "toNode": "N1", "toPort": 0}
            ]
        });
        let executor = FbdExecutor::new(&program_from(diagram, &[])).unwrap();
        let outcome = executor.execute_cycle(no_points);

        assert!(outcome.cyclic);
        assert_eq!(outcome.node_values.len(), 2);
        for (_, values) in &outcome.node_values {
            assert_eq!(values.len(), 1);
        }
        // Deterministic across runs.
        let again = executor.execute_cycle(no_points);
        assert_eq!(
            flatten_values(&outcome.node_values),
            flatten_values(&again.node_values)
        );
    }

    #[test]
    fn empty_diagram_yields_no_values() {
        let executor = FbdExecutor::new(&program_from(json!({"nodes": [], "edges": []}), &[]))
            .unwrap();
        let outcome = executor.execute_cycle(no_points);
        assert!(outcome.node_values.is_empty());
        assert!(outcome.writes.is_empty());
        assert!(flatten_values(&outcome.node_values).is_empty());
    }

    #[test]
    fn unknown_block_nulls_its_vector() {
        let diagram = json!({
            "nodes": [{"id": "x", "type": "WIBBLE", "inputs": 1, "outputs": 2, "params": {}}],
            "edges": []
        });
        let executor = FbdExecutor::new(&program_from(diagram, &[])).unwrap();
        let outcome = executor.execute_cycle(no_points);
        assert_eq!(outcome.node_values[0].1, vec![Value::Null, Value::Null]);
    }

    #[test]
    fn params_point_id_binds_when_program_bindings_are_absent() {
        let diagram = json!({
            "nodes": [
                {"id": "in", "type": "ANALOG_IN", "inputs": 0, "outputs": 1, "params": {"pointId": 7}}
            ],
            "edges": []
        });
        let executor = FbdExecutor::new(&program_from(diagram, &[])).unwrap();
        let outcome = executor.execute_cycle(|id| (id == 7).then(|| json!(3.25)));
        assert_eq!(outcome.node_values[0].1, vec![json!(3.25)]);
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let diagram = json!({
            "nodes": [{"id": "g", "type": "OR", "inputs": 2, "outputs": 1, "params": {}}],
            "edges": [{"fromNode": "ghost", "fromPort": 0, "toNode": "g", "toPort": 0}]
        });
        let executor = FbdExecutor::new(&program_from(diagram, &[])).unwrap();
        let outcome = executor.execute_cycle(no_points);
        assert_eq!(outcome.node_values[0].1, vec![json!(false)]);
    }
}
