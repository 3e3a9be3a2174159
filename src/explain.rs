use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node of a plan produced by `EXPLAIN (ANALYZE, FORMAT JSON)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub node_type: String,
    pub relation_name: Option<String>,
    pub estimated_cost: Option<(f64, f64)>,
    pub actual_time: Option<(f64, f64)>,
    pub estimated_rows: Option<u64>,
    pub actual_rows: Option<u64>,
    pub loops: Option<u64>,
    pub children: Vec<PlanNode>,
    pub depth: usize,
}

impl PlanNode {
    fn from_json(node: &Map<String, Value>, depth: usize) -> Option<Self> {
        let node_type = node.get("Node Type")?.as_str()?.to_string();

        let pair = |a: &str, b: &str| match (number(node, a), number(node, b)) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };

        let children = node
            .get("Plans")
            .and_then(Value::as_array)
            .map(|plans| {
                plans
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|child| PlanNode::from_json(child, depth + 1))
                    .collect()
            })
            .unwrap_or_default();

        Some(PlanNode {
            node_type,
            relation_name: node
                .get("Relation Name")
                .and_then(Value::as_str)
                .map(str::to_string),
            estimated_cost: pair("Startup Cost", "Total Cost"),
            actual_time: pair("Actual Startup Time", "Actual Total Time"),
            estimated_rows: node.get("Plan Rows").and_then(Value::as_u64),
            actual_rows: node.get("Actual Rows").and_then(Value::as_u64),
            loops: node.get("Actual Loops").and_then(Value::as_u64),
            children,
            depth,
        })
    }

    /// Number of nodes in the subtree rooted here.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }

    pub fn label(&self) -> String {
        match &self.relation_name {
            Some(rel) => format!("{} on {}", self.node_type, rel),
            None => self.node_type.clone(),
        }
    }
}

/// The structured output of a single measurement run.
///
/// Holds the JSON document exactly as PostgreSQL returned it; serializing a
/// record reproduces that document unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanRecord(Value);

impl PlanRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// The top-level object: `FORMAT JSON` wraps it in a one-element array.
    fn document(&self) -> Option<&Map<String, Value>> {
        match &self.0 {
            Value::Array(items) => items.first()?.as_object(),
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Total execution time in milliseconds.
    pub fn execution_time(&self) -> Option<f64> {
        self.document().and_then(|doc| number(doc, "Execution Time"))
    }

    /// Planning time in milliseconds.
    pub fn planning_time(&self) -> Option<f64> {
        self.document().and_then(|doc| number(doc, "Planning Time"))
    }

    pub fn plan(&self) -> Option<PlanNode> {
        let root = self.document()?.get("Plan")?.as_object()?;
        PlanNode::from_json(root, 0)
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

pub fn format_duration_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.2}ms", ms)
    }
}
