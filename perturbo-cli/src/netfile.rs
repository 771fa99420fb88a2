//! Parser for the line-based network definition format.
//!
//! ```text
//! # comment
//! net sioux-falls
//! node A
//! node B
//! edge AB A B lin 5.0 2.0
//! od A B 120.0
//! ```
//!
//! Cost models: `const <c>`, `lin <free> <slope>`, and
//! `bpr <free> <capacity> <alpha> <beta>`.

use std::collections::BTreeSet;
use std::io::{self, BufRead};

use thiserror::Error;

use perturbo_core::{CostFunction, Edge, Network, Node, OdMatrix, OdPair};

/// Errors surfaced while parsing a network definition file.
#[derive(Debug, Error)]
pub enum NetFileError {
    /// The underlying reader failed.
    #[error("failed to read network definition: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A line did not match the expected grammar.
    #[error("line {line}: {detail}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        detail: String,
    },
    /// An edge or demand entry referenced an undeclared node.
    #[error("line {line}: unknown node `{name}`")]
    UnknownNode {
        /// 1-based line number.
        line: usize,
        /// The undeclared node name.
        name: String,
    },
    /// A node or edge name was declared twice.
    #[error("line {line}: duplicate name `{name}`")]
    DuplicateName {
        /// 1-based line number.
        line: usize,
        /// The repeated name.
        name: String,
    },
    /// The definition declared no edges.
    #[error("network definition contains no edges")]
    Empty,
}

/// Parses a network definition from a buffered reader.
///
/// # Errors
/// Returns [`NetFileError`] with the offending line number when the
/// definition is malformed.
///
/// # Examples
/// ```
/// use perturbo_cli::netfile::parse_network;
///
/// let definition = "\
/// net demo
/// node A
/// node B
/// edge AB A B const 1.0
/// edge BA B A const 1.0
/// od A B 10.0
/// ";
/// let network = parse_network(definition.as_bytes()).expect("definition is valid");
/// assert_eq!(network.name(), "demo");
/// assert_eq!(network.node_count(), 2);
/// assert_eq!(network.edge_count(), 2);
/// assert!(network.od().contains("A", "B"));
/// ```
pub fn parse_network(reader: impl BufRead) -> Result<Network, NetFileError> {
    let mut name = "network".to_owned();
    let mut nodes: Vec<Node> = Vec::new();
    let mut node_names: BTreeSet<String> = BTreeSet::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_names: BTreeSet<String> = BTreeSet::new();
    let mut od = OdMatrix::new();

    for (position, read) in reader.lines().enumerate() {
        let line = position + 1;
        let text = read.map_err(|source| NetFileError::Read { source })?;
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let mut fields = text.split_whitespace();
        let keyword = fields.next().unwrap_or_default();
        let rest: Vec<&str> = fields.collect();
        match keyword {
            "net" => {
                let [net_name] = rest.as_slice() else {
                    return Err(syntax(line, "expected `net <name>`"));
                };
                name = (*net_name).to_owned();
            }
            "node" => {
                let [node_name] = rest.as_slice() else {
                    return Err(syntax(line, "expected `node <name>`"));
                };
                if !node_names.insert((*node_name).to_owned()) {
                    return Err(NetFileError::DuplicateName {
                        line,
                        name: (*node_name).to_owned(),
                    });
                }
                nodes.push(Node::new(*node_name));
            }
            "edge" => {
                let [edge_name, start, end, model @ ..] = rest.as_slice() else {
                    return Err(syntax(
                        line,
                        "expected `edge <name> <start> <end> <cost model>`",
                    ));
                };
                for endpoint in [*start, *end] {
                    if !node_names.contains(endpoint) {
                        return Err(NetFileError::UnknownNode {
                            line,
                            name: endpoint.to_owned(),
                        });
                    }
                }
                if !edge_names.insert((*edge_name).to_owned()) {
                    return Err(NetFileError::DuplicateName {
                        line,
                        name: (*edge_name).to_owned(),
                    });
                }
                let function = parse_cost_model(line, model)?;
                edges.push(Edge::new(*edge_name, *start, *end, function));
            }
            "od" => {
                let [origin, destination, demand] = rest.as_slice() else {
                    return Err(syntax(line, "expected `od <origin> <destination> <demand>`"));
                };
                for endpoint in [*origin, *destination] {
                    if !node_names.contains(endpoint) {
                        return Err(NetFileError::UnknownNode {
                            line,
                            name: endpoint.to_owned(),
                        });
                    }
                }
                if origin == destination {
                    return Err(syntax(line, "demand origin equals destination"));
                }
                let demand = parse_number(line, *demand, "demand")?;
                od.insert(OdPair::new(*origin, *destination), demand);
            }
            other => {
                return Err(syntax(line, &format!("unknown keyword `{other}`")));
            }
        }
    }

    if edges.is_empty() {
        return Err(NetFileError::Empty);
    }
    Ok(Network::new(name, nodes, edges, od))
}

fn parse_cost_model(line: usize, fields: &[&str]) -> Result<CostFunction, NetFileError> {
    match fields {
        ["const", cost] => Ok(CostFunction::Constant(parse_number(line, cost, "cost")?)),
        ["lin", free, slope] => Ok(CostFunction::Linear {
            free: parse_number(line, free, "free")?,
            slope: parse_number(line, slope, "slope")?,
        }),
        ["bpr", free, capacity, alpha, beta] => Ok(CostFunction::Bpr {
            free: parse_number(line, free, "free")?,
            capacity: parse_number(line, capacity, "capacity")?,
            alpha: parse_number(line, alpha, "alpha")?,
            beta: parse_number(line, beta, "beta")?,
        }),
        _ => Err(syntax(
            line,
            "expected `const <c>`, `lin <free> <slope>`, or `bpr <free> <capacity> <alpha> <beta>`",
        )),
    }
}

fn parse_number(line: usize, raw: &str, what: &str) -> Result<f64, NetFileError> {
    raw.parse()
        .map_err(|_| syntax(line, &format!("invalid {what} `{raw}`")))
}

fn syntax(line: usize, detail: &str) -> NetFileError {
    NetFileError::Syntax {
        line,
        detail: detail.to_owned(),
    }
}
