use anyhow::{bail, Context, Result};

use crate::hypergraph::StaticHypergraph;
use crate::types::{EdgeWeight, NodeId, NodeWeight};

/// Parse a hypergraph in hMetis format.
///
/// The first non-comment line is `|E| |V| [fmt]` where fmt ∈ {0, 1, 10, 11}:
/// the ones digit flags edge weights, the tens digit node weights. Each of
/// the following |E| lines lists one edge: an optional weight followed by
/// its pins as 1-based vertex ids. If node weights are flagged, |V| weight
/// lines follow. Lines starting with '%' are comments.
pub fn parse_hmetis(input: &str) -> Result<StaticHypergraph> {
    let mut lines = input.lines().filter(|line| !line.trim_start().starts_with('%'));

    let header = lines.next().context("missing header line")?;
    let mut fields = header.split_whitespace();
    let num_edges: usize = fields
        .next()
        .context("header is empty")?
        .parse()
        .context("invalid edge count")?;
    let num_nodes: usize = fields
        .next()
        .context("header is missing the vertex count")?
        .parse()
        .context("invalid vertex count")?;
    let fmt: u32 = match fields.next() {
        Some(raw) => raw.parse().context("invalid format flag")?,
        None => 0,
    };
    if !matches!(fmt, 0 | 1 | 10 | 11) {
        bail!("unsupported hMetis format flag {fmt}");
    }
    let has_edge_weights = fmt % 10 == 1;
    let has_node_weights = fmt / 10 == 1;

    let mut edges = Vec::with_capacity(num_edges);
    let mut edge_weights = Vec::with_capacity(num_edges);
    for e in 0..num_edges {
        let line = lines.next().with_context(|| format!("missing line for edge {e}"))?;
        let mut fields = line.split_whitespace();

        let weight: EdgeWeight = if has_edge_weights {
            fields
                .next()
                .with_context(|| format!("edge {e} is missing its weight"))?
                .parse()
                .with_context(|| format!("invalid weight for edge {e}"))?
        } else {
            1
        };
        if weight <= 0 {
            bail!("edge {e} has non-positive weight {weight}");
        }

        let mut pins = Vec::new();
        for raw in fields {
            let pin: usize = raw.parse().with_context(|| format!("invalid pin id in edge {e}"))?;
            if pin == 0 || pin > num_nodes {
                bail!("edge {e} pin {pin} out of range 1..={num_nodes}");
            }
            pins.push((pin - 1) as NodeId);
        }
        if pins.is_empty() {
            bail!("edge {e} has no pins");
        }

        edges.push(pins);
        edge_weights.push(weight);
    }

    let node_weights: Vec<NodeWeight> = if has_node_weights {
        (0..num_nodes)
            .map(|v| {
                let line = lines.next().with_context(|| format!("missing weight for vertex {v}"))?;
                let weight: NodeWeight = line
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid weight for vertex {v}"))?;
                if weight <= 0 {
                    bail!("vertex {v} has non-positive weight {weight}");
                }
                Ok(weight)
            })
            .collect::<Result<_>>()?
    } else {
        vec![1; num_nodes]
    };

    Ok(StaticHypergraph::new(num_nodes, &edges, edge_weights, node_weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::Hypergraph;

    #[test]
    fn parses_unweighted() {
        let hg = parse_hmetis("4 7\n1 2\n1 7 5 6\n5 6 4\n2 3 4\n").unwrap();
        assert_eq!(hg.num_edges(), 4);
        assert_eq!(hg.num_nodes(), 7);
        assert_eq!(hg.pins(0), &[0, 1]);
        assert_eq!(hg.pins(1), &[0, 4, 5, 6]);
        assert_eq!(hg.edge_weight(2), 1);
        assert_eq!(hg.node_weight(3), 1);
    }

    #[test]
    fn parses_edge_weights_and_comments() {
        let hg = parse_hmetis("% a comment\n2 3 1\n7 1 2\n3 2 3\n").unwrap();
        assert_eq!(hg.edge_weight(0), 7);
        assert_eq!(hg.edge_weight(1), 3);
        assert_eq!(hg.pins(0), &[0, 1]);
    }

    #[test]
    fn parses_node_weights() {
        let hg = parse_hmetis("1 3 11\n9 1 2 3\n5\n6\n7\n").unwrap();
        assert_eq!(hg.edge_weight(0), 9);
        assert_eq!(hg.node_weight(0), 5);
        assert_eq!(hg.node_weight(2), 7);
        assert_eq!(hg.total_weight(), 18);
    }

    #[test]
    fn rejects_bad_format_flag() {
        assert!(parse_hmetis("1 2 7\n1 2\n").is_err());
    }

    #[test]
    fn rejects_pin_out_of_range() {
        let err = parse_hmetis("1 2\n1 3\n").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(parse_hmetis("2 3\n1 2\n").is_err());
        assert!(parse_hmetis("1 3 10\n1 2\n4\n").is_err());
    }
}
