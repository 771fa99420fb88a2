//! Report rendering and per-round edge-list export.
//!
//! One line per round with a fixed field order — name, UE, SO, PoA, detail —
//! so downstream tooling can parse the stream. Exact float formatting is not
//! part of the contract.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use perturbo_core::{DisturbanceReport, RoundDetail, RoundReport};

/// Renders one line per round, plus optional per-route flow lines.
///
/// # Errors
/// Propagates I/O errors from the writer.
pub fn render_report(
    report: &DisturbanceReport,
    route_flows: bool,
    writer: &mut impl Write,
) -> io::Result<()> {
    for round in &report.rounds {
        render_round(round, route_flows, writer)?;
    }
    if report.cancelled {
        writeln!(
            writer,
            "# cancelled after {} of {} recorded rounds",
            report.changelog.len(),
            report.rounds.len().saturating_sub(1),
        )?;
    }
    Ok(())
}

fn render_round(round: &RoundReport, route_flows: bool, writer: &mut impl Write) -> io::Result<()> {
    write!(
        writer,
        "{}\tue={:.6}\tso={:.6}\tpoa={:.6}",
        round.network_name, round.ue_cost, round.so_cost, round.price_of_anarchy,
    )?;
    match &round.detail {
        RoundDetail::EdgeFlows(entries) => {
            let flows: Vec<String> = entries
                .iter()
                .map(|entry| format!("{}:{:.4}", entry.name, entry.flow))
                .collect();
            write!(writer, "\tflows={}", flows.join(","))?;
        }
        RoundDetail::MeanBetweenness(mean) => {
            write!(writer, "\tbetweenness={mean:.6}")?;
        }
    }
    if let Some(coupling) = &round.coupling {
        write!(
            writer,
            "\tcoupling=k:{},pairs:{},overlap:{:.4}",
            coupling.k(),
            coupling.pairs(),
            coupling.mean_overlap(),
        )?;
    }
    writeln!(writer)?;

    if route_flows {
        for route in &round.route_flows {
            writeln!(
                writer,
                "  route\t{}\tvia={}\tflow={:.4}",
                route.pair(),
                route.edges().join(">"),
                route.flow(),
            )?;
        }
    }
    Ok(())
}

/// Writes one edge-list file per round into `directory`, named after the
/// round's network name. Each line is `<start> <end>`, the format consumed
/// by common graph toolkits.
///
/// Only rounds reported with per-edge flow detail carry enough structure to
/// export; betweenness-only rounds are skipped.
///
/// # Errors
/// Propagates filesystem errors.
pub fn export_edge_lists(report: &DisturbanceReport, directory: &Path) -> io::Result<()> {
    fs::create_dir_all(directory)?;
    for round in &report.rounds {
        let RoundDetail::EdgeFlows(entries) = &round.detail else {
            continue;
        };
        let mut content = String::new();
        for entry in entries {
            content.push_str(&entry.start);
            content.push(' ');
            content.push_str(&entry.end);
            content.push('\n');
        }
        fs::write(directory.join(format!("{}.edges", round.network_name)), content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use perturbo_core::{
        CostFunction, Edge, EdgeFlowEntry, Network, Node, OdMatrix, RoundDetail,
    };

    fn sample_report() -> DisturbanceReport {
        let network = Network::new(
            "demo",
            vec![Node::new("A"), Node::new("B")],
            vec![
                Edge::new("AB", "A", "B", CostFunction::Constant(1.0)),
                Edge::new("BA", "B", "A", CostFunction::Constant(1.0)),
            ],
            OdMatrix::new(),
        );
        DisturbanceReport {
            rounds: vec![
                RoundReport {
                    round: 0,
                    network_name: "demo".to_owned(),
                    change: None,
                    ue_cost: 120.0,
                    so_cost: 100.0,
                    price_of_anarchy: 1.2,
                    detail: RoundDetail::EdgeFlows(vec![EdgeFlowEntry {
                        name: "AB".to_owned(),
                        start: "A".to_owned(),
                        end: "B".to_owned(),
                        flow: 2.0,
                    }]),
                    coupling: None,
                    route_flows: Vec::new(),
                },
                RoundReport {
                    round: 1,
                    network_name: "demo_AB_B-A".to_owned(),
                    change: Some("AB_B-A".to_owned()),
                    ue_cost: 130.0,
                    so_cost: 100.0,
                    price_of_anarchy: 1.3,
                    detail: RoundDetail::MeanBetweenness(0.5),
                    coupling: None,
                    route_flows: Vec::new(),
                },
            ],
            changelog: vec!["AB_B-A".to_owned()],
            network,
            cancelled: false,
        }
    }

    #[test]
    fn renders_one_line_per_round_with_fixed_field_order() {
        let mut out = Vec::new();
        render_report(&sample_report(), false, &mut out).expect("rendering must succeed");
        let text = String::from_utf8(out).expect("output is UTF-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "demo\tue=120.000000\tso=100.000000\tpoa=1.200000\tflows=AB:2.0000"
        );
        assert_eq!(
            lines[1],
            "demo_AB_B-A\tue=130.000000\tso=100.000000\tpoa=1.300000\tbetweenness=0.500000"
        );
    }

    #[test]
    fn export_writes_edge_lists_for_flow_rounds_only() {
        let directory = tempfile::tempdir().expect("tempdir must be creatable");
        export_edge_lists(&sample_report(), directory.path()).expect("export must succeed");

        let exported = fs::read_to_string(directory.path().join("demo.edges"))
            .expect("flow round exports its edge list");
        assert_eq!(exported, "A B\n");
        assert!(!directory.path().join("demo_AB_B-A.edges").exists());
    }
}
