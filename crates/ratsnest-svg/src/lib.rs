//! Topology rendering to SVG, for visual sanity-checking only.
//!
//! One labelled node box per part instance on a simple grid, one edge
//! bundle per net: a line from each member pin stub to the net's hub, with
//! the net name at the hub. The output is topologically faithful (every
//! declared connection appears as an edge) but makes no pixel-stability
//! promises and is not a schematic.

use std::fmt::Write;

use ratsnest_sch::{Finalized, PinRef};

const MARGIN: f64 = 40.0;
const NODE_W: f64 = 132.0;
const NODE_H: f64 = 44.0;
const CELL_W: f64 = 210.0;
const CELL_H: f64 = 130.0;
const HUB_DROP: f64 = 30.0;

/// Render a finalized graph into a standalone SVG document.
pub fn render(finalized: &Finalized) -> String {
    let count = finalized.parts().len();
    let cols = grid_cols(count);
    let rows = count.div_ceil(cols.max(1)).max(1);
    let width = 2.0 * MARGIN + cols.max(1) as f64 * CELL_W;
    let height = 2.0 * MARGIN + rows as f64 * CELL_H;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.1}" height="{height:.1}" viewBox="0 0 {width:.1} {height:.1}">"#
    );
    out.push_str(
        "<style>\
         rect { fill: #fdfdf6; stroke: #444; } \
         line { stroke: #888; stroke-width: 1; } \
         circle { fill: #888; } \
         text { font-family: monospace; font-size: 11px; fill: #222; } \
         text.net { fill: #a33; }\
         </style>\n",
    );

    // Edges first so node boxes paint over them.
    for net in finalized.nets() {
        if net.members().is_empty() {
            continue;
        }
        let stubs: Vec<(f64, f64)> = net
            .members()
            .iter()
            .map(|m| pin_stub(finalized, cols, *m))
            .collect();
        let hub_x = stubs.iter().map(|p| p.0).sum::<f64>() / stubs.len() as f64;
        let hub_y = stubs.iter().map(|p| p.1).sum::<f64>() / stubs.len() as f64 + HUB_DROP;
        for (x, y) in &stubs {
            let _ = writeln!(
                out,
                r#"<line x1="{x:.1}" y1="{y:.1}" x2="{hub_x:.1}" y2="{hub_y:.1}"/>"#
            );
        }
        let _ = writeln!(out, r#"<circle cx="{hub_x:.1}" cy="{hub_y:.1}" r="3"/>"#);
        let _ = writeln!(
            out,
            r#"<text class="net" x="{:.1}" y="{:.1}">{}</text>"#,
            hub_x + 6.0,
            hub_y + 4.0,
            escape(net.name())
        );
    }

    for part in finalized.parts() {
        let (x, y) = node_origin(cols, part.id().index());
        let _ = writeln!(
            out,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{NODE_W:.1}" height="{NODE_H:.1}"/>"#
        );
        let title = match part.value() {
            Some(value) => format!("{} {}", part.id(), value),
            None => part.id().to_string(),
        };
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}">{}</text>"#,
            x + 6.0,
            y + 17.0,
            escape(&title)
        );
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}">{}</text>"#,
            x + 6.0,
            y + 33.0,
            escape(&part.template().lib_ref.to_string())
        );
    }

    out.push_str("</svg>\n");
    out
}

fn grid_cols(count: usize) -> usize {
    let mut cols = 1;
    while cols * cols < count {
        cols += 1;
    }
    cols
}

fn node_origin(cols: usize, index: usize) -> (f64, f64) {
    let col = index % cols.max(1);
    let row = index / cols.max(1);
    (
        MARGIN + col as f64 * CELL_W,
        MARGIN + row as f64 * CELL_H,
    )
}

/// Attachment point of a member pin: spread along the node's bottom edge in
/// template pin order so edge bundles stay tellable apart.
fn pin_stub(finalized: &Finalized, cols: usize, member: PinRef) -> (f64, f64) {
    let (x, y) = node_origin(cols, member.part.index());
    let pins = finalized
        .part(member.part)
        .map(|p| p.template().pins().len())
        .unwrap_or(1);
    let frac = (member.pin + 1) as f64 / (pins + 1) as f64;
    (x + NODE_W * frac, y + NODE_H)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratsnest_sch::{LibRef, PartTemplate, Schematic};
    use std::sync::Arc;

    fn conn() -> Arc<PartTemplate> {
        Arc::new(
            PartTemplate::new(LibRef::new("test.lib", "CONN"), "fp")
                .with_pin("A", "1")
                .with_pin("B", "2"),
        )
    }

    #[test]
    fn one_box_per_part_one_edge_per_membership() {
        let mut sch = Schematic::new();
        let t = conn();
        let p1 = sch.instantiate(Arc::clone(&t));
        let p2 = sch.instantiate(Arc::clone(&t));
        let p3 = sch.instantiate(t);
        let x = sch.named_net("X");
        let y = sch.named_net("Y");
        sch.connect_all(x, &[(p1, "A"), (p2, "A"), (p3, "A")]).unwrap();
        sch.connect(y, p1, "B").unwrap();
        let fin = sch.finalize().unwrap();

        let svg = render(&fin);
        assert_eq!(svg.matches("<rect ").count(), 3);
        // Topological faithfulness: one line per declared connection.
        assert_eq!(svg.matches("<line ").count(), 4);
        // One hub per non-empty net.
        assert_eq!(svg.matches("<circle ").count(), 2);
        assert!(svg.contains(r#"<text class="net""#));
    }

    #[test]
    fn labels_are_xml_escaped() {
        let mut sch = Schematic::new();
        let p1 = sch.instantiate(conn());
        sch.set_value(p1, "1<2&3").unwrap();
        let net = sch.named_net("D+<D->");
        sch.connect(net, p1, "A").unwrap();
        let fin = sch.finalize().unwrap();

        let svg = render(&fin);
        assert!(svg.contains("P1 1&lt;2&amp;3"));
        assert!(svg.contains("D+&lt;D-&gt;"));
        assert!(!svg.contains("1<2"));
    }

    #[test]
    fn render_is_deterministic() {
        let build = || {
            let mut sch = Schematic::new();
            let t = conn();
            let p1 = sch.instantiate(Arc::clone(&t));
            let p2 = sch.instantiate(t);
            let x = sch.named_net("X");
            sch.connect_all(x, &[(p1, "A"), (p2, "B")]).unwrap();
            sch.finalize().unwrap()
        };
        assert_eq!(render(&build()), render(&build()));
    }

    #[test]
    fn empty_graph_is_still_a_document() {
        let fin = Schematic::new().finalize().unwrap();
        let svg = render(&fin);
        assert!(svg.starts_with("<svg "));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect ").count(), 0);
    }

    #[test]
    fn unconnected_net_draws_no_edges() {
        let mut sch = Schematic::new();
        sch.named_net("FLOATING");
        let fin = sch.finalize().unwrap();
        let svg = render(&fin);
        assert_eq!(svg.matches("<line ").count(), 0);
        assert_eq!(svg.matches("<circle ").count(), 0);
    }
}
