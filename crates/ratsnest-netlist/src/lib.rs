//! Plain-text netlist export.
//!
//! One record per line, parts before nets:
//!
//! ```text
//! PART <id> <library> <name> <value> <footprint>
//! NET <name> <id>.<pin> <id>.<pin> ...
//! ```
//!
//! Parts are ordered by creation index, nets by the creation index of their
//! surviving name, net members by (instance creation index, template pin
//! order). The same finalized graph always serialises to byte-identical
//! text: the downstream layout tool diffs regenerated netlists, so the
//! output must be stable across regenerations.

use std::fmt::Write;

use ratsnest_sch::Finalized;

/// Placeholder for unset value/footprint fields, keeping each `PART` record
/// at a fixed field count.
const EMPTY_FIELD: &str = "-";

/// Serialise a finalized graph into the line-oriented netlist text.
pub fn export(finalized: &Finalized) -> String {
    let mut out = String::new();
    for part in finalized.parts() {
        let template = part.template();
        let value = part.value().unwrap_or(EMPTY_FIELD);
        let footprint = match part.footprint() {
            "" => EMPTY_FIELD,
            fp => fp,
        };
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "PART {} {} {} {} {}",
            part.id(),
            template.lib_ref.library,
            template.lib_ref.name,
            value,
            footprint
        );
    }
    let mut net_count = 0usize;
    for net in finalized.nets() {
        let _ = write!(out, "NET {}", net.name());
        for member in net.members() {
            // Finalization re-checked ownership, every member resolves.
            if let Some(pin) = finalized.pin_name(*member) {
                let _ = write!(out, " {}.{}", member.part, pin);
            }
        }
        let _ = writeln!(out);
        net_count += 1;
    }
    log::debug!(
        "exported {} parts, {} nets",
        finalized.parts().len(),
        net_count
    );
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
            PartTemplate::new(LibRef::new("test.lib", "CONN"), "fp_conn")
                .with_pin("A", "1")
                .with_pin("B", "2"),
        )
    }

    #[test]
    fn exports_parts_then_nets() {
        // One net, two member pins, fixed record layout.
        let mut sch = Schematic::new();
        let t = conn();
        let p1 = sch.instantiate(Arc::clone(&t));
        let p2 = sch.instantiate(t);
        let x = sch.named_net("X");
        sch.connect(x, p1, "A").unwrap();
        sch.connect(x, p2, "A").unwrap();
        let fin = sch.finalize().unwrap();

        assert_eq!(
            export(&fin),
            "PART P1 test.lib CONN - fp_conn\n\
             PART P2 test.lib CONN - fp_conn\n\
             NET X P1.A P2.A\n"
        );
    }

    #[test]
    fn merged_net_exports_under_surviving_name() {
        // X then Y on the same pin leaves a single NET X record.
        let mut sch = Schematic::new();
        let p1 = sch.instantiate(conn());
        let x = sch.named_net("X");
        let y = sch.named_net("Y");
        sch.connect(x, p1, "A").unwrap();
        sch.connect(y, p1, "A").unwrap();
        let fin = sch.finalize().unwrap();

        let text = export(&fin);
        assert!(text.contains("NET X P1.A"));
        assert!(!text.contains("NET Y"));
    }

    #[test]
    fn dangling_pin_does_not_block_export() {
        // The part record is emitted in full even with unbound pins.
        let mut sch = Schematic::new();
        let p1 = sch.instantiate(conn());
        let x = sch.named_net("X");
        sch.connect(x, p1, "A").unwrap();
        let fin = sch.finalize().unwrap();

        assert!(!fin.findings().is_empty());
        assert!(export(&fin).contains("PART P1 test.lib CONN - fp_conn"));
    }

    #[test]
    fn value_and_footprint_overrides_are_rendered() {
        let mut sch = Schematic::new();
        let p1 = sch.instantiate(conn());
        sch.set_value(p1, "100nF").unwrap();
        sch.set_footprint(p1, "C_1206").unwrap();
        let fin = sch.finalize().unwrap();

        insta::assert_snapshot!(export(&fin), @"PART P1 test.lib CONN 100nF C_1206");
    }

    #[test]
    fn export_is_deterministic() {
        // Byte-identical output across regenerations.
        let build = || {
            let mut sch = Schematic::new();
            let t = conn();
            let p1 = sch.instantiate(Arc::clone(&t));
            let p2 = sch.instantiate(t);
            let x = sch.named_net("X");
            let y = sch.named_net("Y");
            sch.connect(x, p1, "A").unwrap();
            sch.connect(y, p2, "B").unwrap();
            sch.connect(x, p2, "A").unwrap();
            sch.finalize().unwrap()
        };
        let fin = build();
        assert_eq!(export(&fin), export(&fin));
        assert_eq!(export(&fin), export(&build()));
    }

    #[test]
    fn every_connection_appears_exactly_once() {
        // Each declared (instance, pin) pair shows up in one NET record.
        let mut sch = Schematic::new();
        let t = conn();
        let p1 = sch.instantiate(Arc::clone(&t));
        let p2 = sch.instantiate(t);
        let x = sch.named_net("X");
        let y = sch.named_net("Y");
        sch.connect(x, p1, "A").unwrap();
        sch.connect(x, p2, "A").unwrap();
        sch.connect(y, p1, "B").unwrap();
        let fin = sch.finalize().unwrap();

        let text = export(&fin);
        for endpoint in ["P1.A", "P2.A", "P1.B"] {
            assert_eq!(text.matches(endpoint).count(), 1, "{endpoint}");
        }
    }
}
