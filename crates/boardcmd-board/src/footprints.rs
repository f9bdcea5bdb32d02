//! Footprint and net extraction, plus the mounting-hole footprint builder.

use crate::geometry::{BoundingBox, Point};
use boardcmd_sexpr::{ListBuilder, Sexpr, Span, kv};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
}

impl Placement {
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PadInfo {
    pub number: String,
    /// `smd`, `thru_hole`, `np_thru_hole` or `connect`.
    pub kind: String,
    pub shape: String,
    /// Position relative to the footprint origin, before footprint rotation.
    pub at: Point,
    pub size: (f64, f64),
    pub drill: Option<f64>,
    pub net_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FootprintInfo {
    /// Library identifier from `(footprint "<FPID>" ...)`.
    pub fpid: Option<String>,
    pub reference: Option<String>,
    pub value: Option<String>,
    pub layer: Option<String>,
    pub at: Option<Placement>,
    pub properties: BTreeMap<String, String>,
    pub pads: Vec<PadInfo>,
    /// Byte span of the `(footprint ...)` node in the loaded file.
    #[serde(skip)]
    pub span: Span,
}

impl FootprintInfo {
    /// Pad centre in board coordinates.
    pub fn pad_position(&self, pad: &PadInfo) -> Point {
        match &self.at {
            Some(at) => pad.at.rotated(at.rot).offset(at.origin()),
            None => pad.at,
        }
    }

    /// Bounding box of the placement point and all pads (pad rotation ignored).
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut points = Vec::with_capacity(self.pads.len() * 2 + 1);
        if let Some(at) = &self.at {
            points.push(at.origin());
        }
        for pad in &self.pads {
            let center = self.pad_position(pad);
            let half = Point::new(pad.size.0 / 2.0, pad.size.1 / 2.0);
            points.push(Point::new(center.x - half.x, center.y - half.y));
            points.push(Point::new(center.x + half.x, center.y + half.y));
        }
        BoundingBox::from_points(points)
    }
}

/// Extract every top-level footprint of a board.
pub fn extract_footprints(root: &Sexpr) -> Vec<FootprintInfo> {
    let Some(root_list) = root.as_list() else {
        return Vec::new();
    };

    root_list
        .iter()
        .skip(1)
        .filter(|node| node.tag() == Some("footprint"))
        .filter_map(parse_footprint)
        .collect()
}

fn parse_footprint(node: &Sexpr) -> Option<FootprintInfo> {
    let items = node.as_list()?;

    let mut layer = None;
    let mut at = None;
    let mut pads = Vec::new();
    let mut properties = BTreeMap::new();

    for child in items.iter().skip(1) {
        let Some(list) = child.as_list() else {
            continue;
        };
        match list.first().and_then(Sexpr::as_sym) {
            Some("layer") => {
                layer = list.get(1).and_then(Sexpr::as_atom).map(str::to_string);
            }
            Some("at") => at = parse_at_list(list),
            Some("property") => {
                if let (Some(name), Some(value)) = (
                    list.get(1).and_then(Sexpr::as_atom),
                    list.get(2).and_then(Sexpr::as_atom),
                ) {
                    properties.insert(name.to_string(), value.to_string());
                }
            }
            // KiCad 6/7 kept reference and value in fp_text.
            Some("fp_text") => {
                let kind = list.get(1).and_then(Sexpr::as_sym);
                let value = list.get(2).and_then(Sexpr::as_atom);
                if let (Some(kind @ ("reference" | "value")), Some(value)) = (kind, value) {
                    let name = if kind == "reference" { "Reference" } else { "Value" };
                    properties
                        .entry(name.to_string())
                        .or_insert_with(|| value.to_string());
                }
            }
            Some("pad") => pads.extend(parse_pad_list(list)),
            _ => {}
        }
    }

    Some(FootprintInfo {
        fpid: items.get(1).and_then(Sexpr::as_atom).map(str::to_string),
        reference: properties.get("Reference").cloned(),
        value: properties.get("Value").cloned(),
        layer,
        at,
        properties,
        pads,
        span: node.span,
    })
}

fn parse_at_list(list: &[Sexpr]) -> Option<Placement> {
    Some(Placement {
        x: list.get(1)?.as_number()?,
        y: list.get(2)?.as_number()?,
        rot: list.get(3).and_then(Sexpr::as_number).unwrap_or(0.0),
    })
}

fn parse_pad_list(list: &[Sexpr]) -> Option<PadInfo> {
    let number = list.get(1)?.as_atom()?.to_string();
    let kind = list.get(2)?.as_sym()?.to_string();
    let shape = list.get(3)?.as_sym()?.to_string();

    let mut at = Point::default();
    let mut size = (0.0, 0.0);
    let mut drill = None;
    let mut net_name = None;

    for child in list.iter().skip(4) {
        let Some(items) = child.as_list() else {
            continue;
        };
        match items.first().and_then(Sexpr::as_sym) {
            Some("at") => {
                if let Some(p) = parse_at_list(items) {
                    at = Point::new(p.x, p.y);
                }
            }
            Some("size") => {
                let w = items.get(1).and_then(Sexpr::as_number).unwrap_or(0.0);
                let h = items.get(2).and_then(Sexpr::as_number).unwrap_or(w);
                size = (w, h);
            }
            Some("drill") => {
                // (drill 3.2) or (drill oval 1 2)
                drill = items.iter().skip(1).find_map(Sexpr::as_number);
            }
            Some("net") => {
                net_name = items.get(2).and_then(Sexpr::as_atom).map(str::to_string);
            }
            _ => {}
        }
    }

    Some(PadInfo {
        number,
        kind,
        shape,
        at,
        size,
        drill,
        net_name,
    })
}

/// A top-level `(net N "NAME")` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetInfo {
    pub code: i64,
    pub name: String,
}

pub fn extract_nets(root: &Sexpr) -> Vec<NetInfo> {
    root.find_all_lists("net")
        .into_iter()
        .filter_map(|list| {
            Some(NetInfo {
                code: list.get(1)?.as_int()?,
                name: list.get(2)?.as_atom()?.to_string(),
            })
        })
        .collect()
}

/// A drilled mounting hole placed as its own footprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountingHole {
    pub at: Point,
    pub diameter: f64,
    pub pad_diameter: f64,
    pub plated: bool,
}

impl MountingHole {
    pub fn footprint_name(&self) -> String {
        let size = boardcmd_sexpr::formatter::format_float(self.diameter);
        if self.plated {
            format!("MountingHole_{size}mm_Pad")
        } else {
            format!("MountingHole_{size}mm")
        }
    }

    pub(crate) fn to_sexpr(&self, reference: &str, new_uuid: &mut dyn FnMut() -> String) -> Sexpr {
        let name = self.footprint_name();
        let label_offset = self.pad_diameter / 2.0 + 1.0;

        let (pad_number, pad_kind) = if self.plated {
            ("1", "thru_hole")
        } else {
            ("", "np_thru_hole")
        };
        let pad = ListBuilder::node("pad")
            .push(Sexpr::string(pad_number))
            .push(pad_kind)
            .push("circle")
            .push(ListBuilder::node("at").push(0i64).push(0i64).build())
            .push(
                ListBuilder::node("size")
                    .push(self.pad_diameter)
                    .push(self.pad_diameter)
                    .build(),
            )
            .push(kv("drill", self.diameter))
            .push(
                ListBuilder::node("layers")
                    .push(Sexpr::string("*.Cu"))
                    .push(Sexpr::string("*.Mask"))
                    .build(),
            )
            .push(kv("uuid", Sexpr::string(new_uuid())))
            .build();

        ListBuilder::node("footprint")
            .push(Sexpr::string(format!("MountingHole:{name}")))
            .push(kv("layer", Sexpr::string("F.Cu")))
            .push(kv("uuid", Sexpr::string(new_uuid())))
            .push(
                ListBuilder::node("at")
                    .push(self.at.x)
                    .push(self.at.y)
                    .build(),
            )
            .push(property("Reference", reference, -label_offset, "F.SilkS", new_uuid()))
            .push(property("Value", &name, label_offset, "F.Fab", new_uuid()))
            .push(
                ListBuilder::node("attr")
                    .push("exclude_from_pos_files")
                    .push("exclude_from_bom")
                    .build(),
            )
            .push(pad)
            .build()
    }
}

fn property(name: &str, value: &str, y: f64, layer: &str, uuid: String) -> Sexpr {
    ListBuilder::node("property")
        .push(Sexpr::string(name))
        .push(Sexpr::string(value))
        .push(ListBuilder::node("at").push(0i64).push(y).push(0i64).build())
        .push(kv("layer", Sexpr::string(layer)))
        .push(kv("uuid", Sexpr::string(uuid)))
        .push(
            ListBuilder::node("effects")
                .push(
                    ListBuilder::node("font")
                        .push(ListBuilder::node("size").push(1i64).push(1i64).build())
                        .push(kv("thickness", 0.15))
                        .build(),
                )
                .build(),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcmd_sexpr::parse;

    #[test]
    fn extracts_kicad8_footprint() {
        let board = parse(
            r#"(kicad_pcb
                (net 0 "")
                (net 1 "VCC")
                (footprint "Resistor_SMD:R_0603"
                    (layer "F.Cu")
                    (at 10 20 90)
                    (property "Reference" "R1")
                    (property "Value" "10k")
                    (pad "1" smd roundrect (at -0.8 0) (size 0.8 0.9) (net 1 "VCC"))
                    (pad "2" smd roundrect (at 0.8 0) (size 0.8 0.9))
                )
            )"#,
        )
        .unwrap();

        let footprints = extract_footprints(&board);
        assert_eq!(footprints.len(), 1);
        let fp = &footprints[0];
        assert_eq!(fp.fpid.as_deref(), Some("Resistor_SMD:R_0603"));
        assert_eq!(fp.reference.as_deref(), Some("R1"));
        assert_eq!(fp.value.as_deref(), Some("10k"));
        assert_eq!(fp.layer.as_deref(), Some("F.Cu"));
        assert_eq!(
            fp.at,
            Some(Placement {
                x: 10.0,
                y: 20.0,
                rot: 90.0
            })
        );
        assert_eq!(fp.pads.len(), 2);
        assert_eq!(fp.pads[0].net_name.as_deref(), Some("VCC"));
        assert_eq!(fp.pads[1].net_name, None);
        assert!(fp.span.len() > 0);

        let nets = extract_nets(&board);
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[1].name, "VCC");
    }

    #[test]
    fn legacy_fp_text_reference() {
        let board = parse(
            r#"(kicad_pcb (footprint "C" (layer "F.Cu") (fp_text reference "C7" (at 0 0)) (fp_text value "100n" (at 0 1))))"#,
        )
        .unwrap();
        let fp = &extract_footprints(&board)[0];
        assert_eq!(fp.reference.as_deref(), Some("C7"));
        assert_eq!(fp.value.as_deref(), Some("100n"));
    }

    #[test]
    fn pad_positions_follow_footprint_rotation() {
        let board = parse(
            r#"(kicad_pcb (footprint "X" (at 10 10 90) (pad "1" smd rect (at 2 0) (size 1 1))))"#,
        )
        .unwrap();
        let fp = &extract_footprints(&board)[0];
        let p = fp.pad_position(&fp.pads[0]);
        assert!((p.x - 10.0).abs() < 1e-9);
        assert!((p.y - 8.0).abs() < 1e-9);
    }

    #[test]
    fn mounting_hole_footprint_reads_back() {
        let hole = MountingHole {
            at: Point::new(3.0, 4.0),
            diameter: 3.2,
            pad_diameter: 3.2,
            plated: false,
        };
        let mut counter = 0;
        let mut next_uuid = || {
            counter += 1;
            format!("u{counter}")
        };
        let node = hole.to_sexpr("H1", &mut next_uuid);
        assert_eq!(node.tag(), Some("footprint"));

        let board = Sexpr::list(vec![Sexpr::symbol("kicad_pcb"), node]);
        let fp = &extract_footprints(&board)[0];
        assert_eq!(fp.fpid.as_deref(), Some("MountingHole:MountingHole_3.2mm"));
        assert_eq!(fp.reference.as_deref(), Some("H1"));
        assert_eq!(fp.pads[0].kind, "np_thru_hole");
        assert_eq!(fp.pads[0].drill, Some(3.2));
        assert_eq!(fp.pads[0].size, (3.2, 3.2));
    }
}
