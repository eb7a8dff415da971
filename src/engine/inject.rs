//! Per-card reorder controls.
//!
//! Injection is idempotent per card: a card already carrying the control
//! group marker is left alone. Each control is a three-state affordance —
//! idle glyph, busy glyph while the reorder request is in flight, settled
//! glyph on success. State is kept in the tree itself (the glyph), so a
//! navigation teardown needs no bookkeeping beyond removing the nodes.

use crate::client::Position;
use crate::dom::{Dom, NodeId};
use crate::engine::extract::{Snapshot, ATTR_CARD_ID};

/// Marker class on the injected per-card control group.
pub const CONTROLS: &str = "sp-card-controls";
/// Marker class on each individual control.
pub const CONTROL: &str = "sp-move-control";

pub const ATTR_ACTION: &str = "data-action";

pub const GLYPH_TOP: &str = "↑";
pub const GLYPH_BOTTOM: &str = "↓";
pub const GLYPH_PENDING: &str = "⏳";
pub const GLYPH_SUCCESS: &str = "✔️";

/// Attach move-to-top/bottom controls to every card that has a stable
/// external id and no control group yet. Notes and id-less cards get none.
pub fn inject_controls(dom: &mut Dom, snapshot: &Snapshot) {
    for column in &snapshot.columns {
        for card in &column.cards {
            let Some(card_id) = card.card_id.as_deref() else {
                continue;
            };
            if !dom.children_with_class(card.node, CONTROLS).is_empty() {
                continue;
            }
            let group = dom.create("div");
            dom.add_class(group, CONTROLS);
            append_control(dom, group, card_id, Position::Top);
            append_control(dom, group, card_id, Position::Bottom);
            dom.append_child(card.node, group);
        }
    }
}

fn append_control(dom: &mut Dom, group: NodeId, card_id: &str, position: Position) {
    let control = dom.create("div");
    dom.add_class(control, CONTROL);
    dom.set_attr(control, ATTR_ACTION, position.as_str());
    dom.set_attr(control, ATTR_CARD_ID, card_id);
    dom.set_text(control, idle_glyph(position));
    dom.append_child(group, control);
}

/// The card id and direction bound to a control node, if it is one.
pub fn control_binding(dom: &Dom, node: NodeId) -> Option<(String, Position)> {
    if !dom.has_class(node, CONTROL) {
        return None;
    }
    let card_id = dom.attr(node, ATTR_CARD_ID)?.to_string();
    let position = match dom.attr(node, ATTR_ACTION)? {
        "top" => Position::Top,
        "bottom" => Position::Bottom,
        _ => return None,
    };
    Some((card_id, position))
}

/// Whether a node is an injected control or sits inside a control group.
pub fn is_control(dom: &Dom, node: NodeId) -> bool {
    dom.has_class(node, CONTROL) || dom.has_class(node, CONTROLS)
}

pub fn is_pending(dom: &Dom, node: NodeId) -> bool {
    dom.text(node) == GLYPH_PENDING
}

pub fn idle_glyph(position: Position) -> &'static str {
    match position {
        Position::Top => GLYPH_TOP,
        Position::Bottom => GLYPH_BOTTOM,
    }
}

/// Remove every injected control group in the tree. Used on navigation
/// teardown; the next pipeline pass recreates them.
pub fn remove_controls(dom: &mut Dom) {
    for group in dom.descendants_with_class(dom.root(), CONTROLS) {
        dom.remove(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::extract::{discover_board, extract};
    use crate::engine::testing::BoardBuilder;

    fn snapshot_of(builder: &BoardBuilder) -> Snapshot {
        let dom = builder.dom();
        let board = discover_board(&dom).expect("board exists");
        extract(&dom, board, &EngineConfig::default().estimate_pattern)
    }

    #[test]
    fn injection_is_idempotent_per_card() {
        let mut builder = BoardBuilder::new();
        let column = builder.column("Todo");
        let card = builder.card(column, Some("c1"), Some(1), &[], &[]);

        let snapshot = snapshot_of(&builder);
        {
            let mut dom = builder.dom();
            inject_controls(&mut dom, &snapshot);
            inject_controls(&mut dom, &snapshot);
        }

        let dom = builder.dom();
        assert_eq!(dom.children_with_class(card, CONTROLS).len(), 1);
    }

    #[test]
    fn cards_without_external_id_get_no_controls() {
        let mut builder = BoardBuilder::new();
        let column = builder.column("Todo");
        let card = builder.card(column, None, Some(1), &[], &[]);

        let snapshot = snapshot_of(&builder);
        {
            let mut dom = builder.dom();
            inject_controls(&mut dom, &snapshot);
        }

        let dom = builder.dom();
        assert!(dom.children_with_class(card, CONTROLS).is_empty());
    }

    #[test]
    fn controls_carry_their_binding() {
        let mut builder = BoardBuilder::new();
        let column = builder.column("Todo");
        let card = builder.card(column, Some("card-9"), Some(1), &[], &[]);

        let snapshot = snapshot_of(&builder);
        {
            let mut dom = builder.dom();
            inject_controls(&mut dom, &snapshot);
        }

        let dom = builder.dom();
        let group = dom.children_with_class(card, CONTROLS)[0];
        let controls = dom.children_with_class(group, CONTROL);
        assert_eq!(controls.len(), 2);

        let (card_id, position) = control_binding(&dom, controls[0]).expect("bound control");
        assert_eq!(card_id, "card-9");
        assert_eq!(position, Position::Top);
        assert_eq!(dom.text(controls[0]), GLYPH_TOP);
        assert_eq!(dom.text(controls[1]), GLYPH_BOTTOM);
    }
}
