//! Pure reductions over a snapshot.
//!
//! Buckets are rebuilt every pass and never persisted. Notes (cards without
//! an issue number) are valid cards but contribute to no bucket.

use std::collections::BTreeMap;

use crate::engine::extract::{CardView, ColumnView, Snapshot};

/// Point and unestimated-count totals for one grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateBucket {
    pub points: f64,
    pub unestimated: u32,
}

impl AggregateBucket {
    /// Fold one card in. Unestimated counts once per card; estimated cards
    /// accumulate their summed label value.
    pub fn add_card(&mut self, card: &CardView) {
        if card.is_note() {
            return;
        }
        match card.estimate {
            Some(points) => self.points += points,
            None => self.unestimated += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0.0 && self.unestimated == 0
    }
}

/// Totals for a single column.
pub fn column_bucket(column: &ColumnView) -> AggregateBucket {
    let mut bucket = AggregateBucket::default();
    for card in &column.cards {
        bucket.add_card(card);
    }
    bucket
}

/// Totals across every column whose name exactly matches the configured
/// status group. Columns in no group contribute to neither status bucket.
pub fn status_bucket(snapshot: &Snapshot, group: &[String]) -> AggregateBucket {
    let mut bucket = AggregateBucket::default();
    for column in &snapshot.columns {
        if !group.iter().any(|name| *name == column.name) {
            continue;
        }
        for card in &column.cards {
            bucket.add_card(card);
        }
    }
    bucket
}

/// Per-assignee totals across the status group, keyed by display name.
///
/// A card with several assignees credits its full estimate to each of them
/// independently: an assignee's bucket reads "points on cards they're
/// assigned to", not a partition of the column total.
pub fn assignee_buckets(snapshot: &Snapshot, group: &[String]) -> BTreeMap<String, AggregateBucket> {
    let mut buckets: BTreeMap<String, AggregateBucket> = BTreeMap::new();
    for column in &snapshot.columns {
        if !group.iter().any(|name| *name == column.name) {
            continue;
        }
        for card in &column.cards {
            for assignee in &card.assignees {
                buckets
                    .entry(assignee.name.clone())
                    .or_default()
                    .add_card(card);
            }
        }
    }
    buckets
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

    fn group(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn unestimated_and_zero_estimate_are_bucketed_apart() {
        let mut builder = BoardBuilder::new();
        let column = builder.column("Todo");
        builder.card(column, Some("c1"), Some(1), &["0 pt"], &[]);
        builder.card(column, Some("c2"), Some(2), &[], &[]);

        let snapshot = snapshot_of(&builder);
        let bucket = column_bucket(&snapshot.columns[0]);

        assert_eq!(bucket.points, 0.0);
        assert_eq!(bucket.unestimated, 1);
    }

    #[test]
    fn notes_contribute_to_no_bucket() {
        let mut builder = BoardBuilder::new();
        let column = builder.column("Todo");
        builder.card(column, Some("note"), None, &[], &["alice"]);

        let snapshot = snapshot_of(&builder);

        assert!(column_bucket(&snapshot.columns[0]).is_empty());
        assert!(assignee_buckets(&snapshot, &group(&["Todo"])).is_empty());
    }

    #[test]
    fn multi_assignee_cards_credit_each_assignee_fully() {
        let mut builder = BoardBuilder::new();
        let column = builder.column("Todo");
        builder.card(column, Some("c1"), Some(1), &["5 pt"], &["alice", "bob"]);

        let snapshot = snapshot_of(&builder);
        let active = group(&["Todo"]);

        let column_total = column_bucket(&snapshot.columns[0]);
        assert_eq!(column_total.points, 5.0);

        let per_assignee = assignee_buckets(&snapshot, &active);
        assert_eq!(per_assignee["alice"].points, 5.0);
        assert_eq!(per_assignee["bob"].points, 5.0);
    }

    #[test]
    fn columns_outside_the_group_are_ignored() {
        let mut builder = BoardBuilder::new();
        let planned = builder.column("Planned");
        let parked = builder.column("Parked");
        builder.card(planned, Some("c1"), Some(1), &["3 pt"], &["alice"]);
        builder.card(parked, Some("c2"), Some(2), &["8 pt"], &["alice"]);

        let snapshot = snapshot_of(&builder);
        let active = group(&["Planned"]);

        assert_eq!(status_bucket(&snapshot, &active).points, 3.0);
        assert_eq!(assignee_buckets(&snapshot, &active)["alice"].points, 3.0);
    }
}
