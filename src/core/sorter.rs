/// Display ordering for result sets
///
/// Pure functions only. The tri-state header cycle lives in [`SortState`].

use crate::db::RecordSummary;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Created,
    Modified,
    Purpose,
    Tags,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Id,
        Column::Created,
        Column::Modified,
        Column::Purpose,
        Column::Tags,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Created => "Created",
            Column::Modified => "Modified",
            Column::Purpose => "Purpose",
            Column::Tags => "Tags",
        }
    }

    fn compare(&self, a: &RecordSummary, b: &RecordSummary) -> Ordering {
        match self {
            Column::Id => a.id.cmp(&b.id),
            // Stored timestamps are fixed-width RFC 3339, so text order is time order
            Column::Created => a.created.cmp(&b.created),
            Column::Modified => a.modified.cmp(&b.modified),
            Column::Purpose => caseless(a.purpose.as_deref(), b.purpose.as_deref()),
            Column::Tags => caseless(Some(&a.tags_summary), Some(&b.tags_summary)),
        }
    }
}

impl std::str::FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" => Ok(Column::Id),
            "created" => Ok(Column::Created),
            "modified" => Ok(Column::Modified),
            "purpose" => Ok(Column::Purpose),
            "tags" => Ok(Column::Tags),
            other => Err(format!("unknown column: {}", other)),
        }
    }
}

fn caseless(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.unwrap_or("").to_lowercase();
    let b = b.unwrap_or("").to_lowercase();
    a.cmp(&b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Which column (if any) the view is sorted on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    sorted: Option<(Column, Direction)>,
}

impl SortState {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(column: Column, direction: Direction) -> Self {
        Self {
            sorted: Some((column, direction)),
        }
    }

    pub fn column(&self) -> Option<Column> {
        self.sorted.map(|(column, _)| column)
    }

    pub fn direction(&self) -> Option<Direction> {
        self.sorted.map(|(_, direction)| direction)
    }

    /// Advance the cycle for a header click
    ///
    /// Same column: ascending, then descending, then unsorted.
    /// Another column: ascending on that column.
    pub fn select(self, column: Column) -> Self {
        let sorted = match self.sorted {
            Some((current, Direction::Ascending)) if current == column => {
                Some((column, Direction::Descending))
            }
            Some((current, Direction::Descending)) if current == column => None,
            _ => Some((column, Direction::Ascending)),
        };
        Self { sorted }
    }

    /// Header text with a direction marker
    pub fn header_label(&self, column: Column) -> String {
        match self.sorted {
            Some((current, Direction::Ascending)) if current == column => {
                format!("{} ↑", column.title())
            }
            Some((current, Direction::Descending)) if current == column => {
                format!("{} ↓", column.title())
            }
            _ => column.title().to_string(),
        }
    }
}

/// Reorder rows for display
///
/// Unsorted keeps the incoming order. The sort is stable, so equal keys keep
/// their relevance/recency order.
pub fn apply(rows: &[RecordSummary], state: &SortState) -> Vec<RecordSummary> {
    let mut sorted = rows.to_vec();
    if let Some((column, direction)) = state.sorted {
        sorted.sort_by(|a, b| {
            let ordering = column.compare(a, b);
            match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, modified: &str, purpose: &str) -> RecordSummary {
        RecordSummary {
            id,
            created: "2025-01-01T00:00:00.000000Z".to_string(),
            modified: modified.to_string(),
            purpose: Some(purpose.to_string()),
            tags_summary: String::new(),
        }
    }

    fn rows() -> Vec<RecordSummary> {
        // Store order: modified descending
        vec![
            row(2, "2025-03-01T00:00:00.000000Z", "banana"),
            row(10, "2025-02-01T00:00:00.000000Z", "Apple"),
            row(1, "2025-01-01T00:00:00.000000Z", "cherry"),
        ]
    }

    fn ids(rows: &[RecordSummary]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_purpose_tri_state() {
        let original = rows();
        let state = SortState::unsorted();
        assert_eq!(ids(&apply(&original, &state)), vec![2, 10, 1]);

        let state = state.select(Column::Purpose);
        assert_eq!(ids(&apply(&original, &state)), vec![10, 2, 1]);

        let state = state.select(Column::Purpose);
        assert_eq!(ids(&apply(&original, &state)), vec![1, 2, 10]);

        let state = state.select(Column::Purpose);
        assert_eq!(state, SortState::unsorted());
        assert_eq!(ids(&apply(&original, &state)), vec![2, 10, 1]);
    }

    #[test]
    fn test_other_column_resets_to_ascending() {
        let state = SortState::unsorted()
            .select(Column::Purpose)
            .select(Column::Purpose)
            .select(Column::Id);
        assert_eq!(state, SortState::by(Column::Id, Direction::Ascending));
    }

    #[test]
    fn test_id_is_numeric() {
        let state = SortState::by(Column::Id, Direction::Ascending);
        assert_eq!(ids(&apply(&rows(), &state)), vec![1, 2, 10]);
    }

    #[test]
    fn test_timestamps_chronological() {
        let state = SortState::by(Column::Modified, Direction::Ascending);
        assert_eq!(ids(&apply(&rows(), &state)), vec![1, 10, 2]);
    }

    #[test]
    fn test_missing_purpose_sorts_first() {
        let mut input = rows();
        input[1].purpose = None;
        let state = SortState::by(Column::Purpose, Direction::Ascending);
        assert_eq!(ids(&apply(&input, &state)), vec![10, 2, 1]);
    }

    #[test]
    fn test_header_labels() {
        let state = SortState::by(Column::Tags, Direction::Descending);
        assert_eq!(state.header_label(Column::Tags), "Tags ↓");
        assert_eq!(state.header_label(Column::Id), "ID");
        assert_eq!(
            SortState::unsorted().select(Column::Id).header_label(Column::Id),
            "ID ↑"
        );
    }

    #[test]
    fn test_column_from_str() {
        assert_eq!("Purpose".parse::<Column>(), Ok(Column::Purpose));
        assert!("body".parse::<Column>().is_err());
    }
}
