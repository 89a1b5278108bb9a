//! Projection of nested event records onto the fixed `events_table` row shape

use super::normalizer::{NestedEventRecord, ParamValue};
use crate::store::{Cell, ColumnDef, ColumnType};
use serde::Serialize;

/// Scalar record fields copied verbatim, in output order.
pub const SCALAR_COLUMNS: [&str; 3] = ["event_date", "event_timestamp", "event_name"];

/// Parameter keys lifted into their own column, in output order, with the
/// column's storage type. Every other parameter key is dropped.
pub const PROJECTED_PARAMS: [(&str, ColumnType); 6] = [
    ("ga_session_id", ColumnType::Integer),
    ("engaged_session_event", ColumnType::Integer),
    ("page_location", ColumnType::Text),
    ("page_title", ColumnType::Text),
    ("page_referrer", ColumnType::Text),
    ("source", ColumnType::Text),
];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FlatEventRow {
    pub event_date: Option<String>,
    pub event_timestamp: Option<String>,
    pub event_name: Option<String>,
    pub ga_session_id: Option<ParamValue>,
    pub engaged_session_event: Option<ParamValue>,
    pub page_location: Option<ParamValue>,
    pub page_title: Option<ParamValue>,
    pub page_referrer: Option<ParamValue>,
    pub source: Option<ParamValue>,
}

impl Serialize for ParamValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Str(s) => serializer.serialize_str(s),
            ParamValue::Int(i) => serializer.serialize_i64(*i),
        }
    }
}

/// Index of `key` in [`PROJECTED_PARAMS`].
fn projected_index(key: &str) -> Option<usize> {
    PROJECTED_PARAMS.iter().position(|(name, _)| *name == key)
}

impl FlatEventRow {
    /// Flatten one record.
    ///
    /// The parameter list is scanned once into one slot per
    /// [`PROJECTED_PARAMS`] entry; a repeated key keeps its last occurrence.
    pub fn from_record(record: &NestedEventRecord) -> Self {
        let mut projected: [Option<ParamValue>; 6] = Default::default();
        for param in &record.event_params {
            if let Some(idx) = projected_index(&param.key) {
                projected[idx] = param.value.resolve();
            }
        }

        let [ga_session_id, engaged_session_event, page_location, page_title, page_referrer, source] =
            projected;

        Self {
            event_date: record.event_date.clone(),
            event_timestamp: record.event_timestamp.clone(),
            event_name: record.event_name.clone(),
            ga_session_id,
            engaged_session_event,
            page_location,
            page_title,
            page_referrer,
            source,
        }
    }

    /// Projected values in [`PROJECTED_PARAMS`] order.
    fn projected(&self) -> [&Option<ParamValue>; 6] {
        [
            &self.ga_session_id,
            &self.engaged_session_event,
            &self.page_location,
            &self.page_title,
            &self.page_referrer,
            &self.source,
        ]
    }

    /// Output column names: scalars, then projected parameters.
    pub fn column_names() -> Vec<&'static str> {
        SCALAR_COLUMNS
            .iter()
            .copied()
            .chain(PROJECTED_PARAMS.iter().map(|(name, _)| *name))
            .collect()
    }

    /// Store schema for `events_table`.
    pub fn columns() -> Vec<ColumnDef> {
        SCALAR_COLUMNS
            .iter()
            .map(|name| ColumnDef::new(*name, ColumnType::Text))
            .chain(
                PROJECTED_PARAMS
                    .iter()
                    .map(|(name, column_type)| ColumnDef::new(*name, *column_type)),
            )
            .collect()
    }

    /// Values in [`FlatEventRow::column_names`] order.
    pub fn to_cells(&self) -> Vec<Cell> {
        let scalars = [&self.event_date, &self.event_timestamp, &self.event_name];

        scalars
            .into_iter()
            .map(|value| Cell::from(value.clone()))
            .chain(self.projected().into_iter().map(|value| match value {
                Some(ParamValue::Str(s)) => Cell::Text(s.clone()),
                Some(ParamValue::Int(i)) => Cell::Integer(*i),
                None => Cell::Null,
            }))
            .collect()
    }
}

/// Flatten a batch, preserving input order.
pub fn flatten_all(records: &[NestedEventRecord]) -> Vec<FlatEventRow> {
    records
        .iter()
        .map(|record| {
            let row = FlatEventRow::from_record(record);
            log::debug!(
                "Flattened event: {} at {}",
                row.event_name.as_deref().unwrap_or("<none>"),
                row.event_timestamp.as_deref().unwrap_or("<none>")
            );
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_core::normalizer::{EventParam, TaggedValue};

    fn param(key: &str, string_value: Option<&str>, int_value: Option<i64>) -> EventParam {
        EventParam {
            key: key.to_string(),
            value: TaggedValue {
                string_value: string_value.map(str::to_string),
                int_value,
            },
        }
    }

    fn record(params: Vec<EventParam>) -> NestedEventRecord {
        NestedEventRecord {
            event_date: Some("20231005".to_string()),
            event_timestamp: Some("1696470418877027".to_string()),
            event_name: Some("page_view".to_string()),
            event_params: params,
        }
    }

    #[test]
    fn test_absent_keys_are_null() {
        let row = FlatEventRow::from_record(&record(vec![param("page_title", Some("SuperJ"), None)]));

        assert_eq!(row.page_title, Some(ParamValue::Str("SuperJ".to_string())));
        assert_eq!(row.ga_session_id, None);
        assert_eq!(row.page_referrer, None);
        assert_eq!(row.source, None);
    }

    #[test]
    fn test_integer_only_value() {
        let row = FlatEventRow::from_record(&record(vec![param("ga_session_id", None, Some(84321567))]));
        assert_eq!(row.ga_session_id, Some(ParamValue::Int(84321567)));
    }

    #[test]
    fn test_both_tags_yield_string() {
        let row = FlatEventRow::from_record(&record(vec![param("source", Some("google"), Some(3))]));
        assert_eq!(row.source, Some(ParamValue::Str("google".to_string())));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let row = FlatEventRow::from_record(&record(vec![
            param("page_location", Some("https://first/"), None),
            param("page_location", Some("https://second/"), None),
        ]));
        assert_eq!(row.page_location, Some(ParamValue::Str("https://second/".to_string())));
    }

    #[test]
    fn test_last_occurrence_wins_even_when_empty() {
        let row = FlatEventRow::from_record(&record(vec![
            param("page_location", Some("https://first/"), None),
            param("page_location", None, None),
        ]));
        assert_eq!(row.page_location, None);
    }

    #[test]
    fn test_unprojected_keys_dropped() {
        let row = FlatEventRow::from_record(&record(vec![
            param("percent_scrolled", None, Some(90)),
            param("medium", Some("referral"), None),
        ]));
        assert_eq!(
            row,
            FlatEventRow {
                event_date: Some("20231005".to_string()),
                event_timestamp: Some("1696470418877027".to_string()),
                event_name: Some("page_view".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_cells_follow_column_order() {
        let row = FlatEventRow::from_record(&record(vec![
            param("source", Some("m.facebook.com"), None),
            param("engaged_session_event", None, Some(1)),
        ]));
        let cells = row.to_cells();

        assert_eq!(cells.len(), FlatEventRow::column_names().len());
        assert_eq!(cells[2], Cell::from("page_view"));
        assert_eq!(cells[4], Cell::Integer(1));
        assert_eq!(cells[5], Cell::Null);
        assert_eq!(cells[8], Cell::from("m.facebook.com"));

        let names: Vec<String> = FlatEventRow::columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, FlatEventRow::column_names());
    }

    #[test]
    fn test_flatten_all_preserves_order() {
        let mut second = record(vec![]);
        second.event_name = Some("scroll".to_string());
        let rows = flatten_all(&[record(vec![]), second]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_name.as_deref(), Some("page_view"));
        assert_eq!(rows[1].event_name.as_deref(), Some("scroll"));
    }

    #[test]
    fn test_schema_follows_projection_list() {
        let columns = FlatEventRow::columns();
        assert_eq!(columns.len(), SCALAR_COLUMNS.len() + PROJECTED_PARAMS.len());

        let params: Vec<EventParam> = PROJECTED_PARAMS
            .iter()
            .enumerate()
            .map(|(idx, (key, _))| param(key, None, Some(idx as i64 + 10)))
            .collect();
        let cells = FlatEventRow::from_record(&record(params)).to_cells();

        for (idx, (key, column_type)) in PROJECTED_PARAMS.iter().enumerate() {
            let column = &columns[SCALAR_COLUMNS.len() + idx];
            assert_eq!(column.name, *key);
            assert_eq!(column.column_type, *column_type);
            assert_eq!(cells[SCALAR_COLUMNS.len() + idx], Cell::Integer(idx as i64 + 10));
        }
    }

    #[test]
    fn test_row_serializes_to_json() {
        let row = FlatEventRow::from_record(&record(vec![param("ga_session_id", None, Some(5))]));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["ga_session_id"], 5);
        assert!(json["source"].is_null());
    }
}
