//! Manually recorded clinical events (dialysis start, transplant, death...).

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use renal_model::{EventRecord, PatientKey};

/// Earliest dated occurrence per patient and event type.
pub type ManualEvents = BTreeMap<PatientKey, BTreeMap<String, NaiveDate>>;

/// Pivots event records to the earliest date per (patient, event type).
///
/// Event types are trimmed; undated events are ignored.
pub fn earliest_events(events: &[EventRecord]) -> ManualEvents {
    let mut pivot = ManualEvents::new();
    for event in events {
        let Some(date) = event.event_date else {
            continue;
        };
        let event_type = event.event_type.trim();
        if event_type.is_empty() {
            continue;
        }
        pivot
            .entry(event.key.clone())
            .or_default()
            .entry(event_type.to_string())
            .and_modify(|earliest| *earliest = (*earliest).min(date))
            .or_insert(date);
    }
    pivot
}

/// Distinct event types across all patients, sorted.
pub fn event_types(events: &ManualEvents) -> Vec<String> {
    events
        .values()
        .flat_map(BTreeMap::keys)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: &str, event_type: &str, date: Option<(i32, u32, u32)>) -> EventRecord {
        EventRecord {
            key: PatientKey::new("A", code).unwrap(),
            event_type: event_type.to_string(),
            event_date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
        }
    }

    #[test]
    fn test_earliest_date_wins() {
        let events = vec![
            event("1", "dialysis", Some((2022, 5, 1))),
            event("1", "dialysis", Some((2021, 3, 1))),
            event("1", "transplant", None),
            event("2", " death ", Some((2023, 1, 1))),
        ];
        let pivot = earliest_events(&events);

        let first = &pivot[&PatientKey::new("A", "1").unwrap()];
        assert_eq!(first.len(), 1);
        assert_eq!(first["dialysis"], NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert_eq!(event_types(&pivot), vec!["death", "dialysis"]);
    }
}
