//! Network member
//!
//! A member originates its own data and accumulates everything delivered to
//! it in a separate received dataset.

use crate::rp_dataset::{Dataset, DatasetError};
use crate::rp_interface::{Frequency, MemberName, Timestamp};
use std::fmt;

#[derive(Debug, Clone)]
pub struct Member {
    name: MemberName,
    own_data: Option<Dataset>,
    received_data: Option<Dataset>,
}

impl Member {
    pub fn new(name: impl Into<MemberName>) -> Self {
        Self {
            name: name.into(),
            own_data: None,
            received_data: None,
        }
    }

    pub fn with_data(name: impl Into<MemberName>, own_data: Dataset) -> Self {
        Self {
            name: name.into(),
            own_data: Some(own_data),
            received_data: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn own_data(&self) -> Option<&Dataset> {
        self.own_data.as_ref()
    }

    pub fn received_data(&self) -> Option<&Dataset> {
        self.received_data.as_ref()
    }

    /// Column names this member is authoritative for
    pub fn datasets(&self) -> Vec<&str> {
        self.own_data
            .as_ref()
            .map(|data| data.column_names().collect())
            .unwrap_or_default()
    }

    /// Step of whichever dataset the member holds (own data first)
    pub fn frequency(&self) -> Option<Frequency> {
        self.own_data
            .as_ref()
            .or(self.received_data.as_ref())
            .map(Dataset::frequency)
    }

    /// Store the first delivery as-is, merge (add) every later one.
    ///
    /// Delivering an overlapping slice twice counts it twice. On error the
    /// received data is left untouched.
    pub fn receive(&mut self, slice: &Dataset) -> Result<(), DatasetError> {
        self.received_data = Some(self.merged_received(slice)?);
        Ok(())
    }

    /// The received data `receive(slice)` would leave behind, without storing it
    pub fn merged_received(&self, slice: &Dataset) -> Result<Dataset, DatasetError> {
        match &self.received_data {
            Some(received) => received.merge(slice),
            None => Ok(slice.clone()),
        }
    }

    pub(crate) fn replace_received(&mut self, received: Dataset) {
        self.received_data = Some(received);
    }

    pub fn add_own_data(&mut self, data: Dataset) -> Result<(), DatasetError> {
        self.own_data = Some(match &self.own_data {
            Some(own) => own.merge(&data)?,
            None => data,
        });
        Ok(())
    }

    /// Drop one own column; returns whether it existed
    pub fn remove_own_data(&mut self, column: &str) -> bool {
        self.own_data
            .as_mut()
            .is_some_and(|data| data.remove_column(column).is_some())
    }

    /// One period elapsed: the own data gains one observed grid point
    pub fn tick(&mut self) {
        if let Some(own) = self.own_data.as_mut() {
            own.add_observation();
        }
    }

    /// Grid points of the received data where `column` is nonzero
    pub fn observations(&self, column: &str) -> usize {
        self.received_data
            .as_ref()
            .map_or(0, |received| received.nonzero_count(column))
    }

    pub fn earliest(&self) -> Option<Timestamp> {
        [&self.own_data, &self.received_data]
            .into_iter()
            .flatten()
            .filter_map(Dataset::earliest)
            .min()
    }

    pub fn latest(&self) -> Option<Timestamp> {
        [&self.own_data, &self.received_data]
            .into_iter()
            .flatten()
            .filter_map(Dataset::latest)
            .max()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Member \"{}\" with", self.name)?;
        match &self.own_data {
            Some(own) if !own.is_empty() => writeln!(
                f,
                "  Own data: {:?} from {} til {}",
                own.column_names().collect::<Vec<_>>(),
                fmt_bound(own.earliest()),
                fmt_bound(own.latest())
            )?,
            _ => writeln!(f, "  No own data.")?,
        }
        match &self.received_data {
            Some(received) => write!(
                f,
                "  Received: {:?} with earliest on {} and latest on {}",
                received.column_names().collect::<Vec<_>>(),
                fmt_bound(received.earliest()),
                fmt_bound(received.latest())
            ),
            None => write!(f, "  No received data."),
        }
    }
}

fn fmt_bound(bound: Option<Timestamp>) -> String {
    bound.map_or_else(|| "-".to_string(), |t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rp_interface::{parse_timestamp, TimeRange};

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    fn hourly(from: &str, to: &str, columns: &[&str]) -> Dataset {
        Dataset::observed(Frequency::hours(1), TimeRange::closed(ts(from), ts(to)), columns)
    }

    #[test]
    fn test_receive_copies_then_accumulates() {
        let mut member = Member::new("comfy");
        assert_eq!(member.observations("x"), 0);

        let slice = hourly("2000-01-01 00:00", "2000-01-01 02:00", &["x"]);
        member.receive(&slice).unwrap();
        assert_eq!(member.received_data(), Some(&slice));
        assert_eq!(member.observations("x"), 3);

        // same range again: still 3 points, but each counted twice
        member.receive(&slice).unwrap();
        let received = member.received_data().unwrap();
        assert_eq!(received.column("x").unwrap(), &[2, 2, 2]);
        assert_eq!(member.observations("x"), 3);
    }

    #[test]
    fn test_failed_receive_keeps_previous_data() {
        let mut member = Member::new("nice");
        let slice = hourly("2000-01-01 00:00", "2000-01-01 02:00", &["x"]);
        member.receive(&slice).unwrap();

        let other = Dataset::observed(
            Frequency::minutes(10),
            TimeRange::point(ts("2000-01-01 00:00")),
            &["x"],
        );
        assert!(member.merged_received(&other).is_err());
        assert!(member.receive(&other).is_err());
        assert_eq!(member.received_data(), Some(&slice));
    }

    #[test]
    fn test_merged_received_leaves_member_untouched() {
        let member = Member::new("preview");
        let slice = hourly("2000-01-01 00:00", "2000-01-01 01:00", &["x"]);

        assert_eq!(member.merged_received(&slice).unwrap(), slice);
        assert!(member.received_data().is_none());
    }

    #[test]
    fn test_own_data_grows_and_ticks() {
        let mut member = Member::with_data("value", hourly("2000-01-01 00:00", "2000-01-01 01:00", &["a"]));
        member
            .add_own_data(hourly("2000-01-01 00:00", "2000-01-01 01:00", &["b"]))
            .unwrap();
        assert_eq!(member.datasets(), vec!["a", "b"]);

        member.tick();
        let own = member.own_data().unwrap();
        assert_eq!(own.latest(), Some(ts("2000-01-01 02:00")));
        assert_eq!(own.value_at("b", ts("2000-01-01 02:00")), 1);

        assert!(member.remove_own_data("a"));
        assert!(!member.remove_own_data("a"));
        assert_eq!(member.datasets(), vec!["b"]);
    }

    #[test]
    fn test_tick_without_own_data_is_noop() {
        let mut member = Member::new("idle");
        member.tick();
        assert!(member.own_data().is_none());
        assert_eq!(member.frequency(), None);
    }

    #[test]
    fn test_bounds_span_own_and_received() {
        let mut member = Member::with_data("bounds", hourly("2000-01-02 00:00", "2000-01-02 05:00", &["a"]));
        member
            .receive(&hourly("2000-01-01 00:00", "2000-01-01 03:00", &["x"]))
            .unwrap();

        assert_eq!(member.earliest(), Some(ts("2000-01-01 00:00")));
        assert_eq!(member.latest(), Some(ts("2000-01-02 05:00")));

        let rendered = member.to_string();
        assert!(rendered.starts_with("Member \"bounds\" with"));
        assert!(rendered.contains("Received: [\"x\"]"));
    }
}
