use std::ops::Range;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use super::field::{Field, FIELD_COUNT};

/// Half-open wire-byte interval `[start, end)` within the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn new(start: usize, end: usize) -> Interval {
        Interval { start, end }
    }
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
    pub fn contains(&self, offset: usize) -> bool {
        self.range().contains(&offset)
    }
}

/// Where each recognized field sits in the image it was parsed from.
///
/// Serializes to an object keyed by [`Field::name`], in image order:
///
/// ```json
/// {"fixed":{"start":0,"end":2},"stretch-gain":{"start":2,"end":4}, ...}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressMap {
    slots: [Option<Interval>; FIELD_COUNT],
}

impl AddressMap {
    pub(crate) fn record(&mut self, field: Field, interval: Interval) {
        self.slots[field.index()] = Some(interval);
    }

    /// Interval of `field`, if it was recorded.
    pub fn get(&self, field: Field) -> Option<Interval> {
        self.slots[field.index()]
    }

    /// Recorded fields with their intervals, in image order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, Interval)> + '_ {
        Field::ALL
            .iter()
            .filter_map(move |&f| self.get(f).map(|interval| (f, interval)))
    }

    /// Field covering wire byte `offset`, or `None` for reserved bytes.
    pub fn field_at(&self, offset: usize) -> Option<Field> {
        self.iter()
            .find(|(_, interval)| interval.contains(offset))
            .map(|(f, _)| f)
    }
}

impl Serialize for AddressMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.iter().count()))?;
        for (field, interval) in self.iter() {
            map.serialize_entry(field.name(), &interval)?;
        }
        map.end()
    }
}
