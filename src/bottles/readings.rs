use std::ops::Deref;

use super::head::HeadRef;
use crate::codec;
use crate::utils::error::OxitopError;

/// The readings header field whose meaning is unknown; the unit usually
/// sends 247 but 0 has been seen too.
pub const DEFAULT_MARKER: u16 = 247;

/// Sensor readings of one head, in measurement order. Never modified in
/// place; fetch or build a new value instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BottleReadings {
    head: HeadRef,
    marker: u16,
    values: Vec<i32>,
}

impl BottleReadings {
    pub fn new(head: HeadRef, values: Vec<i32>) -> Self {
        Self::with_marker(head, DEFAULT_MARKER, values)
    }

    pub fn with_marker(head: HeadRef, marker: u16, values: Vec<i32>) -> Self {
        Self { head, marker, values }
    }

    pub fn head(&self) -> &HeadRef {
        &self.head
    }

    pub fn marker(&self) -> u16 {
        self.marker
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn to_wire(&self) -> String {
        codec::encode_readings(self)
    }

    pub fn from_wire(head: HeadRef, data: &str) -> Result<Self, OxitopError> {
        codec::decode_readings(head, data)
    }

    pub(crate) fn rebind(&mut self, head: HeadRef) {
        self.head = head;
    }
}

impl Deref for BottleReadings {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        &self.values
    }
}

impl<'a> IntoIterator for &'a BottleReadings {
    type Item = &'a i32;
    type IntoIter = std::slice::Iter<'a, i32>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
