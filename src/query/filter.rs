//! Series selection
//!
//! The remote catalog search narrows by description and facility, but the
//! remote matches loosely. Every returned descriptor is re-checked locally
//! with exact, case-sensitive comparisons.

use crate::types::SeriesDescriptor;

/// Exact-match criteria for selecting series from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesFilter {
    /// Required `description`
    pub description: String,
    /// Required `facility`
    pub facility: String,
    /// Required `name`, when selecting a single inspection
    pub name: Option<String>,
}

impl SeriesFilter {
    /// Select every series of a measurement kind in a facility
    pub fn new(description: impl Into<String>, facility: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            facility: facility.into(),
            name: None,
        }
    }

    /// Narrow the selection to series with exactly this name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check a descriptor against every criterion
    pub fn matches(&self, descriptor: &SeriesDescriptor) -> bool {
        descriptor.description == self.description
            && descriptor.facility == self.facility
            && self
                .name
                .as_deref()
                .map_or(true, |name| descriptor.name == name)
    }
}
