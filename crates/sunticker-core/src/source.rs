use std::collections::HashSet;
use std::time::Duration;

use crate::error::CoreError;

/// One entry of the rotation: what to query and how to label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Provider lookup key, e.g. `total_dcpower` or `temperature`.
    pub key: String,
    /// Long name shown as scrolling text.
    pub display_name: String,
    /// Short label with unit shown statically, e.g. `P W`.
    pub alias_label: String,
    /// Served by the inverter rather than local sensors.
    pub is_remote: bool,
    pub dwell_secs: u64,
}

impl SourceDescriptor {
    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_secs)
    }
}

/// Ordered, non-empty list of sources with unique keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSequence(Vec<SourceDescriptor>);

impl SourceSequence {
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self, CoreError> {
        if sources.is_empty() {
            return Err(CoreError::EmptyRotation);
        }
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.key.as_str()) {
                return Err(CoreError::DuplicateKey {
                    key: source.key.clone(),
                });
            }
            if source.dwell_secs == 0 {
                return Err(CoreError::ZeroDwell {
                    key: source.key.clone(),
                });
            }
        }
        Ok(Self(sources))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a constructed sequence.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Descriptor at `index`, wrapping modulo the length.
    pub fn at(&self, index: usize) -> &SourceDescriptor {
        &self.0[index % self.0.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.0.iter()
    }
}
