use std::collections::BTreeSet;

use crate::types::timestep_value;

/// Deduplicated ids collected during ingestion. Iteration order is lexical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdRegistry {
    ids: BTreeSet<String>,
}

impl IdRegistry {
    pub fn record(&mut self, id: &str) {
        self.ids.insert(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn extend(&mut self, other: IdRegistry) {
        self.ids.extend(other.ids);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registries {
    pub towers: IdRegistry,
    pub vehicles: IdRegistry,
    pub segments: IdRegistry,
    pub timesteps: IdRegistry,
}

impl Registries {
    pub fn merge(mut self, other: Registries) -> Registries {
        self.towers.extend(other.towers);
        self.vehicles.extend(other.vehicles);
        self.segments.extend(other.segments);
        self.timesteps.extend(other.timesteps);
        self
    }

    /// Timesteps in numeric order, paired with their raw text.
    /// Values that do not parse as numbers are left out.
    pub fn sorted_timesteps(&self) -> Vec<(f64, &str)> {
        let mut sorted: Vec<(f64, &str)> = self
            .timesteps
            .iter()
            .filter_map(|raw| match timestep_value(raw) {
                Some(value) => Some((value, raw)),
                None => {
                    log::warn!("Ignoring non-numeric timestep {}", raw);
                    None
                }
            })
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        sorted
    }
}
