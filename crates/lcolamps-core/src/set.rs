// ── Lamp set ──
//
// The named collection of all configured lamps. Built once at startup,
// read-only thereafter except for the lamps' runtime fields. Iteration
// order is configuration order everywhere -- resolution of "all",
// status snapshots, and result maps all agree on it.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::{BackendKind, LampConfig};
use crate::error::CoreError;
use crate::lamp::{Lamp, LampState};

/// Which lamps a switch request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LampSelector {
    /// Every configured lamp, in configuration order.
    All,
    /// An explicit, non-empty list of lamp names (case-insensitive).
    Named(Vec<String>),
}

/// All configured lamps, keyed by lowercased name.
pub struct LampSet {
    lamps: IndexMap<String, Arc<Lamp>>,
}

impl LampSet {
    /// Build the set from configuration, preserving order.
    ///
    /// Fails on empty or duplicate names (duplicates are detected
    /// case-insensitively, matching lookup semantics).
    pub fn new(configs: Vec<LampConfig>) -> Result<Self, CoreError> {
        let mut lamps = IndexMap::with_capacity(configs.len());
        for config in configs {
            if config.name.trim().is_empty() {
                return Err(CoreError::Config {
                    message: "lamp with empty name".into(),
                });
            }
            let key = config.name.to_lowercase();
            if lamps.contains_key(&key) {
                return Err(CoreError::Config {
                    message: format!("duplicate lamp name: {}", config.name),
                });
            }
            lamps.insert(key, Arc::new(Lamp::new(config)));
        }
        Ok(Self { lamps })
    }

    pub fn len(&self) -> usize {
        self.lamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lamps.is_empty()
    }

    /// Look up one lamp by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&Arc<Lamp>> {
        self.lamps.get(&name.to_lowercase())
    }

    /// All lamps in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Lamp>> {
        self.lamps.values()
    }

    /// Expand a selector into lamps, configuration order for `All`,
    /// request order (deduplicated) for named targets.
    ///
    /// Fails with [`CoreError::UnknownLamp`] if any requested name is
    /// not configured -- before any side effect happens.
    pub fn resolve(&self, selector: &LampSelector) -> Result<Vec<Arc<Lamp>>, CoreError> {
        match selector {
            LampSelector::All => Ok(self.lamps.values().map(Arc::clone).collect()),
            LampSelector::Named(names) => {
                let mut resolved: Vec<Arc<Lamp>> = Vec::with_capacity(names.len());
                for name in names {
                    let lamp = self.get(name).ok_or_else(|| CoreError::UnknownLamp {
                        name: name.clone(),
                    })?;
                    // A name listed twice still gets exactly one command.
                    if !resolved.iter().any(|l| Arc::ptr_eq(l, lamp)) {
                        resolved.push(Arc::clone(lamp));
                    }
                }
                Ok(resolved)
            }
        }
    }

    /// Group lamps by backend kind for batched driver calls,
    /// preserving input order within each group.
    pub fn group_by_backend(lamps: &[Arc<Lamp>]) -> IndexMap<BackendKind, Vec<Arc<Lamp>>> {
        let mut groups: IndexMap<BackendKind, Vec<Arc<Lamp>>> = IndexMap::new();
        for lamp in lamps {
            groups
                .entry(lamp.backend())
                .or_default()
                .push(Arc::clone(lamp));
        }
        groups
    }

    /// Snapshot of every lamp's current state, configuration order,
    /// keyed by display name.
    pub fn status(&self) -> IndexMap<String, LampState> {
        self.lamps
            .values()
            .map(|lamp| (lamp.name().to_string(), lamp.state()))
            .collect()
    }
}
