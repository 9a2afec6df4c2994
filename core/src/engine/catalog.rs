//! Eligibility/lookup collaborator
//!
//! The code-rewriting side knows which routines are eligible and how their
//! frames are laid out. The engine only asks; it does not re-validate what a
//! catalog reports.

use super::types::RoutineLayout;
use std::collections::HashMap;

/// Source of routine layouts by name
pub trait RoutineCatalog {
    fn layout(&self, name: &str) -> Option<&'static RoutineLayout>;

    fn is_eligible(&self, name: &str) -> bool {
        self.layout(name).is_some()
    }
}

/// In-memory catalog of statically declared layouts
#[derive(Debug, Default)]
pub struct LayoutRegistry {
    layouts: HashMap<&'static str, &'static RoutineLayout>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layout, replacing any earlier one with the same name
    pub fn register(&mut self, layout: &'static RoutineLayout) -> &mut Self {
        if self.layouts.insert(layout.name(), layout).is_some() {
            tracing::debug!(routine = layout.name(), "replaced routine layout");
        }
        self
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl RoutineCatalog for LayoutRegistry {
    fn layout(&self, name: &str) -> Option<&'static RoutineLayout> {
        self.layouts.get(name).copied()
    }
}

impl FromIterator<&'static RoutineLayout> for LayoutRegistry {
    fn from_iter<I: IntoIterator<Item = &'static RoutineLayout>>(iter: I) -> Self {
        let mut registry = LayoutRegistry::new();
        for layout in iter {
            registry.register(layout);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::ValueKind;

    static PING: RoutineLayout = RoutineLayout::new("ping", 1, &[ValueKind::Int]);
    static PONG: RoutineLayout = RoutineLayout::new("pong", 2, &[]);

    #[test]
    fn test_lookup_and_eligibility() {
        let registry: LayoutRegistry = [&PING, &PONG].into_iter().collect();

        assert_eq!(registry.len(), 2);
        assert!(registry.is_eligible("ping"));
        assert!(!registry.is_eligible("pang"));
        assert_eq!(registry.layout("pong").unwrap().call_sites(), 2);
    }

    #[test]
    fn test_register_replaces_by_name() {
        static PING_V2: RoutineLayout = RoutineLayout::new("ping", 3, &[]);

        let mut registry = LayoutRegistry::new();
        registry.register(&PING).register(&PING_V2);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.layout("ping").unwrap().call_sites(), 3);
    }
}
