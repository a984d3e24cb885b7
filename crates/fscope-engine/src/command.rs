//! Bounded, ordered command tables.

use std::rc::Rc;

use crate::dispatch::Engine;
use crate::error::EngineError;
use crate::session::Session;

/// A command handler. Handlers receive the engine (for registry lookups and
/// completion), the mutable session, and the full original command line so
/// they can parse their own arguments.
pub type Handler = Rc<dyn Fn(&Engine, &mut Session, &str) -> anyhow::Result<()>>;

/// Default capacity for a command table.
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

/// An ordered name → handler mapping with a fixed capacity.
///
/// Names are compared case-insensitively at lookup time. Duplicate names
/// within one table are permitted; the first registered wins (there is no
/// dedup pass). Tables are populated once at registration time and read-only
/// afterwards.
pub struct CommandTable {
    entries: Vec<(String, Handler)>,
    capacity: usize,
}

impl CommandTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Handler,
    ) -> Result<(), EngineError> {
        let name = name.into();
        if self.entries.len() >= self.capacity {
            return Err(EngineError::CommandTableFull {
                name,
                capacity: self.capacity,
            });
        }
        self.entries.push((name, handler));
        Ok(())
    }

    /// Case-insensitive linear scan in registration order; first match wins.
    pub fn lookup(&self, name: &str) -> Option<&Handler> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, handler)| handler)
    }

    /// Every name with byte prefix `partial`, in registration order. The
    /// order is stable across calls: the completion resolver indexes into
    /// this sequence by position.
    pub fn prefix_matches<'t>(&'t self, partial: &str) -> Vec<&'t str> {
        self.entries
            .iter()
            .filter(|(name, _)| name.starts_with(partial))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Rc::new(|_, _, _| Ok(()))
    }

    #[test]
    fn lookup_is_case_insensitive_first_match() {
        let mut table = CommandTable::new(4);
        table.register("show", noop()).unwrap();
        table.register("SHOW", noop()).unwrap();
        assert!(table.lookup("Show").is_some());
        // First registered wins: the handle returned is entry 0's.
        let first = table.lookup("show").unwrap();
        assert!(Rc::ptr_eq(first, &table.entries[0].1));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = CommandTable::new(1);
        table.register("a", noop()).unwrap();
        let err = table.register("b", noop()).unwrap_err();
        assert!(matches!(err, EngineError::CommandTableFull { .. }));
    }

    #[test]
    fn prefix_matches_in_registration_order() {
        let mut table = CommandTable::new(8);
        for name in ["setoffset", "show", "setdevice", "next"] {
            table.register(name, noop()).unwrap();
        }
        let got = table.prefix_matches("se");
        assert_eq!(got, vec!["setoffset", "setdevice"]);
        // Deterministic across calls.
        assert_eq!(table.prefix_matches("se"), got);
    }

    #[test]
    fn prefix_matching_is_case_sensitive() {
        let mut table = CommandTable::new(4);
        table.register("Show", noop()).unwrap();
        assert!(table.prefix_matches("sh").is_empty());
        assert_eq!(table.prefix_matches("Sh").len(), 1);
    }
}
