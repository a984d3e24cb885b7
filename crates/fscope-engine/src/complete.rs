//! Indexed command completion.
//!
//! The line-editing collaborator asks for one candidate at a time with an
//! increasing index (interactive completion cycling). Enumeration uses the
//! same scope priority as the dispatcher — active type, filesystem, general
//! — with the built-in `quit` as an implicit fourth scope checked last.
//! Duplicates across scopes are preserved; the enumeration is pure and
//! deterministic for a fixed (active type, partial) pair.

use crate::dispatch::Engine;
use crate::types::TypeId;

impl Engine {
    /// The candidate at zero-based `index` among all names with prefix
    /// `partial`, or `None` once `index` walks past the last match.
    pub fn complete(&self, active: Option<TypeId>, partial: &str, index: usize) -> Option<&str> {
        let mut remaining = index;

        if let Some(id) = active {
            for name in self.registry().get(id).commands.prefix_matches(partial) {
                if remaining == 0 {
                    return Some(name);
                }
                remaining -= 1;
            }
        }
        for name in self.filesystem().prefix_matches(partial) {
            if remaining == 0 {
                return Some(name);
            }
            remaining -= 1;
        }
        for name in self.general().prefix_matches(partial) {
            if remaining == 0 {
                return Some(name);
            }
            remaining -= 1;
        }

        if "quit".starts_with(partial) && remaining == 0 {
            return Some("quit");
        }

        None
    }

    /// All completions of `partial`, in enumeration order. Convenience for
    /// collaborators (and tests) that want the whole candidate list at once.
    pub fn completions(&self, active: Option<TypeId>, partial: &str) -> Vec<String> {
        let mut all = Vec::new();
        while let Some(candidate) = self.complete(active, partial, all.len()) {
            all.push(candidate.to_string());
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::command::{CommandTable, Handler};
    use crate::dispatch::Engine;
    use crate::types::{TypeDescriptor, TypeRegistry};
    use fscope_descriptors::StructDescriptor;

    fn noop() -> Handler {
        Rc::new(|_, _, _| Ok(()))
    }

    fn table(names: &[&str]) -> CommandTable {
        let mut table = CommandTable::new(16);
        for name in names {
            table.register(*name, noop()).unwrap();
        }
        table
    }

    fn engine_with_type(
        general: &[&str],
        filesystem: &[&str],
        type_names: &[&str],
    ) -> (Engine, crate::types::TypeId) {
        let mut registry = TypeRegistry::new(4);
        let id = registry
            .register(TypeDescriptor {
                name: "super_block".to_string(),
                layout: StructDescriptor {
                    name: "super_block".to_string(),
                    fields: vec![],
                },
                commands: table(type_names),
            })
            .unwrap();
        (Engine::new(table(general), table(filesystem), registry), id)
    }

    #[test]
    fn enumerates_in_scope_priority_order_with_duplicates() {
        let (engine, id) = engine_with_type(
            &["show", "setoffset"],
            &["super", "show"],
            &["show", "shift"],
        );

        let got = engine.completions(Some(id), "s");
        assert_eq!(got, vec!["show", "shift", "super", "show", "show", "setoffset"]);
    }

    #[test]
    fn inactive_type_scope_is_skipped() {
        let (engine, _) = engine_with_type(&["show"], &["super"], &["shift"]);
        let got = engine.completions(None, "s");
        assert_eq!(got, vec!["super", "show"]);
    }

    #[test]
    fn quit_is_the_implicit_last_candidate() {
        let (engine, _) = engine_with_type(&["query"], &[], &[]);
        assert_eq!(engine.completions(None, "qu"), vec!["query", "quit"]);
        assert_eq!(engine.completions(None, "quit"), vec!["quit"]);
    }

    #[test]
    fn index_past_the_end_returns_none() {
        let (engine, _) = engine_with_type(&["show"], &[], &[]);
        assert_eq!(engine.complete(None, "sh", 0), Some("show"));
        assert_eq!(engine.complete(None, "sh", 1), None);
        assert_eq!(engine.complete(None, "sh", 100), None);
    }

    /// Calling from index 0 again yields the identical sequence: the
    /// resolver holds no hidden state.
    #[test]
    fn enumeration_is_idempotent() {
        let (engine, id) = engine_with_type(&["show"], &["show"], &["show"]);
        let first = engine.completions(Some(id), "sh");
        let second = engine.completions(Some(id), "sh");
        assert_eq!(first, vec!["show", "show", "show"]);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_partial_matches_everything() {
        let (engine, _) = engine_with_type(&["help"], &["super"], &[]);
        assert_eq!(engine.completions(None, ""), vec!["super", "help", "quit"]);
    }
}
