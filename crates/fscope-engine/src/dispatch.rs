//! The dispatcher: three-scope command resolution.

use anyhow::Result;

use crate::command::{CommandTable, Handler};
use crate::error::EngineError;
use crate::session::Session;
use crate::types::{TypeDescriptor, TypeId, TypeRegistry};
use crate::words;

/// What the session loop should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// The engine: the three command scopes plus the type catalogue. Populated
/// at startup, immutable for the rest of the session.
pub struct Engine {
    general: CommandTable,
    filesystem: CommandTable,
    registry: TypeRegistry,
}

impl Engine {
    pub fn new(general: CommandTable, filesystem: CommandTable, registry: TypeRegistry) -> Self {
        Self {
            general,
            filesystem,
            registry,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn general(&self) -> &CommandTable {
        &self.general
    }

    pub fn filesystem(&self) -> &CommandTable {
        &self.filesystem
    }

    /// Resolve and run one command line.
    ///
    /// The first word is the command name (case-insensitive); the handler
    /// receives the full original line. `quit` returns [`Control::Quit`]
    /// before any table is consulted and can never be shadowed. Scope
    /// priority is: active type's commands, then filesystem commands, then
    /// general commands — so a type may redefine what e.g. `show` means for
    /// its structure without the general command being touched.
    ///
    /// An unrecognized command is a normal, recoverable outcome surfaced as
    /// [`EngineError::UnknownCommand`]; use [`Engine::dispatch_and_report`]
    /// at the loop boundary to turn it (and handler failures) into a
    /// diagnostic line.
    pub fn dispatch(&self, session: &mut Session, line: &str) -> Result<Control> {
        let name = words::first_word(line);
        if name.is_empty() {
            return Ok(Control::Continue);
        }
        if name.eq_ignore_ascii_case("quit") {
            return Ok(Control::Quit);
        }

        let handler: Option<Handler> = session
            .active
            .map(|id| self.registry.get(id))
            .and_then(|t: &TypeDescriptor| t.commands.lookup(name))
            .or_else(|| self.filesystem.lookup(name))
            .or_else(|| self.general.lookup(name))
            .cloned();

        match handler {
            Some(handler) => {
                handler(self, session, line)?;
                Ok(Control::Continue)
            }
            None => Err(EngineError::UnknownCommand {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Dispatch, reporting any failure as one diagnostic line on the render
    /// sink. Nothing in normal command execution unwinds past this point.
    pub fn dispatch_and_report(&self, session: &mut Session, line: &str) -> Control {
        match self.dispatch(session, line) {
            Ok(control) => control,
            Err(err) => {
                session.report(&format!("error: {err:#}"));
                Control::Continue
            }
        }
    }

    /// Activate a structure kind. The engine trusts the caller that a
    /// device/offset context has been established separately.
    pub fn activate(&self, session: &mut Session, id: TypeId) {
        debug_assert!(id.index() < self.registry.len());
        session.active = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::command::CommandTable;
    use crate::session::{MemorySink, Session};
    use crate::types::{TypeDescriptor, TypeRegistry};
    use fscope_descriptors::StructDescriptor;

    type Calls = Rc<RefCell<Vec<String>>>;

    fn recorder(calls: &Calls, tag: &str) -> Handler {
        let calls = Rc::clone(calls);
        let tag = tag.to_string();
        Rc::new(move |_, _, line| {
            calls.borrow_mut().push(format!("{tag}:{line}"));
            Ok(())
        })
    }

    fn empty_layout(name: &str) -> StructDescriptor {
        StructDescriptor {
            name: name.to_string(),
            fields: vec![],
        }
    }

    fn session() -> Session {
        Session::new(Box::<MemorySink>::default(), 4)
    }

    /// general `show` + type-level `show`: activation flips the winner.
    #[test]
    fn type_scope_overrides_general_scope() {
        let calls: Calls = Rc::default();

        let mut general = CommandTable::new(8);
        general.register("show", recorder(&calls, "general")).unwrap();

        let mut type_commands = CommandTable::new(8);
        type_commands
            .register("show", recorder(&calls, "type"))
            .unwrap();

        let mut registry = TypeRegistry::new(8);
        let id = registry
            .register(TypeDescriptor {
                name: "super_block".to_string(),
                layout: empty_layout("super_block"),
                commands: type_commands,
            })
            .unwrap();

        let engine = Engine::new(general, CommandTable::new(8), registry);
        let mut session = session();

        engine.dispatch(&mut session, "show").unwrap();
        engine.activate(&mut session, id);
        engine.dispatch(&mut session, "show").unwrap();
        session.active = None;
        engine.dispatch(&mut session, "show").unwrap();

        assert_eq!(
            *calls.borrow(),
            vec!["general:show", "type:show", "general:show"]
        );
    }

    #[test]
    fn handler_receives_the_full_line() {
        let calls: Calls = Rc::default();
        let mut general = CommandTable::new(8);
        general.register("show", recorder(&calls, "g")).unwrap();
        let engine = Engine::new(general, CommandTable::new(8), TypeRegistry::new(4));

        engine
            .dispatch(&mut session(), "show extra args")
            .unwrap();
        assert_eq!(*calls.borrow(), vec!["g:show extra args"]);
    }

    #[test]
    fn quit_is_unshadowable_and_case_insensitive() {
        let calls: Calls = Rc::default();
        let mut general = CommandTable::new(8);
        general.register("quit", recorder(&calls, "g")).unwrap();
        let engine = Engine::new(general, CommandTable::new(8), TypeRegistry::new(4));

        let mut session = session();
        assert_eq!(engine.dispatch(&mut session, "quit").unwrap(), Control::Quit);
        assert_eq!(engine.dispatch(&mut session, "QUIT").unwrap(), Control::Quit);
        assert_eq!(
            engine.dispatch(&mut session, "Quit now").unwrap(),
            Control::Quit
        );
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn unknown_command_is_reported_not_fatal() {
        let engine = Engine::new(
            CommandTable::new(4),
            CommandTable::new(4),
            TypeRegistry::new(4),
        );
        let mut session = session();

        let err = engine.dispatch(&mut session, "zap").unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(
            engine_err,
            EngineError::UnknownCommand { name } if name == "zap"
        ));

        assert_eq!(
            engine.dispatch_and_report(&mut session, "zap"),
            Control::Continue
        );
    }

    /// Register type T with `zap`; unknown without activation, found after.
    #[test]
    fn type_commands_require_activation() {
        let calls: Calls = Rc::default();
        let mut type_commands = CommandTable::new(4);
        type_commands.register("zap", recorder(&calls, "t")).unwrap();

        let mut registry = TypeRegistry::new(4);
        let id = registry
            .register(TypeDescriptor {
                name: "inode".to_string(),
                layout: empty_layout("inode"),
                commands: type_commands,
            })
            .unwrap();

        let engine = Engine::new(CommandTable::new(4), CommandTable::new(4), registry);
        let mut session = session();

        assert!(engine.dispatch(&mut session, "zap").is_err());
        engine.activate(&mut session, id);
        engine.dispatch(&mut session, "zap").unwrap();
        assert_eq!(*calls.borrow(), vec!["t:zap"]);
    }

    #[test]
    fn filesystem_scope_sits_between_type_and_general() {
        let calls: Calls = Rc::default();

        let mut general = CommandTable::new(4);
        general.register("super", recorder(&calls, "general")).unwrap();
        let mut filesystem = CommandTable::new(4);
        filesystem
            .register("super", recorder(&calls, "fs"))
            .unwrap();

        let engine = Engine::new(general, filesystem, TypeRegistry::new(4));
        engine.dispatch(&mut session(), "super").unwrap();
        assert_eq!(*calls.borrow(), vec!["fs:super"]);
    }

    #[test]
    fn command_name_match_is_case_insensitive() {
        let calls: Calls = Rc::default();
        let mut general = CommandTable::new(4);
        general.register("show", recorder(&calls, "g")).unwrap();
        let engine = Engine::new(general, CommandTable::new(4), TypeRegistry::new(4));

        engine.dispatch(&mut session(), "SHOW fields").unwrap();
        assert_eq!(*calls.borrow(), vec!["g:SHOW fields"]);
    }

    #[test]
    fn legacy_word_rule_applies_to_the_command_name() {
        let calls: Calls = Rc::default();
        let mut general = CommandTable::new(4);
        general.register("show", recorder(&calls, "g")).unwrap();
        let engine = Engine::new(general, CommandTable::new(4), TypeRegistry::new(4));

        // `{` is above `z`, so it terminates the command word.
        engine.dispatch(&mut session(), "show{ignored").unwrap();
        assert_eq!(*calls.borrow(), vec!["g:show{ignored"]);
    }
}
