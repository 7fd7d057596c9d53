//! Host command registry
//!
//! The registry is owned by the host application. The IPC layer only lists
//! its commands and asks it to execute one by id.

use std::rc::Rc;

/// A command as reported by the host registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub id: String,
    pub name: String,
    pub icon: String,
}

impl CommandEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
        }
    }
}

/// Host-side facility enumerating and executing named commands
///
/// Calls run synchronously on the event loop thread.
pub trait CommandRegistry {
    /// All commands, in registry order
    fn list_commands(&self) -> Vec<CommandEntry>;

    /// Execute a command, returning whether it ran successfully
    ///
    /// Unknown ids also return `false`.
    fn execute_command_by_id(&self, id: &str) -> bool;
}

impl<T: CommandRegistry + ?Sized> CommandRegistry for &T {
    fn list_commands(&self) -> Vec<CommandEntry> {
        (**self).list_commands()
    }

    fn execute_command_by_id(&self, id: &str) -> bool {
        (**self).execute_command_by_id(id)
    }
}

impl<T: CommandRegistry + ?Sized> CommandRegistry for Rc<T> {
    fn list_commands(&self) -> Vec<CommandEntry> {
        (**self).list_commands()
    }

    fn execute_command_by_id(&self, id: &str) -> bool {
        (**self).execute_command_by_id(id)
    }
}

type Handler = Box<dyn Fn() -> bool>;

/// In-memory registry built from entries and their handlers
///
/// # Example
///
/// ```rust
/// use cmdbridge::{CommandEntry, CommandRegistry, StaticRegistry};
///
/// let registry = StaticRegistry::new()
///     .register(CommandEntry::new("app:save", "Save file", "save"), || true);
///
/// assert!(registry.execute_command_by_id("app:save"));
/// assert!(!registry.execute_command_by_id("app:missing"));
/// ```
#[derive(Default)]
pub struct StaticRegistry {
    commands: Vec<(CommandEntry, Handler)>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command; a later entry with the same id replaces the earlier one
    pub fn register(mut self, entry: CommandEntry, handler: impl Fn() -> bool + 'static) -> Self {
        let handler: Handler = Box::new(handler);
        match self.commands.iter_mut().find(|(e, _)| e.id == entry.id) {
            Some(slot) => *slot = (entry, handler),
            None => self.commands.push((entry, handler)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandRegistry for StaticRegistry {
    fn list_commands(&self) -> Vec<CommandEntry> {
        self.commands.iter().map(|(entry, _)| entry.clone()).collect()
    }

    fn execute_command_by_id(&self, id: &str) -> bool {
        match self.commands.iter().find(|(entry, _)| entry.id == id) {
            Some((_, handler)) => handler(),
            None => {
                tracing::debug!(id, "command not registered");
                false
            }
        }
    }
}
