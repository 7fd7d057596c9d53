//! Request dispatch
//!
//! Routes typed requests to the host registry and builds exactly one
//! response per request. Business failures are reported inside the
//! response, never as errors.

use crate::ipc::protocol::{
    COMMAND_NOT_FOUND, CommandDescriptor, MessageId, Request, Response, ResponseResult,
};
use crate::registry::CommandRegistry;

/// Dispatches requests against a command registry
pub struct Dispatcher<R> {
    registry: R,
}

impl<R: CommandRegistry> Dispatcher<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// Handle a request and build its response
    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::ListCommands {
                id,
                include_names,
                include_icons,
            } => self.list_commands(id, include_names, include_icons),
            Request::RunCommand { id, command_id } => self.run_command(id, command_id.as_deref()),
        }
    }

    fn list_commands(&self, id: MessageId, include_names: bool, include_icons: bool) -> Response {
        let commands: Vec<CommandDescriptor> = self
            .registry
            .list_commands()
            .into_iter()
            .map(|entry| CommandDescriptor {
                id: entry.id,
                name: include_names.then_some(entry.name),
                icon: include_icons.then_some(entry.icon),
            })
            .collect();

        tracing::debug!(%id, count = commands.len(), "listed commands");
        Response::success(id, ResponseResult::Commands(commands))
    }

    fn run_command(&self, id: MessageId, command_id: Option<&str>) -> Response {
        // Missing ids fail the same way as unknown ones
        let executed = command_id.is_some_and(|cmd| self.registry.execute_command_by_id(cmd));

        if executed {
            tracing::debug!(%id, command = command_id, "command executed");
            Response::success(id, ResponseResult::Executed(true))
        } else {
            tracing::info!(%id, command = command_id, "command not found or failed");
            Response::failure(id, COMMAND_NOT_FOUND, ResponseResult::Executed(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CommandEntry, StaticRegistry};

    fn registry() -> StaticRegistry {
        StaticRegistry::new()
            .register(CommandEntry::new("app:save", "Save file", "save"), || true)
            .register(CommandEntry::new("app:broken", "Broken", "bug"), || false)
    }

    fn list(id: u64, include_names: bool, include_icons: bool) -> Request {
        Request::ListCommands {
            id: MessageId::Unsigned(id),
            include_names,
            include_icons,
        }
    }

    fn run(id: u64, cmd: &str) -> Request {
        Request::RunCommand {
            id: MessageId::Unsigned(id),
            command_id: Some(cmd.to_string()),
        }
    }

    #[test]
    fn test_run_command_success() {
        let dispatcher = Dispatcher::new(registry());
        let response = dispatcher.handle(run(3, "app:save"));

        assert_eq!(response.id, MessageId::Unsigned(3));
        assert_eq!(response.error, None);
        assert_eq!(response.result, ResponseResult::Executed(true));
    }

    #[test]
    fn test_run_command_unknown_id() {
        let dispatcher = Dispatcher::new(registry());
        let response = dispatcher.handle(run(7, "bogus"));

        assert_eq!(
            response,
            Response {
                id: MessageId::Unsigned(7),
                error: Some(vec!["Command not found".to_string()]),
                result: ResponseResult::Executed(false),
            }
        );
    }

    #[test]
    fn test_run_command_failure_reports_not_found() {
        let dispatcher = Dispatcher::new(registry());
        let response = dispatcher.handle(run(1, "app:broken"));

        assert_eq!(response.error, Some(vec![COMMAND_NOT_FOUND.to_string()]));
        assert_eq!(response.result, ResponseResult::Executed(false));
    }

    #[test]
    fn test_run_command_without_id_skips_registry() {
        let dispatcher = Dispatcher::new(
            StaticRegistry::new().register(CommandEntry::new("", "Empty", "x"), || {
                panic!("registry must not be called")
            }),
        );
        let response = dispatcher.handle(Request::RunCommand {
            id: MessageId::Signed(-1),
            command_id: None,
        });

        assert!(!response.is_success());
        assert_eq!(response.id, MessageId::Signed(-1));
    }

    #[test]
    fn test_list_projection() {
        let dispatcher = Dispatcher::new(registry());

        for (names, icons) in [(false, false), (true, false), (false, true), (true, true)] {
            let response = dispatcher.handle(list(1, names, icons));
            assert!(response.is_success());

            let ResponseResult::Commands(commands) = response.result else {
                panic!("expected a command list");
            };
            assert_eq!(commands.len(), 2);
            for command in &commands {
                assert!(!command.id.is_empty());
                assert_eq!(command.name.is_some(), names);
                assert_eq!(command.icon.is_some(), icons);
            }
        }
    }

    #[test]
    fn test_list_names_only() {
        let dispatcher = Dispatcher::new(
            StaticRegistry::new()
                .register(CommandEntry::new("app:save", "Save file", "save"), || true),
        );
        let response = dispatcher.handle(list(8, true, false));

        assert_eq!(
            response,
            Response::success(
                MessageId::Unsigned(8),
                ResponseResult::Commands(vec![CommandDescriptor {
                    id: "app:save".to_string(),
                    name: Some("Save file".to_string()),
                    icon: None,
                }]),
            )
        );
    }

    #[test]
    fn test_list_empty_registry() {
        let dispatcher = Dispatcher::new(StaticRegistry::new());
        let response = dispatcher.handle(list(2, true, true));

        assert_eq!(response.error, None);
        assert_eq!(response.result, ResponseResult::Commands(Vec::new()));
    }

    #[test]
    fn test_repeated_requests_are_independent() {
        let dispatcher = Dispatcher::new(registry());
        let first = dispatcher.handle(run(10, "app:save"));
        let second = dispatcher.handle(run(11, "app:save"));

        assert_eq!(first.id, MessageId::Unsigned(10));
        assert_eq!(second.id, MessageId::Unsigned(11));
        assert_eq!(first.error, second.error);
        assert_eq!(first.result, second.result);
    }
}
