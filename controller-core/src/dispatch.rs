//! Command dispatcher: one payload in, one status out.

use alloc::string::String;

use embassy_sync::blocking_mutex::raw::RawMutex;
use macro_engine::{Command, CommandError, Response, ScriptStore, StartRequest};

use crate::config::Config;
use crate::controller::Controller;
use crate::runner::RunControl;

/// Applies command payloads from any link to the runner and controller.
///
/// Never blocks: start requests are queued, realtime input goes straight to
/// the controller.
pub struct Dispatcher<'a, M: RawMutex, C> {
    store: &'a ScriptStore,
    config: &'a Config,
    controller: &'a C,
    control: &'a RunControl<M>,
}

impl<'a, M: RawMutex, C: Controller> Dispatcher<'a, M, C> {
    pub fn new(
        store: &'a ScriptStore,
        config: &'a Config,
        controller: &'a C,
        control: &'a RunControl<M>,
    ) -> Self {
        Self {
            store,
            config,
            controller,
            control,
        }
    }

    /// Decode and apply one JSON payload.
    pub fn handle(&self, payload: &str) -> Response {
        let response = match Command::parse(payload) {
            Ok(command) => self.apply(command),
            Err(e) => Response::Error(e),
        };
        if let Response::Error(e) = response {
            warn!("command rejected: {}", e);
        }
        response
    }

    pub fn apply(&self, command: Command) -> Response {
        let result = match command {
            Command::Start(request) => self.start(request, false),
            Command::Restart(request) => self.start(request, true),
            Command::Stop => {
                self.control.stop_all();
                Ok(Response::Accepted)
            }
            Command::RealtimeStart => {
                self.controller.start_realtime();
                Ok(Response::Accepted)
            }
            Command::RealtimeStop => {
                self.controller.stop_realtime();
                Ok(Response::Accepted)
            }
            Command::RealtimeAction(line) => self
                .controller
                .set_realtime_action(&line)
                .map(|()| Response::Accepted),
        };
        result.unwrap_or_else(Response::from)
    }

    fn start(&self, mut request: StartRequest, drain: bool) -> Result<Response, CommandError> {
        let name = String::from(self.config.resolve(&request.name));
        if !self.store.contains(&name) {
            return Err(CommandError::UnknownMacro);
        }
        request.name = name;

        if drain {
            self.control.stop_all();
        } else {
            self.control.cancel_current();
        }
        self.control.submit(request)?;
        Ok(Response::Queued)
    }
}
