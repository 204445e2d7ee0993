//! Per-session command dispatch and the registration state machine.
//!
//! The router owns no storage of its own; it classifies each input line and
//! drives the directories held by the shared [`Relay`]. Every reply goes to
//! the originating session only, and every cross-session delivery happens
//! inside a directory, so routing stays synchronous and call-depth-bounded.

mod command;

pub use command::{Command, parse_line};

use crate::error::RegistryError;
use crate::state::{Relay, SessionHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// What the connection loop should do after a line is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Disconnect,
}

/// Per-session protocol state.
///
/// A registered session always carries its name; there is no way to
/// represent "registered with no name".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered { username: String },
}

/// Command dispatcher, shared across all connection tasks.
pub struct Router {
    relay: Arc<Relay>,
}

impl Router {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    /// Greeting sent once per fresh connection.
    pub fn greet(&self, handle: &SessionHandle) {
        handle.deliver(format!(
            "Welcome to {}. Register with /register <name> to start chatting.",
            self.relay.server_name
        ));
    }

    /// Process one input line for the session.
    pub fn handle_line(
        &self,
        state: &mut SessionState,
        handle: &Arc<SessionHandle>,
        line: &str,
    ) -> LoopAction {
        let cmd = match parse_line(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!(session = %handle.id, code = e.error_code(), "Rejected input");
                handle.deliver(e.to_string());
                return LoopAction::Continue;
            }
        };

        match state {
            SessionState::Unregistered => self.handle_unregistered(state, handle, cmd),
            SessionState::Registered { .. } => self.handle_registered(state, handle, cmd),
        }
    }

    /// Pre-registration gate: only registration (and exit) advance.
    fn handle_unregistered(
        &self,
        state: &mut SessionState,
        handle: &Arc<SessionHandle>,
        cmd: Command<'_>,
    ) -> LoopAction {
        match cmd {
            Command::Register { name } => {
                self.register(state, handle, name);
                LoopAction::Continue
            }
            Command::Exit => {
                handle.deliver("Goodbye.");
                LoopAction::Disconnect
            }
            _ => {
                handle.deliver("Please register first: /register <name>");
                LoopAction::Continue
            }
        }
    }

    fn register(&self, state: &mut SessionState, handle: &Arc<SessionHandle>, name: &str) {
        match self.relay.registry.register(Arc::clone(handle), name, &self.relay.filter) {
            Ok(username) => {
                info!(session = %handle.id, user = %username, "Registered");
                handle.deliver(format!("You are now registered as '{}'.", username));
                self.relay
                    .registry
                    .broadcast(&format!("User {} joined the chat.", username), Some(handle.id));
                *state = SessionState::Registered { username };
            }
            Err(e) => {
                debug!(session = %handle.id, code = e.error_code(), "Registration rejected");
                handle.deliver(e.to_string());
            }
        }
    }

    fn rename(&self, state: &mut SessionState, handle: &Arc<SessionHandle>, name: &str) {
        match self.relay.registry.rename(handle.id, name, &self.relay.filter) {
            Ok((old, new)) => {
                info!(session = %handle.id, from = %old, to = %new, "Renamed");
                handle.deliver(format!("You are now known as '{}'.", new));
                self.relay
                    .registry
                    .broadcast(&format!("User {} is now known as {}.", old, new), Some(handle.id));
                *state = SessionState::Registered { username: new };
            }
            Err(e) => {
                debug!(session = %handle.id, code = e.error_code(), "Rename rejected");
                handle.deliver(e.to_string());
            }
        }
    }

    fn handle_registered(
        &self,
        state: &mut SessionState,
        handle: &Arc<SessionHandle>,
        cmd: Command<'_>,
    ) -> LoopAction {
        let SessionState::Registered { username } = state else {
            // handle_line only dispatches here for registered sessions.
            return LoopAction::Continue;
        };
        let username = username.clone();
        let relay = &self.relay;

        match cmd {
            Command::Register { name } => self.rename(state, handle, name),

            Command::Unregister => {
                if relay.release_identity(handle.id).is_some() {
                    info!(session = %handle.id, user = %username, "Unregistered");
                    *state = SessionState::Unregistered;
                    handle.deliver(
                        "You are no longer registered. Register with /register <name>.",
                    );
                }
            }

            Command::GroupCreate { name } => match relay.groups.create(name) {
                Ok(group) => handle.deliver(format!("Group '{}' created successfully.", group)),
                Err(e) => {
                    debug!(session = %handle.id, code = e.error_code(), "Group create failed");
                    handle.deliver(e.to_string());
                }
            },

            Command::GroupJoin { name } => {
                match relay.groups.join(name, handle.id, Arc::clone(handle), &username) {
                    Ok(group) => {
                        info!(session = %handle.id, user = %username, group = %group, "Joined group");
                        handle.deliver(format!("You joined group '{}'.", group));
                    }
                    Err(e) => {
                        debug!(session = %handle.id, code = e.error_code(), "Group join failed");
                        handle.deliver(e.to_string());
                    }
                }
            }

            Command::GroupLeave { name } => match relay.groups.leave(name, handle.id, &username) {
                Ok(outcome) => {
                    info!(session = %handle.id, user = %username, group = %outcome.group, "Left group");
                    if outcome.removed_empty {
                        handle.deliver(format!(
                            "You left group '{}'. Group was removed as it is now empty.",
                            outcome.group
                        ));
                    } else {
                        handle.deliver(format!("You left group '{}'.", outcome.group));
                    }
                }
                Err(e) => {
                    debug!(session = %handle.id, code = e.error_code(), "Group leave failed");
                    handle.deliver(e.to_string());
                }
            },

            Command::GroupRemove { name } => match relay.groups.remove(name, &username) {
                Ok(group) => handle.deliver(format!("Group '{}' was removed.", group)),
                Err(e) => {
                    debug!(session = %handle.id, code = e.error_code(), "Group remove failed");
                    handle.deliver(e.to_string());
                }
            },

            Command::GroupList => {
                let groups = relay.groups.list();
                if groups.is_empty() {
                    handle.deliver("No groups available.");
                } else {
                    handle.deliver("Available groups:");
                    for (name, members) in groups {
                        handle.deliver(format!("- {} ({} members)", name, members));
                    }
                }
            }

            Command::TopicCreate { name } => match relay.topics.create_topic(name) {
                Ok(topic) => handle.deliver(format!("Topic '{}' created.", topic)),
                Err(e) => {
                    debug!(session = %handle.id, code = e.error_code(), "Topic create failed");
                    handle.deliver(e.to_string());
                }
            },

            Command::TopicSubscribe { name } => {
                match relay.topics.subscribe(name, handle.id, Arc::clone(handle)) {
                    Ok(topic) => handle.deliver(format!("Subscribed to topic '{}'.", topic)),
                    Err(e) => {
                        debug!(session = %handle.id, code = e.error_code(), "Topic subscribe failed");
                        handle.deliver(e.to_string());
                    }
                }
            }

            Command::TopicUnsubscribe { name } => {
                match relay.topics.unsubscribe(name, handle.id) {
                    Ok(topic) => handle.deliver(format!("Unsubscribed from topic '{}'.", topic)),
                    Err(e) => {
                        debug!(session = %handle.id, code = e.error_code(), "Topic unsubscribe failed");
                        handle.deliver(e.to_string());
                    }
                }
            }

            Command::TopicList => {
                let topics = relay.topics.list_topics();
                if topics.is_empty() {
                    handle.deliver("No topics available.");
                } else {
                    handle.deliver(format!("Available topics: {}", topics.join(", ")));
                }
            }

            Command::SendUser { target, body } => self.send_to_user(handle, &username, target, body),

            Command::SendGroup { target, body } => {
                let body = relay.filter.filter(body);
                if let Err(e) = relay.groups.send_to_group(target, handle.id, &username, &body) {
                    debug!(session = %handle.id, code = e.error_code(), "Group send failed");
                    handle.deliver(e.to_string());
                }
            }

            Command::SendAuto { target, body } => {
                // Legacy resolution order: group name first, then username.
                if relay.groups.exists(target) {
                    let body = relay.filter.filter(body);
                    if let Err(e) = relay.groups.send_to_group(target, handle.id, &username, &body) {
                        debug!(session = %handle.id, code = e.error_code(), "Group send failed");
                        handle.deliver(e.to_string());
                    }
                } else {
                    self.send_to_user(handle, &username, target, body);
                }
            }

            Command::Users => {
                let names = relay.registry.list_usernames();
                if names.is_empty() {
                    handle.deliver("No users online.");
                } else {
                    handle.deliver(format!(
                        "Users online ({}): {}",
                        relay.registry.count(),
                        names.join(", ")
                    ));
                }
            }

            Command::Exit => {
                handle.deliver("Goodbye.");
                return LoopAction::Disconnect;
            }

            Command::Chat { body } => {
                if body.is_empty() {
                    return LoopAction::Continue;
                }
                let filtered = relay.filter.filter(body);
                match relay.groups.current_group(handle.id) {
                    Some(group) => {
                        if let Err(e) =
                            relay.groups.send_to_group(&group, handle.id, &username, &filtered)
                        {
                            debug!(session = %handle.id, code = e.error_code(), "Group chat failed");
                        }
                    }
                    None => {
                        relay.registry.broadcast(
                            &format!("GLOBAL | {}: {}", username, filtered),
                            Some(handle.id),
                        );
                    }
                }
                // Topic fan-out is an independent scope: it fires for every
                // plain message, grouped or not.
                relay.topics.notify_subscribers(body, handle, &username, &relay.filter);
            }
        }

        LoopAction::Continue
    }

    fn send_to_user(&self, handle: &Arc<SessionHandle>, username: &str, target: &str, body: &str) {
        match self.relay.registry.find_by_username(target) {
            Some(recipient) => {
                let body = self.relay.filter.filter(body);
                recipient.deliver(format!("DIRECT | {}: {}", username, body));
            }
            None => {
                let e = RegistryError::NoSuchUser(target.to_string());
                debug!(session = %handle.id, code = e.error_code(), "Direct send failed");
                handle.deliver(e.to_string());
            }
        }
    }
}
