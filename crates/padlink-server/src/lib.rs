//! padlink-server library crate.
//!
//! The host side of padlink: a WebSocket endpoint that receives input intents
//! from a touch client and replays them on this machine.
//!
//! # Architecture
//!
//! ```text
//! Touch client (JSON text frames, binary screen frames)
//!         ↕  ws://host:3000/ws
//! [padlink-server]
//!   ├── domain/           Settings, config patch validation
//!   ├── application/      Dispatcher, actuator queue, relay, tokens, routing
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop, upgrade policy, per-connection tasks
//!         ├── config_store/ TOML settings file
//!         └── actuator/   Logging and recording actuator backends
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O.
//! - `application` depends on `domain` and `padlink-core`; OS input and
//!   persistence are reached through the `InputActuator` and `SettingsStore`
//!   traits.
//! - `infrastructure` owns sockets, files and spawned tasks.

pub mod application;
pub mod domain;
pub mod infrastructure;
