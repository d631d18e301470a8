//! Terminal client for the Turma Labs VA management portal.
//!
//! The session store, route guard and navigation list are plain values; the
//! [`shell::Shell`] composes them and talks to the backend through
//! [`api::PortalApi`].

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod forms;
pub mod guard;
pub mod nav;
pub mod pages;
pub mod session;
pub mod shell;
