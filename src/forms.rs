//! Credential and password-reset form state.
//!
//! A form holds at most one pending ticket. While it is set the submit action
//! is disabled; a completion whose ticket does not match is stale and ignored.

use crate::dispatch::Ticket;
use crate::error::PortalError;
use crate::session::ResetResult;

#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pending: Option<Ticket>,
}

impl LoginForm {
    pub fn with_username(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Self::default()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_pending() {
            "Signing in..."
        } else {
            "Sign In"
        }
    }

    /// Mark `ticket` as the request in flight. Refused while one is pending.
    pub fn begin(&mut self, ticket: Ticket) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(ticket);
        true
    }

    /// Consume the pending ticket if `ticket` is it.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct ResetForm {
    open: bool,
    pub identifier: String,
    result: Option<ResetResult>,
    error: Option<String>,
    pending: Option<Ticket>,
}

impl ResetForm {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close the dialog and forget everything, including any request in flight.
    pub fn close(&mut self) {
        *self = Self::default();
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }

    pub fn result(&self) -> Option<&ResetResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn title(&self) -> &'static str {
        if self.result.is_some() {
            "Password Reset Successful"
        } else {
            "Forgot Password"
        }
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_pending() {
            "Processing..."
        } else {
            "Reset Password"
        }
    }

    pub fn begin(&mut self, ticket: Ticket) -> bool {
        if !self.open || self.pending.is_some() {
            return false;
        }
        self.pending = Some(ticket);
        self.error = None;
        self.result = None;
        true
    }

    /// Apply a completion. Success clears the input; failure keeps it.
    pub fn settle(&mut self, ticket: Ticket, outcome: Result<ResetResult, PortalError>) -> bool {
        if self.pending != Some(ticket) {
            return false;
        }
        self.pending = None;
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.identifier.clear();
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        true
    }
}
