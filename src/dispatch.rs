//! Request dispatch off the interaction thread.
//!
//! Each request runs on its own worker thread and reports back over a channel.
//! Completions carry the ticket they were issued under so the receiver can
//! drop any that no longer match what it is waiting for.

use crate::api::{ApiError, ForgotPasswordResponse, LoginResponse, UserRecord};
use crate::guard::Route;
use crate::pages::PageContent;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

pub type Ticket = u64;

#[derive(Debug)]
pub enum Completion {
    Login {
        ticket: Ticket,
        outcome: Result<LoginResponse, ApiError>,
    },
    Reset {
        ticket: Ticket,
        outcome: Result<ForgotPasswordResponse, ApiError>,
    },
    Page {
        ticket: Ticket,
        route: Route,
        outcome: Result<PageContent, ApiError>,
    },
    Identity {
        ticket: Ticket,
        outcome: Result<UserRecord, ApiError>,
    },
    /// Best-effort server logout; the result is never applied.
    Logout {
        ticket: Ticket,
        outcome: Result<(), ApiError>,
    },
    /// The job panicked before producing its completion.
    Aborted { ticket: Ticket },
}

impl Completion {
    pub fn ticket(&self) -> Ticket {
        match self {
            Completion::Login { ticket, .. }
            | Completion::Reset { ticket, .. }
            | Completion::Page { ticket, .. }
            | Completion::Identity { ticket, .. }
            | Completion::Logout { ticket, .. }
            | Completion::Aborted { ticket } => *ticket,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Completion::Login { .. } => "login",
            Completion::Reset { .. } => "reset",
            Completion::Page { .. } => "page",
            Completion::Identity { .. } => "identity",
            Completion::Logout { .. } => "logout",
            Completion::Aborted { .. } => "aborted",
        }
    }
}

pub struct Dispatcher {
    next_ticket: Ticket,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            next_ticket: 1,
            tx,
            rx,
        }
    }

    /// Run `job` on a worker thread under a fresh ticket. A panicking job
    /// still reports back, as [`Completion::Aborted`].
    pub fn spawn<F>(&mut self, job: F) -> Ticket
    where
        F: FnOnce(Ticket) -> Completion + Send + 'static,
    {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let tx = self.tx.clone();
        thread::spawn(move || {
            let completion = panic::catch_unwind(AssertUnwindSafe(|| job(ticket)))
                .unwrap_or(Completion::Aborted { ticket });
            // Receiver gone means the shell shut down; nothing to report to.
            let _ = tx.send(completion);
        });
        ticket
    }

    /// Next completion if one is already waiting
    pub fn try_next(&mut self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout` for the next completion
    pub fn wait_next(&mut self, timeout: Duration) -> Option<Completion> {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => Some(completion),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_are_unique_and_delivered() {
        let mut dispatcher = Dispatcher::new();
        let a = dispatcher.spawn(|ticket| Completion::Logout {
            ticket,
            outcome: Ok(()),
        });
        let b = dispatcher.spawn(|ticket| Completion::Logout {
            ticket,
            outcome: Err(ApiError::Network("down".to_string())),
        });
        assert_ne!(a, b);

        let mut seen = vec![
            dispatcher.wait_next(Duration::from_secs(5)).unwrap().ticket(),
            dispatcher.wait_next(Duration::from_secs(5)).unwrap().ticket(),
        ];
        seen.sort();
        assert_eq!(seen, vec![a, b]);
    }

    #[test]
    fn test_panicking_job_still_reports() {
        let mut dispatcher = Dispatcher::new();
        let ticket = dispatcher.spawn(|_| panic!("bad row"));
        let completion = dispatcher.wait_next(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.ticket(), ticket);
        assert_eq!(completion.kind(), "aborted");
    }

    #[test]
    fn test_wait_times_out_when_idle() {
        let mut dispatcher = Dispatcher::new();
        assert!(dispatcher.try_next().is_none());
        assert!(dispatcher.wait_next(Duration::from_millis(10)).is_none());
    }
}
