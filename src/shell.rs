//! Top-level composition of the portal.
//!
//! Without a session only the credential view exists. With one, every route
//! change goes through the guard and the matching page is loaded in the
//! background. Completions are applied on the interaction thread only.

use crate::api::{ApiError, PortalApi};
use crate::dispatch::{Completion, Dispatcher, Ticket};
use crate::error::PortalError;
use crate::events::EventLog;
use crate::forms::{LoginForm, ResetForm};
use crate::guard::{self, Resolution, Route};
use crate::nav::{self, NavItem};
use crate::pages::{self, PageState};
use crate::session::{Session, SessionStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shown when a request failed inside the client rather than on the server
pub const ABORTED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Text under every portal page
pub const FOOTER: &str = "Turma Labs \u{2014} Powered by JCORP";

/// Result of pressing a submit button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
    Sent(Ticket),
    /// A request from this form is already in flight, or the form is not shown.
    Ignored,
    Invalid(PortalError),
}

pub struct Shell {
    store: SessionStore,
    dispatcher: Dispatcher,
    events: EventLog,
    login: LoginForm,
    reset: ResetForm,
    landing: Route,
    route: Route,
    page: PageState,
    page_ticket: Option<Ticket>,
    identity_ticket: Option<Ticket>,
}

impl Shell {
    pub fn new(api: Arc<dyn PortalApi>, landing: Route, events: EventLog) -> Self {
        Self {
            store: SessionStore::new(api),
            dispatcher: Dispatcher::new(),
            events,
            login: LoginForm::default(),
            reset: ResetForm::default(),
            landing,
            route: landing,
            page: PageState::Idle,
            page_ticket: None,
            identity_ticket: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.store.current_session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn login_form(&self) -> &LoginForm {
        &self.login
    }

    /// Editing is refused while a submission is in flight.
    pub fn login_form_mut(&mut self) -> Option<&mut LoginForm> {
        if self.login.is_pending() {
            None
        } else {
            Some(&mut self.login)
        }
    }

    pub fn reset_form(&self) -> &ResetForm {
        &self.reset
    }

    pub fn open_reset(&mut self) {
        self.reset.open();
    }

    pub fn close_reset(&mut self) {
        self.reset.close();
    }

    pub fn set_reset_identifier(&mut self, identifier: &str) {
        if !self.reset.is_pending() {
            self.reset.identifier = identifier.to_string();
        }
    }

    pub fn submit_login(&mut self) -> Submit {
        if self.store.is_authenticated() {
            return Submit::Ignored;
        }
        if self.login.is_pending() {
            let _ = self.events.duplicate_submit("login");
            return Submit::Ignored;
        }
        let job = match self.store.login_job(&self.login.username, &self.login.password) {
            Ok(job) => job,
            Err(err) => return Submit::Invalid(err),
        };
        let _ = self.events.login_attempt(self.login.username.trim());

        let ticket = self.dispatcher.spawn(move |ticket| Completion::Login {
            ticket,
            outcome: job(),
        });
        self.login.begin(ticket);
        Submit::Sent(ticket)
    }

    pub fn submit_reset(&mut self) -> Submit {
        if !self.reset.is_open() {
            return Submit::Ignored;
        }
        if self.reset.is_pending() {
            let _ = self.events.duplicate_submit("reset");
            return Submit::Ignored;
        }
        let job = match self.store.reset_job(&self.reset.identifier) {
            Ok(job) => job,
            Err(err) => return Submit::Invalid(err),
        };
        let _ = self.events.reset_request();

        let ticket = self.dispatcher.spawn(move |ticket| Completion::Reset {
            ticket,
            outcome: job(),
        });
        self.reset.begin(ticket);
        Submit::Sent(ticket)
    }

    /// Resolve `path` through the guard and show whatever it resolves to.
    pub fn navigate(&mut self, path: &str) -> Resolution {
        let resolution = guard::resolve(path, self.store.current_session(), self.landing);
        let _ = self.events.navigate(
            path,
            resolution.route().map(Route::path),
            resolution.outcome(),
        );
        if let Some(route) = resolution.route() {
            self.show(route);
        }
        resolution
    }

    /// Reload the current page
    pub fn refresh(&mut self) -> Option<Ticket> {
        self.load_page()
    }

    /// Ask the backend who we are; a rejected session is a forced logout.
    pub fn verify_identity(&mut self) -> Option<Ticket> {
        let session = self.store.current_session()?;
        let api = self.store.api();
        let token = session.auth_token.clone();
        let ticket = self.dispatcher.spawn(move |ticket| Completion::Identity {
            ticket,
            outcome: api.me(token.as_deref()),
        });
        self.identity_ticket = Some(ticket);
        Some(ticket)
    }

    /// Clear the session now; tell the backend in the background.
    pub fn logout(&mut self) -> Option<Ticket> {
        let session = self.store.logout()?;
        let _ = self.events.logout(&session.username);
        self.reset_to_signed_out();

        let api = self.store.api();
        let ticket = self.dispatcher.spawn(move |ticket| Completion::Logout {
            ticket,
            outcome: api.logout(session.token()),
        });
        Some(ticket)
    }

    fn show(&mut self, route: Route) {
        self.route = route;
        self.load_page();
    }

    fn load_page(&mut self) -> Option<Ticket> {
        let session = self.store.current_session()?;
        let api = self.store.api();
        let role = session.role;
        let token = session.auth_token.clone();
        let route = self.route;

        let ticket = self.dispatcher.spawn(move |ticket| Completion::Page {
            ticket,
            route,
            outcome: pages::load(api.as_ref(), route, role, token.as_deref()),
        });
        self.page_ticket = Some(ticket);
        self.page = PageState::Loading;
        Some(ticket)
    }

    fn reset_to_signed_out(&mut self) {
        self.login = LoginForm::default();
        self.reset.close();
        self.route = self.landing;
        self.page = PageState::Idle;
        self.page_ticket = None;
        self.identity_ticket = None;
    }

    fn expire_session(&mut self, err: &ApiError, during: &str) -> bool {
        let username = self.store.current_session().map(|s| s.username.clone());
        if !self.store.observe_failure(err) {
            return false;
        }
        self.reset_to_signed_out();
        if let Some(username) = username {
            let _ = self.events.forced_logout(&username, during);
            self.login = LoginForm::with_username(&username);
        }
        true
    }

    /// Apply one completion to the state it belongs to
    pub fn handle(&mut self, completion: Completion) {
        let kind = completion.kind();
        match completion {
            Completion::Login { ticket, outcome } => {
                if !self.login.settle(ticket) {
                    let _ = self.events.stale_response(kind, ticket);
                    return;
                }
                let username = self.login.username.trim().to_string();
                match self.store.apply_login(outcome) {
                    Ok(session) => {
                        let role = session.role;
                        let _ = self.events.login_ok(&username, role.as_str());
                        self.login = LoginForm::default();
                        self.reset.close();
                        self.show(self.landing);
                    }
                    Err(err) => {
                        let _ = self.events.login_err(&username, err.kind());
                    }
                }
            }
            Completion::Reset { ticket, outcome } => {
                let outcome = SessionStore::apply_reset(outcome);
                let logged = match &outcome {
                    Ok(result) => Ok(result.user_info.username.clone()),
                    Err(err) => Err(err.kind()),
                };
                if !self.reset.settle(ticket, outcome) {
                    let _ = self.events.stale_response(kind, ticket);
                    return;
                }
                let _ = match logged {
                    Ok(username) => self.events.reset_ok(&username),
                    Err(kind) => self.events.reset_err(kind),
                };
            }
            Completion::Page {
                ticket,
                route,
                outcome,
            } => {
                if self.page_ticket != Some(ticket) {
                    let _ = self.events.stale_response(kind, ticket);
                    return;
                }
                self.page_ticket = None;
                match outcome {
                    Ok(content) => self.page = PageState::Ready(content),
                    Err(err) => {
                        if self.expire_session(&err, "page") {
                            return;
                        }
                        let error_kind = PortalError::from(err.clone()).kind();
                        let _ = self.events.page_err(route.path(), error_kind);
                        self.page = PageState::Failed(err.user_message());
                    }
                }
            }
            Completion::Identity { ticket, outcome } => {
                if self.identity_ticket != Some(ticket) {
                    let _ = self.events.stale_response(kind, ticket);
                    return;
                }
                self.identity_ticket = None;
                match outcome {
                    Ok(user) => {
                        let username = self.store.current_session().map(|s| s.username.clone());
                        if self.store.refresh_user(&user).is_none() {
                            self.reset_to_signed_out();
                            if let Some(username) = username {
                                let _ = self.events.forced_logout(&username, "identity");
                                self.login = LoginForm::with_username(&username);
                            }
                        } else if !guard::can_access(self.route, self.store.current_session()) {
                            // Role may have changed server-side
                            self.show(self.landing);
                        }
                    }
                    Err(err) => {
                        self.expire_session(&err, "identity");
                    }
                }
            }
            Completion::Logout { .. } => {}
            Completion::Aborted { ticket } => self.handle_aborted(ticket),
        }
    }

    /// Fail whichever request owned `ticket` as if the server had errored.
    fn handle_aborted(&mut self, ticket: Ticket) {
        fn outcome<T>() -> Result<T, ApiError> {
            Err(ApiError::Server {
                status: 500,
                message: ABORTED_MESSAGE.to_string(),
            })
        }
        let failed = if self.login.pending() == Some(ticket) {
            Completion::Login {
                ticket,
                outcome: outcome(),
            }
        } else if self.reset.pending() == Some(ticket) {
            Completion::Reset {
                ticket,
                outcome: outcome(),
            }
        } else if self.page_ticket == Some(ticket) {
            Completion::Page {
                ticket,
                route: self.route,
                outcome: outcome(),
            }
        } else if self.identity_ticket == Some(ticket) {
            Completion::Identity {
                ticket,
                outcome: outcome(),
            }
        } else {
            let _ = self.events.stale_response("aborted", ticket);
            return;
        };
        let _ = self.events.aborted(failed.kind(), ticket);
        self.handle(failed);
    }

    /// Apply every completion that has already arrived
    pub fn pump(&mut self) {
        while let Some(completion) = self.dispatcher.try_next() {
            self.handle(completion);
        }
    }

    /// True while a form submission, page load or identity check is in flight
    pub fn is_busy(&self) -> bool {
        self.login.is_pending()
            || self.reset.is_pending()
            || self.page_ticket.is_some()
            || self.identity_ticket.is_some()
    }

    /// Process completions until nothing tracked is in flight or `timeout`
    /// passes. Returns false on timeout; pending requests stay pending.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.dispatcher.wait_next(remaining) {
                Some(completion) => self.handle(completion),
                None => return false,
            }
        }
        true
    }

    /// Wait for one specific request, applying everything that arrives first.
    pub fn await_ticket(&mut self, ticket: Ticket, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.dispatcher.wait_next(remaining) {
                Some(completion) => {
                    let done = completion.ticket() == ticket;
                    self.handle(completion);
                    if done {
                        return true;
                    }
                }
                None => return false,
            }
        }
    }

    pub fn view(&self) -> View<'_> {
        match self.store.current_session() {
            None => View::SignedOut {
                login: &self.login,
                error: self.store.error(),
                reset: &self.reset,
            },
            Some(session) => View::Portal {
                session,
                nav: nav::visible_items(session.role),
                route: self.route,
                page: &self.page,
            },
        }
    }
}

/// What is on screen
#[derive(Debug)]
pub enum View<'a> {
    SignedOut {
        login: &'a LoginForm,
        error: Option<&'a str>,
        reset: &'a ResetForm,
    },
    Portal {
        session: &'a Session,
        nav: Vec<NavItem>,
        route: Route,
        page: &'a PageState,
    },
}

impl View<'_> {
    pub fn render(&self) -> String {
        match self {
            View::SignedOut { login, error, reset } => {
                if reset.is_open() {
                    render_reset(reset)
                } else {
                    render_login(login, *error)
                }
            }
            View::Portal {
                session,
                nav,
                route,
                page,
            } => render_portal(session, nav, *route, page),
        }
    }
}

fn render_login(login: &LoginForm, error: Option<&str>) -> String {
    let mut out = String::from("Welcome to Turma Labs\nSign in to your VA management portal\n\n");
    if !login.username.is_empty() {
        out.push_str(&format!("  Username: {}\n", login.username));
    }
    if login.is_pending() {
        out.push_str(&format!("  [{}]\n", login.submit_label()));
    }
    if let Some(error) = error {
        out.push_str(&format!("  ! {}\n", error));
    }
    out.push_str("\nType `login` to sign in or `forgot` if you forgot your password.\n");
    out
}

fn render_reset(reset: &ResetForm) -> String {
    let mut out = format!("== {} ==\n", reset.title());
    match reset.result() {
        None => {
            out.push_str("Enter your username or email address to request a password reset.\n");
            out.push_str(
                "A new temporary password will be generated for the admin to share with you.\n",
            );
            if reset.is_pending() {
                out.push_str(&format!("  [{}]\n", reset.submit_label()));
            }
            if let Some(error) = reset.error() {
                out.push_str(&format!("  ! {}\n", error));
            }
        }
        Some(result) => {
            out.push_str("Password reset successful! Please contact your admin for the new temporary password.\n\n");
            out.push_str(&format!("  Name:     {}\n", result.full_name()));
            out.push_str(&format!("  Username: {}\n", result.user_info.username));
            out.push_str(&format!("  Email:    {}\n\n", result.user_info.email));
            out.push_str(&format!("Admin message:\n  {}\n\n", result.admin_message));
            out.push_str("Important: Contact your admin to get the new temporary password. ");
            out.push_str("You should change this password immediately after logging in.\n");
        }
    }
    out
}

fn render_portal(session: &Session, items: &[NavItem], route: Route, page: &PageState) -> String {
    let mut out = format!(
        "Turma Labs | {} ({})\n\n",
        session.display_name,
        session.role.as_str()
    );
    out.push_str(&nav::render(items, route));
    out.push('\n');
    match page {
        PageState::Idle => {}
        PageState::Loading => out.push_str("Loading...\n"),
        PageState::Ready(content) => {
            out.push_str(&format!("--- {} ---\n", content.title));
            for line in &content.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        PageState::Failed(message) => out.push_str(&format!("! {}\n", message)),
    }
    out.push('\n');
    out.push_str(FOOTER);
    out.push('\n');
    out
}
