use crate::Args;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::time::{Duration, Instant};
use vaportal::config::Config;
use vaportal::guard::Resolution;
use vaportal::nav;
use vaportal::shell::{Shell, Submit};

pub struct Context {
    pub args: Args,
    pub config: Config,
    pub shell: Shell,
}

impl Context {
    fn verbose(&self) -> bool {
        self.args.verbose || self.args.debug
    }

    /// How long to block on a request before handing the prompt back
    fn wait_limit(&self) -> Duration {
        self.config.timeout() + Duration::from_secs(1)
    }

    fn prompt(&self) -> String {
        if self.shell.is_authenticated() {
            format!("{}:{}> ", self.config.prompt(), self.shell.route().path())
        } else {
            format!("{}> ", self.config.prompt())
        }
    }

    /// Block until in-flight work finishes, then redraw
    fn settle_and_show(&mut self) {
        let started = Instant::now();
        if !self.shell.settle(self.wait_limit()) {
            eprintln!("Still waiting on the server; the result will show up when it arrives.");
        }
        if self.args.debug {
            eprintln!("[DEBUG] Settled in {:?}", started.elapsed());
        }
        println!("{}", self.shell.view().render());
    }
}

enum Flow {
    Continue,
    Exit,
}

pub fn run_repl(mut ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("vaportal - type help for commands, exit to quit");
    println!();
    println!("{}", ctx.shell.view().render());

    loop {
        ctx.shell.pump();
        match rl.readline(&ctx.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // Only commands go to history; credentials are read separately.
                rl.add_history_entry(line)?;

                let flow = if line.starts_with('/') {
                    navigate(&mut ctx, line);
                    Flow::Continue
                } else {
                    match handle_command(&mut ctx, &mut rl, line) {
                        Ok(flow) => flow,
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            Flow::Continue
                        }
                    }
                };
                if let Flow::Exit = flow {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if ctx.shell.is_authenticated() {
        if let Some(ticket) = ctx.shell.logout() {
            let limit = ctx.wait_limit();
            ctx.shell.await_ticket(ticket, limit);
        }
    }

    Ok(())
}

fn handle_command(ctx: &mut Context, rl: &mut DefaultEditor, cmd: &str) -> Result<Flow> {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    match parts[0] {
        "exit" | "quit" => return Ok(Flow::Exit),
        "help" => print_help(ctx.shell.is_authenticated()),
        "login" => {
            if ctx.shell.is_authenticated() {
                println!("Already signed in. Use logout first.");
            } else {
                login(ctx, rl)?;
            }
        }
        "forgot" => {
            if ctx.shell.is_authenticated() {
                println!("Password reset is only available when signed out.");
            } else {
                forgot_password(ctx, rl)?;
            }
        }
        "nav" => match ctx.shell.session() {
            Some(session) => {
                let active = ctx.shell.route();
                for item in nav::visible_items(session.role) {
                    let marker = if item.route == active { '>' } else { ' ' };
                    println!(
                        "{} {:<16} {:<18} [{}]",
                        marker,
                        item.label,
                        item.path(),
                        item.icon
                    );
                }
            }
            None => println!("Sign in to see the navigation."),
        },
        "go" => {
            if parts.len() > 1 {
                navigate(ctx, parts[1].trim());
            } else {
                println!("Usage: go <path>");
            }
        }
        "refresh" => {
            if ctx.shell.refresh().is_some() {
                ctx.settle_and_show();
            } else {
                println!("Not signed in.");
            }
        }
        "whoami" => {
            if ctx.shell.verify_identity().is_some() {
                ctx.settle_and_show();
                if let Some(session) = ctx.shell.session() {
                    println!(
                        "{} <{}> id={} role={}",
                        session.username,
                        session.email,
                        session.user_id,
                        session.role.as_str()
                    );
                }
            } else {
                println!("Not signed in.");
            }
        }
        "logout" => match ctx.shell.logout() {
            Some(_) => {
                println!("Signed out.");
                println!();
                println!("{}", ctx.shell.view().render());
            }
            None => println!("Not signed in."),
        },
        "session" => {
            let events = ctx.shell.events();
            println!("Run: {}", events.run_id());
            match &events.path {
                Some(path) => println!("Event log: {}", path.display()),
                None => println!("Event log: disabled"),
            }
            println!("Server: {}", ctx.config.base_url());
            match ctx.shell.session() {
                Some(session) => println!(
                    "Signed in as {} ({})",
                    session.username,
                    session.role.as_str()
                ),
                None => println!("Signed out"),
            }
        }
        _ => println!("Unknown command: {}. Type help for commands.", parts[0]),
    }
    Ok(Flow::Continue)
}

fn print_help(signed_in: bool) {
    println!("Commands:");
    println!("  exit            - quit");
    println!("  help            - show commands");
    println!("  session         - show run and session info");
    if signed_in {
        println!("Portal:");
        println!("  /<path>         - open a page, e.g. /time-logs");
        println!("  go <path>       - same as typing the path");
        println!("  nav             - list pages you can open");
        println!("  refresh         - reload the current page");
        println!("  whoami          - check the session with the server");
        println!("  logout          - sign out");
    } else {
        println!("Sign in:");
        println!("  login           - sign in with username and password");
        println!("  forgot          - request a password reset");
    }
}

fn navigate(ctx: &mut Context, path: &str) {
    let resolution = ctx.shell.navigate(path);
    if ctx.verbose() {
        eprintln!("[VERBOSE] {} -> {}", path, resolution.outcome());
    }
    match resolution {
        Resolution::Login => {
            println!("Please sign in first.");
            println!();
            println!("{}", ctx.shell.view().render());
        }
        // Denied and unknown paths land on the fallback page without a message
        Resolution::Redirect { to, .. } => {
            if ctx.verbose() {
                eprintln!("[VERBOSE] Redirected to {}", to.path());
            }
            ctx.settle_and_show();
        }
        Resolution::Page(_) => ctx.settle_and_show(),
    }
}

fn login(ctx: &mut Context, rl: &mut DefaultEditor) -> Result<()> {
    let current = ctx.shell.login_form().username.clone();
    let username = match rl.readline_with_initial("Username: ", (current.as_str(), "")) {
        Ok(line) => line,
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    // The line editor cannot mask input, so the password is echoed
    let password = match rl.readline("Password: ") {
        Ok(line) => line,
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    match ctx.shell.login_form_mut() {
        Some(form) => {
            form.username = username;
            form.password = password;
        }
        None => {
            println!("A sign-in is already in progress.");
            return Ok(());
        }
    }

    match ctx.shell.submit_login() {
        Submit::Sent(_) => {
            println!("{}", ctx.shell.login_form().submit_label());
            ctx.settle_and_show();
        }
        Submit::Invalid(err) => println!("! {}", err),
        Submit::Ignored => println!("A sign-in is already in progress."),
    }
    Ok(())
}

fn forgot_password(ctx: &mut Context, rl: &mut DefaultEditor) -> Result<()> {
    ctx.shell.open_reset();
    println!("{}", ctx.shell.view().render());

    loop {
        let identifier = match rl.readline("Username or email (empty to cancel): ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                ctx.shell.close_reset();
                return Err(e.into());
            }
        };
        if identifier.trim().is_empty() {
            break;
        }

        ctx.shell.set_reset_identifier(&identifier);
        match ctx.shell.submit_reset() {
            Submit::Sent(_) => {
                println!("{}", ctx.shell.reset_form().submit_label());
                ctx.settle_and_show();
            }
            Submit::Invalid(err) => {
                println!("! {}", err);
                continue;
            }
            Submit::Ignored => {
                println!("A reset request is already in progress.");
                continue;
            }
        }

        if ctx.shell.reset_form().result().is_some() {
            let _ = rl.readline("Press Enter to close ");
            break;
        }
    }

    ctx.shell.close_reset();
    println!("{}", ctx.shell.view().render());
    Ok(())
}
