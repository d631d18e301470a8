//! Page components, one per route. Each page reads its collection endpoint
//! and renders a short listing.

use crate::api::{ApiError, PortalApi};
use crate::guard::Route;
use crate::session::Role;
use serde_json::Value;

/// Rows shown per page before eliding the rest
const MAX_ROWS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageState {
    #[default]
    Idle,
    Loading,
    Ready(PageContent),
    Failed(String),
}

struct Listing {
    heading: &'static str,
    endpoint: &'static str,
    key: &'static str,
    empty: &'static str,
    row: fn(&Value) -> String,
}

fn listing(route: Route) -> Option<Listing> {
    let listing = match route {
        Route::Dashboard => return None,
        Route::TimeLogs => Listing {
            heading: "Time Logs",
            endpoint: "/api/time-logs",
            key: "time_logs",
            empty: "No time logs yet.",
            row: time_log_row,
        },
        Route::EodReports => Listing {
            heading: "EOD Reports",
            endpoint: "/api/eod-reports",
            key: "eod_reports",
            empty: "No EOD reports submitted.",
            row: eod_row,
        },
        Route::Trainings => Listing {
            heading: "Trainings",
            endpoint: "/api/trainings",
            key: "trainings",
            empty: "No trainings available.",
            row: titled_row,
        },
        Route::Sops => Listing {
            heading: "SOPs",
            endpoint: "/api/sops",
            key: "sops",
            empty: "No SOPs published.",
            row: titled_row,
        },
        Route::LeaveRequests => Listing {
            heading: "Leave Requests",
            endpoint: "/api/leave-requests",
            key: "leave_requests",
            empty: "No leave requests.",
            row: leave_row,
        },
        Route::Announcements => Listing {
            heading: "Announcements",
            endpoint: "/api/announcements",
            key: "announcements",
            empty: "No announcements.",
            row: announcement_row,
        },
        Route::Users => Listing {
            heading: "Manage Users",
            endpoint: "/api/users",
            key: "users",
            empty: "No users.",
            row: user_row,
        },
    };
    Some(listing)
}

/// Fetch and render the page for `route`. Blocking; run it off the
/// interaction thread.
pub fn load(
    api: &dyn PortalApi,
    route: Route,
    role: Role,
    token: Option<&str>,
) -> Result<PageContent, ApiError> {
    match listing(route) {
        Some(listing) => {
            let body = api.get_json(listing.endpoint, token)?;
            Ok(PageContent {
                title: listing.heading.to_string(),
                lines: rows(&body, listing.key, listing.row, listing.empty),
            })
        }
        None => dashboard(api, role, token),
    }
}

fn dashboard(api: &dyn PortalApi, role: Role, token: Option<&str>) -> Result<PageContent, ApiError> {
    let recent = api.get_json("/api/announcements/recent", token)?;
    let mut lines = vec!["Recent announcements:".to_string()];
    lines.extend(
        rows(&recent, "announcements", announcement_row, "No announcements.")
            .into_iter()
            .map(|l| format!("  {}", l)),
    );

    let title = match role {
        Role::Admin => {
            let users = api.get_json("/api/users", token)?;
            let (total, active) = user_counts(&users);
            lines.insert(0, format!("Users: {} ({} active)", total, active));
            "Admin Dashboard"
        }
        Role::Member => "Dashboard",
    };

    Ok(PageContent {
        title: title.to_string(),
        lines,
    })
}

fn user_counts(body: &Value) -> (usize, usize) {
    let users = body
        .get("users")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let active = users
        .iter()
        .filter(|u| u.get("is_active").and_then(Value::as_bool).unwrap_or(true))
        .count();
    (users.len(), active)
}

fn rows(body: &Value, key: &str, row: fn(&Value) -> String, empty: &str) -> Vec<String> {
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if items.is_empty() {
        return vec![empty.to_string()];
    }

    let mut lines: Vec<String> = items.iter().take(MAX_ROWS).map(row).collect();
    if items.len() > MAX_ROWS {
        lines.push(format!("... and {} more", items.len() - MAX_ROWS));
    }
    lines
}

fn text<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or("")
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

/// "2024-05-02T09:00:00" -> "09:00"
fn clock(s: &str) -> &str {
    s.split_once('T')
        .and_then(|(_, time)| time.get(..5))
        .unwrap_or("--:--")
}

fn owner(item: &Value) -> String {
    match item.get("user") {
        Some(user) => format!(" [{}]", text(user, "username")),
        None => String::new(),
    }
}

fn time_log_row(item: &Value) -> String {
    let hours = item
        .get("total_hours")
        .and_then(Value::as_f64)
        .map(|h| format!("{:.2}h", h))
        .unwrap_or_else(|| "open".to_string());
    format!(
        "{}  {} - {}  {}{}",
        text(item, "date"),
        clock(text(item, "clock_in")),
        clock(text(item, "clock_out")),
        hours,
        owner(item)
    )
}

fn eod_row(item: &Value) -> String {
    format!(
        "{}  {}{}",
        text(item, "date"),
        first_line(text(item, "tasks_completed")),
        owner(item)
    )
}

fn titled_row(item: &Value) -> String {
    match text(item, "category") {
        "" => text(item, "title").to_string(),
        category => format!("{} [{}]", text(item, "title"), category),
    }
}

fn leave_row(item: &Value) -> String {
    format!(
        "{} to {}  {}  {}",
        text(item, "start_date"),
        text(item, "end_date"),
        text(item, "status"),
        first_line(text(item, "reason"))
    )
}

fn announcement_row(item: &Value) -> String {
    let pinned = item.get("is_pinned").and_then(Value::as_bool).unwrap_or(false);
    format!("{}{}", if pinned { "* " } else { "" }, text(item, "title"))
}

fn user_row(item: &Value) -> String {
    let inactive = !item.get("is_active").and_then(Value::as_bool).unwrap_or(true);
    format!(
        "{} ({}) {} {}{}",
        text(item, "username"),
        Role::from(text(item, "role").to_string()).as_str(),
        text(item, "first_name"),
        text(item, "last_name"),
        if inactive { " [inactive]" } else { "" }
    )
}
