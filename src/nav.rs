//! Navigation list shown beside every authenticated page.

use crate::guard::Route;
use crate::session::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub route: Route,
    pub label: &'static str,
    /// Icon name from the lucide set
    pub icon: &'static str,
    pub admin_only: bool,
}

impl NavItem {
    const fn new(route: Route, label: &'static str, icon: &'static str) -> Self {
        Self {
            route,
            label,
            icon,
            admin_only: false,
        }
    }

    pub fn path(&self) -> &'static str {
        self.route.path()
    }
}

/// Display order matters: this is the order on screen.
const BASE_ITEMS: [NavItem; 7] = [
    NavItem::new(Route::Dashboard, "Dashboard", "home"),
    NavItem::new(Route::TimeLogs, "Time Logs", "clock"),
    NavItem::new(Route::EodReports, "EOD Reports", "file-text"),
    NavItem::new(Route::Trainings, "Trainings", "book-open"),
    NavItem::new(Route::Sops, "SOPs", "file-check"),
    NavItem::new(Route::LeaveRequests, "Leave Requests", "calendar"),
    NavItem::new(Route::Announcements, "Announcements", "megaphone"),
];

const MANAGE_USERS: NavItem = NavItem {
    route: Route::Users,
    label: "Manage Users",
    icon: "users",
    admin_only: true,
};

/// Position of "Manage Users" for admins: directly under Dashboard.
pub const MANAGE_USERS_INDEX: usize = 1;

pub fn visible_items(role: Role) -> Vec<NavItem> {
    let mut items = BASE_ITEMS.to_vec();
    match role {
        Role::Admin => items.insert(MANAGE_USERS_INDEX, MANAGE_USERS),
        Role::Member => {}
    }
    items
}

pub fn render(items: &[NavItem], active: Route) -> String {
    let mut out = String::new();
    for item in items {
        let marker = if item.route == active { '>' } else { ' ' };
        out.push_str(&format!("{} {:<16} {}\n", marker, item.label, item.path()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_items_exclude_manage_users() {
        let items = visible_items(Role::Member);
        assert_eq!(items.len(), 7);
        assert!(items.iter().all(|i| i.label != "Manage Users"));
        assert!(items.iter().all(|i| !i.admin_only));
    }

    #[test]
    fn test_admin_gets_manage_users_at_index_one() {
        let items = visible_items(Role::Admin);
        assert_eq!(items.len(), 8);
        assert_eq!(items[MANAGE_USERS_INDEX].label, "Manage Users");
        assert_eq!(items[MANAGE_USERS_INDEX].path(), "/users");
        assert!(items[MANAGE_USERS_INDEX].admin_only);
        assert_eq!(items[0].route, Route::Dashboard);
        assert_eq!(items[2].route, Route::TimeLogs);
    }

    #[test]
    fn test_base_order_preserved_for_admin() {
        let member: Vec<_> = visible_items(Role::Member).iter().map(|i| i.route).collect();
        let admin: Vec<_> = visible_items(Role::Admin)
            .iter()
            .map(|i| i.route)
            .filter(|r| *r != Route::Users)
            .collect();
        assert_eq!(member, admin);
    }

    #[test]
    fn test_render_marks_active_item() {
        let out = render(&visible_items(Role::Member), Route::Sops);
        let active: Vec<_> = out.lines().filter(|l| l.starts_with('>')).collect();
        assert_eq!(active.len(), 1);
        assert!(active[0].contains("SOPs"));
        assert!(active[0].ends_with("/sops"));
    }
}
