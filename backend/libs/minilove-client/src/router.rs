//! Page routes and the navigation guard.

use crate::session::SessionStore;
use crate::storage::SessionStorage;

pub const SITE_TITLE: &str = "MiniLove";
pub const SITE_TAGLINE: &str = "MiniLove 情感支持社区";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Signed-in users only
    RequiresAuth,
    /// Signed-out users only (login, register)
    RequiresGuest,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    /// Segments starting with `:` match any single segment
    pub pattern: &'static str,
    pub title: &'static str,
    pub access: Access,
}

pub const ROUTES: &[Route] = &[
    Route { name: "home", pattern: "/", title: "首页", access: Access::RequiresAuth },
    Route { name: "profile", pattern: "/profile", title: "个人中心", access: Access::RequiresAuth },
    Route { name: "post-detail", pattern: "/post/:id", title: "帖子详情", access: Access::RequiresAuth },
    Route { name: "create-post", pattern: "/create", title: "发布帖子", access: Access::RequiresAuth },
    Route { name: "explore", pattern: "/explore", title: "探索发现", access: Access::RequiresAuth },
    Route { name: "login", pattern: "/auth/login", title: "登录", access: Access::RequiresGuest },
    Route { name: "register", pattern: "/auth/register", title: "注册", access: Access::RequiresGuest },
];

pub const NOT_FOUND: Route = Route {
    name: "not-found",
    pattern: "/:pathMatch(.*)*",
    title: "页面不存在",
    access: Access::Open,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect {
        name: &'static str,
        /// Where to return after signing in
        redirect: Option<String>,
    },
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut wanted = segments(pattern);
    let mut actual = segments(path);
    loop {
        match (wanted.next(), actual.next()) {
            (None, None) => return true,
            (Some(w), Some(a)) if w.starts_with(':') || w == a => continue,
            _ => return false,
        }
    }
}

/// Route for `full_path`, ignoring any query string or fragment.
pub fn resolve(full_path: &str) -> &'static Route {
    let path = full_path
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();

    ROUTES
        .iter()
        .find(|route| pattern_matches(route.pattern, path))
        .unwrap_or(&NOT_FOUND)
}

/// Document title for a route.
pub fn page_title(route: &Route) -> String {
    let title = if route.title.is_empty() { SITE_TITLE } else { route.title };
    format!("{} - {}", title, SITE_TAGLINE)
}

/// Guard run before every navigation to `full_path`.
pub fn before_each<S: SessionStorage>(full_path: &str, session: &SessionStore<S>) -> Navigation {
    let route = resolve(full_path);

    match route.access {
        Access::RequiresAuth if !session.is_authenticated() => Navigation::Redirect {
            name: "login",
            redirect: Some(full_path.to_string()),
        },
        Access::RequiresGuest if session.is_authenticated() => Navigation::Redirect {
            name: "home",
            redirect: None,
        },
        _ => Navigation::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MembershipLevel, SessionUser};
    use crate::storage::MemoryStorage;

    fn signed_in() -> SessionStore<MemoryStorage> {
        let mut session = SessionStore::new(MemoryStorage::new());
        session
            .set_session(
                "tok".into(),
                SessionUser {
                    id: 1,
                    username: "abc".into(),
                    email: "a@b.com".into(),
                    avatar_url: None,
                    membership_level: MembershipLevel::Free,
                    membership_expires_at: None,
                },
            )
            .unwrap();
        session
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/").name, "home");
        assert_eq!(resolve("/post/42").name, "post-detail");
        assert_eq!(resolve("/post/42?tab=comments").name, "post-detail");
        assert_eq!(resolve("/auth/login").name, "login");
        assert_eq!(resolve("/post").name, "not-found");
        assert_eq!(resolve("/nowhere/at/all").name, "not-found");
    }

    #[test]
    fn test_guest_is_sent_to_login_with_redirect() {
        let guest = SessionStore::new(MemoryStorage::new());
        assert_eq!(
            before_each("/post/42?x=1", &guest),
            Navigation::Redirect {
                name: "login",
                redirect: Some("/post/42?x=1".to_string()),
            }
        );
        assert_eq!(before_each("/auth/register", &guest), Navigation::Proceed);
        assert_eq!(before_each("/missing", &guest), Navigation::Proceed);
    }

    #[test]
    fn test_signed_in_user_is_kept_off_auth_pages() {
        let session = signed_in();
        assert_eq!(
            before_each("/auth/login", &session),
            Navigation::Redirect { name: "home", redirect: None }
        );
        assert_eq!(before_each("/explore", &session), Navigation::Proceed);
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title(resolve("/create")), "发布帖子 - MiniLove 情感支持社区");
        assert_eq!(page_title(resolve("/zzz")), "页面不存在 - MiniLove 情感支持社区");
    }
}
