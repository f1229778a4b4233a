//! Two-route navigation with an inbox guard.

use std::fmt;

use crate::store::{MailboxStore, RefreshOutcome, View};

/// A screen the user can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// Address creation, at the root.
    #[default]
    Create,
    /// Inbox of the active address.
    Inbox,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::Create, Route::Inbox];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Create => "/",
            Route::Inbox => "/inbox",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Create => "create",
            Route::Inbox => "inbox",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        Self::ALL
            .into_iter()
            .find(|r| r.path().trim_end_matches('/') == trimmed)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<View> for Route {
    fn from(view: View) -> Self {
        match view {
            View::Create => Route::Create,
            View::Inbox => Route::Inbox,
        }
    }
}

impl From<Route> for View {
    fn from(route: Route) -> Self {
        match route {
            Route::Create => View::Create,
            Route::Inbox => View::Inbox,
        }
    }
}

/// Where a navigation to `target` actually lands.
///
/// The inbox needs an address; without one the user goes to `Create`.
pub fn guard(target: Route, store: &MailboxStore) -> Route {
    match target {
        Route::Inbox if !store.has_session() => Route::Create,
        other => other,
    }
}

/// Where a navigation landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    /// What the inbox refresh did, when entering the inbox ran one.
    pub refresh: Option<RefreshOutcome>,
}

/// Tracks the current route and keeps the store's view in step with it.
#[derive(Debug, Default)]
pub struct Router {
    current: Route,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Route {
        self.current
    }

    /// Navigate to `target`, applying the guard.
    ///
    /// Entering the inbox refreshes it; if that finds the address gone the
    /// store falls back to `Create` and so does the router.
    pub async fn navigate(&mut self, target: Route, store: &mut MailboxStore) -> Navigation {
        let refresh = match self.redirect(target, store) {
            Route::Inbox => Some(store.show_inbox().await),
            Route::Create => {
                store.show_create();
                None
            }
        };
        Navigation {
            route: self.sync(store),
            refresh,
        }
    }

    /// Like `navigate`, but the inbox is entered without a refresh.
    pub fn enter(&mut self, target: Route, store: &mut MailboxStore) -> Route {
        match self.redirect(target, store) {
            Route::Inbox => store.open_inbox(),
            Route::Create => store.show_create(),
        }
        self.sync(store)
    }

    fn redirect(&self, target: Route, store: &MailboxStore) -> Route {
        let landed = guard(target, store);
        if landed != target {
            tracing::debug!(from = %self.current, to = %target, redirect = %landed, "navigation redirected");
        }
        landed
    }

    /// Follow the store's view after an action changed it (delete, expiry).
    pub fn sync(&mut self, store: &MailboxStore) -> Route {
        self.current = store.view().into();
        self.current
    }
}
