//! Route classification for the edge gate.

pub const SIGN_IN_PATH: &str = "/signin";
pub const SIGN_UP_PATH: &str = "/signup";
pub const ONBOARDING_PATH: &str = "/onboarding";
pub const DASHBOARD_PATH: &str = "/dashboard";

const SKIPPED_PREFIXES: [&str; 3] = ["/_next", "/static", "/api"];

/// How the gate treats a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Assets and API calls; the gate does nothing.
    Skip,
    /// Sign-in and sign-up, only useful while signed out.
    AuthOnly,
    /// Reachable without a session.
    Public,
    Onboarding,
    Protected,
}

impl RouteKind {
    /// Classifies a request path.
    pub fn classify(path: &str) -> Self {
        if is_skipped(path) {
            return RouteKind::Skip;
        }

        match path.trim_end_matches('/') {
            "" => RouteKind::Public,
            SIGN_IN_PATH | SIGN_UP_PATH => RouteKind::AuthOnly,
            ONBOARDING_PATH => RouteKind::Onboarding,
            _ => RouteKind::Protected,
        }
    }

    /// Whether a signed-out visitor may stay on this route.
    pub fn allows_anonymous(self) -> bool {
        matches!(self, RouteKind::Skip | RouteKind::AuthOnly | RouteKind::Public)
    }
}

fn is_skipped(path: &str) -> bool {
    if path == "/favicon.ico" {
        return true;
    }

    if SKIPPED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
    {
        return true;
    }

    // file-extension paths
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}
