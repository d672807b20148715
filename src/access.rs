use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    auth::{Principal, principal_from_headers},
    error::AppError,
    models::Role,
};

/// Access
///
/// What a route prefix demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reachable without a session (login, health, docs).
    Public,
    /// Any signed-in principal, whatever the role.
    Authenticated,
    /// Only principals holding exactly this role.
    Role(Role),
}

/// Decision
///
/// Outcome of checking one request against the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Authenticated, but the path belongs to a different role (403).
    Deny,
    /// No session on a protected path.
    RedirectToLogin,
}

/// AccessRules
///
/// The explicit route table consulted on every request. The longest configured prefix
/// that matches the path decides. A path no prefix matches is denied by default.
///
/// Prefixes only match on segment boundaries: `/student` covers `/student` and
/// `/student/dashboard`, never `/students`.
#[derive(Debug, Clone)]
pub struct AccessRules {
    rules: Vec<(&'static str, Access)>,
}

impl AccessRules {
    pub fn new(rules: Vec<(&'static str, Access)>) -> Self {
        Self { rules }
    }

    /// The portal's table. No role can reach the other's prefix; there is no superuser.
    pub fn standard() -> Self {
        Self::new(vec![
            ("/login", Access::Public),
            ("/logout", Access::Public),
            ("/health", Access::Public),
            ("/swagger-ui", Access::Public),
            ("/api-docs", Access::Public),
            ("/redirect", Access::Authenticated),
            ("/student", Access::Role(Role::Student)),
            ("/teacher", Access::Role(Role::Teacher)),
        ])
    }

    /// The access requirement of the longest matching prefix, if any.
    pub fn rule_for(&self, path: &str) -> Option<Access> {
        self.rules
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| *access)
    }

    /// authorize
    ///
    /// `Public` always passes. Everything else needs a principal: without one the caller is
    /// sent to login, with one it must satisfy the rule (unmatched paths never do).
    pub fn authorize(&self, principal: Option<&Principal>, path: &str) -> Decision {
        let rule = self.rule_for(path);
        if rule == Some(Access::Public) {
            return Decision::Allow;
        }
        let Some(principal) = principal else {
            return Decision::RedirectToLogin;
        };
        match rule {
            Some(Access::Authenticated) => Decision::Allow,
            Some(Access::Role(role)) if role == principal.role => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}

impl Default for AccessRules {
    fn default() -> Self {
        Self::standard()
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// access_control
///
/// Middleware applied to the whole router. Resolves the session once, checks the route
/// table, and hands the principal to handlers through the request extensions.
pub async fn access_control(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = principal_from_headers(request.headers(), &state.config);
    let path = request.uri().path().to_owned();

    match state.access.authorize(principal.as_ref(), &path) {
        Decision::Allow => {
            tracing::debug!(path = %path, role = ?principal.as_ref().map(|p| p.role), "access granted");
            if let Some(principal) = principal {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Decision::Deny => {
            tracing::warn!(path = %path, role = ?principal.as_ref().map(|p| p.role), "access denied");
            AppError::Forbidden.into_response()
        }
        Decision::RedirectToLogin => {
            tracing::debug!(path = %path, "no session, redirecting to login");
            AppError::Unauthenticated.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            email: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let rules = AccessRules::new(vec![
            ("/teacher", Access::Role(Role::Teacher)),
            ("/teacher/public", Access::Public),
        ]);
        assert_eq!(rules.rule_for("/teacher/public/x"), Some(Access::Public));
        assert_eq!(rules.rule_for("/teacher/dashboard"), Some(Access::Role(Role::Teacher)));
    }

    #[test]
    fn prefixes_respect_segment_boundaries() {
        let rules = AccessRules::standard();
        assert_eq!(rules.rule_for("/student"), Some(Access::Role(Role::Student)));
        assert_eq!(rules.rule_for("/student/"), Some(Access::Role(Role::Student)));
        assert_eq!(rules.rule_for("/students"), None);
        assert_eq!(rules.rule_for("/loginx"), None);
    }

    #[test]
    fn unmatched_paths_are_denied_by_default() {
        let rules = AccessRules::standard();
        assert_eq!(rules.authorize(None, "/admin"), Decision::RedirectToLogin);
        assert_eq!(
            rules.authorize(Some(&principal(Role::Teacher)), "/admin"),
            Decision::Deny
        );
    }

    #[test]
    fn public_paths_need_no_session() {
        let rules = AccessRules::standard();
        assert_eq!(rules.authorize(None, "/login"), Decision::Allow);
        assert_eq!(rules.authorize(None, "/health"), Decision::Allow);
        assert_eq!(rules.authorize(None, "/redirect"), Decision::RedirectToLogin);
    }

    #[test]
    fn roles_are_confined_to_their_own_prefix() {
        let rules = AccessRules::standard();
        for role in [Role::Student, Role::Teacher] {
            let p = principal(role);
            let other = match role {
                Role::Student => Role::Teacher,
                Role::Teacher => Role::Student,
            };
            for suffix in ["", "/dashboard", "/student/add", "/edit/7"] {
                let own = format!("{}{suffix}", role.home_prefix());
                let foreign = format!("{}{suffix}", other.home_prefix());
                assert_eq!(rules.authorize(Some(&p), &own), Decision::Allow, "{own}");
                assert_eq!(rules.authorize(Some(&p), &foreign), Decision::Deny, "{foreign}");
            }
            assert_eq!(rules.authorize(Some(&p), "/redirect"), Decision::Allow);
        }
    }
}
