use crate::models::Role;
use crate::services::SessionClaims;

/// What a path requires of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches only this exact path.
    Exact(String),
    /// Matches the path itself and anything below it, on segment boundaries.
    Prefix(String),
}

impl PathPattern {
    pub fn exact(path: impl Into<String>) -> Self {
        PathPattern::Exact(path.into())
    }

    pub fn prefix(path: impl Into<String>) -> Self {
        let mut path = path.into();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        PathPattern::Prefix(path)
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Prefix(p) if p == "/" => path.starts_with('/'),
            PathPattern::Prefix(p) => match path.strip_prefix(p.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }

    fn specificity(&self) -> (usize, bool) {
        match self {
            PathPattern::Exact(p) => (p.len(), true),
            PathPattern::Prefix(p) => (p.len(), false),
        }
    }
}

/// Caller state as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unauthenticated,
    Authenticated(SessionClaims),
}

impl GateState {
    pub fn role(&self) -> Option<Role> {
        match self {
            GateState::Unauthenticated => None,
            GateState::Authenticated(claims) => Some(claims.role),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin,
    RedirectToUnauthorized,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::RedirectToLogin => "redirect_login",
            Decision::RedirectToUnauthorized => "redirect_unauthorized",
        }
    }
}

/// Static path table. The most specific matching rule wins; an exact rule
/// beats a prefix of the same length. Unmatched paths fall back to
/// `default_access`.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    rules: Vec<(PathPattern, Access)>,
    default_access: Access,
}

impl AuthorizationPolicy {
    pub fn new(default_access: Access) -> Self {
        Self {
            rules: Vec::new(),
            default_access,
        }
    }

    pub fn rule(mut self, pattern: PathPattern, access: Access) -> Self {
        self.rules.push((pattern, access));
        self
    }

    /// Route table of the club site.
    pub fn club_default() -> Self {
        let public_prefixes = [
            "/tentang",
            "/pendaftaran",
            "/template",
            "/auth",
            "/api/auth",
            "/api/pendaftaran",
            "/api/template",
            "/health",
            "/metrics",
            "/static",
            "/_next",
            "/favicon.ico",
            "/unauthorized",
            "/.well-known",
            "/docs",
        ];

        let policy = public_prefixes.into_iter().fold(
            Self::new(Access::Authenticated).rule(PathPattern::exact("/"), Access::Public),
            |policy, prefix| policy.rule(PathPattern::prefix(prefix), Access::Public),
        );

        policy
            .rule(PathPattern::prefix("/admin"), Access::Role(Role::Admin))
            .rule(PathPattern::prefix("/api/admin"), Access::Role(Role::Admin))
            .rule(PathPattern::prefix("/anggota"), Access::Role(Role::Member))
            .rule(PathPattern::prefix("/api/user"), Access::Authenticated)
    }

    pub fn access_for(&self, path: &str) -> Access {
        self.rules
            .iter()
            .filter(|(pattern, _)| pattern.matches(path))
            .max_by_key(|(pattern, _)| pattern.specificity())
            .map(|(_, access)| *access)
            .unwrap_or(self.default_access)
    }

    pub fn decide(&self, path: &str, state: &GateState) -> Decision {
        match (self.access_for(path), state) {
            (Access::Public, _) => Decision::Allow,
            (_, GateState::Unauthenticated) => Decision::RedirectToLogin,
            (Access::Authenticated, GateState::Authenticated(_)) => Decision::Allow,
            (Access::Role(required), GateState::Authenticated(claims)) => {
                if claims.role.satisfies(required) {
                    Decision::Allow
                } else {
                    Decision::RedirectToUnauthorized
                }
            }
        }
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::club_default()
    }
}
