//! Static route table: which paths need a session and which are only for
//! visitors.

use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protection {
    Public,
    /// Logged-in users only.
    Authenticated,
    /// Visitors only, e.g. the login page.
    Unauthenticated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRule {
    pub protection: Protection,
    pub redirect_to: Option<String>,
    pub message: Option<String>,
}

static PUBLIC_RULE: RouteRule = RouteRule {
    protection: Protection::Public,
    redirect_to: None,
    message: None,
};

impl RouteRule {
    #[must_use]
    pub const fn public() -> Self {
        Self {
            protection: Protection::Public,
            redirect_to: None,
            message: None,
        }
    }

    #[must_use]
    pub fn authenticated(redirect_to: &str, message: &str) -> Self {
        Self {
            protection: Protection::Authenticated,
            redirect_to: Some(redirect_to.to_string()),
            message: Some(message.to_string()),
        }
    }

    #[must_use]
    pub fn unauthenticated(redirect_to: &str, message: &str) -> Self {
        Self {
            protection: Protection::Unauthenticated,
            redirect_to: Some(redirect_to.to_string()),
            message: Some(message.to_string()),
        }
    }

    /// Redirect target, falling back to the usual page for the protection.
    #[must_use]
    pub fn redirect_target(&self) -> &str {
        match (self.redirect_to.as_deref(), self.protection) {
            (Some(target), _) => target,
            (None, Protection::Unauthenticated) => "/dashboard",
            (None, _) => "/login",
        }
    }

    #[must_use]
    pub fn denial_message(&self) -> &str {
        match (self.message.as_deref(), self.protection) {
            (Some(message), _) => message,
            (None, Protection::Unauthenticated) => "Você já está logado.",
            (None, _) => "Acesso restrito a usuários autenticados.",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    rules: BTreeMap<String, RouteRule>,
}

impl RouteTable {
    /// An empty table; every path is public.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The MultiBPO pages.
    #[must_use]
    pub fn multibpo() -> Self {
        Self::new()
            .with(
                "/dashboard",
                RouteRule::authenticated(
                    "/login",
                    "Você precisa estar logado para acessar o dashboard.",
                ),
            )
            .with(
                "/perfil",
                RouteRule::authenticated("/login", "Acesso restrito a usuários autenticados."),
            )
            .with(
                "/login",
                RouteRule::unauthenticated("/dashboard", "Você já está logado!"),
            )
            .with(
                "/cadastro",
                RouteRule::unauthenticated("/dashboard", "Você já possui uma conta ativa."),
            )
            .with("/", RouteRule::public())
            .with("/sobre", RouteRule::public())
            .with("/contato", RouteRule::public())
    }

    #[must_use]
    pub fn with(mut self, path: &str, rule: RouteRule) -> Self {
        self.rules.insert(path.to_string(), rule);
        self
    }

    /// Exact match first, then the longest prefix other than `/`. Unknown
    /// paths are public. Query strings and fragments are ignored.
    #[must_use]
    pub fn lookup(&self, path: &str) -> &RouteRule {
        let path = strip_query(path);
        if let Some(rule) = self.rules.get(path) {
            return rule;
        }

        self.rules
            .iter()
            .filter(|(prefix, _)| prefix.as_str() != "/" && path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(&PUBLIC_RULE, |(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteRule)> {
        self.rules.iter().map(|(path, rule)| (path.as_str(), rule))
    }
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = path[..end].trim();
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
