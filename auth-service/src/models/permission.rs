/// Permission string syntax and wildcard matching.
///
/// A permission is one of:
/// - `*` — matches everything;
/// - `resource.action` — e.g. `user.read`; `resource.*` covers any action;
/// - `resource:action:scope` — extended form with a free-form scope tag.
///
/// Wildcards never cross the resource boundary: `user.*` says nothing
/// about `billing.read`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Any,
    Pattern {
        resource: String,
        action: String,
        scope: Option<String>,
    },
}

impl Permission {
    /// Parse a permission string. Returns `None` for strings that fit
    /// neither form; unknown grants are simply never satisfied.
    pub fn parse(raw: &str) -> Option<Permission> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw == "*" {
            return Some(Permission::Any);
        }

        if raw.contains(':') {
            let mut parts = raw.splitn(3, ':');
            let resource = parts.next()?.to_string();
            let action = parts.next()?.to_string();
            let scope = parts.next().map(str::to_string);
            if resource.is_empty() || action.is_empty() {
                return None;
            }
            return Some(Permission::Pattern {
                resource,
                action,
                scope,
            });
        }

        let (resource, action) = raw.split_once('.')?;
        if resource.is_empty() || action.is_empty() {
            return None;
        }
        Some(Permission::Pattern {
            resource: resource.to_string(),
            action: action.to_string(),
            scope: None,
        })
    }

    /// Does this (held) permission satisfy `required`?
    pub fn satisfies(&self, required: &Permission) -> bool {
        match (self, required) {
            (Permission::Any, _) => true,
            (_, Permission::Any) => false,
            (
                Permission::Pattern {
                    resource,
                    action,
                    scope,
                },
                Permission::Pattern {
                    resource: req_resource,
                    action: req_action,
                    scope: req_scope,
                },
            ) => {
                if resource != req_resource {
                    return false;
                }
                if action != "*" && action != req_action {
                    return false;
                }
                match (scope, req_scope) {
                    (Some(held), Some(wanted)) => held == wanted,
                    _ => true,
                }
            }
        }
    }
}

/// A user's resolved permission grants, parsed once for repeated checks.
#[derive(Debug, Clone)]
pub struct PermissionSet {
    raw: Vec<String>,
    parsed: Vec<Permission>,
}

impl PermissionSet {
    pub fn new(permissions: &[String]) -> Self {
        let parsed = permissions
            .iter()
            .filter_map(|p| Permission::parse(p))
            .collect();
        Self {
            raw: permissions.to_vec(),
            parsed,
        }
    }

    pub fn has(&self, required: &str) -> bool {
        // Exact string match short-circuits before any parsing.
        if self.raw.iter().any(|p| p == required) {
            return true;
        }
        let Some(required) = Permission::parse(required) else {
            return false;
        };
        self.parsed.iter().any(|held| held.satisfies(&required))
    }

    pub fn has_all<'a, I: IntoIterator<Item = &'a str>>(&self, required: I) -> bool {
        required.into_iter().all(|r| self.has(r))
    }

    pub fn has_any<'a, I: IntoIterator<Item = &'a str>>(&self, required: I) -> bool {
        required.into_iter().any(|r| self.has(r))
    }

    /// Required permissions the set does not cover, for 403 payloads.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|r| !self.has(r)).collect()
    }
}
