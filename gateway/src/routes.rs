/// Path classification for the reverse proxy. First match wins:
///
/// - `/api/{service}/{rest}` → `{service}`, authenticated except the login
///   and register endpoints;
/// - `/page/{service}/{rest}` → `{service}-frontend`;
/// - `/upload/{rest}` → `file-service`;
/// - anything else → `slug-service`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTarget {
    /// Logical service name, resolved against the registry.
    pub service: String,
    /// Path to forward, with the routing prefix stripped.
    pub path: String,
    pub requires_auth: bool,
}

pub fn classify(path: &str) -> RouteTarget {
    if let Some(rest) = path.strip_prefix("/api/") {
        let (service, rest) = split_service(rest);
        return RouteTarget {
            service: service.to_string(),
            path: rest,
            requires_auth: !is_auth_bypass(path),
        };
    }

    if let Some(rest) = path.strip_prefix("/page/") {
        let (service, rest) = split_service(rest);
        return RouteTarget {
            service: format!("{}-frontend", service),
            path: rest,
            requires_auth: false,
        };
    }

    if path == "/upload" || path.starts_with("/upload/") {
        let rest = &path["/upload".len()..];
        return RouteTarget {
            service: "file-service".to_string(),
            path: if rest.is_empty() {
                "/".to_string()
            } else {
                rest.to_string()
            },
            requires_auth: false,
        };
    }

    RouteTarget {
        service: "slug-service".to_string(),
        path: path.to_string(),
        requires_auth: false,
    }
}

/// Login and register must be reachable without a bearer, whichever service
/// hosts them.
fn is_auth_bypass(path: &str) -> bool {
    let Some(rest) = path.strip_prefix("/api/") else {
        return false;
    };
    let (_service, rest) = split_service(rest);
    rest == "/auth/login" || rest == "/auth/register"
}

fn split_service(rest: &str) -> (&str, String) {
    match rest.split_once('/') {
        Some((service, tail)) => (service, format!("/{}", tail)),
        None => (rest, "/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_routes_strip_prefix_and_require_auth() {
        let target = classify("/api/billing/invoices/42");
        assert_eq!(target.service, "billing");
        assert_eq!(target.path, "/invoices/42");
        assert!(target.requires_auth);
    }

    #[test]
    fn api_service_root() {
        let target = classify("/api/billing");
        assert_eq!(target.service, "billing");
        assert_eq!(target.path, "/");
        assert!(target.requires_auth);
    }

    #[test]
    fn login_and_register_bypass_auth_for_any_service() {
        assert!(!classify("/api/auth/auth/login").requires_auth);
        assert!(!classify("/api/identity/auth/register").requires_auth);
        assert!(classify("/api/identity/auth/logout").requires_auth);
        assert!(classify("/api/identity/auth/login/extra").requires_auth);
    }

    #[test]
    fn page_routes_map_to_frontend_services() {
        let target = classify("/page/billing/overview");
        assert_eq!(target.service, "billing-frontend");
        assert_eq!(target.path, "/overview");
        assert!(!target.requires_auth);
    }

    #[test]
    fn upload_routes_map_to_file_service() {
        let target = classify("/upload/bucket/key.png");
        assert_eq!(target.service, "file-service");
        assert_eq!(target.path, "/bucket/key.png");
        assert!(!target.requires_auth);
    }

    #[test]
    fn everything_else_falls_through_to_slug_service() {
        let target = classify("/pretty-marketing-page");
        assert_eq!(target.service, "slug-service");
        assert_eq!(target.path, "/pretty-marketing-page");
        assert!(!target.requires_auth);

        // A prefix is only a prefix at a path-segment boundary.
        assert_eq!(classify("/uploads").service, "slug-service");
    }
}
