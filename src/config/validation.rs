//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Required sections for the selected backend
//! - Value ranges (timeouts > 0, cache bound >= 1) and address syntax
//! - Directory timeout shorter than the request timeout
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before anything is started

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::auth::directory::USERNAME_PLACEHOLDER;
use crate::config::schema::{
    AuthBackend, BindConfig, ComponentConfig, DirectoryConfig, GatewayConfig,
    ADMIN_KEY_PLACEHOLDER,
};

/// One rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic rule, collecting all violations.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    let prefix = &config.uri_prefix;
    if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
        errors.push(ValidationError::new(
            "uri_prefix",
            "must be empty or start with '/' and not end with '/'",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::new("timeouts.shutdown_secs", "must be greater than 0"));
    }

    let realm = &config.auth.realm;
    if realm.trim().is_empty() {
        errors.push(ValidationError::new("auth.realm", "must not be empty"));
    } else if realm.chars().any(|c| c == '"' || c == '\\' || c.is_control() || !c.is_ascii()) {
        errors.push(ValidationError::new(
            "auth.realm",
            "must be printable ASCII without quotes or backslashes",
        ));
    }

    match config.auth.backend {
        AuthBackend::Static => {
            if config.auth.users.is_empty() {
                errors.push(ValidationError::new(
                    "auth.users",
                    "static backend requires at least one user",
                ));
            }
        }
        AuthBackend::Directory => match &config.auth.directory {
            Some(directory) => {
                validate_directory(&mut errors, directory, config.timeouts.request_secs)
            }
            None => errors.push(ValidationError::new(
                "auth.directory",
                "required when backend = \"directory\"",
            )),
        },
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than 0"));
    }

    let mut names = HashSet::new();
    for (i, component) in config.components.iter().enumerate() {
        let field = format!("components[{}]", i);
        if component.name().trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if !names.insert(component.name()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate component name '{}'", component.name()),
            ));
        }

        match component {
            ComponentConfig::IndexEngine(engine) => {
                if engine.data_directory.as_os_str().is_empty() {
                    errors.push(ValidationError::new(
                        format!("{}.data_directory", field),
                        "must not be empty",
                    ));
                }
                if engine.enable_http && engine.bind_host.trim().is_empty() {
                    errors.push(ValidationError::new(
                        format!("{}.bind_host", field),
                        "must not be empty when enable_http is set",
                    ));
                }
                if engine.default_fetch_size == 0 {
                    errors.push(ValidationError::new(
                        format!("{}.default_fetch_size", field),
                        "must be greater than 0",
                    ));
                }
            }
        }
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        let key = config.admin.api_key.trim();
        if key.is_empty() || key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a non-placeholder value when admin is enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_directory(
    errors: &mut Vec<ValidationError>,
    directory: &DirectoryConfig,
    request_secs: u64,
) {
    match Url::parse(&directory.url) {
        Ok(url) if matches!(url.scheme(), "ldap" | "ldaps") && url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(
            "auth.directory.url",
            "must be an ldap:// or ldaps:// URL with a host",
        )),
        Err(e) => errors.push(ValidationError::new("auth.directory.url", e.to_string())),
    }

    if directory.timeout_ms == 0 {
        errors.push(ValidationError::new("auth.directory.timeout_ms", "must be greater than 0"));
    } else if request_secs > 0 && directory.timeout_ms >= request_secs.saturating_mul(1000) {
        // Otherwise the request timeout answers first and an outage is
        // reported as a client timeout instead of 503.
        errors.push(ValidationError::new(
            "auth.directory.timeout_ms",
            format!(
                "must be shorter than timeouts.request_secs ({}s)",
                request_secs
            ),
        ));
    }

    match &directory.bind {
        BindConfig::Direct { dn_template } => {
            if !dn_template.contains(USERNAME_PLACEHOLDER) {
                errors.push(ValidationError::new(
                    "auth.directory.bind.dn_template",
                    format!("must contain {}", USERNAME_PLACEHOLDER),
                ));
            }
        }
        BindConfig::Search {
            base,
            filter,
            service_dn,
            service_password,
        } => {
            if base.trim().is_empty() {
                errors.push(ValidationError::new("auth.directory.bind.base", "must not be empty"));
            }
            if !filter.contains(USERNAME_PLACEHOLDER) {
                errors.push(ValidationError::new(
                    "auth.directory.bind.filter",
                    format!("must contain {}", USERNAME_PLACEHOLDER),
                ));
            }
            if service_dn.is_some() && service_password.as_deref().unwrap_or("").is_empty() {
                errors.push(ValidationError::new(
                    "auth.directory.bind.service_password",
                    "required when service_dn is set",
                ));
            }
        }
    }

    if directory.cache.ttl_secs > 0 && directory.cache.max_entries == 0 {
        errors.push(ValidationError::new(
            "auth.directory.cache.max_entries",
            "must be at least 1 when caching is enabled",
        ));
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address: {}", value, e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CacheConfig, IndexEngineConfig};

    fn static_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.users.insert("alice".into(), "secret".into());
        config
    }

    fn directory(bind: BindConfig) -> DirectoryConfig {
        DirectoryConfig {
            url: "ldap://directory.example:389".into(),
            starttls: false,
            timeout_ms: 2000,
            bind,
            cache: CacheConfig::default(),
        }
    }

    fn fields(config: &GatewayConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn test_minimal_static_config_is_valid() {
        assert!(validate_config(&static_config()).is_ok());
    }

    #[test]
    fn test_default_config_requires_users() {
        assert_eq!(fields(&GatewayConfig::default()), vec!["auth.users"]);
    }

    #[test]
    fn test_directory_backend_requires_section() {
        let mut config = static_config();
        config.auth.backend = AuthBackend::Directory;
        assert_eq!(fields(&config), vec!["auth.directory"]);
    }

    #[test]
    fn test_directory_rules_collect_all_errors() {
        let mut config = static_config();
        config.auth.backend = AuthBackend::Directory;
        let mut dir = directory(BindConfig::Search {
            base: "".into(),
            filter: "(uid=*)".into(),
            service_dn: Some("cn=gw".into()),
            service_password: None,
        });
        dir.url = "http://directory.example".into();
        dir.timeout_ms = 0;
        dir.cache.max_entries = 0;
        config.auth.directory = Some(dir);

        let found = fields(&config);
        for expected in [
            "auth.directory.url",
            "auth.directory.timeout_ms",
            "auth.directory.bind.base",
            "auth.directory.bind.filter",
            "auth.directory.bind.service_password",
            "auth.directory.cache.max_entries",
        ] {
            assert!(found.iter().any(|f| f == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_valid_directory_config() {
        let mut config = static_config();
        config.auth.backend = AuthBackend::Directory;
        config.auth.directory = Some(directory(BindConfig::Direct {
            dn_template: "uid={username},ou=people,dc=example".into(),
        }));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_directory_timeout_must_fit_in_request_timeout() {
        let mut config = static_config();
        config.auth.backend = AuthBackend::Directory;
        config.timeouts.request_secs = 1;
        let mut dir = directory(BindConfig::Direct {
            dn_template: "uid={username},ou=people,dc=example".into(),
        });
        dir.timeout_ms = 3000;
        config.auth.directory = Some(dir.clone());
        assert_eq!(fields(&config), vec!["auth.directory.timeout_ms"]);

        dir.timeout_ms = 1000;
        config.auth.directory = Some(dir.clone());
        assert_eq!(fields(&config), vec!["auth.directory.timeout_ms"]);

        dir.timeout_ms = 900;
        config.auth.directory = Some(dir);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_realm_and_prefix_rules() {
        let mut config = static_config();
        config.auth.realm = "say \"hi\"".into();
        config.uri_prefix = "api/".into();
        assert_eq!(fields(&config), vec!["uri_prefix", "auth.realm"]);
    }

    #[test]
    fn test_duplicate_component_names() {
        let mut config = static_config();
        let engine = IndexEngineConfig {
            name: "index".into(),
            data_directory: "/var/lib/gateway/index".into(),
            bind_host: "127.0.0.1".into(),
            enable_http: false,
            http_port: 9200,
            default_fetch_size: 100,
        };
        config.components.push(ComponentConfig::IndexEngine(engine.clone()));
        config.components.push(ComponentConfig::IndexEngine(engine));
        assert_eq!(fields(&config), vec!["components[1].name"]);
    }

    #[test]
    fn test_admin_placeholder_key_rejected() {
        let mut config = static_config();
        config.admin.enabled = true;
        assert_eq!(fields(&config), vec!["admin.api_key"]);
    }
}
