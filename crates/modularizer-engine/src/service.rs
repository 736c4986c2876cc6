//! Service provider descriptors (`META-INF/services/<service>`)

use thiserror::Error;

/// Directory holding service provider descriptors
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Errors found while reading a service descriptor
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// A line holds more than one token
    #[error("{path}:{line}: illegal configuration-file syntax")]
    IllegalSyntax { path: String, line: usize },

    /// A provider name is not a valid qualified identifier
    #[error("{path}:{line}: illegal provider-class name: {name}")]
    IllegalProvider {
        path: String,
        line: usize,
        name: String,
    },
}

/// Parsed service descriptor: the service name plus its provider list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    service: String,
    providers: Vec<String>,
}

impl ServiceDescriptor {
    /// Check whether a resource path names a service descriptor
    pub fn is_descriptor(path: &str) -> bool {
        path.starts_with(SERVICES_PREFIX) && path.len() > SERVICES_PREFIX.len()
    }

    /// Create an empty descriptor for a resource path
    pub fn new(path: &str) -> Self {
        let service = path.strip_prefix(SERVICES_PREFIX).unwrap_or(path);
        Self {
            service: service.to_string(),
            providers: Vec::new(),
        }
    }

    /// Parse descriptor contents. `#` starts a comment; one provider per line.
    pub fn parse(path: &str, contents: &str) -> Result<Self, ServiceError> {
        let mut descriptor = Self::new(path);
        for (i, raw) in contents.lines().enumerate() {
            let line = match raw.find('#') {
                Some(ci) => &raw[..ci],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            if line.contains(' ') || line.contains('\t') {
                return Err(ServiceError::IllegalSyntax {
                    path: path.to_string(),
                    line: i + 1,
                });
            }
            descriptor.add_provider_at(path, i + 1, line)?;
        }
        Ok(descriptor)
    }

    /// Add one provider; duplicates are ignored
    pub fn add_provider(&mut self, path: &str, provider: &str) -> Result<(), ServiceError> {
        self.add_provider_at(path, 0, provider)
    }

    fn add_provider_at(&mut self, path: &str, line: usize, provider: &str) -> Result<(), ServiceError> {
        if !is_qualified_identifier(provider) {
            return Err(ServiceError::IllegalProvider {
                path: path.to_string(),
                line,
                name: provider.to_string(),
            });
        }
        if !self.providers.iter().any(|p| p == provider) {
            self.providers.push(provider.to_string());
        }
        Ok(())
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Name used when matching include patterns: the first provider,
    /// or the service itself when no provider is listed
    pub fn match_name(&self) -> &str {
        self.providers
            .first()
            .map(String::as_str)
            .unwrap_or(self.service.as_str())
    }
}

fn is_qualified_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "META-INF/services/com.foo.Spi";

    #[test]
    fn test_parse_descriptor() {
        let contents = "# providers\ncom.foo.impl.First\n\ncom.foo.impl.Second # trailing\ncom.foo.impl.First\n";
        let d = ServiceDescriptor::parse(PATH, contents).unwrap();
        assert_eq!(d.service(), "com.foo.Spi");
        assert_eq!(d.providers(), ["com.foo.impl.First", "com.foo.impl.Second"]);
        assert_eq!(d.match_name(), "com.foo.impl.First");
    }

    #[test]
    fn test_empty_descriptor_matches_service() {
        let d = ServiceDescriptor::parse(PATH, "# nothing\n").unwrap();
        assert!(d.providers().is_empty());
        assert_eq!(d.match_name(), "com.foo.Spi");
    }

    #[test]
    fn test_illegal_syntax() {
        let err = ServiceDescriptor::parse(PATH, "com.foo.A com.foo.B\n").unwrap_err();
        assert_eq!(
            err,
            ServiceError::IllegalSyntax {
                path: PATH.to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn test_illegal_provider() {
        let err = ServiceDescriptor::parse(PATH, "1com.foo.A\n").unwrap_err();
        assert!(matches!(err, ServiceError::IllegalProvider { line: 1, .. }));
        let err = ServiceDescriptor::parse(PATH, "com.foo-bar.A\n").unwrap_err();
        assert!(matches!(err, ServiceError::IllegalProvider { .. }));
    }

    #[test]
    fn test_is_descriptor() {
        assert!(ServiceDescriptor::is_descriptor(PATH));
        assert!(!ServiceDescriptor::is_descriptor("META-INF/services/"));
        assert!(!ServiceDescriptor::is_descriptor("com/foo/app.properties"));
    }
}
