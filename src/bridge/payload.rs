//! Injected payloads and the expressions that install them

use crate::{Error, Result};

/// Global holding the command namespace in the page
pub const COMMAND_NAMESPACE: &str = "_LD";

/// Global holding the utility library in no-conflict mode
pub const LIBRARY_NAMESPACE: &str = "_LDjQuery";

/// Smallest function payload the agent can work with: it only answers keep-alives.
pub const DEFAULT_REMOTE_FUNCTIONS: &str = "function (experimental) { return { keepAlive: function () {} }; }";

/// Script payloads injected on every page load
///
/// Both payloads are opaque: `remote_functions` must be a function expression
/// taking the configuration flag and returning the command namespace object,
/// `library` must define a global `jQuery`.
#[derive(Debug, Clone)]
pub struct Payloads {
    remote_functions: String,
    library: Option<String>,
}

impl Payloads {
    /// Payloads without utility library
    pub fn new<S: Into<String>>(remote_functions: S) -> Self {
        Self {
            remote_functions: remote_functions.into(),
            library: None,
        }
    }

    /// Add the utility library payload
    pub fn with_library<S: Into<String>>(mut self, library: S) -> Self {
        self.library = Some(library.into());
        self
    }

    /// Read payloads from disk, falling back to [`DEFAULT_REMOTE_FUNCTIONS`]
    pub fn from_files(remote_functions_path: Option<&str>, library_path: Option<&str>) -> Result<Self> {
        let read = |path: &str| {
            std::fs::read_to_string(path)
                .map_err(|e| Error::configuration(format!("Failed to read payload {}: {}", path, e)))
        };

        let remote_functions = match remote_functions_path {
            Some(path) => read(path)?,
            None => DEFAULT_REMOTE_FUNCTIONS.to_string(),
        };
        let library = library_path.map(read).transpose()?;

        Ok(Self {
            remote_functions,
            library,
        })
    }

    /// Whether a utility library will be injected
    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }

    /// Expression defining the command namespace; evaluates to the namespace object
    pub fn command_expression(&self, experimental: bool) -> String {
        format!(
            "window.{}={}({});",
            COMMAND_NAMESPACE,
            self.remote_functions.trim().trim_end_matches(';'),
            experimental
        )
    }

    /// Expression loading the library; evaluates to its no-conflict handle
    pub fn library_expression(&self) -> Option<String> {
        self.library
            .as_ref()
            .map(|library| format!("{}\nwindow.{}=jQuery.noConflict(true);", library, LIBRARY_NAMESPACE))
    }
}

impl Default for Payloads {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_FUNCTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_expression_passes_flag() {
        let payloads = Payloads::new("function RemoteFunctions(experimental) { return {}; };\n");
        assert_eq!(
            payloads.command_expression(true),
            "window._LD=function RemoteFunctions(experimental) { return {}; }(true);"
        );
    }

    #[test]
    fn test_library_expression() {
        assert!(Payloads::default().library_expression().is_none());

        let payloads = Payloads::default().with_library("var jQuery = function () {};");
        assert_eq!(
            payloads.library_expression().unwrap(),
            "var jQuery = function () {};\nwindow._LDjQuery=jQuery.noConflict(true);"
        );
    }

    #[test]
    fn test_from_files_missing_path() {
        let result = Payloads::from_files(Some("/nonexistent/RemoteFunctions.js"), None);
        assert!(matches!(result, Err(Error::Configuration(_))));

        let defaults = Payloads::from_files(None, None).unwrap();
        assert!(!defaults.has_library());
    }
}
