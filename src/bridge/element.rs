//! Remote element proxies
//!
//! A [`RemoteElement`] names a page element by its marker attribute and
//! re-selects it through the utility library on every call. Each method call
//! becomes one `Runtime.evaluate` of a synthesized expression; nothing is
//! cached, so a stale marker simply selects nothing.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::payload::LIBRARY_NAMESPACE;
use crate::cdp::traits::{CdpClient, EvaluateOptions};
use crate::cdp::types::RemoteObject;
use crate::{Error, Result};

/// Attribute carrying the marker id of live-preview elements
pub const MARKER_ATTRIBUTE: &str = "data-brackets-id";

/// Methods a remote element proxy may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementMethod {
    Attr,
    RemoveAttr,
    Before,
    After,
    Append,
    Prepend,
    Text,
    Detach,
    Remove,
    Html,
}

impl ElementMethod {
    /// Every allowed method
    pub const ALL: [ElementMethod; 10] = [
        ElementMethod::Attr,
        ElementMethod::RemoveAttr,
        ElementMethod::Before,
        ElementMethod::After,
        ElementMethod::Append,
        ElementMethod::Prepend,
        ElementMethod::Text,
        ElementMethod::Detach,
        ElementMethod::Remove,
        ElementMethod::Html,
    ];

    /// Method name in the remote library
    pub fn name(self) -> &'static str {
        match self {
            ElementMethod::Attr => "attr",
            ElementMethod::RemoveAttr => "removeAttr",
            ElementMethod::Before => "before",
            ElementMethod::After => "after",
            ElementMethod::Append => "append",
            ElementMethod::Prepend => "prepend",
            ElementMethod::Text => "text",
            ElementMethod::Detach => "detach",
            ElementMethod::Remove => "remove",
            ElementMethod::Html => "html",
        }
    }
}

impl fmt::Display for ElementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ElementMethod::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::internal(format!("Unsupported element method: {}", s)))
    }
}

/// Argument of a proxy method
///
/// Only literals can be written into the synthesized expression. Strings are
/// quoted and escaped; numbers and booleans are written as JS literals, with
/// non-finite numbers as `Infinity`, `-Infinity` and `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyArg {
    Str(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

impl ProxyArg {
    fn render(&self) -> String {
        match self {
            ProxyArg::Str(s) => format!("\"{}\"", escape_js_str(s)),
            ProxyArg::Int(n) => n.to_string(),
            ProxyArg::Number(n) if n.is_nan() => "NaN".to_string(),
            ProxyArg::Number(n) if n.is_infinite() => {
                if n.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_string()
            }
            ProxyArg::Number(n) => n.to_string(),
            ProxyArg::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ProxyArg {
    fn from(value: &str) -> Self {
        ProxyArg::Str(value.to_string())
    }
}

impl From<String> for ProxyArg {
    fn from(value: String) -> Self {
        ProxyArg::Str(value)
    }
}

impl From<i64> for ProxyArg {
    fn from(value: i64) -> Self {
        ProxyArg::Int(value)
    }
}

impl From<f64> for ProxyArg {
    fn from(value: f64) -> Self {
        ProxyArg::Number(value)
    }
}

impl From<bool> for ProxyArg {
    fn from(value: bool) -> Self {
        ProxyArg::Bool(value)
    }
}

/// Escape backslashes and double quotes for a double-quoted JS string
fn escape_js_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Proxy for the page element carrying a given marker id
#[derive(Debug, Clone)]
pub struct RemoteElement {
    marker_id: String,
    client: Arc<dyn CdpClient>,
}

impl RemoteElement {
    /// Proxy for the element whose marker attribute equals `marker_id`
    pub fn new<S: Into<String>>(marker_id: S, client: Arc<dyn CdpClient>) -> Self {
        Self {
            marker_id: marker_id.into(),
            client,
        }
    }

    /// Marker id this proxy selects by
    pub fn marker_id(&self) -> &str {
        &self.marker_id
    }

    /// Expression selecting the element through the utility library
    pub fn selector_expression(&self) -> String {
        format!(
            "window.{}(\"[{}=\\\"{}\\\"]\")",
            LIBRARY_NAMESPACE,
            MARKER_ATTRIBUTE,
            escape_js_str(&escape_js_str(&self.marker_id))
        )
    }

    /// Expression selecting the element and invoking `method(args)`
    pub fn expression(&self, method: ElementMethod, args: &[ProxyArg]) -> String {
        let args: Vec<String> = args.iter().map(ProxyArg::render).collect();
        format!("{}.{}({})", self.selector_expression(), method.name(), args.join(","))
    }

    /// Evaluate `method(args)` against the element
    pub async fn invoke(&self, method: ElementMethod, args: &[ProxyArg]) -> Result<RemoteObject> {
        let expression = self.expression(method, args);
        debug!("Remote element {}: {}", self.marker_id, method);

        self.client
            .evaluate(&expression, EvaluateOptions::default())
            .await?
            .into_result()
    }

    /// Invoke a method by its remote name; names outside the allow-list are rejected
    pub async fn invoke_named(&self, method: &str, args: &[ProxyArg]) -> Result<RemoteObject> {
        let method = method.parse::<ElementMethod>()?;
        self.invoke(method, args).await
    }

    /// Read an attribute
    pub async fn attr(&self, name: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Attr, &[name.into()]).await
    }

    /// Set an attribute
    pub async fn set_attr<V: Into<ProxyArg>>(&self, name: &str, value: V) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Attr, &[name.into(), value.into()]).await
    }

    /// Remove an attribute
    pub async fn remove_attr(&self, name: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::RemoveAttr, &[name.into()]).await
    }

    /// Insert HTML before the element
    pub async fn before(&self, html: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Before, &[html.into()]).await
    }

    /// Insert HTML after the element
    pub async fn after(&self, html: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::After, &[html.into()]).await
    }

    /// Append HTML as last child
    pub async fn append(&self, html: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Append, &[html.into()]).await
    }

    /// Prepend HTML as first child
    pub async fn prepend(&self, html: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Prepend, &[html.into()]).await
    }

    /// Read the text content
    pub async fn text(&self) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Text, &[]).await
    }

    /// Replace the text content
    pub async fn set_text(&self, text: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Text, &[text.into()]).await
    }

    /// Detach the element, keeping its data
    pub async fn detach(&self) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Detach, &[]).await
    }

    /// Remove the element
    pub async fn remove(&self) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Remove, &[]).await
    }

    /// Read the inner HTML
    pub async fn html(&self) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Html, &[]).await
    }

    /// Replace the inner HTML
    pub async fn set_html(&self, html: &str) -> Result<RemoteObject> {
        self.invoke(ElementMethod::Html, &[html.into()]).await
    }
}
