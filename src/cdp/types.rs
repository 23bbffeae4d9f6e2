//! CDP (Chrome DevTools Protocol) type definitions
//!
//! This module defines the core data structures for CDP communication.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;

/// `Page.loadEventFired`
pub const LOAD_EVENT_FIRED: &str = "Page.loadEventFired";
/// `Page.frameStartedLoading`
pub const FRAME_STARTED_LOADING: &str = "Page.frameStartedLoading";
/// `DOM.attributeModified`
pub const ATTRIBUTE_MODIFIED: &str = "DOM.attributeModified";

/// CDP JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Request ID
    pub id: u64,
    /// Method name (e.g., "Runtime.evaluate")
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Session ID for multi-session targets
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC notification (event)
#[derive(Debug, Clone, Deserialize)]
pub struct CdpNotification {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session ID for multi-session targets
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct CdpRpcResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error if any
    #[serde(default)]
    pub error: Option<CdpErrorDetail>,
}

/// CDP error detail
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorDetail {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Opaque reference to a value living in the remote runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(String);

impl ObjectHandle {
    /// Wrap a protocol `objectId`
    pub fn new<S: Into<String>>(object_id: S) -> Self {
        Self(object_id.into())
    }

    /// The protocol `objectId`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Runtime.evaluate` parameters
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    /// JavaScript expression to evaluate
    pub expression: String,
    /// Object group the result handle is registered under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    /// Whether to await promise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    /// Whether to return as value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    /// Execution context ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<i64>,
}

/// Argument of `Runtime.callFunctionOn`
///
/// Exactly one of the two fields is set: a handle is sent by reference,
/// anything else by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    /// Remote object handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<ObjectHandle>,
    /// Primitive or JSON value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl CallArgument {
    /// Argument passed by reference
    pub fn by_handle(handle: ObjectHandle) -> Self {
        Self {
            object_id: Some(handle),
            value: None,
        }
    }

    /// Argument passed by value
    pub fn by_value(value: serde_json::Value) -> Self {
        Self {
            object_id: None,
            value: Some(value),
        }
    }
}

/// `Runtime.callFunctionOn` parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    /// Target object
    pub object_id: ObjectHandle,
    /// Function expression evaluated remotely and called with `this` bound to the target
    pub function_declaration: String,
    /// Call arguments
    pub arguments: Vec<CallArgument>,
    /// Whether to return as value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    /// Whether to await promise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
}

/// Remote object (result of JavaScript evaluation)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Object type
    #[serde(default)]
    pub r#type: String,
    /// Object subtype
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Constructor name for objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Object value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Unserializable value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    /// Object description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Handle of the remote object, absent for primitives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<ObjectHandle>,
}

impl RemoteObject {
    /// Handle of the object, if it was returned by reference
    pub fn handle(&self) -> Option<&ObjectHandle> {
        self.object_id.as_ref()
    }
}

/// Exception details
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Exception ID
    #[serde(default)]
    pub exception_id: i64,
    /// Exception text
    #[serde(default)]
    pub text: Option<String>,
    /// Line number
    #[serde(default)]
    pub line_number: i64,
    /// Column number
    #[serde(default)]
    pub column_number: i64,
    /// Exception object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// Best available description of the thrown value
    pub fn describe(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .or_else(|| self.text.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Response of `Runtime.evaluate` and `Runtime.callFunctionOn`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeResponse {
    /// Evaluation result
    #[serde(default)]
    pub result: RemoteObject,
    /// Legacy thrown marker
    #[serde(default)]
    pub was_thrown: bool,
    /// Exception details if evaluation threw
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

impl RuntimeResponse {
    /// Whether the remote code threw
    pub fn threw(&self) -> bool {
        self.was_thrown || self.exception_details.is_some()
    }

    /// Settle into the result object, or a remote exception error
    pub fn into_result(self) -> Result<RemoteObject, Error> {
        if !self.threw() {
            return Ok(self.result);
        }

        let text = match &self.exception_details {
            Some(details) => details.describe(),
            None => self
                .result
                .description
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        };
        let details = match self.exception_details {
            Some(details) => serde_json::to_value(details)?,
            None => serde_json::to_value(&self.result)?,
        };

        Err(Error::remote_exception(text, details))
    }
}

/// Response of `DOM.resolveNode`
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveNodeResponse {
    /// JavaScript object wrapper for the node
    pub object: RemoteObject,
}

/// Payload of `DOM.attributeModified`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeModified {
    /// Node whose attribute changed
    pub node_id: i64,
    /// Attribute name
    pub name: String,
    /// New attribute value
    #[serde(default)]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cdp_request_without_params() {
        let request = CdpRequest {
            id: 2,
            method: "Page.enable".to_string(),
            params: None,
            session_id: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"id\":2"));
        assert!(!json.contains("\"params\""));
    }

    #[test]
    fn test_call_argument_shapes() {
        let by_ref = serde_json::to_value(CallArgument::by_handle(ObjectHandle::new("obj-1"))).unwrap();
        assert_eq!(by_ref, json!({ "objectId": "obj-1" }));

        let by_value = serde_json::to_value(CallArgument::by_value(json!(null))).unwrap();
        assert_eq!(by_value, json!({ "value": null }));
    }

    #[test]
    fn test_runtime_response_with_object_id() {
        let response: RuntimeResponse = serde_json::from_value(json!({
            "result": { "type": "object", "className": "Object", "objectId": "{\"injectedScriptId\":1,\"id\":7}" }
        }))
        .unwrap();

        let object = response.into_result().unwrap();
        assert_eq!(
            object.handle().map(ObjectHandle::as_str),
            Some("{\"injectedScriptId\":1,\"id\":7}")
        );
    }

    #[test]
    fn test_runtime_response_exception_details() {
        let response: RuntimeResponse = serde_json::from_value(json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": {
                "exceptionId": 3,
                "text": "Uncaught",
                "lineNumber": 0,
                "columnNumber": 12,
                "exception": { "type": "object", "description": "TypeError: x is not a function" }
            }
        }))
        .unwrap();

        match response.into_result() {
            Err(Error::RemoteException { text, details }) => {
                assert_eq!(text, "TypeError: x is not a function");
                assert_eq!(details["columnNumber"], 12);
            }
            other => panic!("expected remote exception, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_response_legacy_was_thrown() {
        let response: RuntimeResponse = serde_json::from_value(json!({
            "result": { "type": "string", "value": "boom", "description": "boom" },
            "wasThrown": true
        }))
        .unwrap();

        let err = response.into_result().unwrap_err();
        assert!(err.is_remote_exception());
    }

    #[test]
    fn test_attribute_modified_parse() {
        let event: AttributeModified = serde_json::from_value(json!({
            "nodeId": 12, "name": "data-ld-highlight", "value": "1"
        }))
        .unwrap();
        assert_eq!(event.node_id, 12);
        assert_eq!(event.name, "data-ld-highlight");
    }
}
