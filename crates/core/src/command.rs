//! Command and response envelopes exchanged with the command service.
//!
//! A [`Command`] is the unit sent over the RPC boundary: a command name, an
//! opaque request payload and the session metadata (user token, locale) that the
//! dispatcher stamps just before sending. A [`CommandResponse`] is what comes
//! back: either a payload or a list of structured exceptions.
//!
//! The field names on the wire follow the service's camelCase convention
//! (`commandName`, `userToken`, ...). The exact transport encoding is owned by
//! the transport implementation; these types only fix the shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Fully qualified class name of the server-side security exception.
pub const SECURITY_EXCEPTION_CLASS: &str = "org.geomajas.security.GeomajasSecurityException";

/// Numeric exception codes reported by the command service.
///
/// Only the codes the client reacts to are named here; any other value is
/// carried through untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionCode(pub i32);

impl ExceptionCode {
    /// The user token is absent, expired or not recognised by the server.
    pub const CREDENTIALS_MISSING_OR_INVALID: ExceptionCode = ExceptionCode(39);
}

/// A named request plus payload, addressed to the command service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(rename = "commandName")]
    name: String,
    request: Value,
    user_token: Option<String>,
    locale: Option<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, request: Value) -> Self {
        Self {
            name: name.into(),
            request,
            user_token: None,
            locale: None,
        }
    }

    /// Build a command from a typed request.
    pub fn with_request<R: Serialize>(name: impl Into<String>, request: &R) -> CoreResult<Self> {
        let request = serde_json::to_value(request).map_err(|e| CoreError::encode(e.to_string()))?;
        Ok(Self::new(name, request))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    pub fn user_token(&self) -> Option<&str> {
        self.user_token.as_deref()
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// True when the command carries a non-empty token.
    pub fn has_token(&self) -> bool {
        self.user_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Stamp session metadata onto the command. Only the dispatcher calls this.
    pub fn stamp(&mut self, user_token: Option<String>, locale: Option<String>) {
        self.user_token = user_token;
        self.locale = locale;
    }
}

/// Structured description of a server-side exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDto {
    pub class_name: String,
    #[serde(default)]
    pub exception_code: ExceptionCode,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack_trace: Vec<String>,
    #[serde(default)]
    pub cause: Option<Box<ExceptionDto>>,
}

impl Default for ExceptionCode {
    fn default() -> Self {
        ExceptionCode(0)
    }
}

impl ExceptionDto {
    pub fn new(class_name: impl Into<String>, exception_code: ExceptionCode) -> Self {
        Self {
            class_name: class_name.into(),
            exception_code,
            message: None,
            stack_trace: Vec::new(),
            cause: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Security exception with the "credentials missing or invalid" code.
    pub fn credentials_missing_or_invalid() -> Self {
        Self::new(
            SECURITY_EXCEPTION_CLASS,
            ExceptionCode::CREDENTIALS_MISSING_OR_INVALID,
        )
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.class_name == SECURITY_EXCEPTION_CLASS
            && self.exception_code == ExceptionCode::CREDENTIALS_MISSING_OR_INVALID
    }
}

/// Response envelope returned by the command service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    exceptions: Vec<ExceptionDto>,
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    execution_time_ms: u64,
}

impl CommandResponse {
    /// Successful response carrying `payload`.
    pub fn success(payload: Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    /// Failed response carrying the given exceptions.
    pub fn failure(exceptions: Vec<ExceptionDto>) -> Self {
        let error_messages = exceptions
            .iter()
            .filter_map(|e| e.message.clone())
            .collect();
        Self {
            error: true,
            exceptions,
            error_messages,
            ..Self::default()
        }
    }

    pub fn with_execution_time_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn exceptions(&self) -> &[ExceptionDto] {
        &self.exceptions
    }

    pub fn error_messages(&self) -> &[String] {
        &self.error_messages
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Decode the payload into a typed response.
    pub fn payload_as<T: DeserializeOwned>(&self) -> CoreResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| CoreError::decode(e.to_string()))
    }

    /// True if any reported exception is an authentication failure.
    pub fn has_authentication_failure(&self) -> bool {
        self.exceptions.iter().any(ExceptionDto::is_authentication_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_serialises_with_service_field_names() {
        let mut cmd = Command::new("command.feature.Search", json!({"layerId": "roads"}));
        cmd.stamp(Some("tok".to_string()), Some("nl".to_string()));

        let wire = serde_json::to_value(&cmd).unwrap();
        assert_eq!(wire["commandName"], "command.feature.Search");
        assert_eq!(wire["userToken"], "tok");
        assert_eq!(wire["locale"], "nl");
        assert_eq!(wire["request"]["layerId"], "roads");
    }

    #[test]
    fn empty_token_does_not_count_as_token() {
        let mut cmd = Command::new("c", Value::Null);
        assert!(!cmd.has_token());
        cmd.stamp(Some(String::new()), None);
        assert!(!cmd.has_token());
        cmd.stamp(Some("t".into()), None);
        assert!(cmd.has_token());
    }

    #[test]
    fn authentication_failure_is_found_anywhere_in_the_list() {
        let response = CommandResponse::failure(vec![
            ExceptionDto::new("java.lang.IllegalStateException", ExceptionCode(1)),
            ExceptionDto::credentials_missing_or_invalid(),
        ]);
        assert!(response.is_error());
        assert!(response.has_authentication_failure());
    }

    #[test]
    fn security_class_with_other_code_is_not_an_authentication_failure() {
        let dto = ExceptionDto::new(SECURITY_EXCEPTION_CLASS, ExceptionCode(7));
        assert!(!dto.is_authentication_failure());
    }

    #[test]
    fn response_decodes_from_sparse_json() {
        let response: CommandResponse = serde_json::from_value(json!({
            "error": true,
            "exceptions": [{"className": SECURITY_EXCEPTION_CLASS, "exceptionCode": 39}]
        }))
        .unwrap();
        assert!(response.has_authentication_failure());
        assert_eq!(response.payload(), &Value::Null);
    }

    #[test]
    fn payload_as_reports_shape_mismatch() {
        let response = CommandResponse::success(json!({"count": "many"}));

        #[derive(Debug, serde::Deserialize)]
        struct Count {
            #[allow(dead_code)]
            count: u32,
        }

        let err = response.payload_as::<Count>().unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }
}
