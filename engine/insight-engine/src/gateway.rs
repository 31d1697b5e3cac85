//! Command gateway - the single asynchronous boundary to the backend
//!
//! Every backend interaction in this crate goes through [`CommandGateway`]:
//! a command name plus a JSON argument bag in, a JSON value or a descriptive
//! failure out. There are no retries and no timeouts at this layer; a call
//! resolves or rejects exactly once, and it is the only place execution
//! suspends.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur at the gateway boundary
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Transport failure or backend-side exception during invocation
    #[error("Failed to invoke command '{command}': {cause}")]
    Invoke { command: String, cause: String },

    /// The backend answered but the payload did not match the expected shape
    #[error("Failed to decode response for command '{command}': {cause}")]
    Decode { command: String, cause: String },
}

impl GatewayError {
    /// Wrap an underlying cause into an invocation error for `command`
    pub fn invoke(command: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Invoke { command: command.into(), cause: cause.into() }
    }
}

/// Abstract trait for backend command transports
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Invoke a named backend command with a JSON argument bag
    ///
    /// Implementations must map any underlying failure into
    /// [`GatewayError::Invoke`] carrying the command name.
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, GatewayError>;
}

/// Invoke a command and deserialize the response into `T`
pub async fn invoke_typed<T: DeserializeOwned>(
    gateway: &dyn CommandGateway,
    command: &str,
    args: Value,
) -> Result<T, GatewayError> {
    let value = gateway.invoke(command, args).await?;
    serde_json::from_value(value)
        .map_err(|err| GatewayError::Decode { command: command.to_string(), cause: err.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_error_message_format() {
        let err = GatewayError::invoke("execute_insight", "connection refused");
        assert_eq!(
            err.to_string(),
            "Failed to invoke command 'execute_insight': connection refused"
        );
    }
}
