//! Smart-contract call boundary.
//!
//! # Responsibility
//! - Describe one contract method call as method name + JSON parameter array,
//!   optionally signed with a private key.
//! - Keep the JSON-RPC transport and ABI encoding behind `ContractClient`.
//!
//! # Invariants
//! - Parameters are always encoded as a JSON array.
//! - Private keys never appear in `Debug` output or logs.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub type ContractResult<T> = Result<T, ContractError>;

/// Status code used when the transport reports a failure without one.
pub const GENERIC_ERROR_CODE: i32 = -1;

/// Contract call failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// Node unreachable, RPC error reply, reverted call.
    Transport { code: i32, message: String },
    /// Reply did not decode into the expected shape.
    Decode { method: String, message: String },
}

impl ContractError {
    pub fn transport(code: i32, message: impl Into<String>) -> Self {
        Self::Transport {
            code,
            message: message.into(),
        }
    }

    /// Status code surfaced in task status.
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport { code, .. } if *code != 0 => *code,
            _ => GENERIC_ERROR_CODE,
        }
    }
}

impl Display for ContractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { code, message } => {
                write!(f, "contract call failed ({code}): {message}")
            }
            Self::Decode { method, message } => {
                write!(f, "unexpected reply from `{method}`: {message}")
            }
        }
    }
}

impl Error for ContractError {}

/// Node and contract a call is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    pub eth_url: String,
    pub contract_address: String,
}

/// One contract method invocation.
#[derive(Clone, PartialEq)]
pub struct ContractCall {
    pub method: String,
    pub params: Vec<Value>,
    pub private_key: Option<String>,
}

impl ContractCall {
    /// Read-only call; no signature.
    pub fn read(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            private_key: None,
        }
    }

    /// State-changing call signed with `private_key`.
    pub fn signed(
        method: impl Into<String>,
        params: Vec<Value>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            params,
            private_key: Some(private_key.into()),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.private_key.is_some()
    }

    /// JSON-array encoding handed to the transport.
    pub fn params_json(&self) -> String {
        Value::Array(self.params.clone()).to_string()
    }
}

impl Debug for ContractCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractCall")
            .field("method", &self.method)
            .field("params", &self.params_json())
            .field("signed", &self.is_signed())
            .finish()
    }
}

/// Transport for contract calls; returns the JSON-encoded result string.
pub trait ContractClient: Send + Sync {
    fn call(&self, endpoint: &Endpoint, call: &ContractCall) -> ContractResult<String>;
}

/// Client + endpoint pair shared by services and moved into task closures.
#[derive(Clone)]
pub struct ContractContext {
    client: Arc<dyn ContractClient>,
    endpoint: Endpoint,
}

impl ContractContext {
    pub fn new(client: Arc<dyn ContractClient>, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Performs `call` and returns the raw JSON result.
    pub fn call_raw(&self, call: &ContractCall) -> ContractResult<String> {
        match self.client.call(&self.endpoint, call) {
            Ok(reply) => {
                debug!(
                    "event=contract_call module=contract status=ok method={} signed={}",
                    call.method,
                    call.is_signed()
                );
                Ok(reply)
            }
            Err(err) => {
                warn!(
                    "event=contract_call module=contract status=error method={} code={}",
                    call.method,
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Performs `call` and decodes the JSON result into `T`.
    pub fn call_json<T: DeserializeOwned>(&self, call: &ContractCall) -> ContractResult<T> {
        let reply = self.call_raw(call)?;
        decode_reply(&call.method, &reply)
    }
}

/// Decodes a JSON result string returned for `method`.
pub fn decode_reply<T: DeserializeOwned>(method: &str, reply: &str) -> ContractResult<T> {
    serde_json::from_str(reply).map_err(|err| ContractError::Decode {
        method: method.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_reply, ContractCall, ContractError, GENERIC_ERROR_CODE};
    use serde_json::json;

    #[test]
    fn params_encode_as_json_array() {
        let call = ContractCall::read("getProposal", vec![json!(7), json!("x")]);
        assert_eq!(call.params_json(), r#"[7,"x"]"#);
        assert!(!call.is_signed());
    }

    #[test]
    fn debug_output_hides_private_key() {
        let call = ContractCall::signed("vote", vec![json!(1), json!(true)], "deadbeef");
        let rendered = format!("{call:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("signed: true"));
    }

    #[test]
    fn decode_failure_names_the_method() {
        let err = decode_reply::<u64>("slotsNumber", "\"many\"").expect_err("not a number");
        assert!(matches!(err, ContractError::Decode { ref method, .. } if method == "slotsNumber"));
        assert_eq!(err.code(), GENERIC_ERROR_CODE);
    }

    #[test]
    fn zero_transport_code_maps_to_generic_error() {
        assert_eq!(ContractError::transport(0, "x").code(), GENERIC_ERROR_CODE);
        assert_eq!(ContractError::transport(-32000, "x").code(), -32000);
    }
}
