#![allow(dead_code)]

use automaton_core::{
    AlertSink, ContractCall, ContractClient, ContractError, ContractResult, Endpoint,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(10);

pub const ALICE_ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
pub const ALICE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const BOB_ADDRESS: &str = "0x8617E340B3D01FA5F11F306F4090FD50E238070D";
pub const BOB_KEY: &str = "0x6c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f3623aa";

/// Contract client answering from a fixed `method + params` table.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<HashMap<String, ContractResult<String>>>,
    calls: Mutex<Vec<ContractCall>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, method: &str, params: Vec<Value>, result: Value) {
        self.replies
            .lock()
            .insert(key(method, &params), Ok(result.to_string()));
    }

    pub fn fail(&self, method: &str, params: Vec<Value>, code: i32, message: &str) {
        self.replies.lock().insert(
            key(method, &params),
            Err(ContractError::transport(code, message)),
        );
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.method.clone()).collect()
    }
}

impl ContractClient for ScriptedClient {
    fn call(&self, _endpoint: &Endpoint, call: &ContractCall) -> ContractResult<String> {
        self.calls.lock().push(call.clone());
        self.replies
            .lock()
            .get(&key(&call.method, &call.params))
            .cloned()
            .unwrap_or_else(|| {
                Err(ContractError::transport(
                    -32601,
                    format!("no scripted reply for {}{}", call.method, call.params_json()),
                ))
            })
    }
}

fn key(method: &str, params: &[Value]) -> String {
    format!("{method}{}", Value::Array(params.to_vec()))
}

/// Alert sink that records every alert.
#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingAlerts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .push((title.to_string(), message.to_string()));
    }
}
