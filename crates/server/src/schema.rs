//! JSON Schemas for the store protocol.

use pagewalk_core::protocol::{ErrorFrame, Request, Response};
use schemars::schema_for;
use serde_json::{Value, json};

/// Request, response and error frame schemas in one document.
pub fn protocol_schema() -> Value {
    json!({
        "request": schema_for!(Request),
        "response": schema_for!(Response),
        "error": schema_for!(ErrorFrame),
    })
}
