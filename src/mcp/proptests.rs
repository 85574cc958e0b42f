//! Property-Based Tests for the Tool Provider Client
//!
//! Invariants checked over random inputs:
//!
//! - **Framing**: every outbound message is exactly one newline-terminated line
//! - **Correlation**: request ids are unique and survive a parse of the answer
//! - **Leniency**: arbitrary non-JSON lines never parse as responses
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib mcp::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::mcp::protocol::{error_message, McpMethod, RpcRequest, RpcResponse, ToolCallParams};

// Helper: Generate arbitrary JSON values, including strings with newlines
fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
        "[a-z]{0,8}\n[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    /// A request always serializes to a single line, whatever its arguments hold
    #[test]
    fn prop_request_is_single_line(
        name in "[a-z_]{1,20}",
        arguments in arb_json_value()
    ) {
        let params = ToolCallParams { name, arguments };
        let request = RpcRequest::new(
            McpMethod::ToolsCall.as_str(),
            Some(serde_json::to_value(&params).unwrap()),
        );
        let line = request.to_line().unwrap();

        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(line.matches('\n').count(), 1);
    }

    /// Method, id and params survive the wire unchanged
    #[test]
    fn prop_request_preserves_fields(
        name in "[a-z_]{1,20}",
        arguments in arb_json_value()
    ) {
        let params = ToolCallParams { name: name.clone(), arguments: arguments.clone() };
        let request = RpcRequest::new(
            McpMethod::ToolsCall.as_str(),
            Some(serde_json::to_value(&params).unwrap()),
        );
        let decoded: RpcRequest = serde_json::from_str(request.to_line().unwrap().trim_end()).unwrap();

        prop_assert_eq!(&decoded.method, "tools/call");
        prop_assert_eq!(&decoded.id, &request.id);
        let decoded_params: ToolCallParams =
            serde_json::from_value(decoded.params.unwrap()).unwrap();
        prop_assert_eq!(decoded_params.name, name);
        prop_assert_eq!(decoded_params.arguments, arguments);
    }

    /// Ids never repeat across a batch of requests
    #[test]
    fn prop_request_ids_unique(count in 1usize..200) {
        let ids: HashSet<String> = (0..count)
            .filter_map(|_| RpcRequest::new("tools/call", None).id)
            .collect();
        prop_assert_eq!(ids.len(), count);
    }

    /// An answer echoing the request id correlates back to it
    #[test]
    fn prop_response_correlates(result in arb_json_value()) {
        let request = RpcRequest::new("tools/call", None);
        let id = request.id.clone().unwrap();
        let line = json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string();

        let response = RpcResponse::parse(&line).unwrap();
        prop_assert_eq!(response.correlation_id(), request.id);
        prop_assert!(!response.is_notification());
    }

    /// Log-looking lines never parse as responses
    #[test]
    fn prop_plain_text_is_rejected(text in "[A-Za-z][A-Za-z :.]{0,60}") {
        prop_assert!(RpcResponse::parse(&text).is_err());
    }

    /// Payloads without a message render as their compact JSON
    #[test]
    fn prop_error_message_fallback(payload in arb_json_value()) {
        let message = error_message(&payload);
        if payload.get("message").is_none() && !payload.is_string() {
            prop_assert_eq!(message, payload.to_string());
        }
    }
}
