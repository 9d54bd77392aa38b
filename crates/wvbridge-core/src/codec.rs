// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON wire codec for bridge envelopes.
//
// Outbound envelopes are serialized compactly with absent fields omitted.
// Inbound text is accepted as long as it is a JSON object: unknown keys are
// ignored and fields of the wrong type are treated as absent, so a partially
// broken message still routes as far as its well-formed fields allow.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::DecodeError;
use crate::types::Envelope;

/// Serialize an envelope to its compact JSON text form.
pub fn encode(envelope: &Envelope) -> String {
    // Serializing a struct of strings and `Value`s cannot fail: every map key
    // is a string and `Value` is always representable.
    serde_json::to_string(envelope).unwrap_or_else(|_| String::from("{}"))
}

/// Parse inbound text into an envelope.
///
/// Returns `DecodeError::Malformed` for text that is not JSON or is JSON but
/// not an object. An object with none of the envelope fields decodes to an
/// empty envelope, which the router treats as a no-op.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    // serde would happily map a JSON array onto the struct positionally, so
    // reject anything but an object up front.
    if !value.is_object() {
        return Err(DecodeError::Malformed(format!(
            "expected a JSON object, got {}",
            json_type_name(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Build the script that hands `envelope` to the remote bridge, e.g.
/// `WebViewJavascriptBridge._handleMessageFromJava({"handlerName":"greet"})`.
///
/// The JSON text is a valid JavaScript expression, so it is embedded as-is.
pub fn outbound_script(entry_point: &str, envelope: &Envelope) -> String {
    format!("{entry_point}({})", encode(envelope))
}

/// Inverse of [`outbound_script`]: recover the envelope from a delivery
/// script, or `None` if `script` is not a call to `entry_point`.
pub fn parse_outbound_script(entry_point: &str, script: &str) -> Option<Envelope> {
    let args = script
        .trim()
        .strip_prefix(entry_point)?
        .strip_prefix('(')?
        .strip_suffix(')')?;
    decode(args).ok()
}

/// Correlation ids may arrive as strings or numbers; anything else counts as
/// absent.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => {
            debug!(kind = json_type_name(&other), "ignoring non-scalar correlation id");
            None
        }
    })
}

/// Handler names must be strings; anything else counts as absent.
pub(crate) fn lenient_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            debug!(kind = json_type_name(&other), "ignoring non-string handler name");
            None
        }
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvelopeKind;
    use serde_json::json;

    #[test]
    fn encode_omits_absent_fields() {
        let env = Envelope::request("greet", json!("hi"), Some("native_cb_1".into()));
        assert_eq!(
            encode(&env),
            r#"{"data":"hi","callbackId":"native_cb_1","handlerName":"greet"}"#
        );

        let resp = Envelope::response("native_cb_1", json!({"ok": true}));
        assert_eq!(
            encode(&resp),
            r#"{"responseId":"native_cb_1","responseData":{"ok":true}}"#
        );
    }

    #[test]
    fn encode_never_writes_null() {
        let env = Envelope::request("ping", Value::Null, None);
        assert_eq!(encode(&env), r#"{"handlerName":"ping"}"#);
    }

    #[test]
    fn round_trip_request_and_response() {
        let req = Envelope::request(
            "save",
            json!({"title": "draft", "tags": ["a", "b"], "n": 3}),
            Some("native_cb_42".into()),
        );
        assert_eq!(decode(&encode(&req)).expect("decode request"), req);

        let resp = Envelope::response("js_cb_7", json!([1, 2, 3]));
        assert_eq!(decode(&encode(&resp)).expect("decode response"), resp);
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let env = decode(r#"{"handlerName":"greet","data":1,"extra":{"x":1}}"#)
            .expect("decode");
        assert_eq!(env.handler_name.as_deref(), Some("greet"));
        assert_eq!(env.data, json!(1));
    }

    #[test]
    fn decode_empty_object_is_invalid_shape() {
        let env = decode("{}").expect("decode");
        assert_eq!(env, Envelope::default());
        assert_eq!(env.kind(), EnvelopeKind::Invalid);
    }

    #[test]
    fn decode_rejects_malformed_text() {
        assert!(matches!(decode("not valid json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(r#"{"handlerName":"#), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_non_objects() {
        assert!(matches!(decode(r#"["greet","hi"]"#), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(r#""greet""#), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("null"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let env = decode(r#"{"responseId":17,"responseData":"ok"}"#).expect("decode");
        assert_eq!(env.response_id.as_deref(), Some("17"));

        let env = decode(r#"{"handlerName":"h","callbackId":3}"#).expect("decode");
        assert_eq!(env.callback_id.as_deref(), Some("3"));
    }

    #[test]
    fn wrongly_typed_fields_are_dropped() {
        let env = decode(r#"{"handlerName":{"nested":true},"callbackId":[1],"data":"x"}"#)
            .expect("decode");
        assert!(env.handler_name.is_none());
        assert!(env.callback_id.is_none());
        assert_eq!(env.data, json!("x"));
    }

    #[test]
    fn explicit_null_equals_absent() {
        let env = decode(r#"{"handlerName":"h","data":null,"callbackId":null}"#)
            .expect("decode");
        assert_eq!(env, Envelope::request("h", Value::Null, None));
    }

    #[test]
    fn parse_outbound_script_recovers_envelope() {
        let entry = "WebViewJavascriptBridge._handleMessageFromJava";
        let env = Envelope::request("greet", json!({"who": "world"}), Some("native_cb_9".into()));
        let script = outbound_script(entry, &env);
        assert_eq!(parse_outbound_script(entry, &script), Some(env));

        assert_eq!(parse_outbound_script(entry, "console.log('hi')"), None);
        assert_eq!(parse_outbound_script(entry, &format!("{entry}(oops)")), None);
    }

    #[test]
    fn outbound_script_wraps_json() {
        let env = Envelope::response("native_cb_1", json!("hello"));
        assert_eq!(
            outbound_script("WebViewJavascriptBridge._handleMessageFromJava", &env),
            r#"WebViewJavascriptBridge._handleMessageFromJava({"responseId":"native_cb_1","responseData":"hello"})"#
        );
    }
}
