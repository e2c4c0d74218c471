//! Request bodies for the Cloud API `/messages` endpoint.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
};

use courier_channels::{Error, OutboundMessage, Result};

const DEFAULT_LANGUAGE: &str = "es";

/// Approved template reference carried in message metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Provider-shaped components, passed through untouched.
    #[serde(default)]
    pub components: Vec<Value>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}

/// Body parameters from a legacy flat string list.
#[must_use]
pub fn body_component(params: &[String]) -> Value {
    let parameters: Vec<Value> = params
        .iter()
        .map(|p| json!({"type": "text", "text": p}))
        .collect();
    json!({"type": "body", "parameters": parameters})
}

/// Template to send for `message`, if its metadata names one.
///
/// Explicit `template.components` win; otherwise a top-level
/// `template_params` list is turned into a single body component.
pub fn template_from_metadata(message: &OutboundMessage) -> Result<Option<TemplateSpec>> {
    let Some(raw) = message.metadata.get("template") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let mut spec: TemplateSpec = serde_json::from_value(raw.clone())
        .map_err(|e| Error::invalid_input(format!("template metadata: {e}")))?;
    if spec.name.trim().is_empty() {
        return Err(Error::invalid_input("template metadata: empty name"));
    }

    if spec.components.is_empty()
        && let Some(params) = message.metadata.get("template_params").and_then(Value::as_array)
    {
        let params: Vec<String> = params
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        if !params.is_empty() {
            spec.components.push(body_component(&params));
        }
    }
    Ok(Some(spec))
}

/// Full request body for `message` addressed to `to`.
pub fn build_payload(message: &OutboundMessage, to: &str) -> Result<Value> {
    if let Some(template) = template_from_metadata(message)? {
        let mut body = json!({
            "name": template.name,
            "language": {"code": template.language},
        });
        if !template.components.is_empty() {
            body["components"] = Value::Array(template.components);
        }
        return Ok(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "template",
            "template": body,
        }));
    }

    if message.content.trim().is_empty() {
        return Err(Error::invalid_input("empty message content"));
    }
    Ok(json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": {"preview_url": false, "body": message.content},
    }))
}
