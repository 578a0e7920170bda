// CdpPage - PageDriver over one CDP page session
//
// Element handles are Runtime remote object ids. Every DOM operation is a
// small function invoked on the object with Runtime.callFunctionOn. Remote
// objects live in one object group until the engine releases it.

use async_trait::async_trait;
use serde_json::{json, Value};

use promptrelay_core::port::{DomEvent, DriverError, ElementHandle, PageDriver};

use crate::connection::CdpConnection;
use crate::error::CdpError;

/// Object group every remote object of this driver is allocated in
const OBJECT_GROUP: &str = "promptrelay";

const QUERY_SELECTOR_FN: &str = "function(sel) { return this.querySelector(sel); }";
const QUERY_SELECTOR_ALL_FN: &str =
    "function(sel) { return Array.from(this.querySelectorAll(sel)); }";
const SHADOW_ROOT_FN: &str = "function() { return this.shadowRoot; }";
const READ_VALUE_FN: &str = "function() { return this.value == null ? '' : String(this.value); }";
const TEXT_CONTENT_FN: &str = "function() { return (this.textContent || '').trim(); }";
const FOCUS_FN: &str = "function() { this.focus(); }";
const CLICK_FN: &str = "function() { this.click(); }";

const IS_DISABLED_FN: &str = r#"function() {
    return this.disabled === true
        || this.hasAttribute('disabled')
        || this.getAttribute('aria-disabled') === 'true';
}"#;

/// Frameworks that track `value` through the prototype setter miss plain
/// assignments, so the setter is looked up and called directly.
const SET_VALUE_FN: &str = r#"function(v) {
    const proto = this instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
        : this instanceof HTMLInputElement ? HTMLInputElement.prototype
        : Object.getPrototypeOf(this);
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && desc.set) { desc.set.call(this, v); } else { this.value = v; }
}"#;

const DISPATCH_FN: &str = r#"function(type, keyboard) {
    const init = { bubbles: true, composed: true, cancelable: true };
    const event = keyboard
        ? new KeyboardEvent(type, Object.assign(init, { key: 'Enter', code: 'Enter', keyCode: 13, which: 13 }))
        : new Event(type, init);
    this.dispatchEvent(event);
}"#;

/// One browser tab driven over its own CDP socket
pub struct CdpPage {
    connection: CdpConnection,
}

impl CdpPage {
    pub fn new(connection: CdpConnection) -> Self {
        Self { connection }
    }

    /// Connect to a page target's WebSocket URL
    pub async fn attach(ws_url: &str) -> Result<Self, CdpError> {
        Ok(Self::new(CdpConnection::connect(ws_url).await?))
    }

    pub fn ws_url(&self) -> &str {
        self.connection.url()
    }

    async fn evaluate_value(&self, expression: &str) -> Result<Value, CdpError> {
        let response = self
            .connection
            .call("Runtime.evaluate", evaluate_params(expression, true))
            .await?;
        remote_value(&response)
    }

    async fn call_on(
        &self,
        element: &ElementHandle,
        function: &str,
        args: Value,
        return_by_value: bool,
    ) -> Result<Value, CdpError> {
        self.connection
            .call(
                "Runtime.callFunctionOn",
                call_function_params(element, function, args, return_by_value),
            )
            .await
    }

    async fn call_value(
        &self,
        element: &ElementHandle,
        function: &str,
        args: Value,
    ) -> Result<Value, CdpError> {
        let response = self.call_on(element, function, args, true).await?;
        remote_value(&response)
    }

    async fn call_object(
        &self,
        element: &ElementHandle,
        function: &str,
        args: Value,
    ) -> Result<Option<ElementHandle>, CdpError> {
        let response = self.call_on(element, function, args, false).await?;
        remote_object(&response)
    }
}

fn evaluate_params(expression: &str, return_by_value: bool) -> Value {
    json!({
        "expression": expression,
        "returnByValue": return_by_value,
        "objectGroup": OBJECT_GROUP,
    })
}

fn call_function_params(
    element: &ElementHandle,
    function: &str,
    args: Value,
    return_by_value: bool,
) -> Value {
    json!({
        "objectId": element.id(),
        "functionDeclaration": function,
        "arguments": args,
        "returnByValue": return_by_value,
        "objectGroup": OBJECT_GROUP,
    })
}

/// Surface `exceptionDetails` as an error
fn check_exception(response: &Value) -> Result<(), CdpError> {
    match response.get("exceptionDetails") {
        Some(details) => {
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown exception");
            Err(CdpError::Exception(text.to_string()))
        }
        None => Ok(()),
    }
}

/// `result.value` of a by-value evaluation
fn remote_value(response: &Value) -> Result<Value, CdpError> {
    check_exception(response)?;
    Ok(response["result"]
        .get("value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// `result.objectId`, or None for null/undefined
fn remote_object(response: &Value) -> Result<Option<ElementHandle>, CdpError> {
    check_exception(response)?;
    let result = &response["result"];
    if result["subtype"] == "null" || result["type"] == "undefined" {
        return Ok(None);
    }
    match result["objectId"].as_str() {
        Some(id) => Ok(Some(ElementHandle::new(id))),
        None => Err(CdpError::UnexpectedResponse(result.to_string())),
    }
}

/// Object ids of the indexed entries of a `Runtime.getProperties` response
fn array_elements(response: &Value) -> Vec<ElementHandle> {
    let mut indexed: Vec<(usize, ElementHandle)> = response["result"]
        .as_array()
        .map(|props| {
            props
                .iter()
                .filter_map(|p| {
                    let index = p["name"].as_str()?.parse::<usize>().ok()?;
                    let id = p["value"]["objectId"].as_str()?;
                    Some((index, ElementHandle::new(id)))
                })
                .collect()
        })
        .unwrap_or_default();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, handle)| handle).collect()
}

fn as_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn document(&self) -> Result<ElementHandle, DriverError> {
        let response = self
            .connection
            .call("Runtime.evaluate", evaluate_params("document", false))
            .await?;
        remote_object(&response)?
            .ok_or_else(|| DriverError::Evaluation("document is not available".to_string()))
    }

    async fn query_selector(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self
            .call_object(scope, QUERY_SELECTOR_FN, json!([{ "value": selector }]))
            .await?)
    }

    async fn query_selector_all(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let Some(array) = self
            .call_object(scope, QUERY_SELECTOR_ALL_FN, json!([{ "value": selector }]))
            .await?
        else {
            return Ok(Vec::new());
        };
        let properties = self
            .connection
            .call(
                "Runtime.getProperties",
                json!({ "objectId": array.id(), "ownProperties": true }),
            )
            .await?;
        Ok(array_elements(&properties))
    }

    async fn shadow_root(
        &self,
        host: &ElementHandle,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.call_object(host, SHADOW_ROOT_FN, json!([])).await?)
    }

    async fn read_value(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let value = self.call_value(element, READ_VALUE_FN, json!([])).await?;
        Ok(as_string(value))
    }

    async fn is_disabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let value = self.call_value(element, IS_DISABLED_FN, json!([])).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let value = self.call_value(element, TEXT_CONTENT_FN, json!([])).await?;
        Ok(as_string(value))
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.call_value(element, FOCUS_FN, json!([])).await?;
        Ok(())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), DriverError> {
        self.call_value(element, SET_VALUE_FN, json!([{ "value": value }]))
            .await?;
        Ok(())
    }

    async fn dispatch(&self, element: &ElementHandle, event: DomEvent) -> Result<(), DriverError> {
        self.call_value(
            element,
            DISPATCH_FN,
            json!([{ "value": event.event_type() }, { "value": event.is_keyboard() }]),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.call_value(element, CLICK_FN, json!([])).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(as_string(self.evaluate_value("location.href").await?))
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let response = self
            .connection
            .call("Page.navigate", json!({ "url": url }))
            .await?;
        match response["errorText"].as_str() {
            Some(text) if !text.is_empty() => Err(DriverError::Protocol(format!(
                "Navigation to {} failed: {}",
                url, text
            ))),
            _ => Ok(()),
        }
    }

    async fn ready_state(&self) -> Result<String, DriverError> {
        Ok(as_string(self.evaluate_value("document.readyState").await?))
    }

    async fn snapshot_html(&self) -> Result<String, DriverError> {
        Ok(as_string(
            self.evaluate_value("document.documentElement.outerHTML")
                .await?,
        ))
    }

    async fn release_handles(&self) -> Result<(), DriverError> {
        self.connection
            .call(
                "Runtime.releaseObjectGroup",
                json!({ "objectGroup": OBJECT_GROUP }),
            )
            .await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.connection.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_result_is_none() {
        let response = json!({ "result": { "type": "object", "subtype": "null", "value": null } });
        assert!(remote_object(&response).unwrap().is_none());

        let response = json!({ "result": { "type": "object", "objectId": "obj-7" } });
        assert_eq!(
            remote_object(&response).unwrap(),
            Some(ElementHandle::new("obj-7"))
        );
    }

    #[test]
    fn test_exception_details_become_errors() {
        let response = json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": { "text": "Uncaught", "exception": { "description": "TypeError: x is null" } }
        });
        let err = remote_value(&response).unwrap_err();
        assert!(matches!(err, CdpError::Exception(ref t) if t == "TypeError: x is null"));
    }

    #[test]
    fn test_array_elements_keep_index_order() {
        let response = json!({ "result": [
            { "name": "length", "value": { "type": "number", "value": 2 } },
            { "name": "1", "value": { "objectId": "b" } },
            { "name": "0", "value": { "objectId": "a" } },
            { "name": "__proto__", "value": { "objectId": "proto" } }
        ]});
        assert_eq!(
            array_elements(&response),
            vec![ElementHandle::new("a"), ElementHandle::new("b")]
        );
    }

    #[test]
    fn test_remote_objects_share_one_group() {
        let element = ElementHandle::new("obj-1");
        let call = call_function_params(&element, CLICK_FN, json!([]), false);
        assert_eq!(call["objectGroup"], OBJECT_GROUP);
        assert_eq!(call["objectId"], "obj-1");

        let eval = evaluate_params("document", false);
        assert_eq!(eval["objectGroup"], OBJECT_GROUP);
        assert_eq!(eval["returnByValue"], false);
    }
}
