//! XML-RPC codec and caller.
//!
//! Requests are always written indented: some WordPress configurations
//! reject large uploads when more than 100,000 bytes appear before the
//! first line break.

use chrono::NaiveDateTime;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;
use xmltree::{Element, XMLNode};

use crate::error::{Error, Result};
use crate::request::{follow_redirects, RequestFilter};
use crate::xmlutil;

const TEXT_XML_UTF8: &str = "text/xml; charset=utf-8";

#[derive(Clone, Debug)]
pub enum Value {
    String { value: String, suppress_log: bool },
    Int(i32),
    Boolean(bool),
    Base64(Vec<u8>),
    DateTime { value: NaiveDateTime, dashed: bool },
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Value {
        Value::String {
            value: value.into(),
            suppress_log: false,
        }
    }

    /// A string that is replaced by a placeholder in logged requests,
    /// used for passwords.
    pub fn secret(value: impl Into<String>) -> Value {
        Value::String {
            value: value.into(),
            suppress_log: true,
        }
    }

    /// The `<value>` element for this value. With `logging` set, secrets
    /// and binary payloads are replaced by placeholders.
    fn to_element(&self, logging: bool) -> Element {
        let mut value = Element::new("value");
        match self {
            Value::String {
                value: text,
                suppress_log,
            } => {
                let shown = if logging && *suppress_log {
                    "[removed]"
                } else {
                    text
                };
                text_element(&mut value, "string", shown);
            }
            Value::Int(n) => text_element(&mut value, "int", &n.to_string()),
            Value::Boolean(b) => text_element(&mut value, "boolean", if *b { "1" } else { "0" }),
            Value::Base64(bytes) => {
                let shown = if logging {
                    format!("[{} bytes]", bytes.len())
                } else {
                    base64::encode(bytes)
                };
                text_element(&mut value, "base64", &shown);
            }
            Value::DateTime {
                value: datetime,
                dashed,
            } => {
                let format = if *dashed {
                    "%Y-%m-%dT%H:%M:%S"
                } else {
                    "%Y%m%dT%H:%M:%S"
                };
                text_element(
                    &mut value,
                    "dateTime.iso8601",
                    &datetime.format(format).to_string(),
                );
            }
            Value::Array(items) => {
                let array = xmlutil::add_child(&mut value, "", None, "array");
                let data = xmlutil::add_child(array, "", None, "data");
                for item in items {
                    data.children.push(XMLNode::Element(item.to_element(logging)));
                }
            }
            Value::Struct(members) => {
                let st = xmlutil::add_child(&mut value, "", None, "struct");
                for (name, member_value) in members {
                    let member = xmlutil::add_child(st, "", None, "member");
                    text_element(member, "name", name);
                    member
                        .children
                        .push(XMLNode::Element(member_value.to_element(logging)));
                }
            }
        }
        value
    }
}

fn text_element(parent: &mut Element, name: &str, text: &str) {
    let child = xmlutil::add_child(parent, "", None, name);
    xmlutil::set_text(child, text);
}

fn request_document(method: &str, parameters: &[Value], logging: bool) -> Element {
    let mut call = Element::new("methodCall");
    text_element(&mut call, "methodName", method);
    let params = xmlutil::add_child(&mut call, "", None, "params");
    for parameter in parameters {
        let param = xmlutil::add_child(params, "", None, "param");
        param
            .children
            .push(XMLNode::Element(parameter.to_element(logging)));
    }
    call
}

pub fn request_body(method: &str, parameters: &[Value]) -> Result<String> {
    xmlutil::to_xml_string(&request_document(method, parameters, false))
}

pub enum MethodResponse {
    /// The `<value>` element under `/methodResponse/params/param`.
    Success(Element),
    Fault { code: String, message: String },
}

impl MethodResponse {
    pub fn parse(response_text: &str) -> std::result::Result<MethodResponse, String> {
        let document = Element::parse(response_text.trim_start().as_bytes())
            .map_err(|e| format!("malformed XML-RPC response: {}", e))?;
        if document.name != "methodResponse" {
            return Err(format!("unexpected root element <{}>", document.name));
        }
        if let Some(value) = xmlutil::child(&document, "", "params")
            .and_then(|params| xmlutil::child(params, "", "param"))
            .and_then(|param| xmlutil::child(param, "", "value"))
        {
            return Ok(MethodResponse::Success(value.clone()));
        }
        let fault_value = xmlutil::child(&document, "", "fault")
            .and_then(|fault| xmlutil::child(fault, "", "value"))
            .ok_or_else(|| "neither params nor fault found".to_string())?;
        let code = struct_member(fault_value, "faultCode")
            .map(value_text)
            .ok_or_else(|| "fault struct has no faultCode".to_string())?;
        let message = struct_member(fault_value, "faultString")
            .map(value_text)
            .unwrap_or_default();
        Ok(MethodResponse::Fault { code, message })
    }
}

/// Calls XML-RPC methods against a fixed endpoint.
pub struct XmlRpcEndpoint {
    url: String,
    http: Client,
    filter: RequestFilter,
}

impl XmlRpcEndpoint {
    pub fn new(url: impl Into<String>, http: Client, filter: RequestFilter) -> XmlRpcEndpoint {
        XmlRpcEndpoint {
            url: url.into(),
            http,
            filter,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, method: &str, parameters: &[Value]) -> Result<MethodResponse> {
        let body = request_body(method, parameters)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let logged = xmlutil::to_xml_string(&request_document(method, parameters, true))?;
            debug!("XML-RPC request to {}:\n{}", self.url, logged);
        }
        let filter = &self.filter;
        let response = follow_redirects(&self.url, |current| {
            Ok(filter(
                self.http
                    .post(current)
                    .header(CONTENT_TYPE, TEXT_XML_UTF8)
                    .body(body.clone()),
            ))
        })
        .await?;
        let status = response.status();
        let response_text = response.text().await?;
        debug!("XML-RPC response from {}:\n{}", self.url, response_text);
        if !status.is_success() {
            return Err(crate::rest::status_error(method, status, &response_text));
        }
        MethodResponse::parse(&response_text)
            .map_err(|message| Error::invalid_response(method, message, response_text))
    }
}

/// The `<value>` of the named member of a struct-typed `<value>`.
pub fn struct_member<'a>(value: &'a Element, name: &str) -> Option<&'a Element> {
    let st = xmlutil::child(value, "", "struct")?;
    xmlutil::children(st, "", "member")
        .into_iter()
        .find(|member| {
            xmlutil::child(member, "", "name")
                .map(|n| xmlutil::text_content(n).trim() == name)
                .unwrap_or(false)
        })
        .and_then(|member| xmlutil::child(member, "", "value"))
}

/// The `<value>` children of an array-typed `<value>`.
pub fn array_values<'a>(value: &'a Element) -> Vec<&'a Element> {
    xmlutil::child(value, "", "array")
        .and_then(|array| xmlutil::child(array, "", "data"))
        .map(|data| xmlutil::children(data, "", "value"))
        .unwrap_or_default()
}

/// Text of a scalar `<value>`. Base64 payloads are decoded as UTF-8, which
/// LiveJournal uses for non-ASCII subjects and bodies. A `<value>` with no
/// type element is a string, per the XML-RPC spec.
pub fn value_text(value: &Element) -> String {
    if let Some(b64) = xmlutil::child(value, "", "base64") {
        let encoded: String = xmlutil::text_content(b64)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if let Ok(bytes) = base64::decode(&encoded) {
            return String::from_utf8_lossy(&bytes).into_owned();
        }
        return encoded;
    }
    for typed in &["string", "int", "i4", "boolean", "double", "dateTime.iso8601"] {
        if let Some(child) = xmlutil::child(value, "", typed) {
            return xmlutil::text_content(child);
        }
    }
    xmlutil::text_content(value)
}

/// Parses both common dateTime.iso8601 spellings (`19980717T14:08:55` and
/// `1998-07-17T14:08:55`, with or without a trailing `Z`).
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_indented() {
        let body = request_body(
            "blogger.getUsersBlogs",
            &[Value::string("0123456789ABCDEF"), Value::string("user")],
        )
        .unwrap();
        assert!(body.contains("<methodName>blogger.getUsersBlogs</methodName>"));
        // the first newline must come early for picky WordPress setups
        assert!(body.lines().count() > 3);
    }

    #[test]
    fn secrets_are_removed_from_logged_requests() {
        let doc = request_document("login", &[Value::secret("hunter2")], true);
        let logged = xmlutil::to_xml_string(&doc).unwrap();
        assert!(!logged.contains("hunter2"));
        assert!(logged.contains("[removed]"));
        let wire = request_body("login", &[Value::secret("hunter2")]).unwrap();
        assert!(wire.contains("hunter2"));
    }

    #[test]
    fn parses_a_scalar_response() {
        let response = MethodResponse::parse(
            r#"<?xml version="1.0"?>
<methodResponse><params><param><value><string>ok</string></value></param></params></methodResponse>"#,
        )
        .unwrap();
        match response {
            MethodResponse::Success(value) => assert_eq!(value_text(&value), "ok"),
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn parses_a_fault_response() {
        let response = MethodResponse::parse(
            r#"<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>101</int></value></member>
<member><name>faultString</name><value><string>Invalid password</string></value></member>
</struct></value></fault></methodResponse>"#,
        )
        .unwrap();
        match response {
            MethodResponse::Fault { code, message } => {
                assert_eq!(code, "101");
                assert_eq!(message, "Invalid password");
            }
            _ => panic!("expected fault"),
        }
    }

    #[test]
    fn base64_text_values_are_decoded() {
        let value = Element::parse(
            format!("<value><base64>{}</base64></value>", base64::encode("héllo")).as_bytes(),
        )
        .unwrap();
        assert_eq!(value_text(&value), "héllo");
    }

    #[test]
    fn untyped_values_are_strings() {
        let value = Element::parse("<value>plain</value>".as_bytes()).unwrap();
        assert_eq!(value_text(&value), "plain");
    }

    #[test]
    fn both_datetime_spellings_parse() {
        assert_eq!(
            parse_datetime("20060102T15:04:05"),
            parse_datetime("2006-01-02T15:04:05Z")
        );
        assert!(parse_datetime("20060102T15:04:05").is_some());
        assert!(parse_datetime("not a date").is_none());
    }
}
