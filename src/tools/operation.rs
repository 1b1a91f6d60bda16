//! Data-driven operations.
//!
//! Most tools are "build a URL, attach some fields, stringify the response".
//! [`OperationSpec`] describes that as data (method, path template, query and
//! body mappings, response shape) and [`HttpOperation`] is the one generic
//! adapter that interprets it.
//!
//! Path templates use `{name}` for a single URL-encoded segment and `{name*}`
//! for a multi-segment value (file paths) where each segment is encoded but
//! the slashes are kept.

use async_trait::async_trait;
use base64::Engine;
use serde_json::{Map, Value};

use crate::api::{ApiClient, ApiRequest, HttpMethod, Lookup};
use crate::core::tool::ToolDescriptor;
use crate::mcp::types::CallToolResult;
use crate::tools::types::{OperationAdapter, ToolError};
use crate::tools::validation::ValidationError;

/// Where a wire field takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// The argument of that name, skipped when absent or `null`.
    Arg(&'static str),
    /// A fixed value sent on every call.
    Const(Value),
    /// A string argument, base64-encoded before sending.
    Base64(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub wire: &'static str,
    pub source: FieldSource,
}

impl FieldMapping {
    pub fn arg(name: &'static str) -> Self {
        Self {
            wire: name,
            source: FieldSource::Arg(name),
        }
    }

    pub fn renamed(wire: &'static str, arg: &'static str) -> Self {
        Self {
            wire,
            source: FieldSource::Arg(arg),
        }
    }

    pub fn constant(wire: &'static str, value: impl Into<Value>) -> Self {
        Self {
            wire,
            source: FieldSource::Const(value.into()),
        }
    }

    pub fn base64(wire: &'static str, arg: &'static str) -> Self {
        Self {
            wire,
            source: FieldSource::Base64(arg),
        }
    }

    fn argument(&self) -> Option<&'static str> {
        match self.source {
            FieldSource::Arg(name) | FieldSource::Base64(name) => Some(name),
            FieldSource::Const(_) => None,
        }
    }

    fn resolve(&self, args: &Map<String, Value>) -> Result<Option<Value>, ToolError> {
        match &self.source {
            FieldSource::Const(value) => Ok(Some(value.clone())),
            FieldSource::Arg(name) => Ok(present(args, name).cloned()),
            FieldSource::Base64(name) => match present(args, name) {
                None => Ok(None),
                Some(Value::String(raw)) => Ok(Some(Value::String(
                    base64::engine::general_purpose::STANDARD.encode(raw.as_bytes()),
                ))),
                Some(other) => Err(ValidationError::WrongType {
                    field: name.to_string(),
                    expected: "string".to_string(),
                    actual: if other.is_number() { "number" } else { "non-string" },
                }
                .into()),
            },
        }
    }
}

/// How the request body is assembled.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BodyTemplate {
    #[default]
    Empty,
    /// Only the listed fields.
    Fields(Vec<FieldMapping>),
    /// Every argument not consumed by the path or the query string.
    Remaining,
    /// One argument sent verbatim as the body.
    Arg(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    Rest {
        method: HttpMethod,
        path: &'static str,
    },
    GraphQl {
        document: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub kind: RequestKind,
    /// Query parameters for REST, variables for GraphQL.
    pub params: Vec<FieldMapping>,
    pub body: BodyTemplate,
}

/// How the backend response becomes the result text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseShape {
    /// The body as compact JSON; an empty body yields a generic confirmation.
    #[default]
    Json,
    /// A fixed sentence with `{arg}` placeholders filled from the arguments.
    Confirmation(&'static str),
    /// A single value picked out by JSON pointer (e.g. a download URL).
    Field(&'static str),
    /// An existence probe: a 404 (or a `null` GraphQL node) is a negative
    /// answer, not an error.
    Exists {
        found: &'static str,
        missing: &'static str,
    },
}

/// Declarative description of one tool.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    descriptor: ToolDescriptor,
    request: RequestTemplate,
    response: ResponseShape,
}

impl OperationSpec {
    pub fn rest(
        method: HttpMethod,
        name: &str,
        description: &str,
        schema: impl Into<Value>,
        path: &'static str,
    ) -> Self {
        Self {
            descriptor: ToolDescriptor::new(name, description, schema.into()),
            request: RequestTemplate {
                kind: RequestKind::Rest { method, path },
                params: Vec::new(),
                body: BodyTemplate::Empty,
            },
            response: ResponseShape::Json,
        }
    }

    pub fn get(name: &str, description: &str, schema: impl Into<Value>, path: &'static str) -> Self {
        Self::rest(HttpMethod::Get, name, description, schema, path)
    }

    pub fn post(name: &str, description: &str, schema: impl Into<Value>, path: &'static str) -> Self {
        Self::rest(HttpMethod::Post, name, description, schema, path)
    }

    pub fn patch(name: &str, description: &str, schema: impl Into<Value>, path: &'static str) -> Self {
        Self::rest(HttpMethod::Patch, name, description, schema, path)
    }

    pub fn put(name: &str, description: &str, schema: impl Into<Value>, path: &'static str) -> Self {
        Self::rest(HttpMethod::Put, name, description, schema, path)
    }

    pub fn delete(name: &str, description: &str, schema: impl Into<Value>, path: &'static str) -> Self {
        Self::rest(HttpMethod::Delete, name, description, schema, path)
    }

    pub fn graphql(
        name: &str,
        description: &str,
        schema: impl Into<Value>,
        document: &'static str,
    ) -> Self {
        Self {
            descriptor: ToolDescriptor::new(name, description, schema.into()),
            request: RequestTemplate {
                kind: RequestKind::GraphQl { document },
                params: Vec::new(),
                body: BodyTemplate::Empty,
            },
            response: ResponseShape::Json,
        }
    }

    /// Passes the named arguments through as query parameters.
    pub fn query(mut self, names: &[&'static str]) -> Self {
        self.request
            .params
            .extend(names.iter().map(|&n| FieldMapping::arg(n)));
        self
    }

    pub fn query_field(mut self, mapping: FieldMapping) -> Self {
        self.request.params.push(mapping);
        self
    }

    /// Passes the named arguments through as GraphQL variables.
    pub fn variables(self, names: &[&'static str]) -> Self {
        self.query(names)
    }

    pub fn body(mut self, names: &[&'static str]) -> Self {
        let fields = names.iter().map(|&n| FieldMapping::arg(n));
        match &mut self.request.body {
            BodyTemplate::Fields(existing) => existing.extend(fields),
            other => *other = BodyTemplate::Fields(fields.collect()),
        }
        self
    }

    pub fn body_field(mut self, mapping: FieldMapping) -> Self {
        match &mut self.request.body {
            BodyTemplate::Fields(existing) => existing.push(mapping),
            other => *other = BodyTemplate::Fields(vec![mapping]),
        }
        self
    }

    pub fn body_remaining(mut self) -> Self {
        self.request.body = BodyTemplate::Remaining;
        self
    }

    pub fn body_arg(mut self, name: &'static str) -> Self {
        self.request.body = BodyTemplate::Arg(name);
        self
    }

    pub fn respond(mut self, shape: ResponseShape) -> Self {
        self.response = shape;
        self
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn request(&self) -> &RequestTemplate {
        &self.request
    }

    pub fn into_parts(self) -> (ToolDescriptor, HttpOperation) {
        let adapter = HttpOperation {
            name: self.descriptor.name.clone(),
            request: self.request,
            response: self.response,
        };
        (self.descriptor, adapter)
    }
}

/// A request ready to hand to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedRequest {
    Rest(ApiRequest),
    GraphQl {
        document: &'static str,
        variables: Value,
    },
}

/// The generic adapter interpreting an [`OperationSpec`].
#[derive(Debug, Clone)]
pub struct HttpOperation {
    name: String,
    request: RequestTemplate,
    response: ResponseShape,
}

impl HttpOperation {
    pub fn prepare(&self, args: &Map<String, Value>) -> Result<PreparedRequest, ToolError> {
        let mut consumed: Vec<&str> = Vec::new();
        let mut params = Vec::with_capacity(self.request.params.len());
        for mapping in &self.request.params {
            consumed.extend(mapping.argument());
            if let Some(value) = mapping.resolve(args)? {
                params.push((mapping.wire.to_string(), value));
            }
        }

        match &self.request.kind {
            RequestKind::GraphQl { document } => Ok(PreparedRequest::GraphQl {
                document: *document,
                variables: Value::Object(params.into_iter().collect()),
            }),
            RequestKind::Rest { method, path } => {
                let path = render_path(path, args, &mut consumed)?;
                let mut request = ApiRequest::new(*method, path);
                request.query = params;
                request.body = self.body(args, &consumed)?;
                Ok(PreparedRequest::Rest(request))
            }
        }
    }

    fn body(&self, args: &Map<String, Value>, consumed: &[&str]) -> Result<Option<Value>, ToolError> {
        let body = match &self.request.body {
            BodyTemplate::Empty => return Ok(None),
            BodyTemplate::Arg(name) => return Ok(present(args, name).cloned()),
            BodyTemplate::Fields(fields) => {
                let mut body = Map::new();
                for field in fields {
                    if let Some(value) = field.resolve(args)? {
                        body.insert(field.wire.to_string(), value);
                    }
                }
                body
            }
            BodyTemplate::Remaining => args
                .iter()
                .filter(|(key, value)| !value.is_null() && !consumed.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };
        Ok((!body.is_empty()).then_some(Value::Object(body)))
    }

    fn shape(&self, value: Value, args: &Map<String, Value>) -> Result<CallToolResult, ToolError> {
        match &self.response {
            ResponseShape::Json if value.is_null() => Ok(CallToolResult::text(format!(
                "{} completed successfully.",
                self.name
            ))),
            ResponseShape::Json => Ok(CallToolResult::json(&value)),
            ResponseShape::Confirmation(template) => {
                Ok(CallToolResult::text(render_text(template, args)))
            }
            ResponseShape::Field(pointer) => match value.pointer(pointer) {
                Some(found) if !found.is_null() => Ok(CallToolResult::text(scalar_text(found))),
                _ => Err(ToolError::Execution(format!(
                    "response has no value at '{pointer}'"
                ))),
            },
            ResponseShape::Exists { found, missing } => {
                let template = if value.is_null() { missing } else { found };
                Ok(CallToolResult::text(render_text(template, args)))
            }
        }
    }
}

#[async_trait]
impl OperationAdapter for HttpOperation {
    async fn invoke(
        &self,
        args: &Map<String, Value>,
        client: &dyn ApiClient,
    ) -> Result<CallToolResult, ToolError> {
        let value = match self.prepare(args)? {
            PreparedRequest::GraphQl {
                document,
                variables,
            } => client.graphql(document, Some(variables)).await?,
            PreparedRequest::Rest(request) => match &self.response {
                ResponseShape::Exists { .. } => match client.probe(request).await? {
                    // Empty success bodies (204) still mean "found".
                    Lookup::Found(Value::Null) => Value::Bool(true),
                    Lookup::Found(value) => value,
                    Lookup::NotFound => Value::Null,
                },
                _ => client.send(request).await?,
            },
        };
        self.shape(value, args)
    }
}

fn present<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Splits a template into literal text and `{placeholder}` names.
fn placeholders(template: &str) -> impl Iterator<Item = Segment<'_>> {
    let mut rest = template;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find('{') {
            Some(0) => match rest.find('}') {
                Some(end) => {
                    let name = &rest[1..end];
                    rest = &rest[end + 1..];
                    Some(Segment::Placeholder(name))
                }
                None => {
                    let literal = rest;
                    rest = "";
                    Some(Segment::Literal(literal))
                }
            },
            Some(start) => {
                let literal = &rest[..start];
                rest = &rest[start..];
                Some(Segment::Literal(literal))
            }
            None => {
                let literal = rest;
                rest = "";
                Some(Segment::Literal(literal))
            }
        }
    })
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Percent-encodes one path segment. `.` and `..` are refused since the URL
/// parser would resolve them and move the request to another endpoint.
pub fn encode_segment(field: &str, raw: &str) -> Result<String, ValidationError> {
    if raw == "." || raw == ".." {
        return Err(ValidationError::DotSegment(field.to_string()));
    }
    Ok(urlencoding::encode(raw).into_owned())
}

/// Encodes a `/`-separated value segment by segment, keeping the separators.
pub fn encode_path(field: &str, raw: &str) -> Result<String, ValidationError> {
    let encoded = raw
        .trim_matches('/')
        .split('/')
        .map(|part| encode_segment(field, part))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(encoded.join("/"))
}

fn render_path<'a>(
    template: &str,
    args: &'a Map<String, Value>,
    consumed: &mut Vec<&'a str>,
) -> Result<String, ToolError> {
    let mut out = String::with_capacity(template.len());
    for segment in placeholders(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(name) => {
                let (name, multi) = match name.strip_suffix('*') {
                    Some(stripped) => (stripped, true),
                    None => (name, false),
                };
                let (key, value) = args
                    .get_key_value(name)
                    .filter(|(_, v)| !v.is_null())
                    .ok_or_else(|| ValidationError::MissingField(name.to_string()))?;
                consumed.push(key.as_str());
                let raw = scalar_text(value);
                if multi {
                    out.push_str(&encode_path(name, &raw)?);
                } else {
                    out.push_str(&encode_segment(name, &raw)?);
                }
            }
        }
    }
    Ok(out)
}

/// Fills `{name}` placeholders with argument text; unknown names are kept.
pub fn render_text(template: &str, args: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    for segment in placeholders(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(name) => match present(args, name) {
                Some(value) => out.push_str(&scalar_text(value)),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
        }
    }
    out
}
