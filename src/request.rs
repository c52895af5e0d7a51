//! Directive parsing
//!
//! Turns already-nested request parameters into directive lists. Purely
//! syntactic: nothing here knows what is allowed, and parsing never fails.

use config::QueryConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Filter,
    Sort,
    Include,
    Field,
    Append,
}

impl DirectiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            DirectiveKind::Filter => "filter",
            DirectiveKind::Sort => "sort",
            DirectiveKind::Include => "include",
            DirectiveKind::Field => "field",
            DirectiveKind::Append => "append",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One client instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub name: String,
    /// Filter value; `None` for every other kind
    pub value: Option<Value>,
    /// Sort direction; always `false` for other kinds
    pub descending: bool,
}

impl Directive {
    fn named(kind: DirectiveKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: None,
            descending: false,
        }
    }
}

/// Request parameters, already split into groups by the transport layer,
/// e.g. `{"filter": {"name": "john"}, "sort": "-id"}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    params: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(params: Value) -> Self {
        match params {
            Value::Object(params) => Self { params },
            _ => Self::default(),
        }
    }

    pub fn get(&self, group: &str) -> Option<&Value> {
        self.params.get(group)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl From<Value> for QueryRequest {
    fn from(params: Value) -> Self {
        Self::new(params)
    }
}

impl From<Map<String, Value>> for QueryRequest {
    fn from(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

/// Directives of one request, grouped by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRequest {
    pub filters: Vec<Directive>,
    pub sorts: Vec<Directive>,
    pub includes: Vec<Directive>,
    pub fields: Vec<Directive>,
    pub appends: Vec<Directive>,
}

impl ParsedRequest {
    /// `root_table` lets `fields[<root table>]=...` address the subject itself
    pub fn parse(request: &QueryRequest, config: &QueryConfig, root_table: &str) -> Self {
        let names = &config.parameters;
        let delimiters = &config.delimiters;

        Self {
            filters: parse_filters(request.get(&names.filter), delimiters.filter_array),
            sorts: parse_sorts(request.get(&names.sort), delimiters.sort),
            includes: parse_list(
                DirectiveKind::Include,
                request.get(&names.include),
                delimiters.include,
            ),
            fields: parse_fields(request.get(&names.fields), delimiters.fields, root_table),
            appends: parse_list(
                DirectiveKind::Append,
                request.get(&names.append),
                delimiters.append,
            ),
        }
    }

    pub fn filter(&self, name: &str) -> Option<&Directive> {
        self.filters.iter().find(|directive| directive.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.sorts.is_empty()
            && self.includes.is_empty()
            && self.fields.is_empty()
            && self.appends.is_empty()
    }
}

fn parse_filters(group: Option<&Value>, delimiter: char) -> Vec<Directive> {
    let Some(Value::Object(filters)) = group else {
        return Vec::new();
    };

    filters
        .iter()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| Directive {
            kind: DirectiveKind::Filter,
            name: name.clone(),
            value: Some(normalize_filter_value(value, delimiter)),
            descending: false,
        })
        .collect()
}

/// `"a,b"` becomes `["a", "b"]`; `"true"`/`"false"` become booleans
fn normalize_filter_value(value: &Value, delimiter: char) -> Value {
    match value {
        Value::String(raw) if raw.contains(delimiter) => Value::Array(
            raw.split(delimiter)
                .filter(|part| !part.is_empty())
                .map(normalize_scalar)
                .collect(),
        ),
        Value::String(raw) => normalize_scalar(raw),
        Value::Array(values) => Value::Array(
            values
                .iter()
                .map(|value| match value {
                    Value::String(raw) => normalize_scalar(raw),
                    other => other.clone(),
                })
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), normalize_filter_value(value, delimiter)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn normalize_scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Delimited tokens of a string or of every string in a list
fn tokens(group: Option<&Value>, delimiter: char) -> Vec<String> {
    let raw: Vec<&str> = match group {
        Some(Value::String(value)) => vec![value.as_str()],
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let mut tokens: Vec<String> = Vec::new();
    for token in raw.iter().flat_map(|value| value.split(delimiter)) {
        let token = token.trim();
        if !token.is_empty() && !tokens.iter().any(|existing| existing == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

fn parse_sorts(group: Option<&Value>, delimiter: char) -> Vec<Directive> {
    let mut sorts: Vec<Directive> = Vec::new();

    for token in tokens(group, delimiter) {
        let (name, descending) = match token.strip_prefix('-') {
            Some(name) => (name.to_string(), true),
            None => (token, false),
        };
        if name.is_empty() || sorts.iter().any(|sort| sort.name == name) {
            continue;
        }
        sorts.push(Directive {
            descending,
            ..Directive::named(DirectiveKind::Sort, name)
        });
    }

    sorts
}

fn parse_list(kind: DirectiveKind, group: Option<&Value>, delimiter: char) -> Vec<Directive> {
    tokens(group, delimiter)
        .into_iter()
        .map(|name| Directive::named(kind, name))
        .collect()
}

fn parse_fields(group: Option<&Value>, delimiter: char, root_table: &str) -> Vec<Directive> {
    let Some(Value::Object(by_owner)) = group else {
        return parse_list(DirectiveKind::Field, group, delimiter);
    };

    let mut fields: Vec<Directive> = Vec::new();
    for (owner, columns) in by_owner {
        for column in tokens(Some(columns), delimiter) {
            let name = if owner.is_empty() || owner == root_table {
                column
            } else {
                format!("{}.{}", owner, column)
            };
            if !fields.iter().any(|field| field.name == name) {
                fields.push(Directive::named(DirectiveKind::Field, name));
            }
        }
    }
    fields
}
