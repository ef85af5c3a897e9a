//! Update and condition expressions.
//!
//! Attribute names and values never appear literally in generated
//! expressions: names become `#nX` placeholders and values become `:vX`
//! placeholders collected in [`ExpressionAttributes`].
//!
//! Templates (the keys of [`UpdateExpression::SetExpr`] groups and every
//! condition expression) use `$` for an attribute name and `?` for a value,
//! both taken positionally from the argument list:
//!
//! ```
//! use dynamo_repository::{UpdateExpression, UpdateExpressions};
//! use serde_json::json;
//!
//! // SET Meta.foo = "bar"
//! let updates = UpdateExpressions::new()
//!     .with(UpdateExpression::SetExpr, "Meta.$ = ?", json!(["foo", "bar"]));
//! assert!(!updates.is_empty());
//! ```

use aws_sdk_dynamodb::types::AttributeValue;
use serde_dynamo::to_attribute_value;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::Error;

/// Kind of attribute mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateExpression {
    /// `SET attr = value`; a null or empty string removes the attribute
    Set,
    /// `SET attr = if_not_exists(attr, value)`
    SetIfNotExists,
    /// `SET attr = value` where value becomes a string or number set;
    /// an empty sequence removes the attribute
    SetSet,
    /// `ADD attr value`, incrementing a number or extending a set
    Add,
    /// Templated `SET` clause; the value is the positional argument list
    SetExpr,
}

/// Update expressions grouped by kind, keyed by attribute name or template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpressions(BTreeMap<UpdateExpression, BTreeMap<String, Value>>);

impl UpdateExpressions {
    /// No updates
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `expression` to every entry of `values`
    pub fn from_values<I, K, V>(expression: UpdateExpression, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        values
            .into_iter()
            .fold(Self::new(), |updates, (attribute, value)| {
                updates.with(expression, attribute, value)
            })
    }

    /// Add one attribute update
    pub fn with(
        mut self,
        expression: UpdateExpression,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let _ = self
            .0
            .entry(expression)
            .or_default()
            .insert(attribute.into(), value.into());
        self
    }

    /// `SET attribute = value`, or `REMOVE attribute` for null and `""`
    pub fn set(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(UpdateExpression::Set, attribute, value)
    }

    /// `SET attribute = if_not_exists(attribute, value)`
    pub fn set_if_not_exists(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(UpdateExpression::SetIfNotExists, attribute, value)
    }

    /// Set an attribute to a string or number set
    pub fn set_set(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(UpdateExpression::SetSet, attribute, value)
    }

    /// `ADD attribute value`
    pub fn add(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(UpdateExpression::Add, attribute, value)
    }

    /// Templated `SET` clause with its positional arguments
    pub fn set_expr(self, template: impl Into<String>, args: impl Into<Value>) -> Self {
        self.with(UpdateExpression::SetExpr, template, args)
    }

    /// Whether no update was added
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Updates of one kind
    pub fn get(&self, expression: UpdateExpression) -> Option<&BTreeMap<String, Value>> {
        self.0.get(&expression)
    }
}

/// Placeholder maps sent along with an expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionAttributes {
    /// `#placeholder` to attribute name
    pub names: HashMap<String, String>,
    /// `:placeholder` to value
    pub values: HashMap<String, AttributeValue>,
}

impl ExpressionAttributes {
    /// Merge another set of placeholders into this one
    pub fn merge(&mut self, other: ExpressionAttributes) {
        self.names.extend(other.names);
        self.values.extend(other.values);
    }

    /// Names map, or `None` when empty
    pub fn names_or_none(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// Values map, or `None` when empty
    pub fn values_or_none(&self) -> Option<HashMap<String, AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

/// Builds expressions sharing one placeholder namespace
#[derive(Debug, Default)]
pub(crate) struct ExpressionBuilder {
    attributes: ExpressionAttributes,
    name_placeholders: HashMap<String, String>,
    next_value: usize,
}

impl ExpressionBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn name(&mut self, name: &str) -> String {
        if let Some(placeholder) = self.name_placeholders.get(name) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.name_placeholders.len());
        let _ = self
            .name_placeholders
            .insert(name.to_string(), placeholder.clone());
        let _ = self
            .attributes
            .names
            .insert(placeholder.clone(), name.to_string());
        placeholder
    }

    /// Placeholder path for a dotted attribute path; list indexes such as
    /// `Items[2]` are kept verbatim after the name
    fn path(&mut self, path: &str) -> String {
        path.split('.')
            .map(|segment| match segment.find('[') {
                Some(index) => format!("{}{}", self.name(&segment[..index]), &segment[index..]),
                None => self.name(segment),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.next_value);
        self.next_value += 1;
        let _ = self.attributes.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn json_value(&mut self, value: &Value) -> Result<String, Error> {
        let value: AttributeValue = to_attribute_value(value)?;
        Ok(self.value(value))
    }

    /// Substitute `$` and `?` in `template` with placeholders for `args`
    pub(crate) fn template(&mut self, template: &str, args: &[Value]) -> Result<String, Error> {
        let mut args = args.iter();
        let mut expression = String::with_capacity(template.len());

        for c in template.chars() {
            match c {
                '$' => {
                    let name = args.next().ok_or_else(|| {
                        Error::InvalidExpression(format!("{template}: missing name argument"))
                    })?;
                    let name = name.as_str().ok_or_else(|| {
                        Error::InvalidExpression(format!("{template}: name argument must be a string"))
                    })?;
                    expression.push_str(&self.name(name));
                }
                '?' => {
                    let value = args.next().ok_or_else(|| {
                        Error::InvalidExpression(format!("{template}: missing value argument"))
                    })?;
                    expression.push_str(&self.json_value(value)?);
                }
                c => expression.push(c),
            }
        }

        if args.next().is_some() {
            return Err(Error::InvalidExpression(format!(
                "{template}: too many arguments"
            )));
        }

        Ok(expression)
    }

    /// Render an update expression in `SET ... ADD ... REMOVE ...` order
    pub(crate) fn update(&mut self, updates: &UpdateExpressions) -> Result<String, Error> {
        let mut set = Vec::new();
        let mut add = Vec::new();
        let mut remove = Vec::new();

        for (expression, values) in &updates.0 {
            for (attribute, value) in values {
                match expression {
                    UpdateExpression::Set => {
                        let path = self.path(attribute);
                        if clears(value) {
                            remove.push(path);
                            continue;
                        }
                        let value = self.json_value(value)?;
                        set.push(format!("{path} = {value}"));
                    }
                    UpdateExpression::SetIfNotExists => {
                        let path = self.path(attribute);
                        let value = self.json_value(value)?;
                        set.push(format!("{path} = if_not_exists({path}, {value})"));
                    }
                    UpdateExpression::SetSet => {
                        let path = self.path(attribute);
                        match set_value(attribute, value)? {
                            Some(value) => {
                                let value = self.value(value);
                                set.push(format!("{path} = {value}"));
                            }
                            None => remove.push(path),
                        }
                    }
                    UpdateExpression::Add => {
                        let path = self.path(attribute);
                        let value = match value {
                            Value::Array(_) => match set_value(attribute, value)? {
                                Some(value) => self.value(value),
                                None => continue,
                            },
                            _ => self.json_value(value)?,
                        };
                        add.push(format!("{path} {value}"));
                    }
                    UpdateExpression::SetExpr => {
                        let args = value.as_array().ok_or(Error::InvalidSliceType)?;
                        set.push(self.template(attribute, args)?);
                    }
                }
            }
        }

        let clauses: Vec<String> = [("SET", set), ("ADD", add), ("REMOVE", remove)]
            .into_iter()
            .filter(|(_, parts)| !parts.is_empty())
            .map(|(keyword, parts)| format!("{} {}", keyword, parts.join(", ")))
            .collect();

        if clauses.is_empty() {
            return Err(Error::InvalidExpression("no update expressions".into()));
        }

        Ok(clauses.join(" "))
    }

    pub(crate) fn into_attributes(self) -> ExpressionAttributes {
        self.attributes
    }
}

/// Whether a `Set` value clears the attribute instead of storing it
fn clears(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert a sequence into a string or number set; `None` for an empty one
fn set_value(attribute: &str, value: &Value) -> Result<Option<AttributeValue>, Error> {
    let invalid = || Error::InvalidSetValue(attribute.to_string());
    let items = value.as_array().ok_or_else(invalid)?;

    if items.is_empty() {
        return Ok(None);
    }

    if let Some(strings) = items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return Ok(Some(AttributeValue::Ss(strings)));
    }

    if let Some(numbers) = items
        .iter()
        .map(|item| match item {
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
    {
        return Ok(Some(AttributeValue::Ns(numbers)));
    }

    Err(invalid())
}

/// Render a standalone condition template
pub(crate) fn condition(template: &str, args: &[Value]) -> Result<(String, ExpressionAttributes), Error> {
    let mut builder = ExpressionBuilder::new();
    let expression = builder.template(template, args)?;
    Ok((expression, builder.into_attributes()))
}
