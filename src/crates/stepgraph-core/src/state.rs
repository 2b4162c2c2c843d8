//! State values, schemas and reducers
//!
//! Graph state is a JSON object ([`State`]). Nodes never mutate it: they
//! receive a snapshot and return a partial update (a [`Patch`]). The
//! [`StateSchema`] decides, field by field, how that patch is folded into the
//! current state by consulting a registered [`Reducer`].
//!
//! # Built-in Reducers
//!
//! | Reducer | Behavior | Accepted kinds |
//! |---------|----------|----------------|
//! | [`OverwriteReducer`] | Last write wins (the default) | any |
//! | [`AppendReducer`] | Concatenate arrays | `Array` |
//! | [`MergeReducer`] | Shallow merge objects | `Object` |
//! | [`SumReducer`] | Add numbers | `Number` |
//! | [`MessagesReducer`](crate::messages::MessagesReducer) | [`add_messages`](crate::messages::add_messages) | `Messages`, `Array` |
//! | [`FnReducer`] | Caller supplied closure | any |
//!
//! # Example
//!
//! ```rust
//! use stepgraph_core::state::{AppendReducer, FieldKind, State, StateSchema, SumReducer};
//! use serde_json::json;
//!
//! let schema = StateSchema::new()
//!     .with_field("events", FieldKind::Array, AppendReducer)
//!     .with_field("count", FieldKind::Number, SumReducer);
//!
//! let current = State::from_value(json!({"events": ["start"], "count": 1})).unwrap();
//! let patch = State::from_value(json!({"events": ["tick"], "count": 2, "status": "ok"})).unwrap();
//!
//! let next = schema.merge(&current, &patch).unwrap();
//! assert_eq!(next.get("events"), Some(&json!(["start", "tick"])));
//! assert_eq!(next.get("count"), Some(&json!(3)));
//! // Undeclared fields fall back to overwrite unless the schema is strict
//! assert_eq!(next.get("status"), Some(&json!("ok")));
//! // The input state is untouched
//! assert_eq!(current.get("count"), Some(&json!(1)));
//! ```

use crate::messages::{Message, MessagesReducer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Field under which message-based graphs keep their conversation
pub const MESSAGES_FIELD: &str = "messages";

/// Errors raised by reducers and schema checks
#[derive(Debug, Error)]
pub enum StateError {
    /// State structure is invalid (e.g., not an object when expected)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A strict schema received a field it does not declare
    #[error("field '{0}' is not declared in the state schema")]
    UnknownField(String),

    /// A value does not match the declared kind of its field
    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Declared kind
        expected: FieldKind,
        /// Kind of the offending value
        found: &'static str,
    },

    /// Reducer encountered incompatible values
    #[error("reducer error: {0}")]
    ReducerError(String),

    /// A reducer failed on a specific field
    #[error("reducer '{reducer}' failed on field '{field}': {source}")]
    FieldMerge {
        /// Field name
        field: String,
        /// Name of the reducer that failed
        reducer: String,
        /// Reducer failure
        #[source]
        source: Box<StateError>,
    },

    /// A message could not be decoded
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A tool message answers a tool call that was never issued
    #[error("tool message references unknown tool call '{0}'")]
    OrphanToolMessage(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Declared type of a state field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// No constraint
    Any,
    String,
    Number,
    Bool,
    Array,
    Object,
    /// List of [`Message`] values
    Messages,
}

impl FieldKind {
    /// Whether `value` is admissible for a field of this kind.
    ///
    /// `null` is admitted everywhere (an unset field).
    pub fn admits(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldKind::Any, _) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Array | FieldKind::Messages, Value::Array(_)) => true,
            (FieldKind::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Like [`admits`](FieldKind::admits), for values arriving as input or
    /// patch: a `Messages` field also takes a single message object.
    fn admits_update(self, value: &Value) -> bool {
        matches!((self, value), (FieldKind::Messages, Value::Object(_))) || self.admits(value)
    }

    /// Short description of a JSON value's type
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn check(self, field: &str, value: &Value) -> Result<()> {
        if self.admits(value) {
            Ok(())
        } else {
            Err(StateError::TypeMismatch {
                field: field.to_string(),
                expected: self,
                found: Self::describe(value),
            })
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            FieldKind::Any => "any",
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Messages => "messages",
        };
        f.write_str(kind)
    }
}

/// Trait for merging a field update into its current value
///
/// Reducers must be pure: same inputs, same output, no side effects.
pub trait Reducer: Send + Sync {
    /// Apply an update to the current value
    ///
    /// `current` is `Value::Null` when the field is not yet set.
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    /// Get a human-readable name for this reducer
    fn name(&self) -> &str;

    /// Whether the reducer can operate on fields of `kind`
    fn accepts(&self, kind: FieldKind) -> bool {
        let _ = kind;
        true
    }
}

/// Overwrite reducer - replaces the current value with the update
///
/// This is the behavior for fields without a registered reducer.
#[derive(Debug, Clone, Default)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Append reducer - appends update to current array
///
/// - **Array + Array**: Concatenates both arrays
/// - **Array + Scalar**: Appends scalar as single element
/// - **Null + anything**: Starts a new array
#[derive(Debug, Clone, Default)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr_arr), Value::Array(upd_arr)) => {
                let mut result = curr_arr.clone();
                result.extend_from_slice(upd_arr);
                Ok(Value::Array(result))
            }
            (Value::Null, Value::Array(upd_arr)) => Ok(Value::Array(upd_arr.clone())),
            (Value::Array(curr_arr), single_value) => {
                let mut result = curr_arr.clone();
                result.push(single_value.clone());
                Ok(Value::Array(result))
            }
            (Value::Null, single_value) => Ok(Value::Array(vec![single_value.clone()])),
            (other, _) => Err(StateError::ReducerError(format!(
                "append requires an array, current value is {}",
                FieldKind::describe(other)
            ))),
        }
    }

    fn name(&self) -> &str {
        "append"
    }

    fn accepts(&self, kind: FieldKind) -> bool {
        matches!(kind, FieldKind::Array | FieldKind::Any)
    }
}

/// Merge reducer - shallow merges objects, update keys win
#[derive(Debug, Clone, Default)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Object(curr_obj), Value::Object(upd_obj)) => {
                let mut result = curr_obj.clone();
                for (key, value) in upd_obj {
                    result.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(result))
            }
            (Value::Null, Value::Object(upd_obj)) => Ok(Value::Object(upd_obj.clone())),
            _ => Err(StateError::ReducerError(
                "merge requires object values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "merge"
    }

    fn accepts(&self, kind: FieldKind) -> bool {
        matches!(kind, FieldKind::Object | FieldKind::Any)
    }
}

/// Sum reducer - adds numeric values
///
/// Integers stay integers unless the sum overflows or either side is a float.
#[derive(Debug, Clone, Default)]
pub struct SumReducer;

impl Reducer for SumReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Number(a), Value::Number(b)) => {
                if let Some(sum) = a.as_i64().zip(b.as_i64()).and_then(|(a, b)| a.checked_add(b)) {
                    return Ok(Value::Number(sum.into()));
                }
                let (a, b) = a.as_f64().zip(b.as_f64()).ok_or_else(|| {
                    StateError::ReducerError("cannot add non-numeric values".to_string())
                })?;
                serde_json::Number::from_f64(a + b)
                    .map(Value::Number)
                    .ok_or_else(|| StateError::ReducerError("sum is not a finite number".to_string()))
            }
            (Value::Null, Value::Number(_)) => Ok(update.clone()),
            _ => Err(StateError::ReducerError(
                "sum requires numeric values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "sum"
    }

    fn accepts(&self, kind: FieldKind) -> bool {
        matches!(kind, FieldKind::Number | FieldKind::Any)
    }
}

type ReduceFn = dyn Fn(&Value, &Value) -> Result<Value> + Send + Sync;

/// Reducer backed by a closure
///
/// ```rust
/// use stepgraph_core::state::{FnReducer, Reducer};
/// use serde_json::json;
///
/// let max = FnReducer::new("max", |current, update| {
///     let a = current.as_f64().unwrap_or(f64::MIN);
///     let b = update.as_f64().unwrap_or(f64::MIN);
///     Ok(json!(a.max(b)))
/// });
/// assert_eq!(max.reduce(&json!(3.0), &json!(1.0)).unwrap(), json!(3.0));
/// ```
#[derive(Clone)]
pub struct FnReducer {
    name: String,
    func: Arc<ReduceFn>,
}

impl FnReducer {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReducer").field("name", &self.name).finish()
    }
}

impl Reducer for FnReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        (self.func)(current, update)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Graph state: a JSON object keyed by field name
///
/// Also used for patches (partial updates returned by nodes), see [`Patch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(Map<String, Value>);

/// Partial state update returned by a node
pub type Patch = State;

impl State {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StateError::InvalidState(format!(
                "state must be an object, got {}",
                FieldKind::describe(&other)
            ))),
        }
    }

    /// Build a patch that adds `messages` to the conversation
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        let value =
            serde_json::to_value(messages).map_err(|e| StateError::InvalidMessage(e.to_string()))?;
        Ok(Self::new().with(MESSAGES_FIELD, value))
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field value, returning the previous one
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style [`State::insert`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(field, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Decode the conversation stored under `messages` (empty if unset)
    pub fn messages(&self) -> Result<Vec<Message>> {
        match self.get(MESSAGES_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| StateError::InvalidMessage(e.to_string())),
        }
    }

    /// Last message of the conversation, if any
    pub fn last_message(&self) -> Result<Option<Message>> {
        Ok(self.messages()?.pop())
    }

    /// Consume the state into a JSON object value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the underlying JSON map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for State {
    type Error = StateError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<State> for Value {
    fn from(state: State) -> Self {
        state.into_value()
    }
}

#[derive(Clone)]
struct FieldSpec {
    kind: FieldKind,
    reducer: Arc<dyn Reducer>,
}

/// State schema: declared fields, their kinds and reducers
///
/// Fields without a registered reducer are overwritten by patches. A
/// [strict](StateSchema::strict) schema rejects undeclared fields instead.
#[derive(Clone, Default)]
pub struct StateSchema {
    fields: BTreeMap<String, FieldSpec>,
    strict: bool,
}

impl StateSchema {
    /// Create a new empty, non-strict schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for message-based graphs: `messages` merged with
    /// [`add_messages`](crate::messages::add_messages)
    pub fn messages() -> Self {
        Self::new().with_field(MESSAGES_FIELD, FieldKind::Messages, MessagesReducer)
    }

    /// Reject fields that are not declared
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Declare a field with its kind and reducer
    pub fn with_field(
        mut self,
        field: impl Into<String>,
        kind: FieldKind,
        reducer: impl Reducer + 'static,
    ) -> Self {
        self.add_field(field, kind, reducer);
        self
    }

    /// Declare a field with its kind and reducer
    pub fn add_field(
        &mut self,
        field: impl Into<String>,
        kind: FieldKind,
        reducer: impl Reducer + 'static,
    ) {
        self.fields.insert(
            field.into(),
            FieldSpec {
                kind,
                reducer: Arc::new(reducer),
            },
        );
    }

    /// Register a reducer for a field, keeping its declared kind (or `Any`)
    pub fn register(&mut self, field: impl Into<String>, reducer: impl Reducer + 'static) {
        let field = field.into();
        let kind = self
            .fields
            .get(&field)
            .map(|spec| spec.kind)
            .unwrap_or(FieldKind::Any);
        self.add_field(field, kind, reducer);
    }

    /// Declared kind of a field
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).map(|spec| spec.kind)
    }

    /// Name of the reducer applied to a field
    pub fn reducer_name(&self, field: &str) -> &str {
        self.fields
            .get(field)
            .map(|spec| spec.reducer.name())
            .unwrap_or("overwrite")
    }

    /// Declared field names, sorted
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Check that every reducer accepts its field's kind
    pub fn validate(&self) -> Result<()> {
        for (field, spec) in &self.fields {
            if !spec.reducer.accepts(spec.kind) {
                return Err(StateError::InvalidState(format!(
                    "reducer '{}' cannot operate on {} field '{}'",
                    spec.reducer.name(),
                    spec.kind,
                    field
                )));
            }
        }
        Ok(())
    }

    /// Check an input state against the declared fields and kinds
    pub fn validate_state(&self, state: &State) -> Result<()> {
        for (field, value) in state.iter() {
            match self.fields.get(field) {
                Some(spec) if !spec.kind.admits_update(value) => {
                    return Err(StateError::TypeMismatch {
                        field: field.clone(),
                        expected: spec.kind,
                        found: FieldKind::describe(value),
                    })
                }
                Some(_) => {}
                None if self.strict => return Err(StateError::UnknownField(field.clone())),
                None => {}
            }
        }
        Ok(())
    }

    /// Fold `patch` into `current`, returning the next state.
    ///
    /// Pure: `current` is not modified. Fields absent from the patch are
    /// carried over unchanged; each patched field goes through its reducer.
    pub fn merge(&self, current: &State, patch: &State) -> Result<State> {
        let mut next = current.clone();
        let fallback = OverwriteReducer;

        for (field, update) in patch.iter() {
            let spec = self.fields.get(field);
            if spec.is_none() && self.strict {
                return Err(StateError::UnknownField(field.clone()));
            }

            let reducer: &dyn Reducer = spec.map(|s| s.reducer.as_ref()).unwrap_or(&fallback);
            let existing = current.get(field).unwrap_or(&Value::Null);
            let merged = reducer
                .reduce(existing, update)
                .map_err(|source| StateError::FieldMerge {
                    field: field.clone(),
                    reducer: reducer.name().to_string(),
                    source: Box::new(source),
                })?;

            if let Some(spec) = spec {
                spec.kind.check(field, &merged)?;
            }
            next.insert(field.clone(), merged);
        }

        Ok(next)
    }
}

impl fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: BTreeMap<&str, (FieldKind, &str)> = self
            .fields
            .iter()
            .map(|(name, spec)| (name.as_str(), (spec.kind, spec.reducer.name())))
            .collect();
        f.debug_struct("StateSchema")
            .field("fields", &fields)
            .field("strict", &self.strict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn state(value: Value) -> State {
        State::from_value(value).unwrap()
    }

    #[test]
    fn test_single_message_object_is_valid_input_and_patch() {
        let schema = StateSchema::messages();
        let single = state(json!({"messages": Message::human("hi").with_id("h")}));

        schema.validate_state(&single).unwrap();
        let merged = schema.merge(&State::new(), &single).unwrap();
        assert_eq!(merged.messages().unwrap().len(), 1);

        let scalar = state(json!({"messages": "hi"}));
        assert!(matches!(
            schema.validate_state(&scalar),
            Err(StateError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_overwrite_reducer() {
        let result = OverwriteReducer
            .reduce(&json!({"old": "value"}), &json!({"new": "value"}))
            .unwrap();
        assert_eq!(result, json!({"new": "value"}));
    }

    #[test]
    fn test_append_reducer_arrays() {
        let result = AppendReducer.reduce(&json!([1, 2, 3]), &json!([4, 5])).unwrap();
        assert_eq!(result, json!([1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_append_reducer_null_current() {
        let result = AppendReducer.reduce(&Value::Null, &json!(1)).unwrap();
        assert_eq!(result, json!([1]));
    }

    #[test]
    fn test_append_reducer_rejects_scalar_current() {
        let err = AppendReducer.reduce(&json!(42), &json!([1])).unwrap_err();
        assert!(matches!(err, StateError::ReducerError(_)));
    }

    #[test]
    fn test_merge_reducer() {
        let result = MergeReducer
            .reduce(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}))
            .unwrap();
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_sum_reducer_integers_and_floats() {
        assert_eq!(SumReducer.reduce(&json!(5), &json!(3)).unwrap(), json!(8));
        assert_eq!(SumReducer.reduce(&json!(2.5), &json!(3.5)).unwrap(), json!(6.0));
        assert_eq!(SumReducer.reduce(&Value::Null, &json!(7)).unwrap(), json!(7));
    }

    #[test]
    fn test_sum_reducer_overflow_falls_back_to_float() {
        let result = SumReducer.reduce(&json!(i64::MAX), &json!(1)).unwrap();
        assert!(result.is_f64());
    }

    #[test]
    fn test_merge_is_pure() {
        let schema = StateSchema::new().with_field("log", FieldKind::Array, AppendReducer);
        let current = state(json!({"log": ["a"], "keep": true}));
        let patch = state(json!({"log": ["b"]}));

        let next = schema.merge(&current, &patch).unwrap();
        assert_eq!(next.get("log"), Some(&json!(["a", "b"])));
        assert_eq!(next.get("keep"), Some(&json!(true)));
        assert_eq!(current.get("log"), Some(&json!(["a"])));
    }

    #[test]
    fn test_strict_schema_rejects_undeclared_field() {
        let schema = StateSchema::new()
            .with_field("count", FieldKind::Number, SumReducer)
            .strict();
        let err = schema
            .merge(&State::new(), &state(json!({"other": 1})))
            .unwrap_err();
        assert!(matches!(err, StateError::UnknownField(ref f) if f == "other"));
    }

    #[test]
    fn test_kind_mismatch_after_merge() {
        let schema = StateSchema::new().with_field("name", FieldKind::String, OverwriteReducer);
        let err = schema
            .merge(&State::new(), &state(json!({"name": 3})))
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::TypeMismatch { expected: FieldKind::String, found: "number", .. }
        ));
    }

    #[test]
    fn test_reducer_failure_names_field() {
        let schema = StateSchema::new().with_field("count", FieldKind::Any, SumReducer);
        let err = schema
            .merge(&state(json!({"count": 1})), &state(json!({"count": "x"})))
            .unwrap_err();
        match err {
            StateError::FieldMerge { field, reducer, .. } => {
                assert_eq!(field, "count");
                assert_eq!(reducer, "sum");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_incompatible_reducer() {
        let schema = StateSchema::new().with_field("total", FieldKind::String, SumReducer);
        assert!(schema.validate().is_err());

        let schema = StateSchema::messages();
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_register_keeps_kind() {
        let mut schema = StateSchema::new().with_field("items", FieldKind::Array, OverwriteReducer);
        schema.register("items", AppendReducer);
        assert_eq!(schema.kind_of("items"), Some(FieldKind::Array));
        assert_eq!(schema.reducer_name("items"), "append");
        assert_eq!(schema.reducer_name("missing"), "overwrite");
    }

    #[test]
    fn test_state_from_value_requires_object() {
        assert!(State::from_value(json!([1, 2])).is_err());
        assert_eq!(state(json!({"a": 1})).len(), 1);
    }

    #[test]
    fn test_state_messages_roundtrip() {
        let patch = State::from_messages(vec![Message::human("hi")]).unwrap();
        let messages = patch.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(State::new().messages().unwrap().len(), 0);
    }

    proptest! {
        #[test]
        fn prop_append_preserves_order(a in prop::collection::vec(any::<i64>(), 0..8),
                                       b in prop::collection::vec(any::<i64>(), 0..8)) {
            let merged = AppendReducer.reduce(&json!(a), &json!(b)).unwrap();
            let mut expected = a.clone();
            expected.extend(b.iter().copied());
            prop_assert_eq!(merged, json!(expected));
        }

        #[test]
        fn prop_untouched_fields_survive_merge(keep in any::<i64>(), delta in any::<i32>()) {
            let schema = StateSchema::new().with_field("n", FieldKind::Number, SumReducer);
            let current = state(json!({"n": 0, "keep": keep}));
            let next = schema.merge(&current, &state(json!({"n": delta}))).unwrap();
            prop_assert_eq!(next.get("keep"), Some(&json!(keep)));
            prop_assert_eq!(next.get("n"), Some(&json!(delta as i64)));
        }
    }
}
