//! Statically declared actions that plugins and the UI can invoke.
//!
//! Every action lists its parameters up front, so a form can be rendered and arguments checked
//! without ever looking at the code that runs the action.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
	Bool,
	Int,
	Float,
	String,
	/// Id of a property
	Property,
	/// Id of a tag
	Tag,
	Path,
}

impl ParamKind {
	fn accepts(self, value: &Json) -> bool {
		match self {
			Self::Bool => value.is_boolean(),
			Self::Int | Self::Property | Self::Tag => value.is_i64(),
			Self::Float => value.is_number(),
			Self::String | Self::Path => value.is_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
	pub name: String,
	pub kind: ParamKind,
	/// `None` makes the parameter required
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default: Option<Json>,
}

impl ParamDescriptor {
	pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
		Self {
			name: name.into(),
			kind,
			default: None,
		}
	}

	pub fn optional(name: impl Into<String>, kind: ParamKind, default: impl Into<Json>) -> Self {
		Self {
			name: name.into(),
			kind,
			default: Some(default.into()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
	pub id: String,
	pub description: String,
	#[serde(default)]
	pub params: Vec<ParamDescriptor>,
}

#[derive(Debug, Error)]
pub enum ActionError {
	#[error("action <id='{0}'> is already registered")]
	AlreadyRegistered(String),
	#[error("action <id='{0}'> not found")]
	NotFound(String),
	#[error("action <id='{action}'> declares an invalid default for <param='{param}'>")]
	InvalidDefault { action: String, param: String },
	#[error("arguments for action <id='{0}'> must be a json object")]
	NotAnObject(String),
	#[error("action <id='{action}'> has no parameter <param='{param}'>")]
	UnknownParam { action: String, param: String },
	#[error("action <id='{action}'> is missing required <param='{param}'>")]
	MissingParam { action: String, param: String },
	#[error("action <id='{action}'> expected {expected:?} for <param='{param}'>")]
	WrongKind {
		action: String,
		param: String,
		expected: ParamKind,
	},
}

/// Arguments checked against an [`ActionDescriptor`], defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgs {
	pub action_id: String,
	pub args: Map<String, Json>,
}

impl BoundArgs {
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Json> {
		self.args.get(name)
	}

	fn require<'a, T>(
		&'a self,
		name: &str,
		extract: impl FnOnce(&'a Json) -> Option<T>,
	) -> Result<T, ActionError> {
		self.get(name)
			.and_then(extract)
			.ok_or_else(|| ActionError::MissingParam {
				action: self.action_id.clone(),
				param: name.to_string(),
			})
	}

	pub fn str(&self, name: &str) -> Result<&str, ActionError> {
		self.require(name, Json::as_str)
	}

	pub fn int(&self, name: &str) -> Result<i64, ActionError> {
		self.require(name, Json::as_i64)
	}

	pub fn bool(&self, name: &str) -> Result<bool, ActionError> {
		self.require(name, Json::as_bool)
	}
}

#[derive(Debug, Default)]
pub struct ActionRegistry {
	actions: BTreeMap<String, ActionDescriptor>,
}

impl ActionRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, descriptor: ActionDescriptor) -> Result<(), ActionError> {
		if self.actions.contains_key(&descriptor.id) {
			return Err(ActionError::AlreadyRegistered(descriptor.id));
		}

		if let Some(param) = descriptor.params.iter().find(|param| {
			param
				.default
				.as_ref()
				.is_some_and(|default| !param.kind.accepts(default))
		}) {
			return Err(ActionError::InvalidDefault {
				action: descriptor.id.clone(),
				param: param.name.clone(),
			});
		}

		debug!(action_id = %descriptor.id, "Registered action;");
		self.actions.insert(descriptor.id.clone(), descriptor);

		Ok(())
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<&ActionDescriptor> {
		self.actions.get(id)
	}

	pub fn list(&self) -> impl Iterator<Item = &ActionDescriptor> {
		self.actions.values()
	}

	/// Checks `args` against the declared parameters of action `id`
	pub fn bind(&self, id: &str, args: Json) -> Result<BoundArgs, ActionError> {
		let descriptor = self
			.get(id)
			.ok_or_else(|| ActionError::NotFound(id.to_string()))?;

		let mut given = match args {
			Json::Object(map) => map,
			Json::Null => Map::new(),
			_ => return Err(ActionError::NotAnObject(id.to_string())),
		};

		if let Some(unknown) = given
			.keys()
			.find(|name| !descriptor.params.iter().any(|param| &param.name == *name))
		{
			return Err(ActionError::UnknownParam {
				action: id.to_string(),
				param: unknown.clone(),
			});
		}

		let mut bound = Map::new();

		for param in &descriptor.params {
			let value = match (given.remove(&param.name), &param.default) {
				(Some(value), _) => value,
				(None, Some(default)) => default.clone(),
				(None, None) => {
					return Err(ActionError::MissingParam {
						action: id.to_string(),
						param: param.name.clone(),
					})
				}
			};

			if !param.kind.accepts(&value) {
				return Err(ActionError::WrongKind {
					action: id.to_string(),
					param: param.name.clone(),
					expected: param.kind,
				});
			}

			bound.insert(param.name.clone(), value);
		}

		Ok(BoundArgs {
			action_id: id.to_string(),
			args: bound,
		})
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn registry() -> ActionRegistry {
		let mut registry = ActionRegistry::new();
		registry
			.register(ActionDescriptor {
				id: "cluster_by_similarity".into(),
				description: "Groups similar images under new tags".into(),
				params: vec![
					ParamDescriptor::required("property", ParamKind::Property),
					ParamDescriptor::optional("threshold", ParamKind::Float, 0.8),
					ParamDescriptor::optional("dry_run", ParamKind::Bool, false),
				],
			})
			.expect("registers");

		registry
	}

	#[test]
	fn defaults_are_filled() {
		let bound = registry()
			.bind("cluster_by_similarity", json!({ "property": 3 }))
			.expect("binds");

		assert_eq!(bound.get("property"), Some(&json!(3)));
		assert_eq!(bound.get("threshold"), Some(&json!(0.8)));
		assert_eq!(bound.get("dry_run"), Some(&json!(false)));
		assert_eq!(bound.int("property").expect("property"), 3);
		assert!(!bound.bool("dry_run").expect("dry_run"));
		assert!(matches!(
			bound.str("threshold"),
			Err(ActionError::MissingParam { .. })
		));
	}

	#[test]
	fn bad_arguments_are_rejected() {
		let registry = registry();

		assert!(matches!(
			registry.bind("cluster_by_similarity", json!({})),
			Err(ActionError::MissingParam { .. })
		));
		assert!(matches!(
			registry.bind("cluster_by_similarity", json!({ "property": "3" })),
			Err(ActionError::WrongKind {
				expected: ParamKind::Property,
				..
			})
		));
		assert!(matches!(
			registry.bind(
				"cluster_by_similarity",
				json!({ "property": 3, "colour": 1 })
			),
			Err(ActionError::UnknownParam { .. })
		));
		assert!(matches!(
			registry.bind("missing", json!({})),
			Err(ActionError::NotFound(_))
		));
	}

	#[test]
	fn duplicate_and_badly_declared_actions_are_refused() {
		let mut registry = registry();

		assert!(matches!(
			registry.register(ActionDescriptor {
				id: "cluster_by_similarity".into(),
				description: String::new(),
				params: vec![],
			}),
			Err(ActionError::AlreadyRegistered(_))
		));
		assert!(matches!(
			registry.register(ActionDescriptor {
				id: "rename".into(),
				description: String::new(),
				params: vec![ParamDescriptor::optional("name", ParamKind::String, 4)],
			}),
			Err(ActionError::InvalidDefault { .. })
		));
	}
}
