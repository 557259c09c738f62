//! JavaScript evaluation methods for [`Page`].

use godel_protocol::{EvaluateParams, EvaluateResult};
use serde_json::Value;

use super::Page;
use crate::error::{Error, Result};

impl Page {
	/// Evaluates `expression` and returns its JSON value.
	///
	/// Promises are awaited. `undefined` comes back as [`Value::Null`].
	///
	/// # Errors
	///
	/// Returns [`Error::JsEval`] if the expression throws.
	pub async fn evaluate(&self, expression: &str) -> Result<Value> {
		let raw = self
			.send("Runtime.evaluate", serde_json::to_value(EvaluateParams::by_value(expression))?)
			.await?;
		let result: EvaluateResult = serde_json::from_value(raw)?;
		if let Some(details) = result.exception_details {
			return Err(Error::JsEval(details.message()));
		}
		Ok(result.result.value.unwrap_or(Value::Null))
	}

	/// Evaluates `expression` and deserializes the result to `T`.
	pub async fn evaluate_typed<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
		Ok(serde_json::from_value(self.evaluate(expression).await?)?)
	}
}
