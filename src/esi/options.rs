// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Query key owned by the client configuration; a caller-supplied value is never sent.
pub(crate) const DATA_SOURCE_KEY: &str = "datasource";

/// Per-request options: query parameters, JSON body, and cache bypass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
	/// Query parameters appended before `datasource`.
	#[serde(default)]
	pub query: BTreeMap<String, String>,
	/// JSON body sent with the request.
	#[serde(default)]
	pub body: Option<Value>,
	/// Skips the cache lookup; the response is still written back when cacheable.
	#[serde(default, skip_serializing)]
	pub no_cache: bool,
}
impl RequestOptions {
	/// Empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.insert(key.into(), value.to_string());

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Bypasses the cache lookup for this request.
	pub fn bypass_cache(mut self) -> Self {
		self.no_cache = true;

		self
	}

	/// Order-independent JSON rendering of the cache-relevant options.
	///
	/// A `datasource` query entry is left out, as it never reaches the request URL.
	pub fn canonical_json(&self) -> String {
		let query = self
			.query
			.iter()
			.filter(|(key, _)| key.as_str() != DATA_SOURCE_KEY)
			.map(|(key, value)| (key.clone(), Value::String(value.clone())))
			.collect::<Map<_, _>>();
		let mut options = Map::new();

		options.insert("body".into(), self.body.clone().unwrap_or(Value::Null));
		options.insert("query".into(), Value::Object(query));

		let mut out = String::new();

		write_canonical(&Value::Object(options), &mut out);

		out
	}
}

fn write_canonical(value: &Value, out: &mut String) {
	match value {
		Value::Object(map) => {
			let mut entries = map.iter().collect::<Vec<_>>();

			entries.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
			out.push('{');

			for (i, (key, value)) in entries.into_iter().enumerate() {
				if i > 0 {
					out.push(',');
				}

				out.push_str(&Value::String(key.clone()).to_string());
				out.push(':');
				write_canonical(value, out);
			}

			out.push('}');
		},
		Value::Array(items) => {
			out.push('[');

			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push(',');
				}

				write_canonical(item, out);
			}

			out.push(']');
		},
		scalar => out.push_str(&scalar.to_string()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn canonical_json_ignores_key_order_and_cache_bypass() {
		let lhs = RequestOptions::new()
			.with_query("page", 2)
			.with_query("filter", "all")
			.with_body(json!({"b": [1, {"y": true, "x": null}], "a": "\"quoted\""}));
		let rhs = RequestOptions::new()
			.with_query("filter", "all")
			.with_query("page", "2")
			.with_body(json!({"a": "\"quoted\"", "b": [1, {"x": null, "y": true}]}))
			.bypass_cache();

		assert_eq!(lhs.canonical_json(), rhs.canonical_json());
		assert_eq!(
			lhs.canonical_json(),
			r#"{"body":{"a":"\"quoted\"","b":[1,{"x":null,"y":true}]},"query":{"filter":"all","page":"2"}}"#
		);
	}

	#[test]
	fn caller_supplied_data_source_is_not_signed() {
		let plain = RequestOptions::new().with_query("page", 1);
		let overridden = plain.clone().with_query("datasource", "singularity");

		assert_eq!(plain.canonical_json(), overridden.canonical_json());
	}

	#[test]
	fn empty_options_render_stably() {
		assert_eq!(RequestOptions::default().canonical_json(), r#"{"body":null,"query":{}}"#);
	}
}
