// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::CharacterId,
	esi::{ApiMethod, RequestOptions},
};

const CACHE_KEY_PREFIX: &str = "req_";

/// Content and identity fingerprint of a request, used as its cache key.
///
/// Two requests share a signature only when method, endpoint, version, options, principal, and
/// data source all match. Fields are length-prefixed before hashing so adjacent values cannot run
/// into each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestSignature(String);
impl RequestSignature {
	/// Computes the signature; `principal` is `None` for anonymous or depersonalized requests.
	pub fn compute(
		method: ApiMethod,
		endpoint: &str,
		version: &str,
		options: &RequestOptions,
		principal: Option<CharacterId>,
		data_source: &str,
	) -> Self {
		let principal = principal.map(|id| id.to_string()).unwrap_or_default();
		let mut hasher = Sha256::new();

		for field in [
			method.as_str(),
			endpoint,
			version,
			options.canonical_json().as_str(),
			principal.as_str(),
			data_source,
		] {
			hasher.update((field.len() as u64).to_be_bytes());
			hasher.update(field.as_bytes());
		}

		Self(format!("{:x}", hasher.finalize()))
	}

	/// Lowercase hex digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Cache engine key for this signature.
	pub fn cache_key(&self) -> String {
		format!("{CACHE_KEY_PREFIX}{}", self.0)
	}
}
impl Display for RequestSignature {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn sign(endpoint: &str, principal: Option<i64>) -> RequestSignature {
		RequestSignature::compute(
			ApiMethod::Get,
			endpoint,
			"latest",
			&RequestOptions::new().with_query("page", 1),
			principal.map(CharacterId::new),
			"tranquility",
		)
	}

	#[test]
	fn signatures_are_deterministic_hex() {
		let signature = sign("characters/1/skills", Some(1));

		assert_eq!(signature, sign("characters/1/skills", Some(1)));
		assert_eq!(signature.as_str().len(), 64);
		assert!(signature.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		assert_eq!(signature.cache_key(), format!("req_{signature}"));
	}

	#[test]
	fn every_field_changes_the_signature() {
		let base = sign("status", Some(7));
		let variants = [
			RequestSignature::compute(
				ApiMethod::Post,
				"status",
				"latest",
				&RequestOptions::new().with_query("page", 1),
				Some(CharacterId::new(7)),
				"tranquility",
			),
			sign("universe/types", Some(7)),
			RequestSignature::compute(
				ApiMethod::Get,
				"status",
				"v2",
				&RequestOptions::new().with_query("page", 1),
				Some(CharacterId::new(7)),
				"tranquility",
			),
			RequestSignature::compute(
				ApiMethod::Get,
				"status",
				"latest",
				&RequestOptions::new().with_query("page", 2),
				Some(CharacterId::new(7)),
				"tranquility",
			),
			sign("status", Some(8)),
			sign("status", None),
			RequestSignature::compute(
				ApiMethod::Get,
				"status",
				"latest",
				&RequestOptions::new().with_query("page", 1),
				Some(CharacterId::new(7)),
				"singularity",
			),
		];

		for variant in variants {
			assert_ne!(variant, base);
		}
	}

	#[test]
	fn field_boundaries_are_unambiguous() {
		let lhs = RequestSignature::compute(
			ApiMethod::Get,
			"ab",
			"c",
			&RequestOptions::new(),
			None,
			"tranquility",
		);
		let rhs = RequestSignature::compute(
			ApiMethod::Get,
			"a",
			"bc",
			&RequestOptions::new(),
			None,
			"tranquility",
		);

		assert_ne!(lhs, rhs);
	}
}
