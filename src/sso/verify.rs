// crates.io
use time::{
	PrimitiveDateTime,
	format_description::{BorrowedFormatItem, well_known::Rfc3339},
	macros::format_description,
};
// self
use crate::{
	_prelude::*,
	auth::{CharacterId, ScopeSet},
};

const EXPIRES_ON: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]");

/// Token details reported by the SSO `verify` endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
	/// Character the token acts for.
	pub character_id: CharacterId,
	/// Character name.
	pub character_name: String,
	/// Scopes granted to the token.
	pub scopes: ScopeSet,
	/// Token type, normally `Character`.
	pub token_type: String,
	/// Hash that changes when the character is transferred to another account.
	pub owner_hash: String,
	/// Access token expiry as reported by SSO, when present and parseable.
	pub expires_on: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VerifyPayload {
	#[serde(rename = "CharacterID")]
	character_id: Option<i64>,
	#[serde(default)]
	character_name: String,
	#[serde(default)]
	scopes: String,
	#[serde(default)]
	token_type: String,
	#[serde(default)]
	character_owner_hash: String,
	#[serde(default)]
	expires_on: Option<String>,
}

/// Parses a `verify` response body; the error string becomes the `InvalidToken` reason.
pub(crate) fn parse_token_info(body: &[u8]) -> Result<TokenInfo, String> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let payload: VerifyPayload = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| format!("verify response is malformed at `{}`: {}", e.path(), e.inner()))?;
	let character_id =
		payload.character_id.ok_or_else(|| "verify response lacks CharacterID".to_owned())?;
	let scopes = ScopeSet::from_str(&payload.scopes)
		.map_err(|e| format!("verify response carries invalid scopes: {e}"))?;

	Ok(TokenInfo {
		character_id: CharacterId::new(character_id),
		character_name: payload.character_name,
		scopes,
		token_type: payload.token_type,
		owner_hash: payload.character_owner_hash,
		expires_on: payload.expires_on.as_deref().and_then(parse_expires_on),
	})
}

fn parse_expires_on(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	OffsetDateTime::parse(raw, &Rfc3339)
		.ok()
		.or_else(|| PrimitiveDateTime::parse(raw, EXPIRES_ON).ok().map(PrimitiveDateTime::assume_utc))
}
