//! Character identifier issued by EVE SSO.

// self
use crate::_prelude::*;

/// EVE character identifier; the principal every authenticated request is made for.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(i64);
impl CharacterId {
	/// Wraps a raw identifier.
	pub const fn new(value: i64) -> Self {
		Self(value)
	}

	/// Returns the raw identifier.
	pub const fn get(self) -> i64 {
		self.0
	}
}
impl From<i64> for CharacterId {
	fn from(value: i64) -> Self {
		Self(value)
	}
}
impl Debug for CharacterId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CharacterId({})", self.0)
	}
}
impl Display for CharacterId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for CharacterId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse().map(Self)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn character_id_parses_and_displays_decimal() {
		let id = CharacterId::from_str(" 90000001 ").expect("Character id should parse.");

		assert_eq!(id.get(), 90_000_001);
		assert_eq!(id.to_string(), "90000001");
		assert_eq!(format!("{id:?}"), "CharacterId(90000001)");
		assert!(CharacterId::from_str("pilot").is_err());
	}
}
