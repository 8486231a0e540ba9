//! Validated tenant and principal identifiers used in cache keys.
//!
//! Both are an [`Identifier`] tagged with the identity it names. A tenant identifier is what a
//! user token carries in its `zid` (or `app_tid`) claim; a principal identifier is the token's
//! subject. Only the raw value takes part in equality and hashing, so an identifier can be looked
//! up by `&str` in maps keyed by it.

// std
use std::{
	borrow::Borrow,
	hash::{Hash, Hasher},
	marker::PhantomData,
	ops::Deref,
};
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::{_prelude::*, auth::AuthToken};

/// Identifiers longer than this are rejected.
pub const IDENTIFIER_MAX_LEN: usize = 256;

/// Marks which identity an [`Identifier`] names.
pub trait IdentityKind
where
	Self: 'static + Send + Sync,
{
	/// Label used in diagnostics, e.g. `Tenant`.
	const LABEL: &'static str;
}

/// Identity of an isolated customer or subaccount context.
#[derive(Debug)]
pub enum TenantKind {}
impl IdentityKind for TenantKind {
	const LABEL: &'static str = "Tenant";
}

/// Identity of a user or technical identity within a tenant.
#[derive(Debug)]
pub enum PrincipalKind {}
impl IdentityKind for PrincipalKind {
	const LABEL: &'static str = "Principal";
}

/// Identifier of an isolated customer or subaccount context.
pub type TenantId = Identifier<TenantKind>;
/// Identifier of a user or technical identity within a tenant.
pub type PrincipalId = Identifier<PrincipalKind>;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant or principal).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (tenant or principal).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Kind of identifier (tenant or principal).
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

/// Non-empty, whitespace-free identifier of kind `K`.
pub struct Identifier<K> {
	value: Arc<str>,
	kind: PhantomData<K>,
}
impl<K> Identifier<K>
where
	K: IdentityKind,
{
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let value = value.as_ref();

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind: K::LABEL });
		}
		if value.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { kind: K::LABEL });
		}
		if value.len() > IDENTIFIER_MAX_LEN {
			return Err(IdentifierError::TooLong { kind: K::LABEL, max: IDENTIFIER_MAX_LEN });
		}

		Ok(Self { value: value.into(), kind: PhantomData })
	}

	/// Raw identifier.
	pub fn as_str(&self) -> &str {
		&self.value
	}
}
impl TenantId {
	/// Tenant a user token was issued for; `None` when the token carries no usable tenant claim.
	pub fn of_token(token: &AuthToken) -> Option<Self> {
		token.tenant().and_then(|zid| Self::new(zid).ok())
	}
}
impl PrincipalId {
	/// Subject of a user token; `None` when the token carries no usable subject.
	pub fn of_token(token: &AuthToken) -> Option<Self> {
		token.subject().and_then(|sub| Self::new(sub).ok())
	}
}
impl<K> Clone for Identifier<K> {
	fn clone(&self) -> Self {
		Self { value: self.value.clone(), kind: PhantomData }
	}
}
impl<K> PartialEq for Identifier<K> {
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}
impl<K> Eq for Identifier<K> {}
impl<K> PartialOrd for Identifier<K> {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}
impl<K> Ord for Identifier<K> {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.value.cmp(&other.value)
	}
}
impl<K> Hash for Identifier<K> {
	fn hash<H>(&self, state: &mut H)
	where
		H: Hasher,
	{
		// Must hash like `str` for `Borrow<str>` lookups.
		self.value.hash(state);
	}
}
impl<K> Deref for Identifier<K> {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.value
	}
}
impl<K> AsRef<str> for Identifier<K> {
	fn as_ref(&self) -> &str {
		&self.value
	}
}
impl<K> Borrow<str> for Identifier<K> {
	fn borrow(&self) -> &str {
		&self.value
	}
}
impl<K> From<Identifier<K>> for String {
	fn from(id: Identifier<K>) -> Self {
		id.value.to_string()
	}
}
impl<K> TryFrom<String> for Identifier<K>
where
	K: IdentityKind,
{
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl<K> FromStr for Identifier<K>
where
	K: IdentityKind,
{
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl<K> Debug for Identifier<K>
where
	K: IdentityKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", K::LABEL, self.value)
	}
}
impl<K> Display for Identifier<K> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}
impl<K> Serialize for Identifier<K> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.value)
	}
}
impl<'de, K> Deserialize<'de> for Identifier<K>
where
	K: IdentityKind,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Self::new(String::deserialize(deserializer)?).map_err(DeError::custom)
	}
}
