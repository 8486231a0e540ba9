//! Cache policy settings for the resolution facade.

// self
use crate::{_prelude::*, error::ConfigError};

/// Default maximum number of cached destinations.
pub const DEFAULT_SIZE_LIMIT: u64 = 1_000;
/// Default time-to-live of cached destinations.
pub const DEFAULT_EXPIRATION: Duration = Duration::minutes(5);
/// Time-to-live of single destinations while change detection bounds their freshness instead.
pub const CHANGE_DETECTION_SINGLE_TTL: Duration = Duration::days(1);
/// Longest expiration the value caches accept.
pub const MAX_EXPIRATION: Duration = Duration::days(365 * 1_000);

/// When the expiration clock of an entry starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStrategy {
	/// Entries expire a fixed time after insertion.
	#[default]
	WhenCreated,
	/// Entries expire a fixed time after their last read or write.
	WhenLastTouched,
}

/// Cache policy for one facade generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
	/// Whether results are cached at all.
	pub enabled: bool,
	/// Maximum number of cached destinations; `None` means unbounded.
	pub size_limit: Option<u64>,
	/// Entry lifetime; `None` means entries never expire.
	#[serde(with = "seconds")]
	pub expiration: Option<Duration>,
	/// When the entry lifetime starts.
	pub expiration_strategy: ExpirationStrategy,
	/// Whether cached single destinations are validated against the destination listing.
	pub change_detection: bool,
}
impl CacheSettings {
	/// Parses settings from JSON, reporting the path of the offending field on failure.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let settings: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::MalformedSettings { source })?;

		settings.normalized()
	}

	/// Validates the settings and resolves combinations that cannot work together.
	///
	/// Change detection relies on the listing expiring a fixed time after it was fetched, so it
	/// is switched off when there is no expiration or entries expire on last touch.
	pub fn normalized(mut self) -> Result<Self, ConfigError> {
		if self.expiration.is_some_and(|ttl| !ttl.is_positive()) {
			return Err(ConfigError::NonPositiveExpiration);
		}
		if self.expiration.is_some_and(|ttl| ttl > MAX_EXPIRATION) {
			return Err(ConfigError::ExpirationTooLong { max: MAX_EXPIRATION });
		}
		if self.change_detection {
			if self.expiration.is_none() {
				tracing::warn!("Change detection requires a cache expiration; disabling it.");

				self.change_detection = false;
			} else if self.expiration_strategy != ExpirationStrategy::WhenCreated {
				tracing::warn!(
					strategy = ?self.expiration_strategy,
					"Change detection requires the when_created expiration strategy; disabling it."
				);

				self.change_detection = false;
			}
		}

		Ok(self)
	}

	/// Expiration applied to single destinations.
	pub fn single_expiration(&self) -> Option<(Duration, ExpirationStrategy)> {
		if self.change_detection {
			Some((CHANGE_DETECTION_SINGLE_TTL, ExpirationStrategy::WhenCreated))
		} else {
			self.expiration.map(|ttl| (ttl, self.expiration_strategy))
		}
	}

	/// Expiration applied to destination listings.
	pub fn all_expiration(&self) -> Option<(Duration, ExpirationStrategy)> {
		if self.change_detection {
			self.expiration.map(|ttl| (ttl, ExpirationStrategy::WhenCreated))
		} else {
			self.expiration.map(|ttl| (ttl, self.expiration_strategy))
		}
	}

	/// Size limit applied to destination listings; unbounded while change detection relies on them.
	pub fn all_size_limit(&self) -> Option<u64> {
		if self.change_detection { None } else { self.size_limit }
	}
}
impl Default for CacheSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			size_limit: Some(DEFAULT_SIZE_LIMIT),
			expiration: Some(DEFAULT_EXPIRATION),
			expiration_strategy: ExpirationStrategy::WhenCreated,
			change_detection: true,
		}
	}
}

mod seconds {
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		value.map(|ttl| ttl.whole_seconds()).serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::seconds))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_enable_change_detection_with_split_expirations() {
		let settings = CacheSettings::default();

		assert_eq!(
			settings.single_expiration(),
			Some((CHANGE_DETECTION_SINGLE_TTL, ExpirationStrategy::WhenCreated))
		);
		assert_eq!(
			settings.all_expiration(),
			Some((DEFAULT_EXPIRATION, ExpirationStrategy::WhenCreated))
		);
		assert_eq!(settings.all_size_limit(), None);
	}

	#[test]
	fn json_overrides_and_normalizes() {
		let settings = CacheSettings::from_json(
			r#"{"expiration": 60, "expiration_strategy": "when_last_touched", "size_limit": null}"#,
		)
		.expect("Settings JSON should parse.");

		assert!(settings.enabled);
		assert!(!settings.change_detection, "Touch-based expiry must disable change detection.");
		assert_eq!(settings.size_limit, None);
		assert_eq!(
			settings.single_expiration(),
			Some((Duration::seconds(60), ExpirationStrategy::WhenLastTouched))
		);

		let settings = CacheSettings::from_json(r#"{"expiration": null}"#)
			.expect("Settings without expiration should parse.");

		assert!(!settings.change_detection);
		assert_eq!(settings.single_expiration(), None);
	}

	#[test]
	fn json_errors_report_paths() {
		let err = CacheSettings::from_json(r#"{"size_limit": "many"}"#)
			.expect_err("Non-numeric size limit should be rejected.");

		match err {
			ConfigError::MalformedSettings { source } => {
				assert_eq!(source.path().to_string(), "size_limit");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		assert!(matches!(
			CacheSettings::from_json(r#"{"expiration": 0}"#),
			Err(ConfigError::NonPositiveExpiration)
		));
		assert!(CacheSettings::from_json(r#"{"ttl": 5}"#).is_err());
	}

	#[test]
	fn expirations_beyond_the_cache_limit_are_rejected() {
		let at_limit = CacheSettings { expiration: Some(MAX_EXPIRATION), ..Default::default() };

		at_limit.normalized().expect("The maximum expiration itself should be accepted.");

		match CacheSettings::from_json(r#"{"expiration": 63072000000}"#) {
			Err(ConfigError::ExpirationTooLong { max }) => assert_eq!(max, MAX_EXPIRATION),
			other => panic!("Unexpected result: {other:?}."),
		}
		assert!(matches!(
			CacheSettings::from_json(r#"{"expiration": 9223372036854775807}"#),
			Err(ConfigError::ExpirationTooLong { .. })
		));
	}
}
