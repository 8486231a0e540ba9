//! Immutable destination options built through augmenters.
//!
//! Options take part in value cache keys, so two option bags compare equal exactly when they
//! carry the same parameters, regardless of the order augmenters applied them.

// self
use crate::{
	_prelude::*,
	destination::AuthenticationType,
	error::ConfigError,
	strategy::{DestinationTokenExchangeStrategy, RetrievalStrategy},
};

/// Option key selecting the token exchange strategy.
pub const TOKEN_EXCHANGE_STRATEGY_KEY: &str = "destination.token_exchange_strategy";
/// Option key selecting the retrieval strategy.
pub const RETRIEVAL_STRATEGY_KEY: &str = "destination.retrieval_strategy";
/// Option key hinting the destination's authentication type before it is resolved.
pub const AUTHENTICATION_TYPE_KEY: &str = "destination.authentication_type";

/// Contributes parameters to a [`DestinationOptionsBuilder`].
pub trait DestinationOptionsAugmenter {
	/// Writes this augmenter's parameters into `builder`.
	fn augment(&self, builder: &mut DestinationOptionsBuilder);
}

/// Immutable, cheaply clonable option bag.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationOptions(Arc<BTreeMap<String, String>>);
impl DestinationOptions {
	/// Returns a builder.
	pub fn builder() -> DestinationOptionsBuilder {
		DestinationOptionsBuilder::default()
	}

	/// Raw parameter lookup.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Iterates over all parameters in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	/// Returns `true` when no parameter is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Explicit token exchange strategy, if configured.
	pub fn token_exchange_strategy(
		&self,
	) -> Result<Option<DestinationTokenExchangeStrategy>, ConfigError> {
		self.parse(TOKEN_EXCHANGE_STRATEGY_KEY)
	}

	/// Retrieval strategy, defaulting to [`RetrievalStrategy::CurrentTenant`].
	pub fn retrieval_strategy(&self) -> Result<RetrievalStrategy, ConfigError> {
		Ok(self.parse(RETRIEVAL_STRATEGY_KEY)?.unwrap_or_default())
	}

	/// Authentication type hint, if configured.
	pub fn authentication_type(&self) -> Result<Option<AuthenticationType>, ConfigError> {
		self.parse(AUTHENTICATION_TYPE_KEY)
	}

	fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
	{
		self.get(key)
			.map(|raw| {
				raw.parse().map_err(|_| ConfigError::InvalidOption { key, value: raw.to_owned() })
			})
			.transpose()
	}
}
impl Debug for DestinationOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_map().entries(self.0.iter()).finish()
	}
}

/// Builder for [`DestinationOptions`].
#[derive(Clone, Debug, Default)]
pub struct DestinationOptionsBuilder {
	parameters: BTreeMap<String, String>,
}
impl DestinationOptionsBuilder {
	/// Sets or replaces a parameter.
	pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.set(key, value);

		self
	}

	/// Sets or replaces a parameter in place; intended for augmenters.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.parameters.insert(key.into(), value.into());
	}

	/// Applies an augmenter.
	pub fn augment(mut self, augmenter: &impl DestinationOptionsAugmenter) -> Self {
		augmenter.augment(&mut self);

		self
	}

	/// Finalizes the options.
	pub fn build(self) -> DestinationOptions {
		DestinationOptions(Arc::new(self.parameters))
	}
}

/// Augmenter for the parameters the resolution cache itself understands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DestinationServiceOptions {
	token_exchange_strategy: Option<DestinationTokenExchangeStrategy>,
	retrieval_strategy: Option<RetrievalStrategy>,
	authentication_type: Option<AuthenticationType>,
}
impl DestinationServiceOptions {
	/// Creates an empty augmenter.
	pub fn new() -> Self {
		Self::default()
	}

	/// Selects the token exchange strategy.
	pub fn token_exchange_strategy(mut self, strategy: DestinationTokenExchangeStrategy) -> Self {
		self.token_exchange_strategy = Some(strategy);

		self
	}

	/// Selects the retrieval strategy.
	pub fn retrieval_strategy(mut self, strategy: RetrievalStrategy) -> Self {
		self.retrieval_strategy = Some(strategy);

		self
	}

	/// Hints the destination's authentication type.
	pub fn authentication_type(mut self, authentication: AuthenticationType) -> Self {
		self.authentication_type = Some(authentication);

		self
	}
}
impl DestinationOptionsAugmenter for DestinationServiceOptions {
	fn augment(&self, builder: &mut DestinationOptionsBuilder) {
		if let Some(strategy) = self.token_exchange_strategy {
			builder.set(TOKEN_EXCHANGE_STRATEGY_KEY, strategy.as_str());
		}
		if let Some(strategy) = self.retrieval_strategy {
			builder.set(RETRIEVAL_STRATEGY_KEY, strategy.as_str());
		}
		if let Some(authentication) = self.authentication_type {
			builder.set(AUTHENTICATION_TYPE_KEY, authentication.as_str());
		}
	}
}
