//! Demonstrates resolving destinations through the isolation-aware cache, with a loader that
//! authenticates against the (mocked) identity provider named by its service binding before
//! every lookup.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use destination_broker::{
	auth::{Tenant, TenantId},
	binding::ServiceBindings,
	context::ExecutionContext,
	destination::{
		AuthenticationType, Destination, DestinationLoader, DestinationOptions, LoaderFuture,
	},
	facade::DestinationResolutionCache,
	http::ReqwestHttpClient,
	reqwest::Client,
	token::{ReqwestTokenAcquisitionService, ReqwestTransportErrorMapper},
};

struct TokenBackedLoader {
	service: ReqwestTokenAcquisitionService,
	bindings: ServiceBindings,
}
impl DestinationLoader for TokenBackedLoader {
	fn load<'a>(
		&'a self,
		ctx: &'a ExecutionContext,
		name: &'a str,
		_: &'a DestinationOptions,
	) -> LoaderFuture<'a, Destination> {
		Box::pin(async move {
			let token = self
				.service
				.retrieve_access_token_for_binding(ctx, &self.bindings, "destination", true)
				.await?;

			println!("Loaded `{name}` with a token expiring at {}.", token.expires_at);

			Ok(Destination::builder(name)
				.authentication(AuthenticationType::OAuth2ClientCredentials)
				.property("URL", format!("https://{name}.example.com"))
				.auth_token_expiry(token.expires_at)
				.build())
		})
	}

	fn load_all<'a>(
		&'a self,
		ctx: &'a ExecutionContext,
		options: &'a DestinationOptions,
	) -> LoaderFuture<'a, Vec<Destination>> {
		Box::pin(async move { Ok(vec![self.load(ctx, "backend", options).await?]) })
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"expires_in\":900}");
		})
		.await;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let loader = Arc::new(TokenBackedLoader {
		service: ReqwestTokenAcquisitionService::with_http_client(
			http_client,
			ReqwestTransportErrorMapper,
		),
		bindings: ServiceBindings::from_json(&format!(
			r#"{{"destination": [{{
				"name": "demo-destination",
				"credentials": {{
					"clientid": "demo-client",
					"clientsecret": "super-secret",
					"url": "{}"
				}}
			}}]}}"#,
			server.base_url()
		))?,
	});
	let cache = DestinationResolutionCache::new(loader);
	let ctx = ExecutionContext::builder().tenant(Tenant::from(TenantId::new("tenant-acme")?)).build();
	let options = DestinationOptions::default();

	for _ in 0..3 {
		let destination = cache.get_or_compute_destination(&ctx, "backend", &options).await?;

		println!(
			"Resolved `{}` at {}.",
			destination.name(),
			destination.property("URL").map(ToString::to_string).unwrap_or_default()
		);
	}

	token_mock.assert_calls_async(1).await;

	Ok(())
}
