// crates.io
use httpmock::prelude::*;
// self
use destination_broker::{
	_preludet::*,
	context::ExecutionContext,
	error::HttpStatusError,
	token::{ClientCredentials, OAuth2ServiceSettings},
};

const CLIENT_ID: &str = "client-id";

fn settings(server: &MockServer) -> OAuth2ServiceSettings {
	OAuth2ServiceSettings::parse(&server.url("/oauth/token"))
		.expect("Mock token endpoint should parse successfully.")
}

#[tokio::test]
async fn client_credentials_token_is_reused_until_invalidated() {
	let server = MockServer::start_async().await;
	let service = test_token_service();
	let credentials = ClientCredentials::new(CLIENT_ID, "$%(<>");
	let ctx = ExecutionContext::anonymous();
	let mut first_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=client_credentials")
				.body_includes("client_id=client-id")
				.body_includes("client_secret=%24%25%28%3C%3E");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"first-token\",\"expires_in\":100000}");
		})
		.await;
	let first = service
		.retrieve_access_token_via_client_credentials_grant(
			&ctx,
			&settings(&server),
			&credentials,
			false,
		)
		.await
		.expect("Initial client_credentials request should succeed.");
	let second = service
		.retrieve_access_token_via_client_credentials_grant(
			&ctx,
			&settings(&server),
			&credentials,
			false,
		)
		.await
		.expect("Cached client_credentials request should succeed.");

	assert_eq!(first, second);

	first_mock.assert_calls_async(1).await;
	first_mock.delete_async().await;

	let second_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"second-token\",\"expires_in\":100000}");
		})
		.await;

	service.invalidate_cache();

	let third = service
		.retrieve_access_token_via_client_credentials_grant(
			&ctx,
			&settings(&server),
			&credentials,
			false,
		)
		.await
		.expect("Client_credentials request after invalidation should succeed.");

	assert_ne!(first, third);
	assert_eq!(third.value.expose(), "second-token");

	second_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn tenant_scoped_tokens_are_requested_per_tenant() {
	let server = MockServer::start_async().await;
	let service = test_token_service();
	let credentials = ClientCredentials::new(CLIENT_ID, "secret");
	let tenant_a = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").header("x-zid", "tenant-a");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"token-a\",\"expires_in\":3600}");
		})
		.await;
	let tenant_b = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").header("x-zid", "tenant-b");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"token-b\",\"expires_in\":3600}");
		})
		.await;
	let a = service
		.retrieve_access_token_via_client_credentials_grant(
			&tenant_context("tenant-a"),
			&settings(&server),
			&credentials,
			true,
		)
		.await
		.expect("Tenant A request should succeed.");
	let b = service
		.retrieve_access_token_via_client_credentials_grant(
			&tenant_context("tenant-b"),
			&settings(&server),
			&credentials,
			true,
		)
		.await
		.expect("Tenant B request should succeed.");

	assert_eq!(a.value.expose(), "token-a");
	assert_eq!(b.value.expose(), "token-b");
	assert_eq!(service.cache().len(), 2);

	tenant_a.assert_calls_async(1).await;
	tenant_b.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_requests_share_one_exchange() {
	let server = MockServer::start_async().await;
	let service = test_token_service();
	let credentials = ClientCredentials::new(CLIENT_ID, "secret");
	let ctx = ExecutionContext::anonymous();
	let settings = settings(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.delay(std::time::Duration::from_millis(200))
				.header("content-type", "application/json")
				.body("{\"access_token\":\"shared-token\",\"expires_in\":3600}");
		})
		.await;
	let (first, second) = tokio::join!(
		service.retrieve_access_token_via_client_credentials_grant(
			&ctx,
			&settings,
			&credentials,
			false
		),
		service.retrieve_access_token_via_client_credentials_grant(
			&ctx,
			&settings,
			&credentials,
			false
		),
	);

	assert_eq!(
		first.expect("First concurrent call should succeed."),
		second.expect("Second concurrent call should succeed.")
	);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn non_success_status_surfaces_with_cause() {
	let server = MockServer::start_async().await;
	let service = test_token_service();
	let credentials = ClientCredentials::new(CLIENT_ID, "secret");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401).body("{\"error\":\"unauthorized\"}");
		})
		.await;
	let err = service
		.retrieve_access_token_via_client_credentials_grant(
			&ExecutionContext::anonymous(),
			&settings(&server),
			&credentials,
			false,
		)
		.await
		.expect_err("Unauthorized responses should surface to the caller.");

	match err.unshared() {
		Error::TokenRequestFailed {
			grant: "client_credentials",
			source: HttpStatusError { status, body },
		} => {
			assert_eq!(*status, 401);
			assert!(body.contains("unauthorized"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(service.cache().is_empty());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn jwt_bearer_exchanges_the_user_token() {
	let server = MockServer::start_async().await;
	let service = test_token_service();
	let credentials = ClientCredentials::new(CLIENT_ID, "secret");
	let alice = token_context("tenant-a", "alice");
	let bob = token_context("tenant-a", "bob");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_includes("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
				.body_includes("assertion=")
				.header("x-zid", "tenant-a");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"user-token\",\"expires_in\":3600}");
		})
		.await;
	let first = service
		.retrieve_access_token_via_jwt_bearer_grant(&alice, &settings(&server), &credentials)
		.await
		.expect("Alice's exchange should succeed.");
	let again = service
		.retrieve_access_token_via_jwt_bearer_grant(&alice, &settings(&server), &credentials)
		.await
		.expect("Alice's cached exchange should succeed.");

	service
		.retrieve_access_token_via_jwt_bearer_grant(&bob, &settings(&server), &credentials)
		.await
		.expect("Bob's exchange should succeed.");

	assert_eq!(first, again);

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn jwt_bearer_requires_token_and_matching_tenant() {
	let server = MockServer::start_async().await;
	let service = test_token_service();
	let credentials = ClientCredentials::new(CLIENT_ID, "secret");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"never\",\"expires_in\":3600}");
		})
		.await;
	let missing = service
		.retrieve_access_token_via_jwt_bearer_grant(
			&user_context("tenant-a", "alice"),
			&settings(&server),
			&credentials,
		)
		.await
		.expect_err("A missing user token should fail.");
	let mismatched = ExecutionContext::builder()
		.tenant(tenant_id("tenant-b"))
		.auth_token(user_token("tenant-a", "alice"))
		.build();
	let mismatch = service
		.retrieve_access_token_via_jwt_bearer_grant(&mismatched, &settings(&server), &credentials)
		.await
		.expect_err("A foreign user token should fail.");

	assert!(matches!(missing, Error::Context(_)));
	assert!(matches!(mismatch, Error::TenantMismatch { .. }));

	mock.assert_calls_async(0).await;
}
