//! Authentication endpoints and their wire types.

// self
use crate::{_prelude::*, api::ApiEnvelope, client::ApiClient, credential::CredentialPair};

/// Registration payload for `POST /auth/register`.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
	/// Account email address.
	pub email: String,
	/// Display name.
	pub name: String,
	/// Plaintext password; only ever sent over the transport, never stored.
	pub password: String,
}

/// Login payload for `POST /auth/login`.
#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
	/// Account email address.
	pub email: String,
	/// Plaintext password.
	pub password: String,
}

/// Token pair issued by the authentication endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokens {
	/// Short-lived access token.
	pub access_token: String,
	/// Longer-lived refresh token.
	pub refresh_token: String,
}
impl From<AuthTokens> for CredentialPair {
	fn from(tokens: AuthTokens) -> Self {
		Self::new(tokens.access_token, tokens.refresh_token)
	}
}

#[derive(Serialize)]
struct ForgotPasswordRequest<'a> {
	email: &'a str,
}

impl ApiClient {
	/// Registers a new account and stores the issued credential pair.
	pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
		let envelope: ApiEnvelope<AuthTokens> = self.post_json("/auth/register", request).await?;

		self.adopt_tokens(envelope.into_data()?).await
	}

	/// Logs in and stores the issued credential pair.
	pub async fn login(&self, request: &LoginRequest) -> Result<()> {
		let envelope: ApiEnvelope<AuthTokens> = self.post_json("/auth/login", request).await?;

		self.adopt_tokens(envelope.into_data()?).await
	}

	/// Starts the password-reset flow, returning the server's status message.
	pub async fn forgot_password(&self, email: &str) -> Result<Option<String>> {
		let envelope: ApiEnvelope<()> =
			self.post_json("/auth/forgot-password", &ForgotPasswordRequest { email }).await?;

		Ok(envelope.message)
	}

	/// Forgets the local session without contacting the server.
	pub async fn logout(&self) -> Result<()> {
		self.store().clear().await.map_err(Error::from)
	}

	async fn adopt_tokens(&self, tokens: AuthTokens) -> Result<()> {
		self.store().save(tokens.into()).await.map_err(Error::from)
	}
}
