//! High-level facade wiring configuration, token store, executor, and scheduler together.

// self
use crate::{
	_prelude::*,
	auth::Vin,
	config::VolvoConfig,
	flows::Authorizer,
	http::ReqwestHttpClient,
	request::{
		Command, Endpoint, EndpointDescriptor, RateLimiter, RequestExecutor, ResponseCache,
		vins_from_vehicle_list,
	},
	scheduler::Scheduler,
	store::{FileStore, TokenStore},
};

/// Connected-vehicle client.
///
/// Every call made through one client (foreground or scheduled) shares the same token store,
/// rate limiter, and response cache.
#[derive(Clone, Debug)]
pub struct VolvoClient {
	config: Arc<VolvoConfig>,
	authorizer: Arc<Authorizer>,
	executor: Arc<RequestExecutor>,
}
impl VolvoClient {
	/// Builds a client persisting tokens to [`VolvoConfig::token_storage_path`].
	pub fn new(config: VolvoConfig) -> Result<Self> {
		let store = FileStore::open(&config.token_storage_path)?;

		Self::with_store(config, Arc::new(store))
	}

	/// Builds a client over a caller-supplied token store.
	pub fn with_store(config: VolvoConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Ok(Self::with_http_client(config, store, http_client))
	}

	/// Builds a client over a caller-supplied token store and HTTP transport.
	///
	/// [`VolvoConfig::request_timeout`] is not applied; configure it on `http_client`.
	pub fn with_http_client(
		config: VolvoConfig,
		store: Arc<dyn TokenStore>,
		http_client: ReqwestHttpClient,
	) -> Self {
		let config = Arc::new(config);
		let authorizer = Arc::new(Authorizer::new(config.clone(), http_client.clone(), store));
		let executor = Arc::new(RequestExecutor::new(
			authorizer.clone(),
			http_client,
			Arc::new(RateLimiter::new(config.min_request_interval)),
			Arc::new(ResponseCache::new()),
		));

		Self { config, authorizer, executor }
	}

	/// Configuration in use.
	pub fn config(&self) -> &VolvoConfig {
		&self.config
	}

	/// Token lifecycle owner (authorization, refresh, logout).
	pub fn authorizer(&self) -> &Arc<Authorizer> {
		&self.authorizer
	}

	/// Shared request executor.
	pub fn executor(&self) -> &Arc<RequestExecutor> {
		&self.executor
	}

	/// Fetches the raw JSON response of `endpoint` for `vin`.
	pub async fn get(&self, vin: &Vin, endpoint: Endpoint) -> Result<Value> {
		self.executor.execute(&endpoint.descriptor(vin)).await
	}

	/// Fetches `endpoint` and unwraps the `data` envelope when the response has one.
	pub async fn data(&self, vin: &Vin, endpoint: Endpoint) -> Result<Value> {
		let mut body = self.get(vin, endpoint).await?;

		if endpoint.is_enveloped()
			&& let Some(data) = body.get_mut("data")
		{
			return Ok(data.take());
		}

		Ok(body)
	}

	/// Lists the VINs accessible to the authorized account.
	pub async fn list_vehicles(&self) -> Result<Vec<Vin>> {
		let body = self.executor.execute(&EndpointDescriptor::vehicle_list()).await?;

		Ok(vins_from_vehicle_list(&body))
	}

	/// Invokes a remote command; the response is never cached.
	pub async fn send_command(&self, vin: &Vin, command: Command) -> Result<Value> {
		let result = self.executor.execute(&command.descriptor(vin)).await;

		if result.is_ok() {
			// Cached vehicle state is stale once a command lands.
			self.executor.clear_cache();
		}

		result
	}

	/// Creates a stopped scheduler polling the configured VINs for `endpoints`.
	pub fn scheduler(&self, endpoints: impl IntoIterator<Item = Endpoint>) -> Scheduler {
		Scheduler::new(
			self.executor.clone(),
			self.config.vins.clone(),
			endpoints.into_iter().collect(),
		)
	}

	/// Clears stored credentials and cached responses.
	pub async fn logout(&self) -> Result<()> {
		self.authorizer.logout().await?;
		self.executor.clear_cache();

		Ok(())
	}
}
