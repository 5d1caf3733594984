//! User operations on top of the limiter, the executor and the cache.
//!
//! [`UserManager`] owns the application identity and wires every call through one
//! [`BatchDispatcher`]: build the request, admit it, wait for dispatch, execute, decode,
//! cache.
//!
//! ```rust
//! use roster::{InMemoryExecutor, UserCreationParams, UserManager};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), roster::RosterError> {
//! let manager = UserManager::builder(InMemoryExecutor::new()).build();
//! manager.init_application("APP_ID", "API_TOKEN").await?;
//!
//! let user = manager.create_user(UserCreationParams::new("u1", "neo")).await?;
//! assert_eq!(manager.cached_user("u1"), Some(user));
//! # Ok(())
//! # }
//! ```

use crate::cache::{SharedUserStore, UserStore};
use crate::config::ClientConfig;
use crate::dispatch::{BatchDispatcher, BatchItem, BatchReport, MAX_BATCH_SIZE};
use crate::executor::RequestExecutor;
use crate::model::{User, UserCreationParams, UserUpdateParams, UsersPage};
use crate::rate_limit::{LeakyTokenBucket, RateLimiter};
use crate::request::{ApiRequest, UserRequest};
use crate::session::{Session, SessionHandle};
use crate::telemetry::{emit_best_effort, CacheEvent, ClientEvent, LogSink, TelemetrySink};
use crate::RosterError;
use std::sync::Arc;

/// Client-side entry point for the user API.
#[derive(Debug, Clone)]
pub struct UserManager<S = LogSink> {
    config: ClientConfig,
    session: SessionHandle,
    dispatcher: BatchDispatcher<S>,
}

/// Builder for [`UserManager`].
#[derive(Debug)]
pub struct UserManagerBuilder<S = LogSink> {
    config: ClientConfig,
    executor: Arc<dyn RequestExecutor>,
    limiter: Option<Arc<dyn RateLimiter>>,
    store: Option<Arc<dyn UserStore>>,
    sink: S,
}

impl UserManager<LogSink> {
    /// Start building a manager that talks to the API through `executor`.
    pub fn builder<E>(executor: E) -> UserManagerBuilder<LogSink>
    where
        E: RequestExecutor + 'static,
    {
        UserManagerBuilder {
            config: ClientConfig::default(),
            executor: Arc::new(executor),
            limiter: None,
            store: None,
            sink: LogSink,
        }
    }
}

impl<S> UserManagerBuilder<S> {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `limiter` instead of a [`LeakyTokenBucket`] built from the config.
    pub fn limiter<L>(mut self, limiter: L) -> Self
    where
        L: RateLimiter + 'static,
    {
        self.limiter = Some(Arc::new(limiter));
        self
    }

    /// Use `store` instead of a fresh [`SharedUserStore`].
    pub fn store<U>(mut self, store: U) -> Self
    where
        U: UserStore + 'static,
    {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn sink<S2>(self, sink: S2) -> UserManagerBuilder<S2> {
        UserManagerBuilder {
            config: self.config,
            executor: self.executor,
            limiter: self.limiter,
            store: self.store,
            sink,
        }
    }

    pub fn build(self) -> UserManager<S> {
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(LeakyTokenBucket::new(self.config.limiter())));
        let store = self.store.unwrap_or_else(|| Arc::new(SharedUserStore::new()));
        let dispatcher = BatchDispatcher::new(limiter, self.executor, store).with_sink(self.sink);
        UserManager { config: self.config, session: SessionHandle::default(), dispatcher }
    }
}

impl<S> UserManager<S> {
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current application identity.
    pub fn session(&self) -> Arc<Session> {
        self.session.get()
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        self.dispatcher.store()
    }

    /// Cached record for `user_id`, without touching the network.
    pub fn cached_user(&self, user_id: &str) -> Option<User> {
        self.store().get(user_id)
    }

    /// Every cached record, in no particular order.
    pub fn cached_users(&self) -> Vec<User> {
        self.store().get_all()
    }

    /// Cached records with exactly this nickname.
    pub fn cached_users_by_nickname(&self, nickname: &str) -> Vec<User> {
        self.store().get_by_nickname(nickname)
    }

    fn build_request(&self, request: &UserRequest) -> Result<ApiRequest, RosterError> {
        ApiRequest::build(&self.session.get(), self.config.api_host(), request)
    }

    /// Build `request` and pair it with its operation name.
    fn prepare(&self, request: UserRequest) -> Result<(&'static str, ApiRequest), RosterError> {
        Ok((request.operation(), self.build_request(&request)?))
    }
}

impl<S> UserManager<S>
where
    S: TelemetrySink + Sync,
    S::Future: Send,
{
    /// Set the application identity used by every later request.
    ///
    /// Switching to a different application id empties the cache; re-initialising with the
    /// same id only replaces the token.
    pub async fn init_application(
        &self,
        application_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<(), RosterError> {
        let application_id = application_id.into();
        if application_id.trim().is_empty() {
            return Err(RosterError::Validation("application id must not be empty".into()));
        }
        let previous = self.session.replace(Session::new(application_id.clone(), api_token));
        if previous.application_id != application_id {
            let entries = self.store().len();
            self.store().clear();
            tracing::info!(
                from = %previous.application_id,
                to = %application_id,
                entries,
                "application changed; user cache cleared"
            );
            emit_best_effort(
                self.dispatcher_sink(),
                ClientEvent::Cache(CacheEvent::Cleared { entries }),
            )
            .await;
        }
        Ok(())
    }

    pub async fn create_user(&self, params: UserCreationParams) -> Result<User, RosterError> {
        require_user_id(&params.user_id)?;
        let (operation, request) = self.prepare(UserRequest::Create(params))?;
        self.dispatcher.submit_user(operation, request).await
    }

    /// Create up to [`MAX_BATCH_SIZE`] users concurrently.
    ///
    /// The returned records are in the order of `params`. If any item fails the error is an
    /// `Aggregate` whose partial results keep the records that were created.
    pub async fn create_users(
        &self,
        params: Vec<UserCreationParams>,
    ) -> Result<Vec<User>, RosterError> {
        self.create_users_detailed(params).await?.into_result()
    }

    /// Like [`create_users`](Self::create_users) but with one outcome per item.
    pub async fn create_users_detailed(
        &self,
        params: Vec<UserCreationParams>,
    ) -> Result<BatchReport, RosterError> {
        if params.len() > MAX_BATCH_SIZE {
            return Err(RosterError::TooManyItems { provided: params.len(), max: MAX_BATCH_SIZE });
        }
        let items: Vec<BatchItem> = params
            .into_iter()
            .map(|params| {
                require_user_id(&params.user_id)?;
                self.build_request(&UserRequest::Create(params))
            })
            .collect();
        self.dispatcher.dispatch_detailed(UserRequest::CREATE_OPERATION, items).await
    }

    pub async fn update_user(&self, params: UserUpdateParams) -> Result<User, RosterError> {
        require_user_id(&params.user_id)?;
        let (operation, request) = self.prepare(UserRequest::Update(params))?;
        self.dispatcher.submit_user(operation, request).await
    }

    /// Fetch one user from the API and refresh the cache with it.
    pub async fn get_user(&self, user_id: &str) -> Result<User, RosterError> {
        require_user_id(user_id)?;
        let (operation, request) = self.prepare(UserRequest::GetById(user_id.to_string()))?;
        self.dispatcher.submit_user(operation, request).await
    }

    /// Fetch users whose nickname matches exactly.
    ///
    /// A blank nickname is rejected before anything is submitted. A query that matches
    /// nobody fails with `EmptyResult`.
    pub async fn get_users(&self, nickname: &str) -> Result<Vec<User>, RosterError> {
        if nickname.trim().is_empty() {
            return Err(RosterError::Validation("nickname must not be empty".into()));
        }
        let (operation, request) = self.prepare(UserRequest::ListByNickname {
            nickname: nickname.to_string(),
            limit: self.config.nickname_page_limit(),
        })?;
        let page: UsersPage = self.dispatcher.submit(operation, request).await?;
        if page.users.is_empty() {
            return Err(RosterError::EmptyResult(format!("no users with nickname {nickname:?}")));
        }
        for user in &page.users {
            self.store().upsert(user.clone());
        }
        Ok(page.users)
    }

    fn dispatcher_sink(&self) -> S {
        self.dispatcher.sink().clone()
    }
}

fn require_user_id(user_id: &str) -> Result<(), RosterError> {
    if user_id.is_empty() {
        return Err(RosterError::Validation("user_id must not be empty".into()));
    }
    Ok(())
}
