//! In-memory fake of the user API.
//!
//! Serves the four user routes over a `BTreeMap`, the way the remote service would answer
//! them: 200 with the record, 400 on duplicate ids or malformed bodies, 401 without a token,
//! 404 for unknown users or routes. Latency and transport failures can be injected per
//! request, and every received request is recorded for inspection.

use crate::executor::RequestExecutor;
use crate::model::{User, UserCreationParams, UserUpdateParams, UsersPage};
use crate::request::{ApiRequest, ApiResponse, Method};
use crate::RosterError;
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type LatencyFn = Arc<dyn Fn(&ApiRequest) -> Duration + Send + Sync>;

enum Latency {
    Zero,
    Fixed(Duration),
    Random { min: Duration, max: Duration, rng: Mutex<StdRng> },
    Custom(LatencyFn),
}

impl Latency {
    fn for_request(&self, request: &ApiRequest) -> Duration {
        match self {
            Latency::Zero => Duration::ZERO,
            Latency::Fixed(d) => *d,
            Latency::Random { min, max, rng } => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                rng.random_range(*min..=*max)
            }
            Latency::Custom(f) => f(request),
        }
    }
}

impl fmt::Debug for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Zero => f.write_str("Zero"),
            Latency::Fixed(d) => write!(f, "Fixed({d:?})"),
            Latency::Random { min, max, .. } => write!(f, "Random({min:?}..={max:?})"),
            Latency::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

#[derive(Debug, Default)]
struct FakeApi {
    users: BTreeMap<String, User>,
    failing: HashSet<String>,
    requests: Vec<ApiRequest>,
}

/// Fake user API backed by memory.
#[derive(Debug)]
pub struct InMemoryExecutor {
    api: Mutex<FakeApi>,
    latency: Latency,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for InMemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self {
            api: Mutex::new(FakeApi::default()),
            latency: Latency::Zero,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Latency::Fixed(latency);
        self
    }

    /// Delay each response by a seeded random amount in `min..=max`.
    pub fn with_random_latency(mut self, min: Duration, max: Duration, seed: u64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.latency = Latency::Random { min, max, rng: Mutex::new(StdRng::seed_from_u64(seed)) };
        self
    }

    /// Compute each response delay from the request.
    pub fn with_latency_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ApiRequest) -> Duration + Send + Sync + 'static,
    {
        self.latency = Latency::Custom(Arc::new(f));
        self
    }

    /// Pre-populate the server side.
    pub fn with_users<I>(self, users: I) -> Self
    where
        I: IntoIterator<Item = User>,
    {
        {
            let mut api = self.lock();
            for user in users {
                api.users.insert(user.user_id.clone(), user);
            }
        }
        self
    }

    /// Make every request that targets `user_id` fail with a transport error.
    pub fn fail_user(&self, user_id: impl Into<String>) {
        self.lock().failing.insert(user_id.into());
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Server-side record for `user_id`.
    pub fn stored_user(&self, user_id: &str) -> Option<User> {
        self.lock().users.get(user_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, FakeApi> {
        self.api.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, request: &ApiRequest) -> Result<ApiResponse, RosterError> {
        if request.header("Api-Token").unwrap_or_default().is_empty() {
            return Ok(error_response(401, "missing api token"));
        }
        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.map(|seg| percent_decode_str(seg).decode_utf8_lossy().into_owned()).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let mut api = self.lock();
        match (request.method, segments.as_slice()) {
            (Method::Post, ["v3", "users"]) => {
                let params: UserCreationParams = match decode_body(request) {
                    Ok(params) => params,
                    Err(response) => return Ok(response),
                };
                api.check_failure(&params.user_id)?;
                if api.users.contains_key(&params.user_id) {
                    return Ok(error_response(400, "user_id is already taken"));
                }
                let user = User {
                    user_id: params.user_id,
                    nickname: params.nickname,
                    profile_url: params.profile_url,
                };
                api.users.insert(user.user_id.clone(), user.clone());
                Ok(user_response(&user))
            }
            (Method::Put, ["v3", "users", user_id]) => {
                api.check_failure(user_id)?;
                let params: UserUpdateParams = match decode_body(request) {
                    Ok(params) => params,
                    Err(response) => return Ok(response),
                };
                let Some(user) = api.users.get_mut(*user_id) else {
                    return Ok(error_response(404, "user not found"));
                };
                if let Some(nickname) = params.nickname {
                    user.nickname = nickname;
                }
                if let Some(profile_url) = params.profile_url {
                    user.profile_url = Some(profile_url);
                }
                Ok(user_response(user))
            }
            (Method::Get, ["v3", "users", user_id]) => {
                api.check_failure(user_id)?;
                match api.users.get(*user_id) {
                    Some(user) => Ok(user_response(user)),
                    None => Ok(error_response(404, "user not found")),
                }
            }
            (Method::Get, ["v3", "users"]) => {
                let nickname = request.query_param("nickname");
                let limit = request
                    .query_param("limit")
                    .and_then(|l| l.parse::<usize>().ok())
                    .unwrap_or(10);
                let users: Vec<User> = api
                    .users
                    .values()
                    .filter(|u| match &nickname {
                        Some(n) => &u.nickname == n,
                        None => true,
                    })
                    .take(limit)
                    .cloned()
                    .collect();
                let page = UsersPage { users };
                Ok(ApiResponse::from_json(200, &json!(page)))
            }
            _ => Ok(error_response(404, "no such route")),
        }
    }
}

impl FakeApi {
    fn check_failure(&self, user_id: &str) -> Result<(), RosterError> {
        if self.failing.contains(user_id) {
            return Err(RosterError::Transport(format!("injected failure for user {user_id}")));
        }
        Ok(())
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(request: &ApiRequest) -> Result<T, ApiResponse> {
    let body = request.body.as_deref().unwrap_or_default();
    serde_json::from_slice(body).map_err(|e| error_response(400, &format!("invalid body: {e}")))
}

fn user_response(user: &User) -> ApiResponse {
    ApiResponse::from_json(200, &json!(user))
}

fn error_response(status: u16, message: &str) -> ApiResponse {
    ApiResponse::from_json(status, &json!({ "error": true, "code": status, "message": message }))
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RequestExecutor for InMemoryExecutor {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RosterError> {
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);
        self.lock().requests.push(request.clone());

        let delay = self.latency.for_request(&request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let response = self.respond(&request);
        tracing::trace!(
            method = %request.method,
            url = %request.url,
            ok = response.as_ref().map(ApiResponse::is_success).unwrap_or(false),
            "fake api answered"
        );
        response
    }
}
