use std::time::Duration;

use toolz_core::identity::{Identity, SYSTEM_USER_ID};
use toolz_pipeline::HookKeys;
use toolz_worker::dispatcher::DEFAULT_POOL_SIZE;

/// Which [`VcsService`](toolz_vcs::VcsService) implementation the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsBackendKind {
    /// The REST API at `vcs_base_url`.
    Rest,
    /// In-process recording backend, for dry runs.
    Memory,
}

impl std::str::FromStr for VcsBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(VcsBackendKind::Rest),
            "memory" => Ok(VcsBackendKind::Memory),
            other => Err(format!("unknown VCS backend '{other}' (expected rest or memory)")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development against a VCS
/// service on `localhost:7990`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for draining background work on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub vcs_backend: VcsBackendKind,
    pub vcs_base_url: String,
    /// Timeout of a single outbound VCS call in seconds (default: `60`).
    pub vcs_request_timeout_secs: u64,
    /// Identity all jobs and ref tasks run as.
    pub system_user: Identity,
    /// Worker count of the ref-task dispatcher (default: `16`).
    pub dispatcher_pool_size: usize,
    pub hook_keys: HookKeys,
    /// Shared secret for `X-Hub-Signature`; unset disables verification.
    pub webhook_secret: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                                       |
    /// |----------------------------|-----------------------------------------------|
    /// | `HOST`                     | `0.0.0.0`                                     |
    /// | `PORT`                     | `3000`                                        |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                                          |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                                          |
    /// | `VCS_BACKEND`              | `rest`                                        |
    /// | `VCS_BASE_URL`             | `http://localhost:7990`                       |
    /// | `VCS_REQUEST_TIMEOUT_SECS` | `60`                                          |
    /// | `SYSTEM_USER_ID`           | `1`                                           |
    /// | `SYSTEM_USER_SLUG`         | `admin`                                       |
    /// | `SYSTEM_USER_TOKEN`        | unset                                         |
    /// | `DISPATCHER_POOL_SIZE`     | `16`                                          |
    /// | `GUARD_HOOK_KEY`           | `io.reconquest.snake:snake-merge-check-hook`  |
    /// | `POST_RECEIVE_HOOK_KEY`    | `io.reconquest.toolz:post-receive-hook`       |
    /// | `WEBHOOK_SECRET`           | unset                                         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let vcs_backend: VcsBackendKind = std::env::var("VCS_BACKEND")
            .unwrap_or_else(|_| "rest".into())
            .parse()
            .unwrap_or_else(|e| panic!("VCS_BACKEND is invalid: {e}"));

        let vcs_base_url =
            std::env::var("VCS_BASE_URL").unwrap_or_else(|_| "http://localhost:7990".into());

        let vcs_request_timeout_secs: u64 = std::env::var("VCS_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("VCS_REQUEST_TIMEOUT_SECS must be a valid u64");

        let system_user_id: u64 = std::env::var("SYSTEM_USER_ID")
            .map(|v| v.parse().expect("SYSTEM_USER_ID must be a valid u64"))
            .unwrap_or(SYSTEM_USER_ID);
        let system_user_slug =
            std::env::var("SYSTEM_USER_SLUG").unwrap_or_else(|_| "admin".into());
        let mut system_user = Identity::new(system_user_id, system_user_slug);
        if let Some(token) = non_empty_var("SYSTEM_USER_TOKEN") {
            system_user = system_user.with_token(token);
        }

        let dispatcher_pool_size: usize = std::env::var("DISPATCHER_POOL_SIZE")
            .map(|v| v.parse().expect("DISPATCHER_POOL_SIZE must be a valid usize"))
            .unwrap_or(DEFAULT_POOL_SIZE);

        let hook_keys = HookKeys {
            guard: std::env::var("GUARD_HOOK_KEY")
                .unwrap_or_else(|_| HookKeys::DEFAULT_GUARD.into()),
            post_receive: std::env::var("POST_RECEIVE_HOOK_KEY")
                .unwrap_or_else(|_| HookKeys::DEFAULT_POST_RECEIVE.into()),
        };

        let webhook_secret = non_empty_var("WEBHOOK_SECRET");

        Self {
            host,
            port,
            request_timeout_secs,
            shutdown_timeout_secs,
            vcs_backend,
            vcs_base_url,
            vcs_request_timeout_secs,
            system_user,
            dispatcher_pool_size,
            hook_keys,
            webhook_secret,
        }
    }

    pub fn vcs_request_timeout(&self) -> Duration {
        Duration::from_secs(self.vcs_request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
