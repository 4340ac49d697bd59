//! In-memory [`Transport`] with per-URL scripted responses.

use reqwest::header::{HeaderMap, USER_AGENT};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Result, ScrapeError};
use crate::fetch::Transport;

#[derive(Debug, Clone)]
enum Script {
    Serve(String),
    FailThenServe { remaining: u32, body: String },
    FailAlways,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, Script>,
    calls: HashMap<String, u32>,
    user_agents: Vec<String>,
}

/// Unscripted URLs answer with a 404.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.script(url, Script::Serve(body.to_string()));
    }

    pub fn fail_then_serve(&self, url: &str, failures: u32, body: &str) {
        self.script(
            url,
            Script::FailThenServe {
                remaining: failures,
                body: body.to_string(),
            },
        );
    }

    pub fn fail_always(&self, url: &str) {
        self.script(url, Script::FailAlways);
    }

    pub fn calls(&self, url: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.calls.get(url).copied().unwrap_or(0)
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.state.lock().unwrap().user_agents.clone()
    }

    fn script(&self, url: &str, script: Script) {
        self.state.lock().unwrap().scripts.insert(url.to_string(), script);
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, headers: &HeaderMap, _timeout: Duration) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(url.to_string()).or_default() += 1;
        if let Some(ua) = headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
            state.user_agents.push(ua.to_string());
        }

        let unavailable = || ScrapeError::Status {
            url: url.to_string(),
            status: 503,
        };
        match state.scripts.get_mut(url) {
            Some(Script::Serve(body)) => Ok(body.clone()),
            Some(Script::FailThenServe { remaining, body }) => {
                if *remaining == 0 {
                    Ok(body.clone())
                } else {
                    *remaining -= 1;
                    Err(unavailable())
                }
            }
            Some(Script::FailAlways) => Err(unavailable()),
            None => Err(ScrapeError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
