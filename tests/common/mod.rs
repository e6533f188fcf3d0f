//! Shared helpers for integration tests
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use workdesk::auth::StaticAuthVerifier;
use workdesk::config::Config;
use workdesk::files::MemoryObjectStore;
use workdesk::providers::{
    ChatProvider, GenerationParams, Message, ProviderKind, ProviderTurn, ToolCall,
};
use workdesk::server::AppState;
use workdesk::sessions::{EvictionPolicy, MemorySessionStore, SessionManager};
use workdesk::tools::Tool;
use workdesk::Result;

/// Token accepted by the test auth verifier
pub const TEST_TOKEN: &str = "test-token";

/// User id behind [`TEST_TOKEN`]
pub const TEST_USER: &str = "user-1";

/// Provider that returns scripted turns in order, then a plain final
/// answer once the script runs out.
pub struct ScriptedProvider {
    name: &'static str,
    turns: Mutex<Vec<ProviderTurn>>,
    pub calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, turns: Vec<ProviderTurn>) -> Self {
        Self {
            name,
            turns: Mutex::new(turns),
            calls: Mutex::new(0),
        }
    }

    pub fn text(name: &'static str, text: &str) -> Self {
        Self::new(
            name,
            vec![ProviderTurn {
                text: text.to_string(),
                ..ProviderTurn::default()
            }],
        )
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(
        &self,
        _transcript: &[Message],
        _tools: &[Tool],
        _params: &GenerationParams,
    ) -> Result<ProviderTurn> {
        *self.calls.lock().unwrap() += 1;
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            Ok(ProviderTurn {
                text: "Done".to_string(),
                ..ProviderTurn::default()
            })
        } else {
            Ok(turns.remove(0))
        }
    }
}

/// A provider turn that requests one tool call
pub fn tool_call_turn(id: &str, name: &str, args: serde_json::Value) -> ProviderTurn {
    ProviderTurn {
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args,
        }],
        ..ProviderTurn::default()
    }
}

/// App state over in-memory stores with the given provider serving every
/// chat endpoint
pub fn test_state_with_provider(provider: Arc<dyn ChatProvider>) -> AppState {
    let config = Config::default();
    let auth = Arc::new(StaticAuthVerifier::new().with_user(TEST_TOKEN, TEST_USER));
    let store = Arc::new(MemoryObjectStore::new());
    let sessions = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        EvictionPolicy::default(),
    );

    let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();
    for kind in ProviderKind::ALL {
        providers.insert(kind, Arc::clone(&provider));
    }

    AppState::new(config, auth, store, sessions, providers).expect("state construction")
}

/// App state whose providers all answer with a fixed text
pub fn test_state() -> AppState {
    test_state_with_provider(Arc::new(ScriptedProvider::text("scripted", "Hello!")))
}
