//! The complexity router decides how a query is answered.
//!
//! A small, cheap model classifies the query first. When its reply cannot
//! be parsed (or the call fails) a deterministic keyword policy takes
//! over, folding over the registered capability descriptors. Either path
//! always names at least one responder for `SIMPLE` decisions.

use agromesh_core::message::{ConversationContext, Message};
use agromesh_core::provider::ModelClient;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use crate::responders::ResponderSet;

/// Prior turns shown to the classifier.
const ROUTER_CONTEXT_WINDOW: usize = 4;

static MODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)MODE:\s*\**\s*(SIMPLE|ITERATIVE)").expect("mode pattern is valid")
});
static AGENTS_BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)AGENTS:\s*\[(.*?)\]").expect("agents pattern is valid")
});
static AGENTS_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)AGENTS:[ \t]*([A-Za-z_, "']+)"#).expect("agents pattern is valid")
});
static PARALLEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)PARALLEL:\s*\[?\s*(yes|no|true|false)").expect("parallel pattern is valid")
});
static REASONING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)REASONING:\s*(.*)").expect("reasoning pattern is valid")
});
static COMPLEXITY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:calculate|analyze|analyse|compare|plan|roi|estimate)\b")
        .expect("complexity pattern is valid")
});
static WEATHER_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:weather|forecast|temperature|rain|humidity)\b")
        .expect("weather pattern is valid")
});
static LOCATION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Ii]n|[Aa]t|[Ff]or|[Nn]ear)\s+[A-Z]").expect("location pattern is valid")
});

/// How a query gets answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingMode {
    /// Direct dispatch to one or more responders.
    Simple,
    /// The bounded reason/act/observe loop.
    Iterative,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Iterative => "ITERATIVE",
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The router's verdict for one query. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub mode: RoutingMode,
    /// Responder names in dispatch order. Empty for `ITERATIVE`.
    pub agents: Vec<String>,
    pub parallel: bool,
    pub reasoning: String,
    /// Produced by the keyword policy rather than the classifier.
    #[serde(default)]
    pub fallback: bool,
}

impl RoutingDecision {
    pub fn simple(agents: Vec<String>, parallel: bool, reasoning: impl Into<String>) -> Self {
        Self {
            mode: RoutingMode::Simple,
            agents,
            parallel,
            reasoning: reasoning.into(),
            fallback: false,
        }
    }

    pub fn iterative(reasoning: impl Into<String>) -> Self {
        Self {
            mode: RoutingMode::Iterative,
            agents: Vec::new(),
            parallel: false,
            reasoning: reasoning.into(),
            fallback: false,
        }
    }

    pub fn is_iterative(&self) -> bool {
        self.mode == RoutingMode::Iterative
    }
}

/// Parse a classifier reply.
///
/// Returns `None` when the reply names neither a mode nor a usable agent,
/// or says `SIMPLE` without naming any registered responder.
pub fn parse_classification(text: &str, responders: &ResponderSet) -> Option<RoutingDecision> {
    let mode = MODE.captures(text).map(|c| {
        if c[1].eq_ignore_ascii_case("ITERATIVE") {
            RoutingMode::Iterative
        } else {
            RoutingMode::Simple
        }
    });
    let reasoning = REASONING
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    if mode == Some(RoutingMode::Iterative) {
        return Some(RoutingDecision::iterative(reasoning));
    }

    let raw_agents = AGENTS_BRACKETED
        .captures(text)
        .or_else(|| AGENTS_BARE.captures(text))
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let mut agents: Vec<String> = Vec::new();
    for name in raw_agents.split(',') {
        let name = name
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_lowercase();
        if name.is_empty() || agents.contains(&name) {
            continue;
        }
        if responders.get(&name).is_some() {
            agents.push(name);
        } else {
            debug!(agent = %name, "Classifier named an unknown responder");
        }
    }
    if agents.is_empty() {
        return None;
    }

    let parallel = PARALLEL
        .captures(text)
        .map(|c| matches!(c[1].to_lowercase().as_str(), "yes" | "true"))
        .unwrap_or(false);
    Some(RoutingDecision::simple(agents, parallel, reasoning))
}

/// Classifies queries and picks responders.
pub struct ComplexityRouter {
    model: ModelClient,
    responders: Arc<ResponderSet>,
    max_parallel_agents: usize,
    parallel_enabled: bool,
}

impl ComplexityRouter {
    pub fn new(model: ModelClient, responders: Arc<ResponderSet>) -> Self {
        Self {
            model,
            responders,
            max_parallel_agents: 3,
            parallel_enabled: true,
        }
    }

    pub fn with_max_parallel_agents(mut self, max: usize) -> Self {
        self.max_parallel_agents = max.max(1);
        self
    }

    pub fn with_parallel_enabled(mut self, enabled: bool) -> Self {
        self.parallel_enabled = enabled;
        self
    }

    pub fn responders(&self) -> &Arc<ResponderSet> {
        &self.responders
    }

    /// Route a query. Never fails: classifier trouble means keyword routing.
    pub async fn route(&self, query: &str, context: &ConversationContext) -> RoutingDecision {
        let mut messages = vec![Message::system(self.classification_prompt())];
        messages.extend(context.truncated(ROUTER_CONTEXT_WINDOW).messages().iter().cloned());
        messages.push(Message::user(format!("Route this query: {query}")));

        let decision = match self.model.invoke(messages).await {
            Ok(reply) => match parse_classification(&reply, &self.responders) {
                Some(decision) => decision,
                None => {
                    warn!("Could not parse classifier reply, using keyword routing");
                    debug!(reply = %reply, "Unparsed classifier reply");
                    self.fallback(query)
                }
            },
            Err(e) => {
                warn!(error = %e, "Classifier call failed, using keyword routing");
                self.fallback(query)
            }
        };

        let decision = self.finalize(decision);
        info!(
            mode = %decision.mode,
            agents = ?decision.agents,
            parallel = decision.parallel,
            fallback = decision.fallback,
            "Query routed"
        );
        decision
    }

    /// The deterministic keyword policy. Pure: same query, same decision.
    pub fn fallback(&self, query: &str) -> RoutingDecision {
        let mut decision = if COMPLEXITY_WORDS.is_match(query) {
            RoutingDecision::iterative(
                "Fallback routing: the query asks for multi-step work (calculation, analysis or planning).",
            )
        } else if WEATHER_WORDS.is_match(query) && !LOCATION_TOKEN.is_match(query) {
            RoutingDecision::iterative(
                "Fallback routing: weather question without a location, the location has to be looked up first.",
            )
        } else {
            let mut matching: Vec<_> = self
                .responders
                .specialists()
                .iter()
                .filter(|r| r.capability().can_handle(query))
                .collect();
            matching.sort_by_key(|r| std::cmp::Reverse(r.capability().priority));

            let mut agents: Vec<String> = matching.iter().map(|r| r.name().to_string()).collect();
            if agents.is_empty() {
                agents.push(self.responders.catch_all().name().to_string());
            }
            let parallel = agents.len() > 1;
            let reasoning = format!(
                "Fallback routing based on keyword matching. Found {} matching responder(s).",
                agents.len()
            );
            RoutingDecision::simple(agents, parallel, reasoning)
        };
        decision.fallback = true;
        self.finalize(decision)
    }

    fn finalize(&self, mut decision: RoutingDecision) -> RoutingDecision {
        if decision.is_iterative() {
            decision.agents.clear();
            decision.parallel = false;
            return decision;
        }
        if decision.agents.is_empty() {
            decision.agents.push(self.responders.catch_all().name().to_string());
        }
        decision.agents.truncate(self.max_parallel_agents);
        decision.parallel &= self.parallel_enabled && decision.agents.len() > 1;
        decision
    }

    fn classification_prompt(&self) -> String {
        let catalog = self
            .responders
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {} - {}", i + 1, r.name(), r.capability().description))
            .collect::<Vec<_>>()
            .join("\n");
        let catch_all = self.responders.catch_all().name();

        format!(
            r#"You are a query router. Decide how a user query should be answered.

Available responders:
{catalog}

Choose one mode:
- SIMPLE: one or more responders can answer directly from their knowledge or a single lookup.
- ITERATIVE: the query needs several steps, tool use or calculations building on each other.

Respond in exactly this format:
MODE: SIMPLE or ITERATIVE
AGENTS: [name1, name2]  (only for SIMPLE)
PARALLEL: yes or no  (whether the responders can work independently)
REASONING: one sentence explaining the decision

Examples:
- "What's the weather in Mumbai?" -> MODE: SIMPLE, AGENTS: [weather], PARALLEL: no
- "How much profit can I make from organic tomatoes?" -> MODE: SIMPLE, AGENTS: [organic_farming, financial], PARALLEL: yes
- "Check the weather and calculate the ROI of my farm" -> MODE: ITERATIVE
- "Hello, how are you?" -> MODE: SIMPLE, AGENTS: [{catch_all}], PARALLEL: no"#
        )
    }
}
