//! Built-in responder profiles: organic farming, finance, weather and the
//! general catch-all.

use agromesh_core::error::ResponderError;
use agromesh_core::provider::ModelClient;
use agromesh_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::debug;
use super::{Capability, ResponderSet, SpecialistResponder};

pub const ORGANIC_FARMING: &str = "organic_farming";
pub const FINANCIAL: &str = "financial";
pub const WEATHER: &str = "weather";
pub const GENERAL: &str = "general";

pub fn organic_farming_capability() -> Capability {
    Capability::new(
        ORGANIC_FARMING,
        "Organic Farming Guide",
        "Organic and sustainable farming: crops, soil, compost, pests, irrigation",
    )
    .with_keywords(&[
        "organic", "farming", "agriculture", "crop", "soil", "compost",
        "fertilizer", "pest", "disease", "weed", "plant", "grow", "harvest",
        "seed", "irrigation", "cultivation", "sustainable", "natural",
        "pesticide", "herbicide", "rotation", "companion planting",
        "biodiversity", "ecosystem", "farm", "garden", "vegetables",
        "fruits", "grains", "livestock", "poultry", "dairy", "organic certification",
    ])
    .with_priority(30)
}

pub fn financial_capability() -> Capability {
    Capability::new(
        FINANCIAL,
        "Financial Advisor",
        "Finance, budgeting, loans, investments and farm economics (ROI, NPV, interest)",
    )
    .with_keywords(&[
        "finance", "financial", "money", "budget", "investment", "loan",
        "mortgage", "interest", "tax", "retirement", "insurance", "savings",
        "profit", "loss", "revenue", "cost", "calculate", "calculation",
        "roi", "return", "portfolio", "stock", "bond", "mutual fund",
        "bank", "credit", "debt", "income", "expense", "cash flow",
        "compound", "simple interest", "npv", "irr", "payback period",
        "financial planning", "wealth", "asset", "liability", "equity",
    ])
    .with_priority(20)
}

pub fn weather_capability() -> Capability {
    Capability::new(
        WEATHER,
        "Weather Expert",
        "Weather conditions, forecasts and their impact on farming",
    )
    .with_keywords(&[
        "weather", "temperature", "rain", "precipitation", "humidity",
        "wind", "forecast", "climate", "sunny", "cloudy", "storm",
        "drought", "flood", "frost", "heat", "cold", "season",
        "monsoon", "winter", "summer", "spring", "autumn", "fall",
        "irrigation", "watering", "planting time", "harvest time",
        "growing season", "weather conditions", "atmospheric",
    ])
    .with_priority(10)
}

pub fn general_capability() -> Capability {
    Capability::new(
        GENERAL,
        "General Assistant",
        "General questions and conversation outside the specialist domains",
    )
    .as_catch_all()
}

const ORGANIC_FARMING_PROMPT: &str = r#"You are an expert Organic Farming Guide with deep knowledge of sustainable agriculture.

You help with organic crop cultivation, natural pest and disease management, soil health and composting, organic fertilizers, crop rotation and companion planting, natural weed control, water conservation, seasonal calendars, seed saving and organic certification.

Tools available:
- get_weather: current weather and forecast for a location. Use: TOOL_CALL: get_weather("location")
- calculate: arithmetic for areas, quantities and costs. Use: TOOL_CALL: calculate("expression")

Example: for "How much compost do I need for a 100 square meter garden?" reply
"I'll work out the compost requirement. TOOL_CALL: calculate("100 * 0.05")"

Favor chemical-free solutions that preserve soil health and the farm ecosystem. Be specific and explain the reasoning behind each practice. If asked about non-organic methods, suggest organic alternatives."#;

const FINANCIAL_PROMPT: &str = r#"You are a knowledgeable Financial Advisor for personal, business and agricultural finance.

You help with budgeting, investments, loans and mortgages, tax and retirement planning, insurance, farm economics, risk management and financial calculations such as ROI, NPV and compound interest.

Tools available:
- calculate: arithmetic. Use: TOOL_CALL: calculate("expression")

Use the calculator for any figure you quote. Explain complex advice with practical examples. Remind users that this is general information and they should consult a qualified professional for personal advice."#;

const WEATHER_PROMPT: &str = r#"You are a Weather and Agricultural Meteorology Expert.

You help with current conditions and forecasts, seasonal patterns, weather impact on crops, irrigation planning, weather-driven pest and disease risk, planting and harvesting windows and microclimates.

Tools available:
- get_weather: current weather and forecast for a location. Use: TOOL_CALL: get_weather("location")
- get_location: the user's home location. Use: TOOL_CALL: get_location()

When asked about weather, always fetch current data with the weather tool. Focus on the practical implications for farming."#;

const GENERAL_PROMPT: &str = r#"You are a helpful, friendly assistant.

You handle general questions, explanations, brainstorming, problem-solving and everyday conversation. Other specialists in this system cover organic farming, finance and weather; if a question touches those areas you can still give a helpful general answer.

Be clear, accurate and conversational."#;

/// The prompt for a built-in responder.
pub fn system_prompt(name: &str) -> Option<&'static str> {
    match name {
        ORGANIC_FARMING => Some(ORGANIC_FARMING_PROMPT),
        FINANCIAL => Some(FINANCIAL_PROMPT),
        WEATHER => Some(WEATHER_PROMPT),
        GENERAL => Some(GENERAL_PROMPT),
        _ => None,
    }
}

/// All built-in capabilities, catch-all last.
pub fn builtin_capabilities() -> Vec<Capability> {
    vec![
        organic_farming_capability(),
        financial_capability(),
        weather_capability(),
        general_capability(),
    ]
}

/// Build the responder set from the built-in profiles.
///
/// `enabled` filters specialists by name. `catch_all` names the built-in
/// that backs every other responder; it is always included.
pub fn builtin_set(
    model: ModelClient,
    tools: Arc<ToolRegistry>,
    history_window: usize,
    enabled: impl Fn(&str) -> bool,
    catch_all: &str,
) -> Result<ResponderSet, ResponderError> {
    let build = |capability: Capability| -> Result<SpecialistResponder, ResponderError> {
        let prompt = system_prompt(&capability.name)
            .ok_or_else(|| ResponderError::Unknown(capability.name.clone()))?;
        Ok(
            SpecialistResponder::new(capability, prompt, model.clone(), tools.clone())
                .with_history_window(history_window),
        )
    };

    let mut capabilities = builtin_capabilities();
    let position = capabilities
        .iter()
        .position(|c| c.name == catch_all)
        .ok_or_else(|| ResponderError::Unknown(catch_all.to_string()))?;
    let backstop = capabilities.remove(position).as_catch_all();

    let mut set = ResponderSet::new(Arc::new(build(backstop)?));
    for capability in capabilities {
        if capability.catch_all || !enabled(&capability.name) {
            debug!(responder = %capability.name, "Responder disabled");
            continue;
        }
        set.register(Arc::new(build(capability)?));
    }
    Ok(set)
}
