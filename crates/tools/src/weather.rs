//! Weather tool — deterministic mock weather keyed by location.
//!
//! In production this would call a real weather API. The mock returns
//! plausible, stable data so responders and the reasoning loop can be
//! exercised end-to-end without network access.
//!
//! Registered as a positional callable: it takes the location itself,
//! not a keyword mapping.

use agromesh_core::error::ToolError;
use agromesh_core::tool::{ToolDescriptor, ToolResult};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

pub const NAME: &str = "get_weather";

/// Used when the caller gives no location.
pub const DEFAULT_LOCATION: &str = "Baroda, Jamjodhpur";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::positional(
        NAME,
        "Get current weather and a two-day forecast for a location. Input: the location name (defaults to Baroda, Jamjodhpur).",
        |location: Value| async move { lookup(location) },
    )
}

fn lookup(location: Value) -> Result<ToolResult, ToolError> {
    let location = match location {
        Value::Null => DEFAULT_LOCATION.to_string(),
        Value::String(s) if s.trim().is_empty() => DEFAULT_LOCATION.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(ToolError::InvalidArguments(format!(
                "location must be text, got {other}"
            )))
        }
    };

    let report = generate_mock_weather(&location);
    info!(location = %location, "Retrieved weather data");
    let data = serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
        tool_name: NAME.into(),
        reason: e.to_string(),
    })?;
    Ok(ToolResult::json(data))
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    location: String,
    temperature: Temperature,
    humidity: u32,
    wind_speed: u32,
    conditions: &'static str,
    visibility: &'static str,
    uv_index: u32,
    forecast: [ForecastDay; 2],
}

#[derive(Debug, Serialize)]
struct Temperature {
    current: u32,
    feels_like: u32,
    min: u32,
    max: u32,
}

#[derive(Debug, Serialize)]
struct ForecastDay {
    day: &'static str,
    high: u32,
    low: u32,
    condition: &'static str,
}

const CONDITIONS: [&str; 4] = ["Sunny", "Partly Cloudy", "Cloudy", "Light Rain"];

/// Generate deterministic mock weather based on location name hash.
fn generate_mock_weather(location: &str) -> WeatherReport {
    let hash: u32 = location
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    // Value in lo..=hi drawn from a different slice of the hash each time.
    let pick = |shift: u32, lo: u32, hi: u32| lo + (hash.rotate_right(shift) % (hi - lo + 1));

    let current = pick(0, 25, 35);
    WeatherReport {
        location: location.to_string(),
        temperature: Temperature {
            current,
            feels_like: current + pick(3, 0, 3),
            min: pick(6, 20, 25),
            max: pick(9, 35, 42),
        },
        humidity: pick(12, 40, 80),
        wind_speed: pick(15, 5, 20),
        conditions: CONDITIONS[(hash as usize / 7) % CONDITIONS.len()],
        visibility: "10 km",
        uv_index: pick(18, 3, 8),
        forecast: [
            ForecastDay {
                day: "Today",
                high: pick(21, 35, 42),
                low: pick(24, 20, 25),
                condition: "Sunny",
            },
            ForecastDay {
                day: "Tomorrow",
                high: pick(27, 33, 40),
                low: pick(30, 22, 27),
                condition: "Partly Cloudy",
            },
        ],
    }
}
