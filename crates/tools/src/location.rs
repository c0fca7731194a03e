//! Location tool — the farm's static home location.
//!
//! Takes no arguments. Anything the model passes is ignored.

use agromesh_core::tool::{ToolDescriptor, ToolResult};
use serde_json::json;
use tracing::info;

pub const NAME: &str = "get_location";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::nullary(
        NAME,
        "Get the user's current location (city, district, state, coordinates, timezone, climate). Takes no input.",
        || async {
            info!("Retrieved location data");
            Ok(ToolResult::json(home_location()))
        },
    )
}

fn home_location() -> serde_json::Value {
    json!({
        "city": "Baroda",
        "district": "Jamjodhpur",
        "state": "Gujarat",
        "country": "India",
        "coordinates": { "latitude": 22.3072, "longitude": 73.1812 },
        "timezone": "Asia/Kolkata",
        "elevation": "39 meters above sea level",
        "climate": "Semi-arid"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agromesh_core::tool::{CallingConvention, ToolInput};

    #[tokio::test]
    async fn returns_static_location_whatever_the_input() {
        let tool = descriptor();
        assert_eq!(tool.calling_convention(), CallingConvention::Nullary);

        let a = tool.invoke(ToolInput::Absent).await.unwrap();
        let b = tool.invoke(ToolInput::from("where am I?")).await.unwrap();
        assert_eq!(a.output, b.output);

        let data = a.data.unwrap();
        assert_eq!(data["city"], "Baroda");
        assert_eq!(data["timezone"], "Asia/Kolkata");
    }
}
