//! Built-in tool implementations for AgroMesh.
//!
//! Tools give responders and the reasoning loop the ability to do
//! arithmetic, check the weather, and look up the farm's location.
//! Each uses a different calling convention; the registry's adapter
//! smooths that over.

pub mod calculator;
pub mod location;
pub mod weather;

use agromesh_core::tool::ToolRegistry;

/// Create a default tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(location::descriptor());
    registry.register(weather::descriptor());
    registry.register_tool(calculator::CalculatorTool);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use agromesh_core::tool::ToolInput;

    #[test]
    fn default_registry_order() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["get_location", "get_weather", "calculate"]);
        assert!(registry.catalog().starts_with("- get_location: "));
    }

    #[tokio::test]
    async fn every_builtin_accepts_a_scalar() {
        let registry = default_registry();
        for (name, input) in [
            ("get_location", ""),
            ("get_weather", "Rajkot"),
            ("calculate", "6 * 7"),
        ] {
            let result = registry.invoke(name, ToolInput::from(input)).await.unwrap();
            assert!(result.success, "{name} failed: {}", result.output);
        }
    }
}
