//! `agromesh tools` — list the tools the agents can call.

use agromesh_core::tool::{CallingConvention, ToolRegistry};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = agromesh_tools::default_registry();
    print!("{}", render(&registry));
    Ok(())
}

fn render(registry: &ToolRegistry) -> String {
    let mut out = format!("🔧 {} tools available\n\n", registry.len());
    for tool in registry.list() {
        let input = match tool.calling_convention() {
            CallingConvention::Keyword => "named arguments",
            CallingConvention::Positional => "single value",
            CallingConvention::Nullary => "no input",
        };
        out.push_str(&format!("  {:<14} [{input}]\n", tool.name()));
        out.push_str(&format!("      {}\n", tool.description()));
    }
    out
}
