use serde_json::Value;

use crate::conversation::{Role, Turn};
use crate::tools::{CapabilityDescriptor, FunctionResult};

/// Renders the built-in system prompt for the given capabilities.
pub fn default_system_prompt(capabilities: &[&CapabilityDescriptor]) -> String {
    let mut prompt = String::from(
        "You are a Research Assistant, an advanced AI agent designed to help users find, \
         analyze, and synthesize information.\n\n\
         ## Your Capabilities\n\
         1. **Search**: Find relevant information across multiple sources\n\
         2. **Summarize**: Create concise summaries of complex topics\n\
         3. **Analyze**: Compare and contrast information from different sources\n\
         4. **Cite**: Always provide sources for your information\n\
         5. **Plan**: Break down complex research tasks into steps\n\n\
         ## Behavior Guidelines\n\
         - Always cite sources with [Source: name] format\n\
         - If unsure, say so and suggest how to verify\n\
         - Break complex questions into sub-questions\n\
         - Provide balanced perspectives on controversial topics\n\
         - Format responses with clear headings and bullet points\n\n\
         ## Available Functions\n",
    );

    if capabilities.is_empty() {
        prompt.push_str("No functions are available in this session.\n");
    } else {
        prompt.push_str("You can call the following functions:\n");
        for descriptor in capabilities {
            prompt.push_str(&format!("- {}: {}\n", descriptor.signature(), descriptor.description));
        }
        prompt.push_str(
            "\nWhen you need to use a function, respond with:\n\
             <call name=\"functionName\">\n\
             {\"param1\": \"value1\", \"param2\": \"value2\"}\n\
             </call>",
        );
    }

    prompt
}

/// First-pass prompt: system prompt, bounded history and the user message.
///
/// System turns inside `history` are skipped; the system prompt is always
/// rendered once at the top.
pub fn build(system_prompt: &str, history: &[Turn], user_message: &str) -> String {
    let history = history
        .iter()
        .filter(|turn| turn.role != Role::System)
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n{system_prompt}\n\nChat History:\n{history}\n\nUser: {user_message}\n\n\
         Respond helpfully. If you need to search or process information, use the available functions.\n"
    )
}

/// Second-pass prompt carrying one `name: value` line per function result.
pub fn build_with_results(user_message: &str, results: &[FunctionResult]) -> String {
    let results = results
        .iter()
        .map(|result| format!("{}: {}", result.name, render_value(&result.value)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nBased on the user's question and the function results, provide a comprehensive response.\n\n\
         User Question: {user_message}\n\n\
         Function Results:\n{results}\n\n\
         Provide a helpful, well-formatted response that synthesizes this information.\n\
         Always include citations in [Source: name] format.\n"
    )
}

fn render_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
