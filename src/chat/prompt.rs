//! System prompt assembly
//!
//! Builds the system prompt for a chat turn, appending a page-context
//! section when the client reported one.

use crate::chat::PageContext;

/// Base assistant persona and tool guidance
const SYSTEM_PROMPT: &str = "You are a helpful assistant with access to a simple tool for getting the current system date and time.

Available Tools:
- get_current_time: Returns the current system date and time in various formats (ISO, readable, timestamp, or all formats)

Guidelines:
- When users ask for the current time, date, or timestamp, use the get_current_time function
- You can specify different formats (iso, readable, timestamp, all) and timezones
- Be helpful and provide clear, formatted responses about time and date information
- If users ask about time in different timezones, use the timezone parameter

Image Processing Capabilities:
- You can analyze and understand images that users upload
- When processing images, extract relevant information and provide helpful descriptions";

/// Number of visible rows sampled into the context section
const CONTEXT_SAMPLE_ROWS: usize = 3;

/// Build the system prompt for a chat turn
///
/// # Arguments
///
/// * `context` - Page context reported by the client, if any
///
/// # Examples
///
/// ```
/// use workdesk::chat::build_system_prompt;
///
/// let prompt = build_system_prompt(None);
/// assert!(prompt.contains("get_current_time"));
/// assert!(!prompt.contains("Current Page Context"));
/// ```
pub fn build_system_prompt(context: Option<&PageContext>) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();

    if let Some(context) = context {
        let sample: Vec<_> = context
            .visible_data
            .iter()
            .take(CONTEXT_SAMPLE_ROWS)
            .collect();
        prompt.push_str(&format!(
            "\n\n## Current Page Context:\n- Total items: {}\n- Current filters: {}\n- Current sorting: {}\n- Visible data sample: {}",
            context.total_count,
            serde_json::to_string_pretty(&context.current_filters).unwrap_or_default(),
            serde_json::to_string_pretty(&context.current_sort).unwrap_or_default(),
            serde_json::to_string_pretty(&sample).unwrap_or_default(),
        ));
    }

    prompt
}
