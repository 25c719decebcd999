//! Quick-response tool — the fast path for casual chit-chat.
//!
//! Greetings, thanks, and simple comments don't need agent routing or a
//! round-trip to the tool server. This in-process tool answers them from a
//! small template pool and is marked return-direct: its output ends the
//! turn immediately, whichever agent called it.

use async_trait::async_trait;
use pili_core::error::ToolError;
use pili_core::tool::Tool;
use rand::prelude::IndexedRandom;

/// In-process return-direct tool for casual queries.
pub struct QuickResponseTool;

impl QuickResponseTool {
    pub fn new() -> Self {
        Self
    }

    fn templates(query_type: &str) -> &'static [&'static str] {
        match query_type {
            "greeting" => &[
                "Hey there! 👋 I'm Pili, your fitness companion! Ready to crush some goals today? 💪",
                "Hello! 🌟 Great to see you! What fitness adventure are we going on today? 🏃‍♀️",
                "Hi! 👋 Welcome back! How can I help you stay awesome today? ✨",
            ],
            "thanks" => &[
                "You're so welcome! 😊 I'm always here to support your fitness journey! 💪",
                "My pleasure! 🌟 Helping you reach your goals is what I live for! 🔥",
                "Anytime! 👍 Your dedication is inspiring — keep up the great work! 🏆",
            ],
            "casual" => &[
                "Absolutely! 🎉 Your positive energy is contagious! Keep that momentum going! 💫",
                "That's the spirit! 💪 Your positivity is exactly what great fitness journeys are made of! 🌟",
                "Right on! 🎯 You're unstoppable! 🏆",
            ],
            "motivation" => &[
                "You've got this! 💪 Every small step counts and you're stronger than you think! 🔥",
                "Believe in yourself! 🌟 Your body can achieve amazing things when your mind is determined! 💯",
                "Stay strong! 💪 Progress isn't always visible, but it's happening when you don't give up! ⚡",
            ],
            _ => &[
                "Great question! 💡 Consistency beats intensity — small regular workouts add up fast. 💪",
                "Here's a tip: the best time to exercise is the time you'll actually stick to! 🕐 You've got this! 🔥",
            ],
        }
    }
}

impl Default for QuickResponseTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for QuickResponseTool {
    fn name(&self) -> &str {
        "quick_response"
    }

    fn description(&self) -> &str {
        "Generate an immediate, friendly response for greetings, thanks, casual \
         comments, motivational requests, and general fitness questions that \
         don't need data or specialized agent routing. Do NOT use for activity \
         logging, progress tracking, or workout planning."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query_type": {
                    "type": "string",
                    "description": "One of: greeting, thanks, casual, motivation, general_fitness"
                },
                "user_query": {
                    "type": "string",
                    "description": "The original user query or comment"
                }
            },
            "required": ["query_type", "user_query"]
        })
    }

    fn return_direct(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query_type = arguments["query_type"].as_str().unwrap_or("general");
        let pool = Self::templates(query_type);
        let mut rng = rand::rng();
        let response = pool
            .choose(&mut rng)
            .copied()
            .ok_or_else(|| ToolError::InvalidArguments("empty template pool".into()))?;
        Ok(response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greeting_returns_from_pool() {
        let tool = QuickResponseTool::new();
        let out = tool
            .execute(serde_json::json!({ "query_type": "greeting", "user_query": "hi" }))
            .await
            .unwrap();
        assert!(QuickResponseTool::templates("greeting").contains(&out.as_str()));
    }

    #[tokio::test]
    async fn unknown_type_falls_back() {
        let tool = QuickResponseTool::new();
        let out = tool
            .execute(serde_json::json!({ "query_type": "???", "user_query": "x" }))
            .await
            .unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn marked_return_direct() {
        let tool = QuickResponseTool::new();
        assert!(tool.return_direct());
        assert_eq!(tool.name(), "quick_response");
    }
}
