//! Context assembly for prompt construction
//!
//! Composes the prompt window, running summary, preferences, and persona
//! background of a session into one value. Assembly is a pure read; the
//! query text callers pass in is not used to rank or filter turns.

use crate::context::session::Turn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything a prompt needs to know about a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelevantContext {
    /// Most recent unfolded turns, oldest first
    pub recent_context: Vec<Turn>,
    /// Running summary of folded turns
    pub conversation_summary: Option<String>,
    /// Current preferences
    pub user_preferences: BTreeMap<String, Value>,
    /// Background of the persona bound to the session
    pub persona_context: Option<String>,
}

impl RelevantContext {
    /// Returns true if there is nothing to show a prompt
    pub fn is_empty(&self) -> bool {
        self.recent_context.is_empty()
            && self.conversation_summary.is_none()
            && self.user_preferences.is_empty()
            && self.persona_context.is_none()
    }

    /// Renders the context as plain-text blocks
    ///
    /// Empty sections are omitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use convokeep::context::{Role, Session, SessionKey};
    ///
    /// let mut session = Session::new(SessionKey::new("s1").unwrap());
    /// session.append(Role::Human, "My name is Alice.");
    /// let text = session.relevant_context(10).to_prompt_text();
    /// assert!(text.contains("User: My name is Alice."));
    /// ```
    pub fn to_prompt_text(&self) -> String {
        let mut sections = Vec::new();

        if let Some(persona) = &self.persona_context {
            sections.push(format!("Persona Context:\n{}", persona));
        }

        if let Some(summary) = &self.conversation_summary {
            sections.push(format!("Conversation Summary:\n{}", summary));
        }

        if !self.user_preferences.is_empty() {
            let lines: Vec<String> = self
                .user_preferences
                .iter()
                .map(|(key, value)| match value {
                    Value::String(s) => format!("- {}: {}", key, s),
                    other => format!("- {}: {}", key, other),
                })
                .collect();
            sections.push(format!("User Preferences:\n{}", lines.join("\n")));
        }

        if !self.recent_context.is_empty() {
            let lines: Vec<String> = self
                .recent_context
                .iter()
                .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
                .collect();
            sections.push(format!("Recent Conversation:\n{}", lines.join("\n")));
        }

        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::session::{Persona, Role, Session, SessionKey};
    use serde_json::json;

    #[test]
    fn test_empty_context_renders_nothing() {
        let context = RelevantContext::default();
        assert!(context.is_empty());
        assert_eq!(context.to_prompt_text(), "");
    }

    #[test]
    fn test_prompt_text_includes_all_sections() {
        let mut session = Session::new(SessionKey::new("s").unwrap());
        session.set_persona(Persona {
            id: "1".to_string(),
            name: "Tech Guru".to_string(),
            context: Some("Fifteen years in Silicon Valley".to_string()),
        });
        session.preferences_mut().set("weather_unit", json!("celsius"));
        session.preferences_mut().set("budget", json!(250));
        session.append(Role::Human, "Hi");
        session.append(Role::Assistant, "Hello!");

        let text = session.relevant_context(10).to_prompt_text();
        assert!(text.starts_with("Persona Context:\nFifteen years"));
        assert!(text.contains("- weather_unit: celsius"));
        assert!(text.contains("- budget: 250"));
        assert!(text.ends_with("User: Hi\nAssistant: Hello!"));
        assert!(!text.contains("Conversation Summary"));
    }
}
