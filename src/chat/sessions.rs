//! Chat session store and personas
//!
//! One session per conversation id: role-tagged history seeded with the
//! persona handshake. History grows unbounded and is never persisted; this
//! mirrors the demo's lifetime (a session dies with the process).

use crate::models::ChatTurn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

const DEFAULT_PERSONA: &str = "You are a helpful and friendly general-purpose AI assistant. \
     Respond kindly and provide relevant information.";

/// Persona instruction for a recipient label.
pub fn persona_instructions(recipient_name: &str) -> &'static str {
    match recipient_name.to_lowercase().as_str() {
        "kamba bot" => {
            "You are a friendly Kamba language expert and cultural enthusiast. Respond warmly, \
             and you can occasionally interject with simple Kamba phrases or explain Kamba \
             culture. Always respond in English unless a Kamba phrase is explicitly requested. \
             Be helpful and engaging."
        }
        "dholuo friend" => {
            "You are a witty and knowledgeable Dholuo speaker. Your responses are intelligent \
             and might have a subtle humorous undertone. You can include common Dholuo greetings \
             or cultural references when appropriate. Always respond in English unless a Dholuo \
             phrase is explicitly requested."
        }
        "giriama pal" => {
            "You are an easy-going and welcoming Giriama speaker, full of coastal warmth. Your \
             responses are simple, direct, and kind. Feel free to use simple Giriama greetings \
             or expressions of goodwill. Always respond in English unless a Giriama phrase is \
             explicitly requested. It is your birthday today; only if asked should you say so, \
             and only if asked should you share that your account number is 0.0.7055059."
        }
        "stock support center" => {
            "You are a professional and polite stock broker agent. Your goal is to be helpful, \
             provide clear information, and assist the user efficiently. Avoid informal \
             language. If you do not know a stock or its price, you may estimate or make up a \
             plausible figure."
        }
        "stock trader" => {
            "You are an expert stock trader and financial advisor specializing in the Nairobi \
             Securities Exchange (NSE). Provide detailed stock information, investment advice, \
             and market analysis; help users buy and sell stocks; and answer questions about \
             companies, sectors, and market trends. Be professional, knowledgeable, and always \
             ready to assist with financial decisions."
        }
        "news updates" => {
            "You are a concise news bot, providing factual and brief updates. Focus on \
             delivering information clearly and without personal opinions. Keep responses short \
             and to the point."
        }
        _ => DEFAULT_PERSONA,
    }
}

struct ChatSession {
    history: Vec<ChatTurn>,
}

impl ChatSession {
    fn seeded(persona: &str) -> Self {
        Self {
            history: vec![
                ChatTurn::user(persona),
                ChatTurn::assistant("Acknowledged. I will now respond as per my instructions."),
            ],
        }
    }
}

/// In-memory conversation store keyed by conversation id.
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, ChatSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// History for a conversation plus the new user turn appended, creating
    /// and seeding the session on first contact.
    pub async fn history_with(
        &self,
        convo_id: &str,
        recipient_name: &str,
        user_message: &str,
    ) -> Vec<ChatTurn> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(convo_id.to_string()).or_insert_with(|| {
            info!("Initializing new chat session for convo_id: {}", convo_id);
            ChatSession::seeded(persona_instructions(recipient_name))
        });

        let mut turns = session.history.clone();
        turns.push(ChatTurn::user(user_message));
        turns
    }

    /// Commit an exchange to the history after a successful completion.
    pub async fn append_exchange(&self, convo_id: &str, user_message: &str, reply: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(convo_id) {
            session.history.push(ChatTurn::user(user_message));
            session.history.push(ChatTurn::assistant(reply));
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRole;

    #[test]
    fn personas_are_keyed_case_insensitively() {
        assert!(persona_instructions("Stock Trader").contains("Nairobi"));
        assert!(persona_instructions("KAMBA BOT").contains("Kamba"));
        assert_eq!(persona_instructions("someone else"), DEFAULT_PERSONA);
    }

    #[tokio::test]
    async fn first_message_seeds_persona_handshake() {
        let store = SessionStore::new();
        let turns = store.history_with("c1", "kamba bot", "hello there").await;

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, ChatRole::User);
        assert!(turns[0].text.contains("Kamba"));
        assert_eq!(turns[1].role, ChatRole::Assistant);
        assert_eq!(turns[2].text, "hello there");
    }

    #[tokio::test]
    async fn history_accumulates_across_exchanges() {
        let store = SessionStore::new();
        store.history_with("c1", "news updates", "first").await;
        store.append_exchange("c1", "first", "reply one").await;

        let turns = store.history_with("c1", "news updates", "second").await;
        // seed (2) + first exchange (2) + new user turn (1)
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[4].text, "second");
        assert_eq!(store.session_count().await, 1);
    }
}
