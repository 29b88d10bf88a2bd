//! # Cleverbot
//!
//! Client for the Cleverbot conversational-AI web API and the Unit that
//! carries one conversation with it.
//!
//! The service is stateless from the caller's side: every answer comes with a
//! `cs` token encoding the conversation so far, and the next question must
//! send it back. That token plus the transcript is a `ConversationMind`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::CleverbotConfig;
use crate::error::{Error, Result};
use crate::units::Unit;

/// Something that answers questions within a conversation.
#[async_trait]
pub trait ChatBrain: Send + Sync {
    /// Ask `question` in the conversation `mind`, updating it with the exchange.
    async fn ask(&self, mind: &mut ConversationMind, question: &str) -> Result<String>;
}

/// State of one conversation with the chatbot service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationMind {
    /// Service conversation-state token, absent before the first answer.
    #[serde(default)]
    pub cs: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Exchanged lines, question and answer alternating.
    #[serde(default)]
    pub conversation: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationMind {
    /// Record a finished question/answer exchange.
    pub fn record(&mut self, question: &str, answer: &str) {
        self.conversation.push(question.to_string());
        self.conversation.push(answer.to_string());
        self.updated_at = Some(Utc::now());
    }

    pub fn is_fresh(&self) -> bool {
        self.cs.is_none() && self.conversation.is_empty()
    }
}

/// Reply body of `GET /getreply`.
#[derive(Debug, Deserialize)]
struct GetReply {
    cs: String,
    output: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Upper bound on one `/getreply` round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for www.cleverbot.com.
pub struct Cleverbot {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl Cleverbot {
    pub fn new(config: &CleverbotConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/getreply", self.base_url)
    }

    fn query(&self, mind: &ConversationMind, question: &str) -> Result<Vec<(&'static str, String)>> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::chatbot("Cleverbot API key is not configured"))?;
        let mut query = vec![("key", key.clone()), ("input", question.to_string())];
        if let Some(cs) = &mind.cs {
            query.push(("cs", cs.clone()));
        }
        Ok(query)
    }

    fn apply_reply(mind: &mut ConversationMind, question: &str, reply: GetReply) -> Result<String> {
        let answer = reply.output.trim().to_string();
        if answer.is_empty() {
            return Err(Error::chatbot("service returned an empty answer"));
        }
        mind.cs = Some(reply.cs);
        if reply.conversation_id.is_some() {
            mind.conversation_id = reply.conversation_id;
        }
        mind.record(question, &answer);
        Ok(answer)
    }
}

#[async_trait]
impl ChatBrain for Cleverbot {
    #[tracing::instrument(skip(self, mind), fields(fresh = mind.is_fresh()))]
    async fn ask(&self, mind: &mut ConversationMind, question: &str) -> Result<String> {
        let query = self.query(mind, question)?;
        let res = self.client.get(self.endpoint()).query(&query).send().await?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(Error::chatbot(format!("Cleverbot API error: {} - {}", status, err_text)));
        }

        let reply = res.json::<GetReply>().await?;
        Self::apply_reply(mind, question, reply)
    }
}

/// One conversation with a `ChatBrain`, exposed as a Unit.
///
/// `post` and `put` ask a question, `get` returns the transcript.
pub struct CleverBotMind {
    brain: Arc<dyn ChatBrain>,
    mind: Mutex<ConversationMind>,
}

impl CleverBotMind {
    /// A clear mind with no conversation history.
    pub fn new(brain: Arc<dyn ChatBrain>) -> Self {
        Self {
            brain,
            mind: Mutex::new(ConversationMind::default()),
        }
    }

    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut mind = self.mind.lock().await;
        self.brain.ask(&mut mind, question).await
    }

    /// Replace this conversation with `mind`.
    pub async fn read(&self, mind: ConversationMind) {
        *self.mind.lock().await = mind;
    }

    /// Copy of the current conversation.
    pub async fn write(&self) -> ConversationMind {
        self.mind.lock().await.clone()
    }

    async fn ask_required(&self, msg: Option<&str>) -> Result<String> {
        match msg.map(str::trim) {
            Some(question) if !question.is_empty() => self.ask(question).await,
            _ => Err(Error::invalid_request("a non-empty message is required")),
        }
    }
}

#[async_trait]
impl Unit for CleverBotMind {
    fn kind(&self) -> &'static str {
        "cleverbot_mind"
    }

    async fn get(&self, _msg: Option<&str>) -> Result<String> {
        Ok(self.mind.lock().await.conversation.join("\n"))
    }

    async fn post(&self, msg: Option<&str>) -> Result<String> {
        self.ask_required(msg).await
    }

    async fn put(&self, msg: Option<&str>) -> Result<String> {
        self.ask_required(msg).await
    }

    fn describe(&self) -> serde_json::Value {
        match self.mind.try_lock() {
            Ok(mind) => serde_json::json!({
                "kind": self.kind(),
                "lines": mind.conversation.len(),
                "conversation_id": mind.conversation_id,
            }),
            Err(_) => serde_json::json!({ "kind": self.kind(), "busy": true }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Brain answering "echo: <question>" and counting its turns in `cs`.
    pub(crate) struct EchoBrain;

    #[async_trait]
    impl ChatBrain for EchoBrain {
        async fn ask(&self, mind: &mut ConversationMind, question: &str) -> Result<String> {
            let answer = format!("echo: {question}");
            let turns = mind.conversation.len() / 2 + 1;
            mind.cs = Some(format!("turn-{turns}"));
            mind.record(question, &answer);
            Ok(answer)
        }
    }

    fn cleverbot(key: Option<&str>) -> Cleverbot {
        Cleverbot::new(&CleverbotConfig {
            api_key: key.map(str::to_string),
            base_url: "https://cleverbot.test/".to_string(),
        })
        .unwrap()
    }

    /// Serve `responses` in order on a local port, one connection each, and
    /// hand back the request lines received.
    async fn serve_canned(
        responses: Vec<(&'static str, &'static str)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let mut request_lines = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let text = String::from_utf8_lossy(&request);
                request_lines.push(text.lines().next().unwrap_or_default().to_string());

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            request_lines
        });
        (base_url, task)
    }

    fn cleverbot_at(base_url: &str) -> Cleverbot {
        Cleverbot::new(&CleverbotConfig {
            api_key: Some("k".to_string()),
            base_url: base_url.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_sends_state_token_back() {
        let (base_url, server) = serve_canned(vec![
            ("200 OK", r#"{"cs":"cs-1","output":"Hello."}"#),
            ("200 OK", r#"{"cs":"cs-2","output":"Again.","conversation_id":"c9"}"#),
        ])
        .await;
        let bot = cleverbot_at(&base_url);
        let mut mind = ConversationMind::default();

        assert_eq!(bot.ask(&mut mind, "hi").await.unwrap(), "Hello.");
        assert_eq!(bot.ask(&mut mind, "more").await.unwrap(), "Again.");
        assert_eq!(mind.cs.as_deref(), Some("cs-2"));
        assert_eq!(mind.conversation_id.as_deref(), Some("c9"));
        assert_eq!(mind.conversation, vec!["hi", "Hello.", "more", "Again."]);

        let lines = server.await.unwrap();
        assert!(lines[0].starts_with("GET /getreply?"));
        assert!(lines[0].contains("key=k"));
        assert!(lines[0].contains("input=hi"));
        assert!(!lines[0].contains("cs="));
        assert!(lines[1].contains("cs=cs-1"));
    }

    #[tokio::test]
    async fn test_ask_error_status_is_chatbot_error() {
        let (base_url, server) = serve_canned(vec![("503 Service Unavailable", "overloaded")]).await;
        let mut mind = ConversationMind::default();

        let err = cleverbot_at(&base_url).ask(&mut mind, "hi").await.unwrap_err();
        match err {
            Error::Chatbot(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("overloaded"));
            }
            other => panic!("expected chatbot error, got {other:?}"),
        }
        assert!(mind.is_fresh());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_malformed_body_is_http_error() {
        let (base_url, server) = serve_canned(vec![("200 OK", "not json")]).await;
        let mut mind = ConversationMind::default();

        let err = cleverbot_at(&base_url).ask(&mut mind, "hi").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(mind.is_fresh());
        server.await.unwrap();
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        assert_eq!(cleverbot(None).endpoint(), "https://cleverbot.test/getreply");
    }

    #[test]
    fn test_query_requires_key() {
        let err = cleverbot(None)
            .query(&ConversationMind::default(), "hi")
            .unwrap_err();
        assert!(matches!(err, Error::Chatbot(_)));
    }

    #[test]
    fn test_query_sends_state_token() {
        let bot = cleverbot(Some("k"));
        let fresh = bot.query(&ConversationMind::default(), "hi").unwrap();
        assert_eq!(fresh.len(), 2);

        let mind = ConversationMind {
            cs: Some("abc".to_string()),
            ..Default::default()
        };
        let query = bot.query(&mind, "hi").unwrap();
        assert!(query.contains(&("cs", "abc".to_string())));
    }

    #[test]
    fn test_apply_reply_updates_mind() {
        let mut mind = ConversationMind::default();
        let reply: GetReply = serde_json::from_str(
            r#"{"cs":"XYZ","output":" Hello there. ","conversation_id":"c1","interaction_count":"1"}"#,
        )
        .unwrap();
        let answer = Cleverbot::apply_reply(&mut mind, "hi", reply).unwrap();
        assert_eq!(answer, "Hello there.");
        assert_eq!(mind.cs.as_deref(), Some("XYZ"));
        assert_eq!(mind.conversation_id.as_deref(), Some("c1"));
        assert_eq!(mind.conversation, vec!["hi", "Hello there."]);
    }

    #[test]
    fn test_apply_reply_rejects_empty_answer() {
        let mut mind = ConversationMind::default();
        let reply = GetReply {
            cs: "XYZ".to_string(),
            output: "  ".to_string(),
            conversation_id: None,
        };
        assert!(Cleverbot::apply_reply(&mut mind, "hi", reply).is_err());
        assert!(mind.is_fresh());
    }

    #[tokio::test]
    async fn test_mind_unit_keeps_conversation() {
        let unit = CleverBotMind::new(Arc::new(EchoBrain));
        assert_eq!(unit.post(Some("one")).await.unwrap(), "echo: one");
        assert_eq!(unit.put(Some("two")).await.unwrap(), "echo: two");

        let transcript = unit.get(None).await.unwrap();
        assert_eq!(transcript, "one\necho: one\ntwo\necho: two");
        assert_eq!(unit.write().await.cs.as_deref(), Some("turn-2"));
        assert_eq!(unit.describe()["lines"], 4);
    }

    #[tokio::test]
    async fn test_mind_unit_requires_message() {
        let unit = CleverBotMind::new(Arc::new(EchoBrain));
        assert!(matches!(unit.post(None).await, Err(Error::InvalidRequest(_))));
        assert!(matches!(unit.post(Some("  ")).await, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_read_replaces_mind() {
        let unit = CleverBotMind::new(Arc::new(EchoBrain));
        unit.post(Some("one")).await.unwrap();
        unit.read(ConversationMind::default()).await;
        assert!(unit.write().await.is_fresh());
    }
}
