//! Conversational relay backed by the [`SessionStore`].

use std::sync::Arc;

use relay_providers::{ChatMessage, CompletionProvider, CompletionRequest};
use tracing::{debug, info};

use crate::error::{GENERIC_SERVER_ERROR, ServerError};
use crate::session::SessionStore;

pub const MISSING_FIELDS: &str = "User ID and message are required.";

/// Keeps one transcript per user and forwards it to the completion provider.
#[derive(Clone)]
pub struct ChatRelay {
    provider: Arc<dyn CompletionProvider>,
    sessions: Arc<SessionStore>,
    model: String,
    system_prompt: Option<String>,
}

impl ChatRelay {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        sessions: Arc<SessionStore>,
        model: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            provider,
            sessions,
            model: model.into(),
            system_prompt,
        }
    }

    /// Run one chat turn for `user_id` and return the assistant's reply.
    ///
    /// The user's transcript stays locked for the whole turn. The user
    /// message and the reply are committed together only after the provider
    /// answers, so a failed call leaves the transcript untouched.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<String, ServerError> {
        if user_id.is_empty() || message.is_empty() {
            return Err(ServerError::BadRequest(MISSING_FIELDS.into()));
        }

        let mut transcript = self.sessions.lock(user_id).await;
        let user_message = ChatMessage::user(message);

        let mut messages = Vec::with_capacity(transcript.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.as_str()));
        }
        messages.extend_from_slice(transcript.messages());
        messages.push(user_message.clone());

        debug!(user_id, history = transcript.len(), model = %self.model, "chat request");

        let request = CompletionRequest::new(self.model.as_str(), messages);
        let reply = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| ServerError::internal(GENERIC_SERVER_ERROR, e))?;

        transcript.push(user_message);
        transcript.push(ChatMessage::assistant(reply.as_str()));

        info!(user_id, reply_len = reply.len(), history = transcript.len(), "chat turn done");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use relay_providers::Role;

    use super::*;
    use crate::session::SessionLimits;
    use crate::test_support::FakeCompletionProvider;

    fn relay(fake: Arc<FakeCompletionProvider>, system: Option<&str>) -> ChatRelay {
        ChatRelay::new(
            fake,
            Arc::new(SessionStore::new(SessionLimits::UNBOUNDED)),
            "gpt-4o-mini",
            system.map(str::to_owned),
        )
    }

    #[tokio::test]
    async fn nth_call_sends_prior_pairs_plus_new_message() {
        let fake = Arc::new(FakeCompletionProvider::echo());
        let relay = relay(fake.clone(), None);

        for n in 1..=4 {
            let reply = relay.chat("alice", &format!("q{n}")).await.unwrap();
            assert_eq!(reply, format!("echo: q{n}"));
        }

        let requests = fake.requests();
        assert_eq!(requests.len(), 4);
        for (idx, request) in requests.iter().enumerate() {
            let n = idx + 1;
            assert_eq!(request.model, "gpt-4o-mini");
            let mut expected = Vec::new();
            for prior in 1..n {
                expected.push(ChatMessage::user(format!("q{prior}")));
                expected.push(ChatMessage::assistant(format!("echo: q{prior}")));
            }
            expected.push(ChatMessage::user(format!("q{n}")));
            assert_eq!(request.messages, expected, "request #{n}");
        }
    }

    #[tokio::test]
    async fn users_do_not_share_history() {
        let fake = Arc::new(FakeCompletionProvider::echo());
        let relay = relay(fake.clone(), None);

        relay.chat("alice", "hello").await.unwrap();
        relay.chat("bob", "hi").await.unwrap();

        let requests = fake.requests();
        assert_eq!(requests[1].messages, vec![ChatMessage::user("hi")]);
    }

    #[tokio::test]
    async fn missing_fields_do_not_touch_the_store() {
        let fake = Arc::new(FakeCompletionProvider::echo());
        let relay = relay(fake.clone(), None);

        for (user, msg) in [("", "hello"), ("alice", ""), ("", "")] {
            let err = relay.chat(user, msg).await.unwrap_err();
            assert!(matches!(err, ServerError::BadRequest(ref m) if m == MISSING_FIELDS));
        }
        assert!(relay.sessions.is_empty());
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_completion_leaves_transcript_unchanged() {
        let fake = Arc::new(FakeCompletionProvider::echo());
        let relay = relay(fake.clone(), None);
        relay.chat("alice", "first").await.unwrap();

        fake.fail_next();
        let err = relay.chat("alice", "lost").await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let history = relay.sessions.get("alice").await;
        assert_eq!(
            history,
            vec![ChatMessage::user("first"), ChatMessage::assistant("echo: first")]
        );
    }

    #[tokio::test]
    async fn system_prompt_is_sent_but_not_stored() {
        let fake = Arc::new(FakeCompletionProvider::echo());
        let relay = relay(fake.clone(), Some("Be brief."));

        relay.chat("alice", "hello").await.unwrap();

        let sent = &fake.requests()[0].messages;
        assert_eq!(sent[0], ChatMessage::system("Be brief."));
        assert_eq!(sent[1], ChatMessage::user("hello"));
        let stored = relay.sessions.get("alice").await;
        assert!(stored.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn concurrent_turns_for_one_user_stay_paired() {
        let fake = Arc::new(FakeCompletionProvider::echo());
        let relay = relay(fake.clone(), None);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let relay = relay.clone();
                tokio::spawn(async move { relay.chat("alice", &format!("m{i}")).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let history = relay.sessions.get("alice").await;
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
        }
    }
}
