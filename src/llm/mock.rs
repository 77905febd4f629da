use std::time::Duration;

use async_trait::async_trait;

use super::provider::CompletionProvider;
use super::types::{ChatMessage, Completion};
use crate::core::errors::ApiError;

const SIMULATED_LATENCY_MS: u64 = 300;

/// Deterministic rule-based provider for development and tests. Picks a
/// canned answer by keyword matching against the last user message and the
/// system prompt, in a fixed priority order.
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _temperature: f64,
    ) -> Result<Completion, ApiError> {
        tokio::time::sleep(Duration::from_millis(SIMULATED_LATENCY_MS)).await;

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let system = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let text = canned_answer(last_user, system);
        let tokens_used = (text.len() / 4 + 50) as u32;

        Ok(Completion { text, tokens_used })
    }
}

fn canned_answer(user_message: &str, system_prompt: &str) -> String {
    let query = user_message.to_lowercase();
    let haystack = format!("{} {}", query, system_prompt.to_lowercase());

    if haystack.contains("shipping") {
        return shipping_answer(&query);
    }
    if haystack.contains("return") {
        return returns_answer(&query);
    }
    if haystack.contains("contact") {
        return contact_answer(&query);
    }
    if haystack.contains("product") {
        return "Our product catalog covers a range of options. Could you tell me which \
                product you are interested in so I can give you the details?"
            .to_string();
    }
    if haystack.contains("order") {
        return "You can check your order status from your account page under 'My Orders'. \
                If you have your order number handy I can help you track it down."
            .to_string();
    }
    if haystack.contains("payment") {
        return "We accept all major credit cards, PayPal and bank transfer. Payments are \
                processed securely and you will receive a confirmation email right away."
            .to_string();
    }

    format!(
        "Thanks for reaching out! You asked: \"{}\". I'm happy to help with questions \
         about shipping, returns, orders, payments or our products.",
        user_message
    )
}

fn shipping_answer(query: &str) -> String {
    if query.contains("cost") {
        "Standard shipping costs $5.99 and is free on orders over $50. Express shipping \
         is available for $14.99."
            .to_string()
    } else if query.contains("time") || query.contains("long") {
        "Standard shipping takes 3-5 business days. Express shipping arrives within 1-2 \
         business days."
            .to_string()
    } else if query.contains("free") {
        "Yes! Shipping is free on all orders over $50.".to_string()
    } else {
        "We ship worldwide via standard (3-5 business days) and express (1-2 business \
         days) delivery. Is there anything specific about shipping I can help with?"
            .to_string()
    }
}

fn returns_answer(query: &str) -> String {
    if query.contains("how long") || query.contains("days") {
        "You have 30 days from the delivery date to return an item.".to_string()
    } else if query.contains("condition") {
        "Returned items must be unused, in their original packaging and with all tags \
         attached."
            .to_string()
    } else if query.contains("cost") {
        "Returns are free of charge; we'll email you a prepaid shipping label.".to_string()
    } else {
        "Our return policy gives you 30 days to return any item in its original \
         condition. Would you like to start a return?"
            .to_string()
    }
}

fn contact_answer(query: &str) -> String {
    if query.contains("phone") {
        "You can reach us by phone at 1-800-555-0199.".to_string()
    } else if query.contains("email") {
        "You can email our support team at support@example.com.".to_string()
    } else if query.contains("hours") {
        "Our support team is available Monday to Friday, 9am to 6pm EST.".to_string()
    } else {
        "You can contact us by phone (1-800-555-0199), email (support@example.com) or \
         live chat, Monday to Friday 9am-6pm EST."
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shipping_cost_answer_is_deterministic() {
        let provider = MockProvider::new();
        let messages = vec![ChatMessage::user("How much does shipping cost?")];

        let low = provider.complete(&messages, 0.1).await.unwrap();
        let high = provider.complete(&messages, 1.0).await.unwrap();

        assert_eq!(low.text, high.text);
        assert!(low.text.contains("$5.99"));
    }

    #[tokio::test]
    async fn unrecognized_query_echoes_the_question() {
        let provider = MockProvider::new();
        let query = "Do you sell gift wrap for llamas?";
        let messages = vec![ChatMessage::user(query)];

        let completion = provider.complete(&messages, 0.3).await.unwrap();
        assert!(completion.text.contains(query));
    }

    #[test]
    fn sub_intents_resolve_within_topics() {
        assert!(canned_answer("how long do returns take in days?", "").contains("30 days"));
        assert!(canned_answer("what condition for a return?", "").contains("original packaging"));
        assert!(canned_answer("what are your phone contact details?", "").contains("1-800"));
        assert!(canned_answer("is shipping free?", "").contains("free on all orders"));
    }

    #[test]
    fn system_prompt_keywords_also_match() {
        let answer = canned_answer("tell me more", "Context about shipping rates.");
        assert!(answer.to_lowercase().contains("ship"));
    }

    #[tokio::test]
    async fn token_estimate_tracks_response_length() {
        let text = canned_answer("hello there", "");
        let expected = (text.len() / 4 + 50) as u32;

        let completion = MockProvider::new()
            .complete(&[ChatMessage::user("hello there")], 0.3)
            .await
            .unwrap();
        assert_eq!(completion.tokens_used, expected);
    }
}
