use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use subtitle_bot::error::{DeliveryError, PaymentError, TranslationError};
use subtitle_bot::notify::{FileSource, MessageRef, Notifier};
use subtitle_bot::payments::{GatewayRequest, GatewayVerification, PaymentGateway};
use subtitle_bot::translator::backend::{BackendAnswer, Usage};
use subtitle_bot::translator::client::DELIMITER;
use subtitle_bot::translator::TranslationBackend;

/// represents a sent message for verification in tests
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SentDocument {
    pub chat_id: i64,
    pub file_name: String,
    pub content: String,
    pub caption: String,
}

/// records everything instead of calling telegram
#[derive(Debug, Default)]
pub struct MockNotifier {
    next_message_id: AtomicI32,
    pub sent_messages: Mutex<Vec<SentMessage>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub documents: Mutex<Vec<SentDocument>>,
    pub fail_documents: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// makes every document upload fail
    pub fn failing_documents() -> Self {
        let notifier = Self::default();
        notifier.fail_documents.store(true, Ordering::Relaxed);
        notifier
    }

    pub fn get_sent_messages(&self) -> Vec<SentMessage> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn get_edits(&self) -> Vec<(MessageRef, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn get_documents(&self) -> Vec<SentDocument> {
        self.documents.lock().unwrap().clone()
    }

    /// latest text shown to the chat, whether sent or edited in
    pub fn last_text_for_chat(&self, chat_id: i64) -> Option<String> {
        let edited = self
            .edits
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(message, _)| message.chat_id == chat_id)
            .map(|(_, text)| text.clone());
        edited.or_else(|| {
            self.sent_messages
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|msg| msg.chat_id == chat_id)
                .map(|msg| msg.text.clone())
        })
    }

    /// checks if any message to chat contains specific text
    pub fn chat_received_message_containing(&self, chat_id: i64, text: &str) -> bool {
        self.sent_messages
            .lock()
            .unwrap()
            .iter()
            .any(|msg| msg.chat_id == chat_id && msg.text.contains(text))
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageRef, DeliveryError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.sent_messages.lock().unwrap().push(SentMessage {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(MessageRef { chat_id, message_id })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), DeliveryError> {
        self.edits.lock().unwrap().push((message, text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<String, DeliveryError> {
        if self.fail_documents.load(Ordering::Relaxed) {
            return Err(DeliveryError::Download("upload rejected".to_string()));
        }
        let mut documents = self.documents.lock().unwrap();
        documents.push(SentDocument {
            chat_id,
            file_name: file_name.to_string(),
            content: String::from_utf8_lossy(&content).into_owned(),
            caption: caption.to_string(),
        });
        Ok(format!("output-{}", documents.len()))
    }
}

/// serves files from memory by reference
#[derive(Debug, Default)]
pub struct MockFileSource {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_ref: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(file_ref.to_string(), content.as_bytes().to_vec());
    }
}

#[async_trait]
impl FileSource for MockFileSource {
    async fn download(&self, file_ref: &str) -> Result<Vec<u8>, DeliveryError> {
        self.files
            .lock()
            .unwrap()
            .get(file_ref)
            .cloned()
            .ok_or_else(|| DeliveryError::Download(format!("no file {}", file_ref)))
    }
}

/// prefixes every segment with "T:"; any batch mentioning `poison` always fails
pub struct MockTranslationBackend {
    poison: Option<String>,
    pub calls: AtomicUsize,
}

impl MockTranslationBackend {
    pub fn new() -> Self {
        Self {
            poison: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(poison: &str) -> Self {
        Self {
            poison: Some(poison.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranslationBackend for MockTranslationBackend {
    async fn translate(&self, query: &str) -> Result<BackendAnswer, TranslationError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(poison) = &self.poison {
            if query.contains(poison.as_str()) {
                return Err(TranslationError::Transport("mock outage".to_string()));
            }
        }
        let answer = query
            .split(DELIMITER)
            .map(|segment| format!("T:{}", segment.trim()))
            .collect::<Vec<_>>()
            .join(&format!("\n{}\n", DELIMITER));
        Ok(BackendAnswer {
            answer,
            usage: Usage {
                total_price: Decimal::new(5, 3),
                total_tokens: 42,
            },
        })
    }
}

/// accepts every request; verification outcome is configurable
pub struct MockPaymentGateway {
    next_track_id: AtomicUsize,
    pub verify_ok: AtomicBool,
    pub requested_rials: Mutex<Vec<i64>>,
    pub verify_calls: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            next_track_id: AtomicUsize::new(1000),
            verify_ok: AtomicBool::new(true),
            requested_rials: Mutex::new(Vec::new()),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting_verification() -> Self {
        let gateway = Self::new();
        gateway.verify_ok.store(false, Ordering::Relaxed);
        gateway
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn request(
        &self,
        amount_rials: i64,
        _description: &str,
        order_id: &str,
    ) -> Result<GatewayRequest, PaymentError> {
        self.requested_rials.lock().unwrap().push(amount_rials);
        let track_id = self.next_track_id.fetch_add(1, Ordering::Relaxed).to_string();
        Ok(GatewayRequest {
            raw: json!({ "result": 100, "trackId": track_id, "orderId": order_id }),
            track_id,
        })
    }

    async fn verify(&self, track_id: &str) -> Result<GatewayVerification, PaymentError> {
        self.verify_calls.fetch_add(1, Ordering::Relaxed);
        let verified = self.verify_ok.load(Ordering::Relaxed);
        let result = if verified { 100 } else { 202 };
        Ok(GatewayVerification {
            verified,
            raw: json!({ "result": result, "trackId": track_id }),
        })
    }

    fn payment_url(&self, track_id: &str) -> String {
        format!("https://pay.example/start/{}", track_id)
    }
}
