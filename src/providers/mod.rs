//! External collaborators, reached only through narrow named interfaces
//! (§1): the WhatsApp transport, the LLM used for slot extraction and
//! response composition, the embedding backend, OCR, and calendars.
//! Each trait has exactly one HTTP/process-backed implementation; tests
//! substitute a stub.

pub mod calendar;
pub mod embedding;
pub mod llm;
pub mod ocr;
pub mod whatsapp;

pub use calendar::{CalendarEvent, CalendarProvider, GoogleCalendarProvider};
pub use embedding::{EmbeddingProvider, HttpEmbeddingProvider};
pub use llm::{LlmMessage, LlmProvider, OpenAiCompatibleProvider};
pub use ocr::{OcrProvider, SubprocessOcrProvider};
pub use whatsapp::{OutboundMessage, WhatsAppProvider, WhatsAppTwilioProvider};
