pub mod admin_service;
pub mod attachment_service;
pub mod conversation_service;
pub mod message_service;
pub mod notifier;
