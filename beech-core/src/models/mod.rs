pub mod chat;
pub mod tools;
pub mod transcript;
