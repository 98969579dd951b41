pub mod message_board;

pub use message_board::{BoardStats, ChatMessage, MessageBoard};
