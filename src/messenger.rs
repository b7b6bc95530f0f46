use async_trait::async_trait;

pub type ChatId = i64;

/// Identifies one already delivered message, for edits and control removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// Delivery options of an outbound message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Render the text as platform rich text instead of plain text.
    pub rich_text: bool,
    /// Navigation controls attached below the message.
    pub controls: Option<NavControls>,
}

impl SendOptions {
    pub fn rich() -> Self {
        Self {
            rich_text: true,
            controls: None,
        }
    }

    pub fn rich_with(controls: NavControls) -> Self {
        Self {
            rich_text: true,
            controls: Some(controls),
        }
    }
}

/// One row of navigation buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavControls {
    pub buttons: Vec<NavButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavButton {
    pub label: String,
    pub callback_data: String,
}

impl NavButton {
    pub fn new<L: Into<String>, D: Into<String>>(label: L, callback_data: D) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("The messaging platform rate limit was hit")]
    TooManyRequests,

    #[error("The messaging platform rejected the call: {0}")]
    Platform(String),
}

/// Chat platform adapter.
///
/// The bot flows speak to the platform only through this trait, so any
/// messenger with text messages, message edits and per-message buttons can
/// host the bot.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        options: SendOptions,
    ) -> Result<MessageRef, MessengerError>;

    /// Replaces the text and controls of a delivered message in place.
    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        options: SendOptions,
    ) -> Result<(), MessengerError>;

    /// Settles a button press so the client stops its progress indicator,
    /// optionally flashing a short notice to the user.
    async fn acknowledge(
        &self,
        interaction_id: i64,
        notice: Option<&str>,
    ) -> Result<(), MessengerError>;

    /// Strips the navigation controls from a delivered message.
    async fn remove_controls(&self, message: MessageRef) -> Result<(), MessengerError>;
}
