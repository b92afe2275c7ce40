use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $inner:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub $inner);
    };
}

id_newtype!(MessageId, i64);
id_newtype!(RequestToken, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStyle {
    /// Minimal line art with few strokes.
    #[default]
    Icon,
    /// Detailed line art.
    Illustration,
}

impl GenerationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStyle::Icon => "icon",
            GenerationStyle::Illustration => "illustration",
        }
    }
}

impl std::str::FromStr for GenerationStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "icon" => Ok(GenerationStyle::Icon),
            "illustration" => Ok(GenerationStyle::Illustration),
            other => Err(format!("unknown generation style '{other}'")),
        }
    }
}

/// Prompt and style that produced an exchange, kept so it can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOrigin {
    pub prompt: String,
    pub style: GenerationStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<PromptOrigin>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(id: MessageId, origin: PromptOrigin, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::User,
            text: origin.prompt.clone(),
            image_url: None,
            origin: Some(origin),
            created_at,
        }
    }

    pub fn assistant(
        id: MessageId,
        text: impl Into<String>,
        image_url: Option<String>,
        origin: Option<PromptOrigin>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: text.into(),
            image_url,
            origin,
            created_at,
        }
    }
}

/// Physical page dimensions in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    pub fn aspect_ratio(&self) -> f64 {
        self.width_mm / self.height_mm
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Millimeter placement of one image on the page, handed to the print client once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub image_url: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub rotation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_without_image_omits_optional_fields() {
        let message = ConversationMessage::assistant(
            MessageId(7),
            "generation failed",
            None,
            None,
            "2024-01-01T00:00:00Z".parse().expect("timestamp"),
        );
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["role"], "assistant");
        assert!(json.get("image_url").is_none());
        assert!(json.get("origin").is_none());
    }

    #[test]
    fn message_missing_optional_fields_still_parses() {
        let message: ConversationMessage = serde_json::from_str(
            r#"{"id":1,"role":"user","text":"a cat","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .expect("parse");
        assert_eq!(message.id, MessageId(1));
        assert_eq!(message.role, Role::User);
        assert!(message.origin.is_none());
    }

    #[test]
    fn parses_styles_case_insensitively() {
        assert_eq!("Icon".parse::<GenerationStyle>(), Ok(GenerationStyle::Icon));
        assert_eq!(
            " illustration ".parse::<GenerationStyle>(),
            Ok(GenerationStyle::Illustration)
        );
        assert!("watercolor".parse::<GenerationStyle>().is_err());
    }

    #[test]
    fn a4_ratio() {
        assert!((PageSize::A4.aspect_ratio() - 210.0 / 297.0).abs() < 1e-12);
    }
}
