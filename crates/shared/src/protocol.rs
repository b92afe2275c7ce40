use serde::{Deserialize, Serialize};

use crate::domain::{GenerationStyle, PrintJob};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub style: GenerationStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRequest {
    pub image_reference: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub rotation: f64,
}

impl From<&PrintJob> for PrintRequest {
    fn from(job: &PrintJob) -> Self {
        Self {
            image_reference: job.image_url.clone(),
            x_mm: job.x_mm,
            y_mm: job.y_mm,
            width_mm: job.width_mm,
            height_mm: job.height_mm,
            rotation: job.rotation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
