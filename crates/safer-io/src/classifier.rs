//! Vision-language risk classifier over the OpenAI Responses API.
//!
//! One request per cycle: the safety instructions, the sensor text and the
//! photo as a base64 data URL. The reply is returned as free text; parsing
//! the trailing risk token is the core's job.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use safer_core::{CaptureArtifact, ClassifierError, ClassifierResult, RiskClassifier, SensorReading};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::request_error;

/// Instructions sent with every request.
pub const SAFETY_INSTRUCTIONS: &str = "Agisci come un sistema di monitoraggio della sicurezza \
sul lavoro. Valuta i dati dei sensori e la foto dell'ambiente e segnala soltanto pericoli \
concreti per la salute o la sicurezza dei lavoratori secondo il D.Lgs. 81/2008.\n\
Soglie di riferimento:\n\
- Fumo: rischio sopra 30 ppm\n\
- Illuminazione: almeno 300 lux\n\
- Temperatura: tra 18°C e 24°C\n\
Formato della risposta:\n\
- Frasi brevi, senza markdown\n\
- Solo pericoli reali, con indicazioni preventive\n\
- L'ultima parola deve essere il livello di pericolo: LOW, MEDIUM oppure HIGH\n\
Esempio: Temperatura di 28°C, rischio di malessere. Arieggiare e raffrescare il locale. MEDIUM";

/// Classifier endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// API base URL, without the `/v1` suffix
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    pub model: String,
    pub reasoning_effort: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: "gpt-5".to_string(),
            reasoning_effort: "low".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/responses", self.base_url.trim_end_matches('/'))
    }
}

// Request body

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    reasoning: Reasoning<'a>,
    instructions: &'a str,
    input: Vec<InputMessage>,
}

#[derive(Debug, Serialize)]
struct Reasoning<'a> {
    effort: &'a str,
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputPart {
    InputText { text: String },
    InputImage { image_url: String },
}

// Response body

#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    /// The reply text, preferring the aggregated `output_text` field.
    fn text(&self) -> Option<String> {
        if let Some(text) = self.output_text.as_deref().filter(|t| !t.trim().is_empty()) {
            return Some(text.to_string());
        }
        let joined: String = self
            .output
            .iter()
            .flat_map(|item| &item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect();
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// Extract the reply text from a raw Responses API body.
pub fn extract_text(body: &str) -> ClassifierResult<String> {
    let reply: ResponsesReply =
        serde_json::from_str(body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;
    reply
        .text()
        .ok_or_else(|| ClassifierError::Malformed("response has no output text".to_string()))
}

/// Classifier backed by a hosted vision-language model.
pub struct OpenAiClassifier {
    config: ClassifierConfig,
    http_client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(config: ClassifierConfig) -> ClassifierResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("safer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(request_error)?;
        if config.api_key.trim().is_empty() {
            warn!("no classifier API key; every classification will fail");
        }
        info!(model = %config.model, endpoint = %config.endpoint(), "classifier configured");
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn request<'a>(&'a self, image: &CaptureArtifact, reading: &SensorReading) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model: &self.config.model,
            reasoning: Reasoning {
                effort: &self.config.reasoning_effort,
            },
            instructions: SAFETY_INSTRUCTIONS,
            input: vec![InputMessage {
                role: "user",
                content: vec![
                    InputPart::InputText {
                        text: format!("Dati sensori: {}", reading.raw),
                    },
                    InputPart::InputImage {
                        image_url: data_url(image),
                    },
                ],
            }],
        }
    }
}

/// `data:image/jpeg;base64,...` for the captured frame.
pub fn data_url(image: &CaptureArtifact) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(image.bytes()))
}

#[async_trait]
impl RiskClassifier for OpenAiClassifier {
    async fn classify(
        &self,
        image: &CaptureArtifact,
        reading: &SensorReading,
    ) -> ClassifierResult<String> {
        if self.config.api_key.trim().is_empty() {
            return Err(ClassifierError::Request("no API key configured".to_string()));
        }
        let body = self.request(image, reading);
        debug!(
            model = %self.config.model,
            image_bytes = image.len(),
            digest = image.short_digest(),
            "classifier request"
        );

        let response = self
            .http_client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let text = response.text().await.map_err(request_error)?;
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_text(&text)
    }
}
