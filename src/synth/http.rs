//! HTTP synthesis client.
//!
//! Talks to the analysis backend's TTS endpoint:
//! `POST {endpoint}` with `{"text", "voice", "language"}` answered by
//! `{"audioData": "<base64 PCM16 mono 24 kHz>"}`.

use crate::config::ServiceConfig;
use crate::error::{Result, SpeechError};
use crate::synth::client::Synthesizer;
use crate::synth::voice::Language;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice: &'a str,
    language: Language,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(rename = "audioData")]
    audio_data: Option<String>,
}

/// Synthesizer backed by the remote TTS endpoint.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSynthesizer {
    /// Build a client for `config.endpoint`.
    ///
    /// A request timeout is only applied when `config.timeout_secs` is set.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| SpeechError::Synthesis {
            message: format!("Failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, language: Language) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(&TtsRequest {
            text,
            voice,
            language,
        })
        .map_err(|e| SpeechError::Synthesis {
            message: format!("Failed to encode request: {e}"),
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis {
                message: format!("Request to {} failed: {e}", self.endpoint),
            })?;

        if !response.status().is_success() {
            return Err(SpeechError::Synthesis {
                message: format!("TTS service returned status {}", response.status()),
            });
        }

        let text = response.text().await.map_err(|e| SpeechError::Synthesis {
            message: format!("Failed to read TTS response: {e}"),
        })?;

        parse_response(&text)
    }
}

/// Extract the PCM bytes from a TTS response body.
fn parse_response(body: &str) -> Result<Vec<u8>> {
    let response: TtsResponse = serde_json::from_str(body).map_err(|e| SpeechError::Synthesis {
        message: format!("Failed to parse TTS response: {e}"),
    })?;

    let encoded = response
        .audio_data
        .filter(|data| !data.is_empty())
        .ok_or_else(|| SpeechError::Synthesis {
            message: "TTS response contained no audio".to_string(),
        })?;

    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| SpeechError::Synthesis {
            message: format!("TTS audio is not valid base64: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn request_body_shape() {
        let json = serde_json::to_string(&TtsRequest {
            text: "Cow has fever.",
            voice: "Kore",
            language: Language::Hi,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"text":"Cow has fever.","voice":"Kore","language":"hi"}"#
        );
    }

    #[test]
    fn parses_base64_audio() {
        let body = format!(r#"{{"audioData":"{}"}}"#, STANDARD.encode([0u8, 64, 1, 2]));
        assert_eq!(parse_response(&body).unwrap(), vec![0, 64, 1, 2]);
    }

    #[test]
    fn missing_audio_is_a_synthesis_error() {
        for body in [r#"{}"#, r#"{"audioData":""}"#, r#"{"audioData":null}"#] {
            let err = parse_response(body).unwrap_err();
            assert!(matches!(err, SpeechError::Synthesis { .. }), "{body}");
        }
    }

    #[test]
    fn invalid_payloads_are_synthesis_errors() {
        assert!(matches!(
            parse_response("not json"),
            Err(SpeechError::Synthesis { .. })
        ));
        assert!(matches!(
            parse_response(r#"{"audioData":"!!!"}"#),
            Err(SpeechError::Synthesis { .. })
        ));
    }

    /// Serve exactly one HTTP request with a canned status and body.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}/api/tts"), handle)
    }

    fn config(endpoint: String) -> ServiceConfig {
        ServiceConfig {
            endpoint,
            timeout_secs: Some(5),
        }
    }

    #[tokio::test]
    async fn posts_json_and_decodes_audio() {
        let body = format!(r#"{{"audioData":"{}"}}"#, STANDARD.encode([0u8, 64]));
        let (endpoint, server) = serve_once("200 OK", body).await;
        let synth = HttpSynthesizer::new(&config(endpoint)).unwrap();

        let bytes = synth
            .synthesize("Irrigate tonight.", "Puck", Language::En)
            .await
            .unwrap();
        assert_eq!(bytes, vec![0, 64]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/tts"));
        assert!(request.contains(r#""text":"Irrigate tonight.""#));
        assert!(request.contains(r#""language":"en""#));
    }

    #[tokio::test]
    async fn error_status_is_a_synthesis_error() {
        let (endpoint, server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":"Failed to generate speech"}"#.to_string(),
        )
        .await;
        let synth = HttpSynthesizer::new(&config(endpoint)).unwrap();

        let err = synth
            .synthesize("text", "Puck", Language::En)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status 500"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_service_is_a_synthesis_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let synth = HttpSynthesizer::new(&config(format!("http://{addr}/api/tts"))).unwrap();
        let err = synth
            .synthesize("text", "Puck", Language::En)
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Synthesis { .. }));
    }
}
