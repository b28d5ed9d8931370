//! Wire types for the bidirectional streaming protocol.
//!
//! Messages are JSON with camelCase fields. A client frame carries either
//! the one-time session setup or a batch of realtime media chunks; a server
//! frame carries the setup acknowledgment or incremental content
//! (transcription fragments, inline audio, interruption and turn flags).

use crate::audio::codec::WireAudioBlob;
use crate::live::session::{ServiceEvent, SessionSetup};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Response modality requested for this session.
const MODALITY_AUDIO: &str = "AUDIO";

/// Outgoing client frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<RealtimeInput>,
}

impl ClientMessage {
    /// The session-opening frame: model, audio response config, voice,
    /// system instruction, and both transcription flags.
    pub fn setup(setup: &SessionSetup) -> Self {
        Self {
            setup: Some(Setup {
                model: setup.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec![MODALITY_AUDIO.to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: setup.voice.clone(),
                            },
                        },
                    },
                },
                system_instruction: Content {
                    parts: vec![Part {
                        text: Some(setup.system_instruction.clone()),
                        inline_data: None,
                    }],
                },
                input_audio_transcription: TranscriptionConfig {},
                output_audio_transcription: TranscriptionConfig {},
            }),
            realtime_input: None,
        }
    }

    /// A realtime media frame carrying one encoded capture window.
    pub fn realtime(blob: WireAudioBlob) -> Self {
        Self {
            setup: None,
            realtime_input: Some(RealtimeInput {
                media_chunks: vec![blob],
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub input_audio_transcription: TranscriptionConfig,
    pub output_audio_transcription: TranscriptionConfig,
}

/// Requesting transcription takes an empty config object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptionConfig {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<WireAudioBlob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<WireAudioBlob>,
}

/// Incoming server frame. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<SetupComplete>,
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupComplete {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    pub interrupted: Option<bool>,
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Transcription {
    pub text: String,
}

impl ServerMessage {
    /// Whether this frame acknowledges the session setup.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Translate a content frame into service events, in dispatch order:
    /// transcription fragments, then audio payloads, then the interruption
    /// and turn flags.
    pub fn into_events(self) -> Vec<ServiceEvent> {
        let mut events = Vec::new();
        let Some(content) = self.server_content else {
            return events;
        };

        if let Some(transcription) = content.output_transcription {
            events.push(ServiceEvent::OutputTranscript(transcription.text));
        }
        if let Some(transcription) = content.input_transcription {
            events.push(ServiceEvent::InputTranscript(transcription.text));
        }

        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(inline) = part.inline_data {
                    match BASE64.decode(&inline.data) {
                        Ok(bytes) => events.push(ServiceEvent::Audio(bytes)),
                        Err(e) => events.push(ServiceEvent::Error(format!(
                            "invalid base64 audio payload: {}",
                            e
                        ))),
                    }
                }
            }
        }

        if content.interrupted.unwrap_or(false) {
            events.push(ServiceEvent::Interrupted);
        }
        if content.turn_complete.unwrap_or(false) {
            events.push(ServiceEvent::TurnComplete);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> SessionSetup {
        SessionSetup {
            model: "live-model".to_string(),
            voice: "Zephyr".to_string(),
            system_instruction: "be helpful".to_string(),
        }
    }

    #[test]
    fn test_setup_frame_shape() {
        let message = ClientMessage::setup(&setup());
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();

        assert_eq!(json["setup"]["model"], "live-model");
        assert_eq!(
            json["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert_eq!(
            json["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]
                ["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(
            json["setup"]["systemInstruction"]["parts"][0]["text"],
            "be helpful"
        );
        assert!(json["setup"]["inputAudioTranscription"].is_object());
        assert!(json["setup"]["outputAudioTranscription"].is_object());
        assert!(json.get("realtimeInput").is_none());
    }

    #[test]
    fn test_realtime_frame_shape() {
        let blob = WireAudioBlob {
            data: "AAAA".to_string(),
            mime_type: "audio/pcm;rate=16000".to_string(),
        };
        let message = ClientMessage::realtime(blob);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&message).unwrap()).unwrap();

        assert_eq!(json["realtimeInput"]["mediaChunks"][0]["data"], "AAAA");
        assert_eq!(
            json["realtimeInput"]["mediaChunks"][0]["mimeType"],
            "audio/pcm;rate=16000"
        );
        assert!(json.get("setup").is_none());
    }

    #[test]
    fn test_parse_setup_complete() {
        let message: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(message.is_setup_complete());
        assert!(message.into_events().is_empty());
    }

    #[test]
    fn test_parse_transcriptions_in_dispatch_order() {
        let message: ServerMessage = serde_json::from_str(
            r#"{
                "serverContent": {
                    "inputTranscription": {"text": "hello"},
                    "outputTranscription": {"text": "hi there"}
                }
            }"#,
        )
        .unwrap();

        let events = message.into_events();
        assert_eq!(
            events,
            vec![
                ServiceEvent::OutputTranscript("hi there".to_string()),
                ServiceEvent::InputTranscript("hello".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_inline_audio() {
        let payload = BASE64.encode([0u8, 1, 2, 3]);
        let json = format!(
            r#"{{
                "serverContent": {{
                    "modelTurn": {{
                        "parts": [{{"inlineData": {{"data": "{payload}", "mimeType": "audio/pcm;rate=24000"}}}}]
                    }}
                }}
            }}"#
        );
        let message: ServerMessage = serde_json::from_str(&json).unwrap();

        let events = message.into_events();
        assert_eq!(events, vec![ServiceEvent::Audio(vec![0, 1, 2, 3])]);
    }

    #[test]
    fn test_parse_interrupted_after_audio() {
        let payload = BASE64.encode([0u8; 2]);
        let json = format!(
            r#"{{
                "serverContent": {{
                    "modelTurn": {{"parts": [{{"inlineData": {{"data": "{payload}", "mimeType": "audio/pcm;rate=24000"}}}}]}},
                    "interrupted": true,
                    "turnComplete": true
                }}
            }}"#
        );
        let message: ServerMessage = serde_json::from_str(&json).unwrap();

        let events = message.into_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ServiceEvent::Audio(_)));
        assert_eq!(events[1], ServiceEvent::Interrupted);
        assert_eq!(events[2], ServiceEvent::TurnComplete);
    }

    #[test]
    fn test_invalid_base64_audio_becomes_error_event() {
        let message: ServerMessage = serde_json::from_str(
            r#"{
                "serverContent": {
                    "modelTurn": {"parts": [{"inlineData": {"data": "!!!", "mimeType": "audio/pcm;rate=24000"}}]}
                }
            }"#,
        )
        .unwrap();

        let events = message.into_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServiceEvent::Error(_)));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"groundingMetadata": {"x": 1}}, "usageMetadata": {}}"#,
        )
        .unwrap();
        assert!(message.into_events().is_empty());
    }

    #[test]
    fn test_text_only_parts_produce_no_audio_events() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"serverContent": {"modelTurn": {"parts": [{"text": "spoken aloud"}]}}}"#,
        )
        .unwrap();
        assert!(message.into_events().is_empty());
    }
}
