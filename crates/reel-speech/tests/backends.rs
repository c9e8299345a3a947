//! Speech clients against mocked backends.

use std::time::Duration;

use reel_speech::{AlignClient, AlignConfig, SpeechError, TtsClient, TtsConfig};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tts_config(server: &MockServer) -> TtsConfig {
    TtsConfig {
        api_key: Some("test-key".to_string()),
        voice_id: "voice-1".to_string(),
        base_url: server.uri(),
        max_retries: 0,
        ..TtsConfig::default()
    }
}

fn align_config(server: &MockServer) -> AlignConfig {
    AlignConfig {
        base_url: server.uri(),
        max_retries: 0,
        ..AlignConfig::default()
    }
}

#[tokio::test]
async fn tts_sends_credential_header_and_voice_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .and(header("xi-api-key", "test-key"))
        .and(body_json(json!({
            "text": "hello there",
            "voice_settings": {"stability": 0.5, "similarity_boost": 0.75}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let client = TtsClient::new(tts_config(&server)).unwrap();
    let audio = client.fetch_speech("hello there", "test-key").await.unwrap();
    assert_eq!(audio, vec![1, 2, 3]);
}

#[tokio::test]
async fn tts_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;

    let config = TtsConfig {
        max_retries: 2,
        ..tts_config(&server)
    };
    let client = TtsClient::new(config).unwrap();
    let err = client.fetch_speech("hi", "test-key").await.unwrap_err();
    assert!(matches!(err, SpeechError::RequestFailed(_)));
}

#[tokio::test]
async fn tts_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = TtsConfig {
        max_retries: 1,
        ..tts_config(&server)
    };
    let client = TtsClient::new(config).unwrap();
    let err = client.fetch_speech("hi", "test-key").await.unwrap_err();
    assert!(matches!(err, SpeechError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn tts_failed_transcode_leaves_no_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not really mp3".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("voice.wav");
    let client = TtsClient::new(tts_config(&server)).unwrap();

    let err = client.synthesize("hello", &out, false).await.unwrap_err();
    assert!(matches!(err, SpeechError::Media(_)));
    assert!(!out.exists());
    assert!(!dir.path().join("voice.mp3").exists());
}

#[tokio::test]
async fn tts_timeout_maps_to_timeout_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = TtsConfig {
        timeout: Duration::from_secs(1),
        ..tts_config(&server)
    };
    let client = TtsClient::new(config).unwrap();
    let err = client.fetch_speech("hi", "test-key").await.unwrap_err();
    assert!(matches!(err, SpeechError::Timeout(1)));
}

#[tokio::test]
async fn align_writes_track_from_service_segments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/align"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "language": "en",
            "word_segments": [
                {"start": 0.0, "end": 0.42, "word": "Hello,"},
                {"start": 0.42, "end": 1.0, "word": "world!"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("voice.wav");
    reel_media::write_silent_wav(&audio, 1.0).unwrap();
    let out = dir.path().join("subtitles.ass");

    let client = AlignClient::new(align_config(&server)).unwrap();
    client.align(&audio, &out, false, "base").await.unwrap();

    let doc = std::fs::read_to_string(&out).unwrap();
    assert!(doc.contains("Dialogue: 0,0:00:00.00,0:00:00.42,Default,,0,0,0,,Hello"));
    assert!(doc.contains("Dialogue: 0,0:00:00.42,0:00:01.00,Default,,0,0,0,,world"));
}

#[tokio::test]
async fn align_empty_segments_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/align"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"language": "en", "word_segments": []})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("voice.wav");
    reel_media::write_silent_wav(&audio, 1.0).unwrap();
    let out = dir.path().join("subtitles.ass");

    let client = AlignClient::new(align_config(&server)).unwrap();
    let err = client.align(&audio, &out, false, "base").await.unwrap_err();
    assert!(matches!(err, SpeechError::InvalidResponse(_)));
    assert!(!out.exists());
}

#[tokio::test]
async fn align_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = AlignClient::new(align_config(&server)).unwrap();
    assert!(client.health_check().await.unwrap());
}
