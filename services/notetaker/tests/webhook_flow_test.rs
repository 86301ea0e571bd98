#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use ulid::Ulid;

    use shared::db::repositories::{
        ArtifactRepository, BotRepository, MeetingRepository, NewMeeting,
        TranscriptChunkRepository,
    };
    use shared::models::{BotState, Meeting, MeetingStatus};
    use shared::test_environment::TestEnvironment;

    use parley_notetaker::api::{create_router, ApiState};
    use parley_notetaker::config::RecallConfig;
    use parley_notetaker::finalize::Finalizer;
    use parley_notetaker::meetings::MeetingService;
    use parley_notetaker::recall::RecallClient;
    use parley_notetaker::sequencer::Sequencer;
    use parley_notetaker::summarize::{MeetingSummary, Summarizer};
    use parley_notetaker::webhook::{WebhookProcessor, Word, WordTimestamp};

    const OWNER: &str = "owner-1";

    struct StubSummarizer(MeetingSummary);

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(&self, _transcript: &str) -> anyhow::Result<MeetingSummary> {
            Ok(self.0.clone())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _transcript: &str) -> anyhow::Result<MeetingSummary> {
            Err(anyhow!("model unavailable"))
        }
    }

    struct TestApp {
        env: TestEnvironment,
        server: TestServer,
        finalizer: Arc<Finalizer>,
    }

    impl TestApp {
        async fn new(summarizer: Arc<dyn Summarizer>) -> Self {
            Self::with_provider(summarizer, "http://127.0.0.1:9".to_string()).await
        }

        async fn with_provider(summarizer: Arc<dyn Summarizer>, provider_base: String) -> Self {
            let env = TestEnvironment::new().await.unwrap();
            let pool = env.db_pool.pool();

            let finalizer = Arc::new(Finalizer::new(
                MeetingRepository::new(pool),
                TranscriptChunkRepository::new(pool),
                ArtifactRepository::new(pool),
                summarizer,
            ));

            let webhooks = Arc::new(WebhookProcessor::new(
                MeetingRepository::new(pool),
                BotRepository::new(pool),
                Sequencer::new(TranscriptChunkRepository::new(pool)),
                Arc::clone(&finalizer),
            ));

            let recall = RecallClient::new(RecallConfig {
                api_base: provider_base,
                api_key: "test-key".to_string(),
                webhook_url: "http://localhost:8080/webhooks/recall".to_string(),
            });

            let meetings = Arc::new(MeetingService::new(
                MeetingRepository::new(pool),
                BotRepository::new(pool),
                TranscriptChunkRepository::new(pool),
                ArtifactRepository::new(pool),
                recall,
                Arc::clone(&finalizer),
            ));

            let server = TestServer::new(create_router(ApiState { meetings, webhooks })).unwrap();

            Self {
                env,
                server,
                finalizer,
            }
        }

        fn meetings(&self) -> MeetingRepository {
            MeetingRepository::new(self.env.db_pool.pool())
        }

        fn bots(&self) -> BotRepository {
            BotRepository::new(self.env.db_pool.pool())
        }

        fn chunks(&self) -> TranscriptChunkRepository {
            TranscriptChunkRepository::new(self.env.db_pool.pool())
        }

        fn artifacts(&self) -> ArtifactRepository {
            ArtifactRepository::new(self.env.db_pool.pool())
        }

        fn sequencer(&self) -> Sequencer {
            Sequencer::new(self.chunks())
        }

        async fn seed_meeting(&self) -> Meeting {
            let start = Utc::now();
            self.meetings()
                .create(NewMeeting {
                    id: Ulid::new().to_string(),
                    owner_id: OWNER.to_string(),
                    title: "Standup".to_string(),
                    start_at: start,
                    end_at: start + Duration::hours(1),
                    timezone: "UTC".to_string(),
                    attendee_emails: vec![],
                    meet_url: "https://meet.google.com/abc-defg-hij".to_string(),
                })
                .await
                .unwrap()
        }

        async fn seed_bot(&self, meeting_id: &str, provider_bot_id: &str) {
            self.bots()
                .create(&Ulid::new().to_string(), meeting_id, provider_bot_id)
                .await
                .unwrap();
        }
    }

    fn owner_header() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static(OWNER),
        )
    }

    fn lifecycle_event(event: &str, meeting_id: &str, bot_id: &str) -> Value {
        json!({
            "event": event,
            "data": {
                "bot": {
                    "id": bot_id,
                    "metadata": { "meeting_id": meeting_id }
                }
            }
        })
    }

    fn transcript_event(meeting_id: &str, bot_id: &str, words: &[&str]) -> Value {
        let word_values: Vec<Value> = words
            .iter()
            .enumerate()
            .map(|(i, text)| {
                json!({
                    "text": text,
                    "start_timestamp": { "relative": i as f64 },
                    "end_timestamp": { "relative": i as f64 + 0.5 }
                })
            })
            .collect();

        json!({
            "event": "transcript.data",
            "data": {
                "data": {
                    "words": word_values,
                    "participant": { "id": 7, "name": "Ada", "is_host": true, "platform": "zoom", "email": null }
                },
                "bot": {
                    "id": bot_id,
                    "metadata": { "meeting_id": meeting_id }
                }
            }
        })
    }

    fn word(text: &str, start: f64, end: f64) -> Word {
        Word {
            text: Some(text.to_string()),
            start_timestamp: Some(WordTimestamp {
                relative: Some(start),
            }),
            end_timestamp: Some(WordTimestamp {
                relative: Some(end),
            }),
        }
    }

    #[tokio::test]
    async fn webhook_always_acknowledges_success() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;

        // Unparseable body
        let response = app.server.post("/webhooks/recall").text("{not json").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "received": true }));

        // No correlation metadata
        let response = app
            .server
            .post("/webhooks/recall")
            .json(&json!({ "event": "bot.done" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "received": true }));

        // Recognized shape but unknown event
        let response = app
            .server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.media_expired", "no-such-meeting", "bot-x"))
            .await;
        response.assert_status_ok();

        // Lifecycle event for a meeting that does not exist
        let response = app
            .server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.in_call_recording", "no-such-meeting", "bot-x"))
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn lifecycle_events_drive_bot_state_and_meeting_status() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;
        app.seed_bot(&meeting.id, "bot-1").await;

        app.server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.joining_call", &meeting.id, "bot-1"))
            .await
            .assert_status_ok();

        let bot = app.bots().find_latest_for_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(bot.state, BotState::Joining);
        // Joining does not move the meeting out of scheduled.
        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::Scheduled);

        app.server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.in_call_recording", &meeting.id, "bot-1"))
            .await
            .assert_status_ok();

        let bot = app.bots().find_latest_for_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(bot.state, BotState::InCall);
        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::InProgress);

        // Duplicate delivery is a no-op.
        app.server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.in_call_recording", &meeting.id, "bot-1"))
            .await
            .assert_status_ok();
        let bot = app.bots().find_latest_for_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(bot.state, BotState::InCall);

        app.server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.fatal", &meeting.id, "bot-1"))
            .await
            .assert_status_ok();

        let bot = app.bots().find_latest_for_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(bot.state, BotState::Failed);
        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::Failed);
    }

    #[tokio::test]
    async fn transcript_events_append_ordered_chunks() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;
        app.seed_bot(&meeting.id, "bot-1").await;

        app.server
            .post("/webhooks/recall")
            .json(&transcript_event(&meeting.id, "bot-1", &["Good", "morning"]))
            .await
            .assert_status_ok();
        app.server
            .post("/webhooks/recall")
            .json(&transcript_event(&meeting.id, "bot-1", &["everyone"]))
            .await
            .assert_status_ok();
        // A fragment with no text is a pure signal, not a chunk.
        app.server
            .post("/webhooks/recall")
            .json(&transcript_event(&meeting.id, "bot-1", &[]))
            .await
            .assert_status_ok();

        let chunks = app.chunks().list_all(&meeting.id).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Good morning", "everyone"]);
        assert_eq!(chunks[0].speaker_name.as_deref(), Some("Ada"));
        assert_eq!(chunks[0].start_ms, Some(0));
        assert_eq!(chunks[0].end_ms, Some(1500));
    }

    #[tokio::test]
    async fn byte_identical_duplicate_is_persisted_once() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;
        let sequencer = app.sequencer();

        let hello = vec![word("Hello", 0.0, 0.4)];
        let world = vec![word("world", 0.5, 0.9)];

        let first_arrival = Utc::now();
        sequencer
            .append(&meeting.id, "bot-1", &hello, None, first_arrival)
            .await
            .unwrap();
        sequencer
            .append(&meeting.id, "bot-1", &world, None, first_arrival + Duration::milliseconds(40))
            .await
            .unwrap();
        // The provider redelivers the first envelope byte for byte.
        sequencer
            .append(&meeting.id, "bot-1", &hello, None, first_arrival)
            .await
            .unwrap();

        let chunks = app.chunks().list_all(&meeting.id).await.unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "world"]);
    }

    #[tokio::test]
    async fn finalize_with_no_chunks_stores_an_empty_artifact() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;

        app.finalizer.finalize(&meeting.id).await.unwrap();

        let artifact = app.artifacts().find_by_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(artifact.final_transcript, "");
        assert_eq!(artifact.summary, None);
        assert!(artifact.action_items.0.is_empty());
        assert!(artifact.topics.is_empty());

        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::Completed);
    }

    #[tokio::test]
    async fn finalize_twice_produces_identical_results() {
        let summary = MeetingSummary {
            summary: "Short call.".to_string(),
            action_items: vec![],
            topics: vec!["greetings".to_string()],
        };
        let app = TestApp::new(Arc::new(StubSummarizer(summary))).await;
        let meeting = app.seed_meeting().await;

        let sequencer = app.sequencer();
        sequencer
            .append(&meeting.id, "bot-1", &[word("Hello", 0.0, 0.4)], None, Utc::now())
            .await
            .unwrap();
        sequencer
            .append(&meeting.id, "bot-1", &[word("world", 0.5, 0.9)], None, Utc::now())
            .await
            .unwrap();

        app.finalizer.finalize(&meeting.id).await.unwrap();
        let first = app.artifacts().find_by_meeting(&meeting.id).await.unwrap().unwrap();

        app.finalizer.finalize(&meeting.id).await.unwrap();
        let second = app.artifacts().find_by_meeting(&meeting.id).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.final_transcript, "Hello\n\nworld");
        assert_eq!(second.final_transcript, first.final_transcript);
        assert_eq!(second.summary, first.summary);
        assert_eq!(second.summary.as_deref(), Some("Short call."));
        assert_eq!(second.topics, vec!["greetings".to_string()]);

        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::Completed);
    }

    #[tokio::test]
    async fn summarization_failure_still_completes_the_meeting() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;

        app.sequencer()
            .append(&meeting.id, "bot-1", &[word("Hello", 0.0, 0.4)], None, Utc::now())
            .await
            .unwrap();

        app.finalizer.finalize(&meeting.id).await.unwrap();

        let artifact = app.artifacts().find_by_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(artifact.final_transcript, "Hello");
        assert_eq!(artifact.summary, None);
        assert!(artifact.action_items.0.is_empty());
        assert!(artifact.topics.is_empty());

        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::Completed);
    }

    #[tokio::test]
    async fn done_event_triggers_finalize_in_the_background() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;
        app.seed_bot(&meeting.id, "bot-1").await;

        app.server
            .post("/webhooks/recall")
            .json(&lifecycle_event("bot.done", &meeting.id, "bot-1"))
            .await
            .assert_status_ok();

        let bot = app.bots().find_latest_for_meeting(&meeting.id).await.unwrap().unwrap();
        assert_eq!(bot.state, BotState::Done);

        // Finalize runs detached from the ack; poll for the artifact.
        let artifacts = app.artifacts();
        let mut artifact = None;
        for _ in 0..100 {
            if let Some(found) = artifacts.find_by_meeting(&meeting.id).await.unwrap() {
                artifact = Some(found);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let artifact = artifact.expect("finalize never produced an artifact");
        assert_eq!(artifact.final_transcript, "");

        let current = app.meetings().find_by_id(&meeting.id).await.unwrap().unwrap();
        assert_eq!(current.status, MeetingStatus::Completed);
    }

    #[tokio::test]
    async fn transcript_feed_pages_by_seq_cursor() {
        let app = TestApp::new(Arc::new(FailingSummarizer)).await;
        let meeting = app.seed_meeting().await;

        let sequencer = app.sequencer();
        for (i, text) in ["alpha", "beta", "gamma"].iter().enumerate() {
            sequencer
                .append(
                    &meeting.id,
                    "bot-1",
                    &[word(text, i as f64, i as f64 + 0.5)],
                    None,
                    Utc::now(),
                )
                .await
                .unwrap();
        }

        let (name, value) = owner_header();
        let response = app
            .server
            .get(&format!("/meetings/{}/transcript", meeting.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let page: Vec<Value> = response.json();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0]["text"], "alpha");

        let last_seq = page.last().unwrap()["seq"].as_i64().unwrap();
        let response = app
            .server
            .get(&format!(
                "/meetings/{}/transcript?after_seq={last_seq}",
                meeting.id
            ))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let empty: Vec<Value> = response.json();
        assert!(empty.is_empty());

        // Without the owner header the boundary refuses.
        let response = app
            .server
            .get(&format!("/meetings/{}/transcript", meeting.id))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn schedule_creates_meeting_and_bot_records() {
        let provider = stub_provider().await;
        let app = TestApp::with_provider(Arc::new(FailingSummarizer), provider).await;

        let (name, value) = owner_header();
        let start = Utc::now() + Duration::hours(1);
        let response = app
            .server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "title": "Design review",
                "meet_url": "https://meet.google.com/abc-defg-hij",
                "start_at": start.to_rfc3339(),
                "end_at": (start + Duration::hours(1)).to_rfc3339(),
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let created: Value = response.json();
        let meeting_id = created["id"].as_str().unwrap();
        assert_eq!(created["status"], "scheduled");

        let meeting = app.meetings().find_by_id(meeting_id).await.unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Scheduled);
        assert_eq!(meeting.owner_id, OWNER);

        let bot = app.bots().find_latest_for_meeting(meeting_id).await.unwrap().unwrap();
        assert_eq!(bot.state, BotState::Scheduled);
        assert_eq!(bot.provider_bot_id, "bot-stub-1");

        // Validation failures never reach the provider or the database.
        let response = app
            .server
            .post("/meetings")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "title": "Bad",
                "meet_url": "ftp://not-a-meeting",
                "start_at": start.to_rfc3339(),
                "end_at": (start + Duration::hours(1)).to_rfc3339(),
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    /// Minimal stand-in for the bot provider API.
    async fn stub_provider() -> String {
        use axum::routing::post;
        use axum::{Json, Router};

        let app = Router::new().route(
            "/bot/",
            post(|| async { Json(json!({ "id": "bot-stub-1" })) }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }
}
