//! Integration tests for the hub's HTTP and WebSocket surface.
//!
//! Platform sources are replaced with in-memory channels so no test touches
//! the network beyond a loopback listener.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use subathon_hub::api::{ApiServer, ApiServerConfig, AppState};
use subathon_hub::config::RuleSet;
use subathon_hub::platform::testing::ChannelSource;
use subathon_hub::services::ServiceContainer;

const RULES: &str = r#"{
    "baseSeconds": 3600,
    "maxSeconds": 7200,
    "decaySecondsPerSecond": 1,
    "manualStep": 60,
    "tiktok": { "coinToSeconds": 0.5, "subSeconds": 120 },
    "kick": { "subscriptionSeconds": 120, "giftedSubSeconds": 90, "kickCoinToSeconds": 0.25 }
}"#;

struct Harness {
    tiktok: Arc<ChannelSource>,
    kick: Arc<ChannelSource>,
    services: Arc<ServiceContainer>,
}

/// Helper to build a container over channel-backed sources.
fn setup() -> Harness {
    let rules = RuleSet::from_json(RULES).expect("Failed to parse rules");
    let tiktok = Arc::new(ChannelSource::new("tiktok"));
    let kick = Arc::new(ChannelSource::new("kick"));
    let services = Arc::new(ServiceContainer::with_sources(
        rules,
        tiktok.clone(),
        kick.clone(),
    ));
    Harness {
        tiktok,
        kick,
        services,
    }
}

fn server(services: &Arc<ServiceContainer>) -> ApiServer {
    ApiServer::new(ApiServerConfig::default(), AppState::new(services.clone()))
}

mod http_tests {
    use super::*;

    async fn get(services: &Arc<ServiceContainer>, uri: &str) -> (StatusCode, String) {
        let response = server(services)
            .build_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let harness = setup();
        let (status, body) = get(&harness.services, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_status_reports_identities_and_remaining() {
        let harness = setup();
        harness.services.kick.set_identity("xqc").await;
        harness.services.aggregator.manual_adjust(Some(25), subathon_hub::timer::AdjustDirection::Add);

        let (status, body) = get(&harness.services, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tiktokUser": "", "kickChannel": "xqc", "remaining": 3625})
        );
    }

    #[tokio::test]
    async fn test_other_paths_return_banner() {
        let harness = setup();
        for uri in ["/", "/overlay", "/anything/else"] {
            let (status, body) = get(&harness.services, uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "Subathon Hub running");
        }
    }
}

mod ws_tests {
    use super::*;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn spawn_server(services: &Arc<ServiceContainer>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api = server(services);
        tokio::spawn(async move {
            api.serve(listener).await.unwrap();
        });
        format!("ws://{}/", addr)
    }

    async fn connect(url: &str) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    async fn next_json(client: &mut Client) -> serde_json::Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), client.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn send(client: &mut Client, frame: &str) {
        client.send(Message::text(frame)).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_frame_is_init() {
        let harness = setup();
        harness.services.tiktok.set_identity("alice").await;
        let url = spawn_server(&harness.services).await;

        let mut client = connect(&url).await;
        let init = next_json(&mut client).await;

        assert_eq!(init["type"], "init");
        assert_eq!(init["payload"]["remaining"], 3600);
        assert_eq!(init["payload"]["tiktokUser"], "alice");
        assert_eq!(init["payload"]["kickChannel"], "");
        assert_eq!(init["payload"]["rules"]["manualStep"], 60);
        assert_eq!(
            init["payload"]["rules"],
            serde_json::from_str::<serde_json::Value>(RULES).unwrap()
        );
        assert!(init["payload"]["rules"]["decaySecondsPerSecond"].is_u64());
    }

    #[tokio::test]
    async fn test_manual_add_broadcasts_timer_to_all() {
        let harness = setup();
        let url = spawn_server(&harness.services).await;

        let mut a = connect(&url).await;
        let mut b = connect(&url).await;
        next_json(&mut a).await;
        next_json(&mut b).await;

        send(&mut a, r#"{"type":"manual:add","payload":{"seconds":30}}"#).await;

        for client in [&mut a, &mut b] {
            let timer = next_json(client).await;
            assert_eq!(timer["type"], "timer");
            assert_eq!(timer["payload"]["remaining"], 3630);
        }
    }

    #[tokio::test]
    async fn test_late_joiner_sees_current_value() {
        let harness = setup();
        let url = spawn_server(&harness.services).await;

        let mut first = connect(&url).await;
        next_json(&mut first).await;
        send(&mut first, r#"{"type":"manual:sub","payload":{"seconds":100}}"#).await;
        assert_eq!(next_json(&mut first).await["payload"]["remaining"], 3500);

        let mut late = connect(&url).await;
        let init = next_json(&mut late).await;
        assert_eq!(init["type"], "init");
        assert_eq!(init["payload"]["remaining"], 3500);
    }

    #[tokio::test]
    async fn test_config_update_replies_only_to_sender() {
        let harness = setup();
        let url = spawn_server(&harness.services).await;

        let mut sender = connect(&url).await;
        let mut other = connect(&url).await;
        next_json(&mut sender).await;
        next_json(&mut other).await;

        send(
            &mut sender,
            r#"{"type":"config:update","payload":{"tiktokUser":"alice","kickChannel":"bob"}}"#,
        )
        .await;

        let reply = next_json(&mut sender).await;
        assert_eq!(reply["type"], "configApplied");
        assert_eq!(reply["payload"]["tiktokUser"], "alice");
        assert_eq!(reply["payload"]["kickChannel"], "bob");

        let nothing = tokio::time::timeout(Duration::from_millis(200), other.next()).await;
        assert!(nothing.is_err(), "configApplied leaked to another subscriber");

        assert_eq!(harness.tiktok.connects(), vec!["alice".to_string()]);
        assert_eq!(harness.kick.connects(), vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_frames_keep_socket_open() {
        let harness = setup();
        let url = spawn_server(&harness.services).await;

        let mut client = connect(&url).await;
        next_json(&mut client).await;

        send(&mut client, "garbage").await;
        send(&mut client, r#"{"type":"unknown"}"#).await;
        send(&mut client, r#"{"type":"manual:add"}"#).await;

        let timer = next_json(&mut client).await;
        assert_eq!(timer["payload"]["remaining"], 3660);
    }

    #[tokio::test]
    async fn test_platform_event_reaches_subscribers() {
        let harness = setup();
        harness.services.kick.set_identity("chan").await;
        let url = spawn_server(&harness.services).await;

        let mut client = connect(&url).await;
        next_json(&mut client).await;

        harness
            .kick
            .emit("chan", subathon_platforms::PlatformEvent::GiftedSubs { count: Some(2) });

        let event = next_json(&mut client).await;
        assert_eq!(event["type"], "event");
        assert_eq!(event["payload"]["platform"], "kick");
        assert_eq!(event["payload"]["type"], "gifted_subs");
        assert_eq!(event["payload"]["add"], 180);

        let timer = next_json(&mut client).await;
        assert_eq!(timer["payload"]["remaining"], 3780);
    }
}

mod scenario_tests {
    use super::*;
    use subathon_hub::broadcaster::Subscription;
    use subathon_hub::timer::{AdjustDirection, DecayScheduler};
    use subathon_platforms::PlatformEvent;

    fn frame(subscription: &mut Subscription) -> serde_json::Value {
        let frame = subscription.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).unwrap()
    }

    async fn settle(mut condition: impl FnMut() -> bool) {
        for _ in 0..10_000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gift_then_idle_then_manual_sub() {
        let harness = setup();
        let start = tokio::time::Instant::now();
        let services = &harness.services;
        services.start_decay(DecayScheduler::new(services.aggregator.clone()));
        services.tiktok.set_identity("alice").await;
        let mut sub = services.connect_subscriber();
        assert_eq!(frame(&mut sub)["type"], "init");

        harness
            .tiktok
            .emit("alice", PlatformEvent::Gift { diamond_count: 100.0 });
        let mut applied = false;
        settle(|| {
            while let Some(frame) = sub.try_recv() {
                applied |= frame.contains(r#""type":"event""#) && frame.contains(r#""add":50"#);
            }
            applied
        })
        .await;

        tokio::time::sleep_until(start + Duration::from_millis(10_100)).await;
        assert_eq!(services.aggregator.remaining(), 3640);

        assert_eq!(
            services
                .aggregator
                .manual_adjust(Some(5000), AdjustDirection::Subtract),
            0
        );
        services.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_identity_switch_discards_stale_events() {
        let harness = setup();
        let services = &harness.services;
        let sub = services.connect_subscriber();

        services
            .handle_command(sub.id(), r#"{"type":"config:update","payload":{"tiktokUser":"alice"}}"#)
            .await;
        services
            .handle_command(sub.id(), r#"{"type":"config:update","payload":{"tiktokUser":"bob"}}"#)
            .await;

        assert_eq!(harness.tiktok.disconnects(), vec!["alice".to_string()]);
        assert_eq!(harness.tiktok.emit("alice", PlatformEvent::Subscribe), 0);

        harness.tiktok.emit("bob", PlatformEvent::Subscribe);
        tokio::time::timeout(Duration::from_secs(2), async {
            while services.aggregator.remaining() != 3720 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("event from the new identity was not applied");
    }

    #[tokio::test]
    async fn test_disable_is_idempotent() {
        let harness = setup();
        let sub = harness.services.connect_subscriber();

        for _ in 0..3 {
            harness
                .services
                .handle_command(sub.id(), r#"{"type":"config:update","payload":{"kickChannel":""}}"#)
                .await;
        }

        assert!(harness.kick.connects().is_empty());
        assert!(harness.kick.disconnects().is_empty());
        assert_eq!(harness.services.status().kick_channel, "");
    }
}

mod reconnect_tests {
    use super::*;
    use parking_lot::Mutex;
    use subathon_hub::config::AppConfig;

    /// Kick-style chat server recording every `phx_join` topic.
    ///
    /// The first `channel:a` session is closed right after its join; any later
    /// `channel:a` join receives a `subscription` frame. Other channels stay
    /// open and idle.
    async fn spawn_chat_server() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let joins = Arc::new(Mutex::new(Vec::new()));

        let recorded = joins.clone();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let joins = recorded.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                        return;
                    };
                    let topic = loop {
                        match ws.next().await {
                            Some(Ok(Message::Text(text))) => {
                                let join: serde_json::Value =
                                    serde_json::from_str(text.as_str()).unwrap();
                                if join["event"] == "phx_join" {
                                    break join["topic"].as_str().unwrap_or_default().to_string();
                                }
                            }
                            Some(Ok(_)) => {}
                            _ => return,
                        }
                    };

                    let seen_before = {
                        let mut joins = joins.lock();
                        let seen = joins.contains(&topic);
                        joins.push(topic.clone());
                        seen
                    };

                    if topic == "channel:a" {
                        if !seen_before {
                            let _ = ws.close(None).await;
                            return;
                        }
                        let frame = r#"{"event":"subscription","topic":"channel:a","payload":{}}"#;
                        let _ = ws.send(Message::text(frame)).await;
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        (format!("ws://{addr}"), joins)
    }

    fn kick_services(url: String) -> Arc<ServiceContainer> {
        let config = AppConfig {
            kick_ws_url: url,
            kick_reconnect: true,
            ..AppConfig::default()
        };
        let rules = RuleSet::from_json(RULES).expect("Failed to parse rules");
        Arc::new(ServiceContainer::new(rules, &config))
    }

    fn update_kick(channel: &str) -> String {
        serde_json::json!({"type": "config:update", "payload": {"kickChannel": channel}})
            .to_string()
    }

    #[tokio::test]
    async fn test_reconnect_rejoins_same_channel() {
        let (url, joins) = spawn_chat_server().await;
        let services = kick_services(url);
        let sub = services.connect_subscriber();

        services.handle_command(sub.id(), &update_kick("a")).await;

        tokio::time::timeout(Duration::from_secs(6), async {
            while services.aggregator.remaining() != 3720 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("reconnected session did not deliver its subscription");
        assert_eq!(
            *joins.lock(),
            vec!["channel:a".to_string(), "channel:a".to_string()]
        );

        services.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_switch_during_pending_reconnect_drops_stale_channel() {
        let (url, joins) = spawn_chat_server().await;
        let services = kick_services(url);
        let sub = services.connect_subscriber();

        services.handle_command(sub.id(), &update_kick("a")).await;
        // The first session closes at once; switch while its reconnect delay
        // is still pending.
        tokio::time::sleep(Duration::from_millis(500)).await;
        services.handle_command(sub.id(), &update_kick("b")).await;

        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(services.aggregator.remaining(), 3600);
        assert_eq!(
            *joins.lock(),
            vec!["channel:a".to_string(), "channel:b".to_string()]
        );
        assert_eq!(services.status().kick_channel, "b");

        services.shutdown().await.unwrap();
    }
}
