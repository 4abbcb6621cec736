//! Room behavior against a loopback room service
//!
//! Covers the join flow, the client-side participant cap and the
//! auto-subscribe path without camera hardware or a model file.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use veilcam::{VeilCam, VeilError};
use veilcam_core::{ClientMessage, ParticipantInfo, ServerMessage, TrackInfo, TrackKind};

type Ws = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

async fn spawn_service<F>(handler: F) -> String
where
    F: FnOnce(Ws) -> futures::future::BoxFuture<'static, ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{}", addr)
}

async fn next_client_message(ws: &mut Ws) -> ClientMessage {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(_) => panic!("connection closed while waiting for a message"),
            _ => continue,
        }
    }
}

async fn send(ws: &mut Ws, msg: &ServerMessage) {
    ws.send(Message::Text(serde_json::to_string(msg).unwrap()))
        .await
        .unwrap();
}

fn roster(ids: &[&str]) -> Vec<ParticipantInfo> {
    ids.iter()
        .map(|id| ParticipantInfo {
            participant_id: id.to_string(),
            joined_at: chrono::Utc::now(),
        })
        .collect()
}

#[tokio::test]
async fn join_resolves_room_and_participant() {
    let url = spawn_service(|mut ws| {
        Box::pin(async move {
            let request_id = match next_client_message(&mut ws).await {
                ClientMessage::JoinRoom { request_id, token } => {
                    assert_eq!(token, "tok");
                    request_id
                }
                other => panic!("expected JoinRoom, got {:?}", other),
            };
            send(
                &mut ws,
                &ServerMessage::JoinedRoom {
                    request_id,
                    room_id: "room-1".to_string(),
                    participant_id: "me".to_string(),
                    participants: roster(&["me", "peer"]),
                    tracks: vec![],
                },
            )
            .await;
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        })
    })
    .await;

    let room = VeilCam::init()
        .unwrap()
        .room(&url)
        .token("tok")
        .video_enabled(false)
        .join()
        .await
        .unwrap();
    assert_eq!(room.id(), "room-1");
    assert_eq!(room.participant_id(), "me");
    assert_eq!(room.initial_participants().len(), 1);
    assert_eq!(room.local_participant().id(), "me");
}

#[tokio::test]
async fn overfull_room_triggers_leave_and_room_full() {
    let (left_tx, left_rx) = tokio::sync::oneshot::channel::<()>();
    let url = spawn_service(move |mut ws| {
        Box::pin(async move {
            let request_id = match next_client_message(&mut ws).await {
                ClientMessage::JoinRoom { request_id, .. } => request_id,
                other => panic!("expected JoinRoom, got {:?}", other),
            };
            // Third participant admitted by the service; the client is
            // expected to back out
            send(
                &mut ws,
                &ServerMessage::JoinedRoom {
                    request_id,
                    room_id: "room-1".to_string(),
                    participant_id: "me".to_string(),
                    participants: roster(&["a", "b", "me"]),
                    tracks: vec![],
                },
            )
            .await;

            let request_id = match next_client_message(&mut ws).await {
                ClientMessage::LeaveRoom { request_id } => request_id,
                other => panic!("expected LeaveRoom, got {:?}", other),
            };
            send(&mut ws, &ServerMessage::LeftRoom { request_id }).await;
            left_tx.send(()).ok();
        })
    })
    .await;

    let err = VeilCam::init()
        .unwrap()
        .room(&url)
        .token("tok")
        .video_enabled(false)
        .join()
        .await
        .unwrap_err();
    match err {
        VeilError::RoomFull {
            room_id,
            max_participants,
        } => {
            assert_eq!(room_id, "room-1");
            assert_eq!(max_participants, 2);
        }
        other => panic!("expected RoomFull, got {:?}", other),
    }
    left_rx.await.unwrap();
}

#[tokio::test]
async fn announced_tracks_are_auto_subscribed() {
    let url = spawn_service(|mut ws| {
        Box::pin(async move {
            let request_id = match next_client_message(&mut ws).await {
                ClientMessage::JoinRoom { request_id, .. } => request_id,
                other => panic!("expected JoinRoom, got {:?}", other),
            };
            send(
                &mut ws,
                &ServerMessage::JoinedRoom {
                    request_id,
                    room_id: "room-1".to_string(),
                    participant_id: "me".to_string(),
                    participants: roster(&["me"]),
                    tracks: vec![],
                },
            )
            .await;

            // Peer publishes after we are in
            let track = TrackInfo {
                track_id: "peer-vid".to_string(),
                participant_id: "peer".to_string(),
                kind: TrackKind::Video,
                source: "processed".to_string(),
            };
            send(
                &mut ws,
                &ServerMessage::TrackAdded {
                    tracks: vec![track.clone()],
                },
            )
            .await;

            let (request_id, track_ids) = match next_client_message(&mut ws).await {
                ClientMessage::Subscribe {
                    request_id,
                    track_ids,
                } => (request_id, track_ids),
                other => panic!("expected Subscribe, got {:?}", other),
            };
            assert_eq!(track_ids, vec!["peer-vid".to_string()]);
            send(
                &mut ws,
                &ServerMessage::Subscribed {
                    request_id,
                    tracks: vec![track],
                },
            )
            .await;
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        })
    })
    .await;

    let mut room = VeilCam::init()
        .unwrap()
        .room(&url)
        .token("tok")
        .video_enabled(false)
        .join()
        .await
        .unwrap();
    let mut events = room.events();

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.next())
        .await
        .unwrap()
        .unwrap();
    match event {
        veilcam::Event::TrackReceived { track } => {
            assert_eq!(track.id(), "peer-vid");
            assert_eq!(track.participant_id(), "peer");
            assert_eq!(track.kind(), TrackKind::Video);
        }
        other => panic!("expected TrackReceived, got {:?}", other),
    }
}

#[tokio::test]
async fn service_errors_surface_as_room_events() {
    let url = spawn_service(|mut ws| {
        Box::pin(async move {
            let request_id = match next_client_message(&mut ws).await {
                ClientMessage::JoinRoom { request_id, .. } => request_id,
                other => panic!("expected JoinRoom, got {:?}", other),
            };
            send(
                &mut ws,
                &ServerMessage::JoinedRoom {
                    request_id,
                    room_id: "room-1".to_string(),
                    participant_id: "me".to_string(),
                    participants: roster(&["me"]),
                    tracks: vec![],
                },
            )
            .await;

            // Error with no correlation ID, initiated by the service
            send(
                &mut ws,
                &ServerMessage::Error {
                    request_id: None,
                    code: 50_000,
                    reason: "room is shutting down".to_string(),
                },
            )
            .await;
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        })
    })
    .await;

    let mut room = VeilCam::init()
        .unwrap()
        .room(&url)
        .token("tok")
        .video_enabled(false)
        .join()
        .await
        .unwrap();
    let mut events = room.events();

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.next())
        .await
        .unwrap()
        .unwrap();
    match event {
        veilcam::Event::RoomError { error, recoverable } => {
            assert!(error.contains("50000"), "code missing from {:?}", error);
            assert!(recoverable);
        }
        other => panic!("expected RoomError, got {:?}", other),
    }
}

#[tokio::test]
async fn builder_requires_token() {
    let err = VeilCam::init()
        .unwrap()
        .room("ws://127.0.0.1:1")
        .join()
        .await
        .unwrap_err();
    match err {
        VeilError::MissingConfiguration { field } => assert_eq!(field, "token"),
        other => panic!("expected MissingConfiguration, got {:?}", other),
    }
}

#[tokio::test]
async fn builder_requires_model_when_video_enabled() {
    let err = VeilCam::init()
        .unwrap()
        .room("ws://127.0.0.1:1")
        .token("tok")
        .join()
        .await
        .unwrap_err();
    match err {
        VeilError::MissingConfiguration { field } => assert_eq!(field, "model_path"),
        other => panic!("expected MissingConfiguration, got {:?}", other),
    }
}

#[tokio::test]
async fn debug_logging_init_is_idempotent() {
    let config = veilcam::GlobalConfig {
        debug_logging: true,
        default_service_url: None,
    };
    let first = VeilCam::init_with(config.clone()).unwrap();
    assert!(first.config().debug_logging);

    // The subscriber is already installed the second time around
    VeilCam::init_with(config).unwrap();
}

#[tokio::test]
async fn builder_requires_service_url() {
    let err = VeilCam::init()
        .unwrap()
        .room("")
        .token("tok")
        .video_enabled(false)
        .join()
        .await
        .unwrap_err();
    match err {
        VeilError::MissingConfiguration { field } => assert_eq!(field, "service_url"),
        other => panic!("expected MissingConfiguration, got {:?}", other),
    }
}
