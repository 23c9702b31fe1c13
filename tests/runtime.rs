use kindsight_reader::coordinator::CoordinatorSettings;
use kindsight_reader::engine::{SpeechEngine, UtteranceRequest};
use kindsight_reader::error::{DeliveryError, EngineError};
use kindsight_reader::messenger::Messenger;
use kindsight_reader::protocol::{
    Command, EngineEvent, EngineEventKind, Notification, Reply, TabId, Target, TicketId,
};
use kindsight_reader::runtime::{CoordinatorHandle, spawn_coordinator};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TAB: TabId = TabId(3);

#[derive(Clone, Default)]
struct SharedEngine {
    speaks: Arc<Mutex<Vec<UtteranceRequest>>>,
}

impl SharedEngine {
    fn spoken(&self) -> Vec<(TicketId, String)> {
        self.speaks
            .lock()
            .unwrap()
            .iter()
            .map(|request| (request.ticket, request.text.clone()))
            .collect()
    }
}

impl SpeechEngine for SharedEngine {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError> {
        self.speaks.lock().unwrap().push(request);
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {}
}

#[derive(Clone, Default)]
struct SharedMessenger {
    sent: Arc<Mutex<Vec<(Target, Notification)>>>,
    tabs_closed: bool,
}

impl SharedMessenger {
    fn to(&self, target: Target) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(sent_to, _)| *sent_to == target)
            .map(|(_, notification)| notification.clone())
            .collect()
    }
}

impl Messenger for SharedMessenger {
    fn deliver(
        &mut self,
        target: Target,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        if self.tabs_closed && target != Target::Extension {
            return Err(DeliveryError::ChannelClosed);
        }
        self.sent.lock().unwrap().push((target, notification.clone()));
        Ok(())
    }
}

fn start(chunks: &[&str]) -> Command {
    Command::StartSession {
        chunks: chunks.iter().map(|chunk| chunk.to_string()).collect(),
        rate: None,
        voice: None,
    }
}

fn progress(current_index: usize, total_chunks: usize) -> Notification {
    Notification::Progress {
        current_index,
        total_chunks,
    }
}

/// Round-trip a no-op command so everything queued before it has been applied.
/// `Resume` is a no-op unless the session is paused.
async fn settle(handle: &CoordinatorHandle) {
    let reply = handle.request(None, Command::Resume).await.unwrap();
    assert!(reply.success);
}

#[tokio::test(start_paused = true)]
async fn engine_events_drive_the_session_to_the_end() {
    let engine = SharedEngine::default();
    let messenger = SharedMessenger::default();
    let (handle, task) = spawn_coordinator(
        CoordinatorSettings::default(),
        Some(engine.clone()),
        messenger.clone(),
    );

    let reply = handle.request(Some(TAB), start(&["One.", "Two."])).await.unwrap();
    assert_eq!(reply, Reply::started(2));

    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::Start))
        .unwrap();
    handle
        .engine_event(EngineEvent::word(TicketId(1), 0, 3))
        .unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::End))
        .unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::Completed))
        .unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(2), EngineEventKind::Start))
        .unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(2), EngineEventKind::End))
        .unwrap();
    settle(&handle).await;

    assert_eq!(
        engine.spoken(),
        vec![(TicketId(1), "One.".into()), (TicketId(2), "Two.".into())]
    );
    assert_eq!(
        messenger.to(Target::Tab(TAB)),
        vec![
            progress(0, 2),
            Notification::Word {
                chunk_index: 0,
                char_index: 0,
                char_length: 3
            },
            progress(1, 2),
            progress(2, 2),
            Notification::Finished,
        ]
    );

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn silent_engine_is_forced_through_by_the_watchdog() {
    let engine = SharedEngine::default();
    let messenger = SharedMessenger::default();
    let settings = CoordinatorSettings::default();
    let watchdog = settings.watchdog_timeout;
    let (handle, task) = spawn_coordinator(settings, Some(engine.clone()), messenger.clone());

    handle.request(Some(TAB), start(&["Only."])).await.unwrap();
    tokio::time::sleep(watchdog - Duration::from_millis(1)).await;
    settle(&handle).await;
    assert!(!messenger.to(Target::Extension).contains(&Notification::Finished));

    tokio::time::sleep(Duration::from_millis(2)).await;
    settle(&handle).await;
    assert_eq!(
        messenger.to(Target::Extension),
        vec![progress(0, 1), progress(1, 1), Notification::Finished]
    );

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unstarted_settles_retry_before_advancing() {
    let engine = SharedEngine::default();
    let messenger = SharedMessenger::default();
    let settings = CoordinatorSettings::default();
    let patience = settings.retry_delay * (settings.max_retries + 1);
    let (handle, task) = spawn_coordinator(settings, Some(engine.clone()), messenger.clone());

    handle.request(Some(TAB), start(&["One.", "Two."])).await.unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::End))
        .unwrap();
    settle(&handle).await;
    assert_eq!(engine.spoken().len(), 1);

    tokio::time::sleep(patience).await;
    settle(&handle).await;
    assert_eq!(
        engine.spoken(),
        vec![(TicketId(1), "One.".into()), (TicketId(2), "Two.".into())]
    );
    assert_eq!(
        messenger.to(Target::Extension),
        vec![progress(0, 2), progress(1, 2)]
    );

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stale_events_after_stop_are_ignored() {
    let engine = SharedEngine::default();
    let messenger = SharedMessenger::default();
    let (handle, task) = spawn_coordinator(
        CoordinatorSettings::default(),
        Some(engine.clone()),
        messenger.clone(),
    );

    handle.request(Some(TAB), start(&["One.", "Two."])).await.unwrap();
    assert!(handle.request(None, Command::Stop).await.unwrap().success);
    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::Interrupted))
        .unwrap();
    settle(&handle).await;

    assert_eq!(engine.spoken().len(), 1);
    assert_eq!(
        messenger.to(Target::Tab(TAB)),
        vec![progress(0, 2), progress(0, 2), Notification::Finished]
    );

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn cancelled_timers_release_their_tasks() {
    let (handle, task) = spawn_coordinator(
        CoordinatorSettings::default(),
        Some(SharedEngine::default()),
        SharedMessenger::default(),
    );
    let chunks: Vec<String> = (0..10).map(|index| format!("Chunk {index}.")).collect();
    handle
        .request(
            Some(TAB),
            Command::StartSession {
                chunks,
                rate: None,
                voice: None,
            },
        )
        .await
        .unwrap();
    for round in 0..200 {
        let reply = handle
            .request(None, Command::Seek { index: round % 10 })
            .await
            .unwrap();
        assert!(reply.success);
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    // The coordinator loop plus the watchdog of the chunk being spoken.
    let alive = tokio::runtime::Handle::current()
        .metrics()
        .num_alive_tasks();
    assert!(alive <= 2, "{alive} tasks still alive");

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn closed_tabs_do_not_stall_the_session() {
    let engine = SharedEngine::default();
    let messenger = SharedMessenger {
        tabs_closed: true,
        ..SharedMessenger::default()
    };
    let (handle, task) = spawn_coordinator(
        CoordinatorSettings::default(),
        Some(engine.clone()),
        messenger.clone(),
    );

    handle.request(Some(TAB), start(&["One."])).await.unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::Start))
        .unwrap();
    handle
        .engine_event(EngineEvent::new(TicketId(1), EngineEventKind::End))
        .unwrap();
    settle(&handle).await;

    assert!(messenger.to(Target::Tab(TAB)).is_empty());
    assert_eq!(
        messenger.to(Target::Extension),
        vec![progress(0, 1), progress(1, 1), Notification::Finished]
    );

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn missing_engine_rejects_speech() {
    let messenger = SharedMessenger::default();
    let (handle, task) = spawn_coordinator::<SharedEngine, _>(
        CoordinatorSettings::default(),
        None,
        messenger.clone(),
    );

    let reply = handle.request(Some(TAB), start(&["One."])).await.unwrap();
    assert!(!reply.success);
    assert_eq!(reply.code.as_deref(), Some("engine_unavailable"));
    assert!(messenger.to(Target::Extension).is_empty());

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let (handle, task) = spawn_coordinator(
        CoordinatorSettings::default(),
        Some(SharedEngine::default()),
        SharedMessenger::default(),
    );
    handle.shutdown();
    task.await.unwrap();
    assert!(handle.request(None, Command::Pause).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_ends_the_loop_despite_pending_timers() {
    let (handle, task) = spawn_coordinator(
        CoordinatorSettings::default(),
        Some(SharedEngine::default()),
        SharedMessenger::default(),
    );
    handle.request(Some(TAB), start(&["One."])).await.unwrap();
    drop(handle);

    tokio::time::timeout(Duration::from_millis(10), task)
        .await
        .expect("loop should exit once the handles are gone")
        .unwrap();
}
