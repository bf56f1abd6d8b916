use c2_coordination::CoordinationManager;
use c2_core::{
    NewEvent, NewRoom, NewTask, ResourceDelta, RoomPriority, RoomStatus, StatusUpdate,
    TaskPriority, TimelineEventType,
};
use std::collections::HashSet;
use std::sync::Arc;

fn room(name: &str) -> NewRoom {
    NewRoom {
        name: name.to_string(),
        hazard_type: "earthquake".to_string(),
        priority: RoomPriority::High,
        location: "Downtown".to_string(),
        description: String::new(),
        commander: "IC Tanaka".to_string(),
        affected_population: 0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_keep_a_total_order() {
    let manager = Arc::new(CoordinationManager::default());
    let room_id = manager.create_room(room("Quake Sector 4")).await.unwrap().id;

    let mut handles = Vec::new();
    for writer in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            for index in 0..25 {
                manager
                    .append_event(
                        room_id,
                        NewEvent::system(
                            TimelineEventType::SituationUpdate,
                            format!("writer {writer} report {index}"),
                        ),
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let events = manager.recent_events(room_id, Some(1_000)).await.unwrap();
    assert_eq!(events.len(), 201);
    let sequences: HashSet<u64> = events.iter().map(|event| event.sequence).collect();
    assert_eq!(sequences.len(), 201);
    for window in events.windows(2) {
        assert!(window[0].timestamp_ms >= window[1].timestamp_ms);
        assert!(window[0].sequence > window[1].sequence);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rooms_update_independently() {
    let manager = Arc::new(CoordinationManager::default());
    let mut rooms = Vec::new();
    for index in 0..6 {
        rooms.push(
            manager
                .create_room(room(&format!("Quake Sector {index}")))
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for room in &rooms {
        let manager = manager.clone();
        let room_id = room.id;
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                manager
                    .update_status(
                        room_id,
                        StatusUpdate::to(RoomStatus::Active).with_resources(ResourceDelta {
                            personnel: 5,
                            ..ResourceDelta::default()
                        }),
                    )
                    .await
                    .unwrap();
                manager
                    .create_task(room_id, NewTask::new("Search collapsed block", TaskPriority::High))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for room in &rooms {
        let state = manager.get_room(room.id).await.unwrap();
        assert_eq!(state.resources_deployed.personnel, 100);
        assert_eq!(state.active_tasks, 20);
        assert_eq!(manager.tasks_for_room(room.id, None).await.unwrap().len(), 20);
    }

    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.rooms_total, 6);
    assert_eq!(snapshot.tasks_total, 120);
}
