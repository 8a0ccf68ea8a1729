use ligtask_progress::{
    Difficulty, MemoryBackend, NextStage, ProgressionEngine, ProgressionService, TERMINAL_SCENE,
};

const ORDER: [&str; 5] = ["Typhoon", "Earthquake", "Flood", "Landslide", "Volcano"];

fn fresh() -> ProgressionService<MemoryBackend> {
    ProgressionEngine::default().in_memory().unwrap()
}

fn unlocked(service: &ProgressionService<MemoryBackend>) -> Vec<bool> {
    service
        .store()
        .list_disaster_progress()
        .iter()
        .map(|row| row.is_unlocked)
        .collect()
}

/// Plays every Easy stage before the quiz at full marks, then the quiz.
fn clear_easy(service: &mut ProgressionService<MemoryBackend>, disaster: &str, quiz_score: i32) -> bool {
    let stages = service
        .registry()
        .stages(disaster, Difficulty::Easy)
        .map(<[String]>::len)
        .unwrap();
    let quiz = i32::try_from(stages - 1).unwrap();
    for index in 0..quiz {
        assert!(service.can_enter_stage(disaster, Difficulty::Easy, index));
        assert!(service.complete_stage(disaster, Difficulty::Easy, index, 100, 100).passed);
    }
    assert!(service.can_enter_stage(disaster, Difficulty::Quiz, quiz));
    service
        .complete_stage(disaster, Difficulty::Quiz, quiz, quiz_score, 100)
        .passed
}

#[test]
fn first_session_walkthrough() {
    let mut service = fresh();
    assert_eq!(service.store().list_disaster_progress().len(), 5);
    assert_eq!(unlocked(&service), [true, false, false, false, false]);

    let first = service.select_track("Typhoon", Difficulty::Easy).unwrap();
    assert_eq!(first, "TyphoonEasy");

    let handoff = service.complete_stage("Typhoon", Difficulty::Easy, 0, 65, 100);
    assert!(handoff.passed);
    let row = service.store().get_disaster_progress("Typhoon").unwrap();
    assert!(row.easy_completed);
    assert!(service.store().is_stage_passed("Typhoon", Difficulty::Easy, 0));
    assert_eq!(service.peek_next_stage("Typhoon", Difficulty::Easy), Some("Evacuate"));

    for index in 1..4 {
        service.complete_stage("Typhoon", Difficulty::Easy, index, 80, 100);
    }
    let quiz = service.complete_stage("Typhoon", Difficulty::Quiz, 4, 75, 100);
    assert!(quiz.passed);
    let row = service.store().get_disaster_progress("Typhoon").unwrap();
    assert!(row.quiz_completed);
    assert!(row.hard_unlocked);
    assert_eq!(unlocked(&service), [true, true, false, false, false]);

    let step = service.next_stage("Typhoon", Difficulty::Easy).unwrap();
    assert!(step.is_complete());
    assert_eq!(service.scene_for(&step), TERMINAL_SCENE);
}

#[test]
fn campaign_unlocks_one_disaster_at_a_time() {
    let mut service = fresh();
    for (position, disaster) in ORDER.iter().enumerate() {
        assert!(service.can_select_track(disaster, Difficulty::Easy));
        if let Some(next) = ORDER.get(position + 1) {
            assert!(!service.can_select_track(next, Difficulty::Easy));
        }
        assert!(clear_easy(&mut service, disaster, 90));
        assert!(service.can_select_track(disaster, Difficulty::Hard));
    }
    assert!(unlocked(&service).iter().all(|flag| *flag));
}

#[test]
fn failing_the_quiz_unlocks_nothing() {
    let mut service = fresh();
    assert!(!clear_easy(&mut service, "Typhoon", 69));
    let row = service.store().get_disaster_progress("Typhoon").unwrap();
    assert!(row.easy_completed);
    assert!(!row.quiz_completed);
    assert!(!row.hard_unlocked);
    assert_eq!(unlocked(&service), [true, false, false, false, false]);

    let retry = service.complete_stage("Typhoon", Difficulty::Quiz, 4, 70, 100);
    assert!(retry.passed);
    assert_eq!(unlocked(&service), [true, true, false, false, false]);
}

#[test]
fn thresholds_match_the_reference_scores() {
    let mut service = fresh();
    assert!(service.complete_stage("Typhoon", Difficulty::Easy, 0, 60, 100).passed);
    assert!(!service.complete_stage("Typhoon", Difficulty::Easy, 2, 59, 100).passed);
    assert!(!service.complete_stage("Typhoon", Difficulty::Quiz, 4, 69, 100).passed);
    assert!(service.complete_stage("Typhoon", Difficulty::Quiz, 4, 70, 100).passed);
}

#[test]
fn hard_track_runs_to_completion() {
    let mut service = fresh();
    clear_easy(&mut service, "Typhoon", 100);
    assert_eq!(
        service.select_track("Typhoon", Difficulty::Hard).as_deref(),
        Some("TyphoonHard")
    );
    let mut played = vec!["TyphoonHard".to_string()];
    let mut index = 0;
    loop {
        let handoff = service.complete_stage("Typhoon", Difficulty::Hard, index, 100, 100);
        assert!(handoff.allows_continue());
        match service.next_stage("Typhoon", Difficulty::Hard).unwrap() {
            NextStage::Stage(id) => played.push(id),
            NextStage::Complete => break,
        }
        index += 1;
    }
    assert_eq!(played.len(), 5);
    assert!(service.store().get_disaster_progress("Typhoon").unwrap().hard_completed);
    // Hard completion does not touch the unlock chain.
    assert_eq!(unlocked(&service), [true, true, false, false, false]);
}

#[test]
fn failed_retry_keeps_the_earlier_pass() {
    let mut service = fresh();
    service.complete_stage("Typhoon", Difficulty::Easy, 1, 90, 100);
    let retry = service.complete_stage("Typhoon", Difficulty::Easy, 1, 5, 100);
    assert!(!retry.passed);
    assert_eq!(retry.retry_label(), "Retry");
    assert!(service.store().is_stage_passed("Typhoon", Difficulty::Easy, 1));
    assert_eq!(
        service
            .store()
            .get_mini_game_progress("Typhoon", Difficulty::Easy)
            .len(),
        1
    );
}

#[test]
fn unknown_names_never_write() {
    let mut service = fresh();
    let handoff = service.complete_stage("Tsunami", Difficulty::Easy, 0, 100, 100);
    assert!(handoff.stage_id.is_none());
    assert!(service.store().list_mini_game_progress().is_empty());
    assert!(service.select_track("Tsunami", Difficulty::Easy).is_none());
    assert!(service.next_stage("Tsunami", Difficulty::Easy).is_none());
}
