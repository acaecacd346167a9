use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use worklist_cell::{
    derive_state, sort_worklist, BlockingInfo, BookedAppointment, Pool, RowState, WorklistItem,
    WorklistKey, WorklistLocalState, WorklistRecord,
};

fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid timestamp")
}

fn make_item(patient_name: &str, step_code: &str) -> WorklistItem {
    WorklistItem {
        patient_id: Uuid::new_v4(),
        episode_id: Some(Uuid::new_v4()),
        patient_name: patient_name.to_string(),
        stage: "treatment".to_string(),
        next_step_label: "Control visit".to_string(),
        step_code: step_code.to_string(),
        step_sequence: 1,
        pool: Pool::Control,
        duration_minutes: 20,
        window_start: ts(2025, 3, 10, 8),
        window_end: ts(2025, 3, 24, 17),
        overdue_by_days: 0,
        blocking: None,
        requires_precommit: false,
        forecast: None,
        booked_appointment: None,
    }
}

fn booked_appt() -> BookedAppointment {
    BookedAppointment {
        appointment_id: Uuid::new_v4(),
        start_time: ts(2025, 4, 1, 9),
        provider_id: Uuid::new_v4(),
        provider_name: "Dr. Vos".to_string(),
    }
}

fn blocked_info() -> BlockingInfo {
    BlockingInfo {
        code: BlockingInfo::NO_PATHWAY.to_string(),
        reason: "No treatment pathway assigned".to_string(),
        remedy: Some("Assign a pathway".to_string()),
    }
}

#[test]
fn ready_is_the_default_state() {
    let item = make_item("Jansen", "C30");
    let overlay = WorklistLocalState::new();
    assert_eq!(derive_state(&item, &overlay), RowState::Ready);
}

#[test]
fn booked_wins_over_every_other_condition() {
    let mut item = make_item("Jansen", "C30");
    item.booked_appointment = Some(booked_appt());
    item.blocking = Some(blocked_info());

    let mut overlay = WorklistLocalState::new();
    overlay.in_flight.insert(item.key());
    overlay.needs_review.insert(item.key());

    assert_eq!(derive_state(&item, &overlay), RowState::Booked);
}

#[test]
fn in_progress_wins_over_review_and_blocked() {
    let mut item = make_item("Jansen", "C30");
    item.blocking = Some(blocked_info());

    let mut overlay = WorklistLocalState::new();
    overlay.in_flight.insert(item.key());
    overlay.needs_review.insert(item.key());

    assert_eq!(derive_state(&item, &overlay), RowState::BookingInProgress);
}

#[test]
fn needs_review_wins_over_blocked() {
    let mut item = make_item("Jansen", "C30");
    item.blocking = Some(blocked_info());

    let mut overlay = WorklistLocalState::new();
    overlay.needs_review.insert(item.key());

    assert_eq!(derive_state(&item, &overlay), RowState::NeedsReview);
}

#[test]
fn blocked_without_overlay_markers() {
    let mut item = make_item("Jansen", "C30");
    item.blocking = Some(blocked_info());

    let overlay = WorklistLocalState::new();
    assert_eq!(derive_state(&item, &overlay), RowState::Blocked);
}

#[test]
fn derivation_is_deterministic_for_identical_inputs() {
    let mut item = make_item("Jansen", "C30");
    item.blocking = Some(blocked_info());
    let mut overlay = WorklistLocalState::new();
    overlay.needs_review.insert(item.key());

    let first = derive_state(&item, &overlay);
    let second = derive_state(&item, &overlay);
    assert_eq!(first, second);
}

#[test]
fn only_ready_rows_are_batch_eligible() {
    assert!(RowState::Ready.is_batch_eligible());
    assert!(!RowState::Booked.is_batch_eligible());
    assert!(!RowState::BookingInProgress.is_batch_eligible());
    assert!(!RowState::NeedsReview.is_batch_eligible());
    assert!(!RowState::Blocked.is_batch_eligible());
}

#[test]
fn overdue_ready_sorts_before_ready() {
    let mut a = make_item("Bakker", "C30");
    a.overdue_by_days = 3;
    a.window_end = ts(2025, 3, 30, 17);
    let b = make_item("Alders", "C30");

    let overlay = WorklistLocalState::new();
    let mut items = vec![b.clone(), a.clone()];
    sort_worklist(&mut items, &overlay);

    assert_eq!(items[0].patient_name, "Bakker");
    assert_eq!(items[1].patient_name, "Alders");
}

#[test]
fn ready_sorts_before_blocked_before_booked() {
    let ready = make_item("Cuypers", "C10");
    let mut blocked = make_item("Aalders", "C20");
    blocked.blocking = Some(blocked_info());
    let mut booked = make_item("Bos", "C30");
    booked.booked_appointment = Some(booked_appt());

    let overlay = WorklistLocalState::new();
    let mut items = vec![booked, blocked, ready];
    sort_worklist(&mut items, &overlay);

    assert_eq!(items[0].patient_name, "Cuypers");
    assert_eq!(items[1].patient_name, "Aalders");
    assert_eq!(items[2].patient_name, "Bos");
}

#[test]
fn soonest_window_deadline_breaks_rank_ties() {
    let mut late = make_item("Jansen", "C30");
    late.window_end = ts(2025, 4, 20, 17);
    let mut soon = make_item("Peters", "C30");
    soon.window_end = ts(2025, 3, 18, 17);

    let overlay = WorklistLocalState::new();
    let mut items = vec![late, soon];
    sort_worklist(&mut items, &overlay);

    assert_eq!(items[0].patient_name, "Peters");
}

#[test]
fn patient_name_then_key_break_remaining_ties() {
    let mut a = make_item("Jansen", "C30");
    let mut b = make_item("Jansen", "C30");
    // Same name and window; the key decides, so two sorts agree.
    a.window_end = ts(2025, 3, 24, 17);
    b.window_end = ts(2025, 3, 24, 17);

    let overlay = WorklistLocalState::new();
    let mut first = vec![a.clone(), b.clone()];
    let mut second = vec![b, a];
    sort_worklist(&mut first, &overlay);
    sort_worklist(&mut second, &overlay);

    let keys_first: Vec<WorklistKey> = first.iter().map(WorklistItem::key).collect();
    let keys_second: Vec<WorklistKey> = second.iter().map(WorklistItem::key).collect();
    assert_eq!(keys_first, keys_second);
}

#[test]
fn overdue_days_computed_from_server_time() {
    let record = WorklistRecord {
        patient_id: Uuid::new_v4(),
        episode_id: None,
        patient_name: "Jansen".to_string(),
        stage: "treatment".to_string(),
        next_step_label: "Control visit".to_string(),
        step_code: "C30".to_string(),
        step_sequence: 1,
        pool: Pool::Control,
        duration_minutes: 20,
        window_start: ts(2025, 3, 1, 8),
        window_end: ts(2025, 3, 10, 17),
        blocking: None,
        requires_precommit: false,
        forecast: None,
        booked_appointment: None,
    };

    let item = WorklistItem::from_record(record.clone(), ts(2025, 3, 13, 9));
    assert_eq!(item.overdue_by_days, 3);
    assert!(item.is_overdue());

    let not_due = WorklistItem::from_record(record, ts(2025, 3, 8, 9));
    assert_eq!(not_due.overdue_by_days, 0);
    assert!(!not_due.is_overdue());
}

#[test]
fn stale_booked_appointment_is_dropped_at_fetch() {
    let mut record = WorklistRecord {
        patient_id: Uuid::new_v4(),
        episode_id: None,
        patient_name: "Jansen".to_string(),
        stage: "treatment".to_string(),
        next_step_label: "Control visit".to_string(),
        step_code: "C30".to_string(),
        step_sequence: 1,
        pool: Pool::Control,
        duration_minutes: 20,
        window_start: ts(2025, 3, 1, 8),
        window_end: ts(2025, 3, 10, 17),
        blocking: None,
        requires_precommit: false,
        forecast: None,
        booked_appointment: None,
    };
    record.booked_appointment = Some(BookedAppointment {
        appointment_id: Uuid::new_v4(),
        start_time: ts(2025, 3, 5, 9),
        provider_id: Uuid::new_v4(),
        provider_name: "Dr. Vos".to_string(),
    });

    let item = WorklistItem::from_record(record, ts(2025, 3, 13, 9));
    assert!(item.booked_appointment.is_none());

    let overlay = WorklistLocalState::new();
    assert_eq!(derive_state(&item, &overlay), RowState::Ready);
}
