//! S3: a peer retransmitting the same tid within the 24s window is a
//! duplicate; a new tid from the same peer is not.

use lon_tcs::{Priority, TcsTable, ValidateResult};

const EVICT_AGE_MS: u64 = 24_000;

#[test]
fn s3_replayed_tid_within_window_is_suppressed() {
    let mut table = TcsTable::new(4);

    assert_eq!(
        table.validate_trans(Priority::Normal, 0, 5),
        ValidateResult::NotCurrent,
        "first arrival of tid=5 is new"
    );
    assert_eq!(
        table.validate_trans(Priority::Normal, 1_000, 5),
        ValidateResult::Current,
        "retransmit of tid=5 within 24s must be treated as a duplicate"
    );
}

#[test]
fn s3_different_tid_from_same_peer_is_handled() {
    let mut table = TcsTable::new(4);
    table.validate_trans(Priority::Normal, 0, 5);
    table.validate_trans(Priority::Normal, 1_000, 5);

    assert_eq!(
        table.validate_trans(Priority::Normal, 1_001, 6),
        ValidateResult::NotCurrent,
        "a distinct tid must be delivered to the application"
    );
}

#[test]
fn s3_replay_past_the_24s_window_is_a_new_transaction() {
    let mut table = TcsTable::new(4);
    table.validate_trans(Priority::Normal, 0, 5);

    assert_eq!(
        table.validate_trans(Priority::Normal, EVICT_AGE_MS, 5),
        ValidateResult::NotCurrent
    );
}
