//! S4: outbound byte-stuffing escape sequence.
//! S5: with one normal and one priority send queued, the next pump
//! iteration drains the priority entry first.
//!
//! §6's literal S4 byte sequence has no explicit length field between the
//! sync byte and the escaped payload; this workspace's uplink parser adds
//! a one-byte length prefix to find a message's end inside a byte-stuffed
//! stream without relying on a reserved terminator (documented in
//! `lon_usb::uplink`'s module doc). The frame this test builds therefore
//! carries that length byte; the escape/checksum bytes themselves match
//! §6/S4 exactly.

use lon_usb::{frame, SendKind, UsbLinkDriver, WireProfile};

#[test]
fn s4_outbound_payload_is_escaped_and_checksummed() {
    let payload = [0x7Eu8, 0x01, 0x0F];
    let mut escaped = Vec::new();
    frame::escape_into(&payload, &mut escaped);
    assert_eq!(escaped, vec![0x0F, 0x7E, 0x01, 0x0F, 0x0F]);

    let check = frame::checksum(&payload);
    let mut frame_bytes = vec![frame::SYNC, 0x00, payload.len() as u8];
    frame_bytes.extend_from_slice(&escaped);
    frame_bytes.push(check);
    assert_eq!(
        frame_bytes,
        vec![0x7E, 0x00, 0x03, 0x0F, 0x7E, 0x01, 0x0F, 0x0F, check]
    );
}

#[test]
fn s5_priority_send_drains_before_normal_send() {
    let driver = UsbLinkDriver::new(WireProfile::U61);
    driver.enqueue_tx(SendKind::Message, vec![1]).unwrap();
    driver
        .enqueue_tx(SendKind::CodePacket, vec![2])
        .unwrap();

    let (kind, bytes) = driver.next_tx(0).unwrap();
    assert_eq!(kind, SendKind::CodePacket);
    assert_eq!(bytes, vec![2]);
}
