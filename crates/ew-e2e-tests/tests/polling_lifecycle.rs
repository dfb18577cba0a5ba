//! E2E tests for the happy path:
//! scan → connect → subscribe → init sequence → polling → presenter output.

mod helpers;

use helpers::TestHarness;

use ew_elm327::types::{INIT_SEQUENCE, POLL_SEQUENCE};

#[tokio::test(start_paused = true)]
async fn e2e_text_output_for_two_cycles() {
    let h = TestHarness::new();

    let outcome = h.run_for_lines(6).await;

    assert_eq!(
        &outcome.lines()[..6],
        [
            "Engine RPM: 1726 rpm",
            "Vehicle Speed: 60 km/h",
            "Coolant Temperature: 83 °C",
            "Engine RPM: 1726 rpm",
            "Vehicle Speed: 60 km/h",
            "Coolant Temperature: 83 °C",
        ]
    );
    let stats = outcome.stats();
    assert!(stats.cycles >= 2);
    assert_eq!(stats.timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn e2e_adapter_sees_init_then_poll_commands() {
    let h = TestHarness::new();

    h.run_for_lines(3).await.stats();

    let received = h.adapter.received();
    assert_eq!(&received[..INIT_SEQUENCE.len()], INIT_SEQUENCE);
    assert_eq!(
        &received[INIT_SEQUENCE.len()..INIT_SEQUENCE.len() + POLL_SEQUENCE.len()],
        POLL_SEQUENCE
    );

    let settings = h.adapter.settings();
    assert!(!settings.echo);
    assert!(!settings.linefeeds);
    assert!(!settings.spaces);
    assert!(!settings.headers);
}

#[tokio::test(start_paused = true)]
async fn e2e_one_byte_notifications_decode_identically() {
    let h = TestHarness::with_mtu(1);

    let outcome = h.run_for_lines(3).await;

    assert_eq!(
        &outcome.lines()[..3],
        [
            "Engine RPM: 1726 rpm",
            "Vehicle Speed: 60 km/h",
            "Coolant Temperature: 83 °C",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn e2e_json_output_lines() {
    let h = TestHarness::new().json_output();

    let outcome = h.run_for_lines(3).await;

    let records: Vec<serde_json::Value> = outcome
        .lines()
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records[0]["kind"], "engine_rpm");
    assert_eq!(records[0]["value"], 1726);
    assert_eq!(records[0]["pid"], "410C");
    assert_eq!(records[1]["kind"], "vehicle_speed_kmh");
    assert_eq!(records[1]["unit"], "km/h");
    assert_eq!(records[2]["kind"], "coolant_temp_c");
    assert_eq!(records[2]["value"], 83);
    assert!(records.iter().all(|r| r["timestamp"].is_string()));
}

#[tokio::test(start_paused = true)]
async fn e2e_values_follow_the_vehicle() {
    let h = TestHarness::new();

    // once the first cycle is printed: 3000 rpm, 112 km/h, -40 °C
    let outcome = h
        .run_with(|h, buf, _| match buf.line_count() {
            n if n >= 6 => h.stop(),
            n if n >= 3 => {
                h.adapter.set_pid(0x0C, &[0x2E, 0xE0]);
                h.adapter.set_pid(0x0D, &[0x70]);
                h.adapter.set_pid(0x05, &[0x00]);
            }
            _ => {}
        })
        .await;

    assert_eq!(
        &outcome.lines()[..6],
        [
            "Engine RPM: 1726 rpm",
            "Vehicle Speed: 60 km/h",
            "Coolant Temperature: 83 °C",
            "Engine RPM: 3000 rpm",
            "Vehicle Speed: 112 km/h",
            "Coolant Temperature: -40 °C",
        ]
    );
}
