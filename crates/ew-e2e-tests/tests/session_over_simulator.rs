//! E2E tests driving `ew_elm327::Session` directly over the simulated
//! adapter, without the BLE layer.

use std::time::Duration;

use ew_elm327::sim::SimulatedElm327;
use ew_elm327::types::{DEFAULT_MAX_LINE_LEN, INIT_SEQUENCE};
use ew_elm327::{Measurement, Session, SessionConfig, SessionState, spawn_line_reader};

fn config() -> SessionConfig {
    SessionConfig {
        command_timeout: Duration::from_millis(250),
        poll_interval: Duration::from_millis(100),
        reset_settle: Duration::from_millis(100),
        command_spacing: Duration::from_millis(5),
    }
}

#[tokio::test(start_paused = true)]
async fn e2e_session_initializes_simulator() {
    let (sim, chunks) = SimulatedElm327::with_mtu(7);
    let (lines, _reader) = spawn_line_reader(chunks, DEFAULT_MAX_LINE_LEN);
    let mut session = Session::new(&sim, lines, config());

    session.initialize().await.unwrap();

    assert_eq!(session.state(), SessionState::Polling);
    assert_eq!(sim.received(), INIT_SEQUENCE);
    assert_eq!(session.stats().timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn e2e_poll_cycles_track_changing_values() {
    let (sim, chunks) = SimulatedElm327::with_mtu(2);
    let (lines, _reader) = spawn_line_reader(chunks, DEFAULT_MAX_LINE_LEN);
    let mut session = Session::new(&sim, lines, config());
    session.initialize().await.unwrap();

    let first = session.poll_cycle().await.unwrap();
    sim.set_pid(0x0C, &[0x0B, 0xB8]);
    sim.set_pid(0x05, &[0x28]);
    let second = session.poll_cycle().await.unwrap();

    assert_eq!(
        first,
        [
            Measurement::EngineRpm(1726),
            Measurement::VehicleSpeedKmh(60),
            Measurement::CoolantTempC(83),
        ]
    );
    assert_eq!(
        second,
        [
            Measurement::EngineRpm(750),
            Measurement::VehicleSpeedKmh(60),
            Measurement::CoolantTempC(0),
        ]
    );
    assert_eq!(session.stats().cycles, 2);
}

#[tokio::test(start_paused = true)]
async fn e2e_headers_left_on_are_not_decoded() {
    let (sim, chunks) = SimulatedElm327::new();
    let (lines, _reader) = spawn_line_reader(chunks, DEFAULT_MAX_LINE_LEN);
    let mut session = Session::new(&sim, lines, config());
    session.initialize().await.unwrap();

    // an adapter that ignored ATH0 prefixes every reply with the CAN id
    sim.respond("ATH1");
    let measurements = session.poll_cycle().await.unwrap();

    assert!(measurements.is_empty());
    assert_eq!(session.stats().timeouts, 3);
}
