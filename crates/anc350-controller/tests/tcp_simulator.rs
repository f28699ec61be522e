use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anc350_controller::{
    AxisStatus, Controller, ControllerConfig, ControllerError, EngineConfig, Fault, Poller,
    PollerConfig, Simulator,
};
use anc350_telegram::address;

fn connect(sim: &Simulator, axes: usize) -> Controller<anc350_transport::ControllerStream> {
    let addr = sim.spawn("127.0.0.1:0").expect("simulator should bind");
    let config = ControllerConfig {
        axes,
        engine: EngineConfig {
            read_timeout: Duration::from_millis(500),
            ..EngineConfig::default()
        },
        poller: PollerConfig {
            moving_period: Duration::from_millis(10),
            idle_period: Duration::from_millis(50),
        },
        ..ControllerConfig::default()
    };
    Controller::connect(&addr.to_string(), config).expect("controller should connect")
}

#[test]
fn connect_reads_initial_state() {
    let sim = Simulator::new(3);
    sim.set_register(address::COUNTER, 2, 125_000);
    sim.set_register(address::REFCOUNTER, 2, 25_000);
    sim.set_register(address::STATUS, 2, address::status::ENABLE | address::status::REF_VALID);

    let controller = connect(&sim, 3);
    let report = controller.report();

    assert_eq!(report.len(), 3);
    assert_eq!(report[2].axis, 3);
    assert_eq!(report[2].position, 100_000);
    assert!(report[2].homed);
    assert!(!report[0].homed);
    assert!(report.iter().all(|s| s.has_encoder && s.done));
    assert_eq!(controller.health().failures(), 0);
}

#[test]
fn get_set_over_tcp() {
    let sim = Simulator::new(2);
    let controller = connect(&sim, 2);

    controller.set(1, address::AMPL, 45_000).unwrap();
    assert_eq!(controller.get(1, address::AMPL).unwrap(), 45_000);
    assert_eq!(sim.register(address::AMPL, 1), 45_000);

    controller.set_indexed(address::TRG_LOW, 4, -1_000).unwrap();
    assert_eq!(controller.get_indexed(address::TRG_LOW, 4).unwrap(), -1_000);
}

#[test]
fn silent_controller_times_out_and_recovers() {
    let sim = Simulator::new(1);
    let controller = connect(&sim, 1);

    sim.inject(Fault::Silence);
    let started = Instant::now();
    let err = controller.get(0, address::STATUS).unwrap_err();
    assert!(matches!(err, ControllerError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(controller.health().failures(), 1);

    controller.get(0, address::STATUS).unwrap();
    assert_eq!(controller.health().failures(), 0);
}

#[test]
fn poller_follows_a_homing_run() {
    let sim = Simulator::new(1);
    sim.set_register(address::COUNTER, 0, 9_000);
    let controller = Arc::new(connect(&sim, 1));

    let seen = Arc::new(Mutex::new(Vec::<AxisStatus>::new()));
    let sink = Arc::clone(&seen);
    controller.subscribe(move |status: &AxisStatus| sink.lock().unwrap().push(status.clone()));

    let poller = Poller::spawn(Arc::clone(&controller)).unwrap();
    controller.home(0, false).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if seen.lock().unwrap().iter().any(|s| s.homed && s.done) {
            break;
        }
        assert!(Instant::now() < deadline, "homing never completed");
        thread::sleep(Duration::from_millis(5));
    }
    poller.stop();

    assert_eq!(sim.register(address::CONT_BKWD, 0), 1);
    assert_eq!(sim.register(address::SGL_FWD, 0), 1);
    let status = controller.snapshot(0).unwrap();
    assert_eq!(status.reference, 9_000);
    assert_eq!(status.position, 0);
}

#[test]
fn concurrent_axes_over_one_connection() {
    let sim = Simulator::new(3);
    let controller = Arc::new(connect(&sim, 3));
    let poller = Poller::spawn(Arc::clone(&controller)).unwrap();

    let workers: Vec<_> = (0..3)
        .map(|axis| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                for step in 1..=20 {
                    let target = (axis as i32 + 1) * 10_000 + step;
                    controller.move_to(axis, target, false).unwrap();
                    assert_eq!(controller.get(axis, address::TARGET).unwrap(), target);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    poller.stop();

    for axis in 0..3 {
        let status = controller.update_axis(axis).unwrap();
        assert_eq!(status.position, (axis as i32 + 1) * 10_000 + 20);
    }
    assert_eq!(controller.health().failures(), 0);
}
