//! Filter accuracy on simulated scenarios, scored against ground truth.

use fusion_core::{FusionConfig, FusionEkf, RmseAccumulator, StepOutcome};
use sim::scenarios::{Scenario, ScenarioKind};

fn rmse_for(kind: ScenarioKind, seed: u64, config: FusionConfig) -> [f64; 4] {
    let packets = Scenario::build(kind, seed).generate();
    let mut ekf = FusionEkf::new(config);
    let mut acc = RmseAccumulator::new();

    for pack in &packets {
        let outcome = ekf.process_measurement(pack);
        assert!(
            !matches!(outcome, StepOutcome::UpdateSkipped { .. }),
            "unexpected skip at t={}: {outcome:?}",
            pack.timestamp
        );
        if let (Some(state), Some(gt)) = (ekf.state(), pack.ground_truth.as_ref()) {
            acc.accumulate(state, gt);
        }
    }

    let p = ekf.covariance().unwrap();
    assert_eq!(p, &p.transpose());

    let r = acc.rmse().unwrap();
    [r[0], r[1], r[2], r[3]]
}

#[test]
fn straight_line_fused() {
    let rmse = rmse_for(ScenarioKind::Straight, 1, FusionConfig::default());
    assert!(rmse[0] < 0.3 && rmse[1] < 0.3, "position rmse {rmse:?}");
    assert!(rmse[2] < 1.5 && rmse[3] < 1.5, "velocity rmse {rmse:?}");
}

#[test]
fn figure_eight_fused() {
    let rmse = rmse_for(ScenarioKind::Figure8, 2, FusionConfig::default());
    assert!(rmse[0] < 0.3 && rmse[1] < 0.3, "position rmse {rmse:?}");
    assert!(rmse[2] < 1.5 && rmse[3] < 1.5, "velocity rmse {rmse:?}");
}

#[test]
fn radar_only_is_worse_than_fused_but_bounded() {
    let radar_only = rmse_for(ScenarioKind::RadarOnly, 3, FusionConfig::default());
    assert!(radar_only[0] < 0.6 && radar_only[1] < 0.6, "position rmse {radar_only:?}");
    assert!(radar_only[2] < 2.0 && radar_only[3] < 2.0, "velocity rmse {radar_only:?}");
}

#[test]
fn disabling_radar_ignores_radar_packets() {
    let config = FusionConfig {
        use_radar: false,
        ..FusionConfig::default()
    };
    let packets = Scenario::build(ScenarioKind::Turning, 4).generate();
    let mut ekf = FusionEkf::new(config);
    let ignored = packets
        .iter()
        .filter(|p| matches!(ekf.process_measurement(p), StepOutcome::Ignored { .. }))
        .count();
    let radar_packets = packets
        .iter()
        .filter(|p| p.sensor() == fusion_core::SensorKind::Radar)
        .count();
    assert_eq!(ignored, radar_packets);
    assert!(ekf.is_initialized());
}
