#![no_main]

//! Feeds arbitrary counts and forecasts through the controller and checks
//! that every cycle ends with exactly one group green.

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use greenwave::config::GreenwaveConfig;
use greenwave::engine::SignalController;
use greenwave::model::{
    CyclePrediction, CycleSnapshot, CycleTime, IntersectionPrediction, IntersectionSnapshot,
    RoadCount, RoadId,
};

const BYTES_PER_CYCLE: usize = 4 * 5 + 1;

fuzz_target!(|data: &[u8]| {
    let controller = SignalController::new(Arc::new(GreenwaveConfig::default()));
    let mut now = 0u64;

    for chunk in data.chunks_exact(BYTES_PER_CYCLE) {
        let mut snapshot = IntersectionSnapshot::new();
        let mut prediction = IntersectionPrediction::new();
        for (road, bytes) in RoadId::ALL.iter().zip(chunk.chunks_exact(5)) {
            // High bit of the first byte drops the road from the snapshot
            if bytes[0] & 0x80 == 0 {
                snapshot.insert(
                    *road,
                    RoadCount {
                        car: u32::from(bytes[0]),
                        ambulance: u32::from(bytes[1] & 0x01),
                        schoolbus: u32::from(bytes[2] & 0x07),
                        accident: u32::from(bytes[3] & 0x01),
                    },
                );
            }
            prediction = prediction.with(*road, f64::from(i8::from_ne_bytes([bytes[4]])));
        }
        now += u64::from(chunk[BYTES_PER_CYCLE - 1] & 0x0f);

        let report = controller.decide_cycle(
            &CycleSnapshot::new().with("1", snapshot),
            &CyclePrediction::new().with("1", prediction),
            &CycleTime::from_secs(now),
        );

        let green = report.intersections[0].green_roads();
        assert_eq!(green.len(), 2, "exactly one group must be green");
        assert_eq!(green[0].group(), green[1].group());
    }
});
