// SPDX-License-Identifier: GPL-3.0-only

use storage_ops::RunnerEvent;
use storage_testing::fixtures::Rig;
use storage_testing::scenario::{self, Scenario};

fn shipped() -> Vec<Scenario> {
    let mut scenarios = Vec::new();
    for entry in std::fs::read_dir(scenario::scenarios_root()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            scenarios.push(scenario::load_path(&path).unwrap());
        }
    }
    scenarios.sort_by(|a, b| a.name.cmp(&b.name));
    scenarios
}

#[test]
fn every_shipped_scenario_queues() {
    let scenarios = shipped();
    assert!(scenarios.len() >= 3);
    for scenario in scenarios {
        let rig = Rig::new(scenario.devices().unwrap());
        let outcomes = scenario.queue(&rig.stack).unwrap();
        assert_eq!(outcomes.len(), scenario.operations.len(), "{}", scenario.name);
    }
}

#[test]
fn new_partition_scenario_applies_cleanly() {
    let scenario = scenario::load("new-partition").unwrap();
    let rig = Rig::new(scenario.devices().unwrap());
    scenario.queue(&rig.stack).unwrap();

    let outcome = rig.apply();
    assert_eq!(outcome.last_event(), Some(&RunnerEvent::Finished));
    assert_eq!(rig.backend.partitions(&scenario.device.node).len(), 1);
}
