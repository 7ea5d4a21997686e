use std::time::Duration;

use musim_domain::{LoadDistribution, Workload, WorkloadClass};
use musim_worker::{approximate_pi, CpuBurnSimulator, LoadSampler};

#[test]
fn test_approximate_pi_converges() {
    let pi = approximate_pi(100_000);
    assert!((pi - std::f64::consts::PI).abs() < 1e-3);

    let coarse = approximate_pi(100);
    assert!((coarse - std::f64::consts::PI).abs() < 0.05);
}

#[test]
fn test_burn_for_runs_at_least_the_requested_time() {
    let elapsed = CpuBurnSimulator::burn_for(Duration::from_millis(30));
    assert!(elapsed >= Duration::from_millis(30));
}

#[test]
fn test_none_workload_returns_quickly() {
    let simulator = CpuBurnSimulator::default();
    let elapsed = simulator.execute(WorkloadClass::None);
    assert!(elapsed < Duration::from_millis(200));
}

#[test]
fn test_constant_workload_respects_scale_factor() {
    // low = 1000ms * 0.02 = 20ms
    let simulator = CpuBurnSimulator::new(LoadSampler::new(LoadDistribution::Constant, 0.02));
    let elapsed = simulator.execute(WorkloadClass::Low);
    assert!(elapsed >= Duration::from_millis(20));
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_execute_on_blocking_pool() {
    let simulator = CpuBurnSimulator::new(LoadSampler::new(LoadDistribution::Constant, 0.01));
    let handle = tokio::task::spawn_blocking(move || simulator.execute(WorkloadClass::Medium));
    let elapsed = handle.await.unwrap();
    assert!(elapsed >= Duration::from_millis(50));
}
