mod common;

use std::time::Duration;

use common::{iface, write_nic_config, FakeHost};
use host_agent::config::watcher::DirWatcher;
use host_agent::lifecycle::{Shutdown, ShutdownMode};
use host_agent::nic::{worker, NicReconciler};

const MAC: &str = "aa:bb:cc:dd:ee:ff";

#[tokio::test]
async fn directory_provisioned_after_start_is_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let nics = dir.path().join("nics");
    let host: &'static FakeHost = Box::leak(Box::new(FakeHost::new(vec![iface("eth0", MAC, 1500)])));
    let shutdown = Shutdown::new();

    let (reconcile, task) = worker::spawn(NicReconciler::new(&nics, host), shutdown.subscribe());
    reconcile.request();
    let watch = DirWatcher::with_sender(&nics, reconcile.sender())
        .spawn_when_present(Duration::from_millis(50), shutdown.subscribe());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(host.ops().is_empty());

    // Provision the directory in one step, the way a config drive would.
    let staging = dir.path().join("staging");
    std::fs::create_dir(&staging).unwrap();
    write_nic_config(&staging, "eth0", r#"{"macAddress":"aa:bb:cc:dd:ee:ff","nicName":"wan0"}"#);
    std::fs::rename(&staging, &nics).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while host.link(MAC).iface.name != "wan0" {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("late directory never reconciled");

    shutdown.trigger(ShutdownMode::Graceful);
    task.await.unwrap();
    watch.await.unwrap();
}
