use std::time::Duration;

use sdn_controller::ControllerOptions;

mod discovery;
mod forwarding;

/// Options with a short discovery cycle.
fn options() -> ControllerOptions {
    ControllerOptions::default()
        .discovery_interval(Duration::from_millis(50))
        .echo_stagger(Duration::from_millis(1))
}

/// Polls `condition` until it holds. Returns false if it still doesn't after 5 seconds.
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
