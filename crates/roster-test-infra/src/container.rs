use crate::Result;
use std::future::Future;
use std::time::Duration;
use testcontainers::{ContainerAsync, GenericImage};

/// A running container and the port its database listens on inside it.
pub(crate) struct ServiceContainer {
    container: ContainerAsync<GenericImage>,
    port: u16,
}

impl ServiceContainer {
    pub(crate) fn new(container: ContainerAsync<GenericImage>, port: u16) -> Self {
        Self { container, port }
    }

    /// Host and mapped port the database is reachable on from the test process.
    pub(crate) async fn address(&self) -> Result<(String, u16)> {
        let host = self.container.get_host().await?.to_string();
        let port = self.container.get_host_port_ipv4(self.port).await?;
        Ok((host, port))
    }
}

/// Runs `attempt` up to `attempts` times, sleeping `delay` between failures.
///
/// Databases often log readiness before they accept clients, so fixtures
/// retry their first connection.
pub(crate) async fn retry<T, E, F, Fut>(
    attempts: usize,
    delay: Duration,
    mut attempt: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tries >= attempts => return Err(err),
            Err(_) => {
                tries += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
