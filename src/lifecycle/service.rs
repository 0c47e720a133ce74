//! Managed-service contract.

use async_trait::async_trait;

/// A component with a start/close lifecycle supervised by the process.
#[async_trait]
pub trait Service: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<(), Self::Error>;

    async fn close(&mut self) -> Result<(), Self::Error>;
}

/// Services started and closed as one unit.
pub struct ServiceGroup<S> {
    services: Vec<S>,
}

impl<S: Service> ServiceGroup<S> {
    pub fn new(services: Vec<S>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[S] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Start every service in order. On the first failure the services
    /// touched so far are closed again and the error is returned.
    pub async fn start_all(&mut self) -> Result<(), S::Error> {
        for i in 0..self.services.len() {
            if let Err(e) = self.services[i].start().await {
                tracing::error!(error = %e, "Service start failed");
                for service in self.services[..=i].iter_mut().rev() {
                    close_logged(service).await;
                }
                return Err(e);
            }
            tracing::info!(service = %self.services[i].name(), "Service started");
        }
        Ok(())
    }

    /// Close the current services, then start `next` in their place.
    ///
    /// When `next` fails to start the group is left empty and the error is
    /// returned; a later reload can still succeed.
    pub async fn reload(&mut self, next: Vec<S>) -> Result<(), S::Error> {
        self.close_all().await;
        self.services = next;
        let result = self.start_all().await;
        if result.is_err() {
            self.services.clear();
        }
        result
    }

    /// Close every service in reverse order.
    pub async fn close_all(&mut self) {
        for service in self.services.iter_mut().rev() {
            close_logged(service).await;
        }
    }
}

async fn close_logged<S: Service>(service: &mut S) {
    if let Err(e) = service.close().await {
        tracing::warn!(service = %service.name(), error = %e, "Service close failed");
    }
}
