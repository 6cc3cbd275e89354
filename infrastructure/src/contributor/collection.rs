use super::exchange::InMemoryFileExchange;
use super::simulated::SimulatedContributor;
use bitrelay_application::{ClientSettings, MessageBus, MessageSender};
use bitrelay_domain::ContributorId;
use std::sync::Arc;
use tracing::info;

/// The simulated contributors of one collection, attached to a bus.
pub struct SimulatedCollection {
    contributors: Vec<Arc<SimulatedContributor>>,
    exchange: Arc<InMemoryFileExchange>,
}

impl SimulatedCollection {
    /// Start one contributor per entry of `settings.contributors`.
    pub fn spawn<B>(bus: &Arc<B>, settings: &ClientSettings) -> Self
    where
        B: MessageBus + 'static,
    {
        let exchange = InMemoryFileExchange::new();
        let sender: Arc<dyn MessageSender> = bus.clone();
        let contributors: Vec<_> = settings
            .contributors
            .iter()
            .map(|id| {
                let contributor = SimulatedContributor::new(
                    id.clone(),
                    &settings.collection_id,
                    Arc::clone(&sender),
                    Arc::clone(&exchange),
                );
                contributor.attach(bus.as_ref(), &settings.collection_destination);
                contributor
            })
            .collect();
        info!(
            "Simulated collection '{}' with {} contributor(s)",
            settings.collection_id,
            contributors.len()
        );
        Self {
            contributors,
            exchange,
        }
    }

    pub fn exchange(&self) -> &Arc<InMemoryFileExchange> {
        &self.exchange
    }

    pub fn contributors(&self) -> &[Arc<SimulatedContributor>] {
        &self.contributors
    }

    pub fn get(&self, id: &ContributorId) -> Option<&Arc<SimulatedContributor>> {
        self.contributors.iter().find(|c| c.id() == id)
    }

    /// Seed the same file at every contributor.
    pub fn store_everywhere(&self, file_id: &str, content: &[u8]) {
        for contributor in &self.contributors {
            contributor.store_file(file_id, content.to_vec());
        }
    }
}
