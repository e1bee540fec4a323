//! BatcherClient - dispatcher and waiter over one queue

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use muxqueue::{CorrelationId, MuxDemuxQueue, Response};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ClientError;
use crate::events::{AgentMetadata, DomainEvent};
use crate::waiter::Waiter;

/// Client for sending stateful events and collecting their responses
#[derive(Clone)]
pub struct BatcherClient {
    dispatcher: Dispatcher,
    waiter: Waiter,
}

impl BatcherClient {
    pub fn new(queue: Arc<dyn MuxDemuxQueue>, poll_interval: Duration) -> Self {
        debug!(?poll_interval, "BatcherClient::new: called");
        Self {
            dispatcher: Dispatcher::new(queue.clone()),
            waiter: Waiter::new(queue, poll_interval),
        }
    }

    pub fn from_config(queue: Arc<dyn MuxDemuxQueue>, config: &ClientConfig) -> Self {
        Self::new(queue, config.poll_interval())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Submit one event without waiting for it
    pub fn send_event(&self, agent: &AgentMetadata, event: &DomainEvent) -> Result<CorrelationId, ClientError> {
        self.dispatcher.submit(agent, event)
    }

    /// Wait for the response to a previously sent event
    pub async fn get_response(&self, id: &CorrelationId) -> Result<Option<Response>, ClientError> {
        self.waiter.await_result(id).await
    }

    /// Send every event, then wait for all responses concurrently
    ///
    /// Outcomes are returned in input order. Each wait is bounded by
    /// `deadline`; an event that failed to submit yields its submit error.
    pub async fn send_events(
        &self,
        agent: &AgentMetadata,
        events: &[DomainEvent],
        deadline: Duration,
    ) -> Vec<Result<Option<Response>, ClientError>> {
        debug!(agent_id = %agent.id, count = events.len(), "BatcherClient::send_events: called");
        let submitted: Vec<Result<CorrelationId, ClientError>> =
            events.iter().map(|event| self.send_event(agent, event)).collect();

        let outcomes = join_all(submitted.into_iter().map(|submit| async move {
            let id = match submit {
                Ok(id) => id,
                Err(e) => return Err(e),
            };
            self.waiter.await_result_within(&id, deadline).await
        }))
        .await;

        let delivered = outcomes.iter().filter(|o| matches!(o, Ok(Some(_)))).count();
        info!(agent_id = %agent.id, sent = events.len(), delivered, "Events sent");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InventoryKind;
    use muxqueue::{MemoryQueue, QueueConfig};
    use serde_json::{Map, json};

    fn agent() -> AgentMetadata {
        AgentMetadata::new("001", vec!["default".to_string()])
    }

    fn event(name: &str) -> DomainEvent {
        DomainEvent::Inventory {
            kind: InventoryKind::Packages,
            data: json!({"package": {"name": name}}).as_object().cloned().unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_then_get_response() {
        let (queue, mut rx) = MemoryQueue::new(QueueConfig::default());
        let queue = Arc::new(queue);
        let client = BatcherClient::new(queue.clone(), Duration::from_millis(50));

        let id = client.send_event(&agent(), &event("openssl")).unwrap();
        let item = rx.recv().await.unwrap();
        let mut response = Map::new();
        response.insert("_index".to_string(), json!(item.destination));
        queue.record_result(&item.id, Some(response.clone())).unwrap();

        assert_eq!(client.get_response(&id).await.unwrap(), Some(response));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_events_keeps_input_order() {
        let (queue, mut rx) = MemoryQueue::new(QueueConfig::default());
        let queue = Arc::new(queue);
        let client = BatcherClient::new(queue.clone(), Duration::from_millis(50));

        let responder = {
            let queue = queue.clone();
            tokio::spawn(async move {
                // Answer in reverse order; the first item gets no result
                let mut items = Vec::new();
                for _ in 0..3 {
                    items.push(rx.recv().await.unwrap());
                }
                for (n, item) in items.iter().enumerate().rev() {
                    let response = (n > 0).then(|| {
                        let mut map = Map::new();
                        map.insert("n".to_string(), json!(n));
                        map
                    });
                    queue.record_result(&item.id, response).unwrap();
                }
                rx
            })
        };

        let events = [event("a"), event("b"), event("c")];
        let outcomes = client.send_events(&agent(), &events, Duration::from_secs(5)).await;
        let _rx = responder.await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].as_ref().unwrap(), &None);
        assert_eq!(outcomes[1].as_ref().unwrap().as_ref().unwrap()["n"], json!(1));
        assert_eq!(outcomes[2].as_ref().unwrap().as_ref().unwrap()["n"], json!(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_events_reports_per_event_failures() {
        let (queue, _rx) = MemoryQueue::new(QueueConfig::default());
        let client = BatcherClient::new(Arc::new(queue), Duration::from_millis(50));

        let empty = DomainEvent::Fim { data: Map::new() };
        let outcomes = client
            .send_events(&agent(), &[empty, event("openssl")], Duration::from_millis(300))
            .await;

        assert!(matches!(&outcomes[0], Err(e) if e.is_malformed()));
        assert!(matches!(&outcomes[1], Err(ClientError::Timeout { .. })));
    }

    #[test]
    fn test_from_config_uses_poll_interval() {
        let (queue, _rx) = MemoryQueue::new(QueueConfig::default());
        let config = ClientConfig {
            poll_interval_ms: 25,
            ..Default::default()
        };

        let client = BatcherClient::from_config(Arc::new(queue), &config);
        assert_eq!(client.waiter().poll_interval(), Duration::from_millis(25));
    }
}
