use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::config::Config;
use model::subscription::{Filter, StreamItem, SubscriptionId, Topic};
use utility::clock::Clock;
use utility::id::Id;

use actors::actor::{Actor, SupervisionStrategy};
use actors::handler::Handler;

use crate::messages::{CountSubscriptions, HeartbeatTick, Publish, Shutdown, Subscribe, SubscribeResponse, Unsubscribe};
use crate::queue::{channel, QueueSender};

struct Subscription {
    filter: Filter,
    sender: QueueSender,
    consecutive_drops: u64,
    deadline: Option<DateTime<Utc>>,
}

fn matches(filter: &Filter, item: &StreamItem) -> bool {
    match (filter, item) {
        (Filter::DriverLocations(f), StreamItem::DriverLocation(e)) => f.matches(e),
        (Filter::TripUpdates(f), StreamItem::TripUpdate(e)) => f.matches(e),
        (Filter::PricingUpdates(f), StreamItem::PricingUpdate(e)) => f.matches(e),
        // heartbeats and closing signals aren't topic-specific events; they're
        // pushed directly by HeartbeatTick/Shutdown, never routed through Publish.
        _ => false,
    }
}

fn item_topic(item: &StreamItem) -> Option<Topic> {
    match item {
        StreamItem::DriverLocation(_) => Some(Topic::DriverLocations),
        StreamItem::TripUpdate(_) => Some(Topic::TripUpdates),
        StreamItem::PricingUpdate(_) => Some(Topic::PricingUpdates),
        StreamItem::Heartbeat { .. } | StreamItem::Closing => None,
    }
}

/// Fan-out hub for the three streaming topics (§4.5). A handler panic
/// resumes with existing subscriptions intact; restarting would silently
/// sever every live SSE connection over a single bad message.
pub struct StreamBusActor {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl StreamBusActor {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            subscriptions: HashMap::new(),
            config,
            clock,
        }
    }
}

impl Actor for StreamBusActor {
    fn on_fail(&mut self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        tracing::error!(?error, "stream bus handler panicked, resuming with existing subscriptions");
        SupervisionStrategy::Resume
    }
}

#[async_trait]
impl Handler<Subscribe> for StreamBusActor {
    async fn handle(&mut self, msg: Subscribe) -> SubscribeResponse {
        let (sender, receiver) = channel(self.config.subscription_queue_capacity);
        let subscription_id: SubscriptionId = Id::new(uuid::Uuid::new_v4());
        self.subscriptions.insert(
            subscription_id,
            Subscription {
                filter: msg.filter,
                sender,
                consecutive_drops: 0,
                deadline: msg.deadline,
            },
        );
        SubscribeResponse {
            subscription_id,
            receiver,
        }
    }
}

#[async_trait]
impl Handler<Unsubscribe> for StreamBusActor {
    async fn handle(&mut self, msg: Unsubscribe) {
        if let Some(sub) = self.subscriptions.remove(&msg.subscription_id) {
            sub.sender.close();
        }
    }
}

#[async_trait]
impl Handler<Publish> for StreamBusActor {
    async fn handle(&mut self, msg: Publish) -> usize {
        let Some(topic) = item_topic(&msg.item) else {
            return 0;
        };
        let threshold = self.config.slow_consumer_drop_threshold;
        let mut delivered = 0usize;
        let mut terminated = Vec::new();

        for (id, sub) in self.subscriptions.iter_mut() {
            if sub.filter.topic() != topic || !matches(&sub.filter, &msg.item) {
                continue;
            }
            let dropped = sub.sender.push(msg.item.clone());
            if dropped {
                sub.consecutive_drops += 1;
                if sub.consecutive_drops >= threshold {
                    terminated.push(*id);
                    continue;
                }
            } else {
                sub.consecutive_drops = 0;
            }
            delivered += 1;
        }

        for id in terminated {
            if let Some(sub) = self.subscriptions.remove(&id) {
                sub.sender.push(StreamItem::Closing);
                sub.sender.close();
            }
        }

        delivered
    }
}

#[async_trait]
impl Handler<HeartbeatTick> for StreamBusActor {
    /// Pushes a heartbeat into every live subscription, then sweeps any
    /// whose `deadline` has elapsed (§4.5 "Cancellation: ... deadline
    /// expiry ... closes the outbound queue and removes the Subscription").
    /// Piggybacked on the same tick rather than a dedicated worker, since a
    /// subscription past deadline is stale on exactly the cadence a client
    /// would next expect a heartbeat anyway.
    async fn handle(&mut self, _msg: HeartbeatTick) -> usize {
        let now = self.clock.now();
        let heartbeat = StreamItem::Heartbeat { t: now };
        let expired: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.deadline.map(|deadline| now >= deadline).unwrap_or(false))
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(sub) = self.subscriptions.remove(id) {
                sub.sender.push(StreamItem::Closing);
                sub.sender.close();
            }
        }

        for sub in self.subscriptions.values() {
            sub.sender.push(heartbeat.clone());
        }
        self.subscriptions.len()
    }
}

#[async_trait]
impl Handler<Shutdown> for StreamBusActor {
    async fn handle(&mut self, _msg: Shutdown) {
        for (_, sub) in self.subscriptions.drain() {
            sub.sender.push(StreamItem::Closing);
            sub.sender.close();
        }
    }
}

#[async_trait]
impl Handler<CountSubscriptions> for StreamBusActor {
    async fn handle(&mut self, msg: CountSubscriptions) -> usize {
        match msg.topic {
            Some(topic) => self.subscriptions.values().filter(|sub| sub.filter.topic() == topic).count(),
            None => self.subscriptions.len(),
        }
    }
}
