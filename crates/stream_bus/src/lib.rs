//! Fan-out hub for the three streaming topics (§4.5): driver
//! locations, trip updates, and pricing updates. Other components publish
//! events here; the web layer attaches subscribers and turns the receiver
//! into an SSE body.

pub mod actor;
pub mod messages;
pub mod queue;

use std::sync::Arc;

use actors::actor_ref::ActorRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::config::Config;
use model::error::{CoreError, CoreResult};
use model::subscription::{Filter, StreamItem, SubscriptionId, Topic};
use utility::clock::Clock;

pub use queue::QueueReceiver;

use messages::{CountSubscriptions, HeartbeatTick, Publish, Shutdown, Subscribe, SubscribeResponse, Unsubscribe};

/// Spawns the Stream Bus actor, supervised with resume-on-panic (see
/// [`actor::StreamBusActor::on_fail`]).
pub fn spawn(config: Config, clock: Arc<dyn Clock>) -> ActorRef<actor::StreamBusActor> {
    actors::run(move || actor::StreamBusActor::new(config.clone(), clock.clone()))
}

#[async_trait]
pub trait StreamBusRef {
    async fn subscribe(&self, filter: Filter, deadline: Option<DateTime<Utc>>) -> CoreResult<(SubscriptionId, QueueReceiver)>;

    async fn unsubscribe(&self, subscription_id: SubscriptionId) -> CoreResult<()>;

    async fn publish(&self, item: StreamItem) -> CoreResult<usize>;

    async fn heartbeat_tick(&self) -> CoreResult<usize>;

    async fn shutdown(&self) -> CoreResult<()>;

    async fn count_subscriptions(&self, topic: Option<Topic>) -> CoreResult<usize>;
}

#[async_trait]
impl StreamBusRef for ActorRef<actor::StreamBusActor> {
    async fn subscribe(&self, filter: Filter, deadline: Option<DateTime<Utc>>) -> CoreResult<(SubscriptionId, QueueReceiver)> {
        let SubscribeResponse { subscription_id, receiver } =
            self.ask(Subscribe { filter, deadline }).await.map_err(mailbox_error)?;
        Ok((subscription_id, receiver))
    }

    async fn unsubscribe(&self, subscription_id: SubscriptionId) -> CoreResult<()> {
        self.ask(Unsubscribe { subscription_id }).await.map_err(mailbox_error)
    }

    async fn publish(&self, item: StreamItem) -> CoreResult<usize> {
        self.ask(Publish { item }).await.map_err(mailbox_error)
    }

    async fn heartbeat_tick(&self) -> CoreResult<usize> {
        self.ask(HeartbeatTick).await.map_err(mailbox_error)
    }

    async fn shutdown(&self) -> CoreResult<()> {
        self.ask(Shutdown).await.map_err(mailbox_error)
    }

    async fn count_subscriptions(&self, topic: Option<Topic>) -> CoreResult<usize> {
        self.ask(CountSubscriptions { topic }).await.map_err(mailbox_error)
    }
}

fn mailbox_error<A, M>(err: actors::actor::ActorError<A, M>) -> CoreError
where
    A: actors::actor::Actor,
    M: actors::mailbox::Mailbox<A>,
{
    CoreError::Internal(format!("stream bus actor unavailable: {err:?}"))
}
