use chrono::{DateTime, Utc};
use model::subscription::{Filter, StreamItem, SubscriptionId, Topic};

use actors::handler::Message;

use crate::queue::QueueReceiver;

/// Opens a subscription on `filter.topic()`. The returned receiver yields
/// every matching item published after this point, plus periodic
/// heartbeats, until `Unsubscribe`d, dropped, terminated as a slow
/// consumer, or `deadline` elapses (§4.5 "Cancellation").
#[derive(Clone)]
pub struct Subscribe {
    pub filter: Filter,
    pub deadline: Option<DateTime<Utc>>,
}

pub struct SubscribeResponse {
    pub subscription_id: SubscriptionId,
    pub receiver: QueueReceiver,
}

impl Message for Subscribe {
    type Response = SubscribeResponse;
}

#[derive(Clone)]
pub struct Unsubscribe {
    pub subscription_id: SubscriptionId,
}

impl Message for Unsubscribe {
    type Response = ();
}

/// Publishes one item to every subscription on `item`'s topic whose filter
/// matches. Returns the number of subscriptions it was delivered to.
#[derive(Clone)]
pub struct Publish {
    pub item: StreamItem,
}

impl Message for Publish {
    type Response = usize;
}

/// Pushes a heartbeat to every open subscription and sweeps any that have
/// crossed the slow-consumer drop threshold. Driven by the platform's
/// heartbeat `Worker`, ticking once every `heartbeat_interval_s`.
#[derive(Clone)]
pub struct HeartbeatTick;

impl Message for HeartbeatTick {
    type Response = usize;
}

/// Pushes a `Closing` item to every open subscription and closes their
/// queues, so attached SSE handlers end their response streams cleanly.
#[derive(Clone)]
pub struct Shutdown;

impl Message for Shutdown {
    type Response = ();
}

#[derive(Clone)]
pub struct CountSubscriptions {
    pub topic: Option<Topic>,
}

impl Message for CountSubscriptions {
    type Response = usize;
}
