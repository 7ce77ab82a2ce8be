//! Service Discovery
//!
//! Hosts advertise their listening port under a room name; joiners watch for
//! rooms and resolve a name back to an address. The network-facing mechanism
//! (mDNS, a lobby server) is a collaborator behind [`Discovery`];
//! [`LocalDiscovery`] is the in-process registry used for local play and tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;

use crate::observe::{Observers, Subscription};

/// Prefix for generated room names
pub const DEFAULT_ROOM_PREFIX: &str = "sudoku-room";

/// A change in the set of advertised rooms
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A room became available
    Found(String),
    /// A room went away
    Lost(String),
}

/// Discovery errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Another host already advertises this name
    #[error("room name already taken: {0}")]
    NameTaken(String),

    /// No room with this name is advertised
    #[error("room not found: {0}")]
    NotFound(String),

    /// Port 0 cannot be advertised
    #[error("cannot advertise unbound port 0")]
    InvalidPort,
}

/// Advertise and find sessions
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Publish `port` under `name`
    async fn advertise(&self, port: u16, name: &str) -> Result<(), DiscoveryError>;

    /// Stop publishing `name`; a no-op for unknown names
    async fn withdraw(&self, name: &str);

    /// Watch rooms appear and disappear
    ///
    /// Starts with a `Found` for every room already advertised.
    fn discover(&self) -> Subscription<DiscoveryEvent>;

    /// Address to pass to [`Session::join_as_client`](crate::Session::join_as_client)
    async fn resolve(&self, name: &str) -> Result<SocketAddr, DiscoveryError>;
}

/// In-process registry; every subscriber sees every event
pub struct LocalDiscovery {
    host: IpAddr,
    services: DashMap<String, u16>,
    observers: Mutex<Observers<DiscoveryEvent>>,
}

impl LocalDiscovery {
    /// Registry resolving every room to the loopback address
    #[must_use]
    pub fn new() -> Self {
        Self::with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Registry resolving every room to `host`
    #[must_use]
    pub fn with_host(host: IpAddr) -> Self {
        Self {
            host,
            services: DashMap::new(),
            observers: Mutex::new(Observers::new()),
        }
    }

    /// Names currently advertised, sorted
    pub fn rooms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for LocalDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discovery for LocalDiscovery {
    async fn advertise(&self, port: u16, name: &str) -> Result<(), DiscoveryError> {
        if port == 0 {
            return Err(DiscoveryError::InvalidPort);
        }
        // Registry changes happen under the observer lock so a concurrent
        // discover() never sees a room twice or misses one.
        let mut observers = self.observers.lock();
        match self.services.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(DiscoveryError::NameTaken(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(port);
            }
        }
        tracing::info!(room = name, port, "Advertised room");
        observers.publish(DiscoveryEvent::Found(name.to_string()));
        Ok(())
    }

    async fn withdraw(&self, name: &str) {
        let mut observers = self.observers.lock();
        if self.services.remove(name).is_some() {
            tracing::info!(room = name, "Withdrew room");
            observers.publish(DiscoveryEvent::Lost(name.to_string()));
        }
    }

    fn discover(&self) -> Subscription<DiscoveryEvent> {
        let mut observers = self.observers.lock();
        observers.subscribe_with(self.rooms().into_iter().map(DiscoveryEvent::Found))
    }

    async fn resolve(&self, name: &str) -> Result<SocketAddr, DiscoveryError> {
        self.services
            .get(name)
            .map(|port| SocketAddr::new(self.host, *port))
            .ok_or_else(|| DiscoveryError::NotFound(name.to_string()))
    }
}

/// Human-readable room name, `<prefix>-NNN`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// `prefix` followed by a random suffix in 100..=999
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let suffix: u16 = rand::thread_rng().gen_range(100..=999);
        Self(format!("{prefix}-{suffix}"))
    }

    /// The name as advertised
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_advertise_discover_resolve() {
        let discovery = LocalDiscovery::new();
        let mut events = discovery.discover();

        discovery.advertise(40100, "room-a").await.unwrap();
        assert_eq!(events.recv().await, Some(DiscoveryEvent::Found("room-a".into())));

        let addr = discovery.resolve("room-a").await.unwrap();
        assert_eq!(addr, "127.0.0.1:40100".parse().unwrap());

        discovery.withdraw("room-a").await;
        assert_eq!(events.recv().await, Some(DiscoveryEvent::Lost("room-a".into())));
        assert_eq!(
            discovery.resolve("room-a").await,
            Err(DiscoveryError::NotFound("room-a".into()))
        );
    }

    #[tokio::test]
    async fn test_discover_replays_existing_rooms() {
        let discovery = LocalDiscovery::new();
        discovery.advertise(1001, "b").await.unwrap();
        discovery.advertise(1002, "a").await.unwrap();

        let mut events = discovery.discover();
        assert_eq!(events.recv().await, Some(DiscoveryEvent::Found("a".into())));
        assert_eq!(events.recv().await, Some(DiscoveryEvent::Found("b".into())));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_events() {
        let discovery = LocalDiscovery::new();
        let mut first = discovery.discover();
        let mut second = discovery.discover();

        discovery.advertise(5000, "shared").await.unwrap();
        let found = Some(DiscoveryEvent::Found("shared".into()));
        assert_eq!(first.recv().await, found);
        assert_eq!(second.recv().await, found);
    }

    #[tokio::test]
    async fn test_advertise_rejects_duplicates_and_port_zero() {
        let discovery = LocalDiscovery::new();
        discovery.advertise(5000, "taken").await.unwrap();
        assert_eq!(
            discovery.advertise(5001, "taken").await,
            Err(DiscoveryError::NameTaken("taken".into()))
        );
        assert_eq!(
            discovery.advertise(0, "zero").await,
            Err(DiscoveryError::InvalidPort)
        );
        assert_eq!(discovery.rooms(), vec!["taken".to_string()]);
    }

    #[tokio::test]
    async fn test_withdraw_unknown_is_silent() {
        let discovery = LocalDiscovery::new();
        let mut events = discovery.discover();
        discovery.withdraw("ghost").await;
        discovery.advertise(7000, "real").await.unwrap();
        assert_eq!(events.recv().await, Some(DiscoveryEvent::Found("real".into())));
    }

    #[test]
    fn test_room_name_format() {
        for _ in 0..50 {
            let name = RoomName::generate(DEFAULT_ROOM_PREFIX);
            let suffix = name
                .as_str()
                .strip_prefix("sudoku-room-")
                .expect("prefix kept");
            let n: u16 = suffix.parse().unwrap();
            assert!((100..=999).contains(&n), "suffix {n} out of range");
        }
    }
}
