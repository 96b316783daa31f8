//! Socket actor: the per-connection component described end to end by
//! `spec.md`. A socket actor owns one TCP connection (outbound or
//! accepted), speaks the `{ header, envelope, routing tag }` wire format
//! from [`mesh_net`] and [`tag`], and bridges it to a node's local actor
//! runtime through the [`collaborators`] traits.

pub mod actor;
pub mod collaborators;
pub mod config;
pub mod ctx_glue;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod heartbeat;
pub mod id;
pub mod pack;
pub mod reconnect;
pub mod registry;
pub mod spawn;
pub mod tag;
pub mod transport;
pub mod wire;

pub use actor::SocketActor;
pub use collaborators::{Connector, Context, NetworkService};
pub use config::SocketConfig;
pub use error::SocketActorError;
