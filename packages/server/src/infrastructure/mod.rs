//! Infrastructure layer: connection registry, collaborator adapters and wire DTOs.

pub mod dto;
pub mod registry;
pub mod repository;

pub use registry::{
    ConnectionHandle, ConnectionRegistry, DeliveryFailure, DeliveryReport, SendError,
};
