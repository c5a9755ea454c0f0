//! Network-side LoRaWAN MAC processing: command negotiation, ADR and downlink packing.

pub mod adr;
pub mod command;
pub mod commands;
pub mod device;
pub mod dispatch;
pub mod event;
pub mod frequency_plan;
pub mod packer;
pub mod region;
pub mod rejection;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod types;
