#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod export_data;
pub mod geocoder;
pub mod logs;
pub mod map_server;
pub mod map_view;
pub mod pipeline;
pub mod position;
pub mod sources;
pub mod track;
pub mod tracker;
