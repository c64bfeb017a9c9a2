// cmdhint Simulator Library

pub mod generator;
pub mod models;
pub mod runner;
pub mod stats;
