//! Release deployment

pub mod commands;
pub mod events;
pub mod fsm;
pub mod pipeline;
pub mod publish;
pub mod state;
