pub mod config;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod roots;

pub mod commands {
    pub mod export;
}
