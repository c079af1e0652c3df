mod defaults;
mod load;
mod schema;
mod validate;

pub use load::load;
pub use schema::{
    Channels, Config, ContextConfig, EmailChannel, HostConfig, ProbeKind, RegistryConfig,
    SlackChannel, SmsChannel, TeamsChannel, Thresholds,
};
pub use validate::ConfigError;

#[cfg(test)]
mod tests;
