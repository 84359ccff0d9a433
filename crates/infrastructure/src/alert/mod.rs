pub mod webhook;

pub use webhook::{mirror_key, WebhookAlertSink};
