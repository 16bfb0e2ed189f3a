mod reconnection_policy;
mod retry_policy;

pub use crate::retry::reconnection_policy::{
    ConstantReconnectionPolicy, ExponentialReconnectionPolicy, NeverReconnectionPolicy,
    ReconnectionPolicy, ReconnectionSchedule,
};
pub use crate::retry::retry_policy::{
    DefaultRetryPolicy, FallthroughRetryPolicy, QueryInfo, RetryDecision, RetryPolicy,
};
