pub use crate::retry::retry_policy::{
    FallthroughRetryPolicy, RetryPolicy, RetryVerdict, SimpleRetryPolicy,
};

mod retry_policy;
