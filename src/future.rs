/// An owned dynamically typed [`Future`](std::future::Future), used where
/// the concrete future type cannot be named (trait objects, mocks).
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;
