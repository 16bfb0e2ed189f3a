/// An owned dynamically typed [`Future`] for use in cases where you can't
/// statically type your result or need to add some indirection.
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// A cloneable future whose output is delivered to every holder.
pub type SharedFuture<T> = futures::future::Shared<BoxFuture<'static, T>>;
