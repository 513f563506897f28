//! Request and response interceptors.
//!
//! An interceptor gets mutable access to a request just before it is sent or
//! to the final response just before it is handed back.

use std::fmt;
use std::sync::Arc;

/// Hook run against a request or response.
pub trait Interceptor<T>: Send + Sync {
    /// Inspects or modifies `target`.
    fn process(&self, target: &mut T);
}

impl<T, F> Interceptor<T> for F
where
    F: Fn(&mut T) + Send + Sync,
{
    fn process(&self, target: &mut T) {
        self(target)
    }
}

/// Ordered list of interceptors, cheap to clone.
pub struct InterceptorChain<T> {
    interceptors: Vec<Arc<dyn Interceptor<T>>>,
}

impl<T> InterceptorChain<T> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Appends an interceptor; chains run in insertion order.
    pub fn add(&mut self, interceptor: impl Interceptor<T> + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    /// Appends an already shared interceptor.
    pub fn add_shared(&mut self, interceptor: Arc<dyn Interceptor<T>>) {
        self.interceptors.push(interceptor);
    }

    /// Runs every interceptor against `target`.
    pub fn apply(&self, target: &mut T) {
        for interceptor in &self.interceptors {
            interceptor.process(target);
        }
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether no interceptor is registered.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl<T> Default for InterceptorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InterceptorChain<T> {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
        }
    }
}

impl<T> fmt::Debug for InterceptorChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_runs_in_order() {
        let mut chain: InterceptorChain<Vec<u8>> = InterceptorChain::new();
        chain.add(|v: &mut Vec<u8>| v.push(1));
        chain.add(|v: &mut Vec<u8>| v.push(2));
        let mut target = Vec::new();
        chain.apply(&mut target);
        assert_eq!(target, vec![1, 2]);
    }

    #[test]
    fn test_clone_shares_interceptors() {
        let mut chain: InterceptorChain<u32> = InterceptorChain::new();
        chain.add(|n: &mut u32| *n += 10);
        let mut copy = chain.clone();
        copy.add(|n: &mut u32| *n *= 2);

        let mut a = 1;
        chain.apply(&mut a);
        assert_eq!(a, 11);

        let mut b = 1;
        copy.apply(&mut b);
        assert_eq!(b, 22);
        assert_eq!(chain.len(), 1);
        assert_eq!(copy.len(), 2);
    }

    struct Tag(&'static str);

    impl Interceptor<Vec<&'static str>> for Tag {
        fn process(&self, target: &mut Vec<&'static str>) {
            target.push(self.0);
        }
    }

    #[test]
    fn test_struct_interceptor_and_shared() {
        let mut chain = InterceptorChain::new();
        chain.add(Tag("first"));
        chain.add_shared(Arc::new(Tag("second")));
        let mut seen = Vec::new();
        chain.apply(&mut seen);
        assert_eq!(seen, vec!["first", "second"]);
        assert!(!chain.is_empty());
    }
}
