//! UUID generation for transaction, call, render-batch and input-group ids.

use uuid::Uuid;

/// Identifies one transaction for the lifetime of `START_TRANSACTION` through
/// `MARK_TRANSACTION_COMPLETE`.
pub type TxId = Uuid;

/// Identifies one outbound RPC `call` and its matching response envelope.
pub type CallId = Uuid;

/// Scopes `IO_RESPONSE`s to the render loop batch that produced them. A
/// fresh value is generated per top-level `renderComponents` invocation, not
/// per internal re-render.
pub type InputGroupKey = Uuid;

/// Identifies one outbound `RENDER` packet.
pub type RenderId = Uuid;

/// Generate a fresh random id. A thin wrapper so every id-producing call
/// site in this codebase reads the same way and can be swapped for a
/// deterministic generator in tests if ever needed.
#[must_use]
pub fn fresh() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        let a = fresh();
        let b = fresh();
        assert_ne!(a, b);
    }
}
