//! IO Promise and IO Group Promise.
//!
//! A deferred handle that, when awaited, drives one render through the
//! [`IoClient`] and maps the raw return to a typed value. A group batches
//! sibling promises into one render and returns an ordered tuple.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use host_core::error::{HostError, Result};

use crate::component::ComponentInstance;
use crate::io_client::{GroupValidator, IoClient, ItemValidator, RenderItem};

/// Maps a raw (schema-validated) return value to the type an action sees.
pub type GetValue<T> = Arc<dyn Fn(Value) -> T + Send + Sync>;

/// A deferred handle over exactly one component. Consumed by exactly one
/// await; constructing a second await is a compile-time error since
/// `IntoFuture::into_future` takes `self` by value.
pub struct IoPromise<T> {
    component: Arc<ComponentInstance>,
    return_rx: oneshot::Receiver<Value>,
    get_value: GetValue<T>,
    user_validator: Option<Arc<dyn Fn(&T) -> Option<String> + Send + Sync>>,
    exclusive: bool,
    client: Arc<IoClient>,
}

impl<T: Send + 'static> IoPromise<T> {
    #[must_use]
    pub fn new(
        component: Arc<ComponentInstance>,
        return_rx: oneshot::Receiver<Value>,
        get_value: GetValue<T>,
        client: Arc<IoClient>,
    ) -> Self {
        Self {
            component,
            return_rx,
            get_value,
            user_validator: None,
            exclusive: false,
            client,
        }
    }

    /// Attach a post-return validator. A non-empty returned message rejects
    /// the batch and triggers a re-render with that message surfaced as
    /// `validationErrorMessage`.
    #[must_use]
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.user_validator = Some(Arc::new(validator));
        self
    }

    /// Mark this promise exclusive: it must never be grouped with others.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive || self.component.is_exclusive()
    }

    fn into_parts(self) -> PromisePart<T> {
        let get_value = self.get_value.clone();
        let user_validator = self.user_validator.clone();
        let validator: Option<ItemValidator> = user_validator.map(|validate| {
            let get_value = get_value.clone();
            Arc::new(move |raw: &Value| validate(&(get_value)(raw.clone()))) as ItemValidator
        });
        let item = RenderItem {
            component: self.component,
            return_rx: self.return_rx,
            validator,
        };
        PromisePart { item, get_value, client: self.client }
    }

    /// Render this single component and resolve to its typed value.
    pub async fn get(self) -> Result<T> {
        let client = self.client.clone();
        let part = self.into_parts();
        let mut values = client.render_components(vec![part.item], None).await?;
        let raw = values.pop().ok_or_else(|| HostError::protocol_mismatch("empty RETURN for single promise"))?;
        Ok((part.get_value)(raw))
    }
}

/// A promise decomposed into the pieces the render loop and the group
/// combinators need: the render item, the typed `getValue` mapper, and the
/// client the batch renders against.
struct PromisePart<T> {
    item: RenderItem,
    get_value: GetValue<T>,
    #[allow(dead_code)]
    client: Arc<IoClient>,
}

impl<T: Send + 'static> IntoFuture for IoPromise<T> {
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.get())
    }
}

/// An ordered, non-empty group of promises rendered as one batch.
///
/// Construction fails with [`HostError::GroupContainsExclusive`] if any
/// member is exclusive (e.g. `confirm`).
macro_rules! impl_group {
    ($name:ident, $($t:ident : $idx:tt),+) => {
        #[doc = "A group of promises awaited together as one render batch."]
        pub struct $name<$($t: Send + 'static),+> {
            items: ( $(IoPromise<$t>,)+ ),
            client: Arc<IoClient>,
        }

        impl<$($t: Send + 'static),+> $name<$($t),+> {
            /// Construct a group, rejecting any exclusive member.
            pub fn new(client: Arc<IoClient>, items: ($(IoPromise<$t>,)+)) -> Result<Self> {
                let exclusive = false $( || items.$idx.is_exclusive() )+;
                if exclusive {
                    return Err(HostError::GroupContainsExclusive);
                }
                Ok(Self { items, client })
            }

            /// Attach a validator run once against the whole ordered tuple
            /// of returns, then render and await the group.
            pub async fn get_with_validator(
                self,
                group_validator: Option<GroupValidator>,
            ) -> Result<($($t,)+)> {
                let client = self.client;
                $( let $t = self.items.$idx.into_parts(); )+
                let values = client
                    .render_components(vec![$($t.item),+], group_validator)
                    .await?;
                let mut iter = values.into_iter();
                Ok(($(
                    ($t.get_value)(iter.next().ok_or_else(|| {
                        HostError::protocol_mismatch("group RETURN shorter than component batch")
                    })?),
                )+))
            }

            /// Render and await the group with no group-level validator.
            pub async fn get(self) -> Result<($($t,)+)> {
                self.get_with_validator(None).await
            }
        }
    };
}

impl_group!(IoGroupPromise2, A:0, B:1);
impl_group!(IoGroupPromise3, A:0, B:1, C:2);
impl_group!(IoGroupPromise4, A:0, B:1, C:2, D:3);
impl_group!(IoGroupPromise5, A:0, B:1, C:2, D:3, E:4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{RenderPacket, ResponseKind, ResponsePacket};
    use crate::io_client::SendFn;
    use crate::schema::{MethodName, Schema};
    use parking_lot::Mutex;

    fn recording_send() -> (SendFn, Arc<Mutex<Vec<RenderPacket>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent2 = sent.clone();
        let send: SendFn = Arc::new(move |packet: RenderPacket| {
            let sent = sent2.clone();
            Box::pin(async move {
                sent.lock().push(packet);
                Ok(())
            })
        });
        (send, sent)
    }

    fn number_promise(client: Arc<IoClient>, label: &str) -> IoPromise<f64> {
        let (component, return_rx) = ComponentInstance::new(
            MethodName::new("INPUT_NUMBER"),
            label,
            None,
            Schema::permissive(),
            None,
            false,
        )
        .unwrap();
        IoPromise::new(component, return_rx, Arc::new(|v: Value| v.as_f64().unwrap_or(0.0)), client)
    }

    fn text_promise(client: Arc<IoClient>, label: &str) -> IoPromise<String> {
        let (component, return_rx) = ComponentInstance::new(
            MethodName::new("INPUT_TEXT"),
            label,
            None,
            Schema::permissive(),
            None,
            false,
        )
        .unwrap();
        IoPromise::new(
            component,
            return_rx,
            Arc::new(|v: Value| v.as_str().unwrap_or_default().to_string()),
            client,
        )
    }

    fn confirm_promise(client: Arc<IoClient>) -> IoPromise<bool> {
        let (component, return_rx) = ComponentInstance::new(
            MethodName::new("CONFIRM"),
            "ok?",
            None,
            Schema::permissive(),
            None,
            true,
        )
        .unwrap();
        IoPromise::new(component, return_rx, Arc::new(|v: Value| v.as_bool().unwrap_or(false)), client)
    }

    #[tokio::test]
    async fn single_promise_resolves_to_typed_value() {
        let (send, sent) = recording_send();
        let client = IoClient::new(send);
        let promise = number_promise(client.clone(), "age");

        let client2 = client.clone();
        let task = tokio::spawn(async move { promise.await });

        loop {
            if let Some(packet) = sent.lock().first().cloned() {
                client2.on_response(ResponsePacket {
                    input_group_key: Some(packet.input_group_key),
                    kind: ResponseKind::Return,
                    values: vec![serde_json::json!(42)],
                    values_meta: None,
                });
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(task.await.unwrap().unwrap(), 42.0);
    }

    #[tokio::test]
    async fn group_of_two_resolves_ordered_tuple() {
        let (send, sent) = recording_send();
        let client = IoClient::new(send);
        let a = text_promise(client.clone(), "a");
        let b = number_promise(client.clone(), "b");
        let group = IoGroupPromise2::new(client.clone(), (a, b)).unwrap();

        let task = tokio::spawn(async move { group.get().await });

        loop {
            if let Some(packet) = sent.lock().first().cloned() {
                client.on_response(ResponsePacket {
                    input_group_key: Some(packet.input_group_key),
                    kind: ResponseKind::Return,
                    values: vec![serde_json::json!("x"), serde_json::json!(7)],
                    values_meta: None,
                });
                break;
            }
            tokio::task::yield_now().await;
        }

        let (a, b) = task.await.unwrap().unwrap();
        assert_eq!(a, "x");
        assert_eq!(b, 7.0);
    }

    #[tokio::test]
    async fn group_containing_exclusive_fails_at_construction_with_no_traffic() {
        let (send, sent) = recording_send();
        let client = IoClient::new(send);
        let a = text_promise(client.clone(), "a");
        let confirm = confirm_promise(client.clone());

        let err = IoGroupPromise2::new(client, (a, confirm)).unwrap_err();
        assert!(matches!(err, HostError::GroupContainsExclusive));
        assert!(sent.lock().is_empty());
    }
}
