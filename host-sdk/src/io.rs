//! The `io` namespace handed to every action: the surface for rendering
//! input, selection, display and experimental components.

use std::sync::Arc;

use host_core::error::Result;
use host_protocol::component::ComponentInstance;
use host_protocol::io_client::IoClient;
use host_protocol::loading::{LoadingOpts, TransactionLoadingState};
use host_protocol::promise::{IoGroupPromise2, IoGroupPromise3, IoGroupPromise4, IoGroupPromise5, IoPromise};
use host_protocol::schema::{MethodName, Schema, SchemaRegistry};
use serde_json::Value;

fn schema_for(registry: &Arc<dyn SchemaRegistry>, method: &MethodName) -> Schema {
    registry.lookup(method).cloned().unwrap_or_else(Schema::permissive)
}

fn identity(v: Value) -> Value {
    v
}

fn as_string(v: Value) -> String {
    v.as_str().unwrap_or_default().to_string()
}

fn as_f64(v: Value) -> f64 {
    v.as_f64().unwrap_or(0.0)
}

fn as_bool(v: Value) -> bool {
    v.as_bool().unwrap_or(false)
}

fn as_array(v: Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// The namespace of IO-rendering constructors exposed to an action for the
/// lifetime of one transaction.
#[derive(Clone)]
pub struct Io {
    client: Arc<IoClient>,
    registry: Arc<dyn SchemaRegistry>,
    loading: Arc<TransactionLoadingState>,
}

impl Io {
    #[must_use]
    pub fn new(
        client: Arc<IoClient>,
        registry: Arc<dyn SchemaRegistry>,
        loading: Arc<TransactionLoadingState>,
    ) -> Self {
        Self { client, registry, loading }
    }

    /// The transaction's progress side channel. See
    /// [`TransactionLoadingState`].
    #[must_use]
    pub fn loading(&self) -> Arc<TransactionLoadingState> {
        self.loading.clone()
    }

    /// Report progress without threading the loading handle explicitly.
    pub async fn report_progress(&self, opts: LoadingOpts) {
        self.loading.update(opts).await;
    }

    fn component(
        &self,
        method: MethodName,
        label: impl Into<String>,
        initial_props: Option<Value>,
        exclusive: bool,
    ) -> Result<(Arc<ComponentInstance>, tokio::sync::oneshot::Receiver<Value>)> {
        let schema = schema_for(&self.registry, &method);
        ComponentInstance::new(method, label, initial_props, schema, None, exclusive)
    }

    pub fn input(&self) -> InputNamespace {
        InputNamespace { io: self }
    }

    pub fn select(&self) -> SelectNamespace {
        SelectNamespace { io: self }
    }

    pub fn display(&self) -> DisplayNamespace {
        DisplayNamespace { io: self }
    }

    pub fn experimental(&self) -> ExperimentalNamespace {
        ExperimentalNamespace { io: self }
    }

    /// An exclusive yes/no confirmation. Cannot be grouped.
    pub fn confirm(&self, label: impl Into<String>) -> Result<IoPromise<bool>> {
        let (component, return_rx) = self.component(MethodName::new("CONFIRM"), label, None, true)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_bool), self.client.clone()).exclusive())
    }

    /// A search component whose result set is driven by incoming state: as
    /// the operator types, `SET_STATE` carries the query and `on_results`
    /// recomputes the displayed options.
    pub fn search<F, Fut>(&self, label: impl Into<String>, on_results: F) -> Result<IoPromise<Value>>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Value> + Send + 'static,
    {
        let method = MethodName::new("SEARCH");
        let schema = schema_for(&self.registry, &method);
        let handler: host_protocol::component::StateHandler = Arc::new(move |state: Value| {
            let query = state.as_str().unwrap_or_default().to_string();
            let fut = on_results(query);
            Box::pin(async move { fut.await })
        });
        let (component, return_rx) =
            ComponentInstance::new(method, label, None, schema, Some(handler), false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(identity), self.client.clone()))
    }

    /// Batch two promises into one render, rejecting if either is exclusive.
    pub fn group2<A: Send + 'static, B: Send + 'static>(
        &self,
        items: (IoPromise<A>, IoPromise<B>),
    ) -> Result<IoGroupPromise2<A, B>> {
        IoGroupPromise2::new(self.client.clone(), items)
    }

    pub fn group3<A: Send + 'static, B: Send + 'static, C: Send + 'static>(
        &self,
        items: (IoPromise<A>, IoPromise<B>, IoPromise<C>),
    ) -> Result<IoGroupPromise3<A, B, C>> {
        IoGroupPromise3::new(self.client.clone(), items)
    }

    pub fn group4<A: Send + 'static, B: Send + 'static, C: Send + 'static, D: Send + 'static>(
        &self,
        items: (IoPromise<A>, IoPromise<B>, IoPromise<C>, IoPromise<D>),
    ) -> Result<IoGroupPromise4<A, B, C, D>> {
        IoGroupPromise4::new(self.client.clone(), items)
    }

    pub fn group5<A: Send + 'static, B: Send + 'static, C: Send + 'static, D: Send + 'static, E: Send + 'static>(
        &self,
        items: (IoPromise<A>, IoPromise<B>, IoPromise<C>, IoPromise<D>, IoPromise<E>),
    ) -> Result<IoGroupPromise5<A, B, C, D, E>> {
        IoGroupPromise5::new(self.client.clone(), items)
    }
}

pub struct InputNamespace<'a> {
    io: &'a Io,
}

impl InputNamespace<'_> {
    pub fn text(&self, label: impl Into<String>) -> Result<IoPromise<String>> {
        let (component, return_rx) = self.io.component(MethodName::new("INPUT_TEXT"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_string), self.io.client.clone()))
    }

    pub fn boolean(&self, label: impl Into<String>) -> Result<IoPromise<bool>> {
        let (component, return_rx) = self.io.component(MethodName::new("INPUT_BOOLEAN"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_bool), self.io.client.clone()))
    }

    pub fn number(&self, label: impl Into<String>) -> Result<IoPromise<f64>> {
        let (component, return_rx) = self.io.component(MethodName::new("INPUT_NUMBER"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_f64), self.io.client.clone()))
    }

    pub fn email(&self, label: impl Into<String>) -> Result<IoPromise<String>> {
        let (component, return_rx) = self.io.component(MethodName::new("INPUT_EMAIL"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_string), self.io.client.clone()))
    }

    pub fn rich_text(&self, label: impl Into<String>) -> Result<IoPromise<String>> {
        let (component, return_rx) =
            self.io.component(MethodName::new("INPUT_RICH_TEXT"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_string), self.io.client.clone()))
    }
}

pub struct SelectNamespace<'a> {
    io: &'a Io,
}

impl SelectNamespace<'_> {
    pub fn single(&self, label: impl Into<String>, options: Vec<Value>) -> Result<IoPromise<Value>> {
        let props = serde_json::json!({ "options": options });
        let (component, return_rx) =
            self.io.component(MethodName::new("SELECT_SINGLE"), label, Some(props), false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(identity), self.io.client.clone()))
    }

    pub fn multiple(&self, label: impl Into<String>, options: Vec<Value>) -> Result<IoPromise<Vec<Value>>> {
        let props = serde_json::json!({ "options": options });
        let (component, return_rx) =
            self.io.component(MethodName::new("SELECT_MULTIPLE"), label, Some(props), false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_array), self.io.client.clone()))
    }

    pub fn table(&self, label: impl Into<String>, rows: Vec<Value>) -> Result<IoPromise<Vec<Value>>> {
        let props = serde_json::json!({ "rows": rows });
        let (component, return_rx) =
            self.io.component(MethodName::new("SELECT_TABLE"), label, Some(props), false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_array), self.io.client.clone()))
    }
}

pub struct DisplayNamespace<'a> {
    io: &'a Io,
}

impl DisplayNamespace<'_> {
    fn acknowledge(&self, method: MethodName, label: impl Into<String>, props: Value) -> Result<IoPromise<()>> {
        let (component, return_rx) = self.io.component(method, label, Some(props), false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(|_| ()), self.io.client.clone()))
    }

    pub fn heading(&self, text: impl Into<String>) -> Result<IoPromise<()>> {
        self.acknowledge(MethodName::new("DISPLAY_HEADING"), text, Value::Null)
    }

    pub fn markdown(&self, label: impl Into<String>, body: impl Into<String>) -> Result<IoPromise<()>> {
        let props = serde_json::json!({ "body": body.into() });
        self.acknowledge(MethodName::new("DISPLAY_MARKDOWN"), label, props)
    }

    pub fn link(&self, label: impl Into<String>, href: impl Into<String>) -> Result<IoPromise<()>> {
        let props = serde_json::json!({ "href": href.into() });
        self.acknowledge(MethodName::new("DISPLAY_LINK"), label, props)
    }

    pub fn object(&self, label: impl Into<String>, value: Value) -> Result<IoPromise<()>> {
        self.acknowledge(MethodName::new("DISPLAY_OBJECT"), label, value)
    }

    pub fn table(&self, label: impl Into<String>, rows: Vec<Value>) -> Result<IoPromise<()>> {
        let props = serde_json::json!({ "rows": rows });
        self.acknowledge(MethodName::new("DISPLAY_TABLE"), label, props)
    }
}

pub struct ExperimentalNamespace<'a> {
    io: &'a Io,
}

impl ExperimentalNamespace<'_> {
    pub fn spreadsheet(&self, label: impl Into<String>, columns: Vec<String>) -> Result<IoPromise<Vec<Value>>> {
        let props = serde_json::json!({ "columns": columns });
        let (component, return_rx) = self
            .io
            .component(MethodName::new("EXPERIMENTAL_SPREADSHEET"), label, Some(props), false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_array), self.io.client.clone()))
    }

    pub fn date(&self, label: impl Into<String>) -> Result<IoPromise<String>> {
        let (component, return_rx) =
            self.io.component(MethodName::new("EXPERIMENTAL_DATE"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_string), self.io.client.clone()))
    }

    pub fn time(&self, label: impl Into<String>) -> Result<IoPromise<String>> {
        let (component, return_rx) =
            self.io.component(MethodName::new("EXPERIMENTAL_TIME"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_string), self.io.client.clone()))
    }

    pub fn datetime(&self, label: impl Into<String>) -> Result<IoPromise<String>> {
        let (component, return_rx) =
            self.io.component(MethodName::new("EXPERIMENTAL_DATETIME"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(as_string), self.io.client.clone()))
    }

    pub fn input_file(&self, label: impl Into<String>) -> Result<IoPromise<Value>> {
        let (component, return_rx) = self
            .io
            .component(MethodName::new("EXPERIMENTAL_INPUT_FILE"), label, None, false)?;
        Ok(IoPromise::new(component, return_rx, Arc::new(identity), self.io.client.clone()))
    }
}

