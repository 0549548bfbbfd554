//! Layered request handling.
//!
//! A [`SupplierChain`] is an ordered, immutable list of [`Supplier`] layers. A request is offered to each layer in
//! turn. A layer either answers it or forwards it to the next one, optionally leaving a [`Ticket`] behind. Once some
//! layer answers, every layer that forwarded gets its [`after_answer()`](Supplier::after_answer) hook called in
//! reverse order, with the ticket it left. That is where a cache populates itself or announces an invalidation.
//!
//! An error from any layer ends the call: later layers are not consulted and no hooks fire.
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::StoreError;
use crate::error::StoreResult;
use crate::request::StoreRequest;
use crate::request::StoreResponse;

/// Per-call flags any layer may look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// Do not answer from, nor populate, any cache.
    pub no_cache:        bool,
    /// Let soft-deleted rows through.
    pub include_deleted: bool,
    /// Read from the primary database even if replicas are configured.
    pub use_primary:     bool,
}

impl Hints {
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn use_primary(mut self) -> Self {
        self.use_primary = true;
        self
    }
}

/// Opaque state a layer hands over when it forwards a request and gets back in
/// [`after_answer()`](Supplier::after_answer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ticket(pub u64);

impl Ticket {
    pub const NONE: Ticket = Ticket(0);
}

#[derive(Debug)]
pub enum Supplied {
    Answer(StoreResponse),
    Forward(Ticket),
}

impl Supplied {
    pub fn forward() -> Self {
        Self::Forward(Ticket::NONE)
    }
}

#[async_trait]
pub trait Supplier: Debug + Send + Sync + 'static {
    /// Name for logging.
    fn name(&self) -> &'static str;

    async fn supply(&self, request: &StoreRequest, hints: &Hints) -> StoreResult<Supplied>;

    async fn after_answer(
        &self,
        _request: &StoreRequest,
        _response: &StoreResponse,
        _hints: &Hints,
        _ticket: Ticket,
    ) -> StoreResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SupplierChain {
    layers: Arc<[Arc<dyn Supplier>]>,
}

impl SupplierChain {
    pub fn builder() -> SupplierChainBuilder {
        SupplierChainBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Option<&Arc<dyn Supplier>> {
        self.layers.get(index)
    }

    /// The layer following the one at `index`.
    pub fn next_after(&self, index: usize) -> Option<&Arc<dyn Supplier>> {
        self.layers.get(index + 1)
    }

    #[instrument(level = "trace", skip(self, request), fields(op = request.op()))]
    pub async fn supply(&self, request: &StoreRequest, hints: &Hints) -> StoreResult<StoreResponse> {
        let mut forwarded: Vec<(usize, Ticket)> = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            match layer.supply(request, hints).await? {
                Supplied::Answer(response) => {
                    tracing::trace!("'{}' answered {}", layer.name(), request.op());
                    for (index, ticket) in forwarded.into_iter().rev() {
                        self.layers[index].after_answer(request, &response, hints, ticket).await?;
                    }
                    return Ok(response);
                }
                Supplied::Forward(ticket) => {
                    forwarded.push((index, ticket));
                }
            }
        }

        tracing::error!("No layer answered {}", request.op());
        Err(StoreError::internal("store.no_supplier"))
    }
}

#[derive(Default)]
pub struct SupplierChainBuilder {
    layers: Vec<Arc<dyn Supplier>>,
}

impl SupplierChainBuilder {
    pub fn layer<S: Supplier>(self, layer: S) -> Self {
        self.shared_layer(Arc::new(layer))
    }

    /// Add a layer that is also held elsewhere, e.g. a cache the application wants to invalidate directly.
    pub fn shared_layer(mut self, layer: Arc<dyn Supplier>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn build(self) -> SupplierChain {
        SupplierChain {
            layers: self.layers.into(),
        }
    }
}
