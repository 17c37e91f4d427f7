//! Driver and connector lifecycle.
//!
//! A [`Connector`] owns the backend client shared by all of its connections. The client is
//! built lazily on the first [`Connector::connect`] and torn down exactly once, either by
//! [`Connector::close`] or when the owning [`Driver`] shuts down.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backend, TableClient};
use crate::conn::Connection;
use crate::context::ExecContext;
use crate::error::{TableSqlError, map_backend_error};
use crate::retry::retry;

pub mod options;

pub use options::{ConnectorOptions, ConnectorOptionsBuilder, Credentials};

#[derive(Default)]
struct ClientSlot {
    client: Option<Arc<dyn TableClient>>,
    closed: bool,
}

pub struct Connector {
    backend: Arc<dyn Backend>,
    options: ConnectorOptions,
    slot: RwLock<ClientSlot>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Connector {
    /// Standalone connector, closed only through [`Connector::close`].
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, options: ConnectorOptions) -> Arc<Self> {
        Arc::new(Self {
            backend,
            options,
            slot: RwLock::new(ClientSlot::default()),
        })
    }

    /// Connector that also closes when `shutdown` fires.
    ///
    /// The watcher holds only a weak reference and needs a running tokio runtime; without one
    /// the connector must be closed explicitly.
    pub(crate) fn with_shutdown(
        backend: Arc<dyn Backend>,
        options: ConnectorOptions,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let connector = Self::new(backend, options);
        if let Ok(handle) = Handle::try_current() {
            let weak: Weak<Self> = Arc::downgrade(&connector);
            handle.spawn(async move {
                shutdown.cancelled().await;
                if let Some(connector) = weak.upgrade()
                    && let Err(err) = connector.close().await
                {
                    warn!(error = %err, "closing connector on driver shutdown failed");
                }
            });
        } else {
            debug!("no tokio runtime; connector will not follow driver shutdown");
        }
        connector
    }

    #[must_use]
    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    pub async fn is_closed(&self) -> bool {
        self.slot.read().await.closed
    }

    async fn client(&self, ctx: &ExecContext) -> Result<Arc<dyn TableClient>, TableSqlError> {
        {
            let slot = self.slot.read().await;
            if slot.closed {
                return Err(TableSqlError::ConnectorClosed);
            }
            if let Some(client) = &slot.client {
                return Ok(Arc::clone(client));
            }
        }
        let mut slot = self.slot.write().await;
        if slot.closed {
            return Err(TableSqlError::ConnectorClosed);
        }
        if let Some(client) = &slot.client {
            return Ok(Arc::clone(client));
        }
        let client = ctx.run(self.backend.open(&self.options)).await?;
        info!(
            endpoint = self.options.endpoint.as_deref().unwrap_or_default(),
            database = self.options.database.as_deref().unwrap_or_default(),
            "table client initialized"
        );
        slot.client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Open a connection bound to a fresh session.
    ///
    /// Session creation is retried as an idempotent operation.
    ///
    /// # Errors
    ///
    /// [`TableSqlError::ConnectorClosed`] after close, [`TableSqlError::Cancelled`], or the
    /// mapped backend failure.
    pub async fn connect(&self, ctx: &ExecContext) -> Result<Connection, TableSqlError> {
        let client = self.client(ctx).await?;
        let client = client.as_ref();
        let session = retry(ctx, true, &self.options.retry, move || async move {
            client.create_session().await.map_err(TableSqlError::Backend)
        })
        .await
        .map_err(TableSqlError::mapped)?;
        debug!(session_id = session.id(), "session created");
        Ok(Connection::new(
            session,
            self.options.connection_defaults(),
            self.options.retry.clone(),
        ))
    }

    /// Tear down the shared client. Later calls are no-ops; later connects fail.
    ///
    /// # Errors
    ///
    /// The mapped failure from closing the client.
    pub async fn close(&self) -> Result<(), TableSqlError> {
        let client = {
            let mut slot = self.slot.write().await;
            if slot.closed {
                return Ok(());
            }
            slot.closed = true;
            slot.client.take()
        };
        match client {
            Some(client) => {
                info!("closing table client");
                client.close().await.map_err(map_backend_error)
            }
            None => Ok(()),
        }
    }
}

/// Entry point: hands out connectors that share the driver's shutdown signal.
pub struct Driver {
    backend: Arc<dyn Backend>,
    done: CancellationToken,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("closed", &self.done.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Driver {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            done: CancellationToken::new(),
        }
    }

    /// Name-only open from the pre-connector API.
    ///
    /// # Errors
    ///
    /// Always [`TableSqlError::Deprecated`].
    pub fn open(&self, _name: &str) -> Result<Connection, TableSqlError> {
        Err(TableSqlError::Deprecated)
    }

    /// Connector for a connection string; parsing it is left to the backend.
    #[must_use]
    pub fn open_connector(&self, connection_string: &str) -> Arc<Connector> {
        self.connector(
            ConnectorOptions::builder()
                .connection_string(connection_string)
                .finish(),
        )
    }

    #[must_use]
    pub fn connector(&self, options: ConnectorOptions) -> Arc<Connector> {
        Connector::with_shutdown(Arc::clone(&self.backend), options, self.done.child_token())
    }

    /// Signal shutdown; every connector from this driver closes its client.
    pub fn close(&self) {
        self.done.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }
}
