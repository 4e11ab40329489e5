//! Asynchronous dispatch of remote queries
//!
//! A [`Dispatcher`] task follows one [`RemoteQuerySink`](super::sink::RemoteQuerySink)
//! through its watch channel and sends each payload over a [`QueryTransport`].
//! Only the latest payload is ever live: a newer one cancels the request in
//! flight and its response is never observed.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::sink::QueryPayload;

/// Network side of a remote layer
pub trait QueryTransport: Send + Sync {
    /// Send one query; the request is cancelled by dropping the future
    fn send(&self, payload: QueryPayload) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Latest-wins dispatch loop
pub struct Dispatcher;

enum Step {
    Finished(anyhow::Result<()>),
    Changed,
    Closed,
}

impl Dispatcher {
    /// Spawn the loop on the current tokio runtime
    ///
    /// The task ends once the sink is dropped and the last request settled.
    pub fn spawn(
        mut updates: watch::Receiver<Option<QueryPayload>>,
        transport: Arc<dyn QueryTransport>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut in_flight: Option<BoxFuture<'static, anyhow::Result<()>>> = None;

            loop {
                let step = match in_flight.as_mut() {
                    Some(request) => tokio::select! {
                        result = request => Step::Finished(result),
                        changed = updates.changed() => match changed {
                            Ok(()) => Step::Changed,
                            Err(_) => Step::Closed,
                        },
                    },
                    None => match updates.changed().await {
                        Ok(()) => Step::Changed,
                        Err(_) => Step::Closed,
                    },
                };

                match step {
                    Step::Finished(result) => {
                        in_flight = None;
                        if let Err(err) = result {
                            log::error!("Remote query failed: {:?}", err);
                        }
                    }
                    Step::Changed => {
                        if in_flight.take().is_some() {
                            log::debug!("Remote query superseded");
                        }
                        let payload = updates.borrow_and_update().clone();
                        in_flight = payload.map(|payload| transport.send(payload));
                    }
                    Step::Closed => {
                        if let Some(request) = in_flight.take() {
                            if let Err(err) = request.await {
                                log::error!("Remote query failed: {:?}", err);
                            }
                        }
                        return;
                    }
                }
            }
        })
    }
}
