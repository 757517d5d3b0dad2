use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::{Error, ErrorKind};
use crate::interface::{RemoteHandler, RemoteInterface};
use crate::wire::{self, Outcome, Request, Response};

/// Hooks an embedding application can override to observe skeleton
/// failures, matching spec §4.B.2's `listen_error`/`service_error`/
/// `stopped` callbacks.
pub struct Hooks {
    /// Invoked when `accept` fails while the listener is not being
    /// stopped. Returning `true` continues accepting; `false` stops the
    /// listener loop (as if `stop()` had been called).
    pub listen_error: Box<dyn Fn(&Error) -> bool + Send + Sync>,

    /// Invoked when a single connection's service task fails. Does not
    /// affect the listener or other connections.
    pub service_error: Box<dyn Fn(&Error) + Send + Sync>,

    /// Invoked once the listener has fully exited, whether from `stop()`
    /// or from `listen_error` returning `false`. `cause` is `Some` only in
    /// the latter case.
    pub stopped: Box<dyn Fn(Option<&Error>) + Send + Sync>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            listen_error: Box::new(|err| {
                warn!("listener accept failed, continuing: {err}");
                true
            }),
            service_error: Box::new(|err| {
                warn!("service thread failed: {err}");
            }),
            stopped: Box::new(|cause| match cause {
                Some(err) => debug!("skeleton stopped due to: {err}"),
                None => debug!("skeleton stopped"),
            }),
        }
    }
}

enum RunState {
    Stopped,
    Running {
        local_addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        listener_task: JoinHandle<()>,
    },
}

/// Server-side endpoint bound to a TCP listener, dispatching every
/// accepted connection's single request to `H::handle`.
///
/// Lifecycle: `stopped -> running -> stopped`, re-startable (spec §3).
/// While running, exactly one listener task exists; while stopped, the
/// listener socket is closed and the listener task has been joined.
pub struct Skeleton<I: RemoteInterface, H: RemoteHandler<I> + 'static> {
    handler: Arc<H>,
    hooks: Arc<Hooks>,
    state: Mutex<RunState>,
    _interface: PhantomData<fn() -> I>,
}

impl<I: RemoteInterface, H: RemoteHandler<I> + 'static> Skeleton<I, H> {
    /// Creates a skeleton targeting `handler` with default hooks.
    ///
    /// Fails with `bad-interface` only via [`Error::bad_interface`] calls
    /// made by the embedding application before construction; as noted on
    /// [`RemoteInterface`], the Rust type system rules out constructing a
    /// skeleton whose interface doesn't meet spec's "every operation may
    /// fail with a transport error" requirement.
    pub fn new(handler: H) -> Self {
        Self::with_hooks(handler, Hooks::default())
    }

    pub fn with_hooks(handler: H, hooks: Hooks) -> Self {
        Self {
            handler: Arc::new(handler),
            hooks: Arc::new(hooks),
            state: Mutex::new(RunState::Stopped),
            _interface: PhantomData,
        }
    }

    /// Binds a TCP listener at `addr` (port `0` lets the OS assign a free
    /// port) and spawns the listener task. Returns the address actually
    /// bound to.
    ///
    /// Fails with `illegal-state` if already running; fails with
    /// `transport-error` if binding fails.
    pub async fn start(&self, addr: SocketAddr) -> Result<SocketAddr, Error> {
        let mut state = self.state.lock().await;
        if matches!(&*state, RunState::Running { .. }) {
            return Err(Error::illegal_state(format!(
                "{} skeleton is already running",
                I::NAME
            )));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| Error::transport(format!("failed to bind {addr}: {err}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| Error::transport(format!("failed to read bound address: {err}")))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handler = Arc::clone(&self.handler);
        let hooks = Arc::clone(&self.hooks);
        let interface_name = I::NAME;

        let listener_task = tokio::spawn(async move {
            run_listener::<I, H>(listener, handler, hooks, shutdown_rx, interface_name).await;
        });

        debug!("{} skeleton listening on {local_addr}", I::NAME);
        *state = RunState::Running {
            local_addr,
            shutdown: shutdown_tx,
            listener_task,
        };
        Ok(local_addr)
    }

    /// Closes the listener, which wakes the listener task, then waits for
    /// it to exit. In-flight service tasks are allowed to run to
    /// completion; this does not wait for them. A no-op if already
    /// stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, RunState::Stopped);
        if let RunState::Running {
            shutdown,
            listener_task,
            ..
        } = previous
        {
            let _ = shutdown.send(());
            let _ = listener_task.await;
        }
    }

    /// The address the skeleton is currently bound to, if running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock().await {
            RunState::Running { local_addr, .. } => Some(*local_addr),
            RunState::Stopped => None,
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.state.lock().await, RunState::Running { .. })
    }
}

async fn run_listener<I, H>(
    listener: TcpListener,
    handler: Arc<H>,
    hooks: Arc<Hooks>,
    mut shutdown: oneshot::Receiver<()>,
    interface_name: &'static str,
) where
    I: RemoteInterface,
    H: RemoteHandler<I> + 'static,
{
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                trace!("{interface_name} listener received stop signal");
                (hooks.stopped)(None);
                return;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        trace!("{interface_name} accepted connection from {peer}");
                        let handler = Arc::clone(&handler);
                        let hooks = Arc::clone(&hooks);
                        tokio::spawn(async move {
                            service_connection::<I, H>(stream, handler, hooks, interface_name).await;
                        });
                    }
                    Err(err) => {
                        let err = Error::transport(format!("accept failed: {err}"));
                        if !(hooks.listen_error)(&err) {
                            (hooks.stopped)(Some(&err));
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn service_connection<I, H>(
    mut stream: TcpStream,
    handler: Arc<H>,
    hooks: Arc<Hooks>,
    interface_name: &'static str,
) where
    I: RemoteInterface,
    H: RemoteHandler<I> + 'static,
{
    let bytes = match wire::read_frame(&mut stream).await {
        Ok(bytes) => bytes,
        Err(err) => {
            (hooks.service_error)(&err);
            return;
        }
    };

    let request: Result<Request<I::Request>, Error> = wire::deserialize_from_slice(&bytes);
    let (origin_id, outcome) = match request {
        Ok(request) => {
            let origin_id = request.id;
            let outcome = match handler.handle(request.payload).await {
                Ok(response) => Outcome::Ok(response),
                Err(err) => Outcome::MethodThrew(err),
            };
            (origin_id, outcome)
        }
        Err(decode_err) => match wire::recover_request_id(&bytes) {
            Some(id) => {
                let err = Error::new(
                    ErrorKind::NoSuchMethod,
                    format!("{interface_name} could not resolve request: {decode_err}"),
                );
                (id, Outcome::MethodThrew(err))
            }
            None => {
                (hooks.service_error)(&decode_err);
                return;
            }
        },
    };

    // `MethodThrew` is the target's own declared, expected error (spec
    // §4.B.2) — not an RPC-layer failure, so it never reaches
    // `service_error`. Only decode/encode/I-O failures on this connection
    // do (handled above and below).
    let response = Response::new(origin_id, outcome);
    let bytes = match wire::serialize_to_vec(&response) {
        Ok(bytes) => bytes,
        Err(err) => {
            (hooks.service_error)(&err);
            return;
        }
    };

    if let Err(err) = wire::write_frame(&mut stream, &bytes).await {
        (hooks.service_error)(&err);
    }
}
