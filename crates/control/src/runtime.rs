//! Control runtime integration.
//!
//! Bridges the synchronous simulation loop with the async UDP receiver and the
//! Ctrl-C listener. Both run on a small tokio runtime owned by
//! [`ControlRuntime`]; the loop only ever sees the [`ControlChannel`].

use std::future::Future;
use std::net::SocketAddr;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

use crate::channel::{channel, ControlChannel, ControlSender};
use crate::error::ControlError;
use crate::server::{bind, run_receiver, OscConfig};

/// Run on the second Ctrl-C, just before the process exits. Used to put the
/// terminal back when the monitor owns it.
pub type AbortHook = Box<dyn Fn() + Send + Sync>;

/// Running control plane. Dropping it stops the receiver.
pub struct ControlRuntime {
    rt: Runtime,
    local_addr: Option<SocketAddr>,
    shutdown: watch::Sender<bool>,
}

impl ControlRuntime {
    /// Start the Ctrl-C listener and, when enabled, the UDP receiver.
    ///
    /// A socket that cannot be bound is logged and skipped: the run continues
    /// without live control. Only failing to build the runtime is an error.
    pub fn start(config: &OscConfig) -> Result<(Self, ControlChannel), ControlError> {
        let (sender, control) = channel(config.queue_capacity);
        let runtime = Self::start_with(config, sender, None)?;
        Ok((runtime, control))
    }

    /// Like [`ControlRuntime::start`], running `on_abort` before a forced exit.
    pub fn start_with_abort_hook(
        config: &OscConfig,
        on_abort: AbortHook,
    ) -> Result<(Self, ControlChannel), ControlError> {
        let (sender, control) = channel(config.queue_capacity);
        let runtime = Self::start_with(config, sender, Some(on_abort))?;
        Ok((runtime, control))
    }

    /// Like [`ControlRuntime::start`], publishing into an existing channel.
    pub fn start_with(
        config: &OscConfig,
        sender: ControlSender,
        on_abort: Option<AbortHook>,
    ) -> Result<Self, ControlError> {
        let rt = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("blockbeat-control")
            .enable_all()
            .build()
            .map_err(ControlError::Runtime)?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        {
            let sender = sender.clone();
            rt.spawn(async move {
                let interrupt = || async { tokio::signal::ctrl_c().await.is_ok() };
                if handle_interrupts(interrupt, &sender, on_abort.as_ref()).await {
                    std::process::exit(130);
                }
            });
        }

        let mut local_addr = None;
        if config.enabled {
            match rt.block_on(bind(config)) {
                Ok(socket) => {
                    local_addr = socket.local_addr().ok();
                    if let Some(addr) = local_addr {
                        log::info!("listening for control datagrams on udp://{}", addr);
                    }
                    rt.spawn(run_receiver(socket, sender, shutdown_rx));
                }
                Err(e) => log::warn!("live control unavailable: {}", e),
            }
        } else {
            log::info!("live control disabled");
        }

        Ok(Self {
            rt,
            local_addr,
            shutdown,
        })
    }

    /// Address the receiver is bound to, if it is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop background tasks without blocking on them.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.rt.shutdown_background();
    }
}

/// First interrupt latches the stop flag; the second runs `on_abort` and
/// returns true, telling the caller to exit.
async fn handle_interrupts<F, Fut>(
    mut interrupt: F,
    sender: &ControlSender,
    on_abort: Option<&AbortHook>,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupt().await {
        return false;
    }
    log::info!("interrupt received, stopping after the current tick (again to abort)");
    sender.request_stop();
    if !interrupt().await {
        return false;
    }
    log::warn!("second interrupt, aborting");
    if let Some(hook) = on_abort {
        hook();
    }
    true
}
